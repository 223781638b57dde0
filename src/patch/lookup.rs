//! Resolution of type, method and field names against the metadata tables.
//!
//! Types are addressed by their full name `Namespace.Name`, split at the last `.`. An empty
//! namespace part matches a type in any namespace. The members of a type are the contiguous run
//! of rows starting at its `MethodList` / `FieldList` column and ending where the next type's run
//! begins, or at the end of the member table for the last type.

use std::ops::Range;

use crate::{
    metadata::{tables::TableId, MetadataStream},
    Result,
};

/// Splits `full_name` into namespace and name at the last `.`.
///
/// A leading `.` is part of the name, so `".Foo"` has an empty namespace.
///
/// # Examples
///
/// ```rust
/// use dotpatch::patch::split_type_name;
///
/// assert_eq!(split_type_name("Game.Logic.Player"), ("Game.Logic", "Player"));
/// assert_eq!(split_type_name("Player"), ("", "Player"));
/// ```
#[must_use]
pub fn split_type_name(full_name: &str) -> (&str, &str) {
    match full_name.rfind('.') {
        Some(index) if index > 0 => (&full_name[..index], &full_name[index + 1..]),
        _ => ("", full_name),
    }
}

/// A half-open range `[start, end)` of 1-based rows of one member table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRange {
    /// First row of the range
    pub start: u32,
    /// One past the last row of the range
    pub end: u32,
}

impl MemberRange {
    /// The rows of the range.
    #[must_use]
    pub fn rids(&self) -> Range<u32> {
        self.start..self.end.max(self.start)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// `true` if the range holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Name lookups over the metadata of one image buffer.
pub struct Resolver<'a> {
    metadata: &'a MetadataStream,
    data: &'a [u8],
}

impl<'a> Resolver<'a> {
    /// A resolver reading `metadata` from `data`.
    #[must_use]
    pub fn new(metadata: &'a MetadataStream, data: &'a [u8]) -> Resolver<'a> {
        Resolver { metadata, data }
    }

    fn column(&self, table: TableId, rid: u32, name: &str) -> Result<u32> {
        let mut rows = self.metadata.table(table);
        if !rows.move_to_rid(rid) {
            return Err(malformed_error!("{:?} row {} does not exist", table, rid));
        }
        rows.get(self.data, name)
    }

    fn string_column(&self, table: TableId, rid: u32, name: &str) -> Result<&'a str> {
        let index = self.column(table, rid, name)?;
        self.metadata.string(self.data, index)
    }

    /// Finds the first TypeDef row named `full_name`.
    ///
    /// # Errors
    /// Returns [`crate::Error::LookupFailed`] if no type matches.
    pub fn find_type(&self, full_name: &str) -> Result<u32> {
        let (namespace, name) = split_type_name(full_name);

        for rid in 1..=self.metadata.row_count(TableId::TypeDef) {
            if self.string_column(TableId::TypeDef, rid, "TypeName")? != name {
                continue;
            }
            if namespace.is_empty()
                || self.string_column(TableId::TypeDef, rid, "TypeNamespace")? == namespace
            {
                return Ok(rid);
            }
        }

        Err(lookup_error!("Type {} not found", full_name))
    }

    fn members(&self, full_name: &str, list: &str, member: TableId) -> Result<MemberRange> {
        let rid = self.find_type(full_name)?;
        let start = self.column(TableId::TypeDef, rid, list)?;
        let end = if rid < self.metadata.row_count(TableId::TypeDef) {
            self.column(TableId::TypeDef, rid + 1, list)?
        } else {
            self.metadata.row_count(member) + 1
        };

        Ok(MemberRange { start, end })
    }

    /// The MethodDef rows owned by type `full_name`.
    ///
    /// # Errors
    /// Returns [`crate::Error::LookupFailed`] if no type matches.
    pub fn methods_of(&self, full_name: &str) -> Result<MemberRange> {
        self.members(full_name, "MethodList", TableId::MethodDef)
    }

    /// The Field rows owned by type `full_name`.
    ///
    /// # Errors
    /// Returns [`crate::Error::LookupFailed`] if no type matches.
    pub fn fields_of(&self, full_name: &str) -> Result<MemberRange> {
        self.members(full_name, "FieldList", TableId::Field)
    }

    /// Name of MethodDef row `rid`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the row or its name can not be read.
    pub fn method_name(&self, rid: u32) -> Result<&'a str> {
        self.string_column(TableId::MethodDef, rid, "Name")
    }

    /// Signature blob payload of MethodDef row `rid`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the row or its signature can not be read.
    pub fn method_signature(&self, rid: u32) -> Result<&'a [u8]> {
        let index = self.column(TableId::MethodDef, rid, "Signature")?;
        self.metadata.blob(self.data, index)
    }

    /// RVA of the body of MethodDef row `rid`, 0 for methods without one.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the row does not exist.
    pub fn method_rva(&self, rid: u32) -> Result<u32> {
        self.column(TableId::MethodDef, rid, "RVA")
    }

    /// Every MethodDef row of `range` named `name`, in row order.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a row in the range can not be read.
    pub fn find_methods(&self, range: MemberRange, name: &str) -> Result<Vec<u32>> {
        let mut found = Vec::new();
        for rid in range.rids() {
            if self.method_name(rid)? == name {
                found.push(rid);
            }
        }
        Ok(found)
    }

    /// The first MethodDef row of `range` named `name`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a row in the range can not be read.
    pub fn find_method(&self, range: MemberRange, name: &str) -> Result<Option<u32>> {
        for rid in range.rids() {
            if self.method_name(rid)? == name {
                return Ok(Some(rid));
            }
        }
        Ok(None)
    }

    /// The first Field row of `range` named `name`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a row in the range can not be read.
    pub fn find_field(&self, range: MemberRange, name: &str) -> Result<Option<u32>> {
        for rid in range.rids() {
            if self.string_column(TableId::Field, rid, "Name")? == name {
                return Ok(Some(rid));
            }
        }
        Ok(None)
    }

    /// The first MethodDef row of `range` with the name and signature of row `rid`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a row can not be read.
    pub fn find_counterpart(&self, rid: u32, range: MemberRange) -> Result<Option<u32>> {
        let name = self.method_name(rid)?;
        let signature = self.method_signature(rid)?;

        for candidate in range.rids() {
            if self.method_name(candidate)? == name
                && self.method_signature(candidate)? == signature
            {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}
