//! Data-driven row layouts for every table kind.
//!
//! Each table kind is described by an ordered list of [`FieldSpec`]s in ECMA-335 column order.
//! A [`RowLayout`] resolves that list against the widths of one file into byte offsets and a row
//! size. Field access elsewhere in the crate is a single generic lookup by column name.
//!
//! # Reference
//! - [ECMA-335 II.22](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    metadata::tables::{CodedIndexType, HeapKind, TableId, TableInfo},
    Result,
};

/// The storage class of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A constant of 1, 2 or 4 bytes
    Fixed(u8),
    /// An index into a heap
    Heap(HeapKind),
    /// A 1-based row index into one table
    Table(TableId),
    /// A coded index
    Coded(CodedIndexType),
}

/// One column of a table schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Column name, as used by ECMA-335
    pub name: &'static str,
    /// Storage class
    pub kind: FieldKind,
}

macro_rules! fixed {
    ($name:literal, $width:literal) => {
        FieldSpec {
            name: $name,
            kind: FieldKind::Fixed($width),
        }
    };
}

macro_rules! heap {
    ($name:literal, $heap:ident) => {
        FieldSpec {
            name: $name,
            kind: FieldKind::Heap(HeapKind::$heap),
        }
    };
}

macro_rules! table {
    ($name:literal, $table:ident) => {
        FieldSpec {
            name: $name,
            kind: FieldKind::Table(TableId::$table),
        }
    };
}

macro_rules! coded {
    ($name:literal, $kind:ident) => {
        FieldSpec {
            name: $name,
            kind: FieldKind::Coded(CodedIndexType::$kind),
        }
    };
}

use TableId as T;

/// The ordered columns of `id`.
#[must_use]
pub fn schema(id: TableId) -> &'static [FieldSpec] {
    match id {
        T::Module => &[
            fixed!("Generation", 2),
            heap!("Name", String),
            heap!("Mvid", Guid),
            heap!("EncId", Guid),
            heap!("EncBaseId", Guid),
        ],
        T::TypeRef => &[
            coded!("ResolutionScope", ResolutionScope),
            heap!("TypeName", String),
            heap!("TypeNamespace", String),
        ],
        T::TypeDef => &[
            fixed!("Flags", 4),
            heap!("TypeName", String),
            heap!("TypeNamespace", String),
            coded!("Extends", TypeDefOrRef),
            table!("FieldList", Field),
            table!("MethodList", MethodDef),
        ],
        T::FieldPtr => &[table!("Field", Field)],
        T::Field => &[fixed!("Flags", 2), heap!("Name", String), heap!("Signature", Blob)],
        T::MethodPtr => &[table!("Method", MethodDef)],
        T::MethodDef => &[
            fixed!("RVA", 4),
            fixed!("ImplFlags", 2),
            fixed!("Flags", 2),
            heap!("Name", String),
            heap!("Signature", Blob),
            table!("ParamList", Param),
        ],
        T::ParamPtr => &[table!("Param", Param)],
        T::Param => &[fixed!("Flags", 2), fixed!("Sequence", 2), heap!("Name", String)],
        T::InterfaceImpl => &[
            table!("Class", TypeDef),
            coded!("Interface", TypeDefOrRef),
        ],
        T::MemberRef => &[
            coded!("Class", MemberRefParent),
            heap!("Name", String),
            heap!("Signature", Blob),
        ],
        T::Constant => &[
            fixed!("Type", 1),
            fixed!("Padding", 1),
            coded!("Parent", HasConstant),
            heap!("Value", Blob),
        ],
        T::CustomAttribute => &[
            coded!("Parent", HasCustomAttribute),
            coded!("Type", CustomAttributeType),
            heap!("Value", Blob),
        ],
        T::FieldMarshal => &[
            coded!("Parent", HasFieldMarshal),
            heap!("NativeType", Blob),
        ],
        T::DeclSecurity => &[
            fixed!("Action", 2),
            coded!("Parent", HasDeclSecurity),
            heap!("PermissionSet", Blob),
        ],
        T::ClassLayout => &[
            fixed!("PackingSize", 2),
            fixed!("ClassSize", 4),
            table!("Parent", TypeDef),
        ],
        T::FieldLayout => &[fixed!("Offset", 4), table!("Field", Field)],
        T::StandAloneSig => &[heap!("Signature", Blob)],
        T::EventMap => &[table!("Parent", TypeDef), table!("EventList", Event)],
        T::EventPtr => &[table!("Event", Event)],
        T::Event => &[
            fixed!("EventFlags", 2),
            heap!("Name", String),
            coded!("EventType", TypeDefOrRef),
        ],
        T::PropertyMap => &[
            table!("Parent", TypeDef),
            table!("PropertyList", Property),
        ],
        T::PropertyPtr => &[table!("Property", Property)],
        T::Property => &[fixed!("Flags", 2), heap!("Name", String), heap!("Type", Blob)],
        T::MethodSemantics => &[
            fixed!("Semantics", 2),
            table!("Method", MethodDef),
            coded!("Association", HasSemantics),
        ],
        T::MethodImpl => &[
            table!("Class", TypeDef),
            coded!("MethodBody", MethodDefOrRef),
            coded!("MethodDeclaration", MethodDefOrRef),
        ],
        T::ModuleRef => &[heap!("Name", String)],
        T::TypeSpec => &[heap!("Signature", Blob)],
        T::ImplMap => &[
            fixed!("MappingFlags", 2),
            coded!("MemberForwarded", MemberForwarded),
            heap!("ImportName", String),
            table!("ImportScope", ModuleRef),
        ],
        T::FieldRVA => &[fixed!("RVA", 4), table!("Field", Field)],
        T::EncLog => &[fixed!("Token", 4), fixed!("FuncCode", 4)],
        T::EncMap => &[fixed!("Token", 4)],
        T::Assembly => &[
            fixed!("HashAlgId", 4),
            fixed!("MajorVersion", 2),
            fixed!("MinorVersion", 2),
            fixed!("BuildNumber", 2),
            fixed!("RevisionNumber", 2),
            fixed!("Flags", 4),
            heap!("PublicKey", Blob),
            heap!("Name", String),
            heap!("Culture", String),
        ],
        T::AssemblyProcessor => &[fixed!("Processor", 4)],
        T::AssemblyOS => &[
            fixed!("OSPlatformID", 4),
            fixed!("OSMajorVersion", 4),
            fixed!("OSMinorVersion", 4),
        ],
        T::AssemblyRef => &[
            fixed!("MajorVersion", 2),
            fixed!("MinorVersion", 2),
            fixed!("BuildNumber", 2),
            fixed!("RevisionNumber", 2),
            fixed!("Flags", 4),
            heap!("PublicKeyOrToken", Blob),
            heap!("Name", String),
            heap!("Culture", String),
            heap!("HashValue", Blob),
        ],
        T::AssemblyRefProcessor => &[
            fixed!("Processor", 4),
            table!("AssemblyRef", AssemblyRef),
        ],
        T::AssemblyRefOS => &[
            fixed!("OSPlatformID", 4),
            fixed!("OSMajorVersion", 4),
            fixed!("OSMinorVersion", 4),
            table!("AssemblyRef", AssemblyRef),
        ],
        T::File => &[fixed!("Flags", 4), heap!("Name", String), heap!("HashValue", Blob)],
        T::ExportedType => &[
            fixed!("Flags", 4),
            fixed!("TypeDefId", 4),
            heap!("TypeName", String),
            heap!("TypeNamespace", String),
            coded!("Implementation", Implementation),
        ],
        T::ManifestResource => &[
            fixed!("Offset", 4),
            fixed!("Flags", 4),
            heap!("Name", String),
            coded!("Implementation", Implementation),
        ],
        T::NestedClass => &[
            table!("NestedClass", TypeDef),
            table!("EnclosingClass", TypeDef),
        ],
        T::GenericParam => &[
            fixed!("Number", 2),
            fixed!("Flags", 2),
            coded!("Owner", TypeOrMethodDef),
            heap!("Name", String),
        ],
        T::MethodSpec => &[
            coded!("Method", MethodDefOrRef),
            heap!("Instantiation", Blob),
        ],
        T::GenericParamConstraint => &[
            table!("Owner", GenericParam),
            coded!("Constraint", TypeDefOrRef),
        ],
    }
}

/// A resolved column: where it starts within a row and how wide it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Column name
    pub name: &'static str,
    /// Byte offset from the start of the row
    pub offset: usize,
    /// Width in bytes: 1, 2 or 4
    pub width: u8,
}

/// The row layout of one table kind under the widths of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLayout {
    table: TableId,
    columns: Vec<Column>,
    row_size: usize,
}

impl RowLayout {
    /// Resolves the schema of `table` against `info`.
    #[must_use]
    pub fn new(table: TableId, info: &TableInfo) -> RowLayout {
        let mut columns = Vec::with_capacity(schema(table).len());
        let mut offset = 0;

        for spec in schema(table) {
            let width = match spec.kind {
                FieldKind::Fixed(width) => width,
                FieldKind::Heap(heap) => info.heap_index_width(heap),
                FieldKind::Table(target) => info.table_index_width(target),
                FieldKind::Coded(kind) => info.coded_index_width(kind),
            };

            columns.push(Column {
                name: spec.name,
                offset,
                width,
            });
            offset += usize::from(width);
        }

        RowLayout {
            table,
            columns,
            row_size: offset,
        }
    }

    /// The table kind this layout describes.
    #[must_use]
    pub fn table(&self) -> TableId {
        self.table
    }

    /// Size of one row in bytes.
    #[must_use]
    pub fn row_size(&self) -> usize {
        self.row_size
    }

    /// The resolved columns in schema order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Looks up a column by name.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the table has no column of that name.
    pub fn column(&self, name: &str) -> Result<Column> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .copied()
            .ok_or_else(|| malformed_error!("Table {:?} has no column {}", self.table, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::MAX_TABLES;
    use strum::IntoEnumIterator;

    fn info(tables: &[(TableId, u32)], heap_sizes: u8) -> TableInfo {
        let mut rows = [0u32; MAX_TABLES];
        for (table, count) in tables {
            rows[*table as usize] = *count;
        }
        TableInfo::from_parts(rows, heap_sizes)
    }

    #[test]
    fn small_sizes() {
        let info = info(&[], 0);
        let expected = [
            (T::Module, 10),
            (T::TypeRef, 6),
            (T::TypeDef, 14),
            (T::FieldPtr, 2),
            (T::Field, 6),
            (T::MethodPtr, 2),
            (T::MethodDef, 14),
            (T::ParamPtr, 2),
            (T::Param, 6),
            (T::InterfaceImpl, 4),
            (T::MemberRef, 6),
            (T::Constant, 6),
            (T::CustomAttribute, 6),
            (T::FieldMarshal, 4),
            (T::DeclSecurity, 6),
            (T::ClassLayout, 8),
            (T::FieldLayout, 6),
            (T::StandAloneSig, 2),
            (T::EventMap, 4),
            (T::EventPtr, 2),
            (T::Event, 6),
            (T::PropertyMap, 4),
            (T::PropertyPtr, 2),
            (T::Property, 6),
            (T::MethodSemantics, 6),
            (T::MethodImpl, 6),
            (T::ModuleRef, 2),
            (T::TypeSpec, 2),
            (T::ImplMap, 8),
            (T::FieldRVA, 6),
            (T::EncLog, 8),
            (T::EncMap, 4),
            (T::Assembly, 22),
            (T::AssemblyProcessor, 4),
            (T::AssemblyOS, 12),
            (T::AssemblyRef, 20),
            (T::AssemblyRefProcessor, 6),
            (T::AssemblyRefOS, 14),
            (T::File, 8),
            (T::ExportedType, 14),
            (T::ManifestResource, 12),
            (T::NestedClass, 4),
            (T::GenericParam, 8),
            (T::MethodSpec, 4),
            (T::GenericParamConstraint, 4),
        ];

        assert_eq!(expected.len(), TableId::iter().count());
        for (table, size) in expected {
            assert_eq!(RowLayout::new(table, &info).row_size(), size, "{table:?}");
        }
    }

    #[test]
    fn methoddef_offsets() {
        let layout = RowLayout::new(T::MethodDef, &info(&[], 0x01));
        assert_eq!(layout.column("RVA").unwrap().offset, 0);
        assert_eq!(layout.column("ImplFlags").unwrap().offset, 4);
        assert_eq!(layout.column("Flags").unwrap().offset, 6);
        assert_eq!(layout.column("Name").unwrap(), Column { name: "Name", offset: 8, width: 4 });
        assert_eq!(layout.column("Signature").unwrap().offset, 12);
        assert_eq!(layout.column("ParamList").unwrap().offset, 14);
        assert_eq!(layout.row_size(), 16);
        assert!(layout.column("Bogus").is_err());
    }

    #[test]
    fn wide_heaps_never_shrink_rows() {
        let narrow = info(&[], 0);
        for flags in [0x01, 0x02, 0x04, 0x07] {
            let wide = info(&[], flags);
            for table in TableId::iter() {
                assert!(
                    RowLayout::new(table, &wide).row_size() >= RowLayout::new(table, &narrow).row_size(),
                    "{table:?} with heap flags {flags:#x}"
                );
            }
        }

        let wide = info(&[], 0x07);
        assert_eq!(RowLayout::new(T::Module, &wide).row_size(), 18);
        assert_eq!(RowLayout::new(T::Assembly, &wide).row_size(), 28);
    }

    #[test]
    fn wide_indices() {
        let info = info(&[(T::Param, 0x1_0000), (T::TypeRef, 0x4000)], 0);
        let methods = RowLayout::new(T::MethodDef, &info);
        assert_eq!(methods.column("ParamList").unwrap().width, 4);
        assert_eq!(methods.row_size(), 16);

        let types = RowLayout::new(T::TypeDef, &info);
        assert_eq!(types.column("Extends").unwrap().width, 4);
        assert_eq!(types.row_size(), 16);
    }
}
