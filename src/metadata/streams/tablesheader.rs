//! The header of the compressed tables stream ("#~").
//!
//! The header announces which heaps use 4-byte indices, which of the 64 table kinds are present
//! and how many rows each present table holds. The rows of all present tables follow the header
//! back to back, in ascending kind order.
//!
//! # Reference
//! - [ECMA-335 II.24.2.6](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::io::read_le_at,
    metadata::tables::MAX_TABLES,
    Error::OutOfBounds,
    Result,
};

/// Size of the fixed part of the header, in front of the row counts
pub const TABLES_HEADER_FIXED_SIZE: usize = 24;

/// The parsed "#~" stream header.
///
/// # Examples
///
/// ```rust
/// use dotpatch::metadata::streams::TablesHeader;
///
/// #[rustfmt::skip]
/// let data = [
///     0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01, 0x01,
///     0x41, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
///     0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
///     0x01, 0x00, 0x00, 0x00,
///     0x03, 0x00, 0x00, 0x00,
/// ];
/// let header = TablesHeader::from(&data)?;
/// assert_eq!(header.row_counts[0x06], 3);
/// assert_eq!(header.size(), 32);
/// # Ok::<(), dotpatch::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablesHeader {
    /// Reserved, always 0
    pub reserved: u32,
    /// Major version of the table schema, 2 for ECMA-335
    pub major_version: u8,
    /// Minor version of the table schema
    pub minor_version: u8,
    /// Heap size flags: 0x01 "#Strings", 0x02 "#GUID", 0x04 "#Blob" use 4-byte indices
    pub heap_sizes: u8,
    /// Bitmap of present tables, bit `n` for table kind `n`
    pub valid: u64,
    /// Bitmap of sorted tables
    pub sorted: u64,
    /// Row count per table kind, zero for every kind whose valid bit is clear
    pub row_counts: [u32; MAX_TABLES],
}

impl TablesHeader {
    /// Parses the header at the start of the "#~" stream.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the data is shorter than the header, or
    /// [`crate::Error::Malformed`] if no table is present.
    pub fn from(data: &[u8]) -> Result<TablesHeader> {
        if data.len() < TABLES_HEADER_FIXED_SIZE {
            return Err(OutOfBounds);
        }

        let mut offset = 0;
        let reserved = read_le_at::<u32>(data, &mut offset)?;
        let major_version = read_le_at::<u8>(data, &mut offset)?;
        let minor_version = read_le_at::<u8>(data, &mut offset)?;
        let heap_sizes = read_le_at::<u8>(data, &mut offset)?;
        offset += 1;
        let valid = read_le_at::<u64>(data, &mut offset)?;
        let sorted = read_le_at::<u64>(data, &mut offset)?;

        if valid == 0 {
            return Err(malformed_error!("No valid rows in any of the tables"));
        }

        let mut row_counts = [0u32; MAX_TABLES];
        for (kind, count) in row_counts.iter_mut().enumerate() {
            if valid & (1 << kind) != 0 {
                *count = read_le_at::<u32>(data, &mut offset)?;
            }
        }

        Ok(TablesHeader {
            reserved,
            major_version,
            minor_version,
            heap_sizes,
            valid,
            sorted,
            row_counts,
        })
    }

    /// Size of the header including the row counts; the first table row starts here.
    #[must_use]
    pub fn size(&self) -> usize {
        TABLES_HEADER_FIXED_SIZE + self.valid.count_ones() as usize * 4
    }

    /// Number of present tables.
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.valid.count_ones()
    }

    /// `true` if the valid bit for table kind `kind` is set.
    #[must_use]
    pub fn has_table(&self, kind: usize) -> bool {
        kind < MAX_TABLES && self.valid & (1 << kind) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rustfmt::skip]
    const HEADER: [u8; 40] = [
        0x00, 0x00, 0x00, 0x00,
        0x02, 0x00,
        0x05,                                           // #Strings and #Blob wide
        0x01,
        0x55, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // Module, TypeDef, Field, MethodDef
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x01, 0x00, 0x00, 0x00,
        0x03, 0x00, 0x00, 0x00,
        0x04, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x01, 0x00,
    ];

    #[test]
    fn crafted() {
        let header = TablesHeader::from(&HEADER).unwrap();

        assert_eq!(header.major_version, 2);
        assert_eq!(header.heap_sizes, 0x05);
        assert_eq!(header.table_count(), 4);
        assert_eq!(header.size(), 40);
        assert_eq!(header.row_counts[0x00], 1);
        assert_eq!(header.row_counts[0x01], 0);
        assert_eq!(header.row_counts[0x02], 3);
        assert_eq!(header.row_counts[0x04], 4);
        assert_eq!(header.row_counts[0x06], 0x1_0000);
        assert!(header.has_table(0x06));
        assert!(!header.has_table(0x08));
        assert!(!header.has_table(64));
    }

    #[test]
    fn invalid() {
        assert!(matches!(TablesHeader::from(&HEADER[..20]), Err(OutOfBounds)));
        assert!(matches!(TablesHeader::from(&HEADER[..36]), Err(OutOfBounds)));

        let mut empty = HEADER;
        empty[8] = 0;
        assert!(matches!(
            TablesHeader::from(&empty),
            Err(crate::Error::Malformed { .. })
        ));
    }
}
