//! Index widths of one loaded file.
//!
//! Every heap index, table index and coded index inside a table row is stored in either 2 or 4
//! bytes, depending on the heap size flags and row counts of the file at hand. [`TableInfo`]
//! derives these widths once from the "#~" header.

use strum::IntoEnumIterator;

use crate::metadata::{
    streams::TablesHeader,
    tables::{CodedIndexType, TableId, MAX_TABLES},
};

/// The heaps a table column can index into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapKind {
    /// "#Strings", heap size flag 0x01
    String,
    /// "#GUID", heap size flag 0x02
    Guid,
    /// "#Blob", heap size flag 0x04
    Blob,
}

impl HeapKind {
    /// The bit of the heap size flags selecting 4-byte indices for this heap.
    #[must_use]
    pub const fn flag(&self) -> u8 {
        match self {
            HeapKind::String => 0x01,
            HeapKind::Guid => 0x02,
            HeapKind::Blob => 0x04,
        }
    }
}

/// Row counts and heap size flags of one file, with the derived index widths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    rows: [u32; MAX_TABLES],
    heap_sizes: u8,
    coded_widths: Vec<u8>,
}

impl TableInfo {
    /// Derives all widths from a parsed tables stream header.
    #[must_use]
    pub fn new(header: &TablesHeader) -> TableInfo {
        Self::from_parts(header.row_counts, header.heap_sizes)
    }

    /// Derives all widths from raw row counts and heap size flags.
    #[must_use]
    pub fn from_parts(rows: [u32; MAX_TABLES], heap_sizes: u8) -> TableInfo {
        let mut info = TableInfo {
            rows,
            heap_sizes,
            coded_widths: Vec::new(),
        };

        info.coded_widths = CodedIndexType::iter()
            .map(|kind| info.calculate_coded_index_width(kind))
            .collect();
        info
    }

    /// Number of rows of `table`, zero for absent tables.
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.rows[table as usize]
    }

    /// The raw heap size flags.
    #[must_use]
    pub fn heap_sizes(&self) -> u8 {
        self.heap_sizes
    }

    /// 4 if the heap size flag of `heap` is set, else 2.
    #[must_use]
    pub fn heap_index_width(&self, heap: HeapKind) -> u8 {
        if self.heap_sizes & heap.flag() != 0 {
            4
        } else {
            2
        }
    }

    /// 4 if `table` holds `2^16` rows or more, else 2.
    #[must_use]
    pub fn table_index_width(&self, table: TableId) -> u8 {
        if self.rows[table as usize] >= 1 << 16 {
            4
        } else {
            2
        }
    }

    /// 4 if the largest candidate table of `kind` holds `2^(16 - tag_bits)` rows or more, else 2.
    #[must_use]
    pub fn coded_index_width(&self, kind: CodedIndexType) -> u8 {
        self.coded_widths[kind as usize]
    }

    fn calculate_coded_index_width(&self, kind: CodedIndexType) -> u8 {
        let max_rows = kind
            .tables()
            .map(|table| self.rows[table as usize])
            .max()
            .unwrap_or(0);

        if u64::from(max_rows) >= 1u64 << (16 - kind.tag_bits()) {
            4
        } else {
            2
        }
    }
}
