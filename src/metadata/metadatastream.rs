//! The metadata directory of one image: root, "#~" tables stream and heaps.
//!
//! [`MetadataStream`] records where everything lives inside the image buffer, never the bytes
//! themselves. It can therefore be held alongside a mutable [`crate::Image`]; every accessor takes
//! the buffer it reads from.

use log::debug;
use strum::IntoEnumIterator;

use crate::{
    file::{io::slice_at, Image},
    metadata::{
        root::Root,
        streams::{Blob, Strings, TablesHeader},
        tables::{CodedIndexType, HeapKind, RowLayout, TableId, TableInfo, TableRowSet, MAX_TABLES},
    },
    Error::NotSupported,
    Result,
};

/// Location of one stream inside the image buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StreamRange {
    offset: usize,
    size: usize,
}

impl StreamRange {
    fn slice<'a>(&self, data: &'a [u8]) -> Result<&'a [u8]> {
        slice_at(data, self.offset, self.size)
    }
}

/// The parsed metadata directory of one image.
#[derive(Debug, Clone)]
pub struct MetadataStream {
    root: Root,
    root_offset: usize,
    header: TablesHeader,
    info: TableInfo,
    layouts: Vec<RowLayout>,
    bases: [usize; MAX_TABLES],
    strings: Option<StreamRange>,
    blobs: Option<StreamRange>,
}

impl MetadataStream {
    /// Parses the metadata directory named by the CLI header of `image`.
    ///
    /// # Errors
    /// See [`MetadataStream::parse`].
    pub fn from_image(image: &Image) -> Result<MetadataStream> {
        let cor20 = image.cor20();
        MetadataStream::parse(image, cor20.meta_data_rva, cor20.meta_data_size)
    }

    /// Parses the metadata directory at `rva`.
    ///
    /// Resolves the metadata root, reads the stream directory and the "#~" header, derives all
    /// index widths and computes the file offset of every present table. Tables are laid out back
    /// to back in ascending kind order directly after the row counts.
    ///
    /// # Arguments
    /// * `image` - The image holding the metadata
    /// * `rva` - RVA of the metadata root
    /// * `size` - Size of the metadata directory
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for the uncompressed "#-" tables stream,
    /// [`crate::Error::Malformed`] if the root is invalid, "#~" is missing or the tables do not
    /// fit into it, and [`crate::Error::OutOfBounds`] if the directory lies outside the image.
    pub fn parse(image: &Image, rva: u32, size: u32) -> Result<MetadataStream> {
        let root_offset = image.file_offset(rva)?;
        let data = image.data();
        let metadata = slice_at(data, root_offset, size as usize)?;
        let root = Root::read(metadata)?;

        if root.stream("#-").is_some() {
            return Err(NotSupported);
        }
        let Some(tables_stream) = root.stream("#~") else {
            return Err(malformed_error!("Metadata has no #~ stream"));
        };

        let range = |name: &str| {
            root.stream(name).map(|stream| StreamRange {
                offset: root_offset + stream.offset as usize,
                size: stream.size as usize,
            })
        };
        let tables = StreamRange {
            offset: root_offset + tables_stream.offset as usize,
            size: tables_stream.size as usize,
        };
        let strings = range("#Strings");
        let blobs = range("#Blob");

        let header = TablesHeader::from(tables.slice(data)?)?;
        let info = TableInfo::new(&header);
        let layouts: Vec<RowLayout> = TableId::iter()
            .map(|table| RowLayout::new(table, &info))
            .collect();

        let mut bases = [0usize; MAX_TABLES];
        let mut cursor = tables.offset + header.size();
        for table in TableId::iter() {
            let rows = info.row_count(table) as usize;
            if rows == 0 {
                continue;
            }

            let layout = &layouts[table as usize];
            bases[table as usize] = cursor;
            debug!(
                "Table {:?}: {} rows of {} bytes @ 0x{:X}",
                table,
                rows,
                layout.row_size(),
                cursor
            );

            let Some(end) = rows
                .checked_mul(layout.row_size())
                .and_then(|size| cursor.checked_add(size))
            else {
                return Err(malformed_error!("Table {:?} overflows", table));
            };
            cursor = end;
        }

        if cursor > tables.offset + tables.size {
            return Err(malformed_error!(
                "Tables end at 0x{:X}, beyond the #~ stream end 0x{:X}",
                cursor,
                tables.offset + tables.size
            ));
        }

        Ok(MetadataStream {
            root,
            root_offset,
            header,
            info,
            layouts,
            bases,
            strings,
            blobs,
        })
    }

    /// The metadata root and its stream directory.
    #[must_use]
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// File offset of the metadata root.
    #[must_use]
    pub fn root_offset(&self) -> usize {
        self.root_offset
    }

    /// The "#~" header.
    #[must_use]
    pub fn tables_header(&self) -> &TablesHeader {
        &self.header
    }

    /// The derived index widths.
    #[must_use]
    pub fn info(&self) -> &TableInfo {
        &self.info
    }

    /// Number of rows of `table`, zero if it is absent.
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.info.row_count(table)
    }

    /// Width of an index into `heap`.
    #[must_use]
    pub fn heap_index_width(&self, heap: HeapKind) -> u8 {
        self.info.heap_index_width(heap)
    }

    /// Width of a plain index into `table`.
    #[must_use]
    pub fn table_index_width(&self, table: TableId) -> u8 {
        self.info.table_index_width(table)
    }

    /// Width of a coded index of `kind`.
    #[must_use]
    pub fn coded_index_width(&self, kind: CodedIndexType) -> u8 {
        self.info.coded_index_width(kind)
    }

    /// The row layout of `table` in this file.
    #[must_use]
    pub fn layout(&self, table: TableId) -> &RowLayout {
        &self.layouts[table as usize]
    }

    /// A row set over `table`, positioned at its first row. Absent tables yield an empty set.
    #[must_use]
    pub fn table(&self, table: TableId) -> TableRowSet {
        TableRowSet::new(
            self.layouts[table as usize].clone(),
            self.bases[table as usize],
            self.info.row_count(table),
        )
    }

    /// Reads the identifier at `index` of the "#Strings" heap.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap is missing or the string is invalid, and
    /// [`crate::Error::OutOfBounds`] if `index` lies outside the heap.
    pub fn string<'a>(&self, data: &'a [u8], index: u32) -> Result<&'a str> {
        let Some(range) = &self.strings else {
            return Err(malformed_error!("Metadata has no #Strings stream"));
        };

        Strings::from(range.slice(data)?)?.get(index as usize)
    }

    /// Reads the payload of the blob at `index` of the "#Blob" heap, without its length prefix.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap is missing or the length prefix is
    /// invalid, and [`crate::Error::OutOfBounds`] if the blob lies outside the heap.
    pub fn blob<'a>(&self, data: &'a [u8], index: u32) -> Result<&'a [u8]> {
        let Some(range) = &self.blobs else {
            return Err(malformed_error!("Metadata has no #Blob stream"));
        };

        Blob::from(range.slice(data)?)?.get(index as usize)
    }
}
