//! Seekable access to the rows of one table.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::tables::{layout::Column, RowLayout, TableId},
    Error::OutOfBounds,
    Result,
};

/// A cursor over the rows of one table inside an image buffer.
///
/// The row set does not borrow the image; every accessor takes the buffer it operates on, so a
/// row set can be used to read from and write to the same image in turn. Row indices used by the
/// cursor are 0-based; metadata tokens and table index columns are 1-based.
///
/// # Examples
///
/// ```rust,no_run
/// use dotpatch::{metadata::{tables::TableId, MetadataStream}, Image};
/// use std::path::Path;
///
/// let mut image = Image::from_file(Path::new("Game.dll"))?;
/// let metadata = MetadataStream::from_image(&image)?;
///
/// let mut methods = metadata.table(TableId::MethodDef);
/// if methods.move_to(2) {
///     methods.set(image.data_mut(), "RVA", 0x2050)?;
/// }
/// # Ok::<(), dotpatch::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct TableRowSet {
    layout: RowLayout,
    base: usize,
    rows: u32,
    index: u32,
}

impl TableRowSet {
    /// Create a row set over `rows` rows starting at file offset `base`, positioned at the first row.
    #[must_use]
    pub fn new(layout: RowLayout, base: usize, rows: u32) -> TableRowSet {
        TableRowSet {
            layout,
            base,
            rows,
            index: 0,
        }
    }

    /// The table kind of this row set.
    #[must_use]
    pub fn table(&self) -> TableId {
        self.layout.table()
    }

    /// The resolved row layout.
    #[must_use]
    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.rows
    }

    /// Size of one row in bytes.
    #[must_use]
    pub fn row_size(&self) -> usize {
        self.layout.row_size()
    }

    /// File offset of the first row.
    #[must_use]
    pub fn base(&self) -> usize {
        self.base
    }

    /// The current 0-based row index; equals [`TableRowSet::row_count`] at the end.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The 1-based row number of the current row, as used in tokens and index columns.
    #[must_use]
    pub fn rid(&self) -> u32 {
        self.index + 1
    }

    /// File offset of the current row.
    #[must_use]
    pub fn position(&self) -> usize {
        self.base + self.index as usize * self.layout.row_size()
    }

    /// Seeks to the 0-based row `index`. Returns `false` and leaves the cursor in place if
    /// `index >= row_count`.
    pub fn move_to(&mut self, index: u32) -> bool {
        if index >= self.rows {
            return false;
        }

        self.index = index;
        true
    }

    /// Seeks to the 1-based row `rid`. Returns `false` if no such row exists.
    pub fn move_to_rid(&mut self, rid: u32) -> bool {
        rid != 0 && self.move_to(rid - 1)
    }

    /// Seeks to the first row.
    pub fn move_to_first(&mut self) {
        self.index = 0;
    }

    /// Seeks to the last row. Returns `false` for an empty table.
    pub fn move_to_last(&mut self) -> bool {
        if self.rows == 0 {
            return false;
        }

        self.index = self.rows - 1;
        true
    }

    /// Advances by one row unless already at the end. Returns `true` if the cursor is on a row
    /// afterwards.
    pub fn move_to_next(&mut self) -> bool {
        if self.index < self.rows {
            self.index += 1;
        }

        self.index < self.rows
    }

    /// Seeks to the end sentinel, one past the last row.
    pub fn move_to_end(&mut self) {
        self.index = self.rows;
    }

    /// `true` if the cursor is on the first row of a non-empty table.
    #[must_use]
    pub fn is_first(&self) -> bool {
        self.rows > 0 && self.index == 0
    }

    /// `true` if the cursor is on the last row.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.rows > 0 && self.index == self.rows - 1
    }

    /// `true` if the cursor is past the last row.
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.index >= self.rows
    }

    fn locate(&self, name: &str) -> Result<(Column, usize)> {
        if self.is_end() {
            return Err(OutOfBounds);
        }

        let column = self.layout.column(name)?;
        Ok((column, self.position() + column.offset))
    }

    /// Reads column `name` of the current row.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at the end sentinel or if the row lies outside
    /// `data`, and [`crate::Error::Malformed`] if the table has no such column.
    pub fn get(&self, data: &[u8], name: &str) -> Result<u32> {
        let (column, mut offset) = self.locate(name)?;
        match column.width {
            1 => Ok(u32::from(read_le_at::<u8>(data, &mut offset)?)),
            width => read_le_at_dyn(data, &mut offset, width == 4),
        }
    }

    /// Writes column `name` of the current row.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at the end sentinel or if the row lies outside
    /// `data`, and [`crate::Error::Malformed`] if the table has no such column or `value` does not
    /// fit the column width.
    pub fn set(&self, data: &mut [u8], name: &str, value: u32) -> Result<()> {
        let (column, mut offset) = self.locate(name)?;
        match column.width {
            1 => {
                let Ok(narrow) = u8::try_from(value) else {
                    return Err(malformed_error!(
                        "Value 0x{:X} does not fit column {}",
                        value,
                        name
                    ));
                };
                write_le_at(data, &mut offset, narrow)
            }
            width => write_le_at_dyn(data, &mut offset, value, width == 4),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::{TableInfo, MAX_TABLES};

    fn methods(rows: u32) -> TableRowSet {
        let mut counts = [0u32; MAX_TABLES];
        counts[TableId::MethodDef as usize] = rows;
        let info = TableInfo::from_parts(counts, 0);
        TableRowSet::new(RowLayout::new(TableId::MethodDef, &info), 4, rows)
    }

    #[rustfmt::skip]
    const DATA: [u8; 32] = [
        0xEE, 0xEE, 0xEE, 0xEE,
        0x50, 0x20, 0x00, 0x00, 0x00, 0x00, 0x86, 0x00, 0x0A, 0x00, 0x01, 0x00, 0x01, 0x00,
        0x60, 0x20, 0x00, 0x00, 0x00, 0x00, 0x96, 0x00, 0x0E, 0x00, 0x05, 0x00, 0x01, 0x00,
    ];

    #[test]
    fn navigation() {
        let mut set = methods(2);
        assert!(set.is_first());
        assert!(!set.is_end());
        assert_eq!(set.rid(), 1);
        assert_eq!(set.position(), 4);

        assert!(set.move_to_next());
        assert!(set.is_last());
        assert_eq!(set.position(), 18);

        assert!(!set.move_to_next());
        assert!(set.is_end());
        assert_eq!(set.index(), 2);
        assert!(!set.move_to_next());
        assert_eq!(set.index(), 2);

        assert!(!set.move_to(2));
        assert_eq!(set.index(), 2);
        assert!(set.move_to(0));
        assert!(set.move_to_last());
        assert_eq!(set.index(), 1);
        assert!(set.move_to_rid(1));
        assert_eq!(set.index(), 0);
        assert!(!set.move_to_rid(0));
        assert!(!set.move_to_rid(3));

        set.move_to_end();
        assert!(set.is_end());
        set.move_to_first();
        assert_eq!(set.index(), 0);
    }

    #[test]
    fn empty_table() {
        let mut set = methods(0);
        assert!(set.is_end());
        assert!(!set.is_first());
        assert!(!set.move_to_last());
        assert!(!set.move_to(0));
        assert!(!set.move_to_next());
    }

    #[test]
    fn get_and_set() {
        let mut data = DATA;
        let mut set = methods(2);

        assert_eq!(set.get(&data, "RVA").unwrap(), 0x2050);
        assert_eq!(set.get(&data, "Flags").unwrap(), 0x86);
        assert_eq!(set.get(&data, "Name").unwrap(), 0x0A);
        set.move_to_next();
        assert_eq!(set.get(&data, "RVA").unwrap(), 0x2060);
        assert_eq!(set.get(&data, "Signature").unwrap(), 5);

        set.set(&mut data, "RVA", 0x4000).unwrap();
        assert_eq!(&data[18..22], &[0x00, 0x40, 0x00, 0x00]);
        assert_eq!(&data[..18], &DATA[..18]);
        assert_eq!(&data[22..], &DATA[22..]);

        assert!(set.set(&mut data, "Name", 0x1_0000).is_err());
        assert!(set.get(&data, "Bogus").is_err());

        set.move_to_end();
        assert!(matches!(set.get(&data, "RVA"), Err(OutOfBounds)));
        assert!(matches!(set.set(&mut data, "RVA", 1), Err(OutOfBounds)));
    }

    #[test]
    fn row_outside_buffer() {
        let mut set = methods(3);
        let mut short = DATA;
        assert!(set.move_to(2));
        assert!(matches!(set.get(&short, "RVA"), Err(OutOfBounds)));
        assert!(matches!(set.set(&mut short, "RVA", 1), Err(OutOfBounds)));
    }
}
