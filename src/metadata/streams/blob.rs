//! Blob Heap (`#Blob`)
//!
//! Stores signatures and other binary data referenced by the metadata tables. Every entry is
//! prefixed with its compressed length.
//!
//! # Reference
//! - [ECMA-335 II.24.2.4](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::io::{read_compressed_uint_at, slice_at},
    Error::OutOfBounds,
    Result,
};

/// '#Blob' points to streams of bytes. Each valid blob is referenced by a table column and
/// carries its size in front of its data:
///
/// * `0bbbbbbb` - the rest of the blob contains `bbbbbbb` bytes
/// * `10bbbbbb x` - the rest of the blob contains `(bbbbbb << 8) + x` bytes
/// * `110bbbbb x y z` - the rest of the blob contains `(bbbbb << 24) + (x << 16) + (y << 8) + z` bytes
///
/// # Examples
///
/// ```rust
/// use dotpatch::metadata::streams::Blob;
/// let data = &[0u8, 0x03, 0x41, 0x42, 0x43];
/// let blob = Blob::from(data)?;
/// assert_eq!(blob.get(1)?, &[0x41, 0x42, 0x43]);
/// # Ok::<(), dotpatch::Error>(())
/// ```
pub struct Blob<'a> {
    data: &'a [u8],
}

impl<'a> Blob<'a> {
    /// Create a `Blob` view over the heap bytes
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap is empty or does not start with a NUL byte
    pub fn from(data: &'a [u8]) -> Result<Blob<'a>> {
        if data.first() != Some(&0) {
            return Err(malformed_error!("Invalid memory for #Blob heap"));
        }

        Ok(Blob { data })
    }

    /// Get the payload of the blob starting at `index`, without its length prefix
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the index or the declared length lies outside the
    /// heap, or [`crate::Error::Malformed`] if the length prefix is invalid
    pub fn get(&self, index: usize) -> Result<&'a [u8]> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        let mut offset = index;
        let len = read_compressed_uint_at(self.data, &mut offset)?;
        slice_at(self.data, offset, len as usize)
    }
}
