//! String Heap (`#Strings`)
//!
//! Holds the UTF-8 identifiers (type, namespace, member names) referenced by the metadata tables.
//!
//! # Reference
//! - [ECMA-335 II.24.2.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use std::ffi::CStr;

use crate::{Error::OutOfBounds, Result};

/// '#Strings' holds the NUL terminated identifiers which are referenced from the metadata tables.
/// The first entry is always the empty string.
///
/// # Examples
///
/// ```rust
/// use dotpatch::metadata::streams::Strings;
/// let data = &[0u8, b'F', b'o', b'o', 0u8];
/// let strings = Strings::from(data)?;
/// assert_eq!(strings.get(1)?, "Foo");
/// assert_eq!(strings.get(0)?, "");
/// # Ok::<(), dotpatch::Error>(())
/// ```
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Create a `Strings` view over the heap bytes
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap is empty or does not start with a NUL byte
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.first() != Some(&0) {
            return Err(malformed_error!("Provided #Strings heap is empty"));
        }

        Ok(Strings { data })
    }

    /// Get the identifier starting at `index`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the index lies outside the heap, or
    /// [`crate::Error::Malformed`] if the string is unterminated or invalid UTF-8
    pub fn get(&self, index: usize) -> Result<&'a str> {
        let Some(tail) = self.data.get(index..) else {
            return Err(OutOfBounds);
        };

        CStr::from_bytes_until_nul(tail)
            .ok()
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| malformed_error!("Invalid string at index - {}", index))
    }
}
