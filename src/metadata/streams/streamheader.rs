//! Stream headers of the metadata root.
//!
//! Each entry of the stream directory names one metadata stream and gives its offset and size
//! relative to the start of the metadata root.
//!
//! # Reference
//! - [ECMA-335 II.24.2.2](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::io::read_le_at,
    Error::OutOfBounds,
    Result,
};

/// Stream names accepted in the stream directory
pub const KNOWN_STREAMS: [&str; 8] = [
    "#~", "#-", "#Strings", "#US", "#GUID", "#Blob", "#Pdb", "#JTD",
];

/// A stream header provides the name, the position and the length of a particular table or heap.
/// The length of the structure is not fixed but depends on its name (a NUL terminated string,
/// padded to a 4 byte boundary).
///
/// # Examples
///
/// ```rust
/// use dotpatch::metadata::streams::StreamHeader;
///
/// let header = StreamHeader::from(&[0x6C, 0, 0, 0, 0x10, 0, 0, 0, b'#', b'~', 0, 0])?;
/// assert_eq!(header.name, "#~");
/// assert_eq!(header.header_size(), 12);
/// # Ok::<(), dotpatch::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// Offset of the stream, relative to the metadata root
    pub offset: u32,
    /// Size of this stream in bytes, shall be a multiple of 4
    pub size: u32,
    /// Name of the stream, at most 32 characters
    pub name: String,
}

impl StreamHeader {
    /// Create a `StreamHeader` object from a sequence of bytes
    ///
    /// # Arguments
    /// * `data` - The byte slice starting at the stream header
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the data is too short, or
    /// [`crate::Error::Malformed`] if the name is unterminated or unknown.
    pub fn from(data: &[u8]) -> Result<StreamHeader> {
        if data.len() < 9 {
            return Err(OutOfBounds);
        }

        let mut offset = 0;
        let stream_offset = read_le_at::<u32>(data, &mut offset)?;
        let size = read_le_at::<u32>(data, &mut offset)?;

        let name_bytes = &data[8..data.len().min(8 + 33)];
        let Some(end) = name_bytes.iter().position(|b| *b == 0) else {
            return Err(malformed_error!("Unterminated stream header name"));
        };
        let name = String::from_utf8_lossy(&name_bytes[..end]).into_owned();

        if !KNOWN_STREAMS.contains(&name.as_str()) {
            return Err(malformed_error!("Invalid stream header name - {}", name));
        }

        Ok(StreamHeader {
            offset: stream_offset,
            size,
            name,
        })
    }

    /// Size of this header in the stream directory, including the padded name.
    #[must_use]
    pub fn header_size(&self) -> usize {
        8 + (self.name.len() + 1).div_ceil(4) * 4
    }
}
