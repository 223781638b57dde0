//! Metadata root header and stream directory.
//!
//! The metadata root is the entry point of the CLI metadata. It carries the "BSJB" signature, the
//! runtime version string and the stream directory, which locates the "#~", "#Strings", "#US",
//! "#GUID" and "#Blob" streams relative to the start of the root.
//!
//! # Example
//!
//! ```rust
//! use dotpatch::metadata::root::Root;
//! let root = Root::read(&[
//!            0x42, 0x53, 0x4A, 0x42,
//!            0x01, 0x00,
//!            0x01, 0x00,
//!            0x00, 0x00, 0x00, 0x00,
//!            0x04, 0x00, 0x00, 0x00,
//!            b'v', b'4', 0x00, 0x00,
//!            0x00, 0x00,
//!            0x01, 0x00,
//!            0x24, 0x00, 0x00, 0x00, // StreamHeader
//!            0x04, 0x00, 0x00, 0x00,
//!            0x23, 0x7E, 0x00, 0x00,
//!            0x00, 0x00, 0x00, 0x00,
//!        ])?;
//! assert_eq!(root.version, "v4");
//! assert!(root.stream("#~").is_some());
//! # Ok::<(), dotpatch::Error>(())
//! ```
//!
//! # References
//!
//! - [ECMA-335 II.24.2.1: Metadata root](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::io::read_le_at,
    metadata::streams::StreamHeader,
    Error::OutOfBounds,
    Result,
};

/// The MAGIC value indicating the CIL header
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// Size of the fixed fields in front of the version string
const ROOT_FIXED_SIZE: usize = 16;

/// The header of the present metadata.
///
/// Declared once at load and immutable thereafter.
#[derive(Debug, Clone)]
pub struct Root {
    /// Magic signature for physical metadata: 0x424A5342
    pub signature: u32,
    /// `MajorVersion`
    pub major_version: u16,
    /// `MinorVersion`
    pub minor_version: u16,
    /// Always 0
    pub reserved: u32,
    /// Number of bytes allocated to hold the version string
    pub length: u32,
    /// Runtime version, without its NUL padding
    pub version: String,
    /// Reserved, always 0
    pub flags: u16,
    /// Number of Streams
    pub stream_number: u16,
    /// Streams
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Reads a [`Root`] metadata header from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The metadata block, starting at the root
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the data is too short or a stream lies outside of
    /// it, and [`crate::Error::Malformed`] if the signature or stream directory is invalid.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < ROOT_FIXED_SIZE + 4 {
            return Err(OutOfBounds);
        }

        let mut offset = 0;
        let signature = read_le_at::<u32>(data, &mut offset)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - 0x{:08X}",
                signature
            ));
        }

        let major_version = read_le_at::<u16>(data, &mut offset)?;
        let minor_version = read_le_at::<u16>(data, &mut offset)?;
        let reserved = read_le_at::<u32>(data, &mut offset)?;
        let length = read_le_at::<u32>(data, &mut offset)?;

        let Some(version_end) = ROOT_FIXED_SIZE.checked_add(length as usize) else {
            return Err(malformed_error!(
                "Version string length causing integer overflow - {}",
                length
            ));
        };
        let Some(version_bytes) = data.get(ROOT_FIXED_SIZE..version_end) else {
            return Err(OutOfBounds);
        };
        let version_len = version_bytes
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(version_bytes.len());
        let version = String::from_utf8_lossy(&version_bytes[..version_len]).into_owned();

        offset = version_end;
        let flags = read_le_at::<u16>(data, &mut offset)?;
        let stream_number = read_le_at::<u16>(data, &mut offset)?;
        if stream_number == 0 || usize::from(stream_number) * 9 > data.len() {
            return Err(malformed_error!("Invalid stream count - {}", stream_number));
        }

        let mut stream_headers: Vec<StreamHeader> = Vec::with_capacity(usize::from(stream_number));
        for _ in 0..stream_number {
            let Some(header_data) = data.get(offset..) else {
                return Err(OutOfBounds);
            };

            let stream = StreamHeader::from(header_data)?;
            let Some(stream_end) = stream.offset.checked_add(stream.size) else {
                return Err(malformed_error!(
                    "Stream offset and size cause integer overflow - {} + {}",
                    stream.offset,
                    stream.size
                ));
            };
            if stream_end as usize > data.len() {
                return Err(OutOfBounds);
            }
            if stream_headers.iter().any(|known| known.name == stream.name) {
                return Err(malformed_error!("Duplicate stream - {}", stream.name));
            }

            offset += stream.header_size();
            stream_headers.push(stream);
        }

        Ok(Root {
            signature,
            major_version,
            minor_version,
            reserved,
            length,
            version,
            flags,
            stream_number,
            stream_headers,
        })
    }

    /// Looks up a stream header by name.
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|stream| stream.name == name)
    }
}
