//! Bounds-checked little-endian reading and writing of primitive values.
//!
//! Every structure `dotpatch` touches (PE headers, the CLI header, metadata tables, IL method
//! headers) is little-endian and lives inside one owned byte buffer. All access to that buffer goes
//! through the functions in this module, which validate the requested range and return
//! [`crate::Error::OutOfBounds`] instead of panicking.
//!
//! # Key Components
//!
//! - [`crate::file::io::CilIO`] - Trait implemented by the primitive integer types
//! - [`crate::file::io::read_le`] / [`crate::file::io::read_le_at`] - Fixed-width reads
//! - [`crate::file::io::read_le_at_dyn`] - 2 or 4 byte index reads, selected by width
//! - [`crate::file::io::read_compressed_uint_at`] - Blob length prefixes
//! - [`crate::file::io::write_le`] / [`crate::file::io::write_le_at`] - Fixed-width writes
//! - [`crate::file::io::write_le_at_dyn`] - 2 or 4 byte index writes, selected by width
//! - [`crate::file::io::write_bytes_at`] - Raw byte copy into a buffer
//!
//! # Examples
//!
//! ```rust
//! use dotpatch::io::{read_le_at, write_le_at};
//!
//! let mut data = [0u8; 6];
//! let mut offset = 0;
//! write_le_at(&mut data, &mut offset, 0x0201_u16)?;
//! write_le_at(&mut data, &mut offset, 0x0605_0403_u32)?;
//! assert_eq!(data, [0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
//!
//! offset = 2;
//! assert_eq!(read_le_at::<u32>(&data, &mut offset)?, 0x0605_0403);
//! assert_eq!(offset, 6);
//! # Ok::<(), dotpatch::Error>(())
//! ```

use crate::{Error::OutOfBounds, Result};

/// Trait for primitive types that can be read from and written to little-endian byte buffers.
pub trait CilIO: Sized + Copy {
    /// Fixed size byte array representation of this type
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Build the value from its little-endian byte representation
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Produce the little-endian byte representation of the value
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_cilio {
    ($($ty:ty),*) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_cilio!(u8, u16, u32, u64, i8, i16, i32);

/// Safely reads a value of type `T` in little-endian byte order from the start of a buffer.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is shorter than `T`.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` at `offset` and advances the offset by the size of `T`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `offset + size_of::<T>()` exceeds the buffer.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;
    Ok(T::from_le_bytes(read))
}

/// Reads a 2 or 4 byte little-endian value, as used by heap, table and coded indices.
///
/// # Arguments
/// * `data` - The buffer to read from
/// * `offset` - Read position, advanced by the number of bytes consumed
/// * `is_large` - `true` for a 4 byte read, `false` for a 2 byte read
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the read would cross the end of the buffer.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    let res = if is_large {
        read_le_at::<u32>(data, offset)?
    } else {
        u32::from(read_le_at::<u16>(data, offset)?)
    };

    Ok(res)
}

/// Reads an ECMA-335 compressed unsigned integer (II.23.2) and advances the offset past it.
///
/// * `0bbbbbbb` - one byte, 7 value bits
/// * `10bbbbbb x` - two bytes, 14 value bits (big-endian)
/// * `110bbbbb x y z` - four bytes, 29 value bits (big-endian)
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the encoding crosses the end of `data`, or
/// [`crate::Error::Malformed`] if the first byte does not start a valid encoding.
pub fn read_compressed_uint_at(data: &[u8], offset: &mut usize) -> Result<u32> {
    let first = read_le_at::<u8>(data, offset)?;

    if first & 0x80 == 0 {
        return Ok(u32::from(first));
    }

    if first & 0xC0 == 0x80 {
        let second = read_le_at::<u8>(data, offset)?;
        return Ok(((u32::from(first) & 0x3F) << 8) | u32::from(second));
    }

    if first & 0xE0 == 0xC0 {
        let mut value = u32::from(first) & 0x1F;
        for _ in 0..3 {
            value = (value << 8) | u32::from(read_le_at::<u8>(data, offset)?);
        }
        return Ok(value);
    }

    Err(malformed_error!("Invalid compressed uint - 0x{:02X}", first))
}

/// Safely writes a value of type `T` in little-endian byte order to the start of a buffer.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is shorter than `T`.
pub fn write_le<T: CilIO>(data: &mut [u8], value: T) -> Result<()> {
    let mut offset = 0_usize;
    write_le_at(data, &mut offset, value)
}

/// Safely writes a value of type `T` at `offset` and advances the offset by the size of `T`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `offset + size_of::<T>()` exceeds the buffer.
pub fn write_le_at<T: CilIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let bytes = value.to_le_bytes();
    write_bytes_at(data, offset, bytes.as_ref())
}

/// Writes a 2 or 4 byte little-endian value, as used by heap, table and coded indices.
///
/// When `is_large` is `false`, the value must fit into 16 bits.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the write would cross the end of the buffer, or
/// [`crate::Error::Malformed`] if a value larger than `u16::MAX` is written to a 2 byte slot.
pub fn write_le_at_dyn(
    data: &mut [u8],
    offset: &mut usize,
    value: u32,
    is_large: bool,
) -> Result<()> {
    if is_large {
        write_le_at::<u32>(data, offset, value)
    } else {
        let Ok(narrow) = u16::try_from(value) else {
            return Err(malformed_error!(
                "Value 0x{:X} does not fit a 2 byte index",
                value
            ));
        };
        write_le_at::<u16>(data, offset, narrow)
    }
}

/// Copies `bytes` into `data` at `offset` and advances the offset past the copied range.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the copied range would cross the end of `data`.
pub fn write_bytes_at(data: &mut [u8], offset: &mut usize, bytes: &[u8]) -> Result<()> {
    let Some(end) = offset.checked_add(bytes.len()) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;
    Ok(())
}

/// Returns the `len` bytes starting at `offset`, checking the range against the buffer.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the range would cross the end of `data`.
pub fn slice_at(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let Some(end) = offset.checked_add(len) else {
        return Err(OutOfBounds);
    };

    data.get(offset..end).ok_or(OutOfBounds)
}
