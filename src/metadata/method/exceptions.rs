//! Exception handling clauses of extended method bodies.
//!
//! Clauses come in a small (12 byte) and a fat (24 byte) encoding; a section holds clauses of
//! one encoding only. [`ExceptionHandler`] is encoding independent and re-chosen on write.

use bitflags::bitflags;

use crate::{
    file::io::{read_le_at, write_le_at},
    Result,
};

/// Size of one small clause
pub const SMALL_CLAUSE_SIZE: usize = 12;
/// Size of one fat clause
pub const FAT_CLAUSE_SIZE: usize = 24;

bitflags! {
    /// Exception handler flags defining the type of exception handling clause.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed exception clause, `filter_offset` holds the class token
        const EXCEPTION = 0x0000;
        /// A filter clause, `filter_offset` is the start of the filter code
        const FILTER = 0x0001;
        /// A finally clause
        const FINALLY = 0x0002;
        /// A fault clause
        const FAULT = 0x0004;
    }
}

/// One try region and its handler.
///
/// # References
/// - ECMA-335 6th Edition, Partition II, Section 25.4.6 - Exception Handling Clauses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Flags describing the type of exception handler (catch, filter, finally, fault).
    pub flags: ExceptionHandlerFlags,
    /// Offset in bytes of try block from start of the code.
    pub try_offset: u32,
    /// Length in bytes of the try block.
    pub try_length: u32,
    /// Location of the handler for this try block.
    pub handler_offset: u32,
    /// Size of the handler code in bytes.
    pub handler_length: u32,
    /// Class token for typed clauses, filter code offset for filter clauses.
    pub filter_offset: u32,
}

impl ExceptionHandler {
    /// Reads one small clause.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the clause crosses the end of `data`.
    pub fn read_small(data: &[u8], offset: &mut usize) -> Result<ExceptionHandler> {
        Ok(ExceptionHandler {
            flags: ExceptionHandlerFlags::from_bits_retain(read_le_at::<u16>(data, offset)?),
            try_offset: u32::from(read_le_at::<u16>(data, offset)?),
            try_length: u32::from(read_le_at::<u8>(data, offset)?),
            handler_offset: u32::from(read_le_at::<u16>(data, offset)?),
            handler_length: u32::from(read_le_at::<u8>(data, offset)?),
            filter_offset: read_le_at::<u32>(data, offset)?,
        })
    }

    /// Reads one fat clause.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the clause crosses the end of `data`.
    pub fn read_fat(data: &[u8], offset: &mut usize) -> Result<ExceptionHandler> {
        // Flags are 32 bits wide in fat clauses, only the low 16 carry meaning
        #[allow(clippy::cast_possible_truncation)]
        let flags = read_le_at::<u32>(data, offset)? as u16;

        Ok(ExceptionHandler {
            flags: ExceptionHandlerFlags::from_bits_retain(flags),
            try_offset: read_le_at::<u32>(data, offset)?,
            try_length: read_le_at::<u32>(data, offset)?,
            handler_offset: read_le_at::<u32>(data, offset)?,
            handler_length: read_le_at::<u32>(data, offset)?,
            filter_offset: read_le_at::<u32>(data, offset)?,
        })
    }

    /// `true` if every field fits the small clause encoding.
    #[must_use]
    pub fn fits_small(&self) -> bool {
        self.try_offset <= u32::from(u16::MAX)
            && self.try_length <= u32::from(u8::MAX)
            && self.handler_offset <= u32::from(u16::MAX)
            && self.handler_length <= u32::from(u8::MAX)
    }

    /// Moves the clause by `delta` code bytes. Filter code offsets move along, class tokens do not.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if an offset overflows.
    pub fn shift(&mut self, delta: u32) -> Result<()> {
        let shifted = |value: u32| {
            value
                .checked_add(delta)
                .ok_or_else(|| malformed_error!("Exception clause offset overflows - {}", value))
        };

        self.try_offset = shifted(self.try_offset)?;
        self.handler_offset = shifted(self.handler_offset)?;
        if self.flags.contains(ExceptionHandlerFlags::FILTER) {
            self.filter_offset = shifted(self.filter_offset)?;
        }
        Ok(())
    }

    /// Writes the clause in the small encoding.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a field does not fit, or
    /// [`crate::Error::OutOfBounds`] if `data` is too short.
    pub fn write_small(&self, data: &mut [u8], offset: &mut usize) -> Result<()> {
        let (Ok(try_offset), Ok(try_length), Ok(handler_offset), Ok(handler_length)) = (
            u16::try_from(self.try_offset),
            u8::try_from(self.try_length),
            u16::try_from(self.handler_offset),
            u8::try_from(self.handler_length),
        ) else {
            return Err(malformed_error!(
                "Exception clause does not fit the small encoding - {:?}",
                self
            ));
        };

        write_le_at(data, offset, self.flags.bits())?;
        write_le_at(data, offset, try_offset)?;
        write_le_at(data, offset, try_length)?;
        write_le_at(data, offset, handler_offset)?;
        write_le_at(data, offset, handler_length)?;
        write_le_at(data, offset, self.filter_offset)
    }

    /// Writes the clause in the fat encoding.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is too short.
    pub fn write_fat(&self, data: &mut [u8], offset: &mut usize) -> Result<()> {
        write_le_at(data, offset, u32::from(self.flags.bits()))?;
        write_le_at(data, offset, self.try_offset)?;
        write_le_at(data, offset, self.try_length)?;
        write_le_at(data, offset, self.handler_offset)?;
        write_le_at(data, offset, self.handler_length)?;
        write_le_at(data, offset, self.filter_offset)
    }
}
