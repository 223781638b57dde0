//! Method header and data section flags.
//!
//! # Key Types
//! - [`MethodBodyFlags`]: Format and option bits of the method header
//! - [`SectionFlags`]: Kind bits of the data sections following an extended body
//! - [`MethodHeaderKind`]: Compact or extended header

use bitflags::bitflags;

/// Mask of the format bits in the first header byte
pub const METHOD_HEADER_FORMAT_MASK: u8 = 0x03;
/// Largest code size a compact header can describe
pub const TINY_MAX_CODE_SIZE: u32 = 63;
/// Operand stack depth implied by a compact header
pub const TINY_MAX_STACK: u16 = 8;
/// Size of an extended header, also its header size field times 4
pub const FAT_HEADER_SIZE: usize = 12;

bitflags! {
    /// Flags of the method header (ECMA-335 II.25.4.4). The low 2 bits select the format.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodBodyFlags: u16 {
        /// Compact header, one byte
        const TINY_FORMAT = 0x2;
        /// Extended header, 12 bytes
        const FAT_FORMAT = 0x3;
        /// Data sections follow the code
        const MORE_SECTS = 0x8;
        /// Zero-initialise the locals
        const INIT_LOCALS = 0x10;
    }
}

bitflags! {
    /// Kind byte of a method data section (ECMA-335 II.25.4.5).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u8 {
        /// Exception handling clauses
        const EHTABLE = 0x1;
        /// Reserved
        const OPT_ILTABLE = 0x2;
        /// 3-byte data size and 24-byte clauses
        const FAT_FORMAT = 0x40;
        /// Another section follows
        const MORE_SECTS = 0x80;
    }
}

/// The two encodings of a method header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodHeaderKind {
    /// One byte: format tag and a 6-bit code size
    Compact,
    /// Twelve bytes: flags, header size, max stack, code size and local signature token
    Extended,
}
