use std::path::PathBuf;

use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! lookup_error {
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::LookupFailed(format!($fmt, $($arg)*))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Structural errors (the file is skipped)
/// - [`Error::Malformed`] - Corrupted or invalid PE / CLI / metadata structure
/// - [`Error::NotSupported`] - A valid but unsupported variant, e.g. the uncompressed `#-` stream
/// - [`Error::GoblinErr`] - The PE headers were rejected by `goblin`
/// - [`Error::FileError`] - Reading, copying or writing a file failed
///
/// ## Buffer errors
/// - [`Error::OutOfBounds`] - A read or write would have crossed the end of a buffer
/// - [`Error::InvalidOffset`] - An RVA is not covered by any section
/// - [`Error::BufferOverflow`] - The append buffer of an extend session is too small
///
/// ## Operation errors (the batch continues)
/// - [`Error::LookupFailed`] - A type, method, field or matching signature could not be found
/// - [`Error::InvalidState`] - An operation was issued outside of its begin/end bracket
/// - [`Error::NoSession`] - An operation referenced a file that has no session
#[derive(Error, Debug)]
pub enum Error {
    /// The RVA could not be mapped to a file offset.
    #[error("Could not map RVA 0x{0:08X} to a file offset")]
    InvalidOffset(u32),

    /// The file is damaged and could not be parsed.
    ///
    /// Carries the source location where the problem was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while reading or writing a buffer.
    #[error("Out of Bound access would have occurred!")]
    OutOfBounds,

    /// This file type or metadata variant is not supported.
    #[error("This file type is not supported")]
    NotSupported,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error from the goblin crate during PE header parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// A named type, member or signature match could not be found.
    #[error("{0}")]
    LookupFailed(String),

    /// Writing to the append buffer of an extend session would exceed its declared capacity.
    #[error("Append buffer overflow - {requested} bytes requested, capacity is {capacity}")]
    BufferOverflow {
        /// Total bytes the write would need
        requested: usize,
        /// Declared size of the append buffer
        capacity: usize,
    },

    /// An operation was issued while the session was in a different mode.
    #[error("Invalid session state - expected {expected}, found {actual}")]
    InvalidState {
        /// The mode the operation requires
        expected: &'static str,
        /// The mode the session is currently in
        actual: &'static str,
    },

    /// No session exists for the referenced file.
    #[error("No patch session for {}", .0.display())]
    NoSession(PathBuf),
}
