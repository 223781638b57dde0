//! # dotpatch Prelude
//!
//! Re-exports the types needed for most patching tasks. Import this module to get the batch
//! driver, the per-file session and the metadata building blocks in one line.
//!
//! ```rust,no_run
//! use dotpatch::prelude::*;
//!
//! let mut batch = Batch::new(PatchConfig::new("patched"));
//! batch.begin(0);
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotpatch operations
pub use crate::Error;

/// The result type used throughout dotpatch
pub use crate::Result;

// ================================================================================================
// Patch Engine
// ================================================================================================

/// Batch driver, per-file sessions and their configuration
pub use crate::patch::{
    Batch, Diagnostic, Diagnostics, PatchConfig, PatchSession, RefOpcode, SessionState,
};

// ================================================================================================
// Image and Metadata
// ================================================================================================

/// The PE container
pub use crate::{Image, SectionHeader};

/// Metadata directory and table access
pub use crate::metadata::{
    tables::{CodedIndexType, TableId, TableRowSet},
    token::Token,
    MetadataStream,
};

/// Method header and exception clause coding
pub use crate::metadata::method::{
    ExceptionHandler, ExceptionHandlerFlags, MethodBody, MethodHeaderKind,
};
