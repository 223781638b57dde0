//! CIL method bodies: header coding and exception clauses.
//!
//! # Key Components
//!
//! - [`MethodBody`] - Compact and extended method headers with their exception sections
//! - [`ExceptionHandler`] - One try region and its handler
//! - [`MethodBodyFlags`] / [`SectionFlags`] - Header and data section flags
//!
//! # References
//! - ECMA-335 6th Edition, Partition II, Section 25.4 - Common Intermediate Language Physical Layout

mod body;
mod exceptions;
mod types;

pub use body::MethodBody;
pub use exceptions::{ExceptionHandler, ExceptionHandlerFlags, FAT_CLAUSE_SIZE, SMALL_CLAUSE_SIZE};
pub use types::*;
