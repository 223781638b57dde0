//! The patch engine: method retargeting, body extension and in-place code patching.
//!
//! # Key Components
//!
//! - [`Batch`] - Sessions of several files plus the shared diagnostics, driven file by file
//! - [`PatchSession`] - The `Idle -> Replacing | Extending | Modifying -> Idle` state machine of
//!   one file
//! - [`PatchConfig`] - Output directory and the shape of the injected section
//! - [`Diagnostics`] - Human readable failures collected over a batch
//! - [`emit`] - Encoders of the IL instructions written by the modify operations
//!
//! # Operations
//!
//! - **Replace** points every method of one type at the body of the same-named, same-signature
//!   method of another type by copying its RVA. Constructors are skipped.
//! - **Extend** relocates method bodies into a new section with room for extra code in front of
//!   the original instructions.
//! - **Modify** overwrites instructions of method bodies in place.
//!
//! Inputs are never touched; each file is copied to the output directory first and every mode
//! starts from the result of the previous one.

mod batch;
mod config;
mod diagnostics;
pub mod emit;
mod lookup;
mod session;

pub use batch::Batch;
pub use config::{PatchConfig, DEFAULT_SECTION_NAME};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use emit::RefOpcode;
pub use lookup::{split_type_name, MemberRange, Resolver};
pub use session::{PatchSession, SessionState};
