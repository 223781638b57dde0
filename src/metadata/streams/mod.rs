//! Metadata streams.
//!
//! The metadata root names up to five streams. `dotpatch` reads three of them:
//!
//! - **`#~`** - the compressed metadata tables, see [`TablesHeader`]
//! - **`#Strings`** - UTF-8 identifiers referenced by table rows, see [`Strings`]
//! - **`#Blob`** - signatures and other binary data, see [`Blob`]
//!
//! `#US` and `#GUID` are located but never interpreted. The uncompressed `#-` tables variant is
//! recognized and rejected.
//!
//! # References
//!
//! - ECMA-335 6th Edition, Partition II, Section 24.2.2 - Stream Headers

mod blob;
mod streamheader;
mod strings;
mod tablesheader;

pub use blob::Blob;
pub use streamheader::{StreamHeader, KNOWN_STREAMS};
pub use strings::Strings;
pub use tablesheader::{TablesHeader, TABLES_HEADER_FIXED_SIZE};
