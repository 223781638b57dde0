//! The metadata tables of the "#~" stream.
//!
//! Every table kind is described by data, not by a type of its own:
//!
//! - [`TableId`] enumerates the kinds
//! - [`CodedIndexType`] holds the fixed coded index reference data
//! - [`TableInfo`] derives the 2 or 4 byte index widths of one file
//! - [`RowLayout`] resolves a kind's column schema into offsets and a row size
//! - [`TableRowSet`] is a seekable cursor with get/set access by column name
//!
//! # Reference
//! - [ECMA-335 II.22 and II.24.2.6](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

mod codedindex;
pub mod layout;
mod rowset;
mod tableid;
mod tableinfo;

pub use codedindex::CodedIndexType;
pub use layout::{FieldKind, FieldSpec, RowLayout};
pub use rowset::TableRowSet;
pub use tableid::{TableId, MAX_TABLES};
pub use tableinfo::{HeapKind, TableInfo};
