//! Parsing and encoding of the CLI metadata of a managed image.
//!
//! # Key Components
//!
//! - [`cor20header`] - The CLI header naming the metadata directory
//! - [`root`] - The metadata root and its stream directory
//! - [`streams`] - Stream headers, the "#~" header and the heaps
//! - [`tables`] - Data-driven row layouts and row access for every table kind
//! - [`MetadataStream`] - All of the above resolved against one image
//! - [`method`] - Method header and exception clause coding
//! - [`token`] - Metadata table row references
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotpatch::{metadata::{tables::TableId, MetadataStream}, Image};
//! use std::path::Path;
//!
//! let image = Image::from_file(Path::new("Game.dll"))?;
//! let metadata = MetadataStream::from_image(&image)?;
//! println!("Runtime: {}", metadata.root().version);
//! println!("Types:   {}", metadata.row_count(TableId::TypeDef));
//! println!("Methods: {}", metadata.row_count(TableId::MethodDef));
//! # Ok::<(), dotpatch::Error>(())
//! ```

/// Implementation of the Header of CIL
pub mod cor20header;
/// Implementation of the MethodHeader of CIL
pub mod method;
/// Implementation of the root metadata structure
pub mod root;
/// Implementation of the metadata streams and heaps
pub mod streams;
/// Implementation of the .NET metadata tables
pub mod tables;
/// Commonly used metadata token type
pub mod token;

mod metadatastream;

pub use metadatastream::MetadataStream;
