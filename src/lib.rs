// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # dotpatch
//!
//! Binary-level patching of .NET PE images. `dotpatch` loads a managed executable or library,
//! locates type, method and field records inside the ECMA-335 metadata tables and rewrites method
//! implementations and instruction operands directly in the byte image, without a compiler in
//! the loop.
//!
//! ## Features
//!
//! - **Method redirection** - point a method's RVA at the body of a same-signature method of another type
//! - **Body extension** - copy method bodies into a freshly injected `.ilcode` section, with room for new IL
//! - **Operand patching** - write `ldarg`/`ldloc`/`ldfld`/`ldsfld`/`call`/`callvirt`/`nop` sequences in place
//! - **Data-driven metadata tables** - one generic row layout for every table kind, with per-file index widths
//! - **Bounds-checked I/O** - every read and write into the image is validated against the buffer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dotpatch::prelude::*;
//! use std::path::Path;
//!
//! let mut batch = Batch::new(PatchConfig::new("patched"));
//! let file = Path::new("Game.dll");
//!
//! batch.begin(1);
//! batch.begin_file(file)?;
//!
//! batch.begin_replace(file)?;
//! batch.replace(file, "Game.Player", "Cheats.Player")?;
//! batch.end_replace(file)?;
//!
//! batch.begin_modify(file)?;
//! batch.write_nops(file, "Game.Player", "TakeDamage", 0, 5)?;
//! batch.end_modify(file)?;
//!
//! batch.end_file(file);
//! for diagnostic in batch.end() {
//!     eprintln!("{diagnostic}");
//! }
//! # Ok::<(), dotpatch::Error>(())
//! ```
//!
//! ## Lower level access
//!
//! The building blocks are public as well: [`crate::Image`] for the PE container,
//! [`crate::metadata::MetadataStream`] for the "#~" tables stream and its heaps,
//! [`crate::metadata::tables::TableRowSet`] for seekable row access and
//! [`crate::metadata::method::MethodBody`] for IL header and exception clause coding.
//!
//! ```rust,no_run
//! use dotpatch::{metadata::{tables::TableId, MetadataStream}, Image};
//! use std::path::Path;
//!
//! let image = Image::from_file(Path::new("Game.dll"))?;
//! let metadata = MetadataStream::from_image(&image)?;
//!
//! let mut methods = metadata.table(TableId::MethodDef);
//! while !methods.is_end() {
//!     let name = metadata.string(image.data(), methods.get(image.data(), "Name")?)?;
//!     let rva = methods.get(image.data(), "RVA")?;
//!     println!("{name} @ 0x{rva:08X}");
//!     methods.move_to_next();
//! }
//! # Ok::<(), dotpatch::Error>(())
//! ```

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Parsing and encoding of the CLI metadata: headers, streams, tables and method bodies.
pub mod metadata;

/// The patch engine: sessions, batches, diagnostics and IL operand emitters.
pub mod patch;

/// Convenient re-exports of the most commonly used types.
pub mod prelude;

#[cfg(test)]
pub(crate) mod test;

/// `dotpatch` Result type
pub type Result<T> = std::result::Result<T, Error>;

/// `dotpatch` Error type
pub use error::Error;

/// The PE image container and its section table.
pub use file::{section::SectionHeader, Image};

/// Bounds-checked little-endian primitives used for all buffer access.
pub use file::io;
