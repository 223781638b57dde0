//! The patch session of one file.
//!
//! A session owns the output copy of one input image and moves through
//! `Idle -> {Replacing | Extending | Modifying} -> Idle`. Every `begin_*` loads the image and its
//! metadata from the output copy, so the result of one mode is the input of the next; every
//! `end_*` persists the changes of its mode and drops the loaded image.
//!
//! Lookup failures are returned as [`crate::Error::LookupFailed`] and also recorded in the
//! [`Diagnostics`] handed to the operation.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use strum::IntoStaticStr;

use crate::{
    file::{io::write_bytes_at, section::SectionHeader, Image},
    metadata::{
        method::{MethodBody, MethodHeaderKind, TINY_MAX_CODE_SIZE},
        tables::TableId,
        MetadataStream,
    },
    patch::{
        emit::{self, RefOpcode},
        lookup::Resolver,
        Diagnostics, PatchConfig,
    },
    Error::{self, BufferOverflow, InvalidState, OutOfBounds},
    Result,
};

const CONSTRUCTORS: [&str; 2] = [".ctor", ".cctor"];

/// The mode a [`PatchSession`] is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    /// No mode open, nothing loaded
    Idle,
    /// Between `begin_replace` and `end_replace`
    Replacing,
    /// Between `begin_extend` and `end_extend`
    Extending,
    /// Between `begin_modify` and `end_modify`
    Modifying,
}

struct Loaded {
    image: Image,
    metadata: MetadataStream,
}

/// Relocated method bodies waiting to be written as the new section
struct AppendBuffer {
    header: SectionHeader,
    data: Vec<u8>,
    cursor: usize,
    extended: usize,
}

enum Mode {
    Idle,
    Replacing(Loaded),
    Extending(Loaded, AppendBuffer),
    Modifying(Loaded),
}

impl Mode {
    fn state(&self) -> SessionState {
        match self {
            Mode::Idle => SessionState::Idle,
            Mode::Replacing(_) => SessionState::Replacing,
            Mode::Extending(..) => SessionState::Extending,
            Mode::Modifying(_) => SessionState::Modifying,
        }
    }
}

fn invalid(expected: SessionState, actual: SessionState) -> Error {
    InvalidState {
        expected: expected.into(),
        actual: actual.into(),
    }
}

/// Records a lookup failure of `result` before handing it on.
fn noted<T>(file: &Path, diagnostics: &mut Diagnostics, result: Result<T>) -> Result<T> {
    if let Err(Error::LookupFailed(message)) = &result {
        warn!("{}: {}", file.display(), message);
        diagnostics.push(Some(file), message.clone());
    }
    result
}

fn set_method_rva(loaded: &mut Loaded, rid: u32, rva: u32) -> Result<()> {
    let mut methods = loaded.metadata.table(TableId::MethodDef);
    if !methods.move_to_rid(rid) {
        return Err(malformed_error!("MethodDef row {} does not exist", rid));
    }
    methods.set(loaded.image.data_mut(), "RVA", rva)
}

/// The header `body` needs once `insert` bytes are added in front of its code.
fn grow(body: &MethodBody, insert: u32, promoted_max_stack: u16) -> Result<MethodBody> {
    let Some(size_code) = body.size_code.checked_add(insert) else {
        return Err(malformed_error!(
            "Code size overflows - {} + {}",
            body.size_code,
            insert
        ));
    };

    match body.kind {
        MethodHeaderKind::Compact if size_code <= TINY_MAX_CODE_SIZE => {
            Ok(MethodBody::compact(size_code))
        }
        MethodHeaderKind::Compact => Ok(MethodBody::extended(promoted_max_stack, size_code)),
        MethodHeaderKind::Extended => {
            let mut grown = body.clone();
            grown.size_code = size_code;
            for handler in &mut grown.exception_handlers {
                handler.shift(insert)?;
            }
            Ok(grown)
        }
    }
}

/// Writes `bytes` into the code of the body at `rva`, `position` bytes after its header.
fn patch_body(image: &mut Image, rva: u32, position: u32, bytes: &[u8]) -> Result<()> {
    let offset = image.file_offset(rva)?;
    let Some(data) = image.data().get(offset..) else {
        return Err(OutOfBounds);
    };
    let body = MethodBody::from(data)?;

    if position as usize + bytes.len() > body.size_code as usize {
        warn!(
            "Write of {} bytes at {} crosses the end of the {} byte body at RVA 0x{:X}",
            bytes.len(),
            position,
            body.size_code,
            rva
        );
    }

    let mut at = offset + body.size_header + position as usize;
    write_bytes_at(image.data_mut(), &mut at, bytes)
}

/// The patch session of one input file.
///
/// # Examples
///
/// ```rust,no_run
/// use dotpatch::patch::{Diagnostics, PatchConfig, PatchSession};
/// use std::path::Path;
///
/// let mut diagnostics = Diagnostics::new();
/// let mut session = PatchSession::new(Path::new("Game.dll"), &PatchConfig::new("patched"))?;
///
/// session.begin_extend(0x1000)?;
/// session.extend("Game.Player", "Update", 5, &mut diagnostics)?;
/// session.end_extend()?;
///
/// session.begin_modify()?;
/// session.write_load_arg("Game.Player", "Update", 0, 0, &mut diagnostics)?;
/// session.end_modify()?;
/// # Ok::<(), dotpatch::Error>(())
/// ```
pub struct PatchSession {
    source: PathBuf,
    output: PathBuf,
    config: PatchConfig,
    mode: Mode,
}

impl fmt::Debug for PatchSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchSession")
            .field("source", &self.source)
            .field("output", &self.output)
            .field("state", &self.state())
            .finish()
    }
}

impl PatchSession {
    /// Creates the session for `source`, copying it to `config.output_dir` (overwriting an earlier
    /// copy).
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the copy fails or would overwrite `source` itself.
    pub fn new(source: &Path, config: &PatchConfig) -> Result<PatchSession> {
        let Some(name) = source.file_name() else {
            return Err(Error::FileError(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} does not name a file", source.display()),
            )));
        };

        fs::create_dir_all(&config.output_dir)?;
        let output = config.output_dir.join(name);
        if output.exists() && fs::canonicalize(source)? == fs::canonicalize(&output)? {
            return Err(Error::FileError(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} would be patched in place", source.display()),
            )));
        }

        fs::copy(source, &output)?;
        debug!("Copied {} to {}", source.display(), output.display());

        Ok(PatchSession {
            source: source.to_path_buf(),
            output,
            config: config.clone(),
            mode: Mode::Idle,
        })
    }

    /// The input file.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// The output copy all changes go to.
    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// The current mode.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.mode.state()
    }

    fn load(&self) -> Result<Loaded> {
        let actual = self.state();
        if actual != SessionState::Idle {
            return Err(invalid(SessionState::Idle, actual));
        }

        let image = Image::from_file(&self.output)?;
        let metadata = MetadataStream::from_image(&image)?;
        debug!(
            "Loaded {} ({} bytes, {} methods)",
            self.output.display(),
            image.len(),
            metadata.row_count(TableId::MethodDef)
        );
        Ok(Loaded { image, metadata })
    }

    /// Closes the current mode, handing back what it loaded if it is `expected`.
    fn close(&mut self, expected: SessionState) -> Result<Mode> {
        let actual = self.state();
        if actual != expected {
            return Err(invalid(expected, actual));
        }
        Ok(std::mem::replace(&mut self.mode, Mode::Idle))
    }

    fn save(&self, loaded: &Loaded) -> Result<()> {
        loaded.image.save(&self.output)?;
        info!("Saved {}", self.output.display());
        Ok(())
    }

    /// Loads the output copy and starts retargeting methods.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidState`] outside of `Idle`, or the errors of loading the
    /// image.
    pub fn begin_replace(&mut self) -> Result<()> {
        self.mode = Mode::Replacing(self.load()?);
        Ok(())
    }

    /// Points every method of `source_type` at the body of the method of `target_type` with the
    /// same name and signature. Constructors are left alone. Returns the number of retargeted
    /// methods; methods without a counterpart are recorded in `diagnostics` and skipped.
    ///
    /// # Errors
    /// Returns [`crate::Error::LookupFailed`] if either type does not exist,
    /// [`crate::Error::InvalidState`] outside of `Replacing`, and [`crate::Error::Malformed`] if
    /// the tables can not be read.
    pub fn replace(
        &mut self,
        source_type: &str,
        target_type: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<usize> {
        let actual = self.state();
        let Mode::Replacing(loaded) = &mut self.mode else {
            return Err(invalid(SessionState::Replacing, actual));
        };
        let file = self.source.as_path();

        let resolver = Resolver::new(&loaded.metadata, loaded.image.data());
        let source = noted(file, diagnostics, resolver.methods_of(source_type))?;
        let target = noted(file, diagnostics, resolver.methods_of(target_type))?;

        let mut retargets = Vec::new();
        for rid in source.rids() {
            let name = resolver.method_name(rid)?;
            if CONSTRUCTORS.contains(&name) {
                continue;
            }

            match resolver.find_counterpart(rid, target)? {
                Some(counterpart) => {
                    retargets.push((rid, name.to_string(), resolver.method_rva(counterpart)?));
                }
                None => {
                    let message = format!(
                        "Can't find {}::{} with a matching signature in {}",
                        source_type, name, target_type
                    );
                    warn!("{}: {}", file.display(), message);
                    diagnostics.push(Some(file), message);
                }
            }
        }

        for (rid, name, rva) in &retargets {
            set_method_rva(loaded, *rid, *rva)?;
            debug!(
                "{}::{} now runs {}::{} @ 0x{:X}",
                source_type, name, target_type, name, rva
            );
        }

        Ok(retargets.len())
    }

    /// Saves the retargeted methods and returns to `Idle`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidState`] outside of `Replacing`, or
    /// [`crate::Error::FileError`] if the output can not be written.
    pub fn end_replace(&mut self) -> Result<()> {
        match self.close(SessionState::Replacing)? {
            Mode::Replacing(loaded) => self.save(&loaded),
            _ => Ok(()),
        }
    }

    /// Loads the output copy and prepares a new section of `size` bytes that extended method
    /// bodies are relocated into. Returns the header of the new section.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidState`] outside of `Idle`, or the errors of loading the image
    /// and of [`Image::prepare_new_section`].
    pub fn begin_extend(&mut self, size: u32) -> Result<SectionHeader> {
        let mut loaded = self.load()?;
        let mut header =
            loaded
                .image
                .prepare_new_section(&self.config.section_name, size, false)?;
        header.characteristics = self.config.section_characteristics;

        let buffer = AppendBuffer {
            header: header.clone(),
            data: vec![0u8; size as usize],
            cursor: 0,
            extended: 0,
        };
        self.mode = Mode::Extending(loaded, buffer);
        Ok(header)
    }

    /// Relocates the body of the first method `method` of `type_name` into the new section with
    /// `insert` zero bytes (`nop`) in front of its code, and points the method at the copy.
    /// Returns the new RVA of the method.
    ///
    /// A compact header stays compact while the code fits 63 bytes and is promoted to an extended
    /// header with [`PatchConfig::promoted_max_stack`] otherwise. Extended headers keep their
    /// flags, stack depth and locals; their exception clauses move along with the code.
    ///
    /// # Errors
    /// Returns [`crate::Error::LookupFailed`] if the type or method does not exist, the method
    /// has no body or was already moved in this session, [`crate::Error::BufferOverflow`] if the new section is too small (the method
    /// is left unchanged), [`crate::Error::InvalidState`] outside of `Extending`, and
    /// [`crate::Error::Malformed`] for undecodable bodies.
    pub fn extend(
        &mut self,
        type_name: &str,
        method_name: &str,
        insert: u32,
        diagnostics: &mut Diagnostics,
    ) -> Result<u32> {
        let actual = self.state();
        let Mode::Extending(loaded, buffer) = &mut self.mode else {
            return Err(invalid(SessionState::Extending, actual));
        };
        let file = self.source.as_path();

        let (rid, rva) = {
            let resolver = Resolver::new(&loaded.metadata, loaded.image.data());
            let range = noted(file, diagnostics, resolver.methods_of(type_name))?;
            let found = resolver.find_method(range, method_name)?;
            let rid = noted(
                file,
                diagnostics,
                found.ok_or_else(|| {
                    lookup_error!("Method {}::{} not found", type_name, method_name)
                }),
            )?;
            (rid, resolver.method_rva(rid)?)
        };
        if rva == 0 {
            return noted(
                file,
                diagnostics,
                Err(lookup_error!("Method {}::{} has no body", type_name, method_name)),
            );
        }
        if buffer.header.contains_rva(rva) {
            return noted(
                file,
                diagnostics,
                Err(lookup_error!(
                    "Method {}::{} was already moved into {}",
                    type_name,
                    method_name,
                    buffer.header.name()
                )),
            );
        }

        let offset = loaded.image.file_offset(rva)?;
        let Some(data) = loaded.image.data().get(offset..) else {
            return Err(OutOfBounds);
        };
        let body = MethodBody::from(data)?;
        let grown = grow(&body, insert, self.config.promoted_max_stack)?;

        let start = buffer.cursor.next_multiple_of(4);
        let requested = start + grown.encoded_size();
        if requested > buffer.data.len() {
            return Err(BufferOverflow {
                requested,
                capacity: buffer.data.len(),
            });
        }

        let mut code = vec![0u8; insert as usize];
        code.extend_from_slice(body.code(data)?);

        let Some(new_rva) = u32::try_from(start)
            .ok()
            .and_then(|start| buffer.header.virtual_address.checked_add(start))
        else {
            return Err(malformed_error!("New section offset 0x{:X} overflows", start));
        };

        let mut cursor = start;
        grown.write_to(&code, &mut buffer.data, &mut cursor)?;
        buffer.cursor = cursor;
        buffer.extended += 1;
        set_method_rva(loaded, rid, new_rva)?;

        debug!(
            "{}::{} moved from 0x{:X} to 0x{:X} ({:?} -> {:?}, {} -> {} code bytes)",
            type_name,
            method_name,
            rva,
            new_rva,
            body.kind,
            grown.encoding(),
            body.size_code,
            grown.size_code
        );
        Ok(new_rva)
    }

    /// Writes the image with the new section and returns to `Idle`. Nothing is written if no
    /// method was extended; the return value tells whether the output was saved.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidState`] outside of `Extending`, or the errors of
    /// [`Image::save_with_section`].
    pub fn end_extend(&mut self) -> Result<bool> {
        let Mode::Extending(loaded, buffer) = self.close(SessionState::Extending)? else {
            return Ok(false);
        };

        if buffer.extended == 0 {
            info!("Nothing extended, {} left unchanged", self.output.display());
            return Ok(false);
        }

        loaded
            .image
            .save_with_section(&self.output, &buffer.header, &buffer.data)?;
        info!(
            "Saved {} with {} relocated methods in {} @ 0x{:X}",
            self.output.display(),
            buffer.extended,
            buffer.header.name(),
            buffer.header.virtual_address
        );
        Ok(true)
    }

    /// Loads the output copy and starts patching method code in place.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidState`] outside of `Idle`, or the errors of loading the
    /// image.
    pub fn begin_modify(&mut self) -> Result<()> {
        self.mode = Mode::Modifying(self.load()?);
        Ok(())
    }

    fn modifying(&self) -> Result<&Loaded> {
        match &self.mode {
            Mode::Modifying(loaded) => Ok(loaded),
            mode => Err(invalid(SessionState::Modifying, mode.state())),
        }
    }

    /// Writes `bytes` at `position` of the code of every method `method_name` of `type_name`,
    /// overloads included. Returns the number of patched bodies.
    ///
    /// # Errors
    /// Returns [`crate::Error::LookupFailed`] if the type or method does not exist or no match has
    /// a body, [`crate::Error::InvalidState`] outside of `Modifying`, and
    /// [`crate::Error::OutOfBounds`] if the write crosses the end of the image.
    pub fn write_bytes(
        &mut self,
        type_name: &str,
        method_name: &str,
        position: u32,
        bytes: &[u8],
        diagnostics: &mut Diagnostics,
    ) -> Result<usize> {
        let actual = self.state();
        let Mode::Modifying(loaded) = &mut self.mode else {
            return Err(invalid(SessionState::Modifying, actual));
        };
        let file = self.source.as_path();

        let rvas = {
            let resolver = Resolver::new(&loaded.metadata, loaded.image.data());
            let range = noted(file, diagnostics, resolver.methods_of(type_name))?;
            let mut rvas = Vec::new();
            for rid in resolver.find_methods(range, method_name)? {
                match resolver.method_rva(rid)? {
                    0 => debug!("{}::{} row {} has no body", type_name, method_name, rid),
                    rva => rvas.push(rva),
                }
            }
            rvas
        };
        if rvas.is_empty() {
            return noted(
                file,
                diagnostics,
                Err(lookup_error!(
                    "Method {}::{} with a body not found",
                    type_name,
                    method_name
                )),
            );
        }

        for rva in &rvas {
            patch_body(&mut loaded.image, *rva, position, bytes)?;
        }
        debug!(
            "Wrote {} bytes at {} into {} bodies of {}::{}",
            bytes.len(),
            position,
            rvas.len(),
            type_name,
            method_name
        );
        Ok(rvas.len())
    }

    /// Writes the shortest `ldarg` for argument `index`. See [`PatchSession::write_bytes`].
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `index` exceeds 65535, otherwise as
    /// [`PatchSession::write_bytes`].
    pub fn write_load_arg(
        &mut self,
        type_name: &str,
        method_name: &str,
        position: u32,
        index: u32,
        diagnostics: &mut Diagnostics,
    ) -> Result<usize> {
        let bytes = emit::load_arg(index)?;
        self.write_bytes(type_name, method_name, position, &bytes, diagnostics)
    }

    /// Writes the shortest `ldloc` for local `index`. See [`PatchSession::write_bytes`].
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `index` exceeds 65535, otherwise as
    /// [`PatchSession::write_bytes`].
    pub fn write_load_local(
        &mut self,
        type_name: &str,
        method_name: &str,
        position: u32,
        index: u32,
        diagnostics: &mut Diagnostics,
    ) -> Result<usize> {
        let bytes = emit::load_local(index)?;
        self.write_bytes(type_name, method_name, position, &bytes, diagnostics)
    }

    /// Writes `count` `nop`s. See [`PatchSession::write_bytes`].
    ///
    /// # Errors
    /// As [`PatchSession::write_bytes`].
    pub fn write_nops(
        &mut self,
        type_name: &str,
        method_name: &str,
        position: u32,
        count: usize,
        diagnostics: &mut Diagnostics,
    ) -> Result<usize> {
        self.write_bytes(type_name, method_name, position, &emit::nops(count), diagnostics)
    }

    /// Writes `opcode` referencing member `member` of `target_type`, a field for
    /// `ldfld`/`ldsfld` and a method for `call`/`callvirt`. The first member of that name is
    /// used. See [`PatchSession::write_bytes`].
    ///
    /// # Errors
    /// Returns [`crate::Error::LookupFailed`] if the target type or member does not exist,
    /// otherwise as [`PatchSession::write_bytes`].
    #[allow(clippy::too_many_arguments)]
    pub fn write_reference(
        &mut self,
        type_name: &str,
        method_name: &str,
        position: u32,
        opcode: RefOpcode,
        target_type: &str,
        member: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<usize> {
        let rid = {
            let loaded = self.modifying()?;
            let file = self.source.as_path();
            let resolver = Resolver::new(&loaded.metadata, loaded.image.data());

            let found = if opcode.target() == TableId::Field {
                let range = noted(file, diagnostics, resolver.fields_of(target_type))?;
                resolver.find_field(range, member)?
            } else {
                let range = noted(file, diagnostics, resolver.methods_of(target_type))?;
                resolver.find_method(range, member)?
            };
            noted(
                file,
                diagnostics,
                found.ok_or_else(|| {
                    lookup_error!("{} target {}::{} not found", opcode, target_type, member)
                }),
            )?
        };

        self.write_bytes(
            type_name,
            method_name,
            position,
            &opcode.encode(rid),
            diagnostics,
        )
    }

    /// Saves the patched bodies and returns to `Idle`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidState`] outside of `Modifying`, or
    /// [`crate::Error::FileError`] if the output can not be written.
    pub fn end_modify(&mut self) -> Result<()> {
        match self.close(SessionState::Modifying)? {
            Mode::Modifying(loaded) => self.save(&loaded),
            _ => Ok(()),
        }
    }
}
