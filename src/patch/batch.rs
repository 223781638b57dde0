//! A batch of patch operations over several files.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    file::section::SectionHeader,
    patch::{Diagnostic, Diagnostics, PatchConfig, PatchSession, RefOpcode},
    Error, Result,
};

/// The sessions and diagnostics of one batch, keyed by input file.
///
/// Every operation names the file it applies to and runs on that file's session. The session is
/// created by [`Batch::begin_file`] or by the first `begin_*` of a mode, and lives until the next
/// [`Batch::begin`]. Failures are returned to the caller and also recorded in the
/// batch diagnostics, which [`Batch::end`] hands back.
///
/// # Examples
///
/// ```rust,no_run
/// use dotpatch::patch::{Batch, PatchConfig};
/// use std::path::Path;
///
/// let mut batch = Batch::new(PatchConfig::new("patched"));
/// let file = Path::new("Game.dll");
///
/// batch.begin(1);
/// batch.begin_file(file)?;
/// batch.begin_modify(file)?;
/// batch.write_nops(file, "Game.Player", "TakeDamage", 0, 5)?;
/// batch.end_modify(file)?;
/// batch.end_file(file);
///
/// for diagnostic in batch.end() {
///     eprintln!("{diagnostic}");
/// }
/// # Ok::<(), dotpatch::Error>(())
/// ```
#[derive(Debug)]
pub struct Batch {
    config: PatchConfig,
    sessions: HashMap<PathBuf, PatchSession>,
    diagnostics: Diagnostics,
    files_total: usize,
    files_done: usize,
}

impl Batch {
    /// An empty batch applying `config`.
    #[must_use]
    pub fn new(config: PatchConfig) -> Batch {
        Batch {
            config,
            sessions: HashMap::new(),
            diagnostics: Diagnostics::new(),
            files_total: 0,
            files_done: 0,
        }
    }

    /// The configuration of every session of this batch.
    #[must_use]
    pub fn config(&self) -> &PatchConfig {
        &self.config
    }

    /// Failures recorded so far.
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Number of files announced by [`Batch::begin`].
    #[must_use]
    pub fn files_total(&self) -> usize {
        self.files_total
    }

    /// Number of files finished with [`Batch::end_file`].
    #[must_use]
    pub fn files_done(&self) -> usize {
        self.files_done
    }

    /// The session of `file`, if it has one.
    #[must_use]
    pub fn session(&self, file: &Path) -> Option<&PatchSession> {
        self.sessions.get(file)
    }

    /// Starts a batch over `total` files, dropping all sessions and diagnostics of the last one.
    pub fn begin(&mut self, total: usize) {
        self.sessions.clear();
        self.diagnostics.clear();
        self.files_total = total;
        self.files_done = 0;
        debug!("Batch of {} files", total);
    }

    /// Ends the batch and returns its diagnostics.
    pub fn end(&mut self) -> Vec<Diagnostic> {
        info!(
            "Batch done, {}/{} files, {} diagnostics",
            self.files_done,
            self.files_total,
            self.diagnostics.len()
        );
        self.diagnostics.drain()
    }

    /// Records a free-form message in the diagnostics.
    pub fn log(&mut self, message: impl Into<String>) {
        self.diagnostics.push(None, message);
    }

    /// Creates the session of `file`, copying it into the output directory. A file that already
    /// has a session keeps it, along with every mode saved to its copy so far.
    ///
    /// # Errors
    /// Returns the errors of [`PatchSession::new`].
    pub fn begin_file(&mut self, file: &Path) -> Result<()> {
        if self.sessions.contains_key(file) {
            debug!("{} already has a session", file.display());
            return Ok(());
        }

        match PatchSession::new(file, &self.config) {
            Ok(session) => {
                self.sessions.insert(file.to_path_buf(), session);
                Ok(())
            }
            Err(error) => {
                self.diagnostics.push(Some(file), error.to_string());
                Err(error)
            }
        }
    }

    /// Counts `file` as done.
    pub fn end_file(&mut self, file: &Path) {
        self.files_done += 1;
        debug!(
            "{} done ({}/{})",
            file.display(),
            self.files_done,
            self.files_total
        );
    }

    /// Runs `operation` on the session of `file`, recording failures that the session did not
    /// record itself.
    fn run<T>(
        &mut self,
        file: &Path,
        operation: impl FnOnce(&mut PatchSession, &mut Diagnostics) -> Result<T>,
    ) -> Result<T> {
        let Some(session) = self.sessions.get_mut(file) else {
            let error = Error::NoSession(file.to_path_buf());
            self.diagnostics.push(Some(file), error.to_string());
            return Err(error);
        };

        let result = operation(session, &mut self.diagnostics);
        if let Err(error) = &result {
            if !matches!(error, Error::LookupFailed(_)) {
                self.diagnostics.push(Some(file), error.to_string());
            }
        }
        result
    }

    /// See [`PatchSession::begin_replace`]. Creates the session of `file` first if it has none.
    ///
    /// # Errors
    /// Returns the errors of [`Batch::begin_file`], otherwise as the session operation.
    pub fn begin_replace(&mut self, file: &Path) -> Result<()> {
        self.begin_file(file)?;
        self.run(file, |session, _| session.begin_replace())
    }

    /// See [`PatchSession::replace`].
    ///
    /// # Errors
    /// Returns [`crate::Error::NoSession`] for unknown files, otherwise as the session operation.
    pub fn replace(&mut self, file: &Path, source_type: &str, target_type: &str) -> Result<usize> {
        self.run(file, |session, diagnostics| {
            session.replace(source_type, target_type, diagnostics)
        })
    }

    /// See [`PatchSession::end_replace`].
    ///
    /// # Errors
    /// Returns [`crate::Error::NoSession`] for unknown files, otherwise as the session operation.
    pub fn end_replace(&mut self, file: &Path) -> Result<()> {
        self.run(file, |session, _| session.end_replace())
    }

    /// See [`PatchSession::begin_extend`]. Creates the session of `file` first if it has none.
    ///
    /// # Errors
    /// Returns the errors of [`Batch::begin_file`], otherwise as the session operation.
    pub fn begin_extend(&mut self, file: &Path, size: u32) -> Result<SectionHeader> {
        self.begin_file(file)?;
        self.run(file, |session, _| session.begin_extend(size))
    }

    /// See [`PatchSession::extend`].
    ///
    /// # Errors
    /// Returns [`crate::Error::NoSession`] for unknown files, otherwise as the session operation.
    pub fn extend(
        &mut self,
        file: &Path,
        type_name: &str,
        method_name: &str,
        insert: u32,
    ) -> Result<u32> {
        self.run(file, |session, diagnostics| {
            session.extend(type_name, method_name, insert, diagnostics)
        })
    }

    /// See [`PatchSession::end_extend`].
    ///
    /// # Errors
    /// Returns [`crate::Error::NoSession`] for unknown files, otherwise as the session operation.
    pub fn end_extend(&mut self, file: &Path) -> Result<bool> {
        self.run(file, |session, _| session.end_extend())
    }

    /// See [`PatchSession::begin_modify`]. Creates the session of `file` first if it has none.
    ///
    /// # Errors
    /// Returns the errors of [`Batch::begin_file`], otherwise as the session operation.
    pub fn begin_modify(&mut self, file: &Path) -> Result<()> {
        self.begin_file(file)?;
        self.run(file, |session, _| session.begin_modify())
    }

    /// See [`PatchSession::write_bytes`].
    ///
    /// # Errors
    /// Returns [`crate::Error::NoSession`] for unknown files, otherwise as the session operation.
    pub fn write_bytes(
        &mut self,
        file: &Path,
        type_name: &str,
        method_name: &str,
        position: u32,
        bytes: &[u8],
    ) -> Result<usize> {
        self.run(file, |session, diagnostics| {
            session.write_bytes(type_name, method_name, position, bytes, diagnostics)
        })
    }

    /// See [`PatchSession::write_load_arg`].
    ///
    /// # Errors
    /// Returns [`crate::Error::NoSession`] for unknown files, otherwise as the session operation.
    pub fn write_load_arg(
        &mut self,
        file: &Path,
        type_name: &str,
        method_name: &str,
        position: u32,
        index: u32,
    ) -> Result<usize> {
        self.run(file, |session, diagnostics| {
            session.write_load_arg(type_name, method_name, position, index, diagnostics)
        })
    }

    /// See [`PatchSession::write_load_local`].
    ///
    /// # Errors
    /// Returns [`crate::Error::NoSession`] for unknown files, otherwise as the session operation.
    pub fn write_load_local(
        &mut self,
        file: &Path,
        type_name: &str,
        method_name: &str,
        position: u32,
        index: u32,
    ) -> Result<usize> {
        self.run(file, |session, diagnostics| {
            session.write_load_local(type_name, method_name, position, index, diagnostics)
        })
    }

    /// See [`PatchSession::write_nops`].
    ///
    /// # Errors
    /// Returns [`crate::Error::NoSession`] for unknown files, otherwise as the session operation.
    pub fn write_nops(
        &mut self,
        file: &Path,
        type_name: &str,
        method_name: &str,
        position: u32,
        count: usize,
    ) -> Result<usize> {
        self.run(file, |session, diagnostics| {
            session.write_nops(type_name, method_name, position, count, diagnostics)
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn write_reference(
        &mut self,
        file: &Path,
        type_name: &str,
        method_name: &str,
        position: u32,
        opcode: RefOpcode,
        target_type: &str,
        member: &str,
    ) -> Result<usize> {
        self.run(file, |session, diagnostics| {
            session.write_reference(
                type_name,
                method_name,
                position,
                opcode,
                target_type,
                member,
                diagnostics,
            )
        })
    }

    /// Writes `ldfld` of field `field` of `field_type`. See [`PatchSession::write_reference`].
    ///
    /// # Errors
    /// Returns [`crate::Error::NoSession`] for unknown files, otherwise as the session operation.
    pub fn write_load_field(
        &mut self,
        file: &Path,
        type_name: &str,
        method_name: &str,
        position: u32,
        field_type: &str,
        field: &str,
    ) -> Result<usize> {
        self.write_reference(
            file,
            type_name,
            method_name,
            position,
            RefOpcode::Ldfld,
            field_type,
            field,
        )
    }

    /// Writes `ldsfld` of field `field` of `field_type`. See [`PatchSession::write_reference`].
    ///
    /// # Errors
    /// Returns [`crate::Error::NoSession`] for unknown files, otherwise as the session operation.
    pub fn write_load_static_field(
        &mut self,
        file: &Path,
        type_name: &str,
        method_name: &str,
        position: u32,
        field_type: &str,
        field: &str,
    ) -> Result<usize> {
        self.write_reference(
            file,
            type_name,
            method_name,
            position,
            RefOpcode::Ldsfld,
            field_type,
            field,
        )
    }

    /// Writes `call` of method `target` of `target_type`. See [`PatchSession::write_reference`].
    ///
    /// # Errors
    /// Returns [`crate::Error::NoSession`] for unknown files, otherwise as the session operation.
    pub fn write_call(
        &mut self,
        file: &Path,
        type_name: &str,
        method_name: &str,
        position: u32,
        target_type: &str,
        target: &str,
    ) -> Result<usize> {
        self.write_reference(
            file,
            type_name,
            method_name,
            position,
            RefOpcode::Call,
            target_type,
            target,
        )
    }

    /// Writes `callvirt` of method `target` of `target_type`. See
    /// [`PatchSession::write_reference`].
    ///
    /// # Errors
    /// Returns [`crate::Error::NoSession`] for unknown files, otherwise as the session operation.
    pub fn write_call_virt(
        &mut self,
        file: &Path,
        type_name: &str,
        method_name: &str,
        position: u32,
        target_type: &str,
        target: &str,
    ) -> Result<usize> {
        self.write_reference(
            file,
            type_name,
            method_name,
            position,
            RefOpcode::Callvirt,
            target_type,
            target,
        )
    }

    /// See [`PatchSession::end_modify`].
    ///
    /// # Errors
    /// Returns [`crate::Error::NoSession`] for unknown files, otherwise as the session operation.
    pub fn end_modify(&mut self, file: &Path) -> Result<()> {
        self.run(file, |session, _| session.end_modify())
    }
}
