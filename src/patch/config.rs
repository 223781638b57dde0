//! Settings shared by all sessions of a batch.

use std::path::PathBuf;

use crate::file::section::CODE_SECTION_CHARACTERISTICS;

/// Name of the section that receives extended method bodies
pub const DEFAULT_SECTION_NAME: &str = ".ilcode";

/// Configuration of a patch batch.
///
/// # Examples
///
/// ```rust
/// use dotpatch::patch::PatchConfig;
///
/// let config = PatchConfig {
///     promoted_max_stack: 64,
///     ..PatchConfig::new("out")
/// };
/// assert_eq!(config.section_name, ".ilcode");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchConfig {
    /// Directory receiving the patched copies; inputs are never written in place
    pub output_dir: PathBuf,

    /// Name of the injected code section (at most 8 bytes are kept)
    pub section_name: String,

    /// Characteristics of the injected section, code | execute | read by default
    pub section_characteristics: u32,

    /// Max stack written into headers promoted from compact to extended while extending.
    /// The real depth is not computed, so the default is the largest representable value.
    pub promoted_max_stack: u16,
}

impl PatchConfig {
    /// The default configuration writing into `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> PatchConfig {
        PatchConfig {
            output_dir: output_dir.into(),
            ..PatchConfig::default()
        }
    }
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("patched"),
            section_name: DEFAULT_SECTION_NAME.to_string(),
            section_characteristics: CODE_SECTION_CHARACTERISTICS,
            promoted_max_stack: u16::MAX,
        }
    }
}
