use std::path::Path;

use anyhow::Context;
use dotpatch::{metadata::MetadataStream, Image};

use crate::script::Script;

/// Load a PE image and its metadata directory.
pub fn load_image(path: &Path) -> anyhow::Result<(Image, MetadataStream)> {
    let image = Image::from_file(path)
        .with_context(|| format!("failed to load assembly: {}", path.display()))?;
    let metadata = MetadataStream::from_image(&image)
        .with_context(|| format!("failed to parse metadata: {}", path.display()))?;
    Ok((image, metadata))
}

/// Read and parse a patch script.
pub fn load_script(path: &Path) -> anyhow::Result<Script> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script: {}", path.display()))?;
    Script::parse(&text).with_context(|| format!("invalid script: {}", path.display()))
}
