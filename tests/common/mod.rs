//! Shared fixtures for the integration tests.

#![allow(dead_code)]

#[path = "../../src/test/builder.rs"]
pub mod builder;

use std::path::PathBuf;

use dotpatch::prelude::*;
use tempfile::TempDir;

/// A temporary input file plus the batch writing into `<dir>/out`.
pub struct Workspace {
    pub dir: TempDir,
    pub input: PathBuf,
    pub batch: Batch,
}

impl Workspace {
    pub fn new(bytes: &[u8]) -> Workspace {
        Workspace::with_config(bytes, |config| config)
    }

    pub fn with_config(bytes: &[u8], config: impl FnOnce(PatchConfig) -> PatchConfig) -> Workspace {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("game.dll");
        std::fs::write(&input, bytes).unwrap();

        let config = config(PatchConfig::new(dir.path().join("out")));
        Workspace {
            dir,
            input,
            batch: Batch::new(config),
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.dir.path().join("out").join("game.dll")
    }

    pub fn output(&self) -> Vec<u8> {
        std::fs::read(self.output_path()).unwrap()
    }

    pub fn output_image(&self) -> Image {
        Image::from_file(&self.output_path()).unwrap()
    }
}

/// RVA of MethodDef row `rid` of `image`.
pub fn method_rva(image: &Image, rid: u32) -> Result<u32> {
    let metadata = MetadataStream::from_image(image)?;
    let mut methods = metadata.table(TableId::MethodDef);
    assert!(methods.move_to_rid(rid));
    methods.get(image.data(), "RVA")
}

/// The body and code of MethodDef row `rid` of `image`.
pub fn method_body(image: &Image, rid: u32) -> Result<(MethodBody, Vec<u8>)> {
    let offset = image.file_offset(method_rva(image, rid)?)?;
    let data = &image.data()[offset..];
    let body = MethodBody::from(data)?;
    let code = body.code(data)?.to_vec();
    Ok((body, code))
}
