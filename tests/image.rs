//! Image level round trips through the public API.

mod common;

use common::builder::*;
use dotpatch::prelude::*;

#[test]
fn unmodified_save_is_identical() -> Result<()> {
    let built = two_type_image();
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("in.dll");
    let output = dir.path().join("out.dll");
    std::fs::write(&input, &built.bytes)?;

    let image = Image::from_file(&input)?;
    image.save(&output)?;
    assert_eq!(std::fs::read(&output)?, built.bytes);
    Ok(())
}

#[test]
fn metadata_relocation() -> Result<()> {
    let built = two_type_image();
    let mut image = Image::from_vec(built.bytes)?;

    let cor20 = image.cor20();
    let (rva, size) = (cor20.meta_data_rva, cor20.meta_data_size);
    let offset = image.file_offset(rva)?;
    let copy = image.data()[offset..offset + size as usize].to_vec();

    let header = image.prepare_new_section(".meta", size, true)?;
    let relocated = Image::from_vec(image.to_bytes_with_section(&header, &copy)?)?;
    assert_eq!(relocated.cor20().meta_data_rva, header.virtual_address);

    let metadata = MetadataStream::from_image(&relocated)?;
    assert!(metadata.root_offset() >= header.pointer_to_raw_data as usize);
    assert_eq!(metadata.row_count(TableId::MethodDef), 4);

    let data = relocated.data();
    let mut types = metadata.table(TableId::TypeDef);
    assert!(types.move_to_last());
    assert_eq!(metadata.string(data, types.get(data, "TypeName")?)?, "B");
    Ok(())
}

#[test]
fn every_table_resolves_a_layout() -> Result<()> {
    let image = Image::from_vec(two_type_image().bytes)?;
    let metadata = MetadataStream::from_image(&image)?;

    for (table, expected) in [
        (TableId::Module, 10),
        (TableId::TypeDef, 14),
        (TableId::MethodDef, 14),
        (TableId::CustomAttribute, 6),
        (TableId::GenericParamConstraint, 4),
    ] {
        assert_eq!(metadata.layout(table).row_size(), expected, "{table:?}");
    }
    Ok(())
}
