//! End-to-end tests of body extension into an injected section.

mod common;

use common::{builder::*, method_body, method_rva, Workspace};
use dotpatch::prelude::*;

#[test]
fn extend_injects_section() -> Result<()> {
    let built = two_type_image();
    let mut ws = Workspace::new(&built.bytes);
    let input = ws.input.clone();

    ws.batch.begin(1);
    ws.batch.begin_file(&input)?;
    let header = ws.batch.begin_extend(&input, 0x400)?;
    let foo = ws.batch.extend(&input, "Demo.A", "Foo", 4)?;
    let other = ws.batch.extend(&input, "Demo.B", "Foo", 61)?;
    assert!(ws.batch.end_extend(&input)?);
    ws.batch.end_file(&input);
    assert!(ws.batch.end().is_empty());

    assert_eq!(foo, header.virtual_address);
    assert_eq!(other % 4, 0);
    assert!(other > foo);

    let output = ws.output();
    assert_eq!(
        output.len(),
        (header.pointer_to_raw_data + header.size_of_raw_data) as usize
    );

    let image = ws.output_image();
    assert_eq!(image.sections().len(), 2);
    assert_eq!(image.file_alignment(), image.section_alignment());
    for section in image.sections() {
        assert_eq!(section.virtual_address, section.pointer_to_raw_data);
    }
    let injected = &image.sections()[1];
    assert_eq!(injected.name(), ".ilcode");
    assert_eq!(injected.characteristics, 0x6000_0020);

    let (body, code) = method_body(&image, 2)?;
    assert_eq!(body.kind, MethodHeaderKind::Compact);
    assert_eq!(code, [0x00, 0x00, 0x00, 0x00, 0x17, 0x26, 0x2A]);

    let (body, code) = method_body(&image, 4)?;
    assert_eq!(body.kind, MethodHeaderKind::Extended);
    assert_eq!(body.max_stack, u16::MAX);
    assert_eq!(body.size_code, 64);
    assert_eq!(&code[61..], &[0x18, 0x26, 0x2A]);

    // untouched methods keep their bodies in .text
    assert_eq!(method_rva(&image, 1)?, built.method_rvas[0]);
    let (_, code) = method_body(&image, 1)?;
    assert_eq!(code, [0x02, 0x2A]);
    Ok(())
}

#[test]
fn extend_then_modify() -> Result<()> {
    let built = two_type_image();
    let mut ws = Workspace::new(&built.bytes);
    let input = ws.input.clone();

    ws.batch.begin(1);
    ws.batch.begin_file(&input)?;
    ws.batch.begin_extend(&input, 0x100)?;
    ws.batch.extend(&input, "Demo.A", "Foo", 2)?;
    ws.batch.end_extend(&input)?;

    ws.batch.begin_modify(&input)?;
    ws.batch.write_load_arg(&input, "Demo.A", "Foo", 0, 0)?;
    ws.batch.write_load_local(&input, "Demo.A", "Foo", 1, 1)?;
    ws.batch.end_modify(&input)?;
    assert!(ws.batch.end().is_empty());

    let (_, code) = method_body(&ws.output_image(), 2)?;
    assert_eq!(code, [0x02, 0x07, 0x17, 0x26, 0x2A]);
    Ok(())
}

#[test]
fn extend_overflow_is_reported() -> Result<()> {
    let built = two_type_image();
    let mut ws = Workspace::new(&built.bytes);
    let input = ws.input.clone();

    ws.batch.begin(1);
    ws.batch.begin_file(&input)?;
    ws.batch.begin_extend(&input, 4)?;
    let result = ws.batch.extend(&input, "Demo.A", "Foo", 8);
    assert!(matches!(
        result,
        Err(Error::BufferOverflow {
            requested: 12,
            capacity: 4
        })
    ));
    assert!(!ws.batch.end_extend(&input)?);

    let diagnostics = ws.batch.end();
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].message.contains("overflow"));
    assert_eq!(ws.output(), built.bytes);
    Ok(())
}

#[test]
fn extend_uses_configured_section() -> Result<()> {
    let code = [0x00u8; 62];
    let built = ManagedImageBuilder::new()
        .pe32_plus()
        .add_type(TestType::new("Demo", "A").method("Foo", SIG_VOID, tiny_body(&code)))
        .build();
    let mut ws = Workspace::with_config(&built.bytes, |config| PatchConfig {
        section_name: ".hook".to_string(),
        section_characteristics: 0x6000_0060,
        promoted_max_stack: 32,
        ..config
    });
    let input = ws.input.clone();

    ws.batch.begin(1);
    ws.batch.begin_file(&input)?;
    ws.batch.begin_extend(&input, 0x100)?;
    ws.batch.extend(&input, "A", "Foo", 2)?;
    ws.batch.end_extend(&input)?;

    let image = ws.output_image();
    assert!(image.is_pe32_plus());
    assert_eq!(image.sections()[1].name(), ".hook");
    assert_eq!(image.sections()[1].characteristics, 0x6000_0060);

    let (body, code) = method_body(&image, 1)?;
    assert_eq!(body.kind, MethodHeaderKind::Extended);
    assert_eq!(body.max_stack, 32);
    assert_eq!(code.len(), 64);
    Ok(())
}
