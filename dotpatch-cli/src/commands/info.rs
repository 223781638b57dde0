use std::path::Path;

use dotpatch::metadata::tables::{TableId, MAX_TABLES};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_image,
    output::{hex32, print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
pub struct ImageInfo {
    pub format: String,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub size_of_image: u32,
    pub runtime_version: String,
    pub metadata_rva: String,
    pub entry_point_token: String,
    pub cor_flags: String,
    pub sections: Vec<SectionInfo>,
    pub streams: Vec<StreamInfo>,
    pub tables: Vec<TableInfo>,
}

#[derive(Debug, Serialize)]
pub struct SectionInfo {
    pub name: String,
    pub virtual_address: String,
    pub virtual_size: u32,
    pub pointer_to_raw_data: String,
    pub size_of_raw_data: u32,
    pub characteristics: String,
}

#[derive(Debug, Serialize)]
pub struct StreamInfo {
    pub name: String,
    pub offset: String,
    pub size: u32,
}

#[derive(Debug, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub rows: u32,
    pub row_size: usize,
}

pub fn run(path: &Path, opts: &GlobalOptions) -> anyhow::Result<()> {
    let (image, metadata) = load_image(path)?;
    let cor20 = image.cor20();
    let root = metadata.root();

    let sections = image
        .sections()
        .iter()
        .map(|section| SectionInfo {
            name: section.name(),
            virtual_address: hex32(section.virtual_address),
            virtual_size: section.virtual_size,
            pointer_to_raw_data: hex32(section.pointer_to_raw_data),
            size_of_raw_data: section.size_of_raw_data,
            characteristics: hex32(section.characteristics),
        })
        .collect();

    let streams = root
        .stream_headers
        .iter()
        .map(|header| StreamInfo {
            name: header.name.clone(),
            offset: hex32(header.offset),
            size: header.size,
        })
        .collect();

    // Kinds without a TableId have no row layout and are left out
    let tables = (0..MAX_TABLES)
        .filter_map(|kind| u8::try_from(kind).ok().and_then(TableId::from_repr))
        .filter(|&table| metadata.row_count(table) > 0)
        .map(|table| TableInfo {
            name: format!("{table:?}"),
            rows: metadata.row_count(table),
            row_size: metadata.layout(table).row_size(),
        })
        .collect();

    let info = ImageInfo {
        format: if image.is_pe32_plus() { "PE32+" } else { "PE32" }.to_string(),
        section_alignment: image.section_alignment(),
        file_alignment: image.file_alignment(),
        size_of_image: image.size_of_image(),
        runtime_version: root.version.clone(),
        metadata_rva: hex32(cor20.meta_data_rva),
        entry_point_token: hex32(cor20.entry_point_token),
        cor_flags: hex32(cor20.flags),
        sections,
        streams,
        tables,
    };

    print_output(&info, opts, |info| {
        println!("Format:           {}", info.format);
        println!("Runtime:          {}", info.runtime_version);
        println!("Entry point:      {}", info.entry_point_token);
        println!("CorFlags:         {}", info.cor_flags);
        println!("Metadata RVA:     {}", info.metadata_rva);
        println!(
            "Alignment:        section 0x{:X}, file 0x{:X}",
            info.section_alignment, info.file_alignment
        );
        println!("Size of image:    0x{:X}", info.size_of_image);

        println!();
        println!("Sections:");
        let mut tw = TabWriter::new(vec![
            ("Name", Align::Left),
            ("VA", Align::Left),
            ("VSize", Align::Right),
            ("Raw", Align::Left),
            ("RawSize", Align::Right),
            ("Flags", Align::Left),
        ])
        .indent("  ");
        for section in &info.sections {
            tw.row(vec![
                section.name.clone(),
                section.virtual_address.clone(),
                format!("0x{:X}", section.virtual_size),
                section.pointer_to_raw_data.clone(),
                format!("0x{:X}", section.size_of_raw_data),
                section.characteristics.clone(),
            ]);
        }
        tw.print();

        println!();
        println!("Streams:");
        let mut tw = TabWriter::new(vec![
            ("Name", Align::Left),
            ("Offset", Align::Left),
            ("Size", Align::Right),
        ])
        .indent("  ");
        for stream in &info.streams {
            tw.row(vec![
                stream.name.clone(),
                stream.offset.clone(),
                format!("0x{:X}", stream.size),
            ]);
        }
        tw.print();

        println!();
        println!("Tables:");
        let mut tw = TabWriter::new(vec![
            ("Table", Align::Left),
            ("Rows", Align::Right),
            ("RowSize", Align::Right),
        ])
        .indent("  ");
        for table in &info.tables {
            tw.row(vec![
                table.name.clone(),
                table.rows.to_string(),
                table.row_size.to_string(),
            ]);
        }
        tw.print();
    })
}
