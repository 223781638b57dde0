//! PE image loading, address translation, section injection and persistence.
//!
//! An [`Image`] exclusively owns the raw bytes of one managed PE file. The PE headers are parsed
//! and validated with `goblin`; everything `dotpatch` later mutates (metadata rows, method bodies,
//! the CLI header) is written straight into the owned buffer through the bounds-checked helpers
//! in [`crate::file::io`].
//!
//! # Section injection
//!
//! [`Image::prepare_new_section`] computes a new layout in which every existing section is
//! re-placed so that its virtual address equals its file pointer, the file alignment is forced to
//! the section alignment, and one additional section is appended. This keeps RVA arithmetic and
//! file offset arithmetic identical across the whole rewritten image. The loaded section table is
//! left untouched, so [`Image::file_offset`] keeps resolving addresses against the bytes that are
//! actually held in memory. [`Image::save_with_section`] then assembles the new file.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotpatch::Image;
//! use std::path::Path;
//!
//! let mut image = Image::from_file(Path::new("Game.dll"))?;
//! let header = image.prepare_new_section(".ilcode", 0x1000, false)?;
//! let code = vec![0u8; 0x1000];
//! image.save_with_section(Path::new("out/Game.dll"), &header, &code)?;
//! # Ok::<(), dotpatch::Error>(())
//! ```

pub mod io;
pub mod section;

use std::path::Path;

use goblin::pe::header::{Header, PE_MAGIC};
use log::{debug, warn};

use crate::{
    file::{
        io::{write_bytes_at, write_le_at},
        section::{SectionHeader, CODE_SECTION_CHARACTERISTICS, SECTION_HEADER_SIZE},
    },
    metadata::cor20header::Cor20Header,
    Error::{InvalidOffset, OutOfBounds},
    Result,
};

/// Optional header magic of PE32 images
pub const PE32_MAGIC: u16 = 0x10b;
/// Optional header magic of PE32+ images
pub const PE32_PLUS_MAGIC: u16 = 0x20b;

const COFF_HEADER_SIZE: usize = 20;
const COFF_NUMBER_OF_SECTIONS: usize = 2;
const OPT_SECTION_ALIGNMENT: usize = 32;
const OPT_FILE_ALIGNMENT: usize = 36;
const OPT_SIZE_OF_IMAGE: usize = 56;
const OPT_SIZE_OF_HEADERS: usize = 60;

/// Rounds `value` up to the next multiple of `alignment`. An alignment of 0 leaves the value as is.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the aligned value does not fit into 32 bits.
pub fn align_up(value: u32, alignment: u32) -> Result<u32> {
    if alignment == 0 {
        return Ok(value);
    }

    let aligned = u64::from(value).div_ceil(u64::from(alignment)) * u64::from(alignment);
    u32::try_from(aligned)
        .map_err(|_| malformed_error!("Aligned value overflows - {} / {}", value, alignment))
}

fn resolve_rva(sections: &[SectionHeader], rva: u32) -> Result<usize> {
    let Some(section) = sections
        .iter()
        .filter(|section| section.virtual_address <= rva)
        .max_by_key(|section| section.virtual_address)
    else {
        return Err(InvalidOffset(rva));
    };

    Ok((rva - section.virtual_address) as usize + section.pointer_to_raw_data as usize)
}

/// Headers and section table of the image that [`Image::save_with_section`] will write.
///
/// Produced by [`Image::prepare_new_section`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLayout {
    /// The existing sections, re-placed so that `virtual_address == pointer_to_raw_data`
    pub sections: Vec<SectionHeader>,
    /// File offset of the section header slot taken by the new section
    pub new_header_offset: usize,
    /// Section count written to the COFF header
    pub number_of_sections: u16,
    /// File alignment written to the optional header (equal to the section alignment)
    pub file_alignment: u32,
    /// `SizeOfHeaders` written to the optional header
    pub size_of_headers: u32,
    /// `SizeOfImage` written to the optional header
    pub size_of_image: u32,
}

/// A loaded managed PE image.
///
/// Owns the full file contents for the lifetime of a patch session; there is no streaming or
/// partial I/O.
pub struct Image {
    data: Vec<u8>,
    pe_offset: usize,
    optional_header_offset: usize,
    section_table_offset: usize,
    is_pe32_plus: bool,
    section_alignment: u32,
    file_alignment: u32,
    size_of_image: u32,
    size_of_headers: u32,
    sections: Vec<SectionHeader>,
    cor20_offset: usize,
    cor20: Cor20Header,
    layout: Option<SectionLayout>,
}

impl Image {
    /// Loads a PE image from disk.
    ///
    /// # Arguments
    /// * `path` - Location of the image
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file can not be read, and the same errors as
    /// [`Image::from_vec`] if its contents are not a valid managed image.
    pub fn from_file(path: &Path) -> Result<Image> {
        let data = std::fs::read(path)?;
        Self::from_vec(data)
    }

    /// Parses a PE image from an owned buffer.
    ///
    /// Validates the DOS and PE signatures, the optional header, the section table, the CLI data
    /// directory and the CLI header.
    ///
    /// # Errors
    /// Returns [`crate::Error::GoblinErr`] if the PE headers are rejected, or
    /// [`crate::Error::Malformed`] if the image is empty, has no optional header or no CLI header.
    pub fn from_vec(data: Vec<u8>) -> Result<Image> {
        if data.is_empty() {
            return Err(malformed_error!("Provided image is empty"));
        }

        let header = Header::parse(&data)?;
        if header.signature != PE_MAGIC {
            return Err(malformed_error!(
                "Invalid PE signature - 0x{:08X}",
                header.signature
            ));
        }

        let Some(optional_header) = header.optional_header else {
            return Err(malformed_error!("File does not have an OptionalHeader"));
        };

        let is_pe32_plus = match optional_header.standard_fields.magic {
            PE32_MAGIC => false,
            PE32_PLUS_MAGIC => true,
            magic => {
                return Err(malformed_error!(
                    "Unknown optional header magic - 0x{:X}",
                    magic
                ))
            }
        };

        let Some(clr_directory) = optional_header.data_directories.get_clr_runtime_header() else {
            return Err(malformed_error!(
                "File does not have a CLR runtime header directory"
            ));
        };
        let clr_rva = clr_directory.virtual_address;

        let pe_offset = header.dos_header.pe_pointer as usize;
        let optional_header_offset = pe_offset + 4 + COFF_HEADER_SIZE;
        let section_table_offset =
            optional_header_offset + usize::from(header.coff_header.size_of_optional_header);

        let mut offset = section_table_offset;
        let sections = header
            .coff_header
            .sections(&data, &mut offset)?
            .iter()
            .map(SectionHeader::from)
            .collect::<Vec<_>>();

        let cor20_offset = resolve_rva(&sections, clr_rva)?;
        let Some(cor20_data) = data.get(cor20_offset..) else {
            return Err(OutOfBounds);
        };
        let cor20 = Cor20Header::read(cor20_data)?;

        let windows_fields = optional_header.windows_fields;
        let image = Image {
            pe_offset,
            optional_header_offset,
            section_table_offset,
            is_pe32_plus,
            section_alignment: windows_fields.section_alignment,
            file_alignment: windows_fields.file_alignment,
            size_of_image: windows_fields.size_of_image,
            size_of_headers: windows_fields.size_of_headers,
            sections,
            cor20_offset,
            cor20,
            layout: None,
            data,
        };

        debug!(
            "Loaded {} image: {} sections, section alignment 0x{:X}, file alignment 0x{:X}, CLI header @ 0x{:X}",
            if is_pe32_plus { "PE32+" } else { "PE32" },
            image.sections.len(),
            image.section_alignment,
            image.file_alignment,
            cor20_offset
        );

        Ok(image)
    }

    /// The raw bytes of the image.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the raw bytes of the image.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Size of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if the image holds no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `true` for PE32+ (64-bit) images.
    #[must_use]
    pub fn is_pe32_plus(&self) -> bool {
        self.is_pe32_plus
    }

    /// The section table as loaded from the file.
    #[must_use]
    pub fn sections(&self) -> &[SectionHeader] {
        &self.sections
    }

    /// `SectionAlignment` from the optional header.
    #[must_use]
    pub fn section_alignment(&self) -> u32 {
        self.section_alignment
    }

    /// `FileAlignment` from the optional header.
    #[must_use]
    pub fn file_alignment(&self) -> u32 {
        self.file_alignment
    }

    /// `SizeOfImage` from the optional header.
    #[must_use]
    pub fn size_of_image(&self) -> u32 {
        self.size_of_image
    }

    /// `SizeOfHeaders` from the optional header.
    #[must_use]
    pub fn size_of_headers(&self) -> u32 {
        self.size_of_headers
    }

    /// The CLI header.
    #[must_use]
    pub fn cor20(&self) -> &Cor20Header {
        &self.cor20
    }

    /// File offset of the CLI header.
    #[must_use]
    pub fn cor20_offset(&self) -> usize {
        self.cor20_offset
    }

    /// The pending layout computed by the last call to [`Image::prepare_new_section`].
    #[must_use]
    pub fn layout(&self) -> Option<&SectionLayout> {
        self.layout.as_ref()
    }

    /// Maps a relative virtual address to a file offset.
    ///
    /// Among all sections whose virtual address is `<= rva`, the one with the greatest virtual
    /// address is selected and `rva - section.virtual_address + section.pointer_to_raw_data`
    /// returned.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOffset`] if no section starts at or below `rva`.
    pub fn file_offset(&self, rva: u32) -> Result<usize> {
        resolve_rva(&self.sections, rva)
    }

    /// Computes the layout for appending one new section and returns its header.
    ///
    /// Every existing section is re-placed so that its virtual address and file pointer both
    /// equal a running cursor that starts after the enlarged header area, with raw sizes rounded
    /// up to the section alignment. The file alignment is forced to the section alignment. The new
    /// section follows the last existing one and has `virtual_size == size`.
    ///
    /// When `for_metadata` is set, the CLI header's metadata directory is pointed at the new
    /// section and rewritten inside the loaded bytes, so the change travels with the section that
    /// contains the CLI header when the image is saved.
    ///
    /// The loaded section table is not modified; [`Image::file_offset`] keeps resolving against
    /// the bytes held in memory.
    ///
    /// # Arguments
    /// * `name` - Name of the new section (truncated to 8 bytes)
    /// * `size` - Number of bytes the new section will hold
    /// * `for_metadata` - Redirect the metadata directory to the new section
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the new layout overflows 32 bit addresses, or
    /// [`crate::Error::OutOfBounds`] if the CLI header can not be rewritten.
    pub fn prepare_new_section(
        &mut self,
        name: &str,
        size: u32,
        for_metadata: bool,
    ) -> Result<SectionHeader> {
        let alignment = self.section_alignment;
        let new_header_offset = self.section_table_offset + self.sections.len() * SECTION_HEADER_SIZE;
        let Ok(header_end) = u32::try_from(new_header_offset + SECTION_HEADER_SIZE) else {
            return Err(malformed_error!("Section table offset overflows"));
        };
        let Ok(number_of_sections) = u16::try_from(self.sections.len() + 1) else {
            return Err(malformed_error!("Too many sections"));
        };

        let size_of_headers = align_up(header_end, alignment)?;
        let mut cursor = size_of_headers;

        let mut sections = Vec::with_capacity(self.sections.len());
        for loaded in &self.sections {
            let mut relocated = loaded.clone();
            relocated.virtual_address = cursor;
            relocated.pointer_to_raw_data = cursor;
            relocated.size_of_raw_data = align_up(loaded.size_of_raw_data, alignment)?;

            if relocated.virtual_address != loaded.virtual_address {
                warn!(
                    "Section {} moves from RVA 0x{:X} to 0x{:X}",
                    loaded.name(),
                    loaded.virtual_address,
                    relocated.virtual_address
                );
            }

            let Some(end) = cursor.checked_add(relocated.size_of_raw_data) else {
                return Err(malformed_error!("Section layout overflows at {}", loaded.name()));
            };
            cursor = align_up(end, alignment)?;
            sections.push(relocated);
        }

        let mut header = SectionHeader::new(name, CODE_SECTION_CHARACTERISTICS);
        header.virtual_size = size;
        header.virtual_address = cursor;
        header.pointer_to_raw_data = cursor;
        header.size_of_raw_data = align_up(size, alignment)?;

        let Some(image_end) = header.virtual_address.checked_add(header.size_of_raw_data) else {
            return Err(malformed_error!("New section overflows the address space"));
        };
        let size_of_image = align_up(image_end, alignment)?;

        if for_metadata {
            self.cor20.meta_data_rva = header.virtual_address;
            self.cor20.meta_data_size = size;
            self.cor20.write(&mut self.data, self.cor20_offset)?;
        }

        debug!(
            "Prepared section {} @ 0x{:X} (0x{:X} bytes, raw 0x{:X}), SizeOfImage 0x{:X}",
            header.name(),
            header.virtual_address,
            size,
            header.size_of_raw_data,
            size_of_image
        );

        self.layout = Some(SectionLayout {
            sections,
            new_header_offset,
            number_of_sections,
            file_alignment: alignment,
            size_of_headers,
            size_of_image,
        });

        Ok(header)
    }

    /// Persists the current bytes verbatim.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file can not be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }

    /// Persists a new image assembled from the pending layout plus the new section.
    ///
    /// See [`Image::to_bytes_with_section`] for the layout of the written file.
    ///
    /// # Errors
    /// Returns the errors of [`Image::to_bytes_with_section`], or [`crate::Error::FileError`] if
    /// the file can not be written.
    pub fn save_with_section(
        &self,
        path: &Path,
        header: &SectionHeader,
        section_data: &[u8],
    ) -> Result<()> {
        let bytes = self.to_bytes_with_section(header, section_data)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Assembles a new image from the pending layout plus the new section.
    ///
    /// The result is `header.pointer_to_raw_data + header.size_of_raw_data` bytes long and holds
    /// the DOS and NT headers with updated section count, alignment and sizes, the re-placed
    /// section table followed by `header`, every original section's raw bytes at its new file
    /// pointer and `section_data` at the new section's file pointer. Anything not covered is zero.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if [`Image::prepare_new_section`] has not been called,
    /// or [`crate::Error::BufferOverflow`] if `section_data` is larger than the new section.
    pub fn to_bytes_with_section(
        &self,
        header: &SectionHeader,
        section_data: &[u8],
    ) -> Result<Vec<u8>> {
        let Some(layout) = &self.layout else {
            return Err(malformed_error!(
                "No section has been prepared for this image"
            ));
        };

        if section_data.len() > header.size_of_raw_data as usize {
            return Err(crate::Error::BufferOverflow {
                requested: section_data.len(),
                capacity: header.size_of_raw_data as usize,
            });
        }

        let total = header.pointer_to_raw_data as usize + header.size_of_raw_data as usize;
        let mut buffer = vec![0u8; total];

        let mut cursor = 0;
        let Some(headers) = self.data.get(..self.section_table_offset) else {
            return Err(OutOfBounds);
        };
        write_bytes_at(&mut buffer, &mut cursor, headers)?;

        let mut cursor = self.pe_offset + 4 + COFF_NUMBER_OF_SECTIONS;
        write_le_at(&mut buffer, &mut cursor, layout.number_of_sections)?;
        let mut cursor = self.optional_header_offset + OPT_SECTION_ALIGNMENT;
        write_le_at(&mut buffer, &mut cursor, self.section_alignment)?;
        let mut cursor = self.optional_header_offset + OPT_FILE_ALIGNMENT;
        write_le_at(&mut buffer, &mut cursor, layout.file_alignment)?;
        let mut cursor = self.optional_header_offset + OPT_SIZE_OF_IMAGE;
        write_le_at(&mut buffer, &mut cursor, layout.size_of_image)?;
        let mut cursor = self.optional_header_offset + OPT_SIZE_OF_HEADERS;
        write_le_at(&mut buffer, &mut cursor, layout.size_of_headers)?;

        for (index, section) in layout.sections.iter().enumerate() {
            section.write(&mut buffer, self.section_table_offset + index * SECTION_HEADER_SIZE)?;
        }
        header.write(&mut buffer, layout.new_header_offset)?;

        for (loaded, relocated) in self.sections.iter().zip(&layout.sections) {
            let source = loaded.pointer_to_raw_data as usize;
            let available = self.data.len().saturating_sub(source);
            let len = (loaded.size_of_raw_data as usize)
                .min(relocated.size_of_raw_data as usize)
                .min(available);
            if len == 0 {
                continue;
            }

            let mut cursor = relocated.pointer_to_raw_data as usize;
            write_bytes_at(&mut buffer, &mut cursor, &self.data[source..source + len])?;
        }

        let mut cursor = header.pointer_to_raw_data as usize;
        write_bytes_at(&mut buffer, &mut cursor, section_data)?;

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::builder::{tiny_body, ManagedImageBuilder, TestType};

    fn sample() -> (Vec<u8>, Image) {
        let built = ManagedImageBuilder::new()
            .add_type(TestType::new("Demo", "A").method("Foo", &[0x00, 0x00, 0x01], tiny_body(&[0x2A])))
            .build();
        let image = Image::from_vec(built.bytes.clone()).unwrap();
        (built.bytes, image)
    }

    #[test]
    fn align() {
        assert_eq!(align_up(0, 0x200).unwrap(), 0);
        assert_eq!(align_up(1, 0x200).unwrap(), 0x200);
        assert_eq!(align_up(0x200, 0x200).unwrap(), 0x200);
        assert_eq!(align_up(0x201, 0x200).unwrap(), 0x400);
        assert_eq!(align_up(0x123, 0).unwrap(), 0x123);
        assert!(align_up(u32::MAX, 0x1000).is_err());
    }

    #[test]
    fn load() {
        let (bytes, image) = sample();

        assert_eq!(image.len(), bytes.len());
        assert!(!image.is_pe32_plus());
        assert_eq!(image.sections().len(), 1);
        assert_eq!(image.sections()[0].name(), ".text");
        assert_eq!(image.section_alignment(), 0x2000);
        assert_eq!(image.file_alignment(), 0x200);
        assert_eq!(image.cor20().cb, 72);
        assert_eq!(image.cor20_offset(), 0x200);
    }

    #[test]
    fn load_pe32_plus() {
        let built = ManagedImageBuilder::new()
            .pe32_plus()
            .add_type(TestType::new("Demo", "A").method("Foo", &[0x00, 0x00, 0x01], tiny_body(&[0x2A])))
            .build();
        let image = Image::from_vec(built.bytes).unwrap();
        assert!(image.is_pe32_plus());
        assert_eq!(image.cor20().cb, 72);
    }

    #[test]
    fn file_offset_per_section() {
        let (_, image) = sample();
        for section in image.sections() {
            assert_eq!(
                image.file_offset(section.virtual_address).unwrap(),
                section.pointer_to_raw_data as usize
            );
            let inner = section.virtual_address + section.size_of_raw_data - 1;
            assert_eq!(
                image.file_offset(inner).unwrap(),
                (inner - section.virtual_address + section.pointer_to_raw_data) as usize
            );
        }

        assert!(matches!(image.file_offset(0x1000), Err(InvalidOffset(0x1000))));
    }

    #[test]
    fn save_roundtrip_is_identical() {
        let (bytes, image) = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.dll");

        image.save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn reject_garbage() {
        assert!(Image::from_vec(Vec::new()).is_err());
        assert!(Image::from_vec(vec![0x4D, 0x5A, 0x00, 0x00]).is_err());

        let (mut bytes, _) = sample();
        bytes[0] = b'X';
        assert!(Image::from_vec(bytes.clone()).is_err());

        bytes[0] = b'M';
        bytes[0x80] = b'N';
        assert!(matches!(
            Image::from_vec(bytes),
            Err(crate::Error::Malformed { .. })
        ));
    }

    #[test]
    fn reject_missing_clr_directory() {
        let built = ManagedImageBuilder::new()
            .without_clr_directory()
            .add_type(TestType::new("Demo", "A"))
            .build();
        assert!(matches!(
            Image::from_vec(built.bytes),
            Err(crate::Error::Malformed { .. })
        ));
    }

    #[test]
    fn prepare_new_section_layout() {
        let (_, mut image) = sample();
        let header = image.prepare_new_section(".ilcode", 0x1234, false).unwrap();
        let layout = image.layout().unwrap().clone();

        assert_eq!(layout.number_of_sections, 2);
        assert_eq!(layout.file_alignment, 0x2000);
        assert_eq!(layout.size_of_headers, 0x2000);
        assert_eq!(layout.sections[0].virtual_address, 0x2000);
        assert_eq!(layout.sections[0].pointer_to_raw_data, 0x2000);
        assert_eq!(layout.sections[0].size_of_raw_data, 0x2000);

        assert_eq!(header.name(), ".ilcode");
        assert_eq!(header.virtual_size, 0x1234);
        assert_eq!(header.virtual_address, 0x4000);
        assert_eq!(header.pointer_to_raw_data, 0x4000);
        assert_eq!(header.size_of_raw_data, 0x2000);
        assert_eq!(header.characteristics, CODE_SECTION_CHARACTERISTICS);
        assert_eq!(layout.size_of_image, 0x6000);

        // loaded table stays authoritative for the in-memory bytes
        assert_eq!(image.sections()[0].pointer_to_raw_data, 0x200);
    }

    #[test]
    fn save_with_section_relocates() {
        let (bytes, mut image) = sample();
        let header = image.prepare_new_section(".ilcode", 16, false).unwrap();
        let payload = [0xAAu8; 16];
        let out = image.to_bytes_with_section(&header, &payload).unwrap();

        assert_eq!(out.len(), (header.pointer_to_raw_data + header.size_of_raw_data) as usize);

        let reloaded = Image::from_vec(out.clone()).unwrap();
        assert_eq!(reloaded.sections().len(), 2);
        assert_eq!(reloaded.file_alignment(), 0x2000);
        assert_eq!(reloaded.size_of_image(), 0x6000);
        assert_eq!(reloaded.size_of_headers(), 0x2000);
        for section in reloaded.sections() {
            assert_eq!(section.virtual_address, section.pointer_to_raw_data);
        }

        let old_text = &image.sections()[0];
        let new_text = &reloaded.sections()[0];
        let len = old_text.size_of_raw_data as usize;
        assert_eq!(
            &out[new_text.pointer_to_raw_data as usize..][..len],
            &bytes[old_text.pointer_to_raw_data as usize..][..len]
        );
        assert_eq!(&out[0x4000..0x4010], &payload);
        assert_eq!(reloaded.cor20(), image.cor20());
    }

    #[test]
    fn save_with_section_for_metadata() {
        let (_, mut image) = sample();
        let header = image.prepare_new_section(".meta", 0x300, true).unwrap();
        assert_eq!(image.cor20().meta_data_rva, header.virtual_address);
        assert_eq!(image.cor20().meta_data_size, 0x300);

        let out = image.to_bytes_with_section(&header, &[]).unwrap();
        let reloaded = Image::from_vec(out).unwrap();
        assert_eq!(reloaded.cor20().meta_data_rva, 0x4000);
        assert_eq!(reloaded.cor20().meta_data_size, 0x300);
    }

    #[test]
    fn save_with_section_requires_layout() {
        let (_, image) = sample();
        let header = SectionHeader::new(".ilcode", CODE_SECTION_CHARACTERISTICS);
        assert!(image.to_bytes_with_section(&header, &[]).is_err());
    }

    #[test]
    fn save_with_section_too_large() {
        let (_, mut image) = sample();
        let header = image.prepare_new_section(".ilcode", 4, false).unwrap();
        let payload = vec![0u8; header.size_of_raw_data as usize + 1];
        assert!(matches!(
            image.to_bytes_with_section(&header, &payload),
            Err(crate::Error::BufferOverflow { .. })
        ));
    }
}
