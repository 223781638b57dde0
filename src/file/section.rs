//! PE section headers (`IMAGE_SECTION_HEADER`).

use goblin::pe::section_table::SectionTable;

use crate::{
    file::io::{write_bytes_at, write_le_at},
    Result,
};

/// Size of one entry in the PE section table.
pub const SECTION_HEADER_SIZE: usize = 40;

/// Characteristics of sections injected by `dotpatch`: `CNT_CODE | MEM_EXECUTE | MEM_READ`.
pub const CODE_SECTION_CHARACTERISTICS: u32 = 0x6000_0020;

/// One 40-byte entry of the PE section table.
///
/// Read once while loading an [`crate::Image`]. Copies are recomputed when a new section is
/// injected; the loaded headers themselves never change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    /// Raw, NUL-padded section name
    pub name: [u8; 8],
    /// Size of the section once mapped into memory
    pub virtual_size: u32,
    /// RVA of the first byte of the section
    pub virtual_address: u32,
    /// Size of the initialized data on disk
    pub size_of_raw_data: u32,
    /// File offset of the section data
    pub pointer_to_raw_data: u32,
    /// File offset of the COFF relocations (0 for images)
    pub pointer_to_relocations: u32,
    /// File offset of the COFF line numbers (0 for images)
    pub pointer_to_linenumbers: u32,
    /// Number of COFF relocations
    pub number_of_relocations: u16,
    /// Number of COFF line numbers
    pub number_of_linenumbers: u16,
    /// Section flags (`IMAGE_SCN_*`)
    pub characteristics: u32,
}

impl SectionHeader {
    /// Creates a new section header with the given `name`, truncated to 8 bytes.
    ///
    /// All addresses and sizes start at zero.
    #[must_use]
    pub fn new(name: &str, characteristics: u32) -> SectionHeader {
        let mut raw_name = [0u8; 8];
        for (slot, byte) in raw_name.iter_mut().zip(name.bytes()) {
            *slot = byte;
        }

        SectionHeader {
            name: raw_name,
            virtual_size: 0,
            virtual_address: 0,
            size_of_raw_data: 0,
            pointer_to_raw_data: 0,
            pointer_to_relocations: 0,
            pointer_to_linenumbers: 0,
            number_of_relocations: 0,
            number_of_linenumbers: 0,
            characteristics,
        }
    }

    /// The section name with trailing NUL padding removed.
    #[must_use]
    pub fn name(&self) -> String {
        let end = self.name.iter().position(|b| *b == 0).unwrap_or(8);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    /// `true` if `rva` falls within the raw data of this section.
    #[must_use]
    pub fn contains_rva(&self, rva: u32) -> bool {
        rva >= self.virtual_address
            && u64::from(rva) < u64::from(self.virtual_address) + u64::from(self.size_of_raw_data)
    }

    /// Serializes this header into `data` at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the 40 byte record does not fit.
    pub fn write(&self, data: &mut [u8], offset: usize) -> Result<()> {
        let mut cursor = offset;
        write_bytes_at(data, &mut cursor, &self.name)?;
        write_le_at(data, &mut cursor, self.virtual_size)?;
        write_le_at(data, &mut cursor, self.virtual_address)?;
        write_le_at(data, &mut cursor, self.size_of_raw_data)?;
        write_le_at(data, &mut cursor, self.pointer_to_raw_data)?;
        write_le_at(data, &mut cursor, self.pointer_to_relocations)?;
        write_le_at(data, &mut cursor, self.pointer_to_linenumbers)?;
        write_le_at(data, &mut cursor, self.number_of_relocations)?;
        write_le_at(data, &mut cursor, self.number_of_linenumbers)?;
        write_le_at(data, &mut cursor, self.characteristics)?;
        Ok(())
    }
}

impl From<&SectionTable> for SectionHeader {
    fn from(section: &SectionTable) -> Self {
        SectionHeader {
            name: section.name,
            virtual_size: section.virtual_size,
            virtual_address: section.virtual_address,
            size_of_raw_data: section.size_of_raw_data,
            pointer_to_raw_data: section.pointer_to_raw_data,
            pointer_to_relocations: section.pointer_to_relocations,
            pointer_to_linenumbers: section.pointer_to_linenumbers,
            number_of_relocations: section.number_of_relocations,
            number_of_linenumbers: section.number_of_linenumbers,
            characteristics: section.characteristics,
        }
    }
}
