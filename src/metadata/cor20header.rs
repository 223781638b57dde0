//! CLR 2.0 (Cor20) header parsing and serialization.
//!
//! The [`Cor20Header`] sits at the start of the `IMAGE_DIRECTORY_ENTRY_COM_DESCRIPTOR` data
//! directory and points at the metadata root. `dotpatch` reads it once per load and rewrites it
//! in place when metadata is relocated into an injected section.
//!
//! # Reference
//! - [ECMA-335 II.25.3.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::io::{read_le_at, write_le_at},
    Error::OutOfBounds,
    Result,
};

/// Size of the CLI header as defined by ECMA-335.
pub const COR20_HEADER_SIZE: usize = 72;

/// The main header of CIL, located at the beginning of the `IMAGE_DIRECTORY_ENTRY_COM_DESCRIPTOR`
/// data directory of PE files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cor20Header {
    /// Size of header in bytes
    pub cb: u32,
    /// The minimum version of runtime required to run this program
    pub major_runtime_version: u16,
    /// The minor portion of the version
    pub minor_runtime_version: u16,
    /// RVA of the `MetaData`
    pub meta_data_rva: u32,
    /// Size of the `MetaData`
    pub meta_data_size: u32,
    /// Flags describing this runtime
    pub flags: u32,
    /// Token for the `MethodDef` or File of the entry point for the image
    pub entry_point_token: u32,
    /// RVA of implementation specific resources
    pub resource_rva: u32,
    /// Size of implementation specific resources
    pub resource_size: u32,
    /// RVA of the hash data for this pe file used by the CLI loader for binding and versioning
    pub strong_name_signature_rva: u32,
    /// Size of the hash data
    pub strong_name_signature_size: u32,
    /// Always 0
    pub code_manager_table_rva: u32,
    /// Always 0
    pub code_manager_table_size: u32,
    /// RVA of an array of locations in the file that contain an array of functions pointers
    pub vtable_fixups_rva: u32,
    /// Size of an array of locations in the file that contain an array of functions pointers
    pub vtable_fixups_size: u32,
    /// Always 0
    pub export_address_table_jmp_rva: u32,
    /// Always 0
    pub export_address_table_jmp_size: u32,
    /// Always 0
    pub managed_native_header_rva: u32,
    /// Always 0
    pub managed_native_header_size: u32,
}

impl Cor20Header {
    /// Create a `Cor20Header` object from a sequence of bytes
    ///
    /// # Arguments
    /// * `data` - The byte slice starting at the CLI header
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 72 bytes are available, or
    /// [`crate::Error::Malformed`] if the header size or metadata directory is invalid.
    pub fn read(data: &[u8]) -> Result<Cor20Header> {
        if data.len() < COR20_HEADER_SIZE {
            return Err(OutOfBounds);
        }

        let mut offset = 0_usize;
        let cb = read_le_at::<u32>(data, &mut offset)?;
        if (cb as usize) < COR20_HEADER_SIZE {
            return Err(malformed_error!(
                "Invalid CLR header size: expected 72, got {}",
                cb
            ));
        }

        let header = Cor20Header {
            cb,
            major_runtime_version: read_le_at::<u16>(data, &mut offset)?,
            minor_runtime_version: read_le_at::<u16>(data, &mut offset)?,
            meta_data_rva: read_le_at::<u32>(data, &mut offset)?,
            meta_data_size: read_le_at::<u32>(data, &mut offset)?,
            flags: read_le_at::<u32>(data, &mut offset)?,
            entry_point_token: read_le_at::<u32>(data, &mut offset)?,
            resource_rva: read_le_at::<u32>(data, &mut offset)?,
            resource_size: read_le_at::<u32>(data, &mut offset)?,
            strong_name_signature_rva: read_le_at::<u32>(data, &mut offset)?,
            strong_name_signature_size: read_le_at::<u32>(data, &mut offset)?,
            code_manager_table_rva: read_le_at::<u32>(data, &mut offset)?,
            code_manager_table_size: read_le_at::<u32>(data, &mut offset)?,
            vtable_fixups_rva: read_le_at::<u32>(data, &mut offset)?,
            vtable_fixups_size: read_le_at::<u32>(data, &mut offset)?,
            export_address_table_jmp_rva: read_le_at::<u32>(data, &mut offset)?,
            export_address_table_jmp_size: read_le_at::<u32>(data, &mut offset)?,
            managed_native_header_rva: read_le_at::<u32>(data, &mut offset)?,
            managed_native_header_size: read_le_at::<u32>(data, &mut offset)?,
        };

        if header.meta_data_rva == 0 || header.meta_data_size == 0 {
            return Err(malformed_error!(
                "CLR header has an empty metadata directory - 0x{:08X}/0x{:X}",
                header.meta_data_rva,
                header.meta_data_size
            ));
        }

        Ok(header)
    }

    /// Serialize this header into `data` at `offset`, overwriting all 72 bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the header does not fit.
    pub fn write(&self, data: &mut [u8], offset: usize) -> Result<()> {
        let mut cursor = offset;
        write_le_at(data, &mut cursor, self.cb)?;
        write_le_at(data, &mut cursor, self.major_runtime_version)?;
        write_le_at(data, &mut cursor, self.minor_runtime_version)?;
        for value in [
            self.meta_data_rva,
            self.meta_data_size,
            self.flags,
            self.entry_point_token,
            self.resource_rva,
            self.resource_size,
            self.strong_name_signature_rva,
            self.strong_name_signature_size,
            self.code_manager_table_rva,
            self.code_manager_table_size,
            self.vtable_fixups_rva,
            self.vtable_fixups_size,
            self.export_address_table_jmp_rva,
            self.export_address_table_jmp_size,
            self.managed_native_header_rva,
            self.managed_native_header_size,
        ] {
            write_le_at(data, &mut cursor, value)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rustfmt::skip]
    const HEADER: [u8; 72] = [
        0x48, 0x00, 0x00, 0x00, // cb = 72
        0x02, 0x00,             // major_runtime_version = 2
        0x05, 0x00,             // minor_runtime_version = 5
        0x00, 0x21, 0x00, 0x00, // meta_data_rva = 0x2100
        0x40, 0x02, 0x00, 0x00, // meta_data_size = 0x240
        0x01, 0x00, 0x00, 0x00, // flags = ILONLY
        0x01, 0x00, 0x00, 0x06, // entry_point_token = 0x06000001
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn crafted() {
        let header = Cor20Header::read(&HEADER).unwrap();

        assert_eq!(header.cb, 72);
        assert_eq!(header.major_runtime_version, 2);
        assert_eq!(header.minor_runtime_version, 5);
        assert_eq!(header.meta_data_rva, 0x2100);
        assert_eq!(header.meta_data_size, 0x240);
        assert_eq!(header.flags, 1);
        assert_eq!(header.entry_point_token, 0x0600_0001);
        assert_eq!(header.managed_native_header_size, 0);
    }

    #[test]
    fn write_matches_read() {
        let mut header = Cor20Header::read(&HEADER).unwrap();
        let mut out = [0u8; 72];
        header.write(&mut out, 0).unwrap();
        assert_eq!(out, HEADER);

        header.meta_data_rva = 0x6000;
        header.meta_data_size = 0x1000;
        header.write(&mut out, 0).unwrap();
        assert_eq!(&out[8..16], &[0x00, 0x60, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00]);
    }

    #[test]
    fn invalid() {
        assert!(matches!(
            Cor20Header::read(&HEADER[..71]),
            Err(crate::Error::OutOfBounds)
        ));

        let mut short_cb = HEADER;
        short_cb[0] = 0x40;
        assert!(Cor20Header::read(&short_cb).is_err());

        let mut no_metadata = HEADER;
        no_metadata[8..12].copy_from_slice(&[0, 0, 0, 0]);
        assert!(Cor20Header::read(&no_metadata).is_err());
    }
}
