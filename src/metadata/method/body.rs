//! Decoding and encoding of CIL method headers and their exception sections.
//!
//! A method body starts with either a one byte compact header or a twelve byte extended header,
//! followed by the IL code. Extended bodies may carry data sections after the code, aligned to
//! 4 bytes, of which only exception clause tables are defined.
//!
//! # Examples
//!
//! ```rust
//! use dotpatch::metadata::method::{MethodBody, MethodHeaderKind};
//!
//! let data = [0x0E, 0x17, 0x26, 0x2A];
//! let body = MethodBody::from(&data)?;
//! assert_eq!(body.kind, MethodHeaderKind::Compact);
//! assert_eq!(body.size_code, 3);
//! assert_eq!(body.code(&data)?, &[0x17, 0x26, 0x2A]);
//!
//! let mut grown = body.clone();
//! grown.size_code = 5;
//! let bytes = grown.to_bytes(&[0x00, 0x00, 0x17, 0x26, 0x2A])?;
//! assert_eq!(bytes[0], 0x16);
//! # Ok::<(), dotpatch::Error>(())
//! ```
//!
//! # References
//! - ECMA-335 6th Edition, Partition II, Section 25.4 - Common Intermediate Language Physical Layout

use crate::{
    file::io::{read_le_at, slice_at, write_bytes_at, write_le_at},
    metadata::method::{
        ExceptionHandler, MethodBodyFlags, MethodHeaderKind, SectionFlags, FAT_CLAUSE_SIZE,
        FAT_HEADER_SIZE, METHOD_HEADER_FORMAT_MASK, SMALL_CLAUSE_SIZE, TINY_MAX_CODE_SIZE,
        TINY_MAX_STACK,
    },
    Error::OutOfBounds,
    Result,
};

const SECTION_HEADER_SIZE: usize = 4;
const SMALL_SECTION_MAX_SIZE: usize = 0xFF;
const FAT_SECTION_MAX_SIZE: usize = 0x00FF_FFFF;

fn align4(value: usize) -> usize {
    (value + 3) & !3
}

/// The header and exception clauses of one method.
///
/// The code itself is not held; [`MethodBody::code`] slices it out of the bytes the body was read
/// from, and [`MethodBody::write_to`] takes it from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    /// The header encoding
    pub kind: MethodHeaderKind,
    /// Header flags, including the format bits
    pub flags: MethodBodyFlags,
    /// Size of the header in bytes: 1 for compact headers, the header size field times 4 otherwise
    pub size_header: usize,
    /// Size of the code in bytes
    pub size_code: u32,
    /// Maximum number of items on the operand stack; 8 for compact headers
    pub max_stack: u16,
    /// `StandAloneSig` token of the local variable signature, 0 for none
    pub local_var_sig_token: u32,
    /// The exception clauses of all exception sections, in order
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    /// A compact body of `size_code` bytes.
    #[must_use]
    pub fn compact(size_code: u32) -> MethodBody {
        MethodBody {
            kind: MethodHeaderKind::Compact,
            flags: MethodBodyFlags::TINY_FORMAT,
            size_header: 1,
            size_code,
            max_stack: TINY_MAX_STACK,
            local_var_sig_token: 0,
            exception_handlers: Vec::new(),
        }
    }

    /// An extended body of `size_code` bytes with only the format flag set, no locals and no
    /// exception clauses.
    #[must_use]
    pub fn extended(max_stack: u16, size_code: u32) -> MethodBody {
        MethodBody {
            kind: MethodHeaderKind::Extended,
            flags: MethodBodyFlags::FAT_FORMAT,
            size_header: FAT_HEADER_SIZE,
            size_code,
            max_stack,
            local_var_sig_token: 0,
            exception_handlers: Vec::new(),
        }
    }

    /// Decodes the method body at the start of `data`.
    ///
    /// # Arguments
    /// * `data` - The bytes starting at the method header, at least up to the end of its last
    ///   data section
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the header, code or a data section crosses the end
    /// of `data`, and [`crate::Error::Malformed`] if the format bits or a section size are invalid.
    pub fn from(data: &[u8]) -> Result<MethodBody> {
        let mut offset = 0;
        let first_byte = read_le_at::<u8>(data, &mut offset)?;

        match first_byte & METHOD_HEADER_FORMAT_MASK {
            0x2 => {
                let body = MethodBody::compact(u32::from(first_byte >> 2));
                if body.size() > data.len() {
                    return Err(OutOfBounds);
                }
                Ok(body)
            }
            0x3 => {
                let mut offset = 0;
                let first_duo = read_le_at::<u16>(data, &mut offset)?;
                let max_stack = read_le_at::<u16>(data, &mut offset)?;
                let size_code = read_le_at::<u32>(data, &mut offset)?;
                let local_var_sig_token = read_le_at::<u32>(data, &mut offset)?;

                let size_header = usize::from(first_duo >> 12) * 4;
                if size_header < FAT_HEADER_SIZE {
                    return Err(malformed_error!(
                        "Extended method header size too small - {}",
                        size_header
                    ));
                }

                let Some(end) = size_header.checked_add(size_code as usize) else {
                    return Err(OutOfBounds);
                };
                if end > data.len() {
                    return Err(OutOfBounds);
                }

                let flags = MethodBodyFlags::from_bits_retain(first_duo & 0x0FFF);
                let exception_handlers = if flags.contains(MethodBodyFlags::MORE_SECTS) {
                    Self::read_sections(data, align4(end))?
                } else {
                    Vec::new()
                };

                Ok(MethodBody {
                    kind: MethodHeaderKind::Extended,
                    flags,
                    size_header,
                    size_code,
                    max_stack,
                    local_var_sig_token,
                    exception_handlers,
                })
            }
            _ => Err(malformed_error!(
                "MethodHeader is neither FAT nor TINY - {}",
                first_byte
            )),
        }
    }

    // Exception Handling -> II.25.4.6
    fn read_sections(data: &[u8], start: usize) -> Result<Vec<ExceptionHandler>> {
        let mut handlers = Vec::new();
        let mut cursor = start;

        loop {
            let section_start = cursor;
            let section_flags = SectionFlags::from_bits_retain(read_le_at::<u8>(data, &mut cursor)?);
            let is_fat = section_flags.contains(SectionFlags::FAT_FORMAT);

            let section_size = if is_fat {
                let low = u32::from(read_le_at::<u16>(data, &mut cursor)?);
                let high = u32::from(read_le_at::<u8>(data, &mut cursor)?);
                ((high << 16) | low) as usize
            } else {
                let size = usize::from(read_le_at::<u8>(data, &mut cursor)?);
                cursor += 2;
                size
            };

            if section_size < SECTION_HEADER_SIZE {
                return Err(malformed_error!(
                    "Method data section too small - {}",
                    section_size
                ));
            }
            let section_end = section_start + section_size;
            if section_end > data.len() {
                return Err(OutOfBounds);
            }

            if section_flags.contains(SectionFlags::EHTABLE) {
                let clause_size = if is_fat { FAT_CLAUSE_SIZE } else { SMALL_CLAUSE_SIZE };
                for _ in 0..(section_size - SECTION_HEADER_SIZE) / clause_size {
                    handlers.push(if is_fat {
                        ExceptionHandler::read_fat(data, &mut cursor)?
                    } else {
                        ExceptionHandler::read_small(data, &mut cursor)?
                    });
                }
            }

            if !section_flags.contains(SectionFlags::MORE_SECTS) {
                break;
            }
            cursor = align4(section_end);
        }

        Ok(handlers)
    }

    /// Size of header and code in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size_header + self.size_code as usize
    }

    /// `true` for an extended header.
    #[must_use]
    pub fn is_fat(&self) -> bool {
        self.kind == MethodHeaderKind::Extended
    }

    /// `true` if the locals are zero-initialised.
    #[must_use]
    pub fn is_init_local(&self) -> bool {
        self.flags.contains(MethodBodyFlags::INIT_LOCALS)
    }

    /// `true` if the body carries exception clauses.
    #[must_use]
    pub fn has_exception_data(&self) -> bool {
        !self.exception_handlers.is_empty()
    }

    /// The code of this body inside `data`, the bytes it was decoded from.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the code crosses the end of `data`.
    pub fn code<'a>(&self, data: &'a [u8]) -> Result<&'a [u8]> {
        slice_at(data, self.size_header, self.size_code as usize)
    }

    /// `true` if this body is representable with a compact header: code below 64 bytes, no
    /// locals, no exception clauses, no flags and a stack depth of at most 8.
    #[must_use]
    pub fn fits_compact(&self) -> bool {
        self.size_code <= TINY_MAX_CODE_SIZE
            && self.local_var_sig_token == 0
            && self.exception_handlers.is_empty()
            && self.max_stack <= TINY_MAX_STACK
            && !self.is_init_local()
    }

    /// The header encoding [`MethodBody::write_to`] will use: compact if the body asks for it and
    /// fits, extended otherwise.
    #[must_use]
    pub fn encoding(&self) -> MethodHeaderKind {
        if self.kind == MethodHeaderKind::Compact && self.fits_compact() {
            MethodHeaderKind::Compact
        } else {
            MethodHeaderKind::Extended
        }
    }

    fn small_sections(&self) -> bool {
        self.exception_handlers.iter().all(ExceptionHandler::fits_small)
            && SECTION_HEADER_SIZE + self.exception_handlers.len() * SMALL_CLAUSE_SIZE
                <= SMALL_SECTION_MAX_SIZE
    }

    fn section_size(&self) -> usize {
        let clause_size = if self.small_sections() {
            SMALL_CLAUSE_SIZE
        } else {
            FAT_CLAUSE_SIZE
        };
        SECTION_HEADER_SIZE + self.exception_handlers.len() * clause_size
    }

    /// Number of bytes [`MethodBody::write_to`] produces.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        match self.encoding() {
            MethodHeaderKind::Compact => 1 + self.size_code as usize,
            MethodHeaderKind::Extended => {
                let end = FAT_HEADER_SIZE + self.size_code as usize;
                if self.exception_handlers.is_empty() {
                    end
                } else {
                    align4(end) + self.section_size()
                }
            }
        }
    }

    /// Encodes header, `code` and exception section into `buf` at `offset` and advances the
    /// offset past the written bytes.
    ///
    /// Extended headers are always written with a header size of 12 bytes. Exception clauses go
    /// into one section, small if every clause fits the small encoding and the section stays
    /// within 255 bytes, fat otherwise. Padding in front of the section is zeroed.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `code` does not match `size_code` or the clauses
    /// exceed the fat section limit, and [`crate::Error::OutOfBounds`] if `buf` is too short.
    pub fn write_to(&self, code: &[u8], buf: &mut [u8], offset: &mut usize) -> Result<()> {
        if code.len() != self.size_code as usize {
            return Err(malformed_error!(
                "Code length {} does not match the header code size {}",
                code.len(),
                self.size_code
            ));
        }

        match self.encoding() {
            MethodHeaderKind::Compact => {
                // size_code <= 63 after fits_compact
                #[allow(clippy::cast_possible_truncation)]
                let header = ((self.size_code as u8) << 2) | 0x2;
                write_le_at(buf, offset, header)?;
                write_bytes_at(buf, offset, code)
            }
            MethodHeaderKind::Extended => {
                let mut flags = (self.flags | MethodBodyFlags::FAT_FORMAT)
                    .difference(MethodBodyFlags::MORE_SECTS);
                if self.has_exception_data() {
                    flags |= MethodBodyFlags::MORE_SECTS;
                }

                let start = *offset;
                write_le_at(buf, offset, (flags.bits() & 0x0FFF) | 0x3000)?;
                write_le_at(buf, offset, self.max_stack)?;
                write_le_at(buf, offset, self.size_code)?;
                write_le_at(buf, offset, self.local_var_sig_token)?;
                write_bytes_at(buf, offset, code)?;

                if self.has_exception_data() {
                    let padding = align4(*offset - start) - (*offset - start);
                    write_bytes_at(buf, offset, &[0u8; 3][..padding])?;
                    self.write_section(buf, offset)?;
                }
                Ok(())
            }
        }
    }

    fn write_section(&self, buf: &mut [u8], offset: &mut usize) -> Result<()> {
        let size = self.section_size();
        if self.small_sections() {
            // small_sections bounds the size to 255
            #[allow(clippy::cast_possible_truncation)]
            let size = size as u8;
            write_le_at(buf, offset, SectionFlags::EHTABLE.bits())?;
            write_le_at(buf, offset, size)?;
            write_le_at(buf, offset, 0u16)?;
            for handler in &self.exception_handlers {
                handler.write_small(buf, offset)?;
            }
        } else {
            if size > FAT_SECTION_MAX_SIZE {
                return Err(malformed_error!(
                    "Too many exception clauses - {}",
                    self.exception_handlers.len()
                ));
            }
            let flags = SectionFlags::EHTABLE | SectionFlags::FAT_FORMAT;
            let size = u32::try_from(size)
                .map_err(|_| malformed_error!("Exception section size overflows - {}", size))?;
            write_le_at(buf, offset, u32::from(flags.bits()) | (size << 8))?;
            for handler in &self.exception_handlers {
                handler.write_fat(buf, offset)?;
            }
        }
        Ok(())
    }

    /// Encodes header, `code` and exception section into a new buffer.
    ///
    /// # Errors
    /// See [`MethodBody::write_to`].
    pub fn to_bytes(&self, code: &[u8]) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.encoded_size()];
        let mut offset = 0;
        self.write_to(code, &mut buf, &mut offset)?;
        Ok(buf)
    }
}
