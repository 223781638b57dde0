//! Metadata tokens.
//!
//! A token identifies one row of one metadata table: the high byte is the table kind, the low
//! three bytes are the 1-based row index. IL instructions that reference fields or methods carry
//! the token of the referenced row as their little-endian 4-byte operand.

use std::fmt;

use crate::metadata::tables::TableId;

/// A metadata token (table tag + 1-based row index).
///
/// # Examples
///
/// ```rust
/// use dotpatch::metadata::{tables::TableId, token::Token};
///
/// let token = Token::from_parts(TableId::MethodDef, 0x0102_03);
/// assert_eq!(token.value(), 0x0601_0203);
/// assert_eq!(token.to_le_bytes(), [0x03, 0x02, 0x01, 0x06]);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Create a token from its raw value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Create a token for `row` (1-based) of `table`. Row bits above 24 are discarded.
    #[must_use]
    pub fn from_parts(table: TableId, row: u32) -> Self {
        Token((u32::from(table as u8) << 24) | (row & 0x00FF_FFFF))
    }

    /// The raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// The table tag (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The 1-based row index (low 3 bytes)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// `true` for the nil token
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// The operand encoding of this token: row bytes low to high, then the table tag
    #[must_use]
    pub fn to_le_bytes(&self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts() {
        let token = Token::from_parts(TableId::Field, 5);
        assert_eq!(token.value(), 0x0400_0005);
        assert_eq!(token.table(), 0x04);
        assert_eq!(token.row(), 5);
        assert!(!token.is_null());

        let wide = Token::from_parts(TableId::MethodDef, 0x0123_4567);
        assert_eq!(wide.value(), 0x0623_4567);
        assert!(Token::new(0).is_null());
    }

    #[test]
    fn operand_bytes() {
        let token = Token::from_parts(TableId::MethodDef, 0x0001_0203);
        assert_eq!(token.to_le_bytes(), [0x03, 0x02, 0x01, 0x06]);
    }

    #[test]
    fn conversion_and_display() {
        let token: Token = 0x0600_0001u32.into();
        assert_eq!(u32::from(token), 0x0600_0001);
        assert_eq!(format!("{token}"), "0x06000001");

        let debug = format!("{token:?}");
        assert!(debug.contains("table: 0x06"));
        assert!(debug.contains("row: 1"));
    }
}
