//! Encoders for the IL instructions the modify operations write.
//!
//! # References
//! - ECMA-335 6th Edition, Partition III - CIL Instruction Set

use strum::{Display, IntoStaticStr};

use crate::{
    metadata::{tables::TableId, token::Token},
    Result,
};

/// `nop`
pub const NOP: u8 = 0x00;
/// `ldarg.0`, followed by `ldarg.1` to `ldarg.3`
pub const LDARG_0: u8 = 0x02;
/// `ldloc.0`, followed by `ldloc.1` to `ldloc.3`
pub const LDLOC_0: u8 = 0x06;
/// `ldarg.s <u8>`
pub const LDARG_S: u8 = 0x0E;
/// `ldloc.s <u8>`
pub const LDLOC_S: u8 = 0x11;
/// `call <token>`
pub const CALL: u8 = 0x28;
/// `callvirt <token>`
pub const CALLVIRT: u8 = 0x6F;
/// `ldfld <token>`
pub const LDFLD: u8 = 0x7B;
/// `ldsfld <token>`
pub const LDSFLD: u8 = 0x7E;
/// Prefix of the two byte opcodes
pub const PREFIX: u8 = 0xFE;
/// `ldarg <u16>` after [`PREFIX`]
pub const LDARG: u8 = 0x09;
/// `ldloc <u16>` after [`PREFIX`]
pub const LDLOC: u8 = 0x0C;

/// Instructions taking a field or method token operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum RefOpcode {
    /// Load an instance field
    Ldfld,
    /// Load a static field
    Ldsfld,
    /// Call a method
    Call,
    /// Call a method virtually
    Callvirt,
}

impl RefOpcode {
    /// The opcode byte.
    #[must_use]
    pub fn opcode(self) -> u8 {
        match self {
            RefOpcode::Ldfld => LDFLD,
            RefOpcode::Ldsfld => LDSFLD,
            RefOpcode::Call => CALL,
            RefOpcode::Callvirt => CALLVIRT,
        }
    }

    /// The table the operand token points into.
    #[must_use]
    pub fn target(self) -> TableId {
        match self {
            RefOpcode::Ldfld | RefOpcode::Ldsfld => TableId::Field,
            RefOpcode::Call | RefOpcode::Callvirt => TableId::MethodDef,
        }
    }

    /// The instruction referencing row `rid` of [`RefOpcode::target`].
    #[must_use]
    pub fn encode(self, rid: u32) -> [u8; 5] {
        let token = Token::from_parts(self.target(), rid).to_le_bytes();
        [self.opcode(), token[0], token[1], token[2], token[3]]
    }
}

fn load_indexed(index: u32, first: u8, short: u8, long: u8) -> Result<Vec<u8>> {
    match index {
        // index < 4
        #[allow(clippy::cast_possible_truncation)]
        0..=3 => Ok(vec![first + index as u8]),
        // index < 256
        #[allow(clippy::cast_possible_truncation)]
        4..=0xFF => Ok(vec![short, index as u8]),
        // index < 65536
        #[allow(clippy::cast_possible_truncation)]
        0x100..=0xFFFF => {
            let [lo, hi] = (index as u16).to_le_bytes();
            Ok(vec![PREFIX, long, lo, hi])
        }
        _ => Err(malformed_error!(
            "Index {} is not encodable, the limit is 65535",
            index
        )),
    }
}

/// The shortest `ldarg` form for argument `index`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `index` exceeds 65535.
pub fn load_arg(index: u32) -> Result<Vec<u8>> {
    load_indexed(index, LDARG_0, LDARG_S, LDARG)
}

/// The shortest `ldloc` form for local `index`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `index` exceeds 65535.
pub fn load_local(index: u32) -> Result<Vec<u8>> {
    load_indexed(index, LDLOC_0, LDLOC_S, LDLOC)
}

/// `count` `nop` instructions.
#[must_use]
pub fn nops(count: usize) -> Vec<u8> {
    vec![NOP; count]
}
