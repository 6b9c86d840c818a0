//! ModR/M operand decoding for 16-bit addressing.
//!
//! Decoding is pure: the caller supplies the ModR/M byte, a two-byte
//! lookahead window for the displacement, and the register file for base/
//! index values, and receives a complete operand descriptor plus the total
//! byte count. Handlers never re-derive effective addresses themselves.

use crate::state::{Reg16, Registers, SegReg};

/// `mod` field value selecting register-direct operands.
pub const MOD_REGISTER_DIRECT: u8 = 0b11;

/// The operand named by the mod/rm fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RmOperand {
    /// Register-direct (`mod == 11`): index into R8 or R16 per operand size.
    Register(u8),
    /// Memory operand: a 16-bit offset (already wrapped mod 2^16) and the
    /// default segment its addressing form implies.
    Memory { offset: u16, default_seg: SegReg },
}

/// A fully decoded ModR/M byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedRm {
    /// The three-bit `reg` field, interpreted by the opcode.
    pub reg: u8,
    pub operand: RmOperand,
    /// Displacement bytes consumed (0, 1 or 2).
    pub disp_len: u8,
    /// Total bytes consumed: the ModR/M byte itself plus displacement.
    pub len: u8,
}

/// Decodes one ModR/M byte under 16-bit addressing.
///
/// `disp` must hold the two bytes following the ModR/M byte; forms without
/// a displacement ignore them.
pub fn decode_modrm(modrm: u8, disp: [u8; 2], regs: &Registers) -> DecodedRm {
    let mod_bits = modrm >> 6;
    let reg = (modrm >> 3) & 0b111;
    let rm = modrm & 0b111;

    if mod_bits == MOD_REGISTER_DIRECT {
        return DecodedRm {
            reg,
            operand: RmOperand::Register(rm),
            disp_len: 0,
            len: 1,
        };
    }

    let disp8 = || disp[0] as i8 as i16 as u16;
    let disp16 = || u16::from_le_bytes(disp);

    // mod == 00, rm == 110 is the direct-address escape: no base register,
    // a 16-bit displacement is the whole offset.
    if mod_bits == 0b00 && rm == 0b110 {
        return DecodedRm {
            reg,
            operand: RmOperand::Memory {
                offset: disp16(),
                default_seg: SegReg::DS,
            },
            disp_len: 2,
            len: 3,
        };
    }

    let (base, default_seg) = effective_base(rm, regs);
    let (offset, disp_len) = match mod_bits {
        0b00 => (base, 0),
        0b01 => (base.wrapping_add(disp8()), 1),
        _ => (base.wrapping_add(disp16()), 2),
    };

    DecodedRm {
        reg,
        operand: RmOperand::Memory {
            offset,
            default_seg,
        },
        disp_len,
        len: 1 + disp_len,
    }
}

/// The base+index sum for an `rm` encoding, and the segment it defaults to.
/// `[BP]`-based forms default to SS, everything else to DS.
fn effective_base(rm: u8, regs: &Registers) -> (u16, SegReg) {
    let r = |reg: Reg16| regs.read16(reg);
    match rm & 0b111 {
        0 => (r(Reg16::BX).wrapping_add(r(Reg16::SI)), SegReg::DS),
        1 => (r(Reg16::BX).wrapping_add(r(Reg16::DI)), SegReg::DS),
        2 => (r(Reg16::BP).wrapping_add(r(Reg16::SI)), SegReg::SS),
        3 => (r(Reg16::BP).wrapping_add(r(Reg16::DI)), SegReg::SS),
        4 => (r(Reg16::SI), SegReg::DS),
        5 => (r(Reg16::DI), SegReg::DS),
        6 => (r(Reg16::BP), SegReg::SS),
        _ => (r(Reg16::BX), SegReg::DS),
    }
}
