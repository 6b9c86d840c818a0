//! Property tests for the pure pieces of the core: flag laws, address
//! generation, register aliasing, and ModR/M byte accounting.

use proptest::prelude::*;

use ox86_cpu::addr::linear;
use ox86_cpu::decode::decode_modrm;
use ox86_cpu::flags::{parity_even, set_logic_flags8, set_sub_flags8};
use ox86_cpu::state::{Registers, FLAG_AF, FLAG_CF, FLAG_OF, FLAG_PF, FLAG_SF, FLAG_ZF};
use ox86_cpu::{Reg16, Reg8};

proptest! {
    // CMP AL, imm8 flag laws: ZF iff equal, CF iff unsigned-below, SF is
    // the result's sign, OF is signed overflow, PF/AF per definition.
    #[test]
    fn cmp_flag_laws(al: u8, imm: u8) {
        let mut regs = Registers::new();
        set_sub_flags8(&mut regs, al, imm);

        let result = al.wrapping_sub(imm);
        prop_assert_eq!(regs.get_flag(FLAG_ZF), al == imm);
        prop_assert_eq!(regs.get_flag(FLAG_CF), al < imm);
        prop_assert_eq!(regs.get_flag(FLAG_SF), (result as i8) < 0);

        let signed = al as i8 as i16 - imm as i8 as i16;
        prop_assert_eq!(regs.get_flag(FLAG_OF), signed < -128 || signed > 127);
        prop_assert_eq!(regs.get_flag(FLAG_PF), parity_even(result));
        prop_assert_eq!(regs.get_flag(FLAG_AF), (al & 0xF) < (imm & 0xF));
    }

    // Exactly one of ZF/CF is set unless AL > imm, in which case neither.
    #[test]
    fn cmp_trichotomy(al: u8, imm: u8) {
        let mut regs = Registers::new();
        set_sub_flags8(&mut regs, al, imm);
        let zf = regs.get_flag(FLAG_ZF);
        let cf = regs.get_flag(FLAG_CF);
        match al.cmp(&imm) {
            core::cmp::Ordering::Equal => prop_assert!(zf && !cf),
            core::cmp::Ordering::Less => prop_assert!(!zf && cf),
            core::cmp::Ordering::Greater => prop_assert!(!zf && !cf),
        }
    }

    #[test]
    fn logic_flags_clear_carry_and_overflow(result: u8) {
        let mut regs = Registers::new();
        regs.set_flag(FLAG_CF, true);
        regs.set_flag(FLAG_OF, true);
        set_logic_flags8(&mut regs, result);
        prop_assert!(!regs.get_flag(FLAG_CF));
        prop_assert!(!regs.get_flag(FLAG_OF));
        prop_assert_eq!(regs.get_flag(FLAG_ZF), result == 0);
        prop_assert_eq!(regs.get_flag(FLAG_SF), result & 0x80 != 0);
    }

    // Linear address law: (seg * 16 + off) mod 2^20.
    #[test]
    fn linear_address_law(seg: u16, off: u16) {
        let expected = ((seg as u32) * 16 + off as u32) % 0x10_0000;
        prop_assert_eq!(linear(seg, off), expected);
    }

    // Aliasing: the 8-bit views are exactly the bytes of the first four
    // word registers, in both directions.
    #[test]
    fn eight_bit_views_alias(words: [u16; 4], byte: u8, view in 0u8..8) {
        let mut regs = Registers::new();
        for (i, w) in words.iter().enumerate() {
            regs.write16(Reg16::from_index(i as u8), *w);
        }
        for i in 0..4u8 {
            let word = regs.read16(Reg16::from_index(i));
            prop_assert_eq!(regs.read8(Reg8::from_index(i)), word as u8);
            prop_assert_eq!(regs.read8(Reg8::from_index(i + 4)), (word >> 8) as u8);
        }

        // Writing one view changes only its byte of the parent word.
        let reg = Reg8::from_index(view);
        let before = regs.read16(reg.parent());
        regs.write8(reg, byte);
        let after = regs.read16(reg.parent());
        if reg.is_high() {
            prop_assert_eq!(after, (before & 0x00FF) | ((byte as u16) << 8));
        } else {
            prop_assert_eq!(after, (before & 0xFF00) | byte as u16);
        }
    }

    // ModR/M byte accounting: the total length is the ModR/M byte plus its
    // displacement, which is fixed by the mod field (with the rm=110
    // direct-address escape under mod=00).
    #[test]
    fn modrm_length_accounting(modrm: u8, disp: [u8; 2], bx: u16, bp: u16, si: u16, di: u16) {
        let mut regs = Registers::new();
        regs.write16(Reg16::BX, bx);
        regs.write16(Reg16::BP, bp);
        regs.write16(Reg16::SI, si);
        regs.write16(Reg16::DI, di);

        let decoded = decode_modrm(modrm, disp, &regs);
        prop_assert_eq!(decoded.len, 1 + decoded.disp_len);
        let expected_disp = match modrm >> 6 {
            0b00 => {
                if modrm & 0b111 == 0b110 { 2 } else { 0 }
            }
            0b01 => 1,
            0b10 => 2,
            _ => 0,
        };
        prop_assert_eq!(decoded.disp_len, expected_disp);
    }
}
