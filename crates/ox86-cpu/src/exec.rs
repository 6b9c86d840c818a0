//! Opcode dispatch and the single-step execution driver.
//!
//! Handlers are plain functions in a 256-entry table, one per primary
//! opcode byte. A handler consumes its own ModR/M, displacement and
//! immediate bytes and reports what happened as an [`ExecOutcome`]; the
//! driver applies the outcome to IP/CS centrally, so a handler cannot
//! forget to advance the instruction pointer.

use tracing::{info, trace, warn};

use ox86_platform::{BusMessage, MemoryBus, PartId, PortIo, SystemBus};

use crate::addr::linear;
use crate::decode::{decode_modrm, DecodedRm, RmOperand};
use crate::error::CpuError;
use crate::flags::{set_logic_flags8, set_sub_flags8};
use crate::mode::CpuMode;
use crate::state::{Reg16, Reg8, Registers, SegReg, CR0_PE, FLAG_DF, FLAG_IF, FLAG_ZF};

/// What a handler did, as seen by the step driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Sequential instruction: advance IP by the total bytes consumed.
    Advance(u16),
    /// Control transfer: assign IP (and CS for far transfers).
    Jump { cs: Option<u16>, ip: u16 },
}

/// Result of a completed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Halted,
}

type Handler<M, P> = fn(&mut CpuCore<M, P>) -> Result<ExecOutcome, CpuError>;

/// Per-instruction scratch state, reset by the driver.
#[derive(Debug, Clone, Copy, Default)]
struct ExecFlags {
    /// Segment override latched by a prefix, consumed by the next
    /// instruction's data accesses.
    seg_override: Option<SegReg>,
    /// Set by a prefix handler so the driver keeps the override alive for
    /// exactly one more instruction.
    override_latched: bool,
}

/// The CPU interpretation engine.
///
/// Owns its memory and port accessors for the duration of the machine's
/// lifetime; the machine drives it one [`CpuCore::step`] at a time and
/// pumps bus messages in between.
pub struct CpuCore<M: MemoryBus, P: PortIo> {
    regs: Registers,
    mem: M,
    io: P,
    mode: CpuMode,
    halted: bool,
    exec: ExecFlags,
    table: [Option<Handler<M, P>>; 256],

    part_id: PartId,
    bus_id: Option<u32>,

    /// Opcode byte currently being executed (scratch for handlers that
    /// serve several encodings).
    current_opcode: u8,
    /// Linear address of the instruction currently executing. Unlike
    /// CS:IP, this does not move while the handler runs.
    currently_executing: u32,
    last_executed: Option<u32>,
}

impl<M: MemoryBus, P: PortIo> CpuCore<M, P> {
    pub fn new(mem: M, io: P) -> Self {
        Self {
            regs: Registers::new(),
            mem,
            io,
            mode: CpuMode::Real,
            halted: false,
            exec: ExecFlags::default(),
            table: build_opcode_table(),
            part_id: PartId::PrimaryProcessor,
            bus_id: None,
            current_opcode: 0,
            currently_executing: 0,
            last_executed: None,
        }
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    pub fn memory(&self) -> &M {
        &self.mem
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.mem
    }

    pub fn io(&self) -> &P {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut P {
        &mut self.io
    }

    pub fn mode(&self) -> CpuMode {
        self.mode
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn part_id(&self) -> PartId {
        self.part_id
    }

    pub fn set_bus_id(&mut self, id: u32) {
        self.bus_id = Some(id);
    }

    pub fn bus_id(&self) -> Option<u32> {
        self.bus_id
    }

    /// Linear address of the next fetch, i.e. CS:IP.
    pub fn code_ptr(&self) -> u32 {
        linear(self.regs.segment(SegReg::CS), self.regs.ip)
    }

    /// Linear address of the instruction currently executing; stable even
    /// after the instruction rewrites CS or IP.
    pub fn currently_executing(&self) -> u32 {
        self.currently_executing
    }

    /// Puts the core back at the 8086 reset vector and asks the machine to
    /// lock the BIOS window.
    pub fn reset(&mut self, bus: &mut SystemBus) {
        self.regs.set_segment(SegReg::CS, 0xF000);
        self.regs.ip = 0xFFF0;
        self.halted = false;
        self.exec = ExecFlags::default();
        self.last_executed = None;
        bus.post(BusMessage::LockBiosRegion);
    }

    /// Unconditional mode transition: update CR0.PE, announce on the bus,
    /// log. No descriptor-table validation happens here.
    pub fn enter_mode(&mut self, mode: CpuMode, bus: &mut SystemBus) {
        self.mode = mode;
        match mode {
            CpuMode::Protected => self.regs.cr0 |= CR0_PE,
            CpuMode::Real => self.regs.cr0 &= !CR0_PE,
        }
        bus.post(BusMessage::CpuModeSwitched { mode: mode.code() });
        info!("{} entered {}", self.part_id.friendly_name(), mode.name());
    }

    /// Receive callback for bus messages, invoked by the machine between
    /// steps.
    pub fn on_bus_message(&mut self, msg: &BusMessage, bus: &mut SystemBus) {
        match *msg {
            BusMessage::RequestCpuModeSwitch { mode } => match CpuMode::from_code(mode) {
                Some(mode) => self.enter_mode(mode, bus),
                None => warn!(
                    "{} ignoring switch to unsupported mode {mode:#04x}",
                    self.part_id.friendly_name()
                ),
            },
            _ => {}
        }
    }

    /// Executes exactly one instruction.
    pub fn step(&mut self) -> Result<StepOutcome, CpuError> {
        if self.halted {
            return Ok(StepOutcome::Halted);
        }

        let at = self.code_ptr();
        self.currently_executing = at;
        if self.last_executed == Some(at) {
            return Err(CpuError::InstructionPointerStuck { at });
        }

        let opcode = self.mem.read_u8(at);
        self.current_opcode = opcode;
        let handler = self.table[opcode as usize].ok_or(CpuError::UnknownOpcode { opcode, at })?;

        self.exec.override_latched = false;
        let outcome = handler(self)?;
        match outcome {
            ExecOutcome::Advance(len) => self.regs.ip = self.regs.ip.wrapping_add(len),
            ExecOutcome::Jump { cs, ip } => {
                if let Some(cs) = cs {
                    self.regs.set_segment(SegReg::CS, cs);
                }
                self.regs.ip = ip;
            }
        }
        if !self.exec.override_latched {
            self.exec.seg_override = None;
        }

        self.last_executed = Some(at);
        Ok(if self.halted {
            StepOutcome::Halted
        } else {
            StepOutcome::Continue
        })
    }

    // ---- operand fetch helpers -------------------------------------------

    /// Instruction-stream byte at CS:(IP + k). Always fetched through CS;
    /// overrides apply to data operands only.
    fn imm8(&mut self, k: u16) -> u8 {
        let addr = linear(self.regs.segment(SegReg::CS), self.regs.ip.wrapping_add(k));
        self.mem.read_u8(addr)
    }

    fn imm16(&mut self, k: u16) -> u16 {
        let addr = linear(self.regs.segment(SegReg::CS), self.regs.ip.wrapping_add(k));
        self.mem.read_u16(addr)
    }

    /// Linear address for a data operand, honoring an active segment
    /// override.
    fn data_addr(&self, offset: u16, default_seg: SegReg) -> u32 {
        let seg = self.exec.seg_override.unwrap_or(default_seg);
        linear(self.regs.segment(seg), offset)
    }

    /// Decodes the ModR/M byte following the opcode, with its displacement
    /// lookahead.
    fn consume_modrm(&mut self) -> DecodedRm {
        let modrm = self.imm8(1);
        let disp = [self.imm8(2), self.imm8(3)];
        decode_modrm(modrm, disp, &self.regs)
    }

    fn read_rm8(&mut self, rm: &DecodedRm) -> u8 {
        match rm.operand {
            RmOperand::Register(i) => self.regs.read8(Reg8::from_index(i)),
            RmOperand::Memory {
                offset,
                default_seg,
            } => {
                let addr = self.data_addr(offset, default_seg);
                self.mem.read_u8(addr)
            }
        }
    }

    fn write_rm8(&mut self, rm: &DecodedRm, val: u8) {
        match rm.operand {
            RmOperand::Register(i) => self.regs.write8(Reg8::from_index(i), val),
            RmOperand::Memory {
                offset,
                default_seg,
            } => {
                let addr = self.data_addr(offset, default_seg);
                self.mem.write_u8(addr, val);
            }
        }
    }

    fn read_rm16(&mut self, rm: &DecodedRm) -> u16 {
        match rm.operand {
            RmOperand::Register(i) => self.regs.read16(Reg16::from_index(i)),
            RmOperand::Memory {
                offset,
                default_seg,
            } => {
                let addr = self.data_addr(offset, default_seg);
                self.mem.read_u16(addr)
            }
        }
    }

    fn write_rm16(&mut self, rm: &DecodedRm, val: u16) {
        match rm.operand {
            RmOperand::Register(i) => self.regs.write16(Reg16::from_index(i), val),
            RmOperand::Memory {
                offset,
                default_seg,
            } => {
                let addr = self.data_addr(offset, default_seg);
                self.mem.write_u16(addr, val);
            }
        }
    }

    fn unrecognized(&self) -> CpuError {
        CpuError::UnrecognizedEncoding {
            opcode: self.current_opcode,
            at: self.currently_executing,
        }
    }

    // ---- data movement ---------------------------------------------------

    /// `A0`/`A1`/`A2`/`A3`: accumulator <-> memory at a direct offset.
    /// The byte forms carry an 8-bit offset, the word forms a 16-bit one.
    fn op_mov_moffs(&mut self) -> Result<ExecOutcome, CpuError> {
        let at = self.currently_executing;
        match self.current_opcode {
            0xA0 => {
                let off = self.imm8(1) as u16;
                let addr = self.data_addr(off, SegReg::DS);
                let val = self.mem.read_u8(addr);
                self.regs.write8(Reg8::AL, val);
                trace!("[{at:#07x}] MOV AL, [{off:#06x}]");
                Ok(ExecOutcome::Advance(2))
            }
            0xA1 => {
                let off = self.imm16(1);
                let addr = self.data_addr(off, SegReg::DS);
                let val = self.mem.read_u16(addr);
                self.regs.write16(Reg16::AX, val);
                trace!("[{at:#07x}] MOV AX, [{off:#06x}]");
                Ok(ExecOutcome::Advance(3))
            }
            0xA2 => {
                let off = self.imm8(1) as u16;
                let addr = self.data_addr(off, SegReg::DS);
                let val = self.regs.read8(Reg8::AL);
                self.mem.write_u8(addr, val);
                trace!("[{at:#07x}] MOV [{off:#06x}], AL");
                Ok(ExecOutcome::Advance(2))
            }
            0xA3 => {
                let off = self.imm16(1);
                let addr = self.data_addr(off, SegReg::DS);
                let val = self.regs.read16(Reg16::AX);
                self.mem.write_u16(addr, val);
                trace!("[{at:#07x}] MOV [{off:#06x}], AX");
                Ok(ExecOutcome::Advance(3))
            }
            _ => Err(self.unrecognized()),
        }
    }

    /// `B0+r ib`: 8-bit register <- immediate.
    fn op_mov_r8_imm8(&mut self) -> Result<ExecOutcome, CpuError> {
        let reg = Reg8::from_index(self.current_opcode - 0xB0);
        let imm = self.imm8(1);
        self.regs.write8(reg, imm);
        trace!(
            "[{:#07x}] MOV {}, {imm:#04x}",
            self.currently_executing,
            reg.name()
        );
        Ok(ExecOutcome::Advance(2))
    }

    /// `B8+r iw`: 16-bit register <- immediate.
    fn op_mov_r16_imm16(&mut self) -> Result<ExecOutcome, CpuError> {
        let reg = Reg16::from_index(self.current_opcode - 0xB8);
        let imm = self.imm16(1);
        self.regs.write16(reg, imm);
        trace!(
            "[{:#07x}] MOV {}, {imm:#06x}",
            self.currently_executing,
            reg.name()
        );
        Ok(ExecOutcome::Advance(3))
    }

    /// `88`/`89`/`8A`/`8B /r`: register <-> r/m, both widths.
    fn op_mov_rm(&mut self) -> Result<ExecOutcome, CpuError> {
        let rm = self.consume_modrm();
        let at = self.currently_executing;
        match self.current_opcode {
            0x88 => {
                let val = self.regs.read8(Reg8::from_index(rm.reg));
                self.write_rm8(&rm, val);
                trace!("[{at:#07x}] MOV r/m8, {}", Reg8::from_index(rm.reg).name());
            }
            0x89 => {
                let val = self.regs.read16(Reg16::from_index(rm.reg));
                self.write_rm16(&rm, val);
                trace!("[{at:#07x}] MOV r/m16, {}", Reg16::from_index(rm.reg).name());
            }
            0x8A => {
                let val = self.read_rm8(&rm);
                self.regs.write8(Reg8::from_index(rm.reg), val);
                trace!("[{at:#07x}] MOV {}, r/m8", Reg8::from_index(rm.reg).name());
            }
            0x8B => {
                let val = self.read_rm16(&rm);
                self.regs.write16(Reg16::from_index(rm.reg), val);
                trace!("[{at:#07x}] MOV {}, r/m16", Reg16::from_index(rm.reg).name());
            }
            _ => return Err(self.unrecognized()),
        }
        Ok(ExecOutcome::Advance(1 + rm.len as u16))
    }

    /// `8C`/`8E /r`: segment register <-> r/m16.
    fn op_mov_sreg(&mut self) -> Result<ExecOutcome, CpuError> {
        let rm = self.consume_modrm();
        let sreg = SegReg::from_index(rm.reg);
        let at = self.currently_executing;
        match self.current_opcode {
            0x8C => {
                let val = self.regs.segment(sreg);
                self.write_rm16(&rm, val);
                trace!("[{at:#07x}] MOV r/m16, {}", sreg.name());
            }
            0x8E => {
                let val = self.read_rm16(&rm);
                self.regs.set_segment(sreg, val);
                trace!("[{at:#07x}] MOV {}, r/m16", sreg.name());
            }
            _ => return Err(self.unrecognized()),
        }
        Ok(ExecOutcome::Advance(1 + rm.len as u16))
    }

    /// `87 /r`: XCHG r/m16, r16. Both operands written back; flags
    /// untouched.
    fn op_xchg_rm16(&mut self) -> Result<ExecOutcome, CpuError> {
        let rm = self.consume_modrm();
        let reg = Reg16::from_index(rm.reg);
        let reg_val = self.regs.read16(reg);
        let rm_val = self.read_rm16(&rm);
        self.write_rm16(&rm, reg_val);
        self.regs.write16(reg, rm_val);
        trace!(
            "[{:#07x}] XCHG r/m16, {}",
            self.currently_executing,
            reg.name()
        );
        Ok(ExecOutcome::Advance(1 + rm.len as u16))
    }

    // ---- control transfer ------------------------------------------------

    /// `EA`: far jump, 16-bit offset then 16-bit segment.
    fn op_jmp_far(&mut self) -> Result<ExecOutcome, CpuError> {
        let ip = self.imm16(1);
        let cs = self.imm16(3);
        trace!(
            "[{:#07x}] JMP {cs:#06x}:{ip:#06x} (FAR)",
            self.currently_executing
        );
        Ok(ExecOutcome::Jump { cs: Some(cs), ip })
    }

    /// `E9 cw`: near relative jump.
    fn op_jmp_near_rel16(&mut self) -> Result<ExecOutcome, CpuError> {
        let rel = self.imm16(1);
        let target = self.regs.ip.wrapping_add(3).wrapping_add(rel);
        trace!(
            "[{:#07x}] JMP {target:#06x} (NEAR REL16)",
            self.currently_executing
        );
        Ok(ExecOutcome::Jump { cs: None, ip: target })
    }

    /// `EB cb`: short unconditional jump.
    fn op_jmp_short_rel8(&mut self) -> Result<ExecOutcome, CpuError> {
        let target = self.short_branch_target();
        trace!(
            "[{:#07x}] JMP {target:#06x} (SHORT REL8)",
            self.currently_executing
        );
        Ok(ExecOutcome::Jump { cs: None, ip: target })
    }

    /// `74 cb`: jump if ZF set.
    fn op_jz_short_rel8(&mut self) -> Result<ExecOutcome, CpuError> {
        let target = self.short_branch_target();
        let taken = self.regs.get_flag(FLAG_ZF);
        trace!(
            "[{:#07x}] JZ {target:#06x} (SHORT REL8) taken={taken}",
            self.currently_executing
        );
        Ok(self.short_branch(taken, target))
    }

    /// `75 cb`: jump if ZF clear.
    fn op_jnz_short_rel8(&mut self) -> Result<ExecOutcome, CpuError> {
        let target = self.short_branch_target();
        let taken = !self.regs.get_flag(FLAG_ZF);
        trace!(
            "[{:#07x}] JNZ {target:#06x} (SHORT REL8) taken={taken}",
            self.currently_executing
        );
        Ok(self.short_branch(taken, target))
    }

    /// `E3 cb`: jump if CX is zero.
    fn op_jcxz_short_rel8(&mut self) -> Result<ExecOutcome, CpuError> {
        let target = self.short_branch_target();
        let taken = self.regs.read16(Reg16::CX) == 0;
        trace!(
            "[{:#07x}] JCXZ {target:#06x} (SHORT REL8) taken={taken}",
            self.currently_executing
        );
        Ok(self.short_branch(taken, target))
    }

    /// IP + 2 + sign-extended rel8, the common arithmetic of all short
    /// branches.
    fn short_branch_target(&mut self) -> u16 {
        let rel = self.imm8(1) as i8 as i16 as u16;
        self.regs.ip.wrapping_add(2).wrapping_add(rel)
    }

    fn short_branch(&self, taken: bool, target: u16) -> ExecOutcome {
        if taken {
            ExecOutcome::Jump {
                cs: None,
                ip: target,
            }
        } else {
            ExecOutcome::Advance(2)
        }
    }

    // ---- flag control ----------------------------------------------------

    /// `FA`: CLI. Interrupt delivery is out of scope, but the flag is kept.
    fn op_cli(&mut self) -> Result<ExecOutcome, CpuError> {
        self.regs.set_flag(FLAG_IF, false);
        trace!("[{:#07x}] CLI", self.currently_executing);
        Ok(ExecOutcome::Advance(1))
    }

    /// `FB`: STI.
    fn op_sti(&mut self) -> Result<ExecOutcome, CpuError> {
        self.regs.set_flag(FLAG_IF, true);
        trace!("[{:#07x}] STI", self.currently_executing);
        Ok(ExecOutcome::Advance(1))
    }

    /// `FC`: CLD.
    fn op_cld(&mut self) -> Result<ExecOutcome, CpuError> {
        self.regs.set_flag(FLAG_DF, false);
        trace!("[{:#07x}] CLD", self.currently_executing);
        Ok(ExecOutcome::Advance(1))
    }

    /// `FD`: STD.
    fn op_std(&mut self) -> Result<ExecOutcome, CpuError> {
        self.regs.set_flag(FLAG_DF, true);
        trace!("[{:#07x}] STD", self.currently_executing);
        Ok(ExecOutcome::Advance(1))
    }

    // ---- arithmetic / logic ----------------------------------------------

    /// `3C ib`: CMP AL, imm8.
    fn op_cmp_al_imm8(&mut self) -> Result<ExecOutcome, CpuError> {
        let imm = self.imm8(1);
        let al = self.regs.read8(Reg8::AL);
        set_sub_flags8(&mut self.regs, al, imm);
        trace!("[{:#07x}] CMP AL, {imm:#04x}", self.currently_executing);
        Ok(ExecOutcome::Advance(2))
    }

    /// `A8 ib`: TEST AL, imm8. AL is not modified.
    fn op_test_al_imm8(&mut self) -> Result<ExecOutcome, CpuError> {
        let imm = self.imm8(1);
        let result = self.regs.read8(Reg8::AL) & imm;
        set_logic_flags8(&mut self.regs, result);
        trace!("[{:#07x}] TEST AL, {imm:#04x}", self.currently_executing);
        Ok(ExecOutcome::Advance(2))
    }

    // ---- port I/O --------------------------------------------------------

    /// `E4`/`E5`/`EC`/`ED`: IN from an immediate port or DX.
    fn op_in(&mut self) -> Result<ExecOutcome, CpuError> {
        let at = self.currently_executing;
        match self.current_opcode {
            0xE4 => {
                let port = self.imm8(1) as u16;
                let data = self.io.read_u8(port);
                self.regs.write8(Reg8::AL, data);
                trace!("[{at:#07x}] IN AL, {port:#04x} (data={data:#04x})");
                Ok(ExecOutcome::Advance(2))
            }
            0xE5 => {
                let port = self.imm8(1) as u16;
                let data = self.io.read_u16(port);
                self.regs.write16(Reg16::AX, data);
                trace!("[{at:#07x}] IN AX, {port:#04x} (data={data:#06x})");
                Ok(ExecOutcome::Advance(2))
            }
            0xEC => {
                let port = self.regs.read16(Reg16::DX);
                let data = self.io.read_u8(port);
                self.regs.write8(Reg8::AL, data);
                trace!("[{at:#07x}] IN AL, DX={port:#06x} (data={data:#04x})");
                Ok(ExecOutcome::Advance(1))
            }
            0xED => {
                let port = self.regs.read16(Reg16::DX);
                let data = self.io.read_u16(port);
                self.regs.write16(Reg16::AX, data);
                trace!("[{at:#07x}] IN AX, DX={port:#06x} (data={data:#06x})");
                Ok(ExecOutcome::Advance(1))
            }
            _ => Err(self.unrecognized()),
        }
    }

    /// `E6`/`E7`/`EE`/`EF`: OUT to an immediate port or DX.
    fn op_out(&mut self) -> Result<ExecOutcome, CpuError> {
        let at = self.currently_executing;
        match self.current_opcode {
            0xE6 => {
                let port = self.imm8(1) as u16;
                let data = self.regs.read8(Reg8::AL);
                self.io.write_u8(port, data);
                trace!("[{at:#07x}] OUT {port:#04x}, AL (data={data:#04x})");
                Ok(ExecOutcome::Advance(2))
            }
            0xE7 => {
                let port = self.imm8(1) as u16;
                let data = self.regs.read16(Reg16::AX);
                self.io.write_u16(port, data);
                trace!("[{at:#07x}] OUT {port:#04x}, AX (data={data:#06x})");
                Ok(ExecOutcome::Advance(2))
            }
            0xEE => {
                let port = self.regs.read16(Reg16::DX);
                let data = self.regs.read8(Reg8::AL);
                self.io.write_u8(port, data);
                trace!("[{at:#07x}] OUT DX={port:#06x}, AL (data={data:#04x})");
                Ok(ExecOutcome::Advance(1))
            }
            0xEF => {
                let port = self.regs.read16(Reg16::DX);
                let data = self.regs.read16(Reg16::AX);
                self.io.write_u16(port, data);
                trace!("[{at:#07x}] OUT DX={port:#06x}, AX (data={data:#06x})");
                Ok(ExecOutcome::Advance(1))
            }
            _ => Err(self.unrecognized()),
        }
    }

    // ---- prefixes / misc -------------------------------------------------

    /// `26`/`2E`/`36`/`3E`: segment override for the next instruction.
    fn op_seg_override(&mut self) -> Result<ExecOutcome, CpuError> {
        let seg = match self.current_opcode {
            0x26 => SegReg::ES,
            0x2E => SegReg::CS,
            0x36 => SegReg::SS,
            0x3E => SegReg::DS,
            _ => return Err(self.unrecognized()),
        };
        self.exec.seg_override = Some(seg);
        self.exec.override_latched = true;
        trace!(
            "[{:#07x}] {}: segment override",
            self.currently_executing,
            seg.name()
        );
        Ok(ExecOutcome::Advance(1))
    }

    /// `90`: NOP.
    fn op_nop(&mut self) -> Result<ExecOutcome, CpuError> {
        trace!("[{:#07x}] NOP", self.currently_executing);
        Ok(ExecOutcome::Advance(1))
    }

    /// `F4`: HLT. The machine loop observes the latch and stops stepping.
    fn op_hlt(&mut self) -> Result<ExecOutcome, CpuError> {
        self.halted = true;
        trace!("[{:#07x}] HLT", self.currently_executing);
        Ok(ExecOutcome::Advance(1))
    }
}

fn build_opcode_table<M: MemoryBus, P: PortIo>() -> [Option<Handler<M, P>>; 256] {
    let mut table: [Option<Handler<M, P>>; 256] = [None; 256];

    table[0x26] = Some(CpuCore::op_seg_override);
    table[0x2E] = Some(CpuCore::op_seg_override);
    table[0x36] = Some(CpuCore::op_seg_override);
    table[0x3E] = Some(CpuCore::op_seg_override);

    table[0x3C] = Some(CpuCore::op_cmp_al_imm8);

    table[0x74] = Some(CpuCore::op_jz_short_rel8);
    table[0x75] = Some(CpuCore::op_jnz_short_rel8);

    table[0x87] = Some(CpuCore::op_xchg_rm16);

    table[0x88] = Some(CpuCore::op_mov_rm);
    table[0x89] = Some(CpuCore::op_mov_rm);
    table[0x8A] = Some(CpuCore::op_mov_rm);
    table[0x8B] = Some(CpuCore::op_mov_rm);
    table[0x8C] = Some(CpuCore::op_mov_sreg);
    table[0x8E] = Some(CpuCore::op_mov_sreg);

    table[0x90] = Some(CpuCore::op_nop);

    table[0xA0] = Some(CpuCore::op_mov_moffs);
    table[0xA1] = Some(CpuCore::op_mov_moffs);
    table[0xA2] = Some(CpuCore::op_mov_moffs);
    table[0xA3] = Some(CpuCore::op_mov_moffs);

    table[0xA8] = Some(CpuCore::op_test_al_imm8);

    for r in 0..8usize {
        table[0xB0 + r] = Some(CpuCore::op_mov_r8_imm8 as Handler<M, P>);
        table[0xB8 + r] = Some(CpuCore::op_mov_r16_imm16 as Handler<M, P>);
    }

    table[0xE3] = Some(CpuCore::op_jcxz_short_rel8);

    table[0xE4] = Some(CpuCore::op_in);
    table[0xE5] = Some(CpuCore::op_in);
    table[0xE6] = Some(CpuCore::op_out);
    table[0xE7] = Some(CpuCore::op_out);

    table[0xE9] = Some(CpuCore::op_jmp_near_rel16);
    table[0xEA] = Some(CpuCore::op_jmp_far);
    table[0xEB] = Some(CpuCore::op_jmp_short_rel8);

    table[0xEC] = Some(CpuCore::op_in);
    table[0xED] = Some(CpuCore::op_in);
    table[0xEE] = Some(CpuCore::op_out);
    table[0xEF] = Some(CpuCore::op_out);

    table[0xF4] = Some(CpuCore::op_hlt);

    table[0xFA] = Some(CpuCore::op_cli);
    table[0xFB] = Some(CpuCore::op_sti);
    table[0xFC] = Some(CpuCore::op_cld);
    table[0xFD] = Some(CpuCore::op_std);

    table
}
