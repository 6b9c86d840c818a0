//! The ox86 CPU interpretation engine.
//!
//! A fetch-decode-execute core for the 16-bit x86 subset exercised by early
//! BIOS boot code: the register file with aliased 8/16-bit views, real-mode
//! segmented address generation, the ModR/M operand decoder, a 256-entry
//! opcode dispatch table, and the real/protected mode state machine.
//!
//! The core owns its memory and port accessors through the
//! [`ox86_platform::MemoryBus`] / [`ox86_platform::PortIo`] seams and is
//! driven one instruction at a time via [`CpuCore::step`]. Everything is
//! synchronous: a step runs to completion, and bus messages are delivered
//! between steps by the machine layer.
#![forbid(unsafe_code)]

pub mod addr;
pub mod decode;
mod error;
pub mod exec;
pub mod flags;
pub mod mode;
pub mod state;

pub use error::CpuError;
pub use exec::{CpuCore, ExecOutcome, StepOutcome};
pub use mode::CpuMode;
pub use state::{Reg16, Reg8, Registers, SegReg, SegmentRegister};
