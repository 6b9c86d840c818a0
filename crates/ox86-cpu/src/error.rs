use thiserror::Error;

/// Fatal interpreter conditions.
///
/// Every variant indicates a bug in the emulator or in the guest code that
/// the core cannot recover from; nothing is retried. Addresses are the
/// 20-bit linear address of the offending instruction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CpuError {
    #[error("unknown opcode {opcode:#04x} at {at:#07x}")]
    UnknownOpcode { opcode: u8, at: u32 },

    #[error("unrecognized encoding for opcode {opcode:#04x} at {at:#07x}")]
    UnrecognizedEncoding { opcode: u8, at: u32 },

    #[error("CPU appears to be in a loop at {at:#07x}: instruction pointer did not advance")]
    InstructionPointerStuck { at: u32 },
}
