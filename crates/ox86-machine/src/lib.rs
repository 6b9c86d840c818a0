//! Machine integration layer: composes the CPU core with physical memory,
//! the I/O port space and the system bus, loads the BIOS ROM, and drives
//! single-stepping.
//!
//! The machine owns everything and pumps bus messages between steps, so the
//! core's single-threaded execution contract holds by construction.
#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{error, info};

use ox86_cpu::{CpuCore, CpuError, CpuMode, StepOutcome};
use ox86_platform::{BusDevice, BusMessage, IoPortSpace, PhysicalMemory, SystemBus};

/// Top of the first megabyte; the BIOS image is mapped so its last byte
/// sits just below this, which puts the reset vector (linear 0xFFFF0)
/// inside any image of at least 16 bytes.
const BIOS_CEILING: u32 = 0x10_0000;

/// Configuration for [`Machine`].
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Guest RAM size in bytes. Must cover the first megabyte so the BIOS
    /// window exists.
    pub ram_size_bytes: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            ram_size_bytes: 32 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("failed to read BIOS image {path}")]
    BiosImage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("BIOS image of {len} bytes does not fit below the 1 MiB ceiling")]
    BiosTooLarge { len: usize },

    #[error("no BIOS image loaded")]
    NoBios,

    #[error(transparent)]
    Cpu(#[from] CpuError),
}

/// Why [`Machine::run`] stopped stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Halted,
    MaxInstructions,
}

pub struct Machine {
    cpu: CpuCore<PhysicalMemory, IoPortSpace>,
    bus: SystemBus,
    devices: Vec<Box<dyn BusDevice>>,
    bios_region: Option<core::ops::Range<u32>>,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Self {
        assert!(
            config.ram_size_bytes >= BIOS_CEILING as usize,
            "RAM must cover the first megabyte"
        );
        let mut bus = SystemBus::new();
        let mut cpu = CpuCore::new(
            PhysicalMemory::new(config.ram_size_bytes),
            IoPortSpace::new(),
        );
        let id = bus.register(cpu.part_id());
        cpu.set_bus_id(id);
        Self {
            cpu,
            bus,
            devices: Vec::new(),
            bios_region: None,
        }
    }

    /// Registers a peripheral as a bus subscriber.
    pub fn add_device(&mut self, mut device: Box<dyn BusDevice>) {
        let id = self.bus.register(device.part_id());
        device.set_bus_id(id);
        self.devices.push(device);
    }

    /// Copies a BIOS image into the top of the first megabyte.
    pub fn load_bios(&mut self, image: &[u8]) -> Result<(), MachineError> {
        let len = image.len();
        if len == 0 || len as u32 > BIOS_CEILING {
            return Err(MachineError::BiosTooLarge { len });
        }
        let base = BIOS_CEILING - len as u32;
        self.cpu.memory_mut().load(base, image);
        self.bios_region = Some(base..BIOS_CEILING);
        info!("mapped {len} byte BIOS image at {base:#07x}");
        Ok(())
    }

    pub fn load_bios_file(&mut self, path: &Path) -> Result<(), MachineError> {
        let image = fs::read(path).map_err(|source| MachineError::BiosImage {
            path: path.display().to_string(),
            source,
        })?;
        self.load_bios(&image)
    }

    /// Runs the reset protocol: real mode, CS:IP at the reset vector, BIOS
    /// window locked via the bus message.
    pub fn reset(&mut self) -> Result<(), MachineError> {
        if self.bios_region.is_none() {
            return Err(MachineError::NoBios);
        }
        self.cpu.enter_mode(CpuMode::Real, &mut self.bus);
        self.cpu.reset(&mut self.bus);
        self.pump_messages();
        Ok(())
    }

    /// Posts a mode-switch request; it is delivered before the next step.
    pub fn request_mode_switch(&mut self, mode: u8) {
        self.bus.post(BusMessage::RequestCpuModeSwitch { mode });
    }

    /// Delivers queued bus messages to the machine itself, the CPU, and all
    /// subscribed devices, draining any follow-ups they post.
    fn pump_messages(&mut self) {
        while let Some(msg) = self.bus.pop() {
            if let BusMessage::LockBiosRegion = msg {
                if let Some(region) = self.bios_region.clone() {
                    self.cpu.memory_mut().lock_region(region);
                }
            }
            self.cpu.on_bus_message(&msg, &mut self.bus);
            for device in &mut self.devices {
                device.on_message(&msg, &mut self.bus);
            }
        }
    }

    /// Pumps pending messages, then executes one instruction.
    pub fn step(&mut self) -> Result<StepOutcome, MachineError> {
        self.pump_messages();
        Ok(self.cpu.step()?)
    }

    /// Steps until HLT, the instruction budget, or a fatal core error. On a
    /// fatal error the full context (address, opcode, registers) is logged
    /// before the error is returned.
    pub fn run(&mut self, max_insts: u64) -> Result<RunExit, MachineError> {
        for _ in 0..max_insts {
            match self.step() {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Halted) => return Ok(RunExit::Halted),
                Err(err) => {
                    error!(
                        "fatal at {:#07x}: {err}; {}",
                        self.cpu.currently_executing(),
                        self.cpu.registers()
                    );
                    return Err(err);
                }
            }
        }
        Ok(RunExit::MaxInstructions)
    }

    pub fn cpu(&self) -> &CpuCore<PhysicalMemory, IoPortSpace> {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut CpuCore<PhysicalMemory, IoPortSpace> {
        &mut self.cpu
    }

    pub fn bus(&self) -> &SystemBus {
        &self.bus
    }

    /// The linear range the loaded BIOS image occupies, if any.
    pub fn bios_region(&self) -> Option<core::ops::Range<u32>> {
        self.bios_region.clone()
    }
}

/// Convenience constructor used by tests and the CLI: a machine with a BIOS
/// image already mapped and reset executed.
pub fn boot_with_bios(config: MachineConfig, image: &[u8]) -> Result<Machine, MachineError> {
    let mut machine = Machine::new(config);
    machine.load_bios(image)?;
    machine.reset()?;
    Ok(machine)
}
