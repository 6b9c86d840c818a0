use std::collections::VecDeque;

/// Inter-device messages carried by the [`SystemBus`].
///
/// Mode bytes are wire-level: the CPU core defines which values it
/// understands. The bus itself never interprets payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusMessage {
    /// Ask the CPU to switch execution mode (payload: target mode byte).
    RequestCpuModeSwitch { mode: u8 },
    /// Announcement broadcast by the CPU after every mode transition.
    CpuModeSwitched { mode: u8 },
    /// Broadcast once at CPU reset; the machine write-locks the BIOS window.
    LockBiosRegion,
}

/// Well-known part identities devices register under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartId {
    PrimaryProcessor,
    MathCoProcessor,
    MemoryController,
    IoPortController,
    IsaBusController,
}

impl PartId {
    pub fn friendly_name(self) -> &'static str {
        match self {
            PartId::PrimaryProcessor => "PRIMARY PROCESSOR",
            PartId::MathCoProcessor => "MATH CO PROCESSOR",
            PartId::MemoryController => "MEMORY ACCESS CONTROLLER",
            PartId::IoPortController => "IO PORT ACCESS CONTROLLER",
            PartId::IsaBusController => "ISA BUS CONTROLLER",
        }
    }
}

/// A peripheral that wants bus messages delivered between CPU steps.
///
/// Subscribers may post follow-up messages through the bus handle; the
/// machine keeps pumping until the queue drains.
pub trait BusDevice {
    fn part_id(&self) -> PartId;

    fn set_bus_id(&mut self, _id: u32) {}

    fn on_message(&mut self, msg: &BusMessage, bus: &mut SystemBus);
}

/// Message queue plus the registry of device identities.
///
/// Delivery is driven by the machine between steps, which keeps the whole
/// system single-threaded: posting never re-enters a subscriber.
#[derive(Debug, Default)]
pub struct SystemBus {
    queue: VecDeque<BusMessage>,
    registrations: Vec<PartId>,
}

impl SystemBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device identity and assigns its numeric bus id.
    pub fn register(&mut self, part: PartId) -> u32 {
        let id = self.registrations.len() as u32;
        self.registrations.push(part);
        id
    }

    pub fn part(&self, bus_id: u32) -> Option<PartId> {
        self.registrations.get(bus_id as usize).copied()
    }

    pub fn post(&mut self, msg: BusMessage) {
        self.queue.push_back(msg);
    }

    pub fn pop(&mut self) -> Option<BusMessage> {
        self.queue.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}
