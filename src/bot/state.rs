use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// `Idle -> Starting -> Running -> Stopping -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BotState {
    Idle = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl BotState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => BotState::Idle,
            1 => BotState::Starting,
            2 => BotState::Running,
            _ => BotState::Stopping,
        }
    }
}

impl fmt::Display for BotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BotState::Idle => "idle",
            BotState::Starting => "starting",
            BotState::Running => "running",
            BotState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct AtomicBotState(AtomicU8);

impl AtomicBotState {
    pub fn new(state: BotState) -> Self {
        AtomicBotState(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> BotState {
        BotState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: BotState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves `from -> to` if the cell still holds `from`; otherwise returns the observed state.
    pub fn transition(&self, from: BotState, to: BotState) -> Result<(), BotState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(BotState::from_u8)
    }
}

impl Default for AtomicBotState {
    fn default() -> Self {
        AtomicBotState::new(BotState::Idle)
    }
}
