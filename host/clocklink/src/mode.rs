//! Monitoring/Settings mode, shared between the controller and the reader thread.

use crate::error::BridgeError;
use crate::port::PortChannel;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
#[repr(u8)]
pub enum Mode {
    /// The reader decodes everything the clock sends.
    #[default]
    Monitoring = 0,
    /// The reader leaves the port alone so commands can go out.
    Settings = 1,
}
impl Mode {
    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Mode::Settings,
            _ => Mode::Monitoring,
        }
    }
}
impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Monitoring => "monitoring",
            Mode::Settings => "settings",
        })
    }
}

#[derive(Debug, Default)]
struct Shared {
    mode: AtomicU8,
    /// Bumped every time the port's input is flushed on the way into settings.
    flushes: AtomicU32,
}

/// Read side of the mode, handed to the reader thread.
///
/// Writes are at least `Release` and loads `Acquire`, so the reader sees a mode change no later
/// than its next poll and anything the controller did before the change happened first.
#[derive(Debug, Clone, Default)]
pub struct ModeFlag(Arc<Shared>);
impl ModeFlag {
    pub fn get(&self) -> Mode {
        Mode::from_u8(self.0.mode.load(Ordering::Acquire))
    }

    /// How many input flushes have happened. A reader that sees this change must drop any
    /// partial frame it is holding, even if it never observed [`Mode::Settings`].
    pub fn flushes(&self) -> u32 {
        self.0.flushes.load(Ordering::Acquire)
    }

    fn set(&self, mode: Mode) -> Mode {
        Mode::from_u8(self.0.mode.swap(mode as u8, Ordering::AcqRel))
    }

    fn flushed(&self) {
        self.0.flushes.fetch_add(1, Ordering::AcqRel);
    }
}

/// Owns every mode transition.
#[derive(Debug, Default)]
pub struct ModeController {
    flag: ModeFlag,
}
impl ModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(&self) -> ModeFlag {
        self.flag.clone()
    }

    pub fn mode(&self) -> Mode {
        self.flag.get()
    }

    /// Pause decoding and discard whatever the clock sent since the last read.
    ///
    /// Rejected when the port is closed. Entering settings while already there flushes again and is
    /// otherwise a no-op.
    pub fn enter_settings(&self, port: &mut PortChannel) -> Result<(), BridgeError> {
        if !port.is_open() {
            return Err(BridgeError::ModeTransitionRejected);
        }
        if self.flag.set(Mode::Settings) == Mode::Monitoring {
            tracing::info!("entered settings mode, rx paused");
        }
        port.clear_input();
        self.flag.flushed();
        Ok(())
    }

    /// Resume decoding. Always succeeds.
    pub fn exit_settings(&self) {
        if self.flag.set(Mode::Monitoring) == Mode::Settings {
            tracing::info!("back to monitoring, rx resumed");
        }
    }

    /// Force monitoring without logging; used when the port goes away.
    pub(crate) fn reset(&self) {
        self.flag.set(Mode::Monitoring);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MemoryPort;

    #[test]
    fn test_starts_monitoring() {
        let c = ModeController::new();
        assert_eq!(c.mode(), Mode::Monitoring);
        assert_eq!(c.flag().get(), Mode::Monitoring);
    }

    #[test]
    fn test_enter_flushes_input() {
        let (port, device) = MemoryPort::pair();
        let mut channel = PortChannel::from_port("mem", Box::new(port));
        let c = ModeController::new();
        let flag = c.flag();

        device.send(&[0xB0, 1, 0xB1]);
        c.enter_settings(&mut channel).unwrap();
        assert_eq!(flag.get(), Mode::Settings);
        assert_eq!(device.unread(), 0);
        assert_eq!(device.input_flushes(), 1);
        assert_eq!(flag.flushes(), 1);

        // idempotent apart from flushing again
        c.enter_settings(&mut channel).unwrap();
        assert_eq!(c.mode(), Mode::Settings);
        assert_eq!(device.input_flushes(), 2);
        assert_eq!(flag.flushes(), 2);

        c.exit_settings();
        assert_eq!(flag.get(), Mode::Monitoring);
        c.exit_settings();
        assert_eq!(flag.get(), Mode::Monitoring);
    }

    #[test]
    fn test_enter_rejected_when_closed() {
        let mut channel = PortChannel::closed("mem");
        let c = ModeController::new();
        assert!(matches!(
            c.enter_settings(&mut channel),
            Err(BridgeError::ModeTransitionRejected)
        ));
        assert_eq!(c.mode(), Mode::Monitoring);
        assert_eq!(c.flag().flushes(), 0);
    }
}
