//! Host side of the clock's serial link.
//!
//! A [`ReaderLoop`](reader::ReaderLoop) thread decodes telemetry from the port into a bounded
//! queue; the consumer drains it on a timer into [`ClockState`](state::ClockState). Commands pause
//! the reader through the [`ModeController`](mode::ModeController) while they are written.
//! [`ClockBridge`] wraps all of it.

pub mod bridge;
pub mod config;
pub mod error;
pub mod mode;
pub mod port;
pub mod queue;
pub mod reader;
pub mod sim;
pub mod state;
pub mod timer;
pub mod tty;

pub use bridge::ClockBridge;
pub use config::{BridgeConfig, ConfigError};
pub use error::BridgeError;
pub use mode::Mode;
