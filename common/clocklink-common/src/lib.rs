#![cfg_attr(not(any(feature = "std", test)), no_std)]
//! Wire protocol spoken between the host and the FPGA clock.
//!
//! Telemetry from the device is a stream of two-byte pairs, `<type> <value>`, with no preamble and
//! no checksum; see [`frame`]. Commands from the host are a single opcode byte followed by a fixed
//! payload; see [`command`].

#[cfg(any(feature = "alloc", test))]
extern crate alloc;

/// The baud rate at which the clock's UART runs.
pub const BAUD_RATE: u32 = 9600;

/// Month lengths and month names.
pub mod calendar;
/// Outbound set-clock and set-alarm commands.
pub mod command;
/// Inbound telemetry frames and their decoder.
pub mod frame;

pub use command::{
    encode_set_alarm, encode_set_clock, AlarmIntent, ClockTime, Command, EncodedCommand,
    ValidationError,
};
pub use frame::{DecodeOutput, Field, Frame, FrameDecoder};
