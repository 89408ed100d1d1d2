//! Telemetry frame format:
//! ```txt
//! | type | value |
//!   +0:1   +1:1
//! ```
//! `type` is one of the [`Field`] codes `0xB0..=0xB4`; `value` is a raw byte that is never range
//! checked at this layer (the device may well report hour 37).

/// Provides functionality for picking frames out of a byte stream.
mod decode;
pub use decode::{DecodeOutput, FrameDecoder};

/// Size of a telemetry frame on the wire.
pub const FRAME_LEN: usize = 2;

/// Which clock field a telemetry frame carries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Field {
    Second = 0xB0,
    Minute = 0xB1,
    Hour = 0xB2,
    Day = 0xB3,
    Month = 0xB4,
}
impl Field {
    /// Every field, in wire-code order.
    pub const ALL: [Field; 5] = [
        Field::Second,
        Field::Minute,
        Field::Hour,
        Field::Day,
        Field::Month,
    ];

    /// The type byte that introduces this field on the wire.
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            Field::Second => "second",
            Field::Minute => "minute",
            Field::Hour => "hour",
            Field::Day => "day",
            Field::Month => "month",
        }
    }
}
impl TryFrom<u8> for Field {
    /// The unrecognized byte.
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0xB0 => Self::Second,
            0xB1 => Self::Minute,
            0xB2 => Self::Hour,
            0xB3 => Self::Day,
            0xB4 => Self::Month,
            other => return Err(other),
        })
    }
}
impl core::fmt::Display for Field {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded `(field, value)` pair.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Frame {
    pub field: Field,
    pub value: u8,
}
impl Frame {
    pub const fn new(field: Field, value: u8) -> Self {
        Self { field, value }
    }

    /// The two bytes the device sends for this frame.
    pub const fn to_bytes(self) -> [u8; FRAME_LEN] {
        [self.field.code(), self.value]
    }
}
