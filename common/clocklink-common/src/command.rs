//! Command format:
//! ```txt
//! | opcode | payload                              |
//! | 0xAA   | month | day | hour | minute | second | set clock
//! | 0xBB   | hour  | minute                       | set alarm
//! ```
//! The device never acknowledges a command.

use crate::calendar::days_in_month;
use core::ops::Deref;
use thiserror::Error;

pub const OPCODE_SET_CLOCK: u8 = 0xAA;
pub const OPCODE_SET_ALARM: u8 = 0xBB;

/// Longest command on the wire (set clock).
pub const MAX_COMMAND_LEN: usize = 6;

/// A field of a command was outside the range the device accepts. Nothing is sent.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
#[error("{field} {value} is outside the valid range {min}..={max}")]
pub struct ValidationError {
    pub field: &'static str,
    pub value: u8,
    pub min: u8,
    pub max: u8,
}

fn check(field: &'static str, value: u8, min: u8, max: u8) -> Result<u8, ValidationError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError {
            field,
            value,
            min,
            max,
        })
    }
}

/// Full date-and-time setting carried by [`Command::SetClock`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ClockTime {
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}
impl ClockTime {
    /// Check every field against its calendar range; the day is bounded by the length of `month`
    /// in `reference_year`.
    pub fn validate(&self, reference_year: u16) -> Result<(), ValidationError> {
        check("month", self.month, 1, 12)?;
        check("day", self.day, 1, days_in_month(reference_year, self.month))?;
        check("hour", self.hour, 0, 23)?;
        check("minute", self.minute, 0, 59)?;
        check("second", self.second, 0, 59)?;
        Ok(())
    }
}

/// A request to program the alarm. `enabled` is reported back to the user but the device protocol
/// has no slot for it, so it is not transmitted.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AlarmIntent {
    pub hour: u8,
    pub minute: u8,
    pub enabled: bool,
}
impl AlarmIntent {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check("alarm hour", self.hour, 0, 23)?;
        check("alarm minute", self.minute, 0, 59)?;
        Ok(())
    }
}

/// A validated outbound command.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Command {
    SetClock(ClockTime),
    SetAlarm { hour: u8, minute: u8 },
}
impl Command {
    pub fn set_clock(reference_year: u16, time: ClockTime) -> Result<Self, ValidationError> {
        time.validate(reference_year)?;
        Ok(Self::SetClock(time))
    }

    pub fn set_alarm(alarm: AlarmIntent) -> Result<Self, ValidationError> {
        alarm.validate()?;
        Ok(Self::SetAlarm {
            hour: alarm.hour,
            minute: alarm.minute,
        })
    }

    pub const fn opcode(&self) -> u8 {
        match self {
            Command::SetClock(_) => OPCODE_SET_CLOCK,
            Command::SetAlarm { .. } => OPCODE_SET_ALARM,
        }
    }

    pub fn encode(&self) -> EncodedCommand {
        let mut bytes = [0; MAX_COMMAND_LEN];
        bytes[0] = self.opcode();
        let len = match *self {
            Command::SetClock(t) => {
                bytes[1..6].copy_from_slice(&[t.month, t.day, t.hour, t.minute, t.second]);
                6
            }
            Command::SetAlarm { hour, minute } => {
                bytes[1..3].copy_from_slice(&[hour, minute]);
                3
            }
        };
        EncodedCommand { bytes, len }
    }
}

/// Wire bytes of a [`Command`], opcode first.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EncodedCommand {
    bytes: [u8; MAX_COMMAND_LEN],
    len: usize,
}
impl EncodedCommand {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn opcode(&self) -> u8 {
        self.bytes[0]
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[1..self.len]
    }
}
impl Deref for EncodedCommand {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Validate and encode a set-clock command.
pub fn encode_set_clock(
    reference_year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
) -> Result<EncodedCommand, ValidationError> {
    let time = ClockTime {
        month,
        day,
        hour,
        minute,
        second,
    };
    Command::set_clock(reference_year, time).map(|c| c.encode())
}

/// Validate and encode a set-alarm command. `enabled` does not affect the bytes.
pub fn encode_set_alarm(
    hour: u8,
    minute: u8,
    enabled: bool,
) -> Result<EncodedCommand, ValidationError> {
    Command::set_alarm(AlarmIntent {
        hour,
        minute,
        enabled,
    })
    .map(|c| c.encode())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_clock_bytes() {
        let cmd = encode_set_clock(2025, 12, 31, 23, 59, 58).unwrap();
        assert_eq!(cmd.as_bytes(), [0xAA, 12, 31, 23, 59, 58]);
        assert_eq!(cmd.opcode(), OPCODE_SET_CLOCK);
        assert_eq!(cmd.payload(), [12, 31, 23, 59, 58]);
    }

    #[test]
    fn test_february_30_rejected() {
        for year in [2023, 2024] {
            let err = encode_set_clock(year, 2, 30, 0, 0, 0).unwrap_err();
            assert_eq!(err.field, "day");
            assert_eq!(err.value, 30);
        }
    }

    #[test]
    fn test_leap_day_depends_on_reference_year() {
        assert!(encode_set_clock(2024, 2, 29, 0, 0, 0).is_ok());
        let err = encode_set_clock(2025, 2, 29, 0, 0, 0).unwrap_err();
        assert_eq!(err.max, 28);
    }

    #[test]
    fn test_set_clock_bounds() {
        assert!(encode_set_clock(2025, 1, 1, 0, 0, 0).is_ok());
        assert_eq!(encode_set_clock(2025, 0, 1, 0, 0, 0).unwrap_err().field, "month");
        assert_eq!(encode_set_clock(2025, 13, 1, 0, 0, 0).unwrap_err().field, "month");
        assert_eq!(encode_set_clock(2025, 4, 31, 0, 0, 0).unwrap_err().field, "day");
        assert_eq!(encode_set_clock(2025, 4, 0, 0, 0, 0).unwrap_err().field, "day");
        assert_eq!(encode_set_clock(2025, 4, 1, 24, 0, 0).unwrap_err().field, "hour");
        assert_eq!(encode_set_clock(2025, 4, 1, 0, 60, 0).unwrap_err().field, "minute");
        assert_eq!(encode_set_clock(2025, 4, 1, 0, 0, 60).unwrap_err().field, "second");
    }

    #[test]
    fn test_alarm_ignores_enabled() {
        let on = encode_set_alarm(7, 15, true).unwrap();
        let off = encode_set_alarm(7, 15, false).unwrap();
        assert_eq!(on.as_bytes(), [0xBB, 7, 15]);
        assert_eq!(on, off);
    }

    #[test]
    fn test_alarm_bounds() {
        assert!(encode_set_alarm(23, 59, true).is_ok());
        let err = encode_set_alarm(24, 0, true).unwrap_err();
        assert_eq!((err.field, err.min, err.max), ("alarm hour", 0, 23));
        assert_eq!(encode_set_alarm(0, 60, false).unwrap_err().field, "alarm minute");
    }

    #[test]
    fn test_error_message() {
        let err = encode_set_clock(2025, 2, 30, 0, 0, 0).unwrap_err();
        assert_eq!(err.to_string(), "day 30 is outside the valid range 1..=28");
    }
}
