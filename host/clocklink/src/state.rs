//! The host's view of the device clock.

use chrono::{Datelike, Local, Timelike};
use clocklink_common::calendar::{days_in_month, month_name};
use clocklink_common::command::ClockTime;
use clocklink_common::{Field, Frame};

pub const TIME_PLACEHOLDER: &str = "--:--:--";
pub const DATE_PLACEHOLDER: &str = "-- --";

/// Point-in-time copy of [`ClockState`], safe to hand to a renderer.
///
/// Fields hold the raw bytes the device sent. They are `None` until the first frame for that
/// field arrives and are never range checked; use [`ClockSnapshot::validated`] for sane values.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ClockSnapshot {
    pub month: Option<u8>,
    pub day: Option<u8>,
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    pub second: Option<u8>,
    /// Year used for month-length bounds; the device does not report one.
    pub reference_year: u16,
}

/// Display strings for a snapshot.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Formatted {
    pub time_text: String,
    pub date_text: String,
}
impl Formatted {
    pub fn placeholder() -> Self {
        Self {
            time_text: TIME_PLACEHOLDER.to_string(),
            date_text: DATE_PLACEHOLDER.to_string(),
        }
    }
}

impl ClockSnapshot {
    pub fn get(&self, field: Field) -> Option<u8> {
        match field {
            Field::Second => self.second,
            Field::Minute => self.minute,
            Field::Hour => self.hour,
            Field::Day => self.day,
            Field::Month => self.month,
        }
    }

    fn slot(&mut self, field: Field) -> &mut Option<u8> {
        match field {
            Field::Second => &mut self.second,
            Field::Minute => &mut self.minute,
            Field::Hour => &mut self.hour,
            Field::Day => &mut self.day,
            Field::Month => &mut self.month,
        }
    }

    /// All five fields, if every one has been received.
    pub fn complete(&self) -> Option<ClockTime> {
        Some(ClockTime {
            month: self.month?,
            day: self.day?,
            hour: self.hour?,
            minute: self.minute?,
            second: self.second?,
        })
    }

    /// The time, only if it is complete and every field is inside its calendar range.
    pub fn validated(&self) -> Option<ClockTime> {
        let time = self.complete()?;
        time.validate(self.reference_year).ok()?;
        Some(time)
    }

    /// `HH:MM:SS` and `<Month> DD` once every field has arrived, placeholders until then.
    ///
    /// Values are printed as received, so a bogus hour shows up as e.g. `37:00:00` and a bogus
    /// month as `Invalid Month`.
    pub fn formatted(&self) -> Formatted {
        match self.complete() {
            Some(t) => Formatted {
                time_text: format!("{:02}:{:02}:{:02}", t.hour, t.minute, t.second),
                date_text: format!("{} {:02}", month_name(t.month), t.day),
            },
            None => Formatted::placeholder(),
        }
    }
}

/// Authoritative clock state, owned by the consumer. Changes only through [`ClockState::apply`].
#[derive(Debug, Clone)]
pub struct ClockState {
    current: ClockSnapshot,
}
impl ClockState {
    pub fn new(reference_year: u16) -> Self {
        Self {
            current: ClockSnapshot {
                reference_year,
                ..Default::default()
            },
        }
    }

    /// Empty state whose reference year is the host's current local year.
    pub fn from_host_time() -> Self {
        Self::new(host_year())
    }

    /// Overwrite the frame's field with its value, whatever that value is.
    pub fn apply(&mut self, frame: Frame) {
        *self.current.slot(frame.field) = Some(frame.value);
    }

    /// Apply `frames` in order; returns how many were applied.
    pub fn apply_all(&mut self, frames: impl IntoIterator<Item = Frame>) -> usize {
        frames.into_iter().fold(0, |n, f| {
            self.apply(f);
            n + 1
        })
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        self.current
    }

    pub fn reference_year(&self) -> u16 {
        self.current.reference_year
    }

    pub fn formatted(&self) -> Formatted {
        self.current.formatted()
    }
}

pub fn host_year() -> u16 {
    u16::try_from(Local::now().year()).unwrap_or(2000)
}

/// Time and date of `now` in the same layout as [`ClockSnapshot::formatted`].
pub fn format_host_time<T: Datelike + Timelike>(now: &T) -> Formatted {
    Formatted {
        time_text: format!("{:02}:{:02}:{:02}", now.hour(), now.minute(), now.second()),
        date_text: format!("{} {:02}", month_name(now.month() as u8), now.day()),
    }
}

/// Host time as a set-clock payload.
pub fn host_clock_time<T: Datelike + Timelike>(now: &T) -> ClockTime {
    ClockTime {
        month: now.month() as u8,
        day: now.day() as u8,
        hour: now.hour() as u8,
        minute: now.minute() as u8,
        // leap seconds show up as 60
        second: now.second().min(59) as u8,
    }
}

/// Starting values for a set-clock form: the last value decoded from the device for each field,
/// or the host's value for fields never received. The day is pulled into the month's range.
pub fn prefill<T: Datelike + Timelike>(snapshot: &ClockSnapshot, now: &T) -> ClockTime {
    let host = host_clock_time(now);
    let month = snapshot.month.filter(|m| (1..=12).contains(m)).unwrap_or(host.month);
    let max_day = days_in_month(snapshot.reference_year, month);
    ClockTime {
        month,
        day: snapshot.day.unwrap_or(host.day).clamp(1, max_day),
        hour: snapshot.hour.filter(|h| *h <= 23).unwrap_or(host.hour),
        minute: snapshot.minute.filter(|m| *m <= 59).unwrap_or(host.minute),
        second: snapshot.second.filter(|s| *s <= 59).unwrap_or(host.second),
    }
}
