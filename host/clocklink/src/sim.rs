//! A fake clock on the far end of a [`MemoryPort`](crate::port::MemoryPort).
//!
//! Counts seconds, emits all five telemetry pairs each second, and obeys set-clock/set-alarm
//! commands, so the bridge can be driven without hardware.

use crate::error::BridgeError;
use crate::port::DeviceEnd;
use crate::timer::Recurring;
use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use clocklink_common::command::{OPCODE_SET_ALARM, OPCODE_SET_CLOCK};
use clocklink_common::{Field, Frame};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Not a type code, so the host has to resync past it.
const GARBAGE: u8 = 0x5A;

#[derive(Debug)]
pub struct SimulatedClock {
    device: DeviceEnd,
    now: NaiveDateTime,
    alarm: Option<(u8, u8)>,
    inbox: Vec<u8>,
    garbage_every: Option<u32>,
    seconds: u32,
}

impl SimulatedClock {
    pub fn new(device: DeviceEnd, start: NaiveDateTime) -> Self {
        Self {
            device,
            now: start.with_nanosecond(0).unwrap_or(start),
            alarm: None,
            inbox: vec![],
            garbage_every: None,
            seconds: 0,
        }
    }

    /// Put a stray byte on the wire before every `n`th burst.
    pub fn with_garbage_every(mut self, n: u32) -> Self {
        self.garbage_every = (n > 0).then_some(n);
        self
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    pub fn alarm(&self) -> Option<(u8, u8)> {
        self.alarm
    }

    /// One simulated second: handle received commands, advance, report.
    pub fn step(&mut self) {
        self.process_commands();
        self.now += TimeDelta::seconds(1);
        self.seconds = self.seconds.wrapping_add(1);
        self.emit();
    }

    fn emit(&self) {
        let mut bytes = Vec::with_capacity(11);
        if self.garbage_every.is_some_and(|n| self.seconds % n == 0) {
            bytes.push(GARBAGE);
        }
        for field in Field::ALL {
            let value = match field {
                Field::Second => self.now.second(),
                Field::Minute => self.now.minute(),
                Field::Hour => self.now.hour(),
                Field::Day => self.now.day(),
                Field::Month => self.now.month(),
            };
            bytes.extend(Frame::new(field, value as u8).to_bytes());
        }
        self.device.send(&bytes);
    }

    /// Parse whatever the host has written. Incomplete commands wait for the rest of their bytes.
    pub fn process_commands(&mut self) {
        self.inbox.extend(self.device.take_written());
        loop {
            match self.inbox[..] {
                [OPCODE_SET_CLOCK, month, day, hour, minute, second, ..] => {
                    self.inbox.drain(..6);
                    self.set_clock(month, day, hour, minute, second);
                }
                [OPCODE_SET_ALARM, hour, minute, ..] => {
                    self.inbox.drain(..3);
                    tracing::info!("[sim] alarm set to {hour:02}:{minute:02}");
                    self.alarm = Some((hour, minute));
                }
                // wait for the rest
                [OPCODE_SET_CLOCK, ..] | [OPCODE_SET_ALARM, ..] | [] => return,
                [other, ..] => {
                    tracing::warn!("[sim] ignoring unknown byte {other:#04x}");
                    self.inbox.remove(0);
                }
            }
        }
    }

    fn set_clock(&mut self, month: u8, day: u8, hour: u8, minute: u8, second: u8) {
        let time = NaiveDate::from_ymd_opt(self.now.year(), month.into(), day.into())
            .and_then(|d| d.and_hms_opt(hour.into(), minute.into(), second.into()));
        match time {
            Some(t) => {
                tracing::info!("[sim] clock set to {t}");
                self.now = t;
            }
            None => tracing::warn!(
                "[sim] rejecting set-clock {month}/{day} {hour}:{minute}:{second}"
            ),
        }
    }

    /// Step every `interval` on a background thread. The clock stays inspectable through the
    /// returned handle.
    pub fn spawn(self, interval: Duration) -> Result<(Recurring, Arc<Mutex<Self>>), BridgeError> {
        let clock = Arc::new(Mutex::new(self));
        let c = Arc::clone(&clock);
        let task = Recurring::spawn("clocklink-sim", interval, move || {
            c.lock().unwrap_or_else(PoisonError::into_inner).step();
            ControlFlow::Continue(())
        })?;
        Ok((task, clock))
    }
}
