//! [`ClockBridge`]: everything a front end needs to watch and set the clock.

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::mode::{Mode, ModeController};
use crate::port::{self, Port, PortChannel, SharedPort};
use crate::queue::{self, UpdateReceiver};
use crate::reader::ReaderLoop;
use crate::state::{self, ClockSnapshot, ClockState, Formatted};
use crate::timer;
use chrono::Local;
use clocklink_common::calendar::month_name;
use clocklink_common::{AlarmIntent, ClockTime, Command};
use crossbeam_channel::Receiver;
use std::ops::ControlFlow;

pub struct ClockBridge {
    config: BridgeConfig,
    port: SharedPort,
    controller: ModeController,
    state: ClockState,
    reader: Option<ReaderLoop>,
    updates: Option<UpdateReceiver>,
    status: String,
}

impl ClockBridge {
    /// A closed bridge whose reference year is the host's current year.
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_reference_year(config, state::host_year())
    }

    pub fn with_reference_year(config: BridgeConfig, reference_year: u16) -> Self {
        Self {
            port: port::shared(PortChannel::closed(config.port.clone())),
            config,
            controller: ModeController::new(),
            state: ClockState::new(reference_year),
            reader: None,
            updates: None,
            status: String::new(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Open the configured serial port and start reading from it. An already open connection is
    /// closed first.
    pub fn open(&mut self) -> Result<(), BridgeError> {
        self.close();
        self.status = format!("Connecting to {}...", self.config.port);
        tracing::info!("{}", self.status);
        match PortChannel::open(&self.config) {
            Ok(channel) => self.start(channel),
            Err(e) => {
                self.status = format!("Error opening {}: {e}", self.config.port);
                tracing::error!("{}", self.status);
                Err(e)
            }
        }
    }

    /// Like [`ClockBridge::open`], over an already connected transport.
    pub fn open_with(&mut self, transport: Box<dyn Port>) -> Result<(), BridgeError> {
        self.close();
        self.start(PortChannel::from_port(self.config.port.clone(), transport))
    }

    fn start(&mut self, channel: PortChannel) -> Result<(), BridgeError> {
        *port::lock(&self.port) = channel;
        self.controller.reset();
        // fresh queue per connection, so nothing decoded on a previous one leaks through
        let (tx, rx) = queue::bounded(self.config.queue_capacity);
        match ReaderLoop::spawn(
            self.port.clone(),
            self.controller.flag(),
            tx,
            (&self.config).into(),
        ) {
            Ok(reader) => {
                self.reader = Some(reader);
                self.updates = Some(rx);
                self.status = format!("Connected to {} @ {}", self.config.port, self.config.baud);
                tracing::info!("{}", self.status);
                Ok(())
            }
            Err(e) => {
                port::lock(&self.port).close();
                self.status = format!("Error opening {}: {e}", self.config.port);
                Err(e)
            }
        }
    }

    /// Stop the reader and close the port. The port is closed even if the reader does not stop
    /// within the shutdown timeout. Safe to call on a closed bridge.
    pub fn close(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            reader.stop(self.config.shutdown_timeout());
        }
        let mut channel = port::lock(&self.port);
        if channel.is_open() {
            channel.close();
            self.status = format!("Disconnected from {}", self.config.port);
        }
        drop(channel);
        self.updates = None;
        self.controller.reset();
    }

    pub fn is_open(&self) -> bool {
        port::lock(&self.port).is_open()
    }

    pub fn mode(&self) -> Mode {
        self.controller.mode()
    }

    pub fn enter_settings(&mut self) -> Result<(), BridgeError> {
        self.controller.enter_settings(&mut port::lock(&self.port))?;
        self.status = "In Settings Mode: UART RX paused.".to_string();
        Ok(())
    }

    pub fn exit_settings(&mut self) {
        self.controller.exit_settings();
        self.status = "Main Monitor: UART RX resumed.".to_string();
    }

    /// Validate `time` against the reference year and send it. Nothing is written, and the mode is
    /// left alone, if validation fails.
    pub fn request_set_clock(&mut self, time: ClockTime) -> Result<(), BridgeError> {
        let command = Command::set_clock(self.state.reference_year(), time)?;
        let done = format!(
            "Clock set: {} {:02} | {:02}:{:02}:{:02} sent to device.",
            month_name(time.month),
            time.day,
            time.hour,
            time.minute,
            time.second
        );
        self.send(command, done)
    }

    /// Set the clock to the host's local time. Returns the time that was sent.
    pub fn sync_host_time(&mut self) -> Result<ClockTime, BridgeError> {
        let time = state::host_clock_time(&Local::now());
        self.request_set_clock(time)?;
        Ok(time)
    }

    pub fn request_set_alarm(&mut self, alarm: AlarmIntent) -> Result<(), BridgeError> {
        let command = Command::set_alarm(alarm)?;
        let done = format!(
            "Alarm set: {:02}:{:02} | {} sent to device.",
            alarm.hour,
            alarm.minute,
            if alarm.enabled { "Enabled" } else { "Disabled" }
        );
        self.send(command, done)
    }

    /// Write `command` with the reader paused, then resume monitoring whether or not the write
    /// went through.
    fn send(&mut self, command: Command, done: String) -> Result<(), BridgeError> {
        let encoded = command.encode();
        let result = {
            let mut channel = port::lock(&self.port);
            if !channel.is_open() {
                return Err(BridgeError::PortClosed);
            }
            if self.controller.mode() == Mode::Monitoring {
                self.controller.enter_settings(&mut channel)?;
            }
            channel.write(&encoded)
        };
        self.controller.exit_settings();
        match result {
            Ok(()) => {
                tracing::debug!("sent {:02x?}", encoded.as_bytes());
                self.status = done;
                tracing::info!("{}", self.status);
                Ok(())
            }
            Err(e) => {
                self.status = match &e {
                    BridgeError::WriteFailure(io) => format!("Error sending data: {io}"),
                    other => format!("Error sending data: {other}"),
                };
                tracing::error!("{}", self.status);
                Err(e)
            }
        }
    }

    /// Apply every frame the reader has queued. Returns whether anything changed.
    pub fn tick(&mut self) -> bool {
        let Some(updates) = &self.updates else {
            return false;
        };
        let frames = updates.drain_all();
        if frames.is_empty() {
            return false;
        }
        self.state.apply_all(frames);
        true
    }

    /// Tick every `tick_interval` until `stop` fires, calling `on_change` after each tick that
    /// applied at least one frame.
    pub fn run_until<T, F>(&mut self, stop: &Receiver<T>, mut on_change: F)
    where
        F: FnMut(&Self),
    {
        let interval = self.config.tick_interval();
        timer::every(interval, stop, || {
            if self.tick() {
                on_change(self);
            }
            ControlFlow::Continue(())
        });
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        self.state.snapshot()
    }

    pub fn formatted(&self) -> Formatted {
        self.state.formatted()
    }

    pub fn status_text(&self) -> &str {
        &self.status
    }

    /// Starting values for a manual set-clock form.
    pub fn settings_prefill(&self) -> ClockTime {
        state::prefill(&self.state.snapshot(), &Local::now())
    }
}

impl Drop for ClockBridge {
    fn drop(&mut self) {
        self.close();
    }
}
