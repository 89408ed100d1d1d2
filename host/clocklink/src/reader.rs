//! Background thread that turns port input into queued frames.

use crate::error::BridgeError;
use crate::mode::{Mode, ModeFlag};
use crate::port::{self, SharedPort};
use crate::queue::UpdateSender;
use clocklink_common::{DecodeOutput, FrameDecoder};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Sleep lengths for the reader thread.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ReaderTiming {
    /// After every monitoring poll, whether or not it found anything.
    pub poll_interval: Duration,
    /// While in settings mode, and after a failed read.
    pub settings_poll_interval: Duration,
}
impl From<&crate::config::BridgeConfig> for ReaderTiming {
    fn from(c: &crate::config::BridgeConfig) -> Self {
        Self {
            poll_interval: c.poll_interval(),
            settings_poll_interval: c.settings_poll_interval(),
        }
    }
}

/// What one reader cycle did, and so how long to wait before the next.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Step {
    /// Bytes were read and decoded.
    Busy,
    /// Nothing pending.
    Idle,
    /// Settings mode, closed port or a read error.
    Paused,
}

pub(crate) struct Reader {
    port: SharedPort,
    flag: ModeFlag,
    updates: UpdateSender,
    decoder: FrameDecoder,
    buf: Vec<u8>,
    seen_flushes: u32,
    reported_closed: bool,
}
impl Reader {
    pub(crate) fn new(port: SharedPort, flag: ModeFlag, updates: UpdateSender) -> Self {
        Self {
            port,
            seen_flushes: flag.flushes(),
            flag,
            updates,
            decoder: FrameDecoder::new(),
            buf: Vec::with_capacity(64),
            reported_closed: false,
        }
    }

    fn observe_mode(&mut self) -> Mode {
        // a command can enter and leave settings between two cycles, so go by the flush count
        // rather than by whether settings was ever seen
        let flushes = self.flag.flushes();
        if flushes != self.seen_flushes {
            self.seen_flushes = flushes;
            if let Some(b) = self.decoder.residual() {
                tracing::debug!("[reader] discarding buffered byte {b:#04x} after input flush");
            }
            self.decoder.reset();
        }
        self.flag.get()
    }

    pub(crate) fn cycle(&mut self) -> Step {
        if self.observe_mode() == Mode::Settings {
            return Step::Paused;
        }

        self.buf.clear();
        let shared = Arc::clone(&self.port);
        let read = {
            let mut channel = port::lock(&shared);
            // the controller changes mode while holding the port, so this is the authoritative check
            if self.observe_mode() == Mode::Settings {
                return Step::Paused;
            }
            channel.read_available(&mut self.buf)
        };

        match read {
            Ok(0) => {
                self.reported_closed = false;
                Step::Idle
            }
            Ok(n) => {
                self.reported_closed = false;
                tracing::trace!("[reader] rx {n} bytes: {:02x?}", self.buf);
                self.decode();
                Step::Busy
            }
            Err(BridgeError::PortClosed) => {
                if !self.reported_closed {
                    tracing::warn!("[reader] port is closed, waiting");
                    self.reported_closed = true;
                }
                Step::Paused
            }
            Err(e) => {
                tracing::error!("[reader] {e}");
                Step::Paused
            }
        }
    }

    fn decode(&mut self) {
        let updates = &self.updates;
        self.decoder.feed_with(&self.buf, |out| match out {
            DecodeOutput::Frame(frame) => {
                tracing::debug!("[reader] {} = {}", frame.field, frame.value);
                if !updates.try_enqueue(frame) {
                    tracing::warn!("[reader] {}", BridgeError::overflow(frame));
                }
            }
            DecodeOutput::Resync { dropped } => {
                tracing::warn!("[reader] dropped unknown type byte {dropped:#04x}, resyncing");
            }
            DecodeOutput::Pending => {}
        });
    }

    fn run(mut self, stop: &AtomicBool, timing: ReaderTiming) {
        tracing::debug!("[reader] started");
        while !stop.load(Ordering::Acquire) {
            match self.cycle() {
                Step::Busy | Step::Idle => thread::sleep(timing.poll_interval),
                Step::Paused => thread::sleep(timing.settings_poll_interval),
            }
        }
        tracing::debug!("[reader] stopped");
    }
}

/// Handle to the running reader thread.
#[derive(Debug)]
pub struct ReaderLoop {
    stop: Arc<AtomicBool>,
    /// Disconnects when the thread exits.
    done: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}
impl ReaderLoop {
    pub fn spawn(
        port: SharedPort,
        flag: ModeFlag,
        updates: UpdateSender,
        timing: ReaderTiming,
    ) -> Result<Self, BridgeError> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop2 = Arc::clone(&stop);
        let (done_tx, done) = crossbeam_channel::bounded::<()>(0);
        let reader = Reader::new(port, flag, updates);
        let handle = thread::Builder::new()
            .name("clocklink-reader".into())
            .spawn(move || {
                let _done = done_tx;
                reader.run(&stop2, timing)
            })
            .map_err(BridgeError::Spawn)?;
        Ok(Self {
            stop,
            done,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Ask the thread to stop and wait up to `timeout` for it. Returns `false` if it was still
    /// running when the time ran out; the thread is then left detached.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        self.stop.store(true, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return true;
        };
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!("[reader] did not stop within {timeout:?}, detaching");
                return false;
            }
        }
        if handle.join().is_err() {
            tracing::error!("[reader] thread panicked");
        }
        true
    }
}
impl Drop for ReaderLoop {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}
