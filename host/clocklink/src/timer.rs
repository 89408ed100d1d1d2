//! Periodic callbacks: the consumer tick and the once-a-second host clock refresh.

use crate::error::BridgeError;
use crossbeam_channel::{select, tick, Receiver, Sender};
use std::ops::ControlFlow;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Run `f` every `interval` on the current thread until it breaks or `stop` fires (or its sender
/// is dropped). `crossbeam_channel::after` makes a deadline, `never` runs forever.
pub fn every<T, F>(interval: Duration, stop: &Receiver<T>, mut f: F)
where
    F: FnMut() -> ControlFlow<()>,
{
    let ticker = tick(interval);
    loop {
        select! {
            recv(ticker) -> _ => {
                if f().is_break() {
                    return;
                }
            }
            recv(stop) -> _ => return,
        }
    }
}

/// [`every`] on its own named thread.
#[derive(Debug)]
pub struct Recurring {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}
impl Recurring {
    pub fn spawn<F>(name: &str, interval: Duration, f: F) -> Result<Self, BridgeError>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let (stop, stop_rx) = crossbeam_channel::bounded(1);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || every(interval, &stop_rx, f))
            .map_err(BridgeError::Spawn)?;
        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Stop and join. The callback is never invoked after this returns.
    pub fn stop(&mut self) {
        // dropping the sender wakes the select
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("recurring task panicked");
            }
        }
    }
}
impl Drop for Recurring {
    fn drop(&mut self) {
        self.stop();
    }
}
