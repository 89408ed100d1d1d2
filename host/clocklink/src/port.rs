//! The serial connection to the clock, and the in-memory stand-in used by the simulator.

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::tty::{available_ports, Tty};
use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Byte transport underneath a [`PortChannel`].
pub trait Port: Send {
    /// Append every byte that has already arrived to `buf`; never waits for more.
    fn read_available(&mut self, buf: &mut Vec<u8>) -> io::Result<usize>;
    /// Write all of `bytes` and wait for them to leave.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;
    /// Discard received-but-unread input.
    fn clear_input(&mut self) -> io::Result<()>;
}

impl Port for Tty {
    fn read_available(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        Tty::read_available(self, buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        Write::write_all(self, bytes)?;
        self.flush()
    }

    fn clear_input(&mut self) -> io::Result<()> {
        Tty::clear_input(self)
    }
}

/// An open-or-closed serial connection.
pub struct PortChannel {
    name: String,
    port: Option<Box<dyn Port>>,
}
impl PortChannel {
    /// Open the port named in `config`, provided it is one of the ports this machine actually has.
    pub fn open(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let available = available_ports();
        if !available.iter().any(|p| p == Path::new(&config.port)) {
            return Err(BridgeError::PortUnavailable {
                name: config.port.clone(),
                available: available
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect(),
            });
        }
        let tty = Tty::new(&config.port, config.baud, config.read_timeout()).map_err(|source| {
            BridgeError::Open {
                name: config.port.clone(),
                source,
            }
        })?;
        tracing::info!("opened {} @ {}", config.port, config.baud);
        Ok(Self::from_port(config.port.clone(), Box::new(tty)))
    }

    pub fn from_port(name: impl Into<String>, port: Box<dyn Port>) -> Self {
        Self {
            name: name.into(),
            port: Some(port),
        }
    }

    pub fn closed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn port(&mut self) -> Result<&mut Box<dyn Port>, BridgeError> {
        self.port.as_mut().ok_or(BridgeError::PortClosed)
    }

    pub fn read_available(&mut self, buf: &mut Vec<u8>) -> Result<usize, BridgeError> {
        let name = &self.name;
        let port = self.port.as_mut().ok_or(BridgeError::PortClosed)?;
        port.read_available(buf)
            .map_err(|source| BridgeError::TransientRead {
                name: name.clone(),
                source,
            })
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<(), BridgeError> {
        self.port()?
            .write_all(bytes)
            .map_err(BridgeError::WriteFailure)
    }

    /// Best-effort discard of pending input; a closed port has nothing to discard.
    pub fn clear_input(&mut self) {
        if let Some(port) = self.port.as_mut() {
            if let Err(e) = port.clear_input() {
                tracing::debug!("failed to flush input on {}: {e}", self.name);
            }
        }
    }

    /// Drop the underlying connection. Calling this on a closed port does nothing.
    pub fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::info!("closed {}", self.name);
        }
    }
}

/// Port handle shared between the reader thread and command writers.
pub type SharedPort = Arc<Mutex<PortChannel>>;

pub fn shared(channel: PortChannel) -> SharedPort {
    Arc::new(Mutex::new(channel))
}

/// Lock `port`, carrying on if another holder panicked; the channel has no invariants a panic
/// could break halfway.
pub fn lock(port: &SharedPort) -> MutexGuard<'_, PortChannel> {
    port.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct Link {
    /// device -> host
    rx: VecDeque<u8>,
    /// host -> device
    tx: Vec<u8>,
    fail_reads: usize,
    fail_writes: bool,
    input_flushes: usize,
}

/// In-memory [`Port`]. The other end of the wire is a [`DeviceEnd`].
#[derive(Debug, Clone)]
pub struct MemoryPort {
    link: Arc<Mutex<Link>>,
}

/// The device side of a [`MemoryPort`].
#[derive(Debug, Clone)]
pub struct DeviceEnd {
    link: Arc<Mutex<Link>>,
}

impl MemoryPort {
    pub fn pair() -> (MemoryPort, DeviceEnd) {
        let link = Arc::new(Mutex::new(Link::default()));
        (MemoryPort { link: link.clone() }, DeviceEnd { link })
    }

    fn link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
impl Port for MemoryPort {
    fn read_available(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let mut link = self.link();
        if link.fail_reads > 0 {
            link.fail_reads -= 1;
            return Err(io::Error::new(io::ErrorKind::Other, "injected read failure"));
        }
        let n = link.rx.len();
        buf.extend(link.rx.drain(..));
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut link = self.link();
        if link.fail_writes {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "injected write failure",
            ));
        }
        link.tx.extend_from_slice(bytes);
        Ok(())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        let mut link = self.link();
        link.rx.clear();
        link.input_flushes += 1;
        Ok(())
    }
}

impl DeviceEnd {
    fn link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put bytes on the wire towards the host.
    pub fn send(&self, bytes: &[u8]) {
        self.link().rx.extend(bytes);
    }

    /// Bytes sent by the device that the host has not read yet.
    pub fn unread(&self) -> usize {
        self.link().rx.len()
    }

    /// Take everything the host has written so far.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.link().tx)
    }

    /// How many times the host flushed its input.
    pub fn input_flushes(&self) -> usize {
        self.link().input_flushes
    }

    /// Make the next `n` host reads fail.
    pub fn fail_reads(&self, n: usize) {
        self.link().fail_reads = n;
    }

    /// Make host writes fail until turned off again.
    pub fn fail_writes(&self, fail: bool) {
        self.link().fail_writes = fail;
    }
}
