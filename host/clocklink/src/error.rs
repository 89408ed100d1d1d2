use clocklink_common::{Field, Frame, ValidationError};
use std::io;
use thiserror::Error;

/// Everything that can go wrong between the host and the clock.
///
/// `TransientRead` and `QueueOverflow` are only ever logged by the reader thread; the rest are
/// returned to whoever asked for the operation.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("port {name} not found; available: {}", list_or_none(.available))]
    PortUnavailable {
        name: String,
        available: Vec<String>,
    },
    #[error("failed to open {name}: {source}")]
    Open {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("read error on {name}: {source}")]
    TransientRead {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("update queue is full, dropping {field} frame (value {value})")]
    QueueOverflow { field: Field, value: u8 },
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("error sending data: {0}")]
    WriteFailure(#[source] io::Error),
    #[error("cannot enter settings: serial port is not open")]
    ModeTransitionRejected,
    #[error("serial port is not open")]
    PortClosed,
    #[error("failed to spawn reader thread: {0}")]
    Spawn(#[source] io::Error),
}

impl BridgeError {
    pub(crate) fn overflow(frame: Frame) -> Self {
        Self::QueueOverflow {
            field: frame.field,
            value: frame.value,
        }
    }
}

fn list_or_none(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}
