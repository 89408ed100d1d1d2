use crate::frame::{Field, Frame};

#[cfg(any(feature = "alloc", test))]
use alloc::vec::Vec;

/// What a single byte did to the decoder.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DecodeOutput {
    /// Byte was buffered; need more input.
    Pending,
    /// Byte completed a frame.
    Frame(Frame),
    /// The buffered type byte was not a known [`Field`] code and was discarded; the new byte is now
    /// buffered in its place.
    Resync { dropped: u8 },
}

/// Splits a telemetry byte stream into [`Frame`]s.
///
/// The decoder holds at most one byte between calls. Whenever two bytes are available it either
/// emits a frame (first byte is a type code) or drops the first byte alone and tries again, so a
/// single corrupted or lost byte costs at most one frame before alignment is recovered.
#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    pending: Option<u8>,
}
impl FrameDecoder {
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Forget any buffered byte, e.g. after the port's input was flushed.
    pub fn reset(&mut self) {
        self.pending = None;
    }

    /// The byte carried over from previous input, if any.
    pub fn residual(&self) -> Option<u8> {
        self.pending
    }

    pub fn poll(&mut self, byte: u8) -> DecodeOutput {
        let Some(type_byte) = self.pending.take() else {
            self.pending = Some(byte);
            return DecodeOutput::Pending;
        };
        match Field::try_from(type_byte) {
            Ok(field) => DecodeOutput::Frame(Frame::new(field, byte)),
            Err(dropped) => {
                self.pending = Some(byte);
                DecodeOutput::Resync { dropped }
            }
        }
    }

    /// Feed `bytes` through the decoder, calling `f` for every frame and every resync.
    pub fn feed_with<F: FnMut(DecodeOutput)>(&mut self, bytes: &[u8], mut f: F) {
        for &byte in bytes {
            match self.poll(byte) {
                DecodeOutput::Pending => {}
                out => f(out),
            }
        }
    }

    /// Feed `bytes` through the decoder, returning the frames completed by them in order.
    #[cfg(any(feature = "alloc", test))]
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::with_capacity(bytes.len() / 2 + 1);
        self.feed_with(bytes, |out| {
            if let DecodeOutput::Frame(frame) = out {
                frames.push(frame);
            }
        });
        frames
    }
}
