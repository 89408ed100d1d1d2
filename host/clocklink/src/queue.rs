//! Hand-off of decoded frames from the reader thread to the consumer.
//!
//! Neither side ever blocks: the reader drops a frame when the queue is full, and the consumer
//! takes whatever is there. The halves are deliberately not `Clone`, so there is exactly one
//! producer and one consumer.

use clocklink_common::Frame;
use crossbeam_channel::{Receiver, Sender, TrySendError};

/// Create a queue holding at most `capacity` frames.
pub fn bounded(capacity: usize) -> (UpdateSender, UpdateReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (UpdateSender { tx }, UpdateReceiver { rx })
}

#[derive(Debug)]
pub struct UpdateSender {
    tx: Sender<Frame>,
}
impl UpdateSender {
    /// Returns `false`, discarding `frame`, if the queue is full or the consumer is gone.
    pub fn try_enqueue(&self, frame: Frame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(frame)) => {
                tracing::trace!("consumer gone, discarding {frame:?}");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

#[derive(Debug)]
pub struct UpdateReceiver {
    rx: Receiver<Frame>,
}
impl UpdateReceiver {
    /// Take every frame buffered at the time of the call, oldest first.
    pub fn drain_all(&self) -> Vec<Frame> {
        // bounded by what was there on entry, so a busy producer can't keep us here
        let n = self.rx.len();
        self.rx.try_iter().take(n).collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clocklink_common::Field;
    use std::thread;

    #[test]
    fn test_capacity_caps_buffered_count() {
        let (tx, rx) = bounded(4);
        let accepted = (0..10)
            .map(|i| tx.try_enqueue(Frame::new(Field::Second, i)))
            .collect::<Vec<_>>();
        assert_eq!(
            accepted,
            [true, true, true, true, false, false, false, false, false, false]
        );
        assert_eq!(rx.len(), 4);
        assert_eq!(rx.capacity(), 4);

        let drained = rx.drain_all();
        assert_eq!(
            drained.iter().map(|f| f.value).collect::<Vec<_>>(),
            [0, 1, 2, 3]
        );
        assert!(rx.is_empty());
        assert!(tx.try_enqueue(Frame::new(Field::Second, 99)));
    }

    #[test]
    fn test_drain_empty() {
        let (_tx, rx) = bounded(4);
        assert!(rx.drain_all().is_empty());
    }

    #[test]
    fn test_consumer_gone() {
        let (tx, rx) = bounded(4);
        drop(rx);
        assert!(!tx.try_enqueue(Frame::new(Field::Hour, 1)));
    }

    /// Frames cross threads in order, and none are lost while there is room.
    #[test]
    fn test_order_across_threads() {
        let (tx, rx) = bounded(8);
        let producer = thread::spawn(move || {
            let mut next = 0u8;
            while next < 200 {
                if tx.try_enqueue(Frame::new(Field::Minute, next)) {
                    next += 1;
                } else {
                    thread::yield_now();
                }
            }
        });
        let mut seen = vec![];
        while seen.len() < 200 {
            seen.extend(rx.drain_all().into_iter().map(|f| f.value));
            thread::yield_now();
        }
        producer.join().unwrap();
        assert_eq!(seen, (0..200).collect::<Vec<u8>>());
    }
}
