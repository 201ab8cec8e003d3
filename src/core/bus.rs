//! Single-consumer event bus.
//!
//! Gesture and input events from one tick are published in the order they
//! were observed and stamped with a monotonic time and a sequence number. The
//! controller drains the bus every tick, so a bounded queue never fills in
//! normal operation; if it does, the overflow is counted and logged.

use crate::sensing::types::{Event, TimedEvent};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::time::Duration;
use tracing::warn;

/// Default queue depth.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

pub struct EventBus {
    sender: Sender<TimedEvent>,
    receiver: Receiver<TimedEvent>,
    next_seq: u64,
    last_at: Duration,
    dropped: u64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            next_seq: 0,
            last_at: Duration::ZERO,
            dropped: 0,
        }
    }

    /// Stamp and enqueue `event`. Timestamps never go backwards: an `at`
    /// earlier than the last published one is raised to it.
    pub fn publish(&mut self, event: impl Into<Event>, at: Duration) -> bool {
        let at = at.max(self.last_at);
        let timed = TimedEvent {
            at,
            seq: self.next_seq,
            event: event.into(),
        };

        match self.sender.try_send(timed) {
            Ok(()) => {
                self.next_seq += 1;
                self.last_at = at;
                true
            }
            Err(TrySendError::Full(lost)) => {
                self.dropped += 1;
                warn!("Event bus full, dropping {:?}", lost.event);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Next event in delivery order.
    pub fn next(&self) -> Option<TimedEvent> {
        self.receiver.try_recv().ok()
    }

    /// Everything queued right now, in delivery order.
    pub fn drain(&self) -> Vec<TimedEvent> {
        self.receiver.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Events lost to overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}
