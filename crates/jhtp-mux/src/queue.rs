use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::warn;

/// Policy applied when an outbound queue is at capacity.
///
/// An unbounded queue on a peer that never becomes write-ready is a
/// resource-exhaustion risk, so the bound and the overflow behavior are
/// explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Refuse the new frame and report the overflow to the caller.
    #[default]
    RejectSend,
    /// Evict the oldest queued frame to make room.
    DropOldest,
    /// Discard the new frame (logged).
    DropNewest,
}

/// Bounded FIFO of encoded frames awaiting write-readiness.
///
/// Producers run on arbitrary threads; the reactor drains from the front.
pub struct OutboundQueue {
    frames: Mutex<VecDeque<Bytes>>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl OutboundQueue {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            frames: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            policy,
        }
    }

    /// Enqueue a frame, applying the overflow policy at capacity.
    ///
    /// Returns `false` only under [`OverflowPolicy::RejectSend`] when the
    /// queue is full; the dropping policies always report acceptance.
    pub fn push(&self, frame: Bytes) -> bool {
        let mut frames = self.lock();
        if frames.len() >= self.capacity {
            match self.policy {
                OverflowPolicy::RejectSend => return false,
                OverflowPolicy::DropOldest => {
                    frames.pop_front();
                    warn!(capacity = self.capacity, "outbound queue full, dropped oldest frame");
                }
                OverflowPolicy::DropNewest => {
                    warn!(capacity = self.capacity, "outbound queue full, dropped new frame");
                    return true;
                }
            }
        }
        frames.push_back(frame);
        true
    }

    /// Take the frame at the front of the queue.
    pub fn pop(&self) -> Option<Bytes> {
        self.lock().pop_front()
    }

    /// Put a frame back at the front after a drain attempt could not start
    /// it.
    pub fn requeue_front(&self, frame: Bytes) {
        self.lock().push_front(frame);
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Bytes>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: u8) -> Bytes {
        Bytes::from(vec![tag])
    }

    #[test]
    fn fifo_order_preserved() {
        let queue = OutboundQueue::new(4, OverflowPolicy::RejectSend);
        assert!(queue.push(frame(1)));
        assert!(queue.push(frame(2)));
        assert_eq!(queue.pop().unwrap()[0], 1);
        assert_eq!(queue.pop().unwrap()[0], 2);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn reject_send_refuses_at_capacity() {
        let queue = OutboundQueue::new(2, OverflowPolicy::RejectSend);
        assert!(queue.push(frame(1)));
        assert!(queue.push(frame(2)));
        assert!(!queue.push(frame(3)));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn drop_oldest_evicts_front() {
        let queue = OutboundQueue::new(2, OverflowPolicy::DropOldest);
        assert!(queue.push(frame(1)));
        assert!(queue.push(frame(2)));
        assert!(queue.push(frame(3)));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap()[0], 2);
        assert_eq!(queue.pop().unwrap()[0], 3);
    }

    #[test]
    fn drop_newest_discards_incoming() {
        let queue = OutboundQueue::new(2, OverflowPolicy::DropNewest);
        assert!(queue.push(frame(1)));
        assert!(queue.push(frame(2)));
        assert!(queue.push(frame(3)));
        assert_eq!(queue.pop().unwrap()[0], 1);
        assert_eq!(queue.pop().unwrap()[0], 2);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn requeue_front_restores_drain_order() {
        let queue = OutboundQueue::new(4, OverflowPolicy::RejectSend);
        assert!(queue.push(frame(1)));
        assert!(queue.push(frame(2)));
        let popped = queue.pop().unwrap();
        queue.requeue_front(popped);
        assert_eq!(queue.pop().unwrap()[0], 1);
        assert_eq!(queue.pop().unwrap()[0], 2);
    }
}
