//! Connected sessions and their bounded outbound queues

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::util::time::unix_millis;

pub type SessionId = Uuid;

/// Result of a non-blocking push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queue was full; the oldest message was discarded to make room
    DroppedOldest,
    /// Session is gone, nothing was queued
    Closed,
}

#[derive(Debug, Default)]
struct QueueInner {
    buf: VecDeque<Arc<str>>,
    closed: bool,
}

/// Bounded single-consumer queue with drop-oldest overflow.
///
/// Producers never wait: `push` takes a short lock and returns. The session's
/// writer task awaits `recv`.
#[derive(Debug)]
pub struct OutboundQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            notify: Notify::new(),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn push(&self, msg: Arc<str>) -> PushOutcome {
        let outcome = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return PushOutcome::Closed;
            }
            let outcome = if inner.buf.len() >= self.capacity {
                inner.buf.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
                PushOutcome::DroppedOldest
            } else {
                PushOutcome::Queued
            };
            inner.buf.push_back(msg);
            outcome
        };
        self.notify.notify_one();
        outcome
    }

    /// Next message, or `None` once closed and drained
    pub async fn recv(&self) -> Option<Arc<str>> {
        loop {
            {
                let mut inner = self.inner.lock();
                if let Some(msg) = inner.buf.pop_front() {
                    return Some(msg);
                }
                if inner.closed {
                    return None;
                }
            }
            // notify_one stores a permit, so a push between the check and
            // this await is not lost
            self.notify.notified().await;
        }
    }

    /// Stop accepting messages. Already queued messages can still be drained.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_one();
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().buf.len()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

const NO_ACK: u64 = u64::MAX;

/// One connected viewer/controller. Owned by the broadcast channel.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub connected_at: u64,
    alive: AtomicBool,
    last_ack: AtomicU64,
    queue: OutboundQueue,
}

impl Session {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            connected_at: unix_millis(),
            alive: AtomicBool::new(true),
            last_ack: AtomicU64::new(NO_ACK),
            queue: OutboundQueue::new(queue_capacity),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Mark dead and wake the writer so it can exit
    pub fn close(&self) {
        self.alive.store(false, Ordering::Release);
        self.queue.close();
    }

    pub fn push(&self, msg: Arc<str>) -> PushOutcome {
        if !self.is_alive() {
            return PushOutcome::Closed;
        }
        self.queue.push(msg)
    }

    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    /// Record the latest tick the client reports having displayed
    pub fn ack(&self, tick: u64) {
        let _ = self
            .last_ack
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current == NO_ACK || tick > current).then_some(tick)
            });
    }

    pub fn last_ack(&self) -> Option<u64> {
        match self.last_ack.load(Ordering::Acquire) {
            NO_ACK => None,
            tick => Some(tick),
        }
    }
}
