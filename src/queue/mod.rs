/*!
Bounded broadcast queue shared by all connection threads.

Every registered reader sees every message written after it registered. An item is released
once the slowest reader has moved past it. Writers block while the queue is full and are
paced by [pacing::QueueState] when readers fall behind. With no reader registered, messages
are dropped on write.
*/
pub mod pacing;

use crate::config::PacingConfig;
use crate::models::DecodedMessage;
use log::{debug, warn};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use thiserror::Error;

pub use pacing::{PacingMode, QueueState};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,
}

/// Counters of a queue at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStats {
    pub occupancy: u64,
    pub capacity: usize,
    pub readers: usize,
    pub writers: usize,
    pub total_writes: u64,
    pub dropped: u64,
    pub pacing_active: bool,
    pub pacing_activations: u64,
    pub writes_limit: f64,
}

struct QueueInner {
    state: QueueState,
    items: VecDeque<Arc<DecodedMessage>>,
    /// Next position to read, per reader id.
    reader_positions: HashMap<u64, u64>,
    next_reader_id: u64,
    dropped: u64,
    closed: bool,
}

impl QueueInner {
    /// Moves the head to the slowest reader and releases everything before it.
    fn release_read_items(&mut self) {
        let new_head = self
            .reader_positions
            .values()
            .copied()
            .min()
            .unwrap_or(self.state.tail);
        while self.state.head < new_head {
            self.items.pop_front();
            self.state.head += 1;
        }
    }
}

struct Shared {
    inner: Mutex<QueueInner>,
    readable: Condvar,
    writable: Condvar,
}

/// Handle to a queue. Clones refer to the same queue.
#[derive(Clone)]
pub struct MessageQueue {
    shared: Arc<Shared>,
}

impl MessageQueue {
    pub fn new(capacity: usize, config: PacingConfig) -> Self {
        let inner = QueueInner {
            state: QueueState::new(capacity.max(1), config, SystemTime::now()),
            items: VecDeque::new(),
            reader_positions: HashMap::new(),
            next_reader_id: 0,
            dropped: 0,
            closed: false,
        };
        MessageQueue {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                readable: Condvar::new(),
                writable: Condvar::new(),
            }),
        }
    }

    pub fn register_writer(&self) -> QueueWriter {
        let slot = self.shared.inner.lock().state.add_writer();
        QueueWriter {
            shared: self.shared.clone(),
            slot,
        }
    }

    /// Registers a reader positioned at the current tail.
    pub fn register_reader(&self) -> QueueReader {
        let mut inner = self.shared.inner.lock();
        let id = inner.next_reader_id;
        inner.next_reader_id += 1;
        let tail = inner.state.tail;
        inner.reader_positions.insert(id, tail);
        inner.state.add_reader();
        QueueReader {
            shared: self.shared.clone(),
            id,
        }
    }

    /// Rejects further writes and wakes everyone up. Readers still get what is queued.
    pub fn close(&self) {
        self.shared.inner.lock().closed = true;
        self.shared.readable.notify_all();
        self.shared.writable.notify_all();
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.shared.inner.lock();
        QueueStats {
            occupancy: inner.state.occupancy(),
            capacity: inner.state.capacity(),
            readers: inner.state.reader_count(),
            writers: inner.state.writer_count(),
            total_writes: inner.state.tail,
            dropped: inner.dropped,
            pacing_active: inner.state.pacing_active(),
            pacing_activations: inner.state.pacing_activations(),
            writes_limit: inner.state.writes_limit(),
        }
    }
}

/// A registered producer. Unregisters itself on drop.
pub struct QueueWriter {
    shared: Arc<Shared>,
    slot: usize,
}

impl QueueWriter {
    /// Appends a message, first waiting out any pacing delay and then for free space.
    pub fn enqueue(&self, message: DecodedMessage) -> Result<(), QueueError> {
        let mut inner = self.shared.inner.lock();
        if inner.closed {
            return Err(QueueError::Closed);
        }

        inner.state.update_interval(SystemTime::now());
        if let Some(wait) = inner.state.apply_pacing(self.slot, SystemTime::now()) {
            MutexGuard::unlocked(&mut inner, || std::thread::sleep(wait));
            inner.state.update_interval(SystemTime::now());
        }

        while inner.state.is_full() && !inner.reader_positions.is_empty() && !inner.closed {
            self.shared.writable.wait(&mut inner);
        }
        if inner.closed {
            return Err(QueueError::Closed);
        }

        inner.state.record_write(self.slot);
        if inner.reader_positions.is_empty() {
            inner.dropped += 1;
            inner.state.head = inner.state.tail;
            debug!("no reader registered, dropped {} message", message.session_id);
            return Ok(());
        }
        inner.items.push_back(Arc::new(message));
        self.shared.readable.notify_all();
        Ok(())
    }
}

impl Drop for QueueWriter {
    fn drop(&mut self) {
        self.shared.inner.lock().state.remove_writer(self.slot);
    }
}

/// A registered consumer. Unregisters itself on drop, releasing what only it held.
pub struct QueueReader {
    shared: Arc<Shared>,
    id: u64,
}

impl QueueReader {
    /// Blocks until a message is available. `None` once the queue is closed and drained.
    pub fn read(&self) -> Option<Arc<DecodedMessage>> {
        let mut inner = self.shared.inner.lock();
        loop {
            if let Some(message) = self.take_next(&mut inner) {
                return Some(message);
            }
            if inner.closed {
                return None;
            }
            self.shared.readable.wait(&mut inner);
        }
    }

    pub fn try_read(&self) -> Option<Arc<DecodedMessage>> {
        let mut inner = self.shared.inner.lock();
        self.take_next(&mut inner)
    }

    pub fn read_timeout(&self, timeout: Duration) -> Option<Arc<DecodedMessage>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.inner.lock();
        loop {
            if let Some(message) = self.take_next(&mut inner) {
                return Some(message);
            }
            if inner.closed {
                return None;
            }
            if self
                .shared
                .readable
                .wait_until(&mut inner, deadline)
                .timed_out()
            {
                return self.take_next(&mut inner);
            }
        }
    }

    /// Messages written but not yet read by this reader.
    pub fn pending(&self) -> u64 {
        let inner = self.shared.inner.lock();
        let position = inner.reader_positions.get(&self.id).copied();
        position.map_or(0, |p| inner.state.tail - p)
    }

    fn take_next(&self, inner: &mut QueueInner) -> Option<Arc<DecodedMessage>> {
        let position = *inner.reader_positions.get(&self.id)?;
        if position >= inner.state.tail {
            return None;
        }
        let index = (position - inner.state.head) as usize;
        let message = inner.items.get(index).cloned()?;
        inner.reader_positions.insert(self.id, position + 1);
        inner.state.record_read();

        let was_full = inner.state.is_full();
        inner.release_read_items();
        inner.state.check_pacing_stop();
        if was_full && !inner.state.is_full() {
            self.shared.writable.notify_all();
        }
        Some(message)
    }
}

impl Drop for QueueReader {
    fn drop(&mut self) {
        let mut inner = self.shared.inner.lock();
        inner.reader_positions.remove(&self.id);
        inner.state.remove_reader();
        let queued = inner.items.len();
        inner.release_read_items();
        if inner.reader_positions.is_empty() && queued > 0 {
            warn!("last reader left, {} queued messages released", queued);
        }
        inner.state.check_pacing_stop();
        self.shared.writable.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageKind;
    use crate::session::SessionId;
    use bytes::Bytes;
    use std::thread;

    fn message(n: u32) -> DecodedMessage {
        DecodedMessage::new(
            SessionId(n),
            MessageKind::FromPeer,
            Bytes::from(vec![0xFF; 19]),
        )
    }

    #[test]
    fn test_broadcast_to_all_readers() {
        let queue = MessageQueue::new(10, PacingConfig::default());
        let writer = queue.register_writer();
        let a = queue.register_reader();
        let b = queue.register_reader();

        writer.enqueue(message(1)).unwrap();
        writer.enqueue(message(2)).unwrap();

        assert_eq!(a.try_read().unwrap().session_id, SessionId(1));
        assert_eq!(a.try_read().unwrap().session_id, SessionId(2));
        assert!(a.try_read().is_none());
        // b still holds both items
        assert_eq!(queue.stats().occupancy, 2);
        assert_eq!(b.read().unwrap().session_id, SessionId(1));
        assert_eq!(queue.stats().occupancy, 1);
        drop(b);
        assert_eq!(queue.stats().occupancy, 0);
    }

    #[test]
    fn test_no_reader_drops() {
        let queue = MessageQueue::new(2, PacingConfig::default());
        let writer = queue.register_writer();
        for n in 0..5 {
            writer.enqueue(message(n)).unwrap();
        }
        let stats = queue.stats();
        assert_eq!(stats.dropped, 5);
        assert_eq!(stats.occupancy, 0);
        assert_eq!(stats.total_writes, 5);
    }

    #[test]
    fn test_last_reader_releases_queue() {
        let queue = MessageQueue::new(10, PacingConfig::default());
        let reader = queue.register_reader();
        let writer = queue.register_writer();
        for n in 0..3 {
            writer.enqueue(message(n)).unwrap();
        }
        assert_eq!(queue.stats().occupancy, 3);
        drop(reader);
        assert_eq!(queue.stats().occupancy, 0);
        writer.enqueue(message(3)).unwrap();
        assert_eq!(queue.stats().dropped, 1);
    }

    #[test]
    fn test_late_reader_starts_at_tail() {
        let queue = MessageQueue::new(10, PacingConfig::default());
        let writer = queue.register_writer();
        let early = queue.register_reader();
        writer.enqueue(message(1)).unwrap();
        let late = queue.register_reader();
        writer.enqueue(message(2)).unwrap();

        assert_eq!(late.pending(), 1);
        assert_eq!(late.try_read().unwrap().session_id, SessionId(2));
        assert_eq!(early.pending(), 2);
    }

    #[test]
    fn test_full_queue_blocks_writer() {
        let queue = MessageQueue::new(2, PacingConfig::default());
        let reader = queue.register_reader();
        let writer_queue = queue.clone();
        let handle = thread::spawn(move || {
            let writer = writer_queue.register_writer();
            for n in 0..4 {
                writer.enqueue(message(n)).unwrap();
            }
        });

        let mut seen = vec![];
        while seen.len() < 4 {
            if let Some(m) = reader.read_timeout(Duration::from_secs(5)) {
                seen.push(m.session_id.0);
            }
        }
        handle.join().unwrap();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_close_wakes_reader() {
        let queue = MessageQueue::new(4, PacingConfig::default());
        let reader = queue.register_reader();
        let writer = queue.register_writer();
        writer.enqueue(message(7)).unwrap();
        queue.close();

        assert_eq!(writer.enqueue(message(8)), Err(QueueError::Closed));
        assert_eq!(reader.read().unwrap().session_id, SessionId(7));
        assert!(reader.read().is_none());
    }

    #[test]
    fn test_read_timeout_expires() {
        let queue = MessageQueue::new(4, PacingConfig::default());
        let reader = queue.register_reader();
        assert!(reader.read_timeout(Duration::from_millis(20)).is_none());
    }
}
