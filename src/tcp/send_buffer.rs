//! SendBuffer: tracks unacknowledged TCP segments keyed by their expected-ACK number, with lazy
//! removal from the retransmit-ordering heap and a time-based retransmission trigger.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

use crate::tcp::segment::TcpFlags;

/// One unacknowledged segment: its original sequence number, payload, and control flags.
#[derive(Debug, Clone)]
pub struct SentSegment {
    pub seq: u64,
    pub payload: Vec<u8>,
    pub flags: TcpFlags,
}

/// Dict-plus-priority-queue pattern: a `HashMap` holds the live entries, a min-heap orders them
/// by insertion time for retransmit scanning. Heap entries for keys no longer in the map are
/// stale and skipped lazily rather than removed eagerly.
pub struct SendBuffer {
    heap: BinaryHeap<Reverse<(Instant, u64)>>,
    live: HashMap<u64, SentSegment>,
    retransmit_threshold: Duration,
}

impl SendBuffer {
    pub fn new(retransmit_threshold: Duration) -> Self {
        SendBuffer {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
            retransmit_threshold,
        }
    }

    /// Inserts a segment keyed by its expected-ACK number, timestamped now.
    pub fn push(&mut self, expected_ack: u64, entry: SentSegment) {
        self.heap.push(Reverse((Instant::now(), expected_ack)));
        self.live.insert(expected_ack, entry);
    }

    /// Drops stale heap entries whose key is no longer live.
    fn clear(&mut self) {
        while let Some(&Reverse((_, key))) = self.heap.peek() {
            if self.live.contains_key(&key) {
                break;
            }
            self.heap.pop();
        }
    }

    /// Marks `ack` as acknowledged, if it is still outstanding.
    pub fn confirm(&mut self, ack: u64) {
        if self.live.remove(&ack).is_some() {
            self.clear();
        }
    }

    /// Number of live (unacknowledged) entries.
    pub fn size(&self) -> usize {
        self.live.len()
    }

    /// Pops the oldest live entry, re-inserts it with a fresh timestamp so it is not picked
    /// again immediately, and returns its key and segment.
    pub fn get(&mut self) -> Option<(u64, SentSegment)> {
        self.clear();
        let Reverse((_, key)) = self.heap.pop()?;
        let entry = self.live.get(&key)?.clone();
        self.heap.push(Reverse((Instant::now(), key)));
        Some((key, entry))
    }

    /// True iff the oldest live entry has sat unacknowledged longer than the retransmit
    /// threshold.
    pub fn should_send(&mut self) -> bool {
        self.clear();
        match self.heap.peek() {
            Some(&Reverse((ts, _))) => ts.elapsed() > self.retransmit_threshold,
            None => false,
        }
    }
}
