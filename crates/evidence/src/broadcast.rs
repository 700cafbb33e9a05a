//! In-memory broadcast queue: the gossip layer's ordered view of pending
//! evidence. Producers push, consumers walk entry by entry, and the
//! lifecycle manager detaches committed/expired entries in bulk. A watch
//! channel signals the empty→non-empty transition so consumers can park.

use std::collections::{BTreeMap, HashSet};

use parking_lot::Mutex;
use tokio::sync::watch;

use tessera_types::{Evidence, EvidenceHash};

/// Cursor handle into the queue. `seq` stays valid across concurrent
/// removals: advancing from a detached entry lands on the next live one.
#[derive(Clone, Debug)]
pub struct QueueEntry {
    pub seq: u64,
    pub evidence: Evidence,
}

struct Inner {
    entries: BTreeMap<u64, (EvidenceHash, Evidence)>,
    next_seq: u64,
}

pub struct BroadcastQueue {
    inner: Mutex<Inner>,
    nonempty: watch::Sender<bool>,
}

impl Default for BroadcastQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastQueue {
    pub fn new() -> Self {
        let (nonempty, _rx) = watch::channel(false);
        Self {
            inner: Mutex::new(Inner {
                entries: BTreeMap::new(),
                next_seq: 0,
            }),
            nonempty,
        }
    }

    pub fn push_back(&self, evidence: Evidence) {
        let hash = evidence.hash();
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(seq, (hash, evidence));
        if inner.entries.len() == 1 {
            self.nonempty.send_replace(true);
        }
    }

    pub fn front(&self) -> Option<QueueEntry> {
        let inner = self.inner.lock();
        inner
            .entries
            .iter()
            .next()
            .map(|(&seq, (_, ev))| QueueEntry {
                seq,
                evidence: ev.clone(),
            })
    }

    /// Next live entry after the given cursor position.
    pub fn next_after(&self, seq: u64) -> Option<QueueEntry> {
        let inner = self.inner.lock();
        inner
            .entries
            .range(seq + 1..)
            .next()
            .map(|(&seq, (_, ev))| QueueEntry {
                seq,
                evidence: ev.clone(),
            })
    }

    /// Detach every entry whose hash is in `hashes`; single traversal.
    /// Returns the number of entries removed.
    pub fn remove_matching(&self, hashes: &HashSet<EvidenceHash>) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, (hash, _)| !hashes.contains(hash));
        let removed = before - inner.entries.len();
        if removed > 0 && inner.entries.is_empty() {
            // re-arm: the next push is a fresh empty→non-empty transition
            self.nonempty.send_replace(false);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Signal channel: `true` while the queue is non-empty. Consumers do
    /// `rx.wait_for(|v| *v).await` and then start walking from `front()`.
    pub fn wait_chan(&self) -> watch::Receiver<bool> {
        self.nonempty.subscribe()
    }
}
