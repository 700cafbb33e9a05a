//! The evidence pool. Maintains a set of valid evidence in three synchronized
//! views (pending keyspace, broadcast queue, size counter), buffers evidence
//! arriving from local consensus until the next height, promotes pending
//! evidence to committed when its block finalizes, and expires what never
//! made it into a block.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rocksdb::WriteBatch;
use tokio::sync::watch;

use tessera_types::{
    evidence_from_bytes, evidence_list_size, sort_by_voting_power, BlockStore, Evidence,
    EvidenceHash, State, StateStore,
};

use crate::broadcast::{BroadcastQueue, QueueEntry};
use crate::error::EvidenceError;
use crate::metrics;
use crate::store::{EvidenceStore, StoreError};
use crate::verify::EvidenceVerifier;

struct Inner {
    /// Latest committed state, replaced wholesale by `update`.
    state: State,
    /// Evidence delivered by local consensus at the current height. Held
    /// back until the next `update` so every honest peer has reached the
    /// height it refers to before anyone proposes it.
    consensus_buffer: Vec<Evidence>,
    /// Sweep cursor: no pending evidence can expire before the chain passes
    /// both of these, so `update` skips the scan until then.
    pruning_height: u64,
    pruning_time_ms: u64,
}

pub struct Pool {
    store: EvidenceStore,
    queue: BroadcastQueue,
    /// Cardinality of the pending set. Incremented after a successful
    /// pending write, decremented after a successful batch-delete sync.
    evidence_size: AtomicU32,
    block_store: Arc<dyn BlockStore>,
    verifier: Arc<dyn EvidenceVerifier>,
    inner: Mutex<Inner>,
}

fn is_expired(state: &State, height: u64, time_ms: u64) -> bool {
    let params = &state.evidence_params;
    // both ages must be exceeded; either alone keeps the evidence alive
    state.last_block_height.saturating_sub(height) > params.max_age_num_blocks
        && state.last_block_time_ms.saturating_sub(time_ms) > params.max_age_duration_ms
}

impl Pool {
    /// Open a pool over an existing evidence store. Pending evidence left
    /// over from a prior run is swept for expiry, counted, and reloaded
    /// into the broadcast queue oldest-first.
    pub fn new(
        store: EvidenceStore,
        state_store: Arc<dyn StateStore>,
        block_store: Arc<dyn BlockStore>,
        verifier: Arc<dyn EvidenceVerifier>,
    ) -> Result<Self, EvidenceError> {
        let state = state_store.load()?;

        let pool = Self {
            store,
            queue: BroadcastQueue::new(),
            evidence_size: AtomicU32::new(0),
            block_store,
            verifier,
            inner: Mutex::new(Inner {
                state,
                consensus_buffer: Vec::new(),
                pruning_height: 0,
                pruning_time_ms: 0,
            }),
        };

        // seed the counter so the startup sweep decrements from the real
        // cardinality rather than zero
        let on_disk = pool.store.iter_pending().filter(|e| e.is_ok()).count() as u32;
        pool.evidence_size.store(on_disk, Ordering::SeqCst);

        let (pruning_height, pruning_time_ms) = pool.remove_expired_pending_evidence();
        {
            let mut inner = pool.inner.lock();
            inner.pruning_height = pruning_height;
            inner.pruning_time_ms = pruning_time_ms;
        }

        let (pending, _) = pool.list_evidence(-1)?;
        pool.evidence_size
            .store(pending.len() as u32, Ordering::SeqCst);
        metrics::set_pending(pending.len() as u32);
        for ev in pending {
            pool.queue.push_back(ev);
        }

        Ok(pool)
    }

    /// Gossip ingress: verify untrusted evidence and admit it to the pending
    /// set. Idempotent; evidence we already hold (pending or committed) is a
    /// successful no-op, since a lagging peer may legitimately resend.
    pub fn add_evidence(&self, ev: Evidence) -> Result<(), EvidenceError> {
        let (height, hash) = (ev.height(), ev.hash());
        log::debug!("attempting to add evidence: height={height} hash={hash}");

        if self.is_pending(&ev) {
            log::info!("evidence already pending; ignoring: hash={hash}");
            return Ok(());
        }
        if self.is_committed(&ev) {
            log::debug!("evidence was already committed; ignoring: hash={hash}");
            return Ok(());
        }

        self.verify(&ev)?;

        if self.add_pending_evidence(&ev)? {
            self.queue.push_back(ev);
        }

        log::info!("verified new evidence of byzantine behavior: height={height} hash={hash}");
        Ok(())
    }

    /// Consensus ingress: trusted, so no verification. Buffered until the
    /// next `update` rather than admitted outright; proposing evidence at
    /// the height it was produced would let it into blocks that peers still
    /// working on that height cannot validate.
    pub fn add_evidence_from_consensus(&self, ev: Evidence) -> Result<(), EvidenceError> {
        let (height, hash) = (ev.height(), ev.hash());

        if self.is_pending(&ev) {
            log::info!("evidence already pending; ignoring: hash={hash}");
            return Ok(());
        }

        let mut inner = self.inner.lock();
        inner.consensus_buffer.push(ev);
        log::info!(
            "received new evidence of byzantine behavior from consensus: height={height} hash={hash}"
        );
        Ok(())
    }

    /// Block-validation path: verify every piece of evidence carried by a
    /// proposed block. Evidence we have already verified is fast-checked;
    /// the rest goes through the full gate and is persisted (it is about to
    /// be committed, so it is not re-broadcast). Rejects duplicates within
    /// the block and evidence that is already committed.
    pub fn check_evidence(&self, ev_list: &[Evidence]) -> Result<(), EvidenceError> {
        let mut hashes: Vec<EvidenceHash> = Vec::with_capacity(ev_list.len());

        for (idx, ev) in ev_list.iter().enumerate() {
            if !self.fast_check(ev) {
                if self.is_committed(ev) {
                    return Err(EvidenceError::invalid(ev, "evidence was already committed"));
                }

                self.verify(ev)?;

                if let Err(err) = self.add_pending_evidence(ev) {
                    // the evidence is known-valid at this point; a persist
                    // failure must not fail the block
                    log::error!("failed to add evidence to pending list: {err}");
                }

                log::info!(
                    "verified new evidence of byzantine behavior: height={} hash={}",
                    ev.height(),
                    ev.hash()
                );
            }

            hashes.push(ev.hash());
            if hashes[..idx].contains(&hashes[idx]) {
                return Err(EvidenceError::invalid(ev, "duplicate evidence"));
            }
        }

        Ok(())
    }

    /// Block-proposal path: pending evidence oldest-first, capped so the
    /// serialized list stays within `max_bytes` (`-1` = no cap). The entry
    /// that would cross the cap is excluded, not truncated.
    pub fn pending_evidence(&self, max_bytes: i64) -> (Vec<Evidence>, i64) {
        if self.size() == 0 {
            return (Vec::new(), 0);
        }

        match self.list_evidence(max_bytes) {
            Ok(res) => res,
            Err(err) => {
                log::error!("failed to retrieve pending evidence: {err}");
                (Vec::new(), 0)
            }
        }
    }

    /// Commit driver. Flushes the consensus buffer into the pending set,
    /// advances the state snapshot, promotes the block's evidence from
    /// pending to committed, and runs at most one expiry sweep.
    ///
    /// Panics if `new_state` does not advance `last_block_height`; the
    /// consensus driver feeding this out of order is unrecoverable.
    pub fn update(&self, new_state: State, committed: &[Evidence]) {
        let (prev_height, pruning_height, pruning_time_ms) = {
            let inner = self.inner.lock();
            (
                inner.state.last_block_height,
                inner.pruning_height,
                inner.pruning_time_ms,
            )
        };

        if new_state.last_block_height <= prev_height {
            panic!(
                "evidence pool update: new state height {} is not greater than previous height {}",
                new_state.last_block_height, prev_height,
            );
        }

        log::info!(
            "updating evidence pool: last_block_height={} last_block_time_ms={}",
            new_state.last_block_height,
            new_state.last_block_time_ms,
        );

        {
            let mut inner = self.inner.lock();
            self.flush_consensus_buffer(&mut inner);
            inner.state = new_state.clone();
        }

        self.mark_evidence_as_committed(committed, new_state.last_block_height);

        if self.size() > 0
            && new_state.last_block_height > pruning_height
            && new_state.last_block_time_ms > pruning_time_ms
        {
            let (height, time_ms) = self.remove_expired_pending_evidence();
            let mut inner = self.inner.lock();
            inner.pruning_height = height;
            inner.pruning_time_ms = time_ms;
        }
    }

    /// Number of evidence entries in the pending set.
    pub fn size(&self) -> u32 {
        self.evidence_size.load(Ordering::SeqCst)
    }

    /// Snapshot of the state the pool last saw.
    pub fn state(&self) -> State {
        self.inner.lock().state.clone()
    }

    /// Head of the broadcast queue, if any.
    pub fn front(&self) -> Option<QueueEntry> {
        self.queue.front()
    }

    /// Advance a gossip cursor to the next live queue entry.
    pub fn next_after(&self, seq: u64) -> Option<QueueEntry> {
        self.queue.next_after(seq)
    }

    /// Fires (turns `true`) when the broadcast queue becomes non-empty.
    pub fn wait_chan(&self) -> watch::Receiver<bool> {
        self.queue.wait_chan()
    }

    pub fn is_pending(&self, ev: &Evidence) -> bool {
        match self.store.has_pending(ev) {
            Ok(found) => found,
            Err(err) => {
                log::error!("failed to find pending evidence: {err}");
                false
            }
        }
    }

    pub fn is_committed(&self, ev: &Evidence) -> bool {
        match self.store.has_committed(ev) {
            Ok(found) => found,
            Err(err) => {
                log::error!("failed to find committed evidence: {err}");
                false
            }
        }
    }

    // ── verification gate ────────────────────────────────────────────────

    fn verify(&self, ev: &Evidence) -> Result<(), EvidenceError> {
        let state = self.state();

        if let Err(err) = ev.validate_basic() {
            return Err(EvidenceError::invalid(ev, err.to_string()));
        }

        if is_expired(&state, ev.height(), ev.time_ms()) {
            return Err(EvidenceError::invalid(
                ev,
                format!(
                    "evidence from height {} ({} ms) is too old at height {} ({} ms)",
                    ev.height(),
                    ev.time_ms(),
                    state.last_block_height,
                    state.last_block_time_ms,
                ),
            ));
        }

        self.verifier
            .verify(ev, &state, self.block_store.as_ref())
            .map_err(|err| EvidenceError::invalid(ev, err.to_string()))
    }

    /// Skip full verification when the pool has already verified this exact
    /// evidence. For light-client attacks the stored pending copy must name
    /// the same byzantine validators (compared after sorting by voting
    /// power; re-running the bisection is what this saves). Anything else
    /// fast-checks iff it is already pending.
    fn fast_check(&self, ev: &Evidence) -> bool {
        let lcae = match ev {
            Evidence::LightClientAttack(lcae) => lcae,
            _ => return self.is_pending(ev),
        };

        let bytes = match self.store.get_pending_bytes(ev) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return false,
            Err(err) => {
                log::error!(
                    "failed to load light client attack evidence: hash={} err={err}",
                    ev.hash()
                );
                return false;
            }
        };

        let trusted = match evidence_from_bytes(&bytes) {
            Ok(Evidence::LightClientAttack(trusted)) => trusted,
            Ok(_) => return false,
            Err(err) => {
                log::error!(
                    "failed to decode light client attack evidence: hash={} err={err}",
                    ev.hash()
                );
                return false;
            }
        };

        if trusted.byzantine_validators.len() != lcae.byzantine_validators.len() {
            return false;
        }

        let mut byz = lcae.byzantine_validators.clone();
        sort_by_voting_power(&mut byz);

        trusted
            .byzantine_validators
            .iter()
            .zip(&byz)
            .all(|(stored, incoming)| {
                stored.address == incoming.address
                    && stored.voting_power == incoming.voting_power
            })
    }

    // ── lifecycle internals ──────────────────────────────────────────────

    /// Returns whether the evidence was newly written. Distinct evidence
    /// values can share a pending key (a light-client attack's identity
    /// excludes its byzantine list); writing again would overwrite in
    /// place, so the counter only moves, and callers only enqueue, for a
    /// genuinely new key.
    fn add_pending_evidence(&self, ev: &Evidence) -> Result<bool, StoreError> {
        if self.store.has_pending(ev)? {
            return Ok(false);
        }
        self.store.put_pending(ev)?;
        let size = self.evidence_size.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::inc_added();
        metrics::set_pending(size);
        Ok(true)
    }

    fn decrement_size(&self, n: u32) {
        let prev = self
            .evidence_size
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
                Some(cur.saturating_sub(n))
            })
            .unwrap_or(0);
        if prev < n {
            log::error!("evidence size counter underflow: had {prev}, removing {n}");
        }
        metrics::set_pending(prev.saturating_sub(n));
    }

    /// Caller holds the pool mutex. An item that fails to persist is
    /// dropped with a log line; peers re-gossip anything that matters.
    fn flush_consensus_buffer(&self, inner: &mut Inner) {
        for ev in std::mem::take(&mut inner.consensus_buffer) {
            match self.add_pending_evidence(&ev) {
                // gossip can beat the buffer to the same key; the queue
                // entry already exists then
                Ok(true) => self.queue.push_back(ev),
                Ok(false) => {}
                Err(err) => {
                    log::error!(
                        "failed to flush evidence from consensus buffer to pending list: {err}"
                    );
                }
            }
        }
    }

    fn mark_evidence_as_committed(&self, evidence: &[Evidence], commit_height: u64) {
        let mut block_evidence: HashSet<EvidenceHash> = HashSet::with_capacity(evidence.len());
        let mut batch = self.store.new_batch();

        for ev in evidence {
            if self.is_pending(ev) {
                self.store.batch_delete_pending(&mut batch, ev);
                block_evidence.insert(ev.hash());
            }

            // the block store holds the evidence itself; recording the
            // commit height is enough
            if let Err(err) = self.store.put_committed(ev, commit_height) {
                log::error!(
                    "failed to save committed evidence: height={} hash={} err={err}",
                    ev.height(),
                    ev.hash()
                );
                continue;
            }

            log::info!(
                "marked evidence as committed: height={} hash={}",
                ev.height(),
                ev.hash()
            );
        }

        if block_evidence.is_empty() {
            return;
        }

        self.queue.remove_matching(&block_evidence);

        if let Err(err) = self.store.write_sync(batch) {
            log::error!("failed to batch delete pending evidence: {err}");
            return;
        }

        self.decrement_size(block_evidence.len() as u32);
        metrics::inc_committed(block_evidence.len() as u64);
    }

    /// Returns the `(height, time)` pair before which no remaining pending
    /// evidence can expire, i.e. when the next sweep is worth running.
    fn remove_expired_pending_evidence(&self) -> (u64, u64) {
        let mut batch = self.store.new_batch();

        let (height, time_ms, removed) = self.batch_expired_pending_evidence(&mut batch);

        if removed.is_empty() {
            return (height, time_ms);
        }

        let state = self.state();
        log::debug!(
            "removing expired evidence: height={} time_ms={} expired={}",
            state.last_block_height,
            state.last_block_time_ms,
            removed.len()
        );

        self.queue.remove_matching(&removed);

        if let Err(err) = self.store.write_sync(batch) {
            log::error!("failed to batch delete pending evidence: {err}");
            return (state.last_block_height, state.last_block_time_ms);
        }

        self.decrement_size(removed.len() as u32);
        metrics::inc_expired(removed.len() as u64);

        (height, time_ms)
    }

    fn batch_expired_pending_evidence(
        &self,
        batch: &mut WriteBatch,
    ) -> (u64, u64, HashSet<EvidenceHash>) {
        let state = self.state();
        let params = state.evidence_params;
        let mut removed: HashSet<EvidenceHash> = HashSet::new();

        for item in self.store.iter_pending() {
            let entry = match item {
                Ok(entry) => entry,
                Err(err) => {
                    log::error!("failed to read pending evidence during expiry sweep: {err}");
                    continue;
                }
            };
            let ev = &entry.evidence;

            if !is_expired(&state, ev.height(), ev.time_ms()) {
                // scan is height-ordered: everything after this is younger.
                // Report when this entry will have expired so the caller
                // knows when the next sweep is due.
                return (
                    ev.height() + params.max_age_num_blocks + 1,
                    ev.time_ms() + params.max_age_duration_ms + 1_000,
                    removed,
                );
            }

            log::debug!(
                "marking expired evidence for deletion: height={} hash={}",
                ev.height(),
                ev.hash()
            );
            self.store.batch_delete_key(batch, &entry.key);
            removed.insert(ev.hash());
        }

        (state.last_block_height, state.last_block_time_ms, removed)
    }

    fn list_evidence(&self, max_bytes: i64) -> Result<(Vec<Evidence>, i64), StoreError> {
        let mut evidence: Vec<Evidence> = Vec::new();
        let mut total_size: i64 = 0;

        for item in self.store.iter_pending() {
            let entry = item?;
            evidence.push(entry.evidence);

            // measured on the whole list, the way it will sit in the block
            let size = evidence_list_size(&evidence)? as i64;
            if max_bytes != -1 && size > max_bytes {
                evidence.pop();
                return Ok((evidence, total_size));
            }
            total_size = size;
        }

        Ok((evidence, total_size))
    }
}
