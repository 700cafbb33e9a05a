//! RocksDB-backed evidence store: two prefixed keyspaces (pending and
//! committed) whose keys sort by `(prefix, height, hash)`, so a forward scan
//! from a prefix visits evidence oldest-height-first.
//!
//! Key layout, single column family:
//! - pending:   `[10][height be64][hash 32]` → canonical evidence bytes
//! - committed: `[9][height be64][hash 32]`  → commit height (be64)

use std::path::{Path, PathBuf};

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use thiserror::Error;

use tessera_types::{evidence_from_bytes, evidence_to_bytes, CodecError, Evidence};

/// Prefix tags. Disjoint from every other keyspace of the node's databases.
const PREFIX_COMMITTED: u8 = 9;
const PREFIX_PENDING: u8 = 10;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rocksdb error: {0}")]
    Rocks(#[from] rocksdb::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Clone, Debug)]
pub struct StoreCfg {
    pub db_path: PathBuf,
    pub enable_compression: bool,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/evidence-db"),
            enable_compression: true,
        }
    }
}

fn encode_key(prefix: u8, height: u64, hash: &[u8; 32]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 8 + 32);
    key.push(prefix);
    key.extend_from_slice(&height.to_be_bytes());
    key.extend_from_slice(hash);
    key
}

fn key_pending(ev: &Evidence) -> Vec<u8> {
    encode_key(PREFIX_PENDING, ev.height(), ev.hash().as_bytes())
}

fn key_committed(ev: &Evidence) -> Vec<u8> {
    encode_key(PREFIX_COMMITTED, ev.height(), ev.hash().as_bytes())
}

/// A pending-keyspace entry: the raw key (for batched deletes) plus the
/// decoded evidence.
pub struct PendingEntry {
    pub key: Vec<u8>,
    pub evidence: Evidence,
}

pub struct EvidenceStore {
    db: DB,
}

impl EvidenceStore {
    pub fn open(cfg: &StoreCfg) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        if cfg.enable_compression {
            opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        }
        let db = DB::open(&opts, &cfg.db_path)?;
        Ok(Self { db })
    }

    pub fn open_default(path: &Path) -> Result<Self> {
        Self::open(&StoreCfg {
            db_path: path.to_path_buf(),
            enable_compression: true,
        })
    }

    pub fn has_pending(&self, ev: &Evidence) -> Result<bool> {
        Ok(self.db.get_pinned(key_pending(ev))?.is_some())
    }

    pub fn has_committed(&self, ev: &Evidence) -> Result<bool> {
        Ok(self.db.get_pinned(key_committed(ev))?.is_some())
    }

    pub fn put_pending(&self, ev: &Evidence) -> Result<()> {
        let bytes = evidence_to_bytes(ev)?;
        self.db.put(key_pending(ev), bytes)?;
        Ok(())
    }

    /// Raw stored bytes of a pending entry, if present. The fast-check path
    /// decodes these itself so it can log codec trouble distinctly.
    pub fn get_pending_bytes(&self, ev: &Evidence) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key_pending(ev))?)
    }

    /// Record an entry in the committed keyspace. The block store already has
    /// the evidence itself, so the value is just the commit height.
    pub fn put_committed(&self, ev: &Evidence, commit_height: u64) -> Result<()> {
        self.db
            .put(key_committed(ev), commit_height.to_be_bytes())?;
        Ok(())
    }

    /// Height the evidence was committed at, if it is committed at all.
    pub fn committed_height(&self, ev: &Evidence) -> Result<Option<u64>> {
        match self.db.get_pinned(key_committed(ev))? {
            Some(v) => Ok(v.as_ref().try_into().ok().map(u64::from_be_bytes)),
            None => Ok(None),
        }
    }

    pub fn new_batch(&self) -> WriteBatch {
        WriteBatch::default()
    }

    pub fn batch_delete_pending(&self, batch: &mut WriteBatch, ev: &Evidence) {
        batch.delete(key_pending(ev));
    }

    pub fn batch_delete_key(&self, batch: &mut WriteBatch, key: &[u8]) {
        batch.delete(key);
    }

    /// Commit a delete batch with fsync. Callers decrement their counters
    /// only after this returns Ok.
    pub fn write_sync(&self, batch: WriteBatch) -> Result<()> {
        let mut opts = WriteOptions::default();
        opts.set_sync(true);
        self.db.write_opt(batch, &opts)?;
        Ok(())
    }

    /// Forward scan of the pending keyspace, ascending `(height, hash)`.
    pub fn iter_pending(&self) -> impl Iterator<Item = Result<PendingEntry>> + '_ {
        self.db
            .iterator(IteratorMode::From(&[PREFIX_PENDING], Direction::Forward))
            .take_while(|item| match item {
                // the scan runs off the end of the prefix, not the db
                Ok((key, _)) => key.first() == Some(&PREFIX_PENDING),
                Err(_) => true,
            })
            .map(|item| {
                let (key, value) = item?;
                let evidence = evidence_from_bytes(&value)?;
                Ok(PendingEntry {
                    key: key.into_vec(),
                    evidence,
                })
            })
    }
}
