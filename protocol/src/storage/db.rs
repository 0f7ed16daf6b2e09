//! # Persistent Storage (LevyDB)
//!
//! The persistence layer for a Levy token, built on sled's embedded
//! key-value store. All on-disk data flows through this module.
//!
//! ## Tree Layout
//!
//! | Tree     | Key                    | Value                        |
//! |----------|------------------------|------------------------------|
//! | `state`  | `token` (UTF-8)        | `bincode(TokenState)`        |
//! | `state`  | `layout_version`       | `u16` (2B BE)                |
//! | `events` | `sequence` (8B BE)     | `bincode(Notification)`      |
//!
//! Sequence numbers are stored big-endian so that sled's lexicographic
//! ordering matches numeric ordering and range scans return events in the
//! order they were committed.
//!
//! ## Atomicity
//!
//! A snapshot and the notifications produced by the operation that led to
//! it are written in one multi-tree sled transaction. Either the new state
//! and its events land on disk together or neither does.
//!
//! The store is generic over the snapshot and event types so it has no
//! dependency on the contract crate that defines them.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;

use crate::config::STATE_LAYOUT_VERSION;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transaction aborted: {0}")]
    Transaction(String),

    #[error("unsupported state layout version {found}, expected {expected}")]
    LayoutVersion { found: u16, expected: u16 },
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

const KEY_TOKEN: &[u8] = b"token";
const KEY_LAYOUT_VERSION: &[u8] = b"layout_version";

// ---------------------------------------------------------------------------
// LevyDB
// ---------------------------------------------------------------------------

/// Persistent storage for a single token instance.
///
/// Cheap to clone: sled handles are reference counted, so `LevyDB` can be
/// shared across request handlers via `Arc` or by value.
#[derive(Debug, Clone)]
pub struct LevyDB {
    db: Db,
    /// Current token snapshot plus its layout version.
    state: Tree,
    /// Committed notifications keyed by sequence number.
    events: Tree,
}

impl LevyDB {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    ///
    /// Ideal for unit tests: no filesystem side effects, no cleanup needed.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let state = db.open_tree("state")?;
        let events = db.open_tree("events")?;
        Ok(Self { db, state, events })
    }

    // -- Snapshot operations ------------------------------------------------

    /// Persist a token snapshot together with the notifications committed
    /// since the previous snapshot.
    ///
    /// Events are keyed by their sequence number, so re-writing an event that
    /// is already stored is harmless.
    pub fn put_snapshot<S, E>(&self, snapshot: &S, new_events: &[(u64, E)]) -> DbResult<()>
    where
        S: Serialize,
        E: Serialize,
    {
        let snapshot_bytes = encode(snapshot)?;
        let event_records = new_events
            .iter()
            .map(|(seq, event)| Ok((seq.to_be_bytes().to_vec(), encode(event)?)))
            .collect::<DbResult<Vec<_>>>()?;
        let version_bytes = STATE_LAYOUT_VERSION.to_be_bytes().to_vec();

        let result: Result<(), TransactionError<()>> =
            (&self.state, &self.events).transaction(|(state, events)| {
                state.insert(KEY_TOKEN, snapshot_bytes.clone())?;
                state.insert(KEY_LAYOUT_VERSION, version_bytes.clone())?;
                for (key, value) in &event_records {
                    events.insert(key.clone(), value.clone())?;
                }
                Ok::<(), ConflictableTransactionError<()>>(())
            });
        result.map_err(|e| DbError::Transaction(format!("{:?}", e)))?;

        self.db.flush()?;
        Ok(())
    }

    /// Load the stored token snapshot, if one exists.
    ///
    /// Fails with [`DbError::LayoutVersion`] when the snapshot was written by
    /// an incompatible release.
    pub fn get_snapshot<S: DeserializeOwned>(&self) -> DbResult<Option<S>> {
        if let Some(raw) = self.state.get(KEY_LAYOUT_VERSION)? {
            let bytes: [u8; 2] = raw[..]
                .try_into()
                .map_err(|_| DbError::Serialization("corrupt layout version".into()))?;
            let found = u16::from_be_bytes(bytes);
            if found != STATE_LAYOUT_VERSION {
                return Err(DbError::LayoutVersion {
                    found,
                    expected: STATE_LAYOUT_VERSION,
                });
            }
        }

        match self.state.get(KEY_TOKEN)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Returns `true` if a token has been initialized in this database.
    pub fn has_snapshot(&self) -> DbResult<bool> {
        Ok(self.state.contains_key(KEY_TOKEN)?)
    }

    // -- Event operations ---------------------------------------------------

    /// All notifications with sequence number `>= from`, in commit order.
    pub fn events_since<E: DeserializeOwned>(&self, from: u64) -> DbResult<Vec<(u64, E)>> {
        let mut out = Vec::new();
        for entry in self.events.range(from.to_be_bytes()..) {
            let (key, value) = entry?;
            let bytes: [u8; 8] = key[..]
                .try_into()
                .map_err(|_| DbError::Serialization("corrupt event key".into()))?;
            out.push((u64::from_be_bytes(bytes), decode(&value)?));
        }
        Ok(out)
    }

    /// Number of stored notifications.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> DbResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    bincode::deserialize(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
