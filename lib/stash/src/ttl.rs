use crate::limits::EXPIRE_SWEEP_LIMIT;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};

/// Bucketed expiration index: a priority ordering of `(expires_at, key)`.
///
/// Holds its own coarse lock, acceptable per the spec since it is only ever
/// held for index bookkeeping, never across a keyspace mutation.
#[derive(Default)]
pub struct TtlWheel {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    expires_by_key: HashMap<Bytes, u64>,
    by_time: BTreeSet<(u64, Bytes)>,
}

impl TtlWheel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any existing entry for `key` with a new expiration.
    pub fn add(&self, key: Bytes, expires_at_ms: u64) {
        let mut inner = self.inner.lock();
        if let Some(old) = inner.expires_by_key.insert(key.clone(), expires_at_ms) {
            inner.by_time.remove(&(old, key.clone()));
        }
        inner.by_time.insert((expires_at_ms, key));
    }

    pub fn remove(&self, key: &[u8]) {
        let mut inner = self.inner.lock();
        if let Some(old) = inner.expires_by_key.remove(key) {
            inner.by_time.remove(&(old, Bytes::copy_from_slice(key)));
        }
    }

    /// True if `key` has a tracked expiration that has already passed.
    pub fn is_expired(&self, key: &[u8], now_ms: u64) -> bool {
        let inner = self.inner.lock();
        inner
            .expires_by_key
            .get(key)
            .is_some_and(|&exp| exp <= now_ms)
    }

    /// Zero if `key` has no tracked expiration, used for snapshot serialization.
    pub fn expiration_of(&self, key: &[u8]) -> u64 {
        let inner = self.inner.lock();
        inner.expires_by_key.get(key).copied().unwrap_or(0)
    }

    /// Removes and returns all entries with `expires_at <= now_ms`, bounded
    /// per call to keep sweep latency short.
    pub fn expire_due(&self, now_ms: u64) -> Vec<Bytes> {
        let mut inner = self.inner.lock();
        let mut due = Vec::new();
        while due.len() < EXPIRE_SWEEP_LIMIT {
            let Some((exp, key)) = inner.by_time.iter().next().cloned() else {
                break;
            };
            if exp > now_ms {
                break;
            }
            inner.by_time.remove(&(exp, key.clone()));
            inner.expires_by_key.remove(&key);
            due.push(key);
        }
        due
    }
}
