use crate::error::StashError;
use crate::fanout::ReplicaFanout;
use crate::keystore::KeyStore;
use crate::limits::{now_ms, MAX_KEY_LEN, MAX_VALUE_LEN, STRIPE_COUNT};
use crate::off_heap::OffHeapStore;
use crate::on_heap::OnHeapStore;
use crate::stripe::StripeLocks;
use crate::ttl::TtlWheel;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A named table: keyspace + TTL index + capacity policy, unified behind a
/// single locked facade regardless of whether it's on-heap or off-heap
/// backed. Every mutation and every lazy-expiry action takes the affected
/// key's stripe lock.
pub struct Stash {
    name: String,
    max_key_count: u64,
    off_heap: bool,
    store: Box<dyn KeyStore>,
    ttl: TtlWheel,
    stripes: StripeLocks,
    // Tracked independently of `store.len()`: reserving a slot is a single
    // atomic op across every stripe, so two inserts of different new keys
    // on different stripes can never both pass the capacity check.
    count: AtomicU64,
    backup_dirty: AtomicBool,
    closed: AtomicBool,
    fanout: Option<Arc<dyn ReplicaFanout>>,
    data_dir: PathBuf,
}

impl Stash {
    pub fn new(
        name: String,
        max_key_count: u64,
        off_heap: bool,
        fanout: Option<Arc<dyn ReplicaFanout>>,
        data_dir: &Path,
    ) -> Result<Self, StashError> {
        let store: Box<dyn KeyStore> = if off_heap {
            // Arena sized generously relative to the key-count cap; real
            // deployments would make this configurable per stash.
            let capacity = max_key_count.saturating_mul((MAX_KEY_LEN + MAX_VALUE_LEN) as u64);
            Box::new(OffHeapStore::new(
                data_dir.join(format!("{name}.heap")),
                capacity.max(1 << 20),
            )?)
        } else {
            Box::new(OnHeapStore::new())
        };
        Ok(Self {
            name,
            max_key_count,
            off_heap,
            store,
            ttl: TtlWheel::new(),
            stripes: StripeLocks::new(STRIPE_COUNT),
            count: AtomicU64::new(0),
            backup_dirty: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            fanout,
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_key_count(&self) -> u64 {
        self.max_key_count
    }

    pub fn off_heap(&self) -> bool {
        self.off_heap
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn check_open(&self) -> Result<(), StashError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StashError::Closed)
        } else {
            Ok(())
        }
    }

    fn check_sizes(key: &[u8], value: &[u8]) -> Result<(), StashError> {
        if key.len() > MAX_KEY_LEN {
            return Err(StashError::KeyTooLong);
        }
        if value.len() > MAX_VALUE_LEN {
            return Err(StashError::ValueTooLong);
        }
        Ok(())
    }

    fn publish(&self, encoded_command: Bytes) {
        if let Some(fanout) = &self.fanout {
            fanout.publish(&self.name, encoded_command);
        }
    }

    /// Atomically reserves a keyspace slot for `key` if it doesn't already
    /// have one. The check-and-increment is a single atomic op against a
    /// counter shared by every stripe, so concurrent inserts of distinct new
    /// keys on distinct stripes can never together exceed `max_key_count`
    /// the way a `store.len() >= max` check taken under only the per-key
    /// lock could. Returns whether a new slot was reserved, so the caller
    /// can release it if the insert that follows fails.
    fn reserve_slot(&self, key: &[u8]) -> Result<bool, StashError> {
        if self.store.contains(key)? {
            return Ok(false);
        }
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count < self.max_key_count).then_some(count + 1)
            })
            .map(|_| true)
            .map_err(|_| {
                tracing::warn!(stash = %self.name, max_key_count = self.max_key_count, "capacity full, rejecting insert");
                StashError::CapacityFull
            })
    }

    fn release_slot(&self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }

    /// Insert/overwrite `key`. Clears any stale-expired TTL entry; preserves
    /// TTL for live entries.
    pub fn set(&self, key: Bytes, value: Bytes, replicate: Option<Bytes>) -> Result<(), StashError> {
        self.check_open()?;
        Self::check_sizes(&key, &value)?;
        let _guard = self.stripes.lock(&key);
        let reserved = self.reserve_slot(&key)?;
        if self.ttl.is_expired(&key, now_ms()) {
            self.ttl.remove(&key);
        }
        if let Err(e) = self.store.insert(key, value) {
            if reserved {
                self.release_slot();
            }
            return Err(e);
        }
        self.backup_dirty.store(true, Ordering::Relaxed);
        if let Some(bytes) = replicate {
            self.publish(bytes);
        }
        Ok(())
    }

    /// Insert/overwrite and set expiration to `now + ttl_ms`.
    pub fn set_with_ttl(
        &self,
        key: Bytes,
        value: Bytes,
        ttl_ms: u64,
        replicate: Option<Bytes>,
    ) -> Result<(), StashError> {
        self.check_open()?;
        Self::check_sizes(&key, &value)?;
        let _guard = self.stripes.lock(&key);
        let reserved = self.reserve_slot(&key)?;
        if let Err(e) = self.store.insert(key.clone(), value) {
            if reserved {
                self.release_slot();
            }
            return Err(e);
        }
        self.ttl.add(key, now_ms() + ttl_ms);
        self.backup_dirty.store(true, Ordering::Relaxed);
        if let Some(bytes) = replicate {
            self.publish(bytes);
        }
        Ok(())
    }

    /// Returns the value if `key` is present and not expired. If expired
    /// and not read-only, deletes lazily and returns absent; if read-only,
    /// returns absent without mutation.
    pub fn get(&self, key: &[u8], read_only: bool) -> Result<Option<Bytes>, StashError> {
        self.check_open()?;
        let Some(value) = self.store.get(key)? else {
            return Ok(None);
        };
        if !self.ttl.is_expired(key, now_ms()) {
            return Ok(Some(value));
        }
        if read_only {
            return Ok(None);
        }
        // Double-checked lazy expiry: re-validate under the stripe lock
        // before deleting, since another thread may have refreshed the TTL,
        // or removed the key outright, between the lock-free read above and
        // here — the `contains` check keeps `release_slot` from firing
        // twice for the same key.
        let _guard = self.stripes.lock(key);
        if self.ttl.is_expired(key, now_ms()) && self.store.contains(key)? {
            self.store.remove(key)?;
            self.release_slot();
            self.ttl.remove(key);
            self.backup_dirty.store(true, Ordering::Relaxed);
        }
        Ok(None)
    }

    /// Remove `key` and its TTL entry.
    pub fn delete(&self, key: &[u8], replicate: Option<Bytes>) -> Result<(), StashError> {
        self.check_open()?;
        let _guard = self.stripes.lock(key);
        if self.store.contains(key)? {
            self.store.remove(key)?;
            self.release_slot();
            self.ttl.remove(key);
            self.backup_dirty.store(true, Ordering::Relaxed);
        }
        if let Some(bytes) = replicate {
            self.publish(bytes);
        }
        Ok(())
    }

    /// Set expiration if `key` exists; no-op (not an error) if absent.
    pub fn update_ttl(
        &self,
        key: &[u8],
        ttl_ms: u64,
        replicate: Option<Bytes>,
    ) -> Result<(), StashError> {
        self.check_open()?;
        let _guard = self.stripes.lock(key);
        if self.store.contains(key)? {
            self.ttl.add(Bytes::copy_from_slice(key), now_ms() + ttl_ms);
            self.backup_dirty.store(true, Ordering::Relaxed);
            if let Some(bytes) = replicate {
                self.publish(bytes);
            }
        }
        Ok(())
    }

    /// Remove all keys whose expiration has passed. Intended to be driven
    /// by a shared background timer (active expiry), independent of the
    /// lazy expiry performed by `get`.
    pub fn expire_due(&self) -> Result<(), StashError> {
        self.check_open()?;
        let due = self.ttl.expire_due(now_ms());
        let mut removed = 0u64;
        for key in due {
            let _guard = self.stripes.lock(&key);
            if self.store.contains(&key)? {
                self.store.remove(&key)?;
                self.release_slot();
                removed += 1;
            }
        }
        if removed > 0 {
            self.backup_dirty.store(true, Ordering::Relaxed);
            tracing::debug!(stash = %self.name, removed, "active ttl sweep removed expired keys");
        }
        Ok(())
    }

    /// For snapshot serialization: zero means no TTL.
    pub fn expiration_of(&self, key: &[u8]) -> u64 {
        self.ttl.expiration_of(key)
    }

    /// Used by the snapshot reader to restore an entry under its original
    /// TTL without going through the replication path.
    pub fn restore_entry(&self, key: Bytes, value: Bytes, ttl_ms: u64) -> Result<(), StashError> {
        if ttl_ms == 0 {
            self.set(key, value, None)
        } else {
            self.set_with_ttl(key, value, ttl_ms, None)
        }
    }

    /// Current key count, for `INFO`.
    pub fn len(&self) -> Result<usize, StashError> {
        self.check_open()?;
        self.store.len()
    }

    pub fn is_empty(&self) -> Result<bool, StashError> {
        Ok(self.len()? == 0)
    }

    pub fn is_dirty(&self) -> bool {
        self.backup_dirty.load(Ordering::Relaxed)
    }

    pub fn clear_dirty(&self) {
        self.backup_dirty.store(false, Ordering::Relaxed);
    }

    /// Snapshot of every live `(key, value, expires_at_ms_or_zero)` triple.
    /// This is a fuzzy point-in-time view: concurrent mutations during
    /// iteration are accepted, not serialized against.
    pub fn snapshot_entries(&self) -> Result<Vec<(Bytes, Bytes, u64)>, StashError> {
        self.check_open()?;
        Ok(self
            .store
            .iter()?
            .into_iter()
            .map(|(k, v)| {
                let expires_at = self.ttl.expiration_of(&k);
                (k, v, expires_at)
            })
            .collect())
    }

    /// Closes this stash: marks it closed so in-flight operations observe
    /// `StashError::Closed`, closes any mapped files, and deletes its
    /// snapshot file pair. Used for `DROP`, which is a deletion.
    pub fn close(&self) {
        tracing::info!(stash = %self.name, "closing stash, deleting snapshot files");
        self.closed.store(true, Ordering::Release);
        self.store.close();
        let _ = std::fs::remove_file(self.data_dir.join(format!("{}.snap", self.name)));
        let _ = std::fs::remove_file(self.data_dir.join(format!("{}.snap.staging", self.name)));
    }

    /// Marks the stash closed for process shutdown without touching its
    /// on-disk snapshot or heap file, so a restart can restore from them.
    pub fn mark_closed_without_deleting(&self) {
        self.closed.store(true, Ordering::Release);
        self.store.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn new_stash(max_key_count: u64) -> Stash {
        let dir = tempdir().unwrap();
        // Leak the tempdir so it outlives the stash for the duration of the test.
        let path = dir.keep();
        Stash::new("t".into(), max_key_count, false, None, &path).unwrap()
    }

    #[test]
    fn set_then_get_roundtrips() {
        let stash = new_stash(10);
        stash
            .set(Bytes::from_static(b"foo"), Bytes::from_static(b"bar"), None)
            .unwrap();
        assert_eq!(
            stash.get(b"foo", false).unwrap(),
            Some(Bytes::from_static(b"bar"))
        );
    }

    #[test]
    fn capacity_is_enforced() {
        let stash = new_stash(2);
        stash.set(Bytes::from_static(b"a"), Bytes::from_static(b"1"), None).unwrap();
        stash.set(Bytes::from_static(b"b"), Bytes::from_static(b"2"), None).unwrap();
        let err = stash
            .set(Bytes::from_static(b"c"), Bytes::from_static(b"3"), None)
            .unwrap_err();
        assert_eq!(err, StashError::CapacityFull);
        // Overwriting an existing key never trips the cap.
        stash.set(Bytes::from_static(b"a"), Bytes::from_static(b"11"), None).unwrap();
    }

    #[test]
    fn ttl_expires_and_is_lazily_removed() {
        let stash = new_stash(10);
        stash
            .set_with_ttl(Bytes::from_static(b"x"), Bytes::from_static(b"y"), 0, None)
            .unwrap();
        // Already expired: read-only get must not remove it...
        assert_eq!(stash.get(b"x", true).unwrap(), None);
        assert!(stash.len().unwrap() >= 1);
        // ...but a mutating get does.
        assert_eq!(stash.get(b"x", false).unwrap(), None);
        assert_eq!(stash.len().unwrap(), 0);
    }

    #[test]
    fn update_ttl_on_absent_key_is_noop_not_error() {
        let stash = new_stash(10);
        stash.update_ttl(b"missing", 1000, None).unwrap();
    }

    #[test]
    fn closed_stash_rejects_operations() {
        let stash = new_stash(10);
        stash.close();
        assert_eq!(
            stash.set(Bytes::from_static(b"a"), Bytes::from_static(b"b"), None),
            Err(StashError::Closed)
        );
    }

    #[test]
    fn key_and_value_size_limits_enforced() {
        let stash = new_stash(10);
        let big_key = Bytes::from(vec![0u8; MAX_KEY_LEN + 1]);
        assert_eq!(
            stash.set(big_key, Bytes::from_static(b"v"), None),
            Err(StashError::KeyTooLong)
        );
        let big_value = Bytes::from(vec![0u8; MAX_VALUE_LEN + 1]);
        assert_eq!(
            stash.set(Bytes::from_static(b"k"), big_value, None),
            Err(StashError::ValueTooLong)
        );
    }
}
