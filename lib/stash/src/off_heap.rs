use crate::error::StashError;
use crate::keystore::KeyStore;
use bytes::Bytes;
use memmap2::MmapMut;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Off-heap keyspace: a persisted-page hash table backed by a memory-mapped
/// file pool, for working sets larger than comfortably fits on-heap.
///
/// Values are bump-allocated into the mapped arena; an in-memory index maps
/// each key to its `(offset, len)` slot. Overwriting a key appends a fresh
/// record rather than reusing the old slot — there is no compaction, so a
/// heavily-overwritten off-heap stash grows its backing file monotonically.
/// TODO: add compaction once a stash is dropped and recreated often enough
/// for this to matter in practice.
///
/// Every operation checks `closed` first: another thread may have closed
/// this store mid-call (e.g. via `DROP`), and that race must surface as
/// `StashError::Closed` rather than a panic.
pub(crate) struct OffHeapStore {
    path: PathBuf,
    mmap: RwLock<Option<MmapMut>>,
    index: RwLock<HashMap<Bytes, (u32, u32)>>,
    cursor: AtomicU64,
    capacity: u64,
    closed: AtomicBool,
}

impl OffHeapStore {
    /// `capacity` bounds the size of the backing file; once the bump
    /// allocator's cursor would exceed it, inserts fail with `CapacityFull`.
    pub(crate) fn new(path: PathBuf, capacity: u64) -> Result<Self, StashError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| StashError::Io(e.to_string()))?;
        file.set_len(capacity)
            .map_err(|e| StashError::Io(e.to_string()))?;
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|e| StashError::Io(e.to_string()))?;
        Ok(Self {
            path,
            mmap: RwLock::new(Some(mmap)),
            index: RwLock::new(HashMap::new()),
            cursor: AtomicU64::new(0),
            capacity,
            closed: AtomicBool::new(false),
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl KeyStore for OffHeapStore {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StashError> {
        if self.is_closed() {
            return Err(StashError::Closed);
        }
        let index = self.index.read();
        let Some(&(offset, len)) = index.get(key) else {
            return Ok(None);
        };
        let guard = self.mmap.read();
        let Some(mmap) = guard.as_ref() else {
            return Err(StashError::Closed);
        };
        let slice = &mmap[offset as usize..(offset as usize + len as usize)];
        Ok(Some(Bytes::copy_from_slice(slice)))
    }

    fn contains(&self, key: &[u8]) -> Result<bool, StashError> {
        if self.is_closed() {
            return Err(StashError::Closed);
        }
        Ok(self.index.read().contains_key(key))
    }

    fn insert(&self, key: Bytes, value: Bytes) -> Result<(), StashError> {
        if self.is_closed() {
            return Err(StashError::Closed);
        }
        let len = value.len() as u64;
        let offset = self.cursor.fetch_add(len, Ordering::AcqRel);
        if offset + len > self.capacity {
            // Roll the cursor back; this insert never happened.
            self.cursor.fetch_sub(len, Ordering::AcqRel);
            return Err(StashError::CapacityFull);
        }
        {
            let mut guard = self.mmap.write();
            let Some(mmap) = guard.as_mut() else {
                return Err(StashError::Closed);
            };
            mmap[offset as usize..(offset as usize + len as usize)].copy_from_slice(&value);
        }
        self.index
            .write()
            .insert(key, (offset as u32, len as u32));
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<(), StashError> {
        if self.is_closed() {
            return Err(StashError::Closed);
        }
        self.index.write().remove(key);
        Ok(())
    }

    fn len(&self) -> Result<usize, StashError> {
        if self.is_closed() {
            return Err(StashError::Closed);
        }
        Ok(self.index.read().len())
    }

    fn iter(&self) -> Result<Vec<(Bytes, Bytes)>, StashError> {
        if self.is_closed() {
            return Err(StashError::Closed);
        }
        let index = self.index.read();
        let guard = self.mmap.read();
        let Some(mmap) = guard.as_ref() else {
            return Err(StashError::Closed);
        };
        Ok(index
            .iter()
            .map(|(key, &(offset, len))| {
                let slice = &mmap[offset as usize..(offset as usize + len as usize)];
                (key.clone(), Bytes::copy_from_slice(slice))
            })
            .collect())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        *self.mmap.write() = None;
        self.index.write().clear();
        let _ = std::fs::remove_file(&self.path);
    }
}
