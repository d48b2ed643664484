use crate::error::StashError;
use crate::keystore::KeyStore;
use bytes::Bytes;
use dashmap::DashMap;

/// On-heap keyspace: a concurrent hash map of owned byte strings. Fast,
/// bounded only by key count.
pub(crate) struct OnHeapStore {
    map: DashMap<Bytes, Bytes>,
}

impl OnHeapStore {
    pub(crate) fn new() -> Self {
        Self { map: DashMap::new() }
    }
}

impl KeyStore for OnHeapStore {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StashError> {
        Ok(self.map.get(key).map(|entry| entry.value().clone()))
    }

    fn contains(&self, key: &[u8]) -> Result<bool, StashError> {
        Ok(self.map.contains_key(key))
    }

    fn insert(&self, key: Bytes, value: Bytes) -> Result<(), StashError> {
        self.map.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<(), StashError> {
        self.map.remove(key);
        Ok(())
    }

    fn len(&self) -> Result<usize, StashError> {
        Ok(self.map.len())
    }

    fn iter(&self) -> Result<Vec<(Bytes, Bytes)>, StashError> {
        Ok(self
            .map
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    fn close(&self) {
        self.map.clear();
    }
}
