use crate::error::StashError;
use crate::fanout::ReplicaFanout;
use crate::limits::MAX_NAME_LEN;
use crate::stash::Stash;
use bytes::Bytes;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_STASH_NAME: &str = "default";
pub const DEFAULT_MAX_KEY_COUNT: u64 = 1_000_000;

/// The directory of every stash known to a running node, keyed by name.
/// Creation and drop take no global lock beyond `DashMap`'s own sharding:
/// operations against different stashes never contend with each other.
pub struct StashManager {
    stashes: DashMap<String, Arc<Stash>>,
    data_dir: PathBuf,
    fanout: Option<Arc<dyn ReplicaFanout>>,
}

impl StashManager {
    /// Always provisions `default` eagerly, on-heap, uncapped at the
    /// documented default, so the very first `SET` against a fresh node
    /// works without an explicit `CREATE`.
    pub fn new(data_dir: &Path, fanout: Option<Arc<dyn ReplicaFanout>>) -> Result<Self, StashError> {
        std::fs::create_dir_all(data_dir).map_err(|e| StashError::Io(e.to_string()))?;
        let manager = Self {
            stashes: DashMap::new(),
            data_dir: data_dir.to_path_buf(),
            fanout,
        };
        manager.create(DEFAULT_STASH_NAME, DEFAULT_MAX_KEY_COUNT, false)?;
        Ok(manager)
    }

    fn check_name(name: &str) -> Result<(), StashError> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(StashError::NameTooLong);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<Stash>, StashError> {
        self.stashes
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StashError::NotFound(name.to_string()))
    }

    pub fn get_or_default(&self, name: Option<&str>) -> Result<Arc<Stash>, StashError> {
        self.get(name.unwrap_or(DEFAULT_STASH_NAME))
    }

    pub fn create(&self, name: &str, max_key_count: u64, off_heap: bool) -> Result<(), StashError> {
        Self::check_name(name)?;
        if self.stashes.contains_key(name) {
            return Err(StashError::AlreadyExists(name.to_string()));
        }
        let stash = Stash::new(
            name.to_string(),
            max_key_count,
            off_heap,
            self.fanout.clone(),
            &self.data_dir,
        )?;
        self.stashes.insert(name.to_string(), Arc::new(stash));
        Ok(())
    }

    /// Used by the snapshot reader at startup: if a committed snapshot file
    /// for `name` exists its header is authoritative for `max_key_count`
    /// and `off_heap`; otherwise falls back to provided defaults.
    pub fn restore_or_create(
        &self,
        name: &str,
        max_key_count: u64,
        off_heap: bool,
    ) -> Result<Arc<Stash>, StashError> {
        if !self.stashes.contains_key(name) {
            self.create(name, max_key_count, off_heap)?;
        }
        self.get(name)
    }

    pub fn drop(&self, name: &str) -> Result<(), StashError> {
        if name == DEFAULT_STASH_NAME {
            return Err(StashError::CannotDropDefault);
        }
        let (_, stash) = self
            .stashes
            .remove(name)
            .ok_or_else(|| StashError::NotFound(name.to_string()))?;
        stash.close();
        Ok(())
    }

    pub fn iter_stashes(&self) -> Vec<Arc<Stash>> {
        self.stashes.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.stashes.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Fans `encoded_command` out to every connected follower. Used for
    /// manager-level mutations (`CREATE`/`DROP`) that don't go through any
    /// single `Stash`'s own stripe-locked `publish`, since they act on the
    /// stash directory itself rather than a keyspace entry.
    pub fn publish(&self, stash_name: &str, encoded_command: Bytes) {
        if let Some(fanout) = &self.fanout {
            fanout.publish(stash_name, encoded_command);
        }
    }

    /// Best-effort shutdown: closes every stash so further operations
    /// surface `StashError::Closed` rather than racing a process exit.
    /// Does not delete snapshot files (unlike `drop`, this is a clean
    /// shutdown, not a deletion).
    pub fn close_all(&self) {
        for entry in self.stashes.iter() {
            entry.value().mark_closed_without_deleting();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn new_manager_has_default_stash() {
        let dir = tempdir().unwrap();
        let manager = StashManager::new(dir.path(), None).unwrap();
        assert!(manager.get(DEFAULT_STASH_NAME).is_ok());
    }

    #[test]
    fn create_and_drop_named_stash() {
        let dir = tempdir().unwrap();
        let manager = StashManager::new(dir.path(), None).unwrap();
        manager.create("widgets", 10, false).unwrap();
        assert!(manager.get("widgets").is_ok());
        manager.drop("widgets").unwrap();
        assert_eq!(
            manager.get("widgets").unwrap_err(),
            StashError::NotFound("widgets".to_string())
        );
    }

    #[test]
    fn cannot_drop_default() {
        let dir = tempdir().unwrap();
        let manager = StashManager::new(dir.path(), None).unwrap();
        assert_eq!(
            manager.drop(DEFAULT_STASH_NAME).unwrap_err(),
            StashError::CannotDropDefault
        );
    }

    #[test]
    fn create_duplicate_name_errors() {
        let dir = tempdir().unwrap();
        let manager = StashManager::new(dir.path(), None).unwrap();
        assert_eq!(
            manager.create(DEFAULT_STASH_NAME, 10, false).unwrap_err(),
            StashError::AlreadyExists(DEFAULT_STASH_NAME.to_string())
        );
    }
}
