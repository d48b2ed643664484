use crate::error::StashError;
use bytes::Bytes;

/// Unifies the on-heap and off-heap keyspace variants behind one interface.
///
/// Every method can fail: the off-heap variant may observe its backing
/// store closed by a concurrent `close()` call mid-operation, which must be
/// caught and surfaced as `StashError::Closed` rather than panicking or
/// tearing down the caller's connection.
pub(crate) trait KeyStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StashError>;
    fn contains(&self, key: &[u8]) -> Result<bool, StashError>;
    fn insert(&self, key: Bytes, value: Bytes) -> Result<(), StashError>;
    fn remove(&self, key: &[u8]) -> Result<(), StashError>;
    fn len(&self) -> Result<usize, StashError>;
    fn iter(&self) -> Result<Vec<(Bytes, Bytes)>, StashError>;
    fn close(&self);
}
