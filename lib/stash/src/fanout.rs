use bytes::Bytes;

/// A sink for replicated mutations, implemented by the replication crate's
/// leader-side fan-out and handed to every stash at construction time.
///
/// Kept as a trait here (rather than a dependency on the replication crate)
/// so the core engine has no knowledge of sockets or followers: it only
/// knows that a successful mutation may need to be published somewhere,
/// and that the publish must happen while the key's stripe lock is held so
/// that per-sink ordering matches per-key ordering.
pub trait ReplicaFanout: Send + Sync {
    fn publish(&self, stash_name: &str, encoded_command: Bytes);
}
