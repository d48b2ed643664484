//! In-memory keyspace engine: named stashes, optional per-key TTL, optional
//! off-heap storage, and a pluggable replication fan-out hook.

mod error;
mod fanout;
mod keystore;
mod limits;
mod manager;
mod off_heap;
mod on_heap;
mod stash;
mod stripe;
mod ttl;

pub use error::StashError;
pub use fanout::ReplicaFanout;
pub use limits::{now_ms, MAX_KEY_LEN, MAX_NAME_LEN, MAX_VALUE_LEN};
pub use manager::{StashManager, DEFAULT_MAX_KEY_COUNT, DEFAULT_STASH_NAME};
pub use stash::Stash;
