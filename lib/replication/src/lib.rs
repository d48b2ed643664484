//! Single-leader replication: a leader fans out every successfully applied
//! mutating command to connected followers; a follower applies the same
//! stream to its own stash manager, bypassing the read-only gate.

mod fanout;
mod follower;
mod handshake;
mod sink;

pub use fanout::{LeaderFanout, FANOUT_BUFFER};
pub use follower::run as run_follower;
pub use handshake::{consume_preamble, is_replica_handshake, PREAMBLE};
pub use sink::run as run_replica_sink;
