use bytes::Bytes;
use sstash_stash::ReplicaFanout;
use tokio::sync::broadcast;

/// Bound on the fan-out buffer: a follower that falls this far behind has
/// its connection dropped rather than let a slow reader apply back
/// pressure to every write on the leader.
pub const FANOUT_BUFFER: usize = 4096;

/// Leader-side implementation of [`ReplicaFanout`]: every mutating command
/// is published once to a shared broadcast channel, and every connected
/// follower's sink task holds its own receiver. A follower with no
/// receivers subscribed yet (none connected) simply drops the publish —
/// `broadcast::Sender::send` failing with no receivers is not an error
/// here, it's the common case on a leader with zero followers.
pub struct LeaderFanout {
    sender: broadcast::Sender<Bytes>,
}

impl LeaderFanout {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FANOUT_BUFFER);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.sender.subscribe()
    }

    pub fn follower_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LeaderFanout {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplicaFanout for LeaderFanout {
    fn publish(&self, _stash_name: &str, encoded_command: Bytes) {
        let _ = self.sender.send(encoded_command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_with_no_followers_does_not_panic() {
        let fanout = LeaderFanout::new();
        fanout.publish("default", Bytes::from_static(b"x"));
    }

    #[tokio::test]
    async fn subscriber_receives_published_bytes() {
        let fanout = LeaderFanout::new();
        let mut rx = fanout.subscribe();
        fanout.publish("default", Bytes::from_static(b"hello"));
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"hello"));
    }
}
