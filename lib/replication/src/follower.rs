use crate::handshake::PREAMBLE;
use backon::{ExponentialBuilder, Retryable};
use sstash_codec::{CommandStream, Reply};
use sstash_stash::StashManager;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

fn backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_factor(2.0)
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(30))
}

/// Runs forever: connects to `master_addr`, announces itself as a replica
/// with [`PREAMBLE`], and applies the inbound command stream to `manager`
/// bypassing the read-only gate. On any disconnect — clean or otherwise —
/// reconnects with exponential backoff. There is no resume offset: a
/// follower that misses writes during a disconnect silently diverges from
/// the leader until the next full resync (there is none implemented here;
/// see the design notes on replication's lack of a log).
pub async fn run(master_addr: SocketAddr, manager: Arc<StashManager>) {
    loop {
        let connected = (|| TcpStream::connect(master_addr))
            .retry(backoff())
            .notify(|err, dur| {
                tracing::warn!(?err, ?dur, %master_addr, "retrying connection to replication leader");
            })
            .await;

        let mut stream = match connected {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(error = %e, "giving up connecting to replication leader for now");
                tokio::time::sleep(Duration::from_secs(30)).await;
                continue;
            }
        };

        if let Err(e) = stream.write_all(PREAMBLE).await {
            tracing::warn!(error = %e, "failed to send replica preamble, reconnecting");
            continue;
        }

        tracing::info!(%master_addr, "connected to replication leader");
        apply_stream(stream, &manager).await;
        tracing::warn!("replication stream ended, reconnecting");
    }
}

async fn apply_stream(stream: TcpStream, manager: &Arc<StashManager>) {
    let mut commands = CommandStream::new(stream);
    loop {
        match commands.next_command().await {
            Some(Ok(command)) => {
                if let Reply::Error(message) = sstash_codec::execute(manager, command, false) {
                    tracing::warn!(error = %message, "replicated command failed to apply locally");
                }
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "replication stream error");
                return;
            }
            None => return,
        }
    }
}
