use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::broadcast;

/// Feeds one connected follower from the leader's fan-out broadcast
/// channel until its write fails or it falls too far behind. Never
/// returns an error: failure just means this sink is done, which the
/// caller observes by the function returning.
pub async fn run(mut sink: OwnedWriteHalf, mut rx: broadcast::Receiver<bytes::Bytes>) {
    loop {
        match rx.recv().await {
            Ok(encoded_command) => {
                if let Err(e) = sink.write_all(&encoded_command).await {
                    tracing::info!(error = %e, "replica sink write failed, closing");
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "replica fell behind fan-out buffer, dropping connection");
                return;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
