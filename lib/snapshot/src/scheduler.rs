use crate::writer::write_if_dirty;
use sstash_stash::StashManager;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default tick interval for the snapshot scheduler; overridable via
/// `ServerConfig`.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Drives periodic snapshotting for every stash in `manager`. One shared
/// task rather than one per stash: `write_if_dirty` is a no-op for a clean
/// stash, so iterating the whole directory every tick costs nothing for
/// stashes that haven't changed, and there's no per-stash task lifecycle
/// to manage as stashes are created and dropped.
///
/// Cooperative shutdown: the loop exits as soon as `shutdown` resolves,
/// without waiting for an in-flight tick. The final snapshot before
/// process exit is not guaranteed to complete.
pub async fn run(manager: Arc<StashManager>, dir: PathBuf, interval: Duration, shutdown: impl std::future::Future<Output = ()>) {
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for stash in manager.iter_stashes() {
                    if let Err(e) = write_if_dirty(&stash, &dir) {
                        tracing::warn!(stash = stash.name(), error = %e, "snapshot write failed, will retry next tick");
                    }
                }
            }
            _ = &mut shutdown => {
                tracing::info!("snapshot scheduler shutting down");
                break;
            }
        }
    }
}
