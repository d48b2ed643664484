use crate::error::SnapshotError;
use crate::format::{self, Header};
use sstash_stash::{now_ms, StashManager};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Restores every committed snapshot found directly under `dir` into
/// `manager`. Each `<name>.snap` file becomes one stash, created (or
/// matched against an existing one) with the `max_key_count`/`off_heap`
/// recorded in its header. A stash with no committed file simply starts
/// empty via the manager's own default provisioning.
pub fn restore_all(manager: &StashManager, dir: &Path) -> Result<(), SnapshotError> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("snap") {
            if let Err(e) = restore_one(manager, &path) {
                tracing::warn!(file = %path.display(), error = %e, "failed to restore snapshot");
            }
        }
    }
    Ok(())
}

fn restore_one(manager: &StashManager, path: &Path) -> Result<(), SnapshotError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let Header { name, max_key_count, off_heap } = format::read_header(&mut reader)?;
    let stash = manager.restore_or_create(&name, max_key_count, off_heap)?;

    let now = now_ms();
    loop {
        match format::read_entry(&mut reader) {
            Ok(Some(entry)) => {
                if entry.expires_at_ms != 0 && entry.expires_at_ms <= now {
                    continue;
                }
                let ttl_ms = if entry.expires_at_ms == 0 { 0 } else { entry.expires_at_ms - now };
                if let Err(e) = stash.restore_entry(entry.key, entry.value, ttl_ms) {
                    tracing::warn!(stash = %name, error = %e, "dropping entry during restore");
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(stash = %name, error = %e, "truncating restore at malformed record");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::write_if_dirty;
    use bytes::Bytes;
    use tempfile::tempdir;

    #[test]
    fn restores_entries_written_by_a_prior_process() {
        let dir = tempdir().unwrap();
        {
            let manager = StashManager::new(dir.path(), None).unwrap();
            let stash = manager.get("default").unwrap();
            stash.set(Bytes::from_static(b"k"), Bytes::from_static(b"v"), None).unwrap();
            write_if_dirty(&stash, dir.path()).unwrap();
        }

        let manager = StashManager::new(dir.path(), None).unwrap();
        restore_all(&manager, dir.path()).unwrap();
        let stash = manager.get("default").unwrap();
        assert_eq!(stash.get(b"k", true).unwrap(), Some(Bytes::from_static(b"v")));
    }

    #[test]
    fn already_expired_entry_is_skipped_on_restore() {
        let dir = tempdir().unwrap();
        {
            let manager = StashManager::new(dir.path(), None).unwrap();
            let stash = manager.get("default").unwrap();
            stash.set_with_ttl(Bytes::from_static(b"k"), Bytes::from_static(b"v"), 0, None).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
            write_if_dirty(&stash, dir.path()).unwrap();
        }

        let manager = StashManager::new(dir.path(), None).unwrap();
        restore_all(&manager, dir.path()).unwrap();
        let stash = manager.get("default").unwrap();
        assert_eq!(stash.get(b"k", true).unwrap(), None);
    }
}
