use crate::error::SnapshotError;
use crate::format::{self, Entry, Header};
use sstash_stash::Stash;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

fn committed_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.snap"))
}

fn staging_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.snap.staging"))
}

/// Writes `stash`'s current contents to its staging file, fsyncs, and
/// atomically renames it over the committed file. Does nothing and
/// returns `Ok(())` if the stash isn't dirty. On success the stash's
/// dirty flag is cleared; on I/O failure the flag is left set so the
/// next scheduler tick retries, and no partial committed file is ever
/// visible (the failure can only occur before the rename).
pub fn write_if_dirty(stash: &Stash, dir: &Path) -> Result<(), SnapshotError> {
    if !stash.is_dirty() {
        return Ok(());
    }

    let staging = staging_path(dir, stash.name());
    let committed = committed_path(dir, stash.name());

    let file = File::create(&staging)?;
    let mut writer = BufWriter::new(file);
    write_header(
        &mut writer,
        &Header {
            name: stash.name().to_string(),
            max_key_count: stash.max_key_count(),
            off_heap: stash.off_heap(),
        },
    )?;
    for (key, value, expires_at_ms) in stash.snapshot_entries()? {
        format::write_entry(&mut writer, &Entry { key, value, expires_at_ms })?;
    }
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&staging, &committed)?;
    stash.clear_dirty();
    Ok(())
}

fn write_header<W: Write>(w: &mut W, header: &Header) -> std::io::Result<()> {
    format::write_header(w, header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn clean_stash_is_not_written() {
        let dir = tempdir().unwrap();
        let stash = Stash::new("t".into(), 10, false, None, dir.path()).unwrap();
        write_if_dirty(&stash, dir.path()).unwrap();
        assert!(!committed_path(dir.path(), "t").exists());
    }

    #[test]
    fn dirty_stash_commits_and_clears_flag() {
        let dir = tempdir().unwrap();
        let stash = Arc::new(Stash::new("t".into(), 10, false, None, dir.path()).unwrap());
        stash.set(Bytes::from_static(b"k"), Bytes::from_static(b"v"), None).unwrap();
        assert!(stash.is_dirty());
        write_if_dirty(&stash, dir.path()).unwrap();
        assert!(!stash.is_dirty());
        assert!(committed_path(dir.path(), "t").exists());
        assert!(!staging_path(dir.path(), "t").exists());
    }
}
