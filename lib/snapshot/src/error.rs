use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed snapshot record: {0}")]
    Malformed(String),
    #[error(transparent)]
    Stash(#[from] sstash_stash::StashError),
}
