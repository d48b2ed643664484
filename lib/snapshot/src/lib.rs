//! On-disk durability: a binary snapshot format per stash, a
//! staging-then-rename writer, startup restore, and a periodic scheduler.

mod error;
mod format;
mod reader;
mod scheduler;
mod writer;

pub use error::SnapshotError;
pub use reader::restore_all;
pub use scheduler::{run as run_scheduler, DEFAULT_INTERVAL};
pub use writer::write_if_dirty;
