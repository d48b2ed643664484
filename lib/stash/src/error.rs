use thiserror::Error;

/// Errors surfaced by stash operations.
///
/// These map directly onto the client-visible error kinds from the wire
/// protocol; the dispatcher is responsible for turning a `StashError`
/// into an `ERROR <message>` reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StashError {
    #[error("stash does not exist: {0}")]
    NotFound(String),

    #[error("stash closed")]
    Closed,

    #[error("capacity full")]
    CapacityFull,

    #[error("key too long")]
    KeyTooLong,

    #[error("value too long")]
    ValueTooLong,

    #[error("name too long")]
    NameTooLong,

    #[error("cannot drop default stash")]
    CannotDropDefault,

    #[error("stash already exists: {0}")]
    AlreadyExists(String),

    #[error("io error: {0}")]
    Io(String),
}
