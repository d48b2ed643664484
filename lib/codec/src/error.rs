use thiserror::Error;

/// Failures that stem from the shape of a request, as opposed to
/// `StashError`, which stems from its effect on a stash.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown verb: {0}")]
    UnknownVerb(String),
    #[error("missing required argument")]
    MissingArgument,
    #[error("invalid optional-argument count")]
    InvalidOptArgCount,
    #[error("malformed optional argument pair")]
    MalformedOptionalPair,
    #[error("write command rejected on read-only connection")]
    ReadOnly,
}
