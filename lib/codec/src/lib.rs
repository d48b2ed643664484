//! Wire protocol: token framing, command parsing, and reply encoding.
//!
//! Layered bottom-up: [`frame::TokenCodec`] frames `<decimal_length>\r\n<bytes>`
//! tokens; [`command`] assembles tokens into [`Command`]s with resumable
//! parsing; [`dispatcher::execute`] runs a command against a
//! [`sstash_stash::StashManager`] and produces a [`Reply`].

mod command;
mod dispatcher;
mod error;
mod frame;
mod reply;
mod stream;

pub use command::{encode_command, try_parse, Command, MAX_OPT_ARGS, OPT_NAME};
pub use dispatcher::execute;
pub use error::ProtocolError;
pub use frame::TokenCodec;
pub use reply::Reply;
pub use stream::{CommandStream, CommandStreamError};
