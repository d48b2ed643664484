use crate::command::{try_parse, Command};
use crate::error::ProtocolError;
use crate::frame::TokenCodec;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::VecDeque;
use std::io;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

/// Failures while pulling the next command off a connection: either the
/// underlying transport broke, or the bytes it delivered don't form a
/// well-formed command.
#[derive(Debug, thiserror::Error)]
pub enum CommandStreamError {
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Turns a raw byte stream into a stream of [`Command`]s: tokens accumulate
/// in an internal queue until `try_parse` finds a complete command,
/// exactly mirroring the per-connection token queue described for the
/// dispatcher. Shared by the server's connection handler and the
/// replication follower's inbound command stream, so both apply the exact
/// same resumable parsing discipline.
pub struct CommandStream<T> {
    framed: FramedRead<T, TokenCodec>,
    tokens: VecDeque<Bytes>,
}

impl<T: AsyncRead + Unpin> CommandStream<T> {
    pub fn new(io: T) -> Self {
        Self {
            framed: FramedRead::new(io, TokenCodec::new()),
            tokens: VecDeque::new(),
        }
    }

    /// Returns the next parsed command, or `None` on a clean EOF with no
    /// partial command pending. An EOF in the middle of a command is
    /// reported as an error rather than silently dropped.
    pub async fn next_command(&mut self) -> Option<Result<Command, CommandStreamError>> {
        loop {
            match try_parse(&mut self.tokens) {
                Ok(Some(command)) => return Some(Ok(command)),
                Ok(None) => {}
                Err(e) => return Some(Err(e.into())),
            }

            match self.framed.next().await {
                Some(Ok(token)) => self.tokens.push_back(token),
                Some(Err(e)) => return Some(Err(e.into())),
                None => {
                    return if self.tokens.is_empty() {
                        None
                    } else {
                        Some(Err(CommandStreamError::Io(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "connection closed mid-command",
                        ))))
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::codec::Encoder;

    #[tokio::test]
    async fn parses_command_split_across_reads() {
        let (client, mut server) = tokio::io::duplex(64);
        tokio::spawn(async move {
            let mut codec = TokenCodec::new();
            let mut buf = bytes::BytesMut::new();
            for token in [b"GET".as_slice(), b"foo", b"0"] {
                codec.encode(Bytes::copy_from_slice(token), &mut buf).unwrap();
            }
            use tokio::io::AsyncWriteExt;
            for chunk in buf.chunks(1) {
                server.write_all(chunk).await.unwrap();
            }
        });

        let mut stream = CommandStream::new(client);
        let command = stream.next_command().await.unwrap().unwrap();
        assert_eq!(command, Command::Get { key: Bytes::from_static(b"foo"), name: None });
    }

    #[tokio::test]
    async fn eof_with_no_pending_tokens_returns_none() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let mut stream = CommandStream::new(client);
        assert!(stream.next_command().await.is_none());
    }
}
