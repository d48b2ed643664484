use sstash_codec::{CommandStream, CommandStreamError};
use sstash_stash::StashManager;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Serves one client connection: parses commands off the socket and writes
/// back exactly one reply per command, until the peer disconnects or a
/// protocol error makes the stream unrecoverable. A rejected or failed
/// command (bad verb, read-only violation, stash error) ends in an
/// `ERROR` reply, never a dropped connection.
pub async fn serve(stream: TcpStream, peer: std::net::SocketAddr, manager: Arc<StashManager>, read_only: bool) {
    let (read_half, mut write_half) = stream.into_split();
    let mut commands = CommandStream::new(read_half);

    loop {
        match commands.next_command().await {
            Some(Ok(command)) => {
                let reply = sstash_codec::execute(&manager, command, read_only);
                if let Err(e) = write_half.write_all(&reply.encode()).await {
                    tracing::debug!(%peer, error = %e, "failed to write reply, closing connection");
                    return;
                }
            }
            Some(Err(CommandStreamError::Protocol(e))) => {
                // A malformed command desyncs the token stream: there is no
                // safe boundary to resume parsing from, so the connection
                // ends here rather than risk misinterpreting the next bytes.
                let reply = sstash_codec::Reply::Error(e.to_string());
                let _ = write_half.write_all(&reply.encode()).await;
                return;
            }
            Some(Err(CommandStreamError::Io(e))) => {
                tracing::debug!(%peer, error = %e, "connection error");
                return;
            }
            None => return,
        }
    }
}
