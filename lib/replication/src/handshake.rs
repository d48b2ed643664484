use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

/// Sent by a follower immediately after connecting, before any command
/// token, so the leader's connection handler can tell a replica apart from
/// an ordinary client on the very same primary port. Chosen because the
/// wire protocol otherwise starts every client request with a decimal
/// length prefix, and this magic string can never collide with one: it
/// opens with an ASCII letter, not a digit.
pub const PREAMBLE: &[u8; 8] = b"SSTASHR1";

/// Peeks at the first 8 bytes of a freshly accepted connection without
/// consuming them, so a client connection is left untouched for the
/// ordinary command parser. Returns `true` if they match [`PREAMBLE`].
///
/// Blocks until 8 bytes are available or the peer closes early; a client
/// sending fewer than 8 bytes total before closing is simply not a
/// replica, same as any other malformed connection. `peek` always reads
/// from the start of the still-unconsumed stream, so every retry re-reads
/// into the same full buffer rather than appending to a partial one.
pub async fn is_replica_handshake(stream: &TcpStream) -> std::io::Result<bool> {
    let mut buf = [0u8; PREAMBLE.len()];
    loop {
        let n = stream.peek(&mut buf).await?;
        if n == 0 {
            return Ok(false);
        }
        if n >= buf.len() {
            return Ok(&buf == PREAMBLE);
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
}

/// Consumes the preamble bytes once `is_replica_handshake` has confirmed
/// they're present, so the connection is left positioned at the start of
/// the replicated command stream.
pub async fn consume_preamble(stream: &mut TcpStream) -> std::io::Result<()> {
    let mut buf = [0u8; PREAMBLE.len()];
    stream.read_exact(&mut buf).await?;
    Ok(())
}
