use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Maximum decimal digits accepted for a length prefix, bounding how much
/// garbage input can make the decoder buffer before giving up. Generous
/// relative to `MAX_VALUE_LEN`.
const MAX_LENGTH_DIGITS: usize = 12;

/// Frames a byte stream into tokens of the form `<decimal_length>\r\n<bytes>`.
///
/// This is the one primitive every higher-level piece of the wire protocol
/// builds on: requests are sequences of tokens, and each of the three reply
/// shapes is one or two tokens. A partial trailing token is left buffered
/// across calls, so a connection fed one byte at a time still decodes
/// correctly, just slowly.
#[derive(Default)]
pub struct TokenCodec {
    /// Length of the token currently being assembled, once the digits and
    /// `\r\n` have been parsed out of the buffer.
    pending_len: Option<usize>,
}

impl TokenCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for TokenCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, io::Error> {
        let len = match self.pending_len {
            Some(len) => len,
            None => {
                let Some(crlf) = find_crlf(src, MAX_LENGTH_DIGITS) else {
                    if src.len() > MAX_LENGTH_DIGITS + 2 {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "length prefix too long",
                        ));
                    }
                    return Ok(None);
                };
                let digits = &src[..crlf];
                let text = std::str::from_utf8(digits)
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "non-utf8 length prefix"))?;
                let len: usize = text
                    .parse()
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "non-decimal length prefix"))?;
                src.advance(crlf + 2);
                self.pending_len = Some(len);
                len
            }
        };

        if src.len() < len {
            return Ok(None);
        }

        let token = src.split_to(len).freeze();
        self.pending_len = None;
        Ok(Some(token))
    }
}

/// Finds `\r\n` within the first `limit` bytes of `src`, returning the
/// index of the `\r`.
fn find_crlf(src: &BytesMut, limit: usize) -> Option<usize> {
    let scan_len = src.len().min(limit + 2);
    src[..scan_len]
        .windows(2)
        .position(|w| w == b"\r\n")
}

impl Encoder<Bytes> for TokenCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), io::Error> {
        let header = item.len().to_string();
        dst.reserve(header.len() + 2 + item.len());
        dst.put_slice(header.as_bytes());
        dst.put_slice(b"\r\n");
        dst.put_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_token_delivered_whole() {
        let mut codec = TokenCodec::new();
        let mut buf = BytesMut::from(&b"3\r\nfoo"[..]);
        let token = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&token[..], b"foo");
        assert!(buf.is_empty());
    }

    #[test]
    fn decodes_token_delivered_one_byte_at_a_time() {
        let mut codec = TokenCodec::new();
        let mut buf = BytesMut::new();
        let mut result = None;
        for &byte in b"3\r\nfoo" {
            buf.put_u8(byte);
            if let Some(token) = codec.decode(&mut buf).unwrap() {
                result = Some(token);
            }
        }
        assert_eq!(&result.unwrap()[..], b"foo");
    }

    #[test]
    fn leaves_partial_trailing_token_buffered() {
        let mut codec = TokenCodec::new();
        let mut buf = BytesMut::from(&b"3\r\nfo"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.put_u8(b'o');
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"foo");
    }

    #[test]
    fn decodes_consecutive_tokens() {
        let mut codec = TokenCodec::new();
        let mut buf = BytesMut::from(&b"3\r\nfoo3\r\nbar"[..]);
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"foo");
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"bar");
    }

    #[test]
    fn round_trips_through_encoder() {
        let mut codec = TokenCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Bytes::from_static(b"hello"), &mut buf).unwrap();
        assert_eq!(&buf[..], b"5\r\nhello");
        let token = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&token[..], b"hello");
    }

    #[test]
    fn rejects_non_decimal_length_prefix() {
        let mut codec = TokenCodec::new();
        let mut buf = BytesMut::from(&b"xx\r\nfoo"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }
}
