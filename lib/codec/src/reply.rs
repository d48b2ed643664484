use crate::frame::TokenCodec;
use bytes::{Bytes, BytesMut};
use tokio_util::codec::Encoder;

/// The three reply shapes a command ever produces. `Value` carries the
/// payload for a successful `GET`/`INFO`; `Error` carries a human-readable
/// message, never a structured error code — clients are expected to match
/// on text for the handful of known failure strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Value(Bytes),
    Error(String),
}

impl Reply {
    /// Encodes this reply as the token(s) a peer's `TokenCodec` decodes it
    /// back out of: `OK` is a single token, `VALUE`/`ERROR` are a verb
    /// token followed by the payload token.
    pub fn encode(&self) -> Bytes {
        let mut codec = TokenCodec::new();
        let mut buf = BytesMut::new();
        match self {
            Reply::Ok => {
                codec.encode(Bytes::from_static(b"OK"), &mut buf).expect("infallible");
            }
            Reply::Value(payload) => {
                codec.encode(Bytes::from_static(b"VALUE"), &mut buf).expect("infallible");
                codec.encode(payload.clone(), &mut buf).expect("infallible");
            }
            Reply::Error(message) => {
                codec.encode(Bytes::from_static(b"ERROR"), &mut buf).expect("infallible");
                codec
                    .encode(Bytes::from(message.clone().into_bytes()), &mut buf)
                    .expect("infallible");
            }
        }
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::TokenCodec as DecoderCodec;
    use std::collections::VecDeque;
    use tokio_util::codec::Decoder;

    fn retokenize(bytes: Bytes) -> VecDeque<Bytes> {
        let mut codec = DecoderCodec::new();
        let mut buf = BytesMut::from(&bytes[..]);
        let mut tokens = VecDeque::new();
        while let Some(tok) = codec.decode(&mut buf).unwrap() {
            tokens.push_back(tok);
        }
        tokens
    }

    #[test]
    fn ok_encodes_as_single_token() {
        let tokens = retokenize(Reply::Ok.encode());
        assert_eq!(tokens, VecDeque::from([Bytes::from_static(b"OK")]));
    }

    #[test]
    fn value_encodes_as_verb_then_payload() {
        let tokens = retokenize(Reply::Value(Bytes::from_static(b"bar")).encode());
        assert_eq!(
            tokens,
            VecDeque::from([Bytes::from_static(b"VALUE"), Bytes::from_static(b"bar")])
        );
    }

    #[test]
    fn error_encodes_as_verb_then_message() {
        let tokens = retokenize(Reply::Error("stash closed".to_string()).encode());
        assert_eq!(
            tokens,
            VecDeque::from([Bytes::from_static(b"ERROR"), Bytes::from_static(b"stash closed")])
        );
    }
}
