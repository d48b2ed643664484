//! Property tests for wire-level invariants: an encoded `Command` always
//! retokenizes and reparses back to itself, regardless of how the bytes
//! are chunked across the stream.

use bytes::{Bytes, BytesMut};
use proptest::prelude::*;
use sstash_codec::{encode_command, try_parse, Command, TokenCodec};
use std::collections::VecDeque;
use tokio_util::codec::Decoder;

fn short_bytes() -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 0..8).prop_map(Bytes::from)
}

fn opt_name() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-z]{1,8}")
}

fn commands() -> impl Strategy<Value = Command> {
    prop_oneof![
        (short_bytes(), opt_name()).prop_map(|(key, name)| Command::Get { key, name }),
        opt_name().prop_map(|name| Command::Info { name }),
        (short_bytes(), short_bytes(), opt_name())
            .prop_map(|(key, value, name)| Command::Set { key, value, name }),
        (short_bytes(), short_bytes(), 0u64..1_000_000, opt_name())
            .prop_map(|(key, value, ttl_ms, name)| Command::SetTtl { key, value, ttl_ms, name }),
        (short_bytes(), opt_name()).prop_map(|(key, name)| Command::Delete { key, name }),
        (short_bytes(), 0u64..1_000_000, opt_name())
            .prop_map(|(key, ttl_ms, name)| Command::UpdateTtl { key, ttl_ms, name }),
        ("[a-z]{1,8}", 1u64..1_000_000, any::<bool>())
            .prop_map(|(name, max_key_count, off_heap)| Command::Create { name, max_key_count, off_heap }),
        "[a-z]{1,8}".prop_map(|name| Command::Drop { name }),
    ]
}

fn retokenize(bytes: &[u8]) -> VecDeque<Bytes> {
    let mut codec = TokenCodec::new();
    let mut buf = BytesMut::from(bytes);
    let mut tokens = VecDeque::new();
    while let Some(tok) = codec.decode(&mut buf).unwrap() {
        tokens.push_back(tok);
    }
    tokens
}

proptest! {
    #[test]
    fn encode_then_parse_round_trips(cmd in commands()) {
        let encoded = encode_command(&cmd);
        let mut tokens = retokenize(&encoded);
        let reparsed = try_parse(&mut tokens).unwrap().unwrap();
        prop_assert_eq!(reparsed, cmd);
        prop_assert!(tokens.is_empty());
    }

    /// Feeding the encoded bytes through the token decoder split at an
    /// arbitrary offset must still yield exactly the tokens of the whole
    /// command — framing doesn't care where the split falls.
    #[test]
    fn framing_is_resumable_across_arbitrary_splits(cmd in commands(), split_at in 0usize..512) {
        let encoded = encode_command(&cmd);
        let split = split_at.min(encoded.len());
        let (first, second) = encoded.split_at(split);

        let mut codec = TokenCodec::new();
        let mut buf = BytesMut::from(first);
        let mut tokens = VecDeque::new();
        while let Some(tok) = codec.decode(&mut buf).unwrap() {
            tokens.push_back(tok);
        }
        buf.extend_from_slice(second);
        while let Some(tok) = codec.decode(&mut buf).unwrap() {
            tokens.push_back(tok);
        }

        let reparsed = try_parse(&mut tokens).unwrap().unwrap();
        prop_assert_eq!(reparsed, cmd);
    }
}
