//! Property tests for the invariants `Stash` is supposed to hold under
//! arbitrary operation sequences: the capacity cap never exceeded, and a
//! TTL'd key present before expiry, absent after.

use bytes::Bytes;
use proptest::prelude::*;
use sstash_stash::Stash;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Op {
    Set(u8),
    Delete(u8),
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            (0u8..8).prop_map(Op::Set),
            (0u8..8).prop_map(Op::Delete),
        ],
        0..64,
    )
}

proptest! {
    #[test]
    fn key_count_never_exceeds_max(ops in ops()) {
        const MAX: u64 = 4;
        let dir = tempfile::tempdir().unwrap();
        let stash = Stash::new("t".to_string(), MAX, false, None, &dir.keep()).unwrap();

        for op in ops {
            match op {
                Op::Set(k) => {
                    let key = Bytes::from(vec![k]);
                    let _ = stash.set(key, Bytes::from_static(b"v"), None);
                }
                Op::Delete(k) => {
                    let key = Bytes::from(vec![k]);
                    let _ = stash.delete(&key, None);
                }
            }
            prop_assert!(stash.len().unwrap() as u64 <= MAX);
        }
    }

    #[test]
    fn ttl_key_present_then_absent_after_expiry(ttl_ms in 1u64..20) {
        let dir = tempfile::tempdir().unwrap();
        let stash = Stash::new("t".to_string(), 100, false, None, &dir.keep()).unwrap();
        let key = Bytes::from_static(b"k");

        stash.set_with_ttl(key.clone(), Bytes::from_static(b"v"), ttl_ms, None).unwrap();
        prop_assert_eq!(stash.get(&key, true).unwrap(), Some(Bytes::from_static(b"v")));

        std::thread::sleep(Duration::from_millis(ttl_ms + 20));
        prop_assert_eq!(stash.get(&key, true).unwrap(), None);
    }
}
