use crate::command::{encode_command, Command};
use crate::error::ProtocolError;
use crate::reply::Reply;
use bytes::Bytes;
use sstash_stash::{StashError, StashManager};

/// Executes one already-parsed command against `manager`, enforcing the
/// read-only gate and turning every failure into an `ERROR` reply rather
/// than propagating it — a malformed or rejected command never tears down
/// the connection.
pub fn execute(manager: &StashManager, command: Command, read_only: bool) -> Reply {
    if read_only && command.is_write() {
        return error_reply(ProtocolError::ReadOnly.to_string());
    }

    let replicate = command.is_write().then(|| encode_command(&command));

    match command {
        Command::Get { key, name } => with_stash(manager, name.as_deref(), |stash| {
            match stash.get(&key, read_only) {
                Ok(Some(value)) => Reply::Value(value),
                Ok(None) => error_reply("key not found".to_string()),
                Err(e) => error_reply(e.to_string()),
            }
        }),
        Command::Info { name } => with_stash(manager, name.as_deref(), |stash| match stash.len() {
            Ok(len) => Reply::Value(Bytes::from(
                format!(
                    "name={} max_key_count={} off_heap={} key_count={}",
                    stash.name(),
                    stash.max_key_count(),
                    stash.off_heap(),
                    len
                )
                .into_bytes(),
            )),
            Err(e) => error_reply(e.to_string()),
        }),
        Command::Set { key, value, name } => with_stash(manager, name.as_deref(), |stash| {
            ok_or_error(stash.set(key, value, replicate))
        }),
        Command::SetTtl { key, value, ttl_ms, name } => with_stash(manager, name.as_deref(), |stash| {
            ok_or_error(stash.set_with_ttl(key, value, ttl_ms, replicate))
        }),
        Command::Delete { key, name } => with_stash(manager, name.as_deref(), |stash| {
            ok_or_error(stash.delete(&key, replicate))
        }),
        Command::UpdateTtl { key, ttl_ms, name } => with_stash(manager, name.as_deref(), |stash| {
            ok_or_error(stash.update_ttl(&key, ttl_ms, replicate))
        }),
        Command::Create { name, max_key_count, off_heap } => {
            let result = manager.create(&name, max_key_count, off_heap);
            if result.is_ok() {
                if let Some(bytes) = replicate {
                    manager.publish(&name, bytes);
                }
            }
            ok_or_error(result)
        }
        Command::Drop { name } => {
            let result = manager.drop(&name);
            if result.is_ok() {
                if let Some(bytes) = replicate {
                    manager.publish(&name, bytes);
                }
            }
            ok_or_error(result)
        }
    }
}

fn with_stash(
    manager: &StashManager,
    name: Option<&str>,
    f: impl FnOnce(&sstash_stash::Stash) -> Reply,
) -> Reply {
    match manager.get_or_default(name) {
        Ok(stash) => f(&stash),
        Err(e) => error_reply(e.to_string()),
    }
}

fn ok_or_error(result: Result<(), StashError>) -> Reply {
    match result {
        Ok(()) => Reply::Ok,
        Err(e) => error_reply(e.to_string()),
    }
}

fn error_reply(message: String) -> Reply {
    Reply::Error(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tempfile::tempdir;

    fn manager() -> StashManager {
        let dir = tempdir().unwrap();
        StashManager::new(&dir.keep(), None).unwrap()
    }

    #[test]
    fn set_then_get_roundtrips_through_dispatch() {
        let manager = manager();
        let mut tokens: VecDeque<Bytes> =
            [b"SET".as_slice(), b"foo", b"bar", b"0"].iter().map(|s| Bytes::copy_from_slice(s)).collect();
        let cmd = crate::command::try_parse(&mut tokens).unwrap().unwrap();
        assert_eq!(execute(&manager, cmd, false), Reply::Ok);

        let mut tokens: VecDeque<Bytes> =
            [b"GET".as_slice(), b"foo", b"0"].iter().map(|s| Bytes::copy_from_slice(s)).collect();
        let cmd = crate::command::try_parse(&mut tokens).unwrap().unwrap();
        assert_eq!(execute(&manager, cmd, false), Reply::Value(Bytes::from_static(b"bar")));
    }

    #[test]
    fn write_command_rejected_on_read_only_connection() {
        let manager = manager();
        let cmd = Command::Set {
            key: Bytes::from_static(b"foo"),
            value: Bytes::from_static(b"bar"),
            name: None,
        };
        assert_eq!(
            execute(&manager, cmd, true),
            Reply::Error(ProtocolError::ReadOnly.to_string())
        );
    }

    #[test]
    fn get_on_unknown_stash_errors_without_panicking() {
        let manager = manager();
        let cmd = Command::Get { key: Bytes::from_static(b"foo"), name: Some("ghost".to_string()) };
        assert_eq!(
            execute(&manager, cmd, false),
            Reply::Error(StashError::NotFound("ghost".to_string()).to_string())
        );
    }

    #[derive(Default)]
    struct RecordingFanout {
        published: std::sync::Mutex<Vec<(String, Bytes)>>,
    }

    impl sstash_stash::ReplicaFanout for RecordingFanout {
        fn publish(&self, stash_name: &str, encoded_command: Bytes) {
            self.published.lock().unwrap().push((stash_name.to_string(), encoded_command));
        }
    }

    #[test]
    fn create_and_drop_are_fanned_out_to_followers() {
        let dir = tempdir().unwrap();
        let fanout = std::sync::Arc::new(RecordingFanout::default());
        let manager =
            StashManager::new(&dir.keep(), Some(fanout.clone() as std::sync::Arc<dyn sstash_stash::ReplicaFanout>))
                .unwrap();

        let create = Command::Create { name: "widgets".to_string(), max_key_count: 10, off_heap: false };
        assert_eq!(execute(&manager, create, false), Reply::Ok);
        let drop = Command::Drop { name: "widgets".to_string() };
        assert_eq!(execute(&manager, drop, false), Reply::Ok);

        let published = fanout.published.lock().unwrap();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].0, "widgets");
        assert_eq!(published[1].0, "widgets");
    }

    #[test]
    fn failed_create_is_not_fanned_out() {
        let dir = tempdir().unwrap();
        let fanout = std::sync::Arc::new(RecordingFanout::default());
        let manager =
            StashManager::new(&dir.keep(), Some(fanout.clone() as std::sync::Arc<dyn sstash_stash::ReplicaFanout>))
                .unwrap();

        let create = Command::Create { name: sstash_stash::DEFAULT_STASH_NAME.to_string(), max_key_count: 10, off_heap: false };
        assert!(matches!(execute(&manager, create, false), Reply::Error(_)));
        assert!(fanout.published.lock().unwrap().is_empty());
    }
}
