use crate::error::ProtocolError;
use crate::frame::TokenCodec;
use bytes::{Bytes, BytesMut};
use std::collections::{HashMap, VecDeque};
use tokio_util::codec::Encoder;

/// Upper bound on `num_opt_args`, so a hostile or buggy client can't make
/// the dispatcher buffer an unbounded number of tokens waiting for a
/// command to complete.
pub const MAX_OPT_ARGS: usize = 16;

/// The optional-argument key this protocol actually defines: `NAME=name`
/// overrides which stash a command targets, defaulting to the manager's
/// default stash when absent.
pub const OPT_NAME: &str = "NAME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get { key: Bytes, name: Option<String> },
    Info { name: Option<String> },
    Set { key: Bytes, value: Bytes, name: Option<String> },
    SetTtl { key: Bytes, value: Bytes, ttl_ms: u64, name: Option<String> },
    Delete { key: Bytes, name: Option<String> },
    UpdateTtl { key: Bytes, ttl_ms: u64, name: Option<String> },
    Create { name: String, max_key_count: u64, off_heap: bool },
    Drop { name: String },
}

impl Command {
    /// Write-class commands mutate a stash and must be rejected on a
    /// read-only connection and forwarded to followers on a leader.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Command::Set { .. }
                | Command::SetTtl { .. }
                | Command::Delete { .. }
                | Command::UpdateTtl { .. }
                | Command::Create { .. }
                | Command::Drop { .. }
        )
    }

    pub fn stash_name(&self) -> Option<&str> {
        match self {
            Command::Get { name, .. }
            | Command::Info { name }
            | Command::Set { name, .. }
            | Command::SetTtl { name, .. }
            | Command::Delete { name, .. }
            | Command::UpdateTtl { name, .. } => name.as_deref(),
            Command::Create { name, .. } | Command::Drop { name } => Some(name),
        }
    }

    /// Re-encodes this command into its wire token sequence, for forwarding
    /// to followers. The optional `NAME` argument round-trips verbatim so a
    /// follower routes the mutation to the same stash the leader did.
    fn to_tokens(&self) -> Vec<Bytes> {
        fn opt_tokens(name: &Option<String>) -> Vec<Bytes> {
            match name {
                Some(n) => vec![
                    Bytes::from_static(b"1"),
                    Bytes::from(OPT_NAME.as_bytes().to_vec()),
                    Bytes::from(n.clone().into_bytes()),
                ],
                None => vec![Bytes::from_static(b"0")],
            }
        }

        match self {
            Command::Get { key, name } => {
                let mut tokens = vec![Bytes::from_static(b"GET"), key.clone()];
                tokens.extend(opt_tokens(name));
                tokens
            }
            Command::Info { name } => {
                let mut tokens = vec![Bytes::from_static(b"INFO")];
                tokens.extend(opt_tokens(name));
                tokens
            }
            Command::Set { key, value, name } => {
                let mut tokens = vec![Bytes::from_static(b"SET"), key.clone(), value.clone()];
                tokens.extend(opt_tokens(name));
                tokens
            }
            Command::SetTtl { key, value, ttl_ms, name } => {
                let mut tokens = vec![
                    Bytes::from_static(b"SETTTL"),
                    key.clone(),
                    value.clone(),
                    Bytes::from(ttl_ms.to_string().into_bytes()),
                ];
                tokens.extend(opt_tokens(name));
                tokens
            }
            Command::Delete { key, name } => {
                let mut tokens = vec![Bytes::from_static(b"DELETE"), key.clone()];
                tokens.extend(opt_tokens(name));
                tokens
            }
            Command::UpdateTtl { key, ttl_ms, name } => {
                let mut tokens = vec![
                    Bytes::from_static(b"UPDATETTL"),
                    key.clone(),
                    Bytes::from(ttl_ms.to_string().into_bytes()),
                ];
                tokens.extend(opt_tokens(name));
                tokens
            }
            Command::Create { name, max_key_count, off_heap } => vec![
                Bytes::from_static(b"CREATE"),
                Bytes::from(name.clone().into_bytes()),
                Bytes::from(max_key_count.to_string().into_bytes()),
                Bytes::from_static(if *off_heap { b"1" } else { b"0" }),
                Bytes::from_static(b"0"),
            ],
            Command::Drop { name } => vec![
                Bytes::from_static(b"DROP"),
                Bytes::from(name.clone().into_bytes()),
                Bytes::from_static(b"0"),
            ],
        }
    }
}

/// Encodes `cmd` as the raw bytes a peer's `TokenCodec` would decode back
/// into the same tokens: used to fan a mutating command out to followers.
pub fn encode_command(cmd: &Command) -> Bytes {
    let mut codec = TokenCodec::new();
    let mut buf = BytesMut::new();
    for token in cmd.to_tokens() {
        codec.encode(token, &mut buf).expect("token encoding is infallible");
    }
    buf.freeze()
}

fn required_positional_count(verb: &str) -> Result<usize, ProtocolError> {
    match verb {
        "GET" | "DELETE" => Ok(1),
        "INFO" => Ok(0),
        "SET" => Ok(2),
        "UPDATETTL" => Ok(2),
        "SETTTL" => Ok(3),
        "CREATE" => Ok(3),
        "DROP" => Ok(1),
        other => Err(ProtocolError::UnknownVerb(other.to_string())),
    }
}

fn parse_decimal(token: &[u8]) -> Result<u64, ProtocolError> {
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(ProtocolError::MissingArgument)
}

fn parse_name(bytes: &[u8]) -> Result<String, ProtocolError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::MissingArgument)
}

/// Attempts to parse one command from the front of `tokens`. Resumable: if
/// the queue doesn't yet contain a full command, `tokens` is left
/// untouched and `Ok(None)` is returned so the caller waits for more data.
pub fn try_parse(tokens: &mut VecDeque<Bytes>) -> Result<Option<Command>, ProtocolError> {
    let Some(verb_token) = tokens.front() else {
        return Ok(None);
    };
    let verb = String::from_utf8_lossy(verb_token).to_ascii_uppercase();
    let required = required_positional_count(&verb)?;

    let min_needed = 1 + required + 1;
    if tokens.len() < min_needed {
        return Ok(None);
    }

    let num_opt_args = parse_decimal(&tokens[1 + required]).map_err(|_| ProtocolError::InvalidOptArgCount)? as usize;
    if num_opt_args > MAX_OPT_ARGS {
        return Err(ProtocolError::InvalidOptArgCount);
    }

    let total_needed = min_needed + 2 * num_opt_args;
    if tokens.len() < total_needed {
        return Ok(None);
    }

    let mut drained: VecDeque<Bytes> = tokens.drain(0..total_needed).collect();
    drained.pop_front(); // verb
    let positional: Vec<Bytes> = (0..required).map(|_| drained.pop_front().unwrap()).collect();
    drained.pop_front(); // num_opt_args

    let mut optional = HashMap::new();
    for _ in 0..num_opt_args {
        let key = drained.pop_front().unwrap();
        let value = drained.pop_front().unwrap();
        let key = parse_name(&key).map_err(|_| ProtocolError::MalformedOptionalPair)?;
        optional.insert(key, value);
    }
    let name = optional
        .remove(OPT_NAME)
        .map(|v| parse_name(&v))
        .transpose()?;

    let command = match verb.as_str() {
        "GET" => Command::Get { key: positional[0].clone(), name },
        "INFO" => Command::Info { name },
        "SET" => Command::Set {
            key: positional[0].clone(),
            value: positional[1].clone(),
            name,
        },
        "SETTTL" => Command::SetTtl {
            key: positional[0].clone(),
            value: positional[1].clone(),
            ttl_ms: parse_decimal(&positional[2])?,
            name,
        },
        "DELETE" => Command::Delete { key: positional[0].clone(), name },
        "UPDATETTL" => Command::UpdateTtl {
            key: positional[0].clone(),
            ttl_ms: parse_decimal(&positional[1])?,
            name,
        },
        "CREATE" => Command::Create {
            name: parse_name(&positional[0])?,
            max_key_count: parse_decimal(&positional[1])?,
            off_heap: match &positional[2][..] {
                b"0" => false,
                b"1" => true,
                _ => return Err(ProtocolError::MissingArgument),
            },
        },
        "DROP" => Command::Drop { name: parse_name(&positional[0])? },
        other => return Err(ProtocolError::UnknownVerb(other.to_string())),
    };

    Ok(Some(command))
}
