//! Thin line-oriented client: reads commands from stdin in a simple
//! space-separated surface syntax, encodes them to the wire protocol, and
//! prints the decoded reply. Contains no business logic beyond that
//! encoding/decoding.

use anyhow::{anyhow, bail, Context, Result};
use bytes::Bytes;
use clap::Parser;
use sstash_codec::{encode_command, Command, TokenCodec};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, FramedRead};

#[derive(Parser, Debug)]
#[command(name = "sstash-cli")]
struct Args {
    ip: String,
    port: u16,
}

/// Surface syntax is `<verb> <args...> [name]`: one optional trailing
/// argument beyond what the verb strictly requires names the target stash.
fn parse_line(line: &str) -> Result<Option<Command>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((verb, rest)) = tokens.split_first() else {
        return Ok(None);
    };

    let bytes = |s: &str| Bytes::from(s.as_bytes().to_vec());
    let ttl = |s: &str| s.parse::<u64>().map_err(|_| anyhow!("expected an integer TTL, got {s:?}"));
    let name_at = |rest: &[&str], min: usize| -> Option<String> {
        if rest.len() > min { Some(rest[min].to_string()) } else { None }
    };

    let command = match verb.to_ascii_uppercase().as_str() {
        "GET" => {
            let [key, ..] = rest else { bail!("usage: get <key> [name]") };
            Command::Get { key: bytes(key), name: name_at(rest, 1) }
        }
        "INFO" => Command::Info { name: rest.first().map(|s| s.to_string()) },
        "SET" => {
            let [key, value, ..] = rest else { bail!("usage: set <key> <value> [name]") };
            Command::Set { key: bytes(key), value: bytes(value), name: name_at(rest, 2) }
        }
        "SETTTL" => {
            let [key, value, ttl_ms, ..] = rest else { bail!("usage: setttl <key> <value> <ttl_ms> [name]") };
            Command::SetTtl { key: bytes(key), value: bytes(value), ttl_ms: ttl(ttl_ms)?, name: name_at(rest, 3) }
        }
        "DELETE" => {
            let [key, ..] = rest else { bail!("usage: delete <key> [name]") };
            Command::Delete { key: bytes(key), name: name_at(rest, 1) }
        }
        "UPDATETTL" => {
            let [key, ttl_ms, ..] = rest else { bail!("usage: updatettl <key> <ttl_ms> [name]") };
            Command::UpdateTtl { key: bytes(key), ttl_ms: ttl(ttl_ms)?, name: name_at(rest, 2) }
        }
        "CREATE" => {
            let [name, max_key_count, off_heap] = rest else {
                bail!("usage: create <name> <max_key_count> <off_heap: 0|1>")
            };
            Command::Create {
                name: name.to_string(),
                max_key_count: max_key_count.parse().context("max_key_count must be an integer")?,
                off_heap: match *off_heap {
                    "0" => false,
                    "1" => true,
                    other => bail!("off_heap must be 0 or 1, got {other:?}"),
                },
            }
        }
        "DROP" => {
            let [name] = rest else { bail!("usage: drop <name>") };
            Command::Drop { name: name.to_string() }
        }
        other => bail!("unknown command {other:?}"),
    };
    Ok(Some(command))
}

/// Reads exactly one reply off `frames`: `OK` is a bare verb token, `VALUE`
/// and `ERROR` are a verb token followed by one payload token.
async fn read_reply(frames: &mut FramedRead<tokio::net::tcp::OwnedReadHalf, TokenCodec>) -> Result<String> {
    use futures::StreamExt;
    let verb = frames
        .next()
        .await
        .ok_or_else(|| anyhow!("server closed the connection"))??;
    match &verb[..] {
        b"OK" => Ok("OK".to_string()),
        b"VALUE" | b"ERROR" => {
            let payload = frames
                .next()
                .await
                .ok_or_else(|| anyhow!("server closed the connection mid-reply"))??;
            Ok(format!("{} {}", String::from_utf8_lossy(&verb), String::from_utf8_lossy(&payload)))
        }
        other => bail!("malformed reply from server: {:?}", String::from_utf8_lossy(other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let stream = match TcpStream::connect((args.ip.as_str(), args.port)).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("failed to connect to {}:{}: {e}", args.ip, args.port);
            std::process::exit(2);
        }
    };
    let (read_half, mut write_half) = stream.into_split();
    let mut frames = FramedRead::new(read_half, TokenCodec::new());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("ERROR {e}");
                continue;
            }
        };
        write_half.write_all(&encode_command(&command)).await?;
        match read_reply(&mut frames).await {
            Ok(reply) => println!("{reply}"),
            Err(e) => {
                eprintln!("{e}");
                return Ok(());
            }
        }
    }
    Ok(())
}
