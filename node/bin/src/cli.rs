use clap::Parser;
use std::path::PathBuf;

/// In-memory key-value store node: binds a read-write primary port and a
/// read-only port, optionally following a leader.
#[derive(Parser, Debug)]
#[command(name = "sstash")]
pub struct Args {
    /// Port accepting both reads and writes (and, on a leader, replica
    /// connections identified by their handshake preamble).
    pub primary_port: u16,

    /// Port accepting reads only.
    pub read_only_port: u16,

    /// Address of the leader to follow. Omit to run as a leader.
    pub master_ip: Option<String>,

    /// Port of the leader to follow. Required iff `master_ip` is given.
    pub master_port: Option<u16>,

    /// Directory for snapshot files and off-heap stash arenas.
    #[arg(long, default_value = ".")]
    pub data_dir: PathBuf,
}

impl Args {
    /// `master_ip`/`master_port` must be given together or not at all.
    pub fn master_addr(&self) -> Result<Option<std::net::SocketAddr>, String> {
        match (&self.master_ip, self.master_port) {
            (None, None) => Ok(None),
            (Some(ip), Some(port)) => format!("{ip}:{port}")
                .parse()
                .map(Some)
                .map_err(|e| format!("invalid master address {ip}:{port}: {e}")),
            _ => Err("master_ip and master_port must be given together".to_string()),
        }
    }
}
