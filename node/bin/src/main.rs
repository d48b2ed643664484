mod cli;
mod connection;
mod shutdown;

use clap::Parser;
use cli::Args;
use sstash_replication::LeaderFanout;
use sstash_stash::{ReplicaFanout, StashManager};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    sstash_observability::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    let master_addr = match args.master_addr() {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let leader_fanout: Option<Arc<LeaderFanout>> =
        master_addr.is_none().then(|| Arc::new(LeaderFanout::new()));
    let manager_fanout: Option<Arc<dyn ReplicaFanout>> =
        leader_fanout.clone().map(|f| f as Arc<dyn ReplicaFanout>);

    let manager = match StashManager::new(&args.data_dir, manager_fanout) {
        Ok(manager) => Arc::new(manager),
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize stash manager");
            std::process::exit(2);
        }
    };
    if let Err(e) = sstash_snapshot::restore_all(&manager, &args.data_dir) {
        tracing::warn!(error = %e, "snapshot restore encountered an error");
    }

    let primary_listener = match TcpListener::bind(("0.0.0.0", args.primary_port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, port = args.primary_port, "failed to bind primary port");
            std::process::exit(2);
        }
    };
    let read_only_listener = match TcpListener::bind(("0.0.0.0", args.read_only_port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, port = args.read_only_port, "failed to bind read-only port");
            std::process::exit(2);
        }
    };

    let (shutdown_tx, _) = watch::channel(false);
    tokio::spawn({
        let shutdown_tx = shutdown_tx.clone();
        async move {
            shutdown::signalled().await;
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    // A follower has no writes of its own to accept: both its ports serve
    // reads only, and its write stream comes solely from the leader.
    let primary_read_only = master_addr.is_some();
    tokio::spawn(accept_loop(
        primary_listener,
        manager.clone(),
        primary_read_only,
        leader_fanout.clone(),
        shutdown_tx.subscribe(),
    ));
    tokio::spawn(accept_loop(
        read_only_listener,
        manager.clone(),
        true,
        None,
        shutdown_tx.subscribe(),
    ));

    if let Some(addr) = master_addr {
        let manager = manager.clone();
        tokio::spawn(async move { sstash_replication::run_follower(addr, manager).await });
    }

    tokio::spawn(sstash_snapshot::run_scheduler(
        manager.clone(),
        args.data_dir.clone(),
        sstash_snapshot::DEFAULT_INTERVAL,
        wait_for_shutdown(shutdown_tx.subscribe()),
    ));

    tokio::spawn(run_ttl_sweep(manager.clone(), shutdown_tx.subscribe()));

    wait_for_shutdown(shutdown_tx.subscribe()).await;

    tracing::info!("flushing snapshots before exit");
    for stash in manager.iter_stashes() {
        if let Err(e) = sstash_snapshot::write_if_dirty(&stash, &args.data_dir) {
            tracing::warn!(stash = stash.name(), error = %e, "final snapshot flush failed");
        }
    }
    manager.close_all();
    std::process::exit(0);
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    while rx.changed().await.is_ok() {
        if *rx.borrow() {
            return;
        }
    }
}

/// Active TTL expiry: independent of the lazy expiry `Stash::get` performs
/// on access, this sweeps every stash on a fixed tick so expired keys that
/// are never read again still get removed.
const TTL_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);

async fn run_ttl_sweep(manager: Arc<StashManager>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(TTL_SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for stash in manager.iter_stashes() {
                    if let Err(e) = stash.expire_due() {
                        tracing::warn!(stash = stash.name(), error = %e, "ttl sweep failed");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    manager: Arc<StashManager>,
    read_only: bool,
    leader_fanout: Option<Arc<LeaderFanout>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let manager = manager.clone();
                let leader_fanout = leader_fanout.clone();
                tokio::spawn(async move {
                    handle_connection(stream, peer, manager, read_only, leader_fanout).await;
                });
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    manager: Arc<StashManager>,
    read_only: bool,
    leader_fanout: Option<Arc<LeaderFanout>>,
) {
    if let Some(fanout) = &leader_fanout {
        match sstash_replication::is_replica_handshake(&stream).await {
            Ok(true) => {
                if let Err(e) = sstash_replication::consume_preamble(&mut stream).await {
                    tracing::warn!(%peer, error = %e, "failed to consume replica preamble");
                    return;
                }
                let rx = fanout.subscribe();
                let (_read_half, write_half) = stream.into_split();
                tracing::info!(%peer, "replica connected");
                sstash_replication::run_replica_sink(write_half, rx).await;
                tracing::info!(%peer, "replica disconnected");
                return;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::debug!(%peer, error = %e, "replica handshake peek failed");
                return;
            }
        }
    }
    connection::serve(stream, peer, manager, read_only).await;
}
