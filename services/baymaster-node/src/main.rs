use anyhow::{anyhow, Context, Result};
use baymaster_base::{BaseCoordinator, StaticInventory};
use baymaster_core::{logging, Config, MemorySnapshotStore, SnapshotStore, SqliteSnapshotStore, SystemClock};
use baymaster_protocol::Mailbox;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

const NODE_PROTOCOL_VERSION: u32 = 1;
const NODE_RUNTIME_VERSION: u32 = 1;
const MAX_DATAGRAM_BYTES: usize = 8 * 1024;

#[derive(Debug, Serialize)]
struct NodeVersionHandshake {
    version: &'static str,
    runtime_version: u32,
    protocol_version: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--version-json") {
        let handshake = NodeVersionHandshake {
            version: env!("CARGO_PKG_VERSION"),
            runtime_version: NODE_RUNTIME_VERSION,
            protocol_version: NODE_PROTOCOL_VERSION,
        };
        println!("{}", serde_json::to_string(&handshake)?);
        return Ok(());
    }

    let config_path = parse_config_path(&args)?;
    let config = Config::from_file(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    if config.logging.json {
        logging::init_json_with_level(&config.logging.level);
    } else {
        logging::init_with_level(&config.logging.level);
    }

    let store = open_store(&config)?;
    let inventory = StaticInventory::from_layouts(&config.bays);
    let mut base = BaseCoordinator::new(&config, Arc::new(SystemClock), Mailbox::new(), &inventory, store);
    match base.restore() {
        Ok(true) => info!("Resumed from snapshot"),
        Ok(false) => debug!("No snapshot to resume from"),
        Err(e) => warn!(error = %e, "Snapshot unreadable, starting fresh"),
    }

    let socket = UdpSocket::bind(&config.network.bind_address)
        .await
        .with_context(|| format!("binding {}", config.network.bind_address))?;
    socket.set_broadcast(true)?;
    let broadcast: SocketAddr = config
        .network
        .broadcast_address
        .parse()
        .with_context(|| format!("parsing broadcast address {}", config.network.broadcast_address))?;

    info!(
        base = %base.name(),
        bind = %config.network.bind_address,
        broadcast = %broadcast,
        bays = base.bays().len(),
        "baymaster-node started"
    );

    serve(
        &mut base,
        &socket,
        broadcast,
        config.network.tick_interval_ms,
        tokio::signal::ctrl_c(),
    )
    .await;
    Ok(())
}

/// Run base cycles on a fixed interval, pumping datagrams in and broadcasts
/// out, until `shutdown` resolves.
async fn serve<F>(
    base: &mut BaseCoordinator<Mailbox>,
    socket: &UdpSocket,
    broadcast: SocketAddr,
    tick_interval_ms: u64,
    shutdown: F,
) where
    F: Future<Output = std::io::Result<()>>,
{
    let mut ticker = interval(Duration::from_millis(tick_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut buf = vec![0u8; MAX_DATAGRAM_BYTES];
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = base.tick();
                if report.assignment.is_some() || !report.expired.is_empty() || !report.rejected.is_empty() {
                    debug!(?report, "Cycle complete");
                }
                for frame in base.transport_mut().take_outbound() {
                    if let Err(e) = socket.send_to(frame.as_bytes(), broadcast).await {
                        warn!(error = %e, "Broadcast failed");
                    }
                }
            }
            received = socket.recv_from(&mut buf) => {
                match received {
                    Ok((len, peer)) => match std::str::from_utf8(&buf[..len]) {
                        Ok(frame) => base.transport_mut().push_inbound(frame),
                        Err(_) => debug!(%peer, "Dropping non-UTF-8 datagram"),
                    },
                    Err(e) => warn!(error = %e, "Receive failed"),
                }
            }
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    warn!(error = %e, "Signal handler failed");
                }
                info!("Shutting down");
                break;
            }
        }
    }
}

fn open_store(config: &Config) -> Result<Box<dyn SnapshotStore>> {
    match &config.base.snapshot_path {
        Some(path) => {
            let store = SqliteSnapshotStore::open(path).with_context(|| format!("opening snapshot store {}", path))?;
            Ok(Box::new(store))
        }
        None => Ok(Box::new(MemorySnapshotStore::new())),
    }
}

fn parse_config_path(args: &[String]) -> Result<PathBuf> {
    let mut args_iter = args.iter();
    while let Some(arg) = args_iter.next() {
        if arg == "--config" {
            if let Some(path) = args_iter.next() {
                return Ok(PathBuf::from(path));
            }
            return Err(anyhow!("--config was provided without a path"));
        }
    }

    Err(anyhow!("missing required --config <path> argument"))
}
