use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use tinyflow_interfaces::MemoryLink;
use tinyflow_node::{NodeConfig, NodeError, ReceiverService, SenderService};
use tinyflow_protocol::receiver::Receiver;
use tinyflow_protocol::sender::Sender;

#[derive(Parser)]
#[command(name = "tinyflow-node", about = "BLETinyFlow loopback transfer demo")]
struct Cli {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the demo payload size in bytes
    #[arg(long)]
    payload_size: Option<u32>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(path) => match NodeConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load config from {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => NodeConfig::default(),
    };
    if let Some(size) = cli.payload_size {
        config.node.payload_size = size;
    }

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tinyflow_node::logging::init_json(&config.logging.level);
    } else {
        tinyflow_node::logging::init(&config.logging.level);
    }

    match run_demo(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("demo transfer failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run one full transfer over an in-memory loopback link.
async fn run_demo(config: NodeConfig) -> Result<(), NodeError> {
    let payload = demo_payload(config.node.payload_size as usize);

    tracing::info!(
        mtu = config.node.mtu,
        payload_size = payload.len(),
        chunks_per_request = config.node.chunks_per_request,
        "starting loopback transfer"
    );

    let link = MemoryLink::new(config.node.mtu);
    let receiver_service = ReceiverService::new(
        Receiver::new(config.receiver_config()),
        link.peripheral,
        link.peripheral_events,
    );
    let sender_service = SenderService::new(
        Sender::new(config.sender_config()),
        link.central,
        link.central_events,
    );

    let receiver_task = tokio::spawn(receiver_service.run());

    let stats = sender_service.transfer(payload.clone()).await?;
    tracing::info!(
        bytes = stats.bytes,
        chunks = stats.chunks,
        elapsed = ?stats.elapsed,
        throughput_bps = stats.throughput_bps() as u64,
        "sender completed"
    );

    let mut delivered = receiver_task
        .await
        .map_err(|e| NodeError::Config(format!("receiver task panicked: {e}")))??
        .ok_or(NodeError::LinkClosed)?;

    if delivered.buffer.as_slice() != payload.as_slice() {
        tracing::error!("delivered payload differs from the source");
        return Err(NodeError::LinkClosed);
    }
    tracing::info!(
        bytes = delivered.size,
        jpeg_magic = delivered.jpeg_magic,
        "payload verified"
    );

    delivered.buffer.release();
    Ok(())
}

/// Deterministic demo payload with a JPEG SOI marker up front, so the
/// receiver's advisory magic check reports true.
fn demo_payload(len: usize) -> Vec<u8> {
    let mut payload: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
    if payload.len() >= 2 {
        payload[0] = 0xFF;
        payload[1] = 0xD8;
    }
    payload
}
