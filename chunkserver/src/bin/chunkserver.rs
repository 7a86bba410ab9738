use clap::Parser;
use dfs_chunkserver::chunkserver::MyChunkServer;
use dfs_chunkserver::config::{ChunkServerConfig, FileConfig};
use dfs_chunkserver::dfs::chunk_server_service_server::ChunkServerServiceServer;
use dfs_chunkserver::registration::register_with_coordinator;
use std::path::PathBuf;
use tonic::transport::Server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file. Flags given on the command line take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Identifier to register under
    #[arg(long)]
    id: Option<String>,

    /// Coordinator address [default: 127.0.0.1:50051]
    #[arg(short, long)]
    coordinator_addr: Option<String>,

    /// Host to bind the assigned port on [default: 127.0.0.1]
    #[arg(long)]
    host: Option<String>,

    /// [default: /tmp/chunkserver_data]
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Write StoreFile names as given, without sanitization. Testing only.
    #[arg(long)]
    unsandboxed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dfs_common::telemetry::init_tracing("chunkserver=info,dfs_chunkserver=info");

    let args = Args::parse();
    let mut config = ChunkServerConfig::default();
    if let Some(path) = &args.config {
        config.apply_file(FileConfig::from_file(path)?);
    }
    if let Some(id) = args.id {
        config.id = id;
    }
    if let Some(addr) = args.coordinator_addr {
        config.coordinator_addr = addr;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if args.unsandboxed {
        config.sandboxed = false;
    }
    anyhow::ensure!(!config.id.is_empty(), "--id is required");
    let bind_ip = config.bind_ip()?;

    if !config.sandboxed {
        tracing::warn!("StoreFile paths are not sanitized; callers can write anywhere");
    }

    let chunk_server = MyChunkServer::new(
        config.id.clone(),
        config.storage_dir.clone(),
        config.sandboxed,
    )?;

    let port = register_with_coordinator(
        &config.coordinator_url(),
        &config.id,
        config.register_retry_interval,
        config.register_attempts,
    )
    .await?;

    let addr = ChunkServerConfig::bind_addr(bind_ip, port);

    tracing::info!("ChunkServer {} listening on {}", config.id, addr);

    Server::builder()
        .add_service(
            ChunkServerServiceServer::new(chunk_server)
                .max_decoding_message_size(config.max_message_size),
        )
        .serve_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
