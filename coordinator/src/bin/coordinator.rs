use anyhow::Context;
use clap::Parser;
use dfs_coordinator::config::{CoordinatorConfig, FileConfig};
use dfs_coordinator::coordinator::Coordinator;
use dfs_coordinator::dfs::coordinator_service_server::CoordinatorServiceServer;
use dfs_coordinator::liveness::LivenessMonitor;
use dfs_coordinator::push::FilePusher;
use dfs_coordinator::registry::{Registry, ReregistrationPolicy};
use dfs_coordinator::remote::GrpcChunkServerRpc;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::Server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file. Flags given on the command line take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address [default: 127.0.0.1:50051]
    #[arg(short, long)]
    addr: Option<SocketAddr>,

    /// First port handed to a registering chunk server [default: 50052]
    #[arg(long)]
    chunkserver_base_port: Option<u16>,

    /// Host the chunk servers listen on [default: 127.0.0.1]
    #[arg(long)]
    chunkserver_host: Option<String>,

    /// Liveness probe period [default: 5000]
    #[arg(long)]
    probe_interval_ms: Option<u64>,

    /// A probe without an answer after this long evicts the node [default: 2000]
    #[arg(long)]
    probe_timeout_ms: Option<u64>,

    /// Re-registration of a known id [default: mint-new]
    #[arg(long, value_enum)]
    reregistration: Option<ReregistrationPolicy>,

    /// Directory files are pushed from [default: .]
    #[arg(long)]
    source_dir: Option<PathBuf>,

    /// Push a local file once chunk servers had time to register: <id>=<file>
    #[arg(long = "push", value_parser = parse_push)]
    pushes: Vec<(String, String)>,

    #[arg(long, default_value_t = 10_000)]
    push_delay_ms: u64,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(CoordinatorConfig, Vec<(String, String)>, Duration)> {
        let mut config = CoordinatorConfig::default();
        if let Some(path) = &self.config {
            config.apply_file(FileConfig::from_file(path)?);
        }

        if let Some(addr) = self.addr {
            config.addr = addr;
        }
        if let Some(port) = self.chunkserver_base_port {
            config.chunkserver_base_port = port;
        }
        if let Some(host) = self.chunkserver_host {
            config.chunkserver_host = host;
        }
        if let Some(ms) = self.probe_interval_ms {
            config.probe_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.probe_timeout_ms {
            config.probe_timeout = Duration::from_millis(ms);
        }
        if let Some(policy) = self.reregistration {
            config.reregistration = policy;
        }
        if let Some(dir) = self.source_dir {
            config.source_dir = dir;
        }

        anyhow::ensure!(
            !config.probe_interval.is_zero(),
            "probe interval must be greater than zero"
        );
        anyhow::ensure!(
            !config.probe_timeout.is_zero(),
            "probe timeout must be greater than zero"
        );

        Ok((config, self.pushes, Duration::from_millis(self.push_delay_ms)))
    }
}

fn parse_push(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((id, file)) if !id.is_empty() && !file.is_empty() => {
            Ok((id.to_string(), file.to_string()))
        }
        _ => Err(format!("expected <id>=<file>, got {:?}", s)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dfs_common::telemetry::init_tracing("coordinator=info,dfs_coordinator=info");

    let (config, pushes, push_delay) = Args::parse().into_config()?;
    tracing::info!("Starting coordinator with {:?}", config);

    let registry = Arc::new(Registry::new(
        config.chunkserver_base_port,
        config.reregistration,
    ));
    let rpc = Arc::new(GrpcChunkServerRpc::new(
        config.chunkserver_host.clone(),
        config.probe_timeout,
        config.max_message_size,
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let monitor = Arc::new(LivenessMonitor::new(
        registry.clone(),
        rpc.clone(),
        config.liveness(),
    ));
    let monitor_handle = monitor.spawn(shutdown_rx);

    if !pushes.is_empty() {
        let pusher = Arc::new(FilePusher::new(
            registry.clone(),
            rpc,
            config.source_dir.clone(),
        ));
        tokio::spawn(async move {
            tokio::time::sleep(push_delay).await;
            for (id, file) in pushes {
                pusher.spawn_send_file(id, file);
            }
        });
    }

    tracing::info!("Coordinator listening on {}", config.addr);

    Server::builder()
        .add_service(
            CoordinatorServiceServer::new(Coordinator::new(registry))
                .max_decoding_message_size(config.max_message_size),
        )
        .serve_with_shutdown(config.addr, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
        })
        .await
        .with_context(|| format!("coordinator server on {} failed", config.addr))?;

    let _ = shutdown_tx.send(true);
    monitor_handle.await?;

    Ok(())
}
