use std::net::SocketAddr;
use std::sync::Arc;

use axum::serve;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use telemetryd::collectors::MetricsAggregator;
use telemetryd::config::Config;
use telemetryd::gpu::GpuSupport;
use telemetryd::http;

#[derive(Parser, Debug)]
#[command(name = "telemetryd")]
#[command(version)]
struct Cli {
    /// Path to the YAML config. Built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match cli.config {
        Some(path) => match Config::load_from_file(&path) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!(error = %err, "failed to load config");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    info!(listen = %cfg.listen, "starting telemetryd");

    let gpu = GpuSupport::detect().await;
    let aggregator = Arc::new(MetricsAggregator::new(gpu, cfg.nvidia_device_index));

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let http_task = {
        let cfg = cfg.clone();
        let aggregator = aggregator.clone();
        tokio::spawn(async move {
            let app = http::build_router(aggregator);
            let addr: SocketAddr = match cfg.listen.parse() {
                Ok(addr) => addr,
                Err(err) => {
                    error!(error = %err, listen = %cfg.listen, "invalid listen address");
                    std::process::exit(1);
                }
            };

            let listener = match TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(err) => {
                    error!(error = %err, listen = %cfg.listen, "failed to bind http server");
                    std::process::exit(1);
                }
            };

            let server = serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });

            if let Err(err) = server.await {
                error!(error = %err, "http server error");
            }
        })
    };

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to wait for Ctrl+C");
    }
    info!("received Ctrl+C, shutting down");

    let _ = shutdown_tx.send(true);
    let _ = http_task.await;
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
