use anyhow::{Context, Result};
use clap::Parser;
use scrimbase_gateway::{Api, Gateway};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host interface to bind (default: localhost).
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    #[arg(short, long, default_value_t = 8080)]
    port: u16,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse args
    let args = Args::parse();

    // Create logger
    init_tracing();

    if std::env::var("ADMIN_AUTH_TOKEN")
        .unwrap_or_default()
        .trim()
        .is_empty()
    {
        warn!("ADMIN_AUTH_TOKEN is unset; all admin routes will be rejected");
    }

    let gateway = Arc::new(Gateway::new());
    let api = Api::new(gateway);
    let app = api.router();

    // Start server
    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}
