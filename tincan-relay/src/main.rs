use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tincan_core::IceServerConfig;
use tincan_relay::{AppState, PeerSinks, Registry, router};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tincan-relay", about = "Signaling relay for two-party calls")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    /// Liveness sweep interval in seconds.
    #[arg(long, default_value_t = 30)]
    sweep_interval: u64,

    /// STUN/TURN urls handed to clients, repeatable.
    #[arg(long = "ice-server", default_value = "stun:stun.l.google.com:19302")]
    ice_servers: Vec<String>,

    #[arg(long, env = "TURN_USERNAME")]
    turn_username: Option<String>,

    #[arg(long, env = "TURN_CREDENTIAL")]
    turn_credential: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let ice_servers = vec![IceServerConfig {
        urls: args.ice_servers,
        username: args.turn_username,
        credential: args.turn_credential,
    }];

    let sinks = PeerSinks::new();
    let registry = Registry::spawn(
        Arc::new(sinks.clone()),
        Duration::from_secs(args.sweep_interval),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(AppState {
        registry,
        sinks,
        ice_servers,
    })
    .layer(cors);

    info!("Relay listening on http://{}", args.bind);

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
