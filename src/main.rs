mod config;
mod constants;
mod error;
mod routes;
mod transforms;
mod upstream;

use clap::Parser;
use config::{Config, ProxyConfig};
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transforms::ModelMapper;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("GIT_HASH");
pub const BUILD_TIME: &str = env!("BUILD_TIME");

/// Read-only state shared by every request
pub struct AppState {
    pub proxy: ProxyConfig,
    pub mapper: ModelMapper,
    pub http_client: Client,
    /// Key clients must present; `None` leaves the provider route open
    pub api_key: Option<String>,
    /// Upper bound on JSON bodies peeked by the stream classifier
    pub max_body_bytes: usize,
}

#[derive(Parser)]
#[command(name = "reasoning-relay")]
#[command(about = "Chat-completion gateway that maps models and surfaces reasoning content")]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, env = "RELAY_HOST")]
    host: Option<String>,

    /// Port to bind to
    #[arg(short, long, env = "RELAY_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let host = args.host.unwrap_or(config.host);
    let port = args.port.unwrap_or(config.port);

    let mut client_builder = Client::builder();
    if let Some(timeout) = config.upstream_timeout {
        client_builder = client_builder.timeout(timeout);
    }
    let http_client = client_builder
        .build()
        .expect("Failed to create HTTP client");

    if config.api_key.is_none() {
        tracing::warn!("RELAY_API_KEY is not set, the provider route is open to anyone");
    }
    info!("Upstream: {}", config.proxy.base_url);
    info!(
        "Model mappings: {}, reasoning output: {}, debug: {}",
        config.proxy.model_mappings.len(),
        config.proxy.enable_reasoning,
        config.proxy.debug
    );

    let state = Arc::new(AppState {
        mapper: ModelMapper::new(config.proxy.model_mappings.clone()),
        proxy: config.proxy,
        http_client,
        api_key: config.api_key,
        max_body_bytes: config.max_body_bytes,
    });

    let app = routes::router(state, config.web_root.as_deref());

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .expect("Invalid address");
    info!(
        "Starting reasoning-relay v{}-{} (built {})",
        VERSION, GIT_HASH, BUILD_TIME
    );
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
