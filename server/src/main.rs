use anyhow::Context;
use clap::Parser;
use std::{net::SocketAddr, sync::Arc};
use tombola_engine::{
    Clock, Hub, MemoryCache, MemoryEngine, MemoryStore, MemoryWallet, SystemClock,
};
use tombola_server::{Api, Config, RateLimit, RetryPolicy, WebhookRelay};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration.
    #[arg(short, long)]
    config: String,

    /// Overrides the configured port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args
    let args = Args::parse();

    // Load config
    let source = std::fs::read_to_string(&args.config)
        .with_context(|| format!("failed to read config {}", args.config))?;
    let config = Config::from_yaml(&source)
        .context("failed to parse config")?
        .validate()
        .context("invalid config")?;

    // Create logger
    let subscriber = tracing_subscriber::fmt().with_max_level(config.log_level);
    if config.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    // Wire the engine
    let mut hub = Hub::new(config.settings.topic_capacity);
    if let Some(url) = config.relay_url.clone() {
        let relay = WebhookRelay::new(url.clone())
            .context("failed to build relay client")?
            .with_retry_policy(RetryPolicy {
                max_attempts: config.relay_attempts,
                ..RetryPolicy::default()
            });
        hub = hub.with_relay(Arc::new(relay));
        info!(%url, "relaying events");
    }
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let wallet = MemoryWallet::new();
    for player in config.players {
        info!(player = %player.id, wallet = %player.wallet, "seeded player");
        wallet.register(player);
    }
    let engine = MemoryEngine::new(
        MemoryStore::new(),
        wallet,
        MemoryCache::new(clock.clone()),
        clock,
        hub,
        config.settings,
    );

    let api = Api::new(engine).with_rate_limit(RateLimit {
        per_second: config.rate_limit_per_second,
        burst: config.rate_limit_burst,
    });
    let app = api.router()?;

    // Start server
    let port = args.port.unwrap_or(config.port);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("axum server error")?;

    Ok(())
}
