mod app;

use anyhow::{Context, Result};
use clap::Parser;
use listenfd::ListenFd;
use socialgate_auth::RouterConfig;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::create_app;

/// Socialgate - Google, Meta and Apple sign-in behind one router
#[derive(Parser, Debug)]
#[command(name = "socialgate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Host address to bind the server to
    #[arg(long, short = 'H', default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Port to listen on
    #[arg(long, short, default_value = "3000", env = "PORT")]
    port: u16,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Serve a mock identity provider and point every provider at it
    #[cfg(feature = "mock")]
    #[arg(long)]
    mock: bool,

    /// Port of the mock identity provider
    #[cfg(feature = "mock")]
    #[arg(long, default_value = "3001", env = "MOCK_IDP_PORT")]
    mock_port: u16,

    /// Redis URL for sharing login flows between instances
    #[cfg(feature = "redis")]
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "socialgate=debug,socialgate_auth=debug,tower_http=debug".into());
    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    #[allow(unused_mut)]
    let mut config = RouterConfig::from_env().context("failed to load login configuration")?;

    #[cfg(feature = "mock")]
    if cli.mock {
        config = start_mock_idp(config, cli.mock_port).await?;
    }

    #[cfg(feature = "redis")]
    if let Some(url) = &cli.redis_url {
        config = with_redis(config, url).await?;
    }

    let app = create_app(config)?;

    // Auto-reload support via listenfd
    let mut listenfd = ListenFd::from_env();
    let listener = match listenfd.take_tcp_listener(0)? {
        // If we are given a tcp listener on listen fd 0, use that one
        Some(listener) => {
            listener.set_nonblocking(true)?;
            TcpListener::from_std(listener)?
        }
        // Otherwise fall back to CLI-specified host:port
        None => {
            let addr = format!("{}:{}", cli.host, cli.port);
            TcpListener::bind(&addr).await?
        }
    };

    tracing::info!("listening on {}", listener.local_addr()?);

    // Run the server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Starts the mock IdP and rewires every provider to it.
///
/// Google and Meta get throwaway credentials when none are configured. Apple
/// still needs a real signing key, so it is only used when configured.
#[cfg(feature = "mock")]
async fn start_mock_idp(config: RouterConfig, port: u16) -> Result<RouterConfig> {
    use socialgate_auth::{
        mock_idp::{endpoints, MockIdpServer},
        GoogleConfig, MetaConfig, Provider,
    };

    let (addr, _handle) = MockIdpServer::new(port).spawn().await?;
    let idp = format!("http://{addr}");
    tracing::info!("Mock IdP server listening on {idp}");

    let mut config = config;
    if !config.providers.contains_key(&Provider::Google) {
        config = config.with_provider(GoogleConfig::new("mock-google-client", "mock-secret"));
    }
    if !config.providers.contains_key(&Provider::Meta) {
        config = config.with_provider(MetaConfig::new("mock-meta-client", "mock-secret"));
    }

    config.providers = std::mem::take(&mut config.providers)
        .into_iter()
        .map(|(provider, provider_config)| {
            (provider, provider_config.with_endpoints(endpoints(&idp, provider)))
        })
        .collect();

    Ok(config)
}

#[cfg(feature = "redis")]
async fn with_redis(config: RouterConfig, url: &str) -> Result<RouterConfig> {
    use std::sync::Arc;

    use fred::prelude::*;
    use socialgate_auth::RedisFlowStore;

    let redis_config = Config::from_url(url).context("invalid Redis URL")?;
    let pool = Builder::from_config(redis_config).build_pool(4)?;
    pool.init().await.context("failed to connect to Redis")?;
    tracing::info!("storing login flows in Redis");

    let ttl = config.flow_ttl;
    Ok(config.with_flow_store(Arc::new(RedisFlowStore::new(pool, ttl))))
}

/// Wait for shutdown signals (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
