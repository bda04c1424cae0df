use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use habits_backend_lib::{
    activity::{ActivityDispatcher, ActivitySink, JsonLinesSink, TracingSink},
    config::{Settings, StorageBackend},
    create_router,
    storage::{CredentialStore, FlatFileCredentialStore, InMemoryCredentialStore},
    AppState,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Habits API server
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// TOML config file (defaults to ./habits.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides `server.host` / `server.port`
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn activity_sink(settings: &Settings) -> anyhow::Result<Arc<dyn ActivitySink>> {
    Ok(match &settings.storage.activity_log {
        Some(path) => Arc::new(
            JsonLinesSink::new(path)
                .await
                .with_context(|| format!("cannot open activity log {}", path.display()))?,
        ),
        None => Arc::new(TracingSink),
    })
}

async fn serve<S: CredentialStore + 'static>(
    store: S,
    settings: Settings,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let (dispatcher, drain) = ActivityDispatcher::spawn(activity_sink(&settings).await?);
    let state = Arc::new(AppState::new(store, settings, Arc::new(dispatcher))?);
    let app = create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // The router owned the last dispatcher; let the drain flush.
    drain.await.context("activity drain failed")?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings: Settings = Settings::figment(cli.config.as_deref())
        .extract()
        .context("failed to load settings")?;
    init_tracing(&settings);
    settings.ensure_secret()?;
    settings.validate()?;

    let addr = match cli.bind {
        Some(addr) => addr,
        None => settings.server.bind_addr()?,
    };

    match settings.storage.backend {
        StorageBackend::Memory => {
            info!("using in-memory credential store");
            serve(InMemoryCredentialStore::new(), settings, addr).await
        },
        StorageBackend::FlatFile => {
            info!(path = %settings.storage.path.display(), "using flat-file credential store");
            let store = FlatFileCredentialStore::new(&settings.storage.path)?;
            serve(store, settings, addr).await
        },
    }
}
