use std::sync::Arc;
use std::time::Duration;

use pool_statsd::memory::MemoryDatabase;
use pool_statsd::{EmitterConfig, StatsdInterceptor};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod collector;
mod handlers;
mod load_generator;
mod server;
mod settings;

use settings::DemoConfig;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Configured once at startup; every worker connection goes through it.
    pub interceptor: Arc<StatsdInterceptor>,

    /// Settings last applied to the interceptor's emitter.
    pub statsd: parking_lot::Mutex<EmitterConfig>,

    /// The "driver" behind the pool.
    pub db: MemoryDatabase,

    /// Mock collector aggregates. The listener writes, the API reads.
    pub collector: Arc<collector::CollectorStore>,

    /// Current or last load run.
    pub load: tokio::sync::Mutex<Option<load_generator::LoadRun>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // ── 1. Load configuration ────────────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "pool-statsd.toml".to_string());
    let config = DemoConfig::load(&config_path).map_err(|e| {
        tracing::error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    // ── 2. Mock collector ────────────────────────────────────────
    let store = Arc::new(collector::CollectorStore::new());
    if config.collector.enabled {
        let addr = format!("{}:{}", config.statsd.hostname, config.statsd.port);
        let socket = collector::listener::bind(&addr).await?;
        tokio::spawn(collector::listener::run(socket, store.clone()));
    }

    // ── 3. Interceptor ───────────────────────────────────────────
    let mut interceptor = StatsdInterceptor::new();
    interceptor.apply(&config.statsd)?;
    info!(
        collector = %config.statsd.endpoint(),
        prefix = %config.statsd.prefix,
        sample_rate = config.statsd.sample_rate,
        "StatsD interceptor configured"
    );

    // ── 4. Shared state ──────────────────────────────────────────
    let state = Arc::new(AppState {
        interceptor: Arc::new(interceptor),
        statsd: parking_lot::Mutex::new(config.statsd.clone()),
        db: MemoryDatabase::new().with_latency(Duration::from_micros(config.database.latency_us)),
        collector: store,
        load: tokio::sync::Mutex::new(None),
    });

    // ── 5. Serve ─────────────────────────────────────────────────
    let app = server::create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %config.server.bind, "Demo API listening");
    info!("Start load     → curl -XPOST localhost:3000/api/load -H 'content-type: application/json' -d '{{}}'");
    info!("Change rate    → curl -XPUT localhost:3000/api/emitter -H 'content-type: application/json' -d '{{\"sampleRate\":0.1}}'");
    info!("Per operation  → http://localhost:3000/api/collector");
    info!("Live lines     → http://localhost:3000/api/collector/tail");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let run = state.load.lock().await.take();
    if let Some(run) = run {
        run.stop().await;
    }
    // Anything staged under the capacity policy goes out before exit
    if let Some(emitter) = state.interceptor.emitter() {
        emitter.flush();
    }
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
