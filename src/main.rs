use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use self_polish::auth::{AuthGate, CredentialVerifier, TokenCodec};
use self_polish::config::AppConfig;
use self_polish::llm::create_provider;
use self_polish::server::{AppState, cors_layer, router};
use self_polish::store::{LibSqlBackend, UserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let AppConfig {
        auth: auth_config,
        questionnaire,
        server: server_config,
        llm: llm_config,
    } = AppConfig::from_env().context("Invalid configuration")?;
    let _log_guard = init_tracing(server_config.log_dir.as_deref());

    eprintln!("self-polish v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", llm_config.model);
    eprintln!("   API: http://0.0.0.0:{}", server_config.port);
    eprintln!("   Database: {}", server_config.db_path);

    let llm = create_provider(&llm_config).context("Failed to create LLM provider")?;

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn UserStore> = Arc::new(
        LibSqlBackend::new_local(Path::new(&server_config.db_path))
            .await
            .with_context(|| format!("Failed to open database at {}", server_config.db_path))?,
    );

    let gate = Arc::new(AuthGate::new(
        store,
        TokenCodec::new(&auth_config),
        CredentialVerifier::default(),
    ));
    let state = AppState::new(gate, llm, questionnaire);

    let app = router(&state).layer(cors_layer(&server_config.cors_origin)?);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", server_config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", server_config.port))?;
    info!(port = server_config.port, cors_origin = %server_config.cors_origin, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!(sessions = state.sessions.len().await, "Server stopped");
    Ok(())
}

/// Console logging, plus a daily rolling file when `log_dir` is set. The
/// returned guard flushes the file writer on drop.
fn init_tracing(log_dir: Option<&str>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "self-polish.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
