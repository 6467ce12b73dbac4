use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser as _;

use llmtxt::app::{AppState, rate_limit};
use llmtxt::config::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = llmtxt::cli::Cli::parse();

    match cli.env_file.as_deref() {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("load env file: {}", path.display()))?;
        }
        None => {
            // A missing `.env` is normal outside development.
            let _ = dotenvy::dotenv();
        }
    }

    llmtxt::logging::init("info").context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    let config = AppConfig::from_env().context("load configuration")?;
    let addr = cli
        .addr
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], config.port)));

    tracing::info!(
        openai_configured = config.openai.is_configured(),
        model = %config.openai.completion.model,
        max_tokens = config.openai.completion.max_tokens,
        rate_limit = %config.rate_limit.describe(),
        environment = %config.environment,
        "starting llmtxt"
    );
    if !config.openai.is_configured() {
        tracing::warn!("OPENAI_API_KEY is not set; generation requests will fail until it is");
    }

    let state = AppState::from_config(config)?;
    let pruner = rate_limit::spawn_pruner(Arc::clone(&state.rate_limiter));

    let public_dir = cli.public_dir.is_dir().then_some(cli.public_dir.as_path());
    if let Some(dir) = public_dir {
        tracing::info!(dir = %dir.display(), "serving static files");
    }
    let app = llmtxt::app::router(state, public_dir);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {addr}: {err}"))?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serve http")?;

    pruner.abort();
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("SIGINT received, shutting down"),
        () = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
