use std::sync::Arc;

use expert_finder::config::FinderConfig;
use expert_finder::error::ConfigError;
use expert_finder::finder::{self, ConversationEngine, LlmOracle, QuestionSet};
use expert_finder::llm::create_provider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // .env is optional; real environment variables win. Problems are
    // reported once tracing is up.
    let dotenv_problem = dotenv_problem(dotenvy::dotenv());

    let config = FinderConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("  export OPENAI_API_KEY=sk-...   (or EXPERT_FINDER_BACKEND=anthropic + ANTHROPIC_API_KEY)");
        std::process::exit(1);
    });

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_tracing(&config)?;
    if let Some(e) = dotenv_problem {
        tracing::warn!(error = %e, "Ignoring unreadable .env file");
    }

    eprintln!("🔎 Expert Finder v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {} ({:?})", config.llm.model, config.llm.backend);
    eprintln!("   Chat API: http://0.0.0.0:{}/api/chat", config.port);
    eprintln!("   Allowed origins: {}", config.allowed_origins.join(", "));
    eprintln!("   Oracle timeout: {:?}\n", config.oracle.timeout);

    let llm = create_provider(&config.llm)?;
    let oracle = Arc::new(LlmOracle::new(llm, config.oracle.clone()));
    let engine = Arc::new(ConversationEngine::new(QuestionSet::default(), oracle));

    let app = finder::app(engine, &config.allowed_origins)?;

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Expert finder listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// A missing `.env` is normal; anything else (bad syntax, unreadable file)
/// is worth a warning.
fn dotenv_problem<T>(result: Result<T, dotenvy::Error>) -> Option<dotenvy::Error> {
    match result {
        Ok(_) => None,
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => Some(e),
    }
}

fn init_tracing(
    config: &FinderConfig,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, ConfigError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = tracing_subscriber::fmt::layer().with_target(false);

    match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "expert-finder.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            Ok(None)
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn missing_env_file_is_not_a_problem() {
        assert!(dotenv_problem(Ok(PathBuf::from(".env"))).is_none());
        let missing = dotenvy::Error::Io(io::Error::from(io::ErrorKind::NotFound));
        assert!(dotenv_problem::<PathBuf>(Err(missing)).is_none());
    }

    #[test]
    fn broken_env_file_is_reported() {
        let parse = dotenvy::Error::LineParse("API_KEY = 'oops".into(), 8);
        assert!(dotenv_problem::<PathBuf>(Err(parse)).is_some());

        let denied = dotenvy::Error::Io(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(dotenv_problem::<PathBuf>(Err(denied)).is_some());
    }
}
