use std::sync::Arc;

use anyhow::{Context, anyhow};
use db::DBService;
use secrecy::ExposeSecret;
use server::{DeploymentImpl, app};
use services::services::{
    claude_api::ClaudeApiClient,
    config::Config,
    database_validator::DatabaseValidator,
    flashcard_generator::{ClaudeFlashcardGenerator, FlashcardGenerator},
    session_cleanup::SessionCleanupService,
};
use tracing::{info, warn};
use utils::logging::init_tracing;

const DEFAULT_LOG_FILTER: &str = "server=info,services=info,db=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(DEFAULT_LOG_FILTER);

    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install the rustls crypto provider"))?;

    let config = Arc::new(Config::from_env().context("invalid configuration")?);
    let db = DBService::new(&config.database_url)
        .await
        .context("failed to open the database")?;
    DatabaseValidator::new(db.pool.clone())
        .validate()
        .await
        .context("database schema check failed")?;

    let generator: Option<Arc<dyn FlashcardGenerator>> = match &config.ai.api_key {
        Some(key) => {
            let client = ClaudeApiClient::new(key.expose_secret(), config.ai.model.clone())?;
            info!(model = %config.ai.model, max_flashcards = config.ai.max_flashcards, "AI generation enabled");
            Some(Arc::new(ClaudeFlashcardGenerator::new(client)))
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set, flashcard generation is disabled");
            None
        }
    };

    SessionCleanupService::spawn(db.clone(), config.session_cleanup_interval);

    let deployment = DeploymentImpl::new(db, config.clone(), generator);
    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!(address = %listener.local_addr()?, "Server listening");

    axum::serve(listener, app(deployment))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
