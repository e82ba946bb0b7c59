//! Um - a situation-puzzle chat bot
//!
//! Walks new users through a tutorial, then lets them play puzzles by
//! asking yes/no questions and submitting solutions. Answers and solution
//! checks come from a hosted natural-language-inference classifier.

mod api;
mod classifier;
mod config;
mod db;
mod judge;
mod puzzle;
mod runtime;
mod session;
mod state_machine;

use api::{create_router, AppState};
use config::BotConfig;
use db::Database;
use runtime::{BotRuntime, DatabaseStorage};
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Local runs may keep settings in a .env file
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "um_bot=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    let config = BotConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    if let Some(path) = &config.puzzles_path {
        let json = std::fs::read_to_string(path)?;
        let report = db.import_puzzles(&json)?;
        tracing::info!(
            path = %path.display(),
            imported = report.imported,
            rejected = report.rejected.len(),
            "Imported puzzle catalog"
        );
    }

    if !config.classifier.is_configured() {
        tracing::warn!(
            "No classifier configured. Set COHERE_API_KEY and COHERE_MODEL_ID; questions and solutions will not be judged."
        );
    }
    let classifier = classifier::from_config(&config.classifier);
    tracing::info!(
        model = %classifier.model_id(),
        max_puzzle_id = config.context.max_puzzle_id,
        max_hints = config.context.max_hints,
        "Classifier ready"
    );

    let runtime = BotRuntime::new(DatabaseStorage::new(db), classifier, config.context.clone());
    let state = AppState::new(runtime);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Um bot listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
