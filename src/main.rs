use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizzzone::{
    api,
    config::ServerConfig,
    state::{spawn_room_reaper, AppState},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizzzone=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Quizzzone...");

    let config = ServerConfig::from_env();
    let bind_addr = config.bind_addr;
    let static_dir = config.static_dir.clone();
    let questions_path = config.questions_path.clone();

    let state = Arc::new(AppState::with_config(config));

    if let Some(path) = questions_path {
        match state.load_questions_file(&path).await {
            Ok(report) => {
                for error in &report.errors {
                    tracing::warn!("{}: row {} skipped: {}", path.display(), error.row, error.reason);
                }
            }
            Err(e) => tracing::error!("Could not load questions from {}: {}", path.display(), e),
        }
    }

    let coverage = state.question_coverage().await;
    if !coverage.is_complete() {
        tracing::warn!(
            "Question bank covers {} of {} cells; games cannot start until every cell has an active question",
            coverage.cells.len() - coverage.missing.len(),
            coverage.cells.len()
        );
    }

    spawn_room_reaper(state.clone());

    let app = api::router(state)
        .fallback_service(ServeDir::new(static_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        );

    tracing::info!("Listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
