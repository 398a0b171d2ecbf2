use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use consim_api::{build_router, config::Config, state::AppState};
use consim_dialogue::{DialogueController, DialogueGraph};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config =
        Config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    // Initialize logging
    init_logging(&config);

    tracing::info!("Starting consim API server");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    // Load the dialogue graph; a missing or malformed file falls back to
    // the built-in single-node script so the server still comes up.
    let graph = Arc::new(DialogueGraph::load_or_default(&config.dialogue.graph_path));
    tracing::info!(
        nodes = graph.len(),
        path = %config.dialogue.graph_path,
        "Dialogue graph loaded"
    );

    if config.default_provider().is_none() {
        tracing::warn!(
            provider = %config.generation.provider,
            "No default API key in environment; generation requires /set_api_key"
        );
    }

    // Create application state
    let controller = DialogueController::new(graph);
    let state = AppState::new(config.clone(), controller);

    // Build router
    let app = build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
