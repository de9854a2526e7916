use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use nbfc_scoring_api::alternative_data::SimulatedAlternativeData;
use nbfc_scoring_api::classifier::{Classifier, TreeEnsembleClassifier};
use nbfc_scoring_api::config::Config;
use nbfc_scoring_api::handlers::{build_router, AppState};
use nbfc_scoring_api::scoring::ScoringEngine;
use nbfc_scoring_api::services::{
    ExplanationService, OllamaClient, StatementProcessor, TextExtractionClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - The classifier artifact and scoring engine.
/// - Optional collaborators (Ollama explanations, statement processing).
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nbfc_scoring_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let classifier = TreeEnsembleClassifier::from_path(&config.model_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load classifier from {}: {}",
            config.model_path.display(),
            e
        )
    })?;
    tracing::info!(
        "✓ Classifier loaded: {} ({} features, {} trees)",
        classifier.model_version(),
        classifier.feature_names().len(),
        classifier.tree_count()
    );

    let alternative_data = SimulatedAlternativeData::new(config.alt_data_seed);
    let engine = Arc::new(ScoringEngine::new(
        Arc::new(classifier),
        Arc::new(alternative_data),
    ));

    let ollama = OllamaClient::new(
        config.ollama_base_url.clone(),
        Duration::from_secs(config.llm_timeout_secs),
    )?;
    let ollama_available = ollama.is_available().await;
    if ollama_available {
        tracing::info!("✓ Ollama reachable at {}", config.ollama_base_url);
    } else {
        tracing::warn!("Ollama not available - AI explanations and statement scoring disabled");
    }

    let explainer = (config.explanations_enabled && ollama_available)
        .then(|| ExplanationService::new(ollama.clone(), config.ollama_model.clone()));

    let statement_processor = match (&config.text_extraction_url, ollama_available) {
        (Some(url), true) => {
            let extractor = TextExtractionClient::new(
                url.clone(),
                Duration::from_secs(config.extraction_timeout_secs),
            )?;
            tracing::info!("✓ Bank statement processing enabled");
            Some(StatementProcessor::new(extractor, ollama.clone()))
        }
        _ => None,
    };

    let app_state = Arc::new(AppState {
        config: config.clone(),
        engine,
        statement_processor,
        explainer,
    });

    let app = build_router(app_state)?;

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
