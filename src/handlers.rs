use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::models::*;
use crate::scoring::{ScoringEngine, ALTERNATIVE_DATA_WEIGHT, MODEL_WEIGHT, RULE_WEIGHT};
use crate::services::{ExplanationService, StatementProcessor};
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Scoring pipeline with the loaded classifier.
    pub engine: Arc<ScoringEngine>,
    /// Statement path; `None` when text extraction or the model is unavailable.
    pub statement_processor: Option<StatementProcessor>,
    /// Explanation generator; `None` when disabled or the model is unavailable.
    pub explainer: Option<ExplanationService>,
}

impl AppState {
    fn statement_enabled(&self) -> bool {
        self.statement_processor.is_some()
    }

    fn ollama_enabled(&self) -> bool {
        self.explainer.is_some()
    }

    async fn explain(
        &self,
        result: &crate::scoring::ScoringResult,
        statement_verified: bool,
        model: Option<&str>,
    ) -> Option<String> {
        match &self.explainer {
            Some(explainer) => Some(explainer.explain(result, statement_verified, model).await),
            None => None,
        }
    }
}

/// GET /
///
/// Capability discovery: which optional collaborators are active.
pub async fn root(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let mut features = vec![
        "Hybrid Rule + ML Scoring",
        "Fraud Detection",
        "Dynamic Pricing",
        "Alternative Data Integration",
        "Portfolio Insights",
        "Loan Amount Recommendation",
        "EMI Affordability Analysis",
    ];
    if state.statement_enabled() {
        features.push("Bank Statement Processing & Verification");
    }
    if state.ollama_enabled() {
        features.push("Ollama AI Explanations");
    }

    Json(json!({
        "message": "NBFC Credit Scoring API",
        "version": env!("CARGO_PKG_VERSION"),
        "features": features,
        "bank_statement_enabled": state.statement_enabled(),
        "ollama_enabled": state.ollama_enabled(),
    }))
}

/// Health check endpoint.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// GET /model/info
pub async fn model_info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let features = state.engine.feature_names();
    Json(json!({
        "model_type": "Gradient-boosted tree ensemble",
        "model_version": state.engine.model_version(),
        "feature_count": features.len(),
        "features": features,
        "blend_weights": {
            "rules": RULE_WEIGHT,
            "model": MODEL_WEIGHT,
            "alternative_data": ALTERNATIVE_DATA_WEIGHT,
        },
        "risk_thresholds": { "low": 30, "medium": 60 },
        "capabilities": {
            "bank_statement": state.statement_enabled(),
            "ai_explanations": state.ollama_enabled(),
        },
    }))
}

/// POST /score
///
/// Scores a single JSON application.
///
/// # Returns
///
/// * `Result<Json<ScoreResponse>, AppError>` - The scoring result, or 400 on
///   malformed input and 500 when the pipeline cannot produce a score.
pub async fn score_loan(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Application>, JsonRejection>,
) -> Result<Json<ScoreResponse>, AppError> {
    let Json(application) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    application.validate()?;

    tracing::info!("Processing loan application");
    let result = state.engine.score(&application)?;
    let statement_verification = StatementVerification::not_provided();
    let ai_explanation = state
        .explain(&result, statement_verification.is_verified(), None)
        .await;

    Ok(Json(ScoreResponse {
        result,
        statement_verification,
        statement_metadata: None,
        ai_explanation,
    }))
}

/// Multipart payload of `/score/with-statement`.
struct StatementUpload {
    file_name: String,
    document: Bytes,
    fields: HashMap<String, String>,
}

impl StatementUpload {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut file: Option<(String, Bytes)> = None;
        let mut fields = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "bank_statement" || name == "file" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;
                file = Some((file_name, bytes));
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid form field '{}': {}", name, e)))?;
                fields.insert(name, value);
            }
        }

        let (file_name, document) = file.ok_or_else(|| {
            AppError::BadRequest("Missing required file field 'bank_statement'".to_string())
        })?;
        Ok(Self {
            file_name,
            document,
            fields,
        })
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn required<T: FromStr>(&self, name: &str) -> Result<T, AppError> {
        let raw = self
            .text(name)
            .ok_or_else(|| AppError::BadRequest(format!("Missing required field: {}", name)))?;
        raw.parse()
            .map_err(|_| AppError::BadRequest(format!("Invalid value for field '{}': {}", name, raw)))
    }

    fn optional<T: FromStr>(&self, name: &str) -> Result<Option<T>, AppError> {
        match self.text(name) {
            Some(_) => self.required(name).map(Some),
            None => Ok(None),
        }
    }

    fn application(&self) -> Result<Application, AppError> {
        let application = Application {
            age: self.required("age")?,
            income: self.required("income")?,
            loan_amount: self.required("loan_amount")?,
            employment_type: EmploymentType::from(self.required::<String>("employment_type")?),
            credit_score: self.required("credit_score")?,
            existing_debt: self.optional("existing_debt")?.unwrap_or(DEFAULT_EXISTING_DEBT),
            business_type: self.text("business_type").map(String::from),
            years_in_business: self.optional("years_in_business")?,
            monthly_income: self.optional("monthly_income")?,
            bank_account_age: self.optional("bank_account_age")?,
        };
        application.validate()?;
        Ok(application)
    }
}

/// POST /score/with-statement
///
/// Multipart form with a bank statement (`bank_statement` or `file`) plus
/// the application fields and an optional `ollama_model` override. The
/// statement is verified and used to enrich the application before scoring.
pub async fn score_with_statement(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ScoreResponse>, AppError> {
    let processor = state.statement_processor.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable(
            "Bank statement processing not available. Configure TEXT_EXTRACTION_URL and a reachable Ollama instance".to_string(),
        )
    })?;

    let upload = StatementUpload::read(multipart).await?;
    tracing::info!("Processing loan with bank statement: {}", upload.file_name);

    let kind = DocumentKind::from_filename(&upload.file_name)?;
    if upload.document.is_empty() {
        return Err(AppError::BadRequest("Empty file uploaded".to_string()));
    }
    let application = upload.application()?;
    let model = upload
        .text("ollama_model")
        .unwrap_or(&state.config.ollama_model)
        .to_string();

    let analysis = processor
        .process(upload.document.clone(), kind, &model)
        .await
        .with_context(|| format!("processing {}", upload.file_name))?;

    let (result, metadata) = state.engine.score_with_statement(&application, &analysis)?;
    tracing::info!(
        "Statement-verified score {:.1} ({})",
        result.enhanced_score,
        result.risk.label()
    );

    let statement_verification = StatementVerification::from_analysis(&analysis, application.income);
    let ai_explanation = state
        .explain(&result, statement_verification.is_verified(), Some(&model))
        .await;

    Ok(Json(ScoreResponse {
        result,
        statement_verification,
        statement_metadata: Some(metadata),
        ai_explanation,
    }))
}

/// POST /score/batch
///
/// Scores each application independently; a failing item is reported with
/// its index and never aborts its siblings.
pub async fn score_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchScoringRequest>, JsonRejection>,
) -> Result<Json<BatchScoringResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let batch_id = request
        .batch_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    tracing::info!(
        "Scoring batch {} with {} applications",
        batch_id,
        request.applications.len()
    );

    let results: Vec<BatchItemResult> = request
        .applications
        .iter()
        .enumerate()
        .map(|(index, record)| {
            match Application::from_record(record).and_then(|app| state.engine.score(&app)) {
                Ok(result) => BatchItemResult::Scored(BatchItemSuccess {
                    application_id: index,
                    result,
                }),
                Err(e) => {
                    tracing::warn!("Batch {} item {} failed: {}", batch_id, index, e);
                    BatchItemResult::Failed(BatchItemFailure {
                        application_id: index,
                        error: e.to_string(),
                        status: "failed".to_string(),
                    })
                }
            }
        })
        .collect();

    let successful = results.iter().filter(|r| r.is_success()).count();
    Ok(Json(BatchScoringResponse {
        batch_id,
        total_applications: results.len(),
        successful,
        failed: results.len() - successful,
        results,
    }))
}

/// Builds the HTTP router with all routes and middleware.
///
/// Scoring routes are rate limited per client IP; `/health` bypasses the
/// limiter.
pub fn build_router(state: Arc<AppState>) -> Result<Router, AppError> {
    let config = &state.config;

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond((1000 / config.rate_limit_per_second.max(1)).max(1))
            .burst_size(config.rate_limit_burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| AppError::InternalError("Invalid rate limiter configuration".to_string()))?,
    );

    let max_upload = config.max_upload_bytes;

    let protected_routes = Router::new()
        .route("/", get(root))
        .route("/model/info", get(model_info))
        .route("/score", post(score_loan))
        .route("/score/with-statement", post(score_with_statement))
        .route("/score/batch", post(score_batch))
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(max_upload))
                .layer(RequestBodyLimitLayer::new(max_upload))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    Ok(Router::new()
        .route("/health", get(health))
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()))
}
