use crate::cache_validator::{fingerprint, ValidatedCacheEntry};
use crate::circuit_breaker::{create_llm_circuit_breaker, LlmCircuitBreaker};
use crate::errors::AppError;
use crate::models::DocumentKind;
use crate::scoring::ScoringResult;
use crate::statement::{self, StatementAnalysis};
use crate::statement_parser::parse_statement_reply;
use axum::body::Bytes;
use failsafe::futures::CircuitBreaker;
use moka::future::Cache;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder used whenever the explanation cannot be generated.
pub const EXPLANATION_UNAVAILABLE: &str = "AI explanation unavailable";

/// Extracted text shorter than this is treated as an unreadable document.
pub const MIN_EXTRACTED_CHARS: usize = 100;

/// Only the head of the statement text is sent to the model.
const PROMPT_TEXT_CHARS: usize = 3000;

const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);

// ============ Ollama ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatOptions {
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub options: ChatOptions,
}

impl ChatRequest {
    /// Single user-turn, non-streaming request.
    pub fn user_prompt(model: &str, prompt: String, options: ChatOptions) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            stream: false,
            format: None,
            options,
        }
    }

    pub fn json_mode(mut self) -> Self {
        self.format = Some("json".to_string());
        self
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// Client for a local Ollama server, guarded by a circuit breaker.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    breaker: LlmCircuitBreaker,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            breaker: create_llm_circuit_breaker(),
        })
    }

    /// Probes `GET /api/tags`; any error or non-2xx means unavailable.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(AVAILABILITY_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!("Ollama probe returned status {}", response.status());
                false
            }
            Err(e) => {
                tracing::warn!("Ollama not reachable at {}: {}", self.base_url, e);
                false
            }
        }
    }

    /// Sends a chat request and returns the assistant message content.
    ///
    /// # Errors
    ///
    /// `AppError::ExternalApiError` on transport failures, non-success
    /// statuses, malformed replies, or while the circuit is open.
    pub async fn chat(&self, request: &ChatRequest) -> Result<String, AppError> {
        let url = format!("{}/api/chat", self.base_url);

        let call = async {
            let response = self
                .client
                .post(&url)
                .json(request)
                .send()
                .await
                .map_err(|e| AppError::ExternalApiError(format!("Ollama request failed: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                tracing::error!("Ollama returned error {}: {}", status, error_text);
                return Err(AppError::ExternalApiError(format!(
                    "Ollama returned status {}",
                    status
                )));
            }

            let body: ChatResponse = response.json().await.map_err(|e| {
                AppError::ExternalApiError(format!("Failed to parse Ollama response: {}", e))
            })?;
            Ok(body.message.content)
        };

        match self.breaker.call(call).await {
            Ok(content) => Ok(content),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("Ollama circuit open, rejecting call");
                Err(AppError::ExternalApiError(
                    "Language model temporarily unavailable (circuit open)".to_string(),
                ))
            }
        }
    }
}

// ============ Text extraction ============

#[derive(Debug, Deserialize)]
struct ExtractionResponse {
    text: String,
}

/// Client for the OCR / PDF text-extraction service.
///
/// `POST {base}/extract?type=<pdf|jpg|jpeg|png>` with the raw document as
/// the body; the service answers `{"text": "..."}`.
#[derive(Clone)]
pub struct TextExtractionClient {
    client: Client,
    base_url: String,
}

impl TextExtractionClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn extract(&self, document: Bytes, kind: DocumentKind) -> Result<String, AppError> {
        let source = if kind.is_image() { "image" } else { "PDF" };
        let url = reqwest::Url::parse_with_params(
            &format!("{}/extract", self.base_url),
            &[("type", kind.as_str())],
        )
        .map_err(|e| AppError::InternalError(format!("Failed to build URL: {}", e)))?;

        tracing::info!("Extracting text from {} ({} bytes)", source, document.len());

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(document)
            .send()
            .await
            .map_err(|e| {
                AppError::ExtractionFailed(format!("Failed to extract text from {}: {}", source, e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Text extraction returned error {}: {}", status, error_text);
            return Err(AppError::ExtractionFailed(format!(
                "Failed to extract text from {}: {}",
                source, error_text
            )));
        }

        let body: ExtractionResponse = response.json().await.map_err(|e| {
            AppError::ExtractionFailed(format!(
                "Failed to extract text from {}: invalid extraction response: {}",
                source, e
            ))
        })?;

        tracing::info!("Extracted {} characters from {}", body.text.chars().count(), source);
        Ok(body.text)
    }
}

// ============ Statement processing ============

/// Prompt asking the model to structure raw statement text as JSON.
pub fn structuring_prompt(text: &str) -> String {
    let head: String = text.chars().take(PROMPT_TEXT_CHARS).collect();
    format!(
        r#"You are a financial data extraction expert. Extract financial data from this bank statement.

Bank Statement Text:
{head}

Return ONLY valid JSON with these exact fields (no other text):
{{
    "account_holder_name": "string",
    "bank_name": "string",
    "account_number": "string (last 4 digits only)",
    "statement_period": "string (e.g., Jan 2024 - Mar 2024)",
    "opening_balance": float,
    "closing_balance": float,
    "average_monthly_balance": float,
    "total_credits": float,
    "total_debits": float,
    "salary_credits": [list of salary amounts],
    "number_of_salary_credits": int,
    "bounced_transactions": int,
    "loan_emi_payments": float,
    "cash_deposits": float,
    "ecommerce_transactions": int,
    "minimum_balance": float,
    "maximum_balance": float,
    "overdraft_instances": int,
    "financial_health_score": float (0-100),
    "risk_indicators": [list of red flags if any],
    "monthly_income_estimate": float
}}

Rules:
- Return ONLY the JSON object, no explanations
- Use 0 for missing numbers, [] for missing arrays, "" for missing text
- All amounts in Indian Rupees
- Identify salary credits and calculate monthly income
- If data not found, use reasonable defaults

JSON only:"#
    )
}

/// Turns an uploaded statement into a [`StatementAnalysis`]:
/// extract text, structure it with the language model, analyse the record.
///
/// Analyses are cached per document fingerprint and model for one hour.
#[derive(Clone)]
pub struct StatementProcessor {
    extractor: TextExtractionClient,
    ollama: OllamaClient,
    cache: Cache<String, String>,
}

impl StatementProcessor {
    pub fn new(extractor: TextExtractionClient, ollama: OllamaClient) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(3600))
            .max_capacity(1_000)
            .build();
        Self {
            extractor,
            ollama,
            cache,
        }
    }

    pub async fn process(
        &self,
        document: Bytes,
        kind: DocumentKind,
        model: &str,
    ) -> Result<StatementAnalysis, AppError> {
        let cache_key = format!("{}:{}", fingerprint(&document), model);

        if let Some(cached) = self.cache.get(&cache_key).await {
            if let Some(analysis) = ValidatedCacheEntry::unseal::<StatementAnalysis>(&cached) {
                tracing::debug!("Statement cache HIT (validated) for {}", cache_key);
                return Ok(analysis);
            }
            tracing::warn!(
                "Cache validation failed for {}, reprocessing statement",
                cache_key
            );
        }

        tracing::info!("Processing bank statement of type: {}", kind.as_str());
        let text = self.extractor.extract(document, kind).await?;
        if text.chars().count() < MIN_EXTRACTED_CHARS {
            return Err(AppError::ExtractionFailed(
                "Insufficient text extracted from document".to_string(),
            ));
        }

        let request = ChatRequest::user_prompt(
            model,
            structuring_prompt(&text),
            ChatOptions {
                temperature: 0.2,
                num_predict: Some(2000),
            },
        )
        .json_mode();
        let reply = self.ollama.chat(&request).await.map_err(|e| {
            AppError::ExtractionFailed(format!("Failed to analyze with Ollama: {}", e))
        })?;

        let record = parse_statement_reply(&reply).map_err(|failure| {
            tracing::error!("Failed to parse Ollama response as JSON: {}", failure);
            tracing::error!("Response was: {}", failure.raw_response);
            AppError::from(failure)
        })?;

        let analysis = statement::analyze(record);
        tracing::info!(
            "Bank statement processing completed (risk {}, quality {:?})",
            analysis.red_flag_analysis.financial_risk_score,
            analysis.data_quality
        );

        if let Some(sealed) = ValidatedCacheEntry::seal(&analysis) {
            self.cache.insert(cache_key, sealed).await;
        }

        Ok(analysis)
    }
}

// ============ Explanations ============

/// Prompt asking for a short customer-facing explanation of a result.
pub fn explanation_prompt(result: &ScoringResult, statement_verified: bool) -> String {
    let key_points = result
        .reasons
        .iter()
        .chain(result.recommendations.iter())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ; ");
    let statement_line = if statement_verified {
        "\nBank Statement: Verified"
    } else {
        ""
    };

    format!(
        "You are a loan officer. Explain this risk assessment to the applicant in 2-3 clear sentences.\n\n\
         Score: {:.1}/100\n\
         Risk Level: {}\n\
         Key Points: {}{}\n\n\
         Write a professional, clear explanation suitable for the customer:",
        result.enhanced_score,
        result.risk.label(),
        key_points,
        statement_line
    )
}

/// Generates natural-language explanations; never fails the request.
#[derive(Clone)]
pub struct ExplanationService {
    ollama: OllamaClient,
    default_model: String,
}

impl ExplanationService {
    pub fn new(ollama: OllamaClient, default_model: impl Into<String>) -> Self {
        Self {
            ollama,
            default_model: default_model.into(),
        }
    }

    pub async fn explain(
        &self,
        result: &ScoringResult,
        statement_verified: bool,
        model: Option<&str>,
    ) -> String {
        let request = ChatRequest::user_prompt(
            model.unwrap_or(&self.default_model),
            explanation_prompt(result, statement_verified),
            ChatOptions {
                temperature: 0.3,
                num_predict: None,
            },
        );

        match self.ollama.chat(&request).await {
            Ok(text) if !text.trim().is_empty() => {
                tracing::info!("AI explanation generated successfully");
                text
            }
            Ok(_) => {
                tracing::warn!("Ollama returned an empty explanation");
                EXPLANATION_UNAVAILABLE.to_string()
            }
            Err(e) => {
                tracing::warn!("Ollama summary generation failed: {}", e);
                EXPLANATION_UNAVAILABLE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structuring_prompt_truncates_text() {
        let text = "A".repeat(5000);
        let prompt = structuring_prompt(&text);
        assert!(prompt.contains(&"A".repeat(3000)));
        assert!(!prompt.contains(&"A".repeat(3001)));
        assert!(prompt.contains("\"monthly_income_estimate\": float"));
    }

    #[test]
    fn chat_request_serializes_json_mode() {
        let request = ChatRequest::user_prompt(
            "llama3",
            "hi".to_string(),
            ChatOptions {
                temperature: 0.2,
                num_predict: Some(2000),
            },
        )
        .json_mode();
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["format"], "json");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 2000);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn plain_request_omits_optional_fields() {
        let request = ChatRequest::user_prompt(
            "llama3",
            "hi".to_string(),
            ChatOptions {
                temperature: 0.3,
                num_predict: None,
            },
        );
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("format").is_none());
        assert!(body["options"].get("num_predict").is_none());
    }
}
