/// Integration tests with mocked collaborators
/// Exercises statement processing and explanations against wiremock stand-ins
/// for the text-extraction service and Ollama
use axum::body::Bytes;
use nbfc_scoring_api::alternative_data::FixedAlternativeData;
use nbfc_scoring_api::classifier::TreeEnsembleClassifier;
use nbfc_scoring_api::errors::AppError;
use nbfc_scoring_api::models::{Application, DocumentKind};
use nbfc_scoring_api::scoring::ScoringEngine;
use nbfc_scoring_api::services::{
    ExplanationService, OllamaClient, StatementProcessor, TextExtractionClient,
    EXPLANATION_UNAVAILABLE,
};
use nbfc_scoring_api::statement::DataQuality;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STATEMENT_TEXT: &str = "HDFC BANK LTD Statement of Account Jan 2024 - Mar 2024 \
    Account No XXXX4321 Opening Balance 42,000.00 SALARY CREDIT ACME CORP 65,000.00 \
    SALARY CREDIT ACME CORP 65,000.00 SALARY CREDIT ACME CORP 65,000.00 Closing Balance 88,000.00";

fn chat_reply(content: &str) -> serde_json::Value {
    json!({
        "model": "llama3",
        "created_at": "2024-04-01T10:00:00Z",
        "message": { "role": "assistant", "content": content },
        "done": true
    })
}

fn structured_statement() -> String {
    let record = json!({
        "account_holder_name": "R Sharma",
        "bank_name": "HDFC Bank",
        "account_number": "4321",
        "statement_period": "Jan 2024 - Mar 2024",
        "opening_balance": 42000.0,
        "closing_balance": 88000.0,
        "average_monthly_balance": 61000.0,
        "total_credits": 195000.0,
        "total_debits": 149000.0,
        "salary_credits": [65000, 65000, 65000],
        "number_of_salary_credits": 3,
        "bounced_transactions": 0,
        "loan_emi_payments": 0,
        "cash_deposits": 0,
        "ecommerce_transactions": 14,
        "minimum_balance": 38000.0,
        "maximum_balance": 104000.0,
        "overdraft_instances": 0,
        "financial_health_score": 82,
        "risk_indicators": [],
        "monthly_income_estimate": 65000.0
    });
    format!("Here is the data:\n```json\n{}\n```", record)
}

fn processor(extraction: &MockServer, ollama: &MockServer) -> StatementProcessor {
    let extractor = TextExtractionClient::new(extraction.uri(), Duration::from_secs(5)).unwrap();
    let client = OllamaClient::new(ollama.uri(), Duration::from_secs(5)).unwrap();
    StatementProcessor::new(extractor, client)
}

async fn mount_extraction(server: &MockServer, text: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/extract"))
        .and(query_param("type", "pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": text })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_statement_processing_end_to_end() {
    let extraction = MockServer::start().await;
    let ollama = MockServer::start().await;

    mount_extraction(&extraction, STATEMENT_TEXT, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({ "model": "llama3", "format": "json", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(&structured_statement())))
        .expect(1)
        .mount(&ollama)
        .await;

    let processor = processor(&extraction, &ollama);
    let analysis = processor
        .process(Bytes::from_static(b"%PDF-1.4 statement"), DocumentKind::Pdf, "llama3")
        .await
        .unwrap();

    assert_eq!(analysis.record.bank_name, "HDFC Bank");
    assert_eq!(analysis.record.monthly_income_estimate, 65_000.0);
    assert_eq!(analysis.income_metrics.income_stability_score, 90);
    assert_eq!(analysis.red_flag_analysis.financial_risk_score, 0);
    assert_eq!(analysis.data_quality, DataQuality::High);
}

#[tokio::test]
async fn test_repeated_document_is_served_from_cache() {
    let extraction = MockServer::start().await;
    let ollama = MockServer::start().await;

    // Each collaborator must be hit exactly once across both calls
    mount_extraction(&extraction, STATEMENT_TEXT, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(&structured_statement())))
        .expect(1)
        .mount(&ollama)
        .await;

    let processor = processor(&extraction, &ollama);
    let document = Bytes::from_static(b"%PDF-1.4 same statement");

    let first = processor
        .process(document.clone(), DocumentKind::Pdf, "llama3")
        .await
        .unwrap();
    let second = processor
        .process(document, DocumentKind::Pdf, "llama3")
        .await
        .unwrap();

    assert_eq!(first.record.bank_name, second.record.bank_name);
    assert_eq!(first.processing_timestamp, second.processing_timestamp);
}

#[tokio::test]
async fn test_short_extraction_is_rejected_before_model_call() {
    let extraction = MockServer::start().await;
    let ollama = MockServer::start().await;

    mount_extraction(&extraction, "blurry scan", 1).await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("{}")))
        .expect(0)
        .mount(&ollama)
        .await;

    let err = processor(&extraction, &ollama)
        .process(Bytes::from_static(b"%PDF"), DocumentKind::Pdf, "llama3")
        .await
        .unwrap_err();

    match err {
        AppError::ExtractionFailed(msg) => {
            assert_eq!(msg, "Insufficient text extracted from document")
        }
        other => panic!("Expected ExtractionFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_extraction_service_error_surfaces_as_extraction_failure() {
    let extraction = MockServer::start().await;
    let ollama = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(ResponseTemplate::new(500).set_body_string("tesseract crashed"))
        .mount(&extraction)
        .await;

    let err = processor(&extraction, &ollama)
        .process(Bytes::from_static(b"\x89PNG"), DocumentKind::Png, "llama3")
        .await
        .unwrap_err();

    match err {
        AppError::ExtractionFailed(msg) => {
            assert!(msg.starts_with("Failed to extract text from image"));
            assert!(msg.contains("tesseract crashed"));
        }
        other => panic!("Expected ExtractionFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unparseable_model_reply_is_reported() {
    let extraction = MockServer::start().await;
    let ollama = MockServer::start().await;

    mount_extraction(&extraction, STATEMENT_TEXT, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_reply("I could not read this statement, sorry.")),
        )
        .mount(&ollama)
        .await;

    let err = processor(&extraction, &ollama)
        .process(Bytes::from_static(b"%PDF"), DocumentKind::Pdf, "llama3")
        .await
        .unwrap_err();

    match err {
        AppError::ExtractionFailed(msg) => assert!(msg.starts_with("JSON parsing error")),
        other => panic!("Expected ExtractionFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_model_outage_maps_to_extraction_failure() {
    let extraction = MockServer::start().await;
    let ollama = MockServer::start().await;

    mount_extraction(&extraction, STATEMENT_TEXT, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&ollama)
        .await;

    let err = processor(&extraction, &ollama)
        .process(Bytes::from_static(b"%PDF"), DocumentKind::Pdf, "llama3")
        .await
        .unwrap_err();

    match err {
        AppError::ExtractionFailed(msg) => {
            assert!(msg.starts_with("Failed to analyze with Ollama"))
        }
        other => panic!("Expected ExtractionFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ollama_availability_check() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .mount(&server)
        .await;

    let up = OllamaClient::new(server.uri(), Duration::from_secs(5)).unwrap();
    assert!(up.is_available().await);

    let empty = MockServer::start().await;
    let down = OllamaClient::new(empty.uri(), Duration::from_secs(5)).unwrap();
    assert!(!down.is_available().await);
}

#[tokio::test]
async fn test_circuit_opens_after_consecutive_model_failures() {
    let server = MockServer::start().await;

    // The sixth call must never reach the server
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .expect(5)
        .mount(&server)
        .await;

    let client = OllamaClient::new(server.uri(), Duration::from_secs(5)).unwrap();
    let explainer = ExplanationService::new(client.clone(), "llama3");
    let result = sample_result();

    for _ in 0..5 {
        assert_eq!(explainer.explain(&result, false, None).await, EXPLANATION_UNAVAILABLE);
    }

    let request = nbfc_scoring_api::services::ChatRequest::user_prompt(
        "llama3",
        "ping".to_string(),
        nbfc_scoring_api::services::ChatOptions {
            temperature: 0.3,
            num_predict: None,
        },
    );
    match client.chat(&request).await {
        Err(AppError::ExternalApiError(msg)) => assert!(msg.contains("circuit open")),
        other => panic!("Expected circuit rejection, got {:?}", other),
    }
}

fn sample_result() -> nbfc_scoring_api::scoring::ScoringResult {
    let classifier = TreeEnsembleClassifier::from_path(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/model/credit_model.json"
    ))
    .unwrap();
    let engine = ScoringEngine::new(
        Arc::new(classifier),
        Arc::new(FixedAlternativeData::uniform(0.7)),
    );
    engine.score(&Application::default()).unwrap()
}

#[tokio::test]
async fn test_explanation_uses_model_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({ "model": "mistral", "options": { "temperature": 0.3 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
            "Your application carries low risk thanks to a stable salary.",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(server.uri(), Duration::from_secs(5)).unwrap();
    let explainer = ExplanationService::new(client, "llama3");

    let text = explainer
        .explain(&sample_result(), true, Some("mistral"))
        .await;
    assert_eq!(text, "Your application carries low risk thanks to a stable salary.");
}

#[tokio::test]
async fn test_explanation_failure_falls_back_to_placeholder() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let client = OllamaClient::new(server.uri(), Duration::from_secs(5)).unwrap();
    let explainer = ExplanationService::new(client, "llama3");

    assert_eq!(
        explainer.explain(&sample_result(), false, None).await,
        EXPLANATION_UNAVAILABLE
    );
}
