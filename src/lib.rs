//! NBFC Credit Scoring API Library
//!
//! Hybrid credit scoring for non-banking financial companies: a rule engine
//! blended with a tree-ensemble default classifier and alternative-data
//! signals, followed by dynamic pricing, portfolio exposure, loan amount
//! recommendation and EMI affordability search. Applications can optionally
//! be verified against an uploaded bank statement (text extraction plus a
//! local language model).
//!
//! # Modules
//!
//! - `api`: HTTP-layer components.
//! - `core`: Scoring pipeline stages.
//! - `integrations`: External collaborators (Ollama, text extraction).
//! - `alternative_data`: Alternative-data signal providers.
//! - `cache_validator`: Checksum-validated cache entries.
//! - `circuit_breaker`: Circuit breaker for language-model calls.
//! - `classifier`: Default-probability classifier and artifact loader.
//! - `config`: Configuration management.
//! - `emi`: EMI calculation and tenure search.
//! - `errors`: Error handling types.
//! - `features`: Feature normalization for the classifier.
//! - `fraud`: Fraud indicators.
//! - `handlers`: HTTP request handlers and router.
//! - `loan`: Loan amount recommendation.
//! - `models`: Request/response data models.
//! - `portfolio`: Portfolio tiering and exposure.
//! - `pricing`: Dynamic interest-rate pricing.
//! - `rules`: Rule engine.
//! - `scoring`: Pipeline orchestration and score blending.
//! - `services`: External service clients.
//! - `statement`: Bank statement records and analyses.
//! - `statement_parser`: Parser for structuring-model replies.

pub mod api;
pub mod core;
pub mod integrations;

pub mod alternative_data;
pub mod cache_validator;
pub mod circuit_breaker;
pub mod classifier;
pub mod config;
pub mod emi;
pub mod errors;
pub mod features;
pub mod fraud;
pub mod handlers;
pub mod loan;
pub mod models;
pub mod portfolio;
pub mod pricing;
pub mod rules;
pub mod scoring;
pub mod services;
pub mod statement;
pub mod statement_parser;
