//! Bank statement facts and the analyses derived from them.
//!
//! A [`StatementRecord`] is whatever the structuring model managed to pull
//! out of the document. Every field defaults to zero/empty, and the
//! deserializers accept the usual model sloppiness (numbers as strings,
//! rupee symbols, thousands separators, nulls).

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::{format_rupees, Application};

// ============ Record ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub account_holder_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub bank_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub account_number: String,
    #[serde(deserialize_with = "lenient_string")]
    pub statement_period: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub opening_balance: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub closing_balance: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub average_monthly_balance: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub total_credits: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub total_debits: f64,
    #[serde(deserialize_with = "lenient_f64_list")]
    pub salary_credits: Vec<f64>,
    #[serde(deserialize_with = "lenient_u32")]
    pub number_of_salary_credits: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub bounced_transactions: u32,
    #[serde(deserialize_with = "lenient_f64")]
    pub loan_emi_payments: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub cash_deposits: f64,
    #[serde(deserialize_with = "lenient_u32")]
    pub ecommerce_transactions: u32,
    #[serde(deserialize_with = "lenient_f64")]
    pub minimum_balance: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub maximum_balance: f64,
    #[serde(deserialize_with = "lenient_u32")]
    pub overdraft_instances: u32,
    #[serde(deserialize_with = "lenient_f64")]
    pub financial_health_score: f64,
    #[serde(deserialize_with = "lenient_string_list")]
    pub risk_indicators: Vec<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub monthly_income_estimate: f64,
}

/// An amount with optional sign, thousands separators and decimals.
static AMOUNT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-?\d[\d,]*(?:\.\d+)?").expect("amount token pattern is valid")
});

/// Reads an amount out of free text such as `"Rs. 45,000"` or `"₹45,000/-"`.
///
/// Plain numerals (including exponent notation) parse directly. Otherwise the
/// text must hold exactly one amount token; anything ambiguous is `None`.
fn amount_from_text(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Ok(n) = text.parse::<f64>() {
        return Some(n);
    }

    let mut tokens = AMOUNT_TOKEN.find_iter(text);
    let token = tokens.next()?;
    if tokens.next().is_some() {
        return None;
    }
    token.as_str().replace(',', "").parse::<f64>().ok()
}

fn number_from(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => amount_from_text(s),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(number_from(&value).unwrap_or(0.0))
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(number_from(&value)
        .filter(|n| *n >= 0.0)
        .map(|n| n.min(f64::from(u32::MAX)) as u32)
        .unwrap_or(0))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_f64_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.iter().filter_map(number_from).collect(),
        _ => Vec::new(),
    })
}

fn lenient_string_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Value::String(s) if !s.is_empty() => vec![s],
        _ => Vec::new(),
    })
}

// ============ Income metrics ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncomeConsistency {
    #[serde(rename = "Very Stable")]
    VeryStable,
    Stable,
    Moderate,
    Unstable,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeMetrics {
    pub income_stability_score: u32,
    pub income_consistency: IncomeConsistency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_monthly_salary: Option<f64>,
    /// Coefficient of variation of salary credits, in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_variance: Option<f64>,
    pub irregular_income_flag: bool,
    pub number_of_income_sources: usize,
}

/// Salary consistency from the coefficient of variation of salary credits.
pub fn income_metrics(record: &StatementRecord) -> IncomeMetrics {
    let credits = &record.salary_credits;
    if credits.is_empty() {
        return IncomeMetrics {
            income_stability_score: 0,
            income_consistency: IncomeConsistency::Unknown,
            average_monthly_salary: None,
            salary_variance: None,
            irregular_income_flag: true,
            number_of_income_sources: 0,
        };
    }

    let n = credits.len() as f64;
    let mean = credits.iter().sum::<f64>() / n;
    let variance = credits.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let cv = if mean > 0.0 {
        variance.sqrt() / mean * 100.0
    } else {
        100.0
    };

    let (score, consistency) = if cv < 10.0 {
        (90, IncomeConsistency::VeryStable)
    } else if cv < 20.0 {
        (75, IncomeConsistency::Stable)
    } else if cv < 40.0 {
        (50, IncomeConsistency::Moderate)
    } else {
        (25, IncomeConsistency::Unstable)
    };

    IncomeMetrics {
        income_stability_score: score,
        income_consistency: consistency,
        average_monthly_salary: Some(mean),
        salary_variance: Some(cv),
        irregular_income_flag: cv > 40.0,
        number_of_income_sources: credits.len(),
    }
}

// ============ Red flags ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementRiskLevel {
    Low,
    Medium,
    High,
}

impl StatementRiskLevel {
    pub fn from_score(score: u32) -> Self {
        if score < 30 {
            StatementRiskLevel::Low
        } else if score < 60 {
            StatementRiskLevel::Medium
        } else {
            StatementRiskLevel::High
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatementRiskLevel::Low => "Low",
            StatementRiskLevel::Medium => "Medium",
            StatementRiskLevel::High => "High",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedFlagReport {
    pub red_flags: Vec<String>,
    pub red_flag_count: usize,
    /// Capped at 100.
    pub financial_risk_score: u32,
    pub risk_level: StatementRiskLevel,
    pub requires_manual_review: bool,
}

pub const MAX_STATEMENT_RISK: u32 = 100;

pub fn detect_red_flags(record: &StatementRecord) -> RedFlagReport {
    let mut flags = Vec::new();
    let mut score: u32 = 0;

    if record.bounced_transactions > 0 {
        flags.push(format!(
            "{} bounced transaction(s)",
            record.bounced_transactions
        ));
        score = score.saturating_add(record.bounced_transactions.saturating_mul(15));
    }

    if record.overdraft_instances > 0 {
        flags.push(format!(
            "{} overdraft instance(s)",
            record.overdraft_instances
        ));
        score = score.saturating_add(record.overdraft_instances.saturating_mul(10));
    }

    if record.minimum_balance < 5_000.0 {
        flags.push(format!(
            "Low minimum balance: {}",
            format_rupees(record.minimum_balance, 2)
        ));
        score = score.saturating_add(20);
    }

    if record.cash_deposits > record.total_credits * 0.3 {
        flags.push(format!(
            "High cash deposits: {}",
            format_rupees(record.cash_deposits, 2)
        ));
        score = score.saturating_add(25);
    }

    let emi_ratio = if record.monthly_income_estimate > 0.0 {
        record.loan_emi_payments / record.monthly_income_estimate * 100.0
    } else {
        0.0
    };
    if emi_ratio > 50.0 {
        flags.push(format!("High EMI burden: {:.1}% of income", emi_ratio));
        score = score.saturating_add(30);
    }

    let capped = score.min(MAX_STATEMENT_RISK);
    RedFlagReport {
        red_flag_count: flags.len(),
        red_flags: flags,
        financial_risk_score: capped,
        risk_level: StatementRiskLevel::from_score(score),
        requires_manual_review: score > 50,
    }
}

// ============ Analysis ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    High,
    Medium,
}

/// A structured record plus everything derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementAnalysis {
    #[serde(flatten)]
    pub record: StatementRecord,
    pub income_metrics: IncomeMetrics,
    pub red_flag_analysis: RedFlagReport,
    pub processing_timestamp: DateTime<Utc>,
    pub data_quality: DataQuality,
}

pub fn analyze(record: StatementRecord) -> StatementAnalysis {
    let income_metrics = income_metrics(&record);
    let red_flag_analysis = detect_red_flags(&record);
    let data_quality = if red_flag_analysis.requires_manual_review {
        DataQuality::Medium
    } else {
        DataQuality::High
    };

    StatementAnalysis {
        record,
        income_metrics,
        red_flag_analysis,
        processing_timestamp: Utc::now(),
        data_quality,
    }
}

// ============ Enrichment ============

/// Statement facts kept alongside the score but never fed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementMetadata {
    pub average_balance: f64,
    pub banking_stability_score: u32,
    pub statement_risk_score: u32,
    pub red_flags: Vec<String>,
    pub bounced_transactions: u32,
    pub overdraft_instances: u32,
}

impl StatementMetadata {
    pub fn from_analysis(analysis: &StatementAnalysis) -> Self {
        Self {
            average_balance: analysis.record.average_monthly_balance,
            banking_stability_score: analysis.income_metrics.income_stability_score,
            statement_risk_score: analysis.red_flag_analysis.financial_risk_score,
            red_flags: analysis.red_flag_analysis.red_flags.clone(),
            bounced_transactions: analysis.record.bounced_transactions,
            overdraft_instances: analysis.record.overdraft_instances,
        }
    }
}

/// Replaces declared figures with verified ones where the statement has them.
///
/// Income is overwritten by a positive monthly estimate; existing debt only
/// ever grows, to twelve months of observed EMI payments.
pub fn enrich_application(
    application: &Application,
    analysis: &StatementAnalysis,
) -> (Application, StatementMetadata) {
    let record = &analysis.record;
    let mut enriched = application.clone();

    if record.monthly_income_estimate > 0.0 {
        enriched.income = record.monthly_income_estimate;
    }
    if record.loan_emi_payments > 0.0 {
        enriched.existing_debt = enriched.existing_debt.max(record.loan_emi_payments * 12.0);
    }

    (enriched, StatementMetadata::from_analysis(analysis))
}

/// True when declared and verified income agree within 20% of the declared figure.
pub fn income_matches(declared: f64, verified: f64) -> bool {
    declared > 0.0 && (verified - declared).abs() < declared * 0.2
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clean_record() -> StatementRecord {
        StatementRecord {
            minimum_balance: 20_000.0,
            total_credits: 150_000.0,
            monthly_income_estimate: 50_000.0,
            salary_credits: vec![50_000.0, 50_000.0, 50_000.0],
            ..StatementRecord::default()
        }
    }

    #[test]
    fn sloppy_model_output_still_deserializes() {
        let record: StatementRecord = serde_json::from_value(json!({
            "bank_name": null,
            "average_monthly_balance": "₹45,000.50",
            "salary_credits": [50000, "52,000", null, "n/a"],
            "bounced_transactions": "2",
            "risk_indicators": "late salary",
            "unexpected": true
        }))
        .unwrap();

        assert_eq!(record.bank_name, "");
        assert_eq!(record.average_monthly_balance, 45_000.5);
        assert_eq!(record.salary_credits, vec![50_000.0, 52_000.0]);
        assert_eq!(record.bounced_transactions, 2);
        assert_eq!(record.risk_indicators, vec!["late salary"]);
        assert_eq!(record.overdraft_instances, 0);
    }

    #[test]
    fn rupee_amount_strings_keep_their_value() {
        let record: StatementRecord = serde_json::from_value(json!({
            "monthly_income_estimate": "Rs. 45,000",
            "average_monthly_balance": "Rs.12,500.00",
            "total_credits": "INR 45,000.00",
            "minimum_balance": "₹45,000/-",
            "cash_deposits": "5e3",
            "loan_emi_payments": "Rs. -2,000"
        }))
        .unwrap();

        assert_eq!(record.monthly_income_estimate, 45_000.0);
        assert_eq!(record.average_monthly_balance, 12_500.0);
        assert_eq!(record.total_credits, 45_000.0);
        assert_eq!(record.minimum_balance, 45_000.0);
        assert_eq!(record.cash_deposits, 5_000.0);
        assert_eq!(record.loan_emi_payments, -2_000.0);
    }

    #[test]
    fn ambiguous_amount_strings_read_as_zero() {
        let record: StatementRecord = serde_json::from_value(json!({
            "monthly_income_estimate": "45,000 to 50,000",
            "average_monthly_balance": "not stated",
            "salary_credits": ["Jan 2024: 50,000", "52,000"]
        }))
        .unwrap();

        assert_eq!(record.monthly_income_estimate, 0.0);
        assert_eq!(record.average_monthly_balance, 0.0);
        assert_eq!(record.salary_credits, vec![52_000.0]);
    }

    #[test]
    fn identical_salaries_are_very_stable() {
        let metrics = income_metrics(&clean_record());
        assert_eq!(metrics.income_stability_score, 90);
        assert_eq!(metrics.income_consistency, IncomeConsistency::VeryStable);
        assert!(!metrics.irregular_income_flag);
        assert_eq!(metrics.salary_variance, Some(0.0));
    }

    #[test]
    fn missing_salaries_are_irregular() {
        let metrics = income_metrics(&StatementRecord::default());
        assert_eq!(metrics.income_stability_score, 0);
        assert_eq!(metrics.income_consistency, IncomeConsistency::Unknown);
        assert!(metrics.irregular_income_flag);
    }

    #[test]
    fn zero_mean_salaries_are_unstable() {
        let record = StatementRecord {
            salary_credits: vec![0.0, 0.0],
            ..StatementRecord::default()
        };
        let metrics = income_metrics(&record);
        assert_eq!(metrics.income_consistency, IncomeConsistency::Unstable);
        assert!(metrics.irregular_income_flag);
    }

    #[test]
    fn red_flags_accumulate_and_cap() {
        let record = StatementRecord {
            bounced_transactions: 3,
            overdraft_instances: 2,
            minimum_balance: 1_200.0,
            cash_deposits: 80_000.0,
            total_credits: 100_000.0,
            loan_emi_payments: 30_000.0,
            monthly_income_estimate: 40_000.0,
            ..StatementRecord::default()
        };
        let report = detect_red_flags(&record);

        assert_eq!(
            report.red_flags,
            vec![
                "3 bounced transaction(s)",
                "2 overdraft instance(s)",
                "Low minimum balance: ₹1,200.00",
                "High cash deposits: ₹80,000.00",
                "High EMI burden: 75.0% of income",
            ]
        );
        assert_eq!(report.financial_risk_score, 100);
        assert_eq!(report.risk_level, StatementRiskLevel::High);
        assert!(report.requires_manual_review);
    }

    #[test]
    fn manual_review_uses_uncapped_score() {
        // 2 bounces (30) + low balance (20) = 50: not above the bar
        let record = StatementRecord {
            bounced_transactions: 2,
            minimum_balance: 100.0,
            ..clean_record()
        };
        let report = detect_red_flags(&record);
        assert_eq!(report.financial_risk_score, 50);
        assert_eq!(report.risk_level, StatementRiskLevel::Medium);
        assert!(!report.requires_manual_review);
    }

    #[test]
    fn enrichment_overwrites_income_and_never_lowers_debt() {
        let application = Application {
            income: 60_000.0,
            existing_debt: 500_000.0,
            ..Application::default()
        };
        let record = StatementRecord {
            monthly_income_estimate: 45_000.0,
            loan_emi_payments: 10_000.0,
            ..clean_record()
        };
        let (enriched, metadata) = enrich_application(&application, &analyze(record));

        assert_eq!(enriched.income, 45_000.0);
        assert_eq!(enriched.existing_debt, 500_000.0);
        assert_eq!(metadata.banking_stability_score, 90);
        assert_eq!(application.income, 60_000.0);
    }

    #[test]
    fn enrichment_raises_debt_to_annualized_emi() {
        let application = Application {
            existing_debt: 0.0,
            ..Application::default()
        };
        let record = StatementRecord {
            loan_emi_payments: 10_000.0,
            ..clean_record()
        };
        let (enriched, _) = enrich_application(&application, &analyze(record));

        assert_eq!(enriched.existing_debt, 120_000.0);
    }

    #[test]
    fn enrichment_keeps_declared_income_without_estimate() {
        let application = Application {
            income: 60_000.0,
            ..Application::default()
        };
        let record = StatementRecord {
            monthly_income_estimate: 0.0,
            ..clean_record()
        };
        let (enriched, _) = enrich_application(&application, &analyze(record));

        assert_eq!(enriched.income, 60_000.0);
        assert_eq!(enriched.existing_debt, application.existing_debt);
    }

    #[test]
    fn enrichment_reads_income_written_with_currency_prefix() {
        let application = Application {
            income: 60_000.0,
            ..Application::default()
        };
        let record: StatementRecord = serde_json::from_value(json!({
            "monthly_income_estimate": "Rs. 45,000",
            "minimum_balance": 20000,
            "total_credits": 150000,
            "salary_credits": [50000, 50000, 50000]
        }))
        .unwrap();
        let (enriched, _) = enrich_application(&application, &analyze(record));

        assert_eq!(enriched.income, 45_000.0);
    }

    #[test]
    fn analysis_downgrades_quality_on_manual_review() {
        let record = StatementRecord {
            bounced_transactions: 4,
            ..clean_record()
        };
        assert_eq!(analyze(record).data_quality, DataQuality::Medium);
        assert_eq!(analyze(clean_record()).data_quality, DataQuality::High);
    }

    #[test]
    fn income_match_needs_positive_declared_income() {
        assert!(income_matches(50_000.0, 45_000.0));
        assert!(!income_matches(50_000.0, 30_000.0));
        assert!(!income_matches(0.0, 0.0));
    }
}
