use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::scoring::ScoringResult;
use crate::statement::{self, StatementAnalysis, StatementMetadata};

// ============ Application ============

/// Declared defaults used when a raw record omits a field.
pub const DEFAULT_AGE: u32 = 25;
pub const DEFAULT_INCOME: f64 = 50_000.0;
pub const DEFAULT_LOAN_AMOUNT: f64 = 100_000.0;
pub const DEFAULT_CREDIT_SCORE: u32 = 700;
pub const DEFAULT_EMPLOYMENT_TYPE: &str = "Salaried";
pub const DEFAULT_EXISTING_DEBT: f64 = 0.0;

/// Employment category declared by the applicant.
///
/// Unknown labels are preserved verbatim so they still one-hot expand for
/// the classifier, but every business rule treats them as neutral.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EmploymentType {
    Salaried,
    SelfEmployed,
    Business,
    Freelancer,
    Unemployed,
    Other(String),
}

impl EmploymentType {
    pub fn label(&self) -> &str {
        match self {
            EmploymentType::Salaried => "Salaried",
            EmploymentType::SelfEmployed => "Self-Employed",
            EmploymentType::Business => "Business",
            EmploymentType::Freelancer => "Freelancer",
            EmploymentType::Unemployed => "Unemployed",
            EmploymentType::Other(label) => label,
        }
    }
}

impl From<String> for EmploymentType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Salaried" => EmploymentType::Salaried,
            "Self-Employed" => EmploymentType::SelfEmployed,
            "Business" => EmploymentType::Business,
            "Freelancer" => EmploymentType::Freelancer,
            "Unemployed" => EmploymentType::Unemployed,
            _ => EmploymentType::Other(value),
        }
    }
}

impl From<&str> for EmploymentType {
    fn from(value: &str) -> Self {
        EmploymentType::from(value.to_string())
    }
}

impl From<EmploymentType> for String {
    fn from(value: EmploymentType) -> Self {
        value.label().to_string()
    }
}

/// Loan application as submitted by the caller.
///
/// `income` is the monthly figure; `existing_debt` is the annualized (or
/// EMI-equivalent) obligation. Both may be overwritten by statement
/// enrichment before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    #[serde(deserialize_with = "whole_number")]
    pub age: u32,
    pub income: f64,
    pub loan_amount: f64,
    pub employment_type: EmploymentType,
    #[serde(deserialize_with = "whole_number")]
    pub credit_score: u32,
    #[serde(default)]
    pub existing_debt: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_type: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_whole_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub years_in_business: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_income: Option<f64>,
    #[serde(
        default,
        deserialize_with = "optional_whole_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub bank_account_age: Option<u32>,
}

/// Integer fields also accept whole-number floats such as `720.0`.
fn whole_u32(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    value
        .as_f64()
        .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= f64::from(u32::MAX))
        .map(|n| n as u32)
}

fn whole_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    whole_u32(&value).ok_or_else(|| {
        de::Error::custom(format!("expected a non-negative whole number, got {}", value))
    })
}

fn optional_whole_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u32>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    whole_u32(&value).map(Some).ok_or_else(|| {
        de::Error::custom(format!("expected a non-negative whole number, got {}", value))
    })
}

impl Default for Application {
    fn default() -> Self {
        Self {
            age: DEFAULT_AGE,
            income: DEFAULT_INCOME,
            loan_amount: DEFAULT_LOAN_AMOUNT,
            employment_type: EmploymentType::from(DEFAULT_EMPLOYMENT_TYPE),
            credit_score: DEFAULT_CREDIT_SCORE,
            existing_debt: DEFAULT_EXISTING_DEBT,
            business_type: None,
            years_in_business: None,
            monthly_income: None,
            bank_account_age: None,
        }
    }
}

impl Application {
    /// Builds an application from a loosely-typed record, filling absent
    /// fields with the declared defaults. Present fields of the wrong type
    /// are rejected.
    pub fn from_record(record: &Value) -> Result<Self, AppError> {
        let fields = record
            .as_object()
            .ok_or_else(|| AppError::BadRequest("application must be a JSON object".to_string()))?;

        let mut application = Application::default();

        if let Some(value) = present(fields.get("age")) {
            application.age = as_u32("age", value)?;
        }
        if let Some(value) = present(fields.get("income")) {
            application.income = as_f64("income", value)?;
        }
        if let Some(value) = present(fields.get("loan_amount")) {
            application.loan_amount = as_f64("loan_amount", value)?;
        }
        if let Some(value) = present(fields.get("employment_type")) {
            let label = value.as_str().ok_or_else(|| {
                AppError::BadRequest("field 'employment_type' must be a string".to_string())
            })?;
            application.employment_type = EmploymentType::from(label);
        }
        if let Some(value) = present(fields.get("credit_score")) {
            application.credit_score = as_u32("credit_score", value)?;
        }
        if let Some(value) = present(fields.get("existing_debt")) {
            application.existing_debt = as_f64("existing_debt", value)?;
        }
        if let Some(value) = present(fields.get("business_type")) {
            application.business_type = value.as_str().map(String::from);
        }
        if let Some(value) = present(fields.get("years_in_business")) {
            application.years_in_business = Some(as_u32("years_in_business", value)?);
        }
        if let Some(value) = present(fields.get("monthly_income")) {
            application.monthly_income = Some(as_f64("monthly_income", value)?);
        }
        if let Some(value) = present(fields.get("bank_account_age")) {
            application.bank_account_age = Some(as_u32("bank_account_age", value)?);
        }

        application.validate()?;
        Ok(application)
    }

    /// Rejects monetary inputs that would poison the ratio computations.
    pub fn validate(&self) -> Result<(), AppError> {
        for (name, value) in [
            ("income", self.income),
            ("loan_amount", self.loan_amount),
            ("existing_debt", self.existing_debt),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::BadRequest(format!(
                    "field '{}' must be a non-negative number",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Requested principal as a percentage of income; 0 when income is 0.
    pub fn loan_to_income_ratio(&self) -> f64 {
        if self.income > 0.0 {
            self.loan_amount / self.income * 100.0
        } else {
            0.0
        }
    }

    /// Existing debt as a percentage of income; 0 when income is 0.
    pub fn debt_to_income_ratio(&self) -> f64 {
        if self.income > 0.0 {
            self.existing_debt / self.income * 100.0
        } else {
            0.0
        }
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn as_f64(name: &str, value: &Value) -> Result<f64, AppError> {
    value
        .as_f64()
        .ok_or_else(|| AppError::BadRequest(format!("field '{}' must be a number", name)))
}

fn as_u32(name: &str, value: &Value) -> Result<u32, AppError> {
    whole_u32(value).ok_or_else(|| {
            AppError::BadRequest(format!("field '{}' must be a non-negative integer", name))
        })
}

/// Formats an amount in rupees with thousands separators.
pub fn format_rupees(amount: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, amount.abs());
    let (whole, fraction) = match formatted.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && formatted.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    match fraction {
        Some(fraction) => format!("{}₹{}.{}", sign, grouped, fraction),
        None => format!("{}₹{}", sign, grouped),
    }
}

// ============ Uploads ============

/// Statement file types accepted by the text-extraction collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Jpg,
    Jpeg,
    Png,
}

impl DocumentKind {
    /// Resolves the kind from an uploaded file name's extension.
    pub fn from_filename(filename: &str) -> Result<Self, AppError> {
        let extension = filename
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match extension.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "jpg" => Ok(DocumentKind::Jpg),
            "jpeg" => Ok(DocumentKind::Jpeg),
            "png" => Ok(DocumentKind::Png),
            other => Err(AppError::BadRequest(format!(
                "Unsupported file type: {}. Allowed: pdf, jpg, jpeg, png",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Jpg => "jpg",
            DocumentKind::Jpeg => "jpeg",
            DocumentKind::Png => "png",
        }
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, DocumentKind::Pdf)
    }
}

// ============ Responses ============

/// Response body for the single-application scoring endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResponse {
    #[serde(flatten)]
    pub result: ScoringResult,
    pub statement_verification: StatementVerification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_metadata: Option<StatementMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_explanation: Option<String>,
}

/// Whether (and how) the declared figures were checked against a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatementVerification {
    Verified(VerifiedStatement),
    Unverified { verified: bool, message: String },
}

impl StatementVerification {
    pub fn not_provided() -> Self {
        StatementVerification::Unverified {
            verified: false,
            message: "No bank statement provided".to_string(),
        }
    }

    pub fn from_analysis(analysis: &StatementAnalysis, declared_income: f64) -> Self {
        let record = &analysis.record;
        let verified_income = record.monthly_income_estimate;
        let income_match = statement::income_matches(declared_income, verified_income);

        StatementVerification::Verified(VerifiedStatement {
            verified: true,
            verified_income,
            declared_income,
            income_match,
            banking_stability: analysis.income_metrics.income_stability_score,
            red_flags: analysis.red_flag_analysis.red_flags.clone(),
            statement_risk_level: analysis.red_flag_analysis.risk_level.label().to_string(),
            financial_health_score: record.financial_health_score,
            account_holder: non_empty_or_na(&record.account_holder_name),
            bank_name: non_empty_or_na(&record.bank_name),
            average_balance: record.average_monthly_balance,
        })
    }

    /// True when the response carries figures read from an uploaded statement.
    pub fn is_verified(&self) -> bool {
        matches!(self, StatementVerification::Verified(_))
    }
}

fn non_empty_or_na(value: &str) -> String {
    if value.trim().is_empty() {
        "N/A".to_string()
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedStatement {
    pub verified: bool,
    pub verified_income: f64,
    pub declared_income: f64,
    pub income_match: bool,
    pub banking_stability: u32,
    pub red_flags: Vec<String>,
    pub statement_risk_level: String,
    pub financial_health_score: f64,
    pub account_holder: String,
    pub bank_name: String,
    pub average_balance: f64,
}

// ============ Batch ============

/// Batch request; items stay untyped so one malformed entry fails alone.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchScoringRequest {
    pub applications: Vec<Value>,
    #[serde(default)]
    pub batch_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchScoringResponse {
    pub batch_id: String,
    pub total_applications: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BatchItemResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchItemResult {
    Scored(BatchItemSuccess),
    Failed(BatchItemFailure),
}

impl BatchItemResult {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchItemResult::Scored(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemSuccess {
    pub application_id: usize,
    #[serde(flatten)]
    pub result: ScoringResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemFailure {
    pub application_id: usize,
    pub error: String,
    pub status: String,
}
