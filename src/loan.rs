//! Loan amount recommender.
//!
//! Computes the economical minimum for the applicant's tier, the maximum the
//! portfolio will expose, a debt-adjusted safe amount, and the resulting
//! approval decision with its reasoning trail.

use serde::{Deserialize, Serialize};

use crate::models::{format_rupees, Application, EmploymentType};
use crate::portfolio::RiskCategory;

const ROUNDING_UNIT: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalDecision {
    #[serde(rename = "REJECT - Unviable")]
    RejectUnviable,
    #[serde(rename = "REJECT - Below Minimum")]
    RejectBelowMinimum,
    #[serde(rename = "APPROVE - Reduced Amount")]
    ApproveReduced,
    #[serde(rename = "APPROVED - Full Amount")]
    ApproveFull,
}

impl ApprovalDecision {
    pub fn is_approved(&self) -> bool {
        matches!(
            self,
            ApprovalDecision::ApproveReduced | ApprovalDecision::ApproveFull
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRecommendation {
    pub minimum_loan_amount: f64,
    pub maximum_loan_amount: f64,
    pub recommended_loan_amount: f64,
    pub requested_amount: f64,
    pub safe_loan_amount: f64,
    pub approval_decision: ApprovalDecision,
    pub actionable_decision: String,
    pub decision_reasoning: Vec<String>,
    pub alternative_options: Vec<String>,
    pub loan_range: String,
    pub viable: bool,
    /// Income figure carried forward to the EMI search.
    pub annual_income: f64,
}

/// Rounds to the nearest 10,000 (ties to even).
pub fn round_to_unit(amount: f64) -> f64 {
    (amount / ROUNDING_UNIT).round_ties_even() * ROUNDING_UNIT
}

fn employment_multiplier(employment: &EmploymentType) -> f64 {
    match employment {
        EmploymentType::Salaried => 0.8,
        EmploymentType::Business => 1.0,
        EmploymentType::SelfEmployed => 1.2,
        EmploymentType::Freelancer => 1.5,
        EmploymentType::Unemployed => 2.0,
        EmploymentType::Other(_) => 1.0,
    }
}

fn credit_multiplier(credit_score: u32) -> f64 {
    if credit_score >= 750 {
        0.9
    } else if credit_score >= 700 {
        1.0
    } else if credit_score >= 600 {
        1.2
    } else {
        1.5
    }
}

/// Smallest loan worth originating for this applicant.
pub fn minimum_loan_amount(application: &Application, blended_score: f64) -> f64 {
    let base = RiskCategory::from_score(blended_score).base_minimum()
        * employment_multiplier(&application.employment_type)
        * credit_multiplier(application.credit_score);
    round_to_unit(base.max(application.income * 0.1))
}

pub fn recommend(
    application: &Application,
    blended_score: f64,
    max_exposure: f64,
) -> LoanRecommendation {
    let requested = application.loan_amount;
    let minimum = minimum_loan_amount(application, blended_score);

    let debt_to_income = application.debt_to_income_ratio();
    let safe = if debt_to_income > 50.0 {
        max_exposure * 0.6
    } else if debt_to_income > 30.0 {
        max_exposure * 0.8
    } else {
        max_exposure
    };

    let maximum = round_to_unit(max_exposure);
    let recommended = round_to_unit(requested.min(safe).min(max_exposure).max(0.0))
        .min(requested)
        .max(0.0);

    let rupees = |amount: f64| format_rupees(amount, 0);

    let (decision, actionable, reasoning, alternatives) = if minimum > maximum {
        (
            ApprovalDecision::RejectUnviable,
            format!(
                "REJECT - Minimum required ({}) exceeds maximum capacity ({})",
                rupees(minimum),
                rupees(maximum)
            ),
            vec![
                format!("Minimum viable loan for risk profile: {}", rupees(minimum)),
                format!("Maximum capacity based on income and debt: {}", rupees(maximum)),
                format!("Gap: {}", rupees(minimum - maximum)),
                "Applicant cannot qualify for minimum economical loan amount".to_string(),
            ],
            vec![
                "Reduce existing debt to increase maximum capacity".to_string(),
                "Add a co-applicant to boost combined income".to_string(),
                "Improve credit score to reduce minimum requirement".to_string(),
                "Consider collateral-backed loan to lower minimum threshold".to_string(),
            ],
        )
    } else if requested < minimum {
        (
            ApprovalDecision::RejectBelowMinimum,
            format!(
                "REJECT - Requested amount ({}) below minimum threshold ({})",
                rupees(requested),
                rupees(minimum)
            ),
            vec![
                format!("Requested: {}", rupees(requested)),
                format!("Minimum required: {}", rupees(minimum)),
                format!("Shortfall: {}", rupees(minimum - requested)),
                "Amount too small to process economically for this risk profile".to_string(),
            ],
            vec![
                format!("Increase loan request to at least {}", rupees(minimum)),
                "Improve credit profile to qualify for lower minimums".to_string(),
                "Consider alternative lenders for micro-loans".to_string(),
            ],
        )
    } else if requested > maximum {
        let mut reasoning = vec![
            format!("Requested: {}", rupees(requested)),
            format!("Maximum safe exposure: {}", rupees(maximum)),
            format!("Recommended: {}", rupees(recommended)),
            format!("Reduction: {}", rupees(requested - recommended)),
        ];
        if debt_to_income > 30.0 {
            reasoning.push(format!(
                "High debt-to-income ratio ({:.1}%) limits capacity",
                debt_to_income
            ));
        }
        (
            ApprovalDecision::ApproveReduced,
            format!(
                "APPROVE {} (reduced from {})",
                rupees(recommended),
                rupees(requested)
            ),
            reasoning,
            vec![
                format!("Accept reduced amount of {}", rupees(recommended)),
                "Reduce existing debt to qualify for higher amount".to_string(),
                "Add co-applicant to increase borrowing capacity".to_string(),
            ],
        )
    } else {
        (
            ApprovalDecision::ApproveFull,
            format!("APPROVE {} as requested", rupees(requested)),
            vec![
                format!("Requested: {}", rupees(requested)),
                format!(
                    "Within safe range: {} - {}",
                    rupees(minimum),
                    rupees(maximum)
                ),
                "All eligibility criteria met".to_string(),
            ],
            vec![
                format!("Could potentially borrow up to {}", rupees(maximum)),
                "Maintain good payment history for future increases".to_string(),
            ],
        )
    };

    LoanRecommendation {
        minimum_loan_amount: minimum,
        maximum_loan_amount: maximum,
        recommended_loan_amount: recommended,
        requested_amount: requested,
        safe_loan_amount: safe,
        approval_decision: decision,
        actionable_decision: actionable,
        decision_reasoning: reasoning,
        alternative_options: alternatives,
        loan_range: format!("{} - {}", rupees(minimum), rupees(maximum)),
        viable: minimum <= maximum,
        annual_income: application.income,
    }
}
