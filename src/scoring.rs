//! Hybrid scoring pipeline.
//!
//! Runs the rule engine, classifier and alternative-data provider, blends
//! them into one risk score, then derives pricing, portfolio exposure, the
//! loan recommendation and EMI options from that score. The engine holds
//! only read-only shared state and is safe to call from many requests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alternative_data::{AlternativeDataProvider, AlternativeDataSignals};
use crate::classifier::Classifier;
use crate::emi::{self, EmiPlan};
use crate::errors::AppError;
use crate::features::FeatureNormalizer;
use crate::fraud::{self, FraudAnalysis};
use crate::loan::{self, LoanRecommendation};
use crate::models::{Application, EmploymentType};
use crate::portfolio::{self, PortfolioInsight};
use crate::pricing::{self, PricingQuote};
use crate::rules;
use crate::statement::{self, StatementAnalysis, StatementMetadata};

pub const RULE_WEIGHT: f64 = 0.4;
pub const MODEL_WEIGHT: f64 = 0.4;
pub const ALTERNATIVE_DATA_WEIGHT: f64 = 0.2;

/// Principal used for the reference EMI when nothing was requested.
const REFERENCE_PRINCIPAL: f64 = 50_000.0;
const REFERENCE_EMI_NOTE: &str = "EMI calculated for reference only - loan not approved";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Medium Risk")]
    Medium,
    #[serde(rename = "High Risk")]
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score <= 30.0 {
            RiskLevel::Low
        } else if score <= 60.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::Medium => "Medium Risk",
            RiskLevel::High => "High Risk",
        }
    }
}

/// Weighted blend of the three risk signals; higher is riskier.
///
/// Not clamped: strongly negative rule scores can push it below 0 and
/// statement adjustments can push it past 100.
pub fn blend(rule_score: i32, default_probability: f64, alternative_composite: f64) -> f64 {
    f64::from(rule_score) * RULE_WEIGHT
        + default_probability * 100.0 * MODEL_WEIGHT
        + (1.0 - alternative_composite) * 100.0 * ALTERNATIVE_DATA_WEIGHT
}

/// Employment stability scaled by an experience factor that peaks at 30.
pub fn income_stability(application: &Application) -> f64 {
    let base = match application.employment_type {
        EmploymentType::Salaried => 0.9,
        EmploymentType::SelfEmployed => 0.6,
        EmploymentType::Business => 0.7,
        EmploymentType::Freelancer => 0.4,
        EmploymentType::Unemployed => 0.1,
        EmploymentType::Other(_) => 0.5,
    };
    base * (f64::from(application.age) / 30.0).min(1.0)
}

/// Full scoring outcome for one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub enhanced_score: f64,
    pub risk: RiskLevel,
    pub rule_score: i32,
    pub ai_score: f64,
    pub alternative_data_score: f64,
    pub alternative_data: AlternativeDataSignals,
    pub income_stability: f64,
    pub fraud_analysis: FraudAnalysis,
    pub dynamic_pricing: PricingQuote,
    pub portfolio_insights: PortfolioInsight,
    pub loan_amount_recommendation: LoanRecommendation,
    pub emi_details: EmiPlan,
    pub reasons: Vec<String>,
    pub recommendations: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub model_version: String,
}

pub struct ScoringEngine {
    classifier: Arc<dyn Classifier>,
    normalizer: FeatureNormalizer,
    alternative_data: Arc<dyn AlternativeDataProvider>,
}

impl ScoringEngine {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        alternative_data: Arc<dyn AlternativeDataProvider>,
    ) -> Self {
        let normalizer = FeatureNormalizer::new(classifier.feature_names());
        Self {
            classifier,
            normalizer,
            alternative_data,
        }
    }

    pub fn model_version(&self) -> &str {
        self.classifier.model_version()
    }

    pub fn feature_names(&self) -> &[String] {
        self.normalizer.schema()
    }

    /// Scores an application.
    ///
    /// # Errors
    ///
    /// `AppError::ScoringFailed` when the classifier rejects the feature
    /// vector or the EMI search receives degenerate inputs. No partial
    /// result is produced.
    pub fn score(&self, application: &Application) -> Result<ScoringResult, AppError> {
        let signals = self.alternative_data.signals(application);
        let alternative_score = signals.composite();
        let fraud_analysis = fraud::detect(application);
        let stability = income_stability(application);

        let rule_score = rules::evaluate(application);

        let features = self.normalizer.normalize(application);
        let default_probability = self.classifier.predict_default_probability(&features)?;

        let enhanced_score = blend(rule_score.score, default_probability, alternative_score);
        let risk = RiskLevel::from_score(enhanced_score);
        debug!(
            rule_score = rule_score.score,
            default_probability,
            alternative_score,
            enhanced_score,
            "Blended risk score"
        );

        let dynamic_pricing = pricing::quote(enhanced_score, application);
        let portfolio_insights = portfolio::insight(application, enhanced_score);
        let loan_amount_recommendation = loan::recommend(
            application,
            enhanced_score,
            portfolio_insights.max_recommended_exposure,
        );
        let emi_details = emi_plan(
            application,
            &loan_amount_recommendation,
            dynamic_pricing.final_rate,
        )?;

        let recommendations = recommendations(
            application,
            enhanced_score,
            &fraud_analysis,
            alternative_score,
        );

        Ok(ScoringResult {
            enhanced_score,
            risk,
            rule_score: rule_score.score,
            ai_score: default_probability,
            alternative_data_score: alternative_score,
            alternative_data: signals,
            income_stability: stability,
            fraud_analysis,
            dynamic_pricing,
            portfolio_insights,
            loan_amount_recommendation,
            emi_details,
            reasons: rule_score.reasons,
            recommendations,
            timestamp: Utc::now(),
            model_version: self.classifier.model_version().to_string(),
        })
    }

    /// Scores an application after verifying it against a bank statement.
    ///
    /// The pipeline runs on the enriched application; the statement risk
    /// and income discrepancy adjustments are applied to the result.
    pub fn score_with_statement(
        &self,
        application: &Application,
        analysis: &StatementAnalysis,
    ) -> Result<(ScoringResult, StatementMetadata), AppError> {
        let (enriched, metadata) = statement::enrich_application(application, analysis);
        debug!(
            declared_income = application.income,
            verified_income = enriched.income,
            existing_debt = enriched.existing_debt,
            "Application enriched from statement"
        );

        let result = self.score(&enriched)?;
        let adjusted = apply_statement_adjustments(
            result,
            application.income,
            analysis.record.monthly_income_estimate,
            &metadata,
        );
        Ok((adjusted, metadata))
    }
}

/// EMI options for the recommended amount, or a reference plan on the
/// requested amount when the recommendation is not viable.
fn emi_plan(
    application: &Application,
    recommendation: &LoanRecommendation,
    rate: f64,
) -> Result<EmiPlan, AppError> {
    let income = recommendation.annual_income;

    if recommendation.recommended_loan_amount > 0.0 && recommendation.viable {
        let mut plan = emi::plan_emi_options(recommendation.recommended_loan_amount, rate, income)?;
        if !recommendation.approval_decision.is_approved() {
            plan.note = Some(REFERENCE_EMI_NOTE.to_string());
        }
        return Ok(plan);
    }

    let principal = if application.loan_amount > 0.0 {
        application.loan_amount
    } else {
        REFERENCE_PRINCIPAL
    };
    let mut plan = emi::plan_emi_options(principal, rate, income)?;
    plan.note = Some(REFERENCE_EMI_NOTE.to_string());
    Ok(plan)
}

fn recommendations(
    application: &Application,
    enhanced_score: f64,
    fraud_analysis: &FraudAnalysis,
    alternative_score: f64,
) -> Vec<String> {
    let mut out = Vec::new();
    let debt_to_income = application.debt_to_income_ratio();

    if enhanced_score > 70.0 {
        out.push("Reduce loan amount");
    }
    if application.credit_score < 600 {
        out.push("Require collateral");
    }
    if application.loan_to_income_ratio() > 40.0 {
        out.push("Ask for guarantor");
    }
    if application.employment_type != EmploymentType::Salaried {
        out.push("Consider co-applicant");
    }
    if debt_to_income > 50.0 {
        out.push("Require debt consolidation plan");
    } else if debt_to_income > 30.0 {
        out.push("Consider debt-to-income improvement");
    }
    if fraud_analysis.is_fraud_risk {
        out.push("Additional verification required");
    }
    if alternative_score < 0.5 {
        out.push("Request additional documentation");
    }

    out.into_iter().map(String::from).collect()
}

/// Statement-driven corrections applied after the pipeline has run.
///
/// A statement risk score above 50 adds 30% of it (capped at 100); a gap
/// between declared and verified income above 20% adds a flat 15. The risk
/// label is then recomputed from the adjusted score.
pub fn apply_statement_adjustments(
    mut result: ScoringResult,
    declared_income: f64,
    verified_income: f64,
    metadata: &StatementMetadata,
) -> ScoringResult {
    let statement_risk = metadata.statement_risk_score;
    if statement_risk > 50 {
        result.enhanced_score = (result.enhanced_score + f64::from(statement_risk) * 0.3).min(100.0);
        result.reasons.push(format!(
            "Bank statement shows high risk indicators ({}/100)",
            statement_risk
        ));
    }

    if declared_income > 0.0 && (verified_income - declared_income).abs() > declared_income * 0.2 {
        result.enhanced_score += 15.0;
        result
            .recommendations
            .push("Income verification discrepancy - additional documentation required".to_string());
    }

    result.risk = RiskLevel::from_score(result.enhanced_score);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_weights() {
        assert!((blend(45, 0.5, 0.5) - 48.0).abs() < 1e-9);
        assert!((blend(-20, 0.0, 1.0) - (-8.0)).abs() < 1e-9);
    }

    #[test]
    fn risk_thresholds_are_inclusive() {
        assert_eq!(RiskLevel::from_score(30.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(60.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(60.5), RiskLevel::High);
    }

    #[test]
    fn stability_scales_with_age() {
        let young = Application {
            age: 15,
            ..Application::default()
        };
        let older = Application {
            age: 45,
            employment_type: EmploymentType::Freelancer,
            ..Application::default()
        };
        assert!((income_stability(&young) - 0.45).abs() < 1e-9);
        assert!((income_stability(&older) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn recommendations_follow_fixed_order() {
        let application = Application {
            income: 20_000.0,
            loan_amount: 500_000.0,
            credit_score: 550,
            existing_debt: 15_000.0,
            employment_type: EmploymentType::Freelancer,
            ..Application::default()
        };
        let fraud = fraud::detect(&application);
        let recs = recommendations(&application, 80.0, &fraud, 0.4);

        assert_eq!(
            recs,
            vec![
                "Reduce loan amount",
                "Require collateral",
                "Ask for guarantor",
                "Consider co-applicant",
                "Require debt consolidation plan",
                "Request additional documentation",
            ]
        );
    }
}
