use serde::{Deserialize, Serialize};

use crate::models::Application;

/// Scores above this are flagged for additional verification.
pub const FRAUD_THRESHOLD: f64 = 0.8;

// Indicator weights are tallied in tenths so the cap and threshold compare exactly.
const THRESHOLD_TENTHS: u32 = 8;
const MAX_TENTHS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAnalysis {
    /// Additive indicator score, capped at 1.0.
    pub fraud_score: f64,
    pub fraud_reasons: Vec<String>,
    pub is_fraud_risk: bool,
}

/// Runs the rule-based fraud indicators over an application.
pub fn detect(application: &Application) -> FraudAnalysis {
    let income = application.income;
    let mut tenths: u32 = 0;
    let mut reasons = Vec::new();

    if application.age < 25 && income > 1_000_000.0 {
        tenths += 3;
        reasons.push("Unrealistic income for age".to_string());
    }

    if income > 0.0 && application.loan_amount / income > 10.0 {
        tenths += 4;
        reasons.push("Extremely high loan-to-income ratio".to_string());
    }

    if application.credit_score < 500 && income > 500_000.0 {
        tenths += 2;
        reasons.push("Credit score-income mismatch".to_string());
    }

    if income > 100_000.0 && income % 100_000.0 == 0.0 {
        tenths += 1;
        reasons.push("Suspicious round income figure".to_string());
    }

    FraudAnalysis {
        fraud_score: f64::from(tenths.min(MAX_TENTHS)) / 10.0,
        fraud_reasons: reasons,
        is_fraud_risk: tenths > THRESHOLD_TENTHS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_application_has_no_indicators() {
        let analysis = detect(&Application::default());
        assert_eq!(analysis.fraud_score, 0.0);
        assert!(analysis.fraud_reasons.is_empty());
        assert!(!analysis.is_fraud_risk);
    }

    #[test]
    fn stacked_indicators_cap_score_and_flag_risk() {
        let application = Application {
            age: 22,
            income: 2_000_000.0,
            loan_amount: 25_000_000.0,
            credit_score: 450,
            ..Application::default()
        };
        let analysis = detect(&application);

        assert_eq!(analysis.fraud_score, 1.0);
        assert!(analysis.is_fraud_risk);
        assert_eq!(
            analysis.fraud_reasons,
            vec![
                "Unrealistic income for age",
                "Extremely high loan-to-income ratio",
                "Credit score-income mismatch",
                "Suspicious round income figure",
            ]
        );
    }

    #[test]
    fn score_at_threshold_is_not_a_risk() {
        let application = Application {
            age: 22,
            income: 2_000_000.0,
            loan_amount: 25_000_000.0,
            credit_score: 720,
            ..Application::default()
        };
        let analysis = detect(&application);

        assert_eq!(analysis.fraud_score, FRAUD_THRESHOLD);
        assert_eq!(analysis.fraud_reasons.len(), 3);
        assert!(!analysis.is_fraud_risk);
    }

    #[test]
    fn exactly_one_lakh_is_not_suspicious() {
        let application = Application {
            income: 100_000.0,
            ..Application::default()
        };
        assert!(detect(&application).fraud_reasons.is_empty());
    }
}
