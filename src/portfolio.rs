use serde::{Deserialize, Serialize};

use crate::models::Application;

/// Portfolio tier keyed off the blended score (30 / 60 thresholds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCategory {
    Prime,
    #[serde(rename = "Near-Prime")]
    NearPrime,
    #[serde(rename = "Sub-Prime")]
    SubPrime,
}

impl RiskCategory {
    pub fn from_score(score: f64) -> Self {
        if score <= 30.0 {
            RiskCategory::Prime
        } else if score <= 60.0 {
            RiskCategory::NearPrime
        } else {
            RiskCategory::SubPrime
        }
    }

    /// Fraction of income the portfolio will lend to this tier.
    pub fn exposure_multiplier(&self) -> f64 {
        match self {
            RiskCategory::Prime => 0.8,
            RiskCategory::NearPrime => 0.6,
            RiskCategory::SubPrime => 0.4,
        }
    }

    /// Smallest principal worth originating for this tier.
    pub fn base_minimum(&self) -> f64 {
        match self {
            RiskCategory::Prime => 50_000.0,
            RiskCategory::NearPrime => 100_000.0,
            RiskCategory::SubPrime => 150_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcentrationRisk {
    Low,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioInsight {
    pub risk_category: RiskCategory,
    pub max_recommended_exposure: f64,
    pub concentration_risk: ConcentrationRisk,
    pub portfolio_allocation: String,
}

pub fn insight(application: &Application, blended_score: f64) -> PortfolioInsight {
    let risk_category = RiskCategory::from_score(blended_score);
    let max_exposure = application.income * risk_category.exposure_multiplier();

    let concentration_risk = if application.loan_amount >= max_exposure {
        ConcentrationRisk::High
    } else {
        ConcentrationRisk::Low
    };

    PortfolioInsight {
        risk_category,
        max_recommended_exposure: max_exposure,
        concentration_risk,
        portfolio_allocation: format!("Max {}L exposure", (max_exposure / 100_000.0).trunc()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_follow_score_thresholds() {
        assert_eq!(RiskCategory::from_score(30.0), RiskCategory::Prime);
        assert_eq!(RiskCategory::from_score(30.01), RiskCategory::NearPrime);
        assert_eq!(RiskCategory::from_score(60.0), RiskCategory::NearPrime);
        assert_eq!(RiskCategory::from_score(120.0), RiskCategory::SubPrime);
        assert_eq!(RiskCategory::from_score(-5.0), RiskCategory::Prime);
    }

    #[test]
    fn exposure_and_concentration() {
        let application = Application {
            income: 500_000.0,
            loan_amount: 300_000.0,
            ..Application::default()
        };
        let insight = insight(&application, 45.0);

        assert_eq!(insight.max_recommended_exposure, 300_000.0);
        assert_eq!(insight.concentration_risk, ConcentrationRisk::High);
        assert_eq!(insight.portfolio_allocation, "Max 3L exposure");
    }

    #[test]
    fn category_serializes_with_hyphen() {
        assert_eq!(
            serde_json::to_value(RiskCategory::NearPrime).unwrap(),
            serde_json::json!("Near-Prime")
        );
    }
}
