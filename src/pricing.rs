use serde::{Deserialize, Serialize};

use crate::models::{Application, EmploymentType};

pub const BASE_RATE: f64 = 12.0;
pub const MIN_RATE: f64 = 8.0;
pub const MAX_RATE: f64 = 24.0;

/// Interest-rate quote with its additive breakdown (annual %, not monthly).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingQuote {
    pub base_rate: f64,
    pub final_rate: f64,
    pub risk_adjustment: f64,
    pub employment_adjustment: f64,
    pub amount_adjustment: f64,
}

/// Prices a loan from the blended score and the application profile.
///
/// The final rate is clamped to `[8, 24]` and rounded to two decimals.
pub fn quote(blended_score: f64, application: &Application) -> PricingQuote {
    let risk_adjustment = if blended_score <= 30.0 {
        -2.0
    } else if blended_score <= 60.0 {
        0.0
    } else {
        3.0
    };

    let employment_adjustment = match application.employment_type {
        EmploymentType::Salaried => -0.5,
        EmploymentType::SelfEmployed => 0.5,
        EmploymentType::Business => 0.0,
        EmploymentType::Freelancer => 1.0,
        EmploymentType::Unemployed => 2.0,
        EmploymentType::Other(_) => 0.0,
    };

    let amount_adjustment = if application.loan_amount > 1_000_000.0 {
        0.5
    } else {
        0.0
    };

    let raw = BASE_RATE + risk_adjustment + employment_adjustment + amount_adjustment;

    PricingQuote {
        base_rate: BASE_RATE,
        final_rate: round2(raw.clamp(MIN_RATE, MAX_RATE)),
        risk_adjustment,
        employment_adjustment,
        amount_adjustment,
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_risk_salaried_gets_discount() {
        let quote = quote(20.0, &Application::default());
        assert_eq!(quote.risk_adjustment, -2.0);
        assert_eq!(quote.employment_adjustment, -0.5);
        assert_eq!(quote.final_rate, 9.5);
    }

    #[test]
    fn high_risk_unemployed_large_loan_stacks_premiums() {
        let application = Application {
            employment_type: EmploymentType::Unemployed,
            loan_amount: 2_000_000.0,
            ..Application::default()
        };
        let quote = quote(85.0, &application);
        assert_eq!(quote.final_rate, 17.5);
        assert_eq!(quote.amount_adjustment, 0.5);
    }

    #[test]
    fn unknown_employment_is_neutral() {
        let application = Application {
            employment_type: EmploymentType::Other("Contractor".to_string()),
            ..Application::default()
        };
        assert_eq!(quote(45.0, &application).final_rate, 12.0);
    }
}
