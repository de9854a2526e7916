//! EMI calculation and tenure affordability search.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pricing::round2;

/// Candidate tenures in months, searched shortest first.
pub const TENURE_LADDER: [u32; 5] = [12, 24, 36, 48, 60];

/// EMI-to-income ratio used when there is no income to divide by.
const NO_INCOME_RATIO: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub enum EmiError {
    InvalidPrincipal(f64),
    InvalidTenure(u32),
    InvalidRate(f64),
}

impl fmt::Display for EmiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmiError::InvalidPrincipal(p) => write!(f, "invalid principal {}", p),
            EmiError::InvalidTenure(n) => write!(f, "invalid tenure {} months", n),
            EmiError::InvalidRate(r) => write!(f, "invalid interest rate {}", r),
        }
    }
}

impl std::error::Error for EmiError {}

/// Amortization figures for one principal/rate/tenure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmiBreakdown {
    pub emi: f64,
    pub total_amount: f64,
    pub total_interest: f64,
    pub principal: f64,
    pub interest_rate: f64,
    pub tenure_months: u32,
    pub tenure_years: f64,
}

/// Standard amortizing EMI: `P·r·(1+r)^N / ((1+r)^N − 1)`, or `P/N` at 0%.
///
/// `annual_rate` is a percentage (12.0 means 12% p.a.). Money fields are
/// rounded to two decimals; totals are derived from the unrounded EMI.
pub fn calculate_emi(principal: f64, annual_rate: f64, tenure_months: u32) -> Result<EmiBreakdown, EmiError> {
    if !principal.is_finite() || principal <= 0.0 {
        return Err(EmiError::InvalidPrincipal(principal));
    }
    if tenure_months == 0 {
        return Err(EmiError::InvalidTenure(tenure_months));
    }
    if !annual_rate.is_finite() || annual_rate < 0.0 {
        return Err(EmiError::InvalidRate(annual_rate));
    }

    let n = f64::from(tenure_months);
    let monthly_rate = annual_rate / 12.0 / 100.0;
    let emi = if monthly_rate == 0.0 {
        principal / n
    } else {
        let growth = (1.0 + monthly_rate).powi(tenure_months as i32);
        principal * monthly_rate * growth / (growth - 1.0)
    };
    let total_amount = emi * n;

    Ok(EmiBreakdown {
        emi: round2(emi),
        total_amount: round2(total_amount),
        total_interest: round2(total_amount - principal),
        principal: round2(principal),
        interest_rate: annual_rate,
        tenure_months,
        tenure_years: tenure_years(tenure_months),
    })
}

fn tenure_years(months: u32) -> f64 {
    (f64::from(months) / 12.0 * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Affordability {
    Comfortable,
    Manageable,
    Tight,
    Unaffordable,
}

impl Affordability {
    /// Classifies an EMI-to-monthly-income percentage.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio <= 40.0 {
            Affordability::Comfortable
        } else if ratio <= 50.0 {
            Affordability::Manageable
        } else if ratio <= 60.0 {
            Affordability::Tight
        } else {
            Affordability::Unaffordable
        }
    }

    pub fn is_affordable(&self) -> bool {
        matches!(self, Affordability::Comfortable | Affordability::Manageable)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmiOption {
    pub tenure_months: u32,
    pub tenure_years: f64,
    pub emi: f64,
    pub total_payment: f64,
    pub total_interest: f64,
    pub emi_to_income_ratio: f64,
    pub affordability: Affordability,
    pub recommended: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmiPlan {
    pub loan_amount: f64,
    pub interest_rate: f64,
    pub monthly_income: f64,
    pub recommended_emi: f64,
    pub recommended_tenure_months: u32,
    pub recommended_tenure_years: f64,
    pub emi_options: Vec<EmiOption>,
    pub affordability_status: Affordability,
    pub max_affordable_emi: f64,
    /// False when no tenure was affordable and the longest was picked.
    pub affordable_option_found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl EmiPlan {
    pub fn recommended_option(&self) -> Option<&EmiOption> {
        self.emi_options.iter().find(|o| o.recommended)
    }
}

/// Evaluates every tenure on the ladder and marks exactly one recommended:
/// the shortest Comfortable/Manageable tenure, else the longest.
pub fn plan_emi_options(loan_amount: f64, annual_rate: f64, annual_income: f64) -> Result<EmiPlan, EmiError> {
    let monthly_income = annual_income / 12.0;

    let mut options = TENURE_LADDER
        .iter()
        .map(|&tenure| {
            let breakdown = calculate_emi(loan_amount, annual_rate, tenure)?;
            let ratio = if monthly_income > 0.0 {
                breakdown.emi / monthly_income * 100.0
            } else {
                NO_INCOME_RATIO
            };
            Ok(EmiOption {
                tenure_months: tenure,
                tenure_years: breakdown.tenure_years,
                emi: breakdown.emi,
                total_payment: breakdown.total_amount,
                total_interest: breakdown.total_interest,
                emi_to_income_ratio: round2(ratio),
                affordability: Affordability::from_ratio(ratio),
                recommended: false,
            })
        })
        .collect::<Result<Vec<_>, EmiError>>()?;

    let first_affordable = options.iter().position(|o| o.affordability.is_affordable());
    let chosen = first_affordable.unwrap_or(options.len() - 1);
    options[chosen].recommended = true;

    let recommended = &options[chosen];
    Ok(EmiPlan {
        loan_amount,
        interest_rate: annual_rate,
        monthly_income: round2(monthly_income),
        recommended_emi: recommended.emi,
        recommended_tenure_months: recommended.tenure_months,
        recommended_tenure_years: recommended.tenure_years,
        affordability_status: recommended.affordability,
        max_affordable_emi: round2(monthly_income * 0.5),
        affordable_option_found: first_affordable.is_some(),
        note: None,
        emi_options: options,
    })
}
