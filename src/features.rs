//! Feature normalization for the default-probability classifier.
//!
//! Turns an [`Application`] into a numeric vector ordered exactly as the
//! classifier's training schema. Numeric fields pass through, the existing
//! debt is additionally bucketed, and categoricals are one-hot expanded as
//! `<field>_<value>`. Columns the application cannot produce are zero.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::Application;

/// Debt bucket width used for the `existing_credits` column.
pub const EXISTING_CREDIT_BUCKET: f64 = 50_000.0;
/// Highest bucket index; larger debts collapse into it.
pub const MAX_EXISTING_CREDIT_BUCKET: f64 = 4.0;

/// Bucket index for an existing debt figure: `min(floor(debt / 50000), 4)`.
pub fn existing_credit_bucket(existing_debt: f64) -> f64 {
    (existing_debt.max(0.0) / EXISTING_CREDIT_BUCKET)
        .floor()
        .min(MAX_EXISTING_CREDIT_BUCKET)
}

/// Projects applications onto a fixed feature schema.
#[derive(Debug, Clone)]
pub struct FeatureNormalizer {
    schema: Arc<[String]>,
}

impl FeatureNormalizer {
    pub fn new(schema: &[String]) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    /// Produces the feature vector in schema order.
    pub fn normalize(&self, application: &Application) -> Vec<f64> {
        let candidates = candidate_columns(application);
        self.schema
            .iter()
            .map(|name| candidates.get(name.as_str()).copied().unwrap_or(0.0))
            .collect()
    }
}

/// Every column this application can populate, keyed by column name.
fn candidate_columns(application: &Application) -> BTreeMap<String, f64> {
    let mut columns = BTreeMap::new();

    columns.insert("age".to_string(), f64::from(application.age));
    columns.insert("income".to_string(), application.income);
    columns.insert("loan_amount".to_string(), application.loan_amount);
    columns.insert("credit_score".to_string(), f64::from(application.credit_score));
    columns.insert("existing_debt".to_string(), application.existing_debt);
    columns.insert(
        "existing_credits".to_string(),
        existing_credit_bucket(application.existing_debt),
    );

    if let Some(years) = application.years_in_business {
        columns.insert("years_in_business".to_string(), f64::from(years));
    }
    if let Some(monthly) = application.monthly_income {
        columns.insert("monthly_income".to_string(), monthly);
    }
    if let Some(age) = application.bank_account_age {
        columns.insert("bank_account_age".to_string(), f64::from(age));
    }

    columns.insert(
        format!("employment_type_{}", application.employment_type.label()),
        1.0,
    );
    if let Some(business) = &application.business_type {
        columns.insert(format!("business_type_{}", business), 1.0);
    }

    columns
}
