//! Additive business-rule score.
//!
//! Each rule inspects the application and either triggers (contributing a
//! signed delta and a reason) or is skipped. The engine folds the rules in
//! a fixed order, so the total is order-independent but the reasons list
//! always reads rule 1 through rule 5.

use serde::Serialize;

use crate::models::{Application, EmploymentType};

/// Result of evaluating a single rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    Triggered { delta: i32, reason: &'static str },
    Skipped,
}

impl RuleOutcome {
    fn triggered(delta: i32, reason: &'static str) -> Self {
        RuleOutcome::Triggered { delta, reason }
    }
}

/// Aggregated rule score. No floor or ceiling is applied here.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuleScore {
    pub score: i32,
    pub reasons: Vec<String>,
}

type Rule = fn(&Application) -> RuleOutcome;

const RULES: [Rule; 5] = [
    credit_score_rule,
    loan_to_income_rule,
    employment_rule,
    low_income_rule,
    existing_debt_rule,
];

/// Evaluates every rule in order and folds the outcomes.
pub fn evaluate(application: &Application) -> RuleScore {
    RULES
        .iter()
        .map(|rule| rule(application))
        .fold(RuleScore::default(), |mut acc, outcome| {
            if let RuleOutcome::Triggered { delta, reason } = outcome {
                acc.score += delta;
                acc.reasons.push(reason.to_string());
            }
            acc
        })
}

pub fn credit_score_rule(application: &Application) -> RuleOutcome {
    if application.credit_score < 600 {
        RuleOutcome::triggered(50, "Credit score below 600")
    } else if application.credit_score < 700 {
        RuleOutcome::triggered(25, "Below average credit score")
    } else {
        RuleOutcome::Skipped
    }
}

pub fn loan_to_income_rule(application: &Application) -> RuleOutcome {
    if application.loan_to_income_ratio() > 40.0 {
        RuleOutcome::triggered(30, "High loan-to-income ratio")
    } else {
        RuleOutcome::Skipped
    }
}

/// Only salaried applicants get a stability discount.
pub fn employment_rule(application: &Application) -> RuleOutcome {
    if application.employment_type == EmploymentType::Salaried {
        RuleOutcome::triggered(-20, "Stable employment reduces risk")
    } else {
        RuleOutcome::Skipped
    }
}

pub fn low_income_rule(application: &Application) -> RuleOutcome {
    if application.income < 25_000.0 {
        RuleOutcome::triggered(40, "Low income")
    } else {
        RuleOutcome::Skipped
    }
}

pub fn existing_debt_rule(application: &Application) -> RuleOutcome {
    let debt_to_income = application.debt_to_income_ratio();
    if debt_to_income > 50.0 {
        RuleOutcome::triggered(35, "High existing debt-to-income ratio")
    } else if debt_to_income > 30.0 {
        RuleOutcome::triggered(20, "Moderate existing debt-to-income ratio")
    } else if application.existing_debt > 0.0 {
        RuleOutcome::triggered(5, "Some existing debt")
    } else {
        RuleOutcome::Skipped
    }
}
