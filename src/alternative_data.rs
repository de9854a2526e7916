//! Alternative-data signals (social sentiment, app usage, utility payments,
//! e-commerce behaviour).
//!
//! No external feed is wired in yet; [`SimulatedAlternativeData`] stands in
//! behind the same [`AlternativeDataProvider`] seam a real integration would
//! implement, and [`FixedAlternativeData`] gives tests exact values.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::Application;

/// Four independent signals in `[0, 1]`; higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlternativeDataSignals {
    pub social_sentiment: f64,
    pub app_usage: f64,
    pub utility_payments: f64,
    pub ecommerce_behavior: f64,
}

impl AlternativeDataSignals {
    /// Mean of the four signals.
    pub fn composite(&self) -> f64 {
        (self.social_sentiment + self.app_usage + self.utility_payments + self.ecommerce_behavior)
            / 4.0
    }
}

pub trait AlternativeDataProvider: Send + Sync {
    fn signals(&self, application: &Application) -> AlternativeDataSignals;
}

/// Draws each signal uniformly from a fixed plausible range.
///
/// With a seed, draws are keyed on the seed and the application so repeated
/// requests for the same applicant see the same signals.
#[derive(Debug, Clone, Default)]
pub struct SimulatedAlternativeData {
    seed: Option<u64>,
}

impl SimulatedAlternativeData {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }

    fn draw<R: Rng>(rng: &mut R) -> AlternativeDataSignals {
        AlternativeDataSignals {
            social_sentiment: rng.gen_range(0.3..0.9),
            app_usage: rng.gen_range(0.4..0.95),
            utility_payments: rng.gen_range(0.5..1.0),
            ecommerce_behavior: rng.gen_range(0.3..0.9),
        }
    }
}

impl AlternativeDataProvider for SimulatedAlternativeData {
    fn signals(&self, application: &Application) -> AlternativeDataSignals {
        match self.seed {
            Some(seed) => {
                let mut hasher = Sha256::new();
                hasher.update(seed.to_le_bytes());
                hasher.update(serde_json::to_vec(application).unwrap_or_default());
                let digest: [u8; 32] = hasher.finalize().into();
                Self::draw(&mut StdRng::from_seed(digest))
            }
            None => Self::draw(&mut rand::thread_rng()),
        }
    }
}

/// Returns the same signals for every application.
#[derive(Debug, Clone, Copy)]
pub struct FixedAlternativeData(pub AlternativeDataSignals);

impl FixedAlternativeData {
    /// All four signals set to `value`.
    pub fn uniform(value: f64) -> Self {
        Self(AlternativeDataSignals {
            social_sentiment: value,
            app_usage: value,
            utility_payments: value,
            ecommerce_behavior: value,
        })
    }
}

impl AlternativeDataProvider for FixedAlternativeData {
    fn signals(&self, _application: &Application) -> AlternativeDataSignals {
        self.0
    }
}
