use serde::{Deserialize, Serialize};

/// Quality tier of a fetched wallet profile.
///
/// Quality only drives cache TTL selection; it is a credit-saving signal,
/// not a correctness measure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Quality {
    High,
    Medium,
    Low,
}

/// Score cutoffs mapping a provider-reported score to a [`Quality`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreThresholds {
    pub high: f64,
    pub medium: f64,
}

pub fn quality_for_score(score: f64, thresholds: &ScoreThresholds) -> Quality {
    if score >= thresholds.high {
        Quality::High
    } else if score >= thresholds.medium {
        Quality::Medium
    } else {
        Quality::Low
    }
}

/// An interesting wallet as published to the read model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletProfile {
    pub address: String,
    pub score: f64,
    pub quality: Quality,
    #[serde(rename = "observedAtMillis")]
    pub observed_at_millis: u64,
}

impl WalletProfile {
    pub fn new(address: &str, score: f64, quality: Quality, observed_at_millis: u64) -> Self {
        Self {
            address: address.to_string(),
            score,
            quality,
            observed_at_millis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_maps_through_thresholds() {
        let thresholds = ScoreThresholds {
            high: 80.0,
            medium: 50.0,
        };
        assert_eq!(quality_for_score(92.5, &thresholds), Quality::High);
        assert_eq!(quality_for_score(80.0, &thresholds), Quality::High);
        assert_eq!(quality_for_score(64.0, &thresholds), Quality::Medium);
        assert_eq!(quality_for_score(12.0, &thresholds), Quality::Low);
    }
}
