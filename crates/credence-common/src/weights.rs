//! Mention-count weight table.
//! Holds the empirical distribution of mention counts in the corpus, used to
//! re-weight likelihood contributions and to aggregate predictive uncertainty.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CredenceError, Result};

/// Probability of each mention count. Weights sum to 1.0 once normalised.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MentionWeights {
    probs: BTreeMap<u32, f64>,
}

impl MentionWeights {
    pub fn new(probs: BTreeMap<u32, f64>) -> Self {
        Self { probs }
    }

    /// Equal weight for every count in `1..=max_mentions`.
    pub fn uniform(max_mentions: u32) -> Self {
        let w = 1.0 / f64::from(max_mentions.max(1));
        Self {
            probs: (1..=max_mentions).map(|n| (n, w)).collect(),
        }
    }

    /// Normalised distribution from raw statement counts.
    pub fn from_counts(counts: &BTreeMap<u32, usize>) -> Result<Self> {
        let total: usize = counts.values().sum();
        if total == 0 {
            return Err(CredenceError::InvalidData(
                "cannot build mention weights from zero counts".to_string(),
            ));
        }
        Ok(Self {
            probs: counts
                .iter()
                .map(|(&n, &c)| (n, c as f64 / total as f64))
                .collect(),
        })
    }

    /// Weight for a mention count; absent counts are an error.
    pub fn get(&self, num_mentions: u32) -> Result<f64> {
        self.probs
            .get(&num_mentions)
            .copied()
            .ok_or(CredenceError::MissingWeight { num_mentions })
    }

    /// Weight for a mention count, 0.0 when absent.
    pub fn get_or_zero(&self, num_mentions: u32) -> f64 {
        self.probs.get(&num_mentions).copied().unwrap_or(0.0)
    }

    /// Validate that all weights are non-negative and sum to ~1.0
    pub fn validate(&self) -> bool {
        let sum: f64 = self.probs.values().sum();
        self.probs.values().all(|&w| w >= 0.0 && w.is_finite()) && (sum - 1.0).abs() < 1e-6
    }

    /// Renormalise weights so they sum to 1.0
    pub fn normalise(&mut self) {
        let sum: f64 = self.probs.values().sum();
        if sum > 0.0 {
            for w in self.probs.values_mut() {
                *w /= sum;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.probs.iter().map(|(&n, &w)| (n, w))
    }

    pub fn len(&self) -> usize {
        self.probs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }

    /// Load a `{"1": 0.42, "2": 0.17, ...}` distribution file.
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_weights_sum_to_one() {
        let w = MentionWeights::uniform(10);
        assert!(w.validate(), "Uniform weights must sum to 1.0");
        assert!((w.get(3).unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_normalise_restores_sum() {
        let mut w = MentionWeights::new(BTreeMap::from([(1, 3.0), (2, 1.0)]));
        assert!(!w.validate());
        w.normalise();
        assert!(w.validate());
        assert!((w.get(1).unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_missing_weight_is_an_error() {
        let w = MentionWeights::uniform(2);
        assert!(matches!(
            w.get(5),
            Err(CredenceError::MissingWeight { num_mentions: 5 })
        ));
        assert_eq!(w.get_or_zero(5), 0.0);
    }

    #[test]
    fn test_from_counts() {
        let w = MentionWeights::from_counts(&BTreeMap::from([(1, 6), (2, 3), (3, 1)])).unwrap();
        assert!(w.validate());
        assert!((w.get(2).unwrap() - 0.3).abs() < 1e-12);
        assert!(MentionWeights::from_counts(&BTreeMap::new()).is_err());
    }

    #[test]
    fn test_json_keys_are_integers() {
        let w: MentionWeights = serde_json::from_str(r#"{"1": 0.5, "2": 0.5}"#).unwrap();
        assert_eq!(w.len(), 2);
        assert!(w.validate());
    }
}
