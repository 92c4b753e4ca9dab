//! Belief for statements supported by several extraction sources.
//!
//! Each source `s` has its own random and systematic error rates. A statement
//! is wrong only if every source is wrong about it, so
//! `belief = 1 - Πₛ (systₛ + (1 - systₛ)·randₛ^nₛ)`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use credence_common::{CredenceError, Result, Statement};

use crate::model::BeliefModel;
use crate::sampler::{get_map_params, PosteriorSamples};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorRates {
    pub rand: f64,
    pub syst: f64,
}

impl ErrorRates {
    pub fn new(rand: f64, syst: f64) -> Result<Self> {
        let unit = 0.0..=1.0;
        if !unit.contains(&rand) || !unit.contains(&syst) {
            return Err(CredenceError::InvalidParameters {
                model: "random_systematic".to_string(),
                params: vec![rand, syst],
                reason: "error rates must lie in [0, 1]".to_string(),
            });
        }
        Ok(Self { rand, syst })
    }

    /// P(every one of `n` mentions from this source is wrong).
    fn miss(&self, num_mentions: u32) -> f64 {
        self.syst + (1.0 - self.syst) * self.rand.powf(f64::from(num_mentions))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceErrorRates {
    rates: BTreeMap<String, ErrorRates>,
}

impl SourceErrorRates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: &str, rates: ErrorRates) {
        self.rates.insert(source.to_string(), rates);
    }

    /// Take a source's rates from the MAP of a fitted random/systematic model.
    pub fn insert_from_fit(&mut self, source: &str, model: &dyn BeliefModel, samples: &PosteriorSamples) -> Result<()> {
        if model.param_names() != ["Rand", "Syst"].as_slice() {
            return Err(CredenceError::Config(format!(
                "{} has no random/systematic error rates",
                model.name()
            )));
        }
        let map = get_map_params(samples)?;
        self.insert(source, ErrorRates::new(map[0], map[1])?);
        Ok(())
    }

    pub fn get(&self, source: &str) -> Option<&ErrorRates> {
        self.rates.get(source)
    }

    /// Belief given mention counts per source. Zero without mentions.
    pub fn belief(&self, mentions: &BTreeMap<String, u32>) -> Result<f64> {
        let mut all_wrong = 1.0;
        let mut any = false;
        for (source, &n) in mentions {
            if n == 0 {
                continue;
            }
            let rates = self
                .rates
                .get(source)
                .ok_or_else(|| CredenceError::Config(format!("no error rates for source '{source}'")))?;
            all_wrong *= rates.miss(n);
            any = true;
        }
        Ok(if any { 1.0 - all_wrong } else { 0.0 })
    }

    pub fn statement_belief(&self, stmt: &Statement) -> Result<f64> {
        self.belief(&stmt.mentions_by_source())
    }

    /// `grid[i][j]` is the belief with `i` mentions from `source_a` and `j`
    /// from `source_b`, for `0..=max_mentions` each.
    pub fn belief_grid(&self, source_a: &str, source_b: &str, max_mentions: u32) -> Result<Vec<Vec<f64>>> {
        (0..=max_mentions)
            .map(|i| {
                (0..=max_mentions)
                    .map(|j| {
                        let mentions = BTreeMap::from([(source_a.to_string(), i), (source_b.to_string(), j)]);
                        self.belief(&mentions)
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RandomSystematic;
    use credence_common::{Evidence, LikelihoodMode};

    fn rates() -> SourceErrorRates {
        let mut rates = SourceErrorRates::new();
        rates.insert("source1", ErrorRates::new(0.4, 0.2).unwrap());
        rates.insert("source2", ErrorRates::new(0.3, 0.1).unwrap());
        rates
    }

    #[test]
    fn test_single_source_matches_model_belief() {
        let rates = rates();
        for n in 0..6 {
            let b = rates.belief(&BTreeMap::from([("source1".to_string(), n)])).unwrap();
            assert!((b - RandomSystematic::belief(n, 0.4, 0.2)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sources_combine() {
        let b = rates()
            .belief(&BTreeMap::from([("source1".to_string(), 1), ("source2".to_string(), 2)]))
            .unwrap();
        let miss1 = 0.2 + 0.8 * 0.4;
        let miss2 = 0.1 + 0.9 * 0.09;
        assert!((b - (1.0 - miss1 * miss2)).abs() < 1e-12);
    }

    #[test]
    fn test_grid() {
        let grid = rates().belief_grid("source1", "source2", 5).unwrap();
        assert_eq!(grid.len(), 6);
        assert_eq!(grid[0][0], 0.0);
        assert!(grid[5][5] > grid[1][1]);
        for row in &grid {
            for pair in row.windows(2) {
                assert!(pair[1] >= pair[0]);
            }
        }
    }

    #[test]
    fn test_unknown_source() {
        let stmt = Statement {
            id: 1,
            belief: 0.0,
            evidence: vec![Evidence {
                source_api: "medscan".to_string(),
                document_id: None,
                source_hash: 3,
            }],
        };
        assert!(matches!(rates().statement_belief(&stmt), Err(CredenceError::Config(_))));
    }

    #[test]
    fn test_rates_from_fit() {
        let model = RandomSystematic::new(LikelihoodMode::Statement, None);
        let samples = PosteriorSamples::new(
            vec!["Rand".into(), "Syst".into()],
            vec![vec![0.3, 0.05], vec![0.6, 0.2]],
            vec![-1.0, -4.0],
            2,
            vec![],
        )
        .unwrap();
        let mut rates = SourceErrorRates::new();
        rates.insert_from_fit("reach", &model, &samples).unwrap();
        assert_eq!(rates.get("reach"), Some(&ErrorRates { rand: 0.3, syst: 0.05 }));
    }
}
