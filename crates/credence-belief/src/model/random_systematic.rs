use credence_common::{LikelihoodMode, MentionWeights, ModelKind, ModelSpec, Result};
use rand::RngCore;

use super::{open_unit, BeliefModel};
use crate::numerics::{binomial_log_pmf, binomial_pmf};

/// Random/systematic error model.
///
/// `Syst` (ps) is a per-source error floor; `Rand` (pr) is a per-mention
/// random error rate that independent mentions drive down. A statement is
/// wrong with probability `ps + (1 - ps)·prⁿ`.
#[derive(Debug, Clone)]
pub struct RandomSystematic {
    mode: LikelihoodMode,
    weights: Option<MentionWeights>,
}

impl RandomSystematic {
    pub fn new(mode: LikelihoodMode, weights: Option<MentionWeights>) -> Self {
        Self { mode, weights }
    }

    /// Probability that a statement with `n` mentions is correct.
    pub fn belief(num_mentions: u32, rand: f64, syst: f64) -> f64 {
        (1.0 - syst) * (1.0 - rand.powf(f64::from(num_mentions)))
    }

    fn miss_probability(num_mentions: u32, rand: f64, syst: f64) -> f64 {
        syst + (1.0 - syst) * rand.powf(f64::from(num_mentions))
    }
}

impl BeliefModel for RandomSystematic {
    fn spec(&self) -> ModelSpec {
        ModelSpec::new(ModelKind::RandomSystematic, self.mode)
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["Rand", "Syst"]
    }

    fn weights(&self) -> Option<&MentionWeights> {
        self.weights.as_ref()
    }

    fn log_prior(&self, params: &[f64]) -> f64 {
        let unit = 0.0..=1.0;
        match params {
            [pr, ps] if unit.contains(pr) && unit.contains(ps) => 0.0,
            _ => f64::NEG_INFINITY,
        }
    }

    fn observation_log_likelihood(&self, params: &[f64], num_mentions: u32, num_correct: u32) -> Result<f64> {
        self.check_params(params)?;
        let (pr, ps) = (params[0], params[1]);
        if num_correct == 0 {
            return Ok(Self::miss_probability(num_mentions, pr, ps).ln());
        }
        match self.mode {
            LikelihoodMode::Statement => Ok(Self::belief(num_mentions, pr, ps).ln()),
            LikelihoodMode::Evidence => {
                Ok((-ps).ln_1p() + binomial_log_pmf(num_correct, num_mentions, 1.0 - pr)?)
            }
        }
    }

    fn sample_from_prior(&self, rng: &mut dyn RngCore) -> Vec<f64> {
        vec![open_unit(rng), open_unit(rng)]
    }

    fn predict_k_of_n(&self, params: &[f64], num_mentions: u32) -> Result<Vec<f64>> {
        self.check_params(params)?;
        let (pr, ps) = (params[0], params[1]);
        let mut probs = Vec::with_capacity(num_mentions as usize + 1);
        probs.push(Self::miss_probability(num_mentions, pr, ps));
        for k in 1..=num_mentions {
            probs.push((1.0 - ps) * binomial_pmf(k, num_mentions, 1.0 - pr)?);
        }
        Ok(probs)
    }

    fn predict_correct_given_n(&self, params: &[f64], mention_counts: &[u32]) -> Result<Vec<f64>> {
        self.check_params(params)?;
        Ok(mention_counts
            .iter()
            .map(|&n| Self::belief(n, params[0], params[1]))
            .collect())
    }
}
