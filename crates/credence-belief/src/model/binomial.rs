use credence_common::{LikelihoodMode, MentionWeights, ModelKind, ModelSpec, Result};
use rand::RngCore;

use super::{open_unit, BeliefModel};
use crate::numerics::{binomial_log_pmf, binomial_pmf, log1m_exp};

/// Every mention is independently correct with probability `p`.
#[derive(Debug, Clone)]
pub struct Binomial {
    mode: LikelihoodMode,
    weights: Option<MentionWeights>,
}

impl Binomial {
    pub fn new(mode: LikelihoodMode, weights: Option<MentionWeights>) -> Self {
        Self { mode, weights }
    }

    /// ln P(all `n` mentions incorrect) = n·ln(1 - p)
    fn log_all_incorrect(p: f64, num_mentions: u32) -> f64 {
        if num_mentions == 0 {
            return 0.0;
        }
        f64::from(num_mentions) * (-p).ln_1p()
    }
}

impl BeliefModel for Binomial {
    fn spec(&self) -> ModelSpec {
        ModelSpec::new(ModelKind::Binomial, self.mode)
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["p"]
    }

    fn weights(&self) -> Option<&MentionWeights> {
        self.weights.as_ref()
    }

    fn log_prior(&self, params: &[f64]) -> f64 {
        match params {
            [p] if (0.0..=1.0).contains(p) => 0.0,
            _ => f64::NEG_INFINITY,
        }
    }

    fn observation_log_likelihood(&self, params: &[f64], num_mentions: u32, num_correct: u32) -> Result<f64> {
        self.check_params(params)?;
        let p = params[0];
        match self.mode {
            LikelihoodMode::Evidence => binomial_log_pmf(num_correct, num_mentions, p),
            LikelihoodMode::Statement => {
                let lp_zero = Self::log_all_incorrect(p, num_mentions);
                Ok(if num_correct == 0 { lp_zero } else { log1m_exp(lp_zero) })
            }
        }
    }

    fn sample_from_prior(&self, rng: &mut dyn RngCore) -> Vec<f64> {
        vec![open_unit(rng)]
    }

    fn predict_k_of_n(&self, params: &[f64], num_mentions: u32) -> Result<Vec<f64>> {
        self.check_params(params)?;
        (0..=num_mentions)
            .map(|k| binomial_pmf(k, num_mentions, params[0]))
            .collect()
    }

    fn predict_correct_given_n(&self, params: &[f64], mention_counts: &[u32]) -> Result<Vec<f64>> {
        self.check_params(params)?;
        let p = params[0];
        Ok(mention_counts
            .iter()
            .map(|&n| 1.0 - (1.0 - p).powf(f64::from(n)))
            .collect())
    }
}
