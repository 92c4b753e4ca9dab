use credence_common::{LikelihoodMode, MentionWeights, ModelKind, ModelSpec, Result};
use rand::RngCore;

use super::{open_unit, BeliefModel};
use crate::numerics::{beta_binomial_log_pmf, beta_binomial_pmf, log1m_exp};

/// Per-statement mention correctness drawn from Beta(Alpha, Beta).
///
/// The domain is `Alpha, Beta > 0` with no upper bound; the log-gamma-ratio
/// form of the PMF stays finite for large shape parameters.
#[derive(Debug, Clone)]
pub struct BetaBinomial {
    mode: LikelihoodMode,
    weights: Option<MentionWeights>,
}

impl BetaBinomial {
    pub fn new(mode: LikelihoodMode, weights: Option<MentionWeights>) -> Self {
        Self { mode, weights }
    }
}

impl BeliefModel for BetaBinomial {
    fn spec(&self) -> ModelSpec {
        ModelSpec::new(ModelKind::BetaBinomial, self.mode)
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["Alpha", "Beta"]
    }

    fn weights(&self) -> Option<&MentionWeights> {
        self.weights.as_ref()
    }

    fn log_prior(&self, params: &[f64]) -> f64 {
        match params {
            [alpha, beta] if *alpha > 0.0 && *beta > 0.0 && alpha.is_finite() && beta.is_finite() => 0.0,
            _ => f64::NEG_INFINITY,
        }
    }

    fn observation_log_likelihood(&self, params: &[f64], num_mentions: u32, num_correct: u32) -> Result<f64> {
        self.check_params(params)?;
        let (alpha, beta) = (params[0], params[1]);
        match self.mode {
            LikelihoodMode::Evidence => beta_binomial_log_pmf(num_correct, num_mentions, alpha, beta),
            LikelihoodMode::Statement => {
                let lp_zero = beta_binomial_log_pmf(0, num_mentions, alpha, beta)?;
                Ok(if num_correct == 0 { lp_zero } else { log1m_exp(lp_zero) })
            }
        }
    }

    fn sample_from_prior(&self, rng: &mut dyn RngCore) -> Vec<f64> {
        vec![open_unit(rng), open_unit(rng)]
    }

    fn predict_k_of_n(&self, params: &[f64], num_mentions: u32) -> Result<Vec<f64>> {
        self.check_params(params)?;
        (0..=num_mentions)
            .map(|k| beta_binomial_pmf(k, num_mentions, params[0], params[1]))
            .collect()
    }

    fn predict_correct_given_n(&self, params: &[f64], mention_counts: &[u32]) -> Result<Vec<f64>> {
        self.check_params(params)?;
        mention_counts
            .iter()
            .map(|&n| Ok(-beta_binomial_log_pmf(0, n, params[0], params[1])?.exp_m1()))
            .collect()
    }
}
