//! Belief model family.
//!
//! Every model maps a parameter vector to the probability that a statement
//! with `n` mentions is correct. Models are closed over three kinds
//! ([`ModelKind`]) and two likelihood modes ([`LikelihoodMode`]); the
//! concrete struct is picked once from a [`ModelSpec`] by [`build_model`].

mod beta_binomial;
mod binomial;
mod random_systematic;

pub use beta_binomial::BetaBinomial;
pub use binomial::Binomial;
pub use random_systematic::RandomSystematic;

use credence_common::{
    CorrectnessData, CredenceError, LikelihoodMode, MentionWeights, ModelKind, ModelSpec, Result,
};
use rand::RngCore;

pub trait BeliefModel: Send + Sync {
    fn spec(&self) -> ModelSpec;

    fn param_names(&self) -> &'static [&'static str];

    /// Mention-count weights applied to the likelihood, if any.
    fn weights(&self) -> Option<&MentionWeights>;

    /// Flat inside the parameter domain, `-inf` outside.
    fn log_prior(&self, params: &[f64]) -> f64;

    /// Log-likelihood of one statement with `num_correct` of `num_mentions`
    /// mentions judged correct. Parameters are checked like in
    /// `log_likelihood`.
    fn observation_log_likelihood(&self, params: &[f64], num_mentions: u32, num_correct: u32) -> Result<f64>;

    /// One draw per parameter from the open interval (0, 1).
    fn sample_from_prior(&self, rng: &mut dyn RngCore) -> Vec<f64>;

    /// P(k of n mentions correct) for `k = 0..=n`.
    fn predict_k_of_n(&self, params: &[f64], num_mentions: u32) -> Result<Vec<f64>>;

    /// P(statement correct) for each mention count.
    fn predict_correct_given_n(&self, params: &[f64], mention_counts: &[u32]) -> Result<Vec<f64>>;

    fn name(&self) -> String {
        self.spec().label()
    }

    fn ndim(&self) -> usize {
        self.param_names().len()
    }

    fn mode(&self) -> LikelihoodMode {
        self.spec().mode
    }

    /// Reject parameter vectors of the wrong length or outside the domain.
    fn check_params(&self, params: &[f64]) -> Result<()> {
        if params.len() != self.ndim() {
            return Err(CredenceError::InvalidParameters {
                model: self.name(),
                params: params.to_vec(),
                reason: format!("expected {} parameters {:?}", self.ndim(), self.param_names()),
            });
        }
        if self.log_prior(params) == f64::NEG_INFINITY {
            return Err(CredenceError::InvalidParameters {
                model: self.name(),
                params: params.to_vec(),
                reason: "outside the parameter domain".to_string(),
            });
        }
        Ok(())
    }

    /// Summed log-likelihood of the dataset.
    ///
    /// With weights, the contribution of mention count `n` is scaled by
    /// `weight[n]` times the number of statements observed at `n`.
    fn log_likelihood(&self, params: &[f64], data: &CorrectnessData) -> Result<f64> {
        self.check_params(params)?;
        let mut ll = 0.0;
        for (num_mentions, corrects) in data.iter() {
            let mut ll_n = 0.0;
            for &num_correct in corrects {
                let term = self
                    .observation_log_likelihood(params, num_mentions, num_correct)
                    .map_err(|e| match e {
                        CredenceError::NumericalDegeneracy { .. } => CredenceError::degenerate_observation(
                            &self.name(),
                            num_mentions,
                            num_correct,
                            params,
                        ),
                        other => other,
                    })?;
                if !term.is_finite() {
                    return Err(CredenceError::degenerate_observation(
                        &self.name(),
                        num_mentions,
                        num_correct,
                        params,
                    ));
                }
                ll_n += term;
            }
            ll += match self.weights() {
                Some(w) => w.get(num_mentions)? * corrects.len() as f64 * ll_n,
                None => ll_n,
            };
        }
        Ok(ll)
    }
}

/// Build the model described by `spec`.
pub fn build_model(spec: ModelSpec, weights: Option<MentionWeights>) -> Box<dyn BeliefModel> {
    match spec.kind {
        ModelKind::Binomial => Box::new(Binomial::new(spec.mode, weights)),
        ModelKind::BetaBinomial => Box::new(BetaBinomial::new(spec.mode, weights)),
        ModelKind::RandomSystematic => Box::new(RandomSystematic::new(spec.mode, weights)),
    }
}

/// Draw from the open unit interval.
pub(crate) fn open_unit(rng: &mut dyn RngCore) -> f64 {
    use rand::distributions::Open01;
    use rand::Rng;
    rng.sample(Open01)
}
