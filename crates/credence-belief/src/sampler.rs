//! Affine-invariant ensemble sampler.
//!
//! Stretch move (Goodman & Weare 2010) in the two-half form: the ensemble is
//! split in two and each half is updated against the other, so the
//! log-posterior of every proposal in a half can be evaluated in parallel.
//! All random draws for a half-step are made on the calling thread before
//! the fan-out, which keeps a seeded run identical under any parallelism.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use credence_common::{CorrectnessData, CredenceError, Result};

use crate::model::BeliefModel;

// ── Configuration ────────────────────────────────────────────────────────────

/// How log-posterior evaluations within a step are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parallelism {
    /// Evaluate walkers one after another on the calling thread.
    #[serde(alias = "none")]
    Sequential,
    /// Fan out on rayon. `None` uses the global pool, otherwise a dedicated
    /// pool of that many threads is built for the run.
    Threaded {
        #[serde(default)]
        num_threads: Option<usize>,
    },
}

impl Default for Parallelism {
    fn default() -> Self {
        Parallelism::Threaded { num_threads: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    #[serde(default = "default_walkers")]
    pub n_walkers: usize,

    #[serde(default = "default_burn_steps")]
    pub n_burn_steps: usize,

    #[serde(default = "default_sample_steps")]
    pub n_sample_steps: usize,

    /// Stretch-move scale `a`.
    #[serde(default = "default_stretch_scale")]
    pub stretch_scale: f64,

    /// Seed for the run's random stream; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub parallelism: Parallelism,
}

fn default_walkers() -> usize { 100 }
fn default_burn_steps() -> usize { 100 }
fn default_sample_steps() -> usize { 100 }
fn default_stretch_scale() -> f64 { 2.0 }

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            n_walkers: default_walkers(),
            n_burn_steps: default_burn_steps(),
            n_sample_steps: default_sample_steps(),
            stretch_scale: default_stretch_scale(),
            seed: None,
            parallelism: Parallelism::default(),
        }
    }
}

impl SamplerConfig {
    /// Check the configuration against a model with `ndim` parameters.
    pub fn validate(&self, ndim: usize) -> Result<()> {
        if self.n_walkers % 2 != 0 || self.n_walkers < 2 * ndim {
            return Err(CredenceError::Sampler(format!(
                "n_walkers must be even and at least {} for {ndim} parameters, got {}",
                2 * ndim,
                self.n_walkers
            )));
        }
        if self.n_sample_steps == 0 {
            return Err(CredenceError::Sampler("n_sample_steps must be at least 1".to_string()));
        }
        if !(self.stretch_scale > 1.0) {
            return Err(CredenceError::Sampler(format!(
                "stretch_scale must be greater than 1, got {}",
                self.stretch_scale
            )));
        }
        if let Parallelism::Threaded { num_threads: Some(0) } = self.parallelism {
            return Err(CredenceError::Sampler("num_threads must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Same configuration with a different seed.
    pub fn with_seed(&self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..self.clone()
        }
    }
}

// ── Posterior samples ────────────────────────────────────────────────────────

/// Flattened posterior chain. Entry `step * n_walkers + walker` holds the
/// state of `walker` after sampling step `step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorSamples {
    pub param_names: Vec<String>,
    pub chain: Vec<Vec<f64>>,
    /// Log-posterior per sample. Walkers that never left a zero-probability
    /// region hold `-inf`, written as `null` in JSON.
    #[serde(with = "log_prob_serde")]
    pub log_prob: Vec<f64>,
    pub n_walkers: usize,
    /// Fraction of accepted proposals per walker over the sampling steps.
    pub acceptance_fraction: Vec<f64>,
}

impl PosteriorSamples {
    pub fn new(
        param_names: Vec<String>,
        chain: Vec<Vec<f64>>,
        log_prob: Vec<f64>,
        n_walkers: usize,
        acceptance_fraction: Vec<f64>,
    ) -> Result<Self> {
        if chain.len() != log_prob.len() {
            return Err(CredenceError::Sampler(format!(
                "{} parameter vectors but {} log-posterior values",
                chain.len(),
                log_prob.len()
            )));
        }
        if let Some(bad) = chain.iter().find(|p| p.len() != param_names.len()) {
            return Err(CredenceError::Sampler(format!(
                "sample {bad:?} does not match parameters {param_names:?}"
            )));
        }
        if let Some(bad) = chain.iter().find(|p| p.iter().any(|v| !v.is_finite())) {
            return Err(CredenceError::Sampler(format!("sample {bad:?} is not finite")));
        }
        if let Some(bad) = log_prob.iter().find(|lp| lp.is_nan() || **lp == f64::INFINITY) {
            return Err(CredenceError::Sampler(format!("invalid log-posterior {bad}")));
        }
        Ok(Self {
            param_names,
            chain,
            log_prob,
            n_walkers,
            acceptance_fraction,
        })
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn ndim(&self) -> usize {
        self.param_names.len()
    }

    /// Index of the first sample with the largest log-posterior.
    pub fn map_index(&self) -> Result<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &lp) in self.log_prob.iter().enumerate() {
            match best {
                Some((_, best_lp)) if lp <= best_lp => {}
                _ => best = Some((i, lp)),
            }
        }
        best.map(|(i, _)| i).ok_or(CredenceError::EmptyPosterior)
    }

    pub fn mean_params(&self) -> Result<Vec<f64>> {
        if self.is_empty() {
            return Err(CredenceError::EmptyPosterior);
        }
        let mut sums = vec![0.0; self.ndim()];
        for params in &self.chain {
            for (s, v) in sums.iter_mut().zip(params) {
                *s += v;
            }
        }
        let count = self.len() as f64;
        Ok(sums.into_iter().map(|s| s / count).collect())
    }

    /// Population variance of each parameter.
    pub fn marginal_variance(&self) -> Result<Vec<f64>> {
        let means = self.mean_params()?;
        let mut sq = vec![0.0; self.ndim()];
        for params in &self.chain {
            for ((s, v), m) in sq.iter_mut().zip(params).zip(&means) {
                *s += (v - m) * (v - m);
            }
        }
        let count = self.len() as f64;
        Ok(sq.into_iter().map(|s| s / count).collect())
    }

    pub fn mean_acceptance(&self) -> f64 {
        if self.acceptance_fraction.is_empty() {
            return 0.0;
        }
        self.acceptance_fraction.iter().sum::<f64>() / self.acceptance_fraction.len() as f64
    }

    /// Walker positions after the last sampling step.
    pub fn last_positions(&self) -> Vec<Vec<f64>> {
        let start = self.len().saturating_sub(self.n_walkers);
        self.chain[start..].to_vec()
    }

    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

mod log_prob_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        values
            .iter()
            .map(|v| v.is_finite().then_some(*v))
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let values = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(values.into_iter().map(|v| v.unwrap_or(f64::NEG_INFINITY)).collect())
    }
}

/// Parameters of the sample with the largest log-posterior (first on ties).
pub fn get_map_params(samples: &PosteriorSamples) -> Result<Vec<f64>> {
    let idx = samples.map_index()?;
    Ok(samples.chain[idx].clone())
}

// ── Sampler ──────────────────────────────────────────────────────────────────

pub struct EnsembleSampler<'a> {
    model: &'a dyn BeliefModel,
    data: &'a CorrectnessData,
    config: SamplerConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> EnsembleSampler<'a> {
    pub fn new(model: &'a dyn BeliefModel, data: &'a CorrectnessData, config: SamplerConfig) -> Result<Self> {
        config.validate(model.ndim())?;
        Ok(Self {
            model,
            data,
            config,
            cancel: None,
        })
    }

    /// Abort at the next step boundary once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Run from walkers drawn from the prior.
    pub fn run(&self) -> Result<PosteriorSamples> {
        let mut rng = self.rng();
        let initial: Vec<Vec<f64>> = (0..self.config.n_walkers)
            .map(|_| self.model.sample_from_prior(&mut rng))
            .collect();
        self.run_chain(initial, &mut rng)
    }

    /// Continue from explicit walker positions, e.g. the last step of a
    /// previous run.
    pub fn run_from(&self, initial: Vec<Vec<f64>>) -> Result<PosteriorSamples> {
        if initial.len() != self.config.n_walkers {
            return Err(CredenceError::Sampler(format!(
                "expected {} initial positions, got {}",
                self.config.n_walkers,
                initial.len()
            )));
        }
        if let Some(bad) = initial
            .iter()
            .find(|p| p.len() != self.model.ndim() || p.iter().any(|v| !v.is_finite()))
        {
            return Err(CredenceError::Sampler(format!(
                "initial position {bad:?} does not match parameters {:?}",
                self.model.param_names()
            )));
        }
        let mut rng = self.rng();
        self.run_chain(initial, &mut rng)
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Unnormalised log-posterior; the likelihood is never evaluated outside
    /// the prior's support.
    pub fn log_posterior(&self, params: &[f64]) -> Result<f64> {
        let lp = self.model.log_prior(params);
        if lp == f64::NEG_INFINITY {
            return Ok(lp);
        }
        Ok(lp + self.model.log_likelihood(params, self.data)?)
    }

    fn evaluate(&self, points: &[Vec<f64>], pool: Option<&rayon::ThreadPool>) -> Result<Vec<f64>> {
        use rayon::prelude::*;

        match (self.config.parallelism, pool) {
            (Parallelism::Sequential, _) => points.iter().map(|p| self.log_posterior(p)).collect(),
            (Parallelism::Threaded { .. }, Some(pool)) => {
                pool.install(|| points.par_iter().map(|p| self.log_posterior(p)).collect())
            }
            (Parallelism::Threaded { .. }, None) => {
                points.par_iter().map(|p| self.log_posterior(p)).collect()
            }
        }
    }

    fn run_chain(&self, mut positions: Vec<Vec<f64>>, rng: &mut StdRng) -> Result<PosteriorSamples> {
        let pool = match self.config.parallelism {
            Parallelism::Threaded { num_threads: Some(n) } => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| CredenceError::Sampler(format!("failed to build thread pool: {e}")))?,
            ),
            _ => None,
        };
        let pool = pool.as_ref();

        let n_walkers = self.config.n_walkers;
        let mut log_prob = self.evaluate(&positions, pool)?;
        if log_prob.iter().all(|lp| *lp == f64::NEG_INFINITY) {
            return Err(CredenceError::Sampler(format!(
                "no initial walker lies inside the domain of {}: {positions:?}",
                self.model.name()
            )));
        }
        let outside = log_prob.iter().filter(|lp| **lp == f64::NEG_INFINITY).count();
        if outside > 0 {
            warn!("{outside} of {n_walkers} initial walkers lie outside the parameter domain");
        }
        let mut accepted = vec![0usize; n_walkers];

        info!("Burn in sampling...");
        for step in 0..self.config.n_burn_steps {
            self.check_cancelled(step)?;
            self.step(&mut positions, &mut log_prob, &mut accepted, rng, pool)?;
            debug!("burn-in step {step}: mean log-posterior {:.4}", mean_finite(&log_prob));
        }
        accepted.iter_mut().for_each(|a| *a = 0);

        info!("Main sampling...");
        let total = n_walkers * self.config.n_sample_steps;
        let mut chain = Vec::with_capacity(total);
        let mut chain_lp = Vec::with_capacity(total);
        for step in 0..self.config.n_sample_steps {
            self.check_cancelled(self.config.n_burn_steps + step)?;
            self.step(&mut positions, &mut log_prob, &mut accepted, rng, pool)?;
            chain.extend(positions.iter().cloned());
            chain_lp.extend_from_slice(&log_prob);
            debug!("sampling step {step}: mean log-posterior {:.4}", mean_finite(&log_prob));
        }
        info!("Done sampling.");

        let steps = self.config.n_sample_steps as f64;
        let acceptance_fraction = accepted.iter().map(|&a| a as f64 / steps).collect();
        PosteriorSamples::new(
            self.model.param_names().iter().map(|s| s.to_string()).collect(),
            chain,
            chain_lp,
            n_walkers,
            acceptance_fraction,
        )
    }

    fn check_cancelled(&self, completed_steps: usize) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(CredenceError::Cancelled { completed_steps }),
            _ => Ok(()),
        }
    }

    /// One full step: update the first half against the second, then the
    /// second half against the updated first.
    fn step(
        &self,
        positions: &mut [Vec<f64>],
        log_prob: &mut [f64],
        accepted: &mut [usize],
        rng: &mut StdRng,
        pool: Option<&rayon::ThreadPool>,
    ) -> Result<()> {
        let n_walkers = positions.len();
        let half = n_walkers / 2;
        let a = self.config.stretch_scale;
        let ndim = self.model.ndim() as f64;

        for (active, other) in [(0..half, half..n_walkers), (half..n_walkers, 0..half)] {
            let mut moves = Vec::with_capacity(active.len());
            let mut proposals = Vec::with_capacity(active.len());
            for k in active.clone() {
                let j = rng.gen_range(other.clone());
                let u: f64 = rng.gen();
                let z = ((a - 1.0) * u + 1.0).powi(2) / a;
                let ln_u = rng.gen::<f64>().ln();
                let proposal: Vec<f64> = positions[k]
                    .iter()
                    .zip(&positions[j])
                    .map(|(xk, xj)| xj + z * (xk - xj))
                    .collect();
                moves.push((k, z, ln_u));
                proposals.push(proposal);
            }

            let new_lp = self.evaluate(&proposals, pool)?;

            for ((&(k, z, ln_u), proposal), lp_new) in moves.iter().zip(proposals).zip(new_lp) {
                let accept = if lp_new == f64::NEG_INFINITY {
                    false
                } else if log_prob[k] == f64::NEG_INFINITY {
                    true
                } else {
                    ln_u < (ndim - 1.0) * z.ln() + lp_new - log_prob[k]
                };
                if accept {
                    positions[k] = proposal;
                    log_prob[k] = lp_new;
                    accepted[k] += 1;
                }
            }
        }
        Ok(())
    }
}

fn mean_finite(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return f64::NEG_INFINITY;
    }
    finite.iter().sum::<f64>() / finite.len() as f64
}

/// Sample the posterior of `model` given `data`.
pub fn fit(model: &dyn BeliefModel, data: &CorrectnessData, config: &SamplerConfig) -> Result<PosteriorSamples> {
    info!(
        "Fitting {} on {} statements ({} walkers, {} + {} steps)",
        model.name(),
        data.num_statements(),
        config.n_walkers,
        config.n_burn_steps,
        config.n_sample_steps
    );
    EnsembleSampler::new(model, data, config.clone())?.run()
}
