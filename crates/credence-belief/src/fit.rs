//! Goodness-of-fit summaries used to rank competing belief models.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use credence_common::{CorrectnessData, CredenceError, MentionWeights, ModelSpec, Result};

use crate::model::{build_model, BeliefModel};
use crate::sampler::{fit, get_map_params, PosteriorSamples, SamplerConfig};

/// Negative statement-level log-likelihood of `params` against `data`.
///
/// Each statement counts as correct when any of its mentions is. With
/// weights, mention count `n` contributes `weight[n]` times the number of
/// statements observed at `n` times its summed log-likelihood.
pub fn stmt_level_error(
    model: &dyn BeliefModel,
    data: &CorrectnessData,
    params: &[f64],
    weights: Option<&MentionWeights>,
) -> Result<f64> {
    let counts = data.mention_counts();
    let preds = model.predict_correct_given_n(params, &counts)?;
    let mut ll = 0.0;
    for ((num_mentions, corrects), p) in data.iter().zip(preds) {
        let mut ll_n = 0.0;
        for &num_correct in corrects {
            let term = if num_correct == 0 { (-p).ln_1p() } else { p.ln() };
            if !term.is_finite() {
                return Err(CredenceError::degenerate_observation(
                    &model.name(),
                    num_mentions,
                    num_correct,
                    params,
                ));
            }
            ll_n += term;
        }
        ll += match weights {
            Some(w) => w.get(num_mentions)? * corrects.len() as f64 * ll_n,
            None => ll_n,
        };
    }
    Ok(-ll)
}

// ── Model comparison ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    pub spec: ModelSpec,
    pub param_names: Vec<String>,
    pub map_params: Vec<f64>,
    /// `-log(max likelihood)` at statement level.
    pub error: f64,
    /// Same, weighted by the mention-count distribution.
    pub weighted_error: Option<f64>,
    pub mean_acceptance: f64,
    #[serde(skip)]
    pub samples: Option<PosteriorSamples>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitFailure {
    pub spec: ModelSpec,
    pub error: String,
}

/// Outcome of fitting several model variants. Variants that fail do not
/// discard the ones that completed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub results: Vec<FitResult>,
    pub failures: Vec<FitFailure>,
}

impl ComparisonReport {
    /// Completed variant with the lowest unweighted error.
    pub fn best(&self) -> Option<&FitResult> {
        self.results
            .iter()
            .min_by(|a, b| a.error.total_cmp(&b.error))
    }

    /// Write `model,neg_log_max_lkl,neg_log_max_lkl_weighted` rows.
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(["model", "neg_log_max_lkl", "neg_log_max_lkl_weighted"])?;
        for r in &self.results {
            let weighted = r.weighted_error.map(|w| w.to_string()).unwrap_or_default();
            wtr.write_record([r.spec.label(), r.error.to_string(), weighted])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Fit one model variant and score its MAP parameters.
///
/// The posterior is always fitted unweighted; `weights` only enter the
/// `weighted_error` score.
pub fn fit_and_score(
    spec: ModelSpec,
    data: &CorrectnessData,
    weights: Option<&MentionWeights>,
    sampler: &SamplerConfig,
) -> Result<FitResult> {
    let model = build_model(spec, None);
    let samples = fit(model.as_ref(), data, sampler)?;
    let map_params = get_map_params(&samples)?;
    let error = stmt_level_error(model.as_ref(), data, &map_params, None)?;
    let weighted_error = weights
        .map(|w| stmt_level_error(model.as_ref(), data, &map_params, Some(w)))
        .transpose()?;
    Ok(FitResult {
        spec,
        param_names: samples.param_names.clone(),
        map_params,
        error,
        weighted_error,
        mean_acceptance: samples.mean_acceptance(),
        samples: Some(samples),
    })
}

/// Fit every model variant concurrently and tabulate statement-level errors.
pub fn compare_models(
    specs: &[ModelSpec],
    data: &CorrectnessData,
    weights: Option<&MentionWeights>,
    sampler: &SamplerConfig,
) -> ComparisonReport {
    let outcomes: Vec<(ModelSpec, Result<FitResult>)> = specs
        .par_iter()
        .map(|&spec| (spec, fit_and_score(spec, data, weights, sampler)))
        .collect();

    let mut report = ComparisonReport::default();
    for (spec, outcome) in outcomes {
        match outcome {
            Ok(result) => {
                info!("{spec}: -log(max lkl) = {:.3}", result.error);
                report.results.push(result);
            }
            Err(e) => {
                warn!("Fitting {spec} failed: {e}");
                report.failures.push(FitFailure {
                    spec,
                    error: e.to_string(),
                });
            }
        }
    }
    report
}

// ── Empirical vs predicted ───────────────────────────────────────────────────

/// Empirical statement correctness next to the model's prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitRow {
    pub num_mentions: u32,
    pub count: usize,
    pub num_correct: usize,
    pub empirical_mean: f64,
    pub two_stderr: f64,
    pub predicted: f64,
}

pub fn fit_table(model: &dyn BeliefModel, data: &CorrectnessData, params: &[f64]) -> Result<Vec<FitRow>> {
    let empirical = data.empirical_correctness();
    let counts: Vec<u32> = empirical.iter().map(|e| e.num_mentions).collect();
    let preds = model.predict_correct_given_n(params, &counts)?;
    Ok(empirical
        .into_iter()
        .zip(preds)
        .map(|(e, predicted)| FitRow {
            num_mentions: e.num_mentions,
            count: e.count,
            num_correct: e.num_correct,
            empirical_mean: e.mean,
            two_stderr: e.two_stderr,
            predicted,
        })
        .collect())
}
