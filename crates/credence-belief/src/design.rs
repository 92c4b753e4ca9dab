//! Curation planning.
//!
//! Given a posterior over model parameters, estimate which mention count
//! new curation effort should target so that the predictive uncertainty of
//! the belief curve drops the most for a fixed budget.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use credence_common::{CorrectnessData, CredenceError, MentionWeights, Result};

use crate::model::BeliefModel;
use crate::sampler::{fit, PosteriorSamples, SamplerConfig};

/// Seed used for refits when the sampler configuration has none.
pub const DESIGN_SEED: u64 = 0x00C0_FFEE;

/// Cost of curating one statement with `n` mentions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionCost {
    #[default]
    Linear,
    Log,
    Log2,
}

impl MentionCost {
    pub fn cost(&self, num_mentions: u32) -> f64 {
        let n = f64::from(num_mentions);
        match self {
            MentionCost::Linear => n,
            MentionCost::Log => 1.0 + n.ln(),
            MentionCost::Log2 => 1.0 + n.log2(),
        }
    }

    /// Statements with `n` mentions affordable within `budget`.
    pub fn affordable(&self, budget: f64, num_mentions: u32) -> usize {
        let per_statement = self.cost(num_mentions);
        if !(per_statement > 0.0) || budget <= 0.0 {
            return 0;
        }
        (budget / per_statement).floor() as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignPlan {
    pub budget: f64,
    pub max_mentions: u32,
    #[serde(default)]
    pub cost: MentionCost,
    /// Mention counts to consider; `1..=max_mentions` when absent.
    #[serde(default)]
    pub candidates: Option<Vec<u32>>,
    /// Weights of each mention count in the uncertainty sum; uniform when absent.
    #[serde(default)]
    pub mention_probabilities: Option<MentionWeights>,
}

impl DesignPlan {
    pub fn new(budget: f64, max_mentions: u32, cost: MentionCost) -> Self {
        Self {
            budget,
            max_mentions,
            cost,
            candidates: None,
            mention_probabilities: None,
        }
    }

    fn evaluation_counts(&self) -> Vec<u32> {
        (1..=self.max_mentions).collect()
    }

    fn candidate_counts(&self) -> Vec<u32> {
        let mut counts = self.candidates.clone().unwrap_or_else(|| self.evaluation_counts());
        counts.sort_unstable();
        counts.dedup();
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateOutcome {
    pub num_mentions: u32,
    /// Affordable synthetic statements.
    pub count: usize,
    /// Synthetic statements marked correct.
    pub num_correct: usize,
    /// `None` when nothing is affordable at this mention count.
    pub uncertainty: Option<f64>,
    pub reduction: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub num_mentions: u32,
    pub count: usize,
    pub baseline_uncertainty: f64,
    pub uncertainty: f64,
    pub reduction: f64,
    pub candidates: Vec<CandidateOutcome>,
}

/// Σₘ wₘ · Var_θ[P(correct | m; θ)] over the posterior samples.
///
/// Population variance; weights are uniform over `mention_counts` unless
/// `probabilities` is given, in which case absent counts weigh zero.
pub fn predictive_uncertainty(
    model: &dyn BeliefModel,
    samples: &PosteriorSamples,
    mention_counts: &[u32],
    probabilities: Option<&MentionWeights>,
) -> Result<f64> {
    if samples.is_empty() {
        return Err(CredenceError::EmptyPosterior);
    }
    if mention_counts.is_empty() {
        return Ok(0.0);
    }
    let preds = samples
        .chain
        .iter()
        .map(|params| model.predict_correct_given_n(params, mention_counts))
        .collect::<Result<Vec<_>>>()?;

    let count = preds.len() as f64;
    let uniform = 1.0 / mention_counts.len() as f64;
    let mut total = 0.0;
    for (i, &m) in mention_counts.iter().enumerate() {
        let mean = preds.iter().map(|p| p[i]).sum::<f64>() / count;
        let var = preds.iter().map(|p| (p[i] - mean).powi(2)).sum::<f64>() / count;
        let weight = probabilities.map_or(uniform, |w| w.get_or_zero(m));
        debug!("{m}: {:.2E}", weight * var);
        total += weight * var;
    }
    Ok(total)
}

/// `data` plus `count` synthetic statements with `num_mentions` mentions,
/// the first `num_correct` of them correct.
pub fn add_synthetic(
    data: &CorrectnessData,
    num_mentions: u32,
    count: usize,
    num_correct: usize,
) -> Result<CorrectnessData> {
    let mut augmented = data.clone();
    let num_correct = num_correct.min(count);
    augmented.push_repeated(num_mentions, 1, num_correct)?;
    augmented.push_repeated(num_mentions, 0, count - num_correct)?;
    Ok(augmented)
}

/// Expected number of correct statements out of `count`, rounded.
fn expected_correct(model: &dyn BeliefModel, mean_params: &[f64], num_mentions: u32, count: usize) -> Result<usize> {
    let p = model.predict_correct_given_n(mean_params, &[num_mentions])?[0];
    Ok((p * count as f64).round() as usize)
}

/// Augment `data` with an explicit proposal `{num_mentions -> count}`,
/// splitting each batch by the probability predicted at `mean_params`.
pub fn add_proposed_data(
    model: &dyn BeliefModel,
    data: &CorrectnessData,
    mean_params: &[f64],
    proposal: &BTreeMap<u32, usize>,
) -> Result<CorrectnessData> {
    let mut augmented = data.clone();
    for (&m, &count) in proposal {
        let num_correct = expected_correct(model, mean_params, m, count)?;
        augmented = add_synthetic(&augmented, m, count, num_correct)?;
    }
    Ok(augmented)
}

/// Predictive uncertainty after curating `proposal` on top of `data`.
pub fn evaluate_proposal(
    model: &dyn BeliefModel,
    data: &CorrectnessData,
    baseline: &PosteriorSamples,
    proposal: &BTreeMap<u32, usize>,
    plan: &DesignPlan,
    sampler: &SamplerConfig,
) -> Result<f64> {
    let mean = baseline.mean_params()?;
    let augmented = add_proposed_data(model, data, &mean, proposal)?;
    let seed = sampler.seed.unwrap_or(DESIGN_SEED);
    let samples = fit(model, &augmented, &sampler.with_seed(seed))?;
    predictive_uncertainty(
        model,
        &samples,
        &plan.evaluation_counts(),
        plan.mention_probabilities.as_ref(),
    )
}

/// Candidate with the largest uncertainty reduction. Unaffordable
/// candidates are not eligible; on equal reductions the smaller mention
/// count wins.
pub fn select_best(candidates: &[CandidateOutcome], budget: f64) -> Result<&CandidateOutcome> {
    let mut best: Option<(&CandidateOutcome, f64)> = None;
    for c in candidates {
        let Some(reduction) = c.reduction else { continue };
        match best {
            Some((b, best_reduction))
                if reduction < best_reduction
                    || (reduction == best_reduction && b.num_mentions <= c.num_mentions) => {}
            _ => best = Some((c, reduction)),
        }
    }
    best.map(|(c, _)| c).ok_or_else(|| {
        CredenceError::InvalidData(format!(
            "no candidate mention count is affordable within a budget of {budget}"
        ))
    })
}

/// Fit `data`, then recommend the next mention count to curate.
pub fn recommend_next_curation(
    model: &dyn BeliefModel,
    data: &CorrectnessData,
    plan: &DesignPlan,
    sampler: &SamplerConfig,
) -> Result<Recommendation> {
    let baseline = fit(model, data, sampler)?;
    recommend_from_baseline(model, data, &baseline, plan, sampler)
}

/// Recommend the next mention count to curate given a baseline posterior.
///
/// Each candidate refit uses a seed derived from the configured seed and the
/// candidate, so the result is fixed for a fixed baseline. Ties go to the
/// smaller mention count.
pub fn recommend_from_baseline(
    model: &dyn BeliefModel,
    data: &CorrectnessData,
    baseline: &PosteriorSamples,
    plan: &DesignPlan,
    sampler: &SamplerConfig,
) -> Result<Recommendation> {
    let eval_counts = plan.evaluation_counts();
    let probs = plan.mention_probabilities.as_ref();
    let baseline_uncertainty = predictive_uncertainty(model, baseline, &eval_counts, probs)?;
    let mean = baseline.mean_params()?;
    let base_seed = sampler.seed.unwrap_or(DESIGN_SEED);
    info!("Baseline predictive uncertainty: {baseline_uncertainty:.4E}");

    let candidates = plan
        .candidate_counts()
        .into_par_iter()
        .map(|m| -> Result<CandidateOutcome> {
            let count = plan.cost.affordable(plan.budget, m);
            if count == 0 {
                return Ok(CandidateOutcome {
                    num_mentions: m,
                    count,
                    num_correct: 0,
                    uncertainty: None,
                    reduction: None,
                });
            }
            let num_correct = expected_correct(model, &mean, m, count)?;
            let augmented = add_synthetic(data, m, count, num_correct)?;
            let refit = fit(model, &augmented, &sampler.with_seed(base_seed.wrapping_add(u64::from(m))))?;
            let uncertainty = predictive_uncertainty(model, &refit, &eval_counts, probs)?;
            Ok(CandidateOutcome {
                num_mentions: m,
                count,
                num_correct,
                uncertainty: Some(uncertainty),
                reduction: Some(baseline_uncertainty - uncertainty),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    for c in &candidates {
        if let Some(reduction) = c.reduction {
            info!(
                "{} mentions: {} statements ({} correct), reduction {reduction:.4E}",
                c.num_mentions, c.count, c.num_correct
            );
        }
    }
    let best = select_best(&candidates, plan.budget)?;
    Ok(Recommendation {
        num_mentions: best.num_mentions,
        count: best.count,
        baseline_uncertainty,
        uncertainty: best.uncertainty.unwrap_or(baseline_uncertainty),
        reduction: best.reduction.unwrap_or(0.0),
        candidates: candidates.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RandomSystematic;
    use crate::sampler::Parallelism;
    use credence_common::LikelihoodMode;

    #[test]
    fn test_costs() {
        assert_eq!(MentionCost::Linear.cost(4), 4.0);
        assert!((MentionCost::Log.cost(1) - 1.0).abs() < 1e-15);
        assert!((MentionCost::Log2.cost(8) - 4.0).abs() < 1e-12);
        assert_eq!(MentionCost::Linear.affordable(10.0, 2), 5);
        assert_eq!(MentionCost::Linear.affordable(10.0, 11), 0);
        assert_eq!(MentionCost::Log2.affordable(10.0, 4), 3);
    }

    #[test]
    fn test_uncertainty_of_identical_samples_is_zero() {
        let model = RandomSystematic::new(LikelihoodMode::Statement, None);
        let samples =
            PosteriorSamples::new(vec!["Rand".into(), "Syst".into()], vec![vec![0.3, 0.1]; 4], vec![-1.0; 4], 4, vec![])
                .unwrap();
        assert_eq!(predictive_uncertainty(&model, &samples, &[1, 2, 3], None).unwrap(), 0.0);
    }

    #[test]
    fn test_uncertainty_weights() {
        let model = RandomSystematic::new(LikelihoodMode::Statement, None);
        // Syst = 0 or 0.5, Rand = 0: belief is 1 or 0.5 for every n
        let samples = PosteriorSamples::new(
            vec!["Rand".into(), "Syst".into()],
            vec![vec![0.0, 0.0], vec![0.0, 0.5]],
            vec![-1.0, -1.0],
            2,
            vec![],
        )
        .unwrap();
        let uniform = predictive_uncertainty(&model, &samples, &[1, 2], None).unwrap();
        assert!((uniform - 0.0625).abs() < 1e-12);
        let only_one = MentionWeights::new(BTreeMap::from([(1, 1.0)]));
        let weighted = predictive_uncertainty(&model, &samples, &[1, 2], Some(&only_one)).unwrap();
        assert!((weighted - 0.0625).abs() < 1e-12);
        let half = MentionWeights::new(BTreeMap::from([(2, 0.5)]));
        let weighted = predictive_uncertainty(&model, &samples, &[1, 2], Some(&half)).unwrap();
        assert!((weighted - 0.03125).abs() < 1e-12);
    }

    #[test]
    fn test_add_synthetic() {
        let data = CorrectnessData::new();
        let augmented = add_synthetic(&data, 2, 5, 3).unwrap();
        assert_eq!(augmented.get(2), Some(&[1, 1, 1, 0, 0][..]));
        assert!(data.is_empty());
    }

    #[test]
    fn test_add_proposed_data_uses_predicted_correctness() {
        let model = RandomSystematic::new(LikelihoodMode::Statement, None);
        // belief(1) = 0.5, belief(10) ≈ 1
        let proposal = BTreeMap::from([(1, 4), (10, 3)]);
        let augmented = add_proposed_data(&model, &CorrectnessData::new(), &[0.5, 0.0], &proposal).unwrap();
        assert_eq!(augmented.get(1), Some(&[1, 1, 0, 0][..]));
        assert_eq!(augmented.get(10), Some(&[1, 1, 1][..]));
    }

    fn outcome(num_mentions: u32, reduction: Option<f64>) -> CandidateOutcome {
        CandidateOutcome {
            num_mentions,
            count: if reduction.is_some() { 1 } else { 0 },
            num_correct: 0,
            uncertainty: reduction.map(|r| 1.0 - r),
            reduction,
        }
    }

    #[test]
    fn test_select_best_prefers_fewer_mentions_on_ties() {
        let candidates = [outcome(5, Some(0.25)), outcome(2, Some(0.25)), outcome(1, Some(0.125))];
        assert_eq!(select_best(&candidates, 10.0).unwrap().num_mentions, 2);
        let reversed = [outcome(2, Some(0.25)), outcome(5, Some(0.25))];
        assert_eq!(select_best(&reversed, 10.0).unwrap().num_mentions, 2);
    }

    #[test]
    fn test_select_best_skips_unaffordable() {
        let candidates = [outcome(1, Some(-0.5)), outcome(8, None), outcome(3, Some(-0.25))];
        let best = select_best(&candidates, 4.0).unwrap();
        assert_eq!(best.num_mentions, 3);
    }

    #[test]
    fn test_select_best_without_affordable_candidates() {
        let candidates = [outcome(11, None), outcome(12, None)];
        let err = select_best(&candidates, 10.0).unwrap_err();
        assert!(matches!(err, CredenceError::InvalidData(_)), "{err}");
        assert!(matches!(select_best(&[], 10.0), Err(CredenceError::InvalidData(_))));
    }

    #[test]
    fn test_unaffordable_plan_is_an_error() {
        let model = RandomSystematic::new(LikelihoodMode::Statement, None);
        let data = CorrectnessData::from_map(BTreeMap::from([(1, vec![0, 1]), (2, vec![1, 1])])).unwrap();
        let baseline = PosteriorSamples::new(
            vec!["Rand".into(), "Syst".into()],
            vec![vec![0.3, 0.1], vec![0.5, 0.2]],
            vec![-1.0, -2.0],
            2,
            vec![],
        )
        .unwrap();
        let mut plan = DesignPlan::new(1.0, 3, MentionCost::Linear);
        plan.candidates = Some(vec![2, 3]);
        let sampler = SamplerConfig {
            n_walkers: 4,
            n_burn_steps: 2,
            n_sample_steps: 2,
            seed: Some(1),
            parallelism: Parallelism::Sequential,
            ..Default::default()
        };
        let err = recommend_from_baseline(&model, &data, &baseline, &plan, &sampler).unwrap_err();
        assert!(matches!(err, CredenceError::InvalidData(_)), "{err}");
    }

    #[test]
    fn test_evaluate_proposal_shrinks_uncertainty() {
        let model = RandomSystematic::new(LikelihoodMode::Statement, None);
        let data = CorrectnessData::from_map(BTreeMap::from([
            (1, vec![0, 0, 1, 0]),
            (2, vec![1, 1, 0, 1]),
            (5, vec![1, 1, 1, 1, 1]),
        ]))
        .unwrap();
        let sampler = SamplerConfig {
            n_walkers: 16,
            n_burn_steps: 100,
            n_sample_steps: 100,
            seed: Some(5),
            parallelism: Parallelism::Sequential,
            ..Default::default()
        };
        let plan = DesignPlan::new(100.0, 10, MentionCost::Linear);
        let baseline = fit(&model, &data, &sampler).unwrap();
        let before = predictive_uncertainty(&model, &baseline, &plan.evaluation_counts(), None).unwrap();

        let proposal = BTreeMap::from([(1, 50), (10, 50)]);
        let after = evaluate_proposal(&model, &data, &baseline, &proposal, &plan, &sampler).unwrap();
        let again = evaluate_proposal(&model, &data, &baseline, &proposal, &plan, &sampler).unwrap();
        assert_eq!(after, again);
        assert!(after >= 0.0 && after < before, "before {before}, after {after}");
    }
}
