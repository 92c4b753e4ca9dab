//! credence-belief — Belief models, posterior sampling, and curation planning.
//!
//! Fits the probability that a statement is correct as a function of how
//! many mentions support it, compares model variants, and recommends where
//! further curation reduces predictive uncertainty the most.

pub mod numerics;
pub mod model;
pub mod sampler;
pub mod fit;
pub mod design;
pub mod scorer;

pub use design::{
    evaluate_proposal, recommend_from_baseline, recommend_next_curation, select_best, CandidateOutcome, DesignPlan,
    MentionCost, Recommendation,
};
pub use fit::{compare_models, fit_and_score, fit_table, stmt_level_error, ComparisonReport, FitResult};
pub use model::{build_model, BeliefModel, BetaBinomial, Binomial, RandomSystematic};
pub use sampler::{fit, get_map_params, EnsembleSampler, Parallelism, PosteriorSamples, SamplerConfig};
pub use scorer::{ErrorRates, SourceErrorRates};
