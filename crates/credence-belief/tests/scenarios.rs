use std::collections::BTreeMap;

use credence_belief::{
    build_model, fit, get_map_params, recommend_next_curation, stmt_level_error, DesignPlan, MentionCost,
    Parallelism, SamplerConfig,
};
use credence_common::{LikelihoodMode, MentionWeights, ModelKind, ModelSpec};
use credence_test_utils::{assert_eq, sanity_dataset};

fn small_sampler(seed: u64) -> SamplerConfig {
    SamplerConfig {
        n_walkers: 16,
        n_burn_steps: 50,
        n_sample_steps: 50,
        stretch_scale: 2.0,
        seed: Some(seed),
        parallelism: Parallelism::default(),
    }
}

#[test]
fn random_systematic_fit_is_sane() {
    let model = build_model(
        ModelSpec::new(ModelKind::RandomSystematic, LikelihoodMode::Statement),
        None,
    );
    let data = sanity_dataset();
    let samples = fit(model.as_ref(), &data, &small_sampler(7)).unwrap();
    assert_eq!(samples.len(), 16 * 50);

    let map = get_map_params(&samples).unwrap();
    assert!(map[0] > 0.0 && map[0] < 1.0, "{map:?}");

    let preds = model.predict_correct_given_n(&map, &[1, 2, 5]).unwrap();
    for pair in preds.windows(2) {
        assert!(pair[1] >= pair[0], "{preds:?}");
    }
    assert!(stmt_level_error(model.as_ref(), &data, &map, None).unwrap().is_finite());
}

#[test]
fn every_variant_fits_the_sanity_dataset() {
    let weights = MentionWeights::new(BTreeMap::from([(1, 0.5), (2, 0.3), (5, 0.2)]));
    let report = credence_belief::compare_models(&ModelSpec::all(), &sanity_dataset(), Some(&weights), &small_sampler(3));
    assert_eq!(report.failures.len(), 0, "{:?}", report.failures);
    assert_eq!(report.results.len(), 6);
    assert!(report.results.iter().all(|r| r.weighted_error.is_some_and(f64::is_finite)));
}

#[test]
fn curation_plan_is_deterministic() {
    let model = build_model(
        ModelSpec::new(ModelKind::RandomSystematic, LikelihoodMode::Statement),
        None,
    );
    let data = sanity_dataset();
    let mut plan = DesignPlan::new(10.0, 5, MentionCost::Linear);
    plan.candidates = Some(vec![1, 2, 5]);

    let first = recommend_next_curation(model.as_ref(), &data, &plan, &small_sampler(11)).unwrap();
    let second = recommend_next_curation(model.as_ref(), &data, &plan, &small_sampler(11)).unwrap();
    assert_eq!(first, second);

    let counts: Vec<_> = first.candidates.iter().map(|c| (c.num_mentions, c.count)).collect();
    assert_eq!(counts, vec![(1, 10), (2, 5), (5, 2)]);

    let best = first
        .candidates
        .iter()
        .filter_map(|c| c.reduction)
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(first.reduction, best);
    assert!([1, 2, 5].contains(&first.num_mentions));
}
