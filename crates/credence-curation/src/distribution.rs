//! Empirical mention-count distribution of a reader's statements.

use std::collections::{BTreeMap, BTreeSet};

use credence_common::{Aggregation, MentionWeights, Result, Statement};

/// Number of mentions of `stmt` from `source_api` at the given level.
pub fn count_mentions(stmt: &Statement, source_api: &str, level: Aggregation) -> u32 {
    let evidence = stmt.evidence.iter().filter(|e| e.source_api == source_api);
    match level {
        Aggregation::Evidence => evidence.count() as u32,
        Aggregation::Document => evidence
            .map(|e| e.document_id.clone().unwrap_or_else(|| format!("hash:{}", e.source_hash)))
            .collect::<BTreeSet<_>>()
            .len() as u32,
    }
}

/// Fraction of statements with each mention count in `1..=max_mentions`.
///
/// Statements with no mentions from the source, or more than
/// `max_mentions`, are not counted. Counts that never occur get weight 0.
pub fn mention_distribution(
    statements: &[Statement],
    source_api: &str,
    level: Aggregation,
    max_mentions: u32,
) -> Result<MentionWeights> {
    let mut counts: BTreeMap<u32, usize> = (1..=max_mentions).map(|n| (n, 0)).collect();
    for stmt in statements {
        let n = count_mentions(stmt, source_api, level);
        if let Some(c) = counts.get_mut(&n) {
            *c += 1;
        }
    }
    MentionWeights::from_counts(&counts)
}
