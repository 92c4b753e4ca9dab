//! Statement samples drawn for curation.

use std::collections::BTreeMap;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{info, warn};

use credence_common::{CredenceError, Result, Statement, StatementHash};

/// Read a JSON list of sampled statement hashes, one entry per draw.
pub fn load_sample_hashes(path: &Path) -> Result<Vec<StatementHash>> {
    let content = std::fs::read_to_string(path)?;
    let hashes: Vec<StatementHash> = serde_json::from_str(&content)?;
    info!("Loaded {} sampled statement hashes from {}", hashes.len(), path.display());
    Ok(hashes)
}

/// Rebuild the sampled statements from their hashes, keeping only the
/// evidence read by `source_api`. Order and repeats of `hashes` are kept.
pub fn restrict_to_source(
    hashes: &[StatementHash],
    corpus: &BTreeMap<StatementHash, Statement>,
    source_api: &str,
) -> Result<Vec<Statement>> {
    hashes
        .iter()
        .map(|hash| {
            corpus
                .get(hash)
                .map(|stmt| stmt.restricted_to_source(source_api))
                .ok_or_else(|| CredenceError::InvalidData(format!("sampled statement {hash} is not in the corpus")))
        })
        .collect()
}

/// Draw `per_count` statements with replacement for every evidence count in
/// `ev_min..=ev_max`, counting only evidence from `source_api`.
///
/// Counts with no statements are skipped. Results are ordered by evidence
/// count, draws within a count in the order they were made.
pub fn sample_for_curation<R: Rng + ?Sized>(
    statements: &[Statement],
    source_api: &str,
    per_count: usize,
    ev_min: u32,
    ev_max: u32,
    rng: &mut R,
) -> Vec<Statement> {
    let mut strata: BTreeMap<u32, Vec<Statement>> = BTreeMap::new();
    for stmt in statements {
        let restricted = stmt.restricted_to_source(source_api);
        let count = restricted.evidence.len() as u32;
        if (ev_min..=ev_max).contains(&count) && count > 0 {
            strata.entry(count).or_default().push(restricted);
        }
    }

    let mut sampled = Vec::with_capacity(per_count * strata.len());
    for count in ev_min.max(1)..=ev_max {
        let Some(stratum) = strata.get(&count) else {
            warn!("No {source_api} statements with {count} evidences to sample from");
            continue;
        };
        for _ in 0..per_count {
            if let Some(stmt) = stratum.choose(rng) {
                sampled.push(stmt.clone());
            }
        }
    }
    sampled
}
