//! Calibration of assembled belief scores against curated correctness.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use credence_common::{CredenceError, Result, Statement, StatementHash};

pub const DEFAULT_BELIEF_BINS: [f64; 7] = [0.0, 0.6, 0.8, 0.9, 0.95, 0.99, 1.0];

/// Curated statements whose belief falls in `(lower, upper]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefBin {
    pub lower: f64,
    pub upper: f64,
    pub correct: usize,
    pub incorrect: usize,
    pub total: usize,
}

impl BeliefBin {
    /// `None` for an empty bin.
    pub fn fraction_correct(&self) -> Option<f64> {
        (self.total > 0).then(|| self.correct as f64 / self.total as f64)
    }
}

/// Tabulate curated correctness per belief bin.
///
/// A statement is correct when any of its curated mentions is. Statements
/// listed several times are counted once; statements without curation are
/// ignored. `edges` must be strictly increasing with at least two entries.
pub fn calibration_table(
    statements: &[Statement],
    correctness: &BTreeMap<StatementHash, Vec<u32>>,
    edges: &[f64],
) -> Result<Vec<BeliefBin>> {
    if edges.len() < 2 || edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(CredenceError::InvalidData(format!(
            "belief bin edges must be strictly increasing: {edges:?}"
        )));
    }
    let mut bins: Vec<BeliefBin> = edges
        .windows(2)
        .map(|w| BeliefBin {
            lower: w[0],
            upper: w[1],
            correct: 0,
            incorrect: 0,
            total: 0,
        })
        .collect();

    let beliefs: BTreeMap<StatementHash, f64> = statements.iter().map(|s| (s.id, s.belief)).collect();
    for (id, belief) in beliefs {
        let Some(bits) = correctness.get(&id) else {
            continue;
        };
        let Some(bin) = bins.iter_mut().find(|b| b.lower < belief && belief <= b.upper) else {
            continue;
        };
        if bits.iter().any(|&b| b > 0) {
            bin.correct += 1;
        } else {
            bin.incorrect += 1;
        }
        bin.total += 1;
    }
    Ok(bins)
}
