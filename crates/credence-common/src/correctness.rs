//! Aggregated correctness dataset: the sole input to model fitting.
//!
//! Maps a mention count `n` to the number of correct mentions observed for
//! every curated statement with `n` mentions. A statement sampled twice into
//! a curation batch contributes two entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CredenceError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<u32, Vec<u32>>", into = "BTreeMap<u32, Vec<u32>>")]
pub struct CorrectnessData {
    by_mentions: BTreeMap<u32, Vec<u32>>,
}

impl CorrectnessData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a raw map, checking `1 <= n` and `k <= n` for every entry.
    pub fn from_map(map: BTreeMap<u32, Vec<u32>>) -> Result<Self> {
        for (&n, ks) in &map {
            for &k in ks {
                check_entry(n, k)?;
            }
        }
        Ok(Self { by_mentions: map })
    }

    pub fn push(&mut self, num_mentions: u32, num_correct: u32) -> Result<()> {
        check_entry(num_mentions, num_correct)?;
        self.by_mentions.entry(num_mentions).or_default().push(num_correct);
        Ok(())
    }

    /// Add `copies` identical observations.
    pub fn push_repeated(&mut self, num_mentions: u32, num_correct: u32, copies: usize) -> Result<()> {
        check_entry(num_mentions, num_correct)?;
        self.by_mentions
            .entry(num_mentions)
            .or_default()
            .extend(std::iter::repeat(num_correct).take(copies));
        Ok(())
    }

    pub fn get(&self, num_mentions: u32) -> Option<&[u32]> {
        self.by_mentions.get(&num_mentions).map(Vec::as_slice)
    }

    /// Iterate `(num_mentions, num_correct values)` in ascending mention order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u32])> {
        self.by_mentions.iter().map(|(&n, ks)| (n, ks.as_slice()))
    }

    pub fn mention_counts(&self) -> Vec<u32> {
        self.by_mentions.keys().copied().collect()
    }

    /// Number of distinct mention counts.
    pub fn num_mention_counts(&self) -> usize {
        self.by_mentions.len()
    }

    /// Number of statement observations.
    pub fn num_statements(&self) -> usize {
        self.by_mentions.values().map(Vec::len).sum()
    }

    pub fn max_mentions(&self) -> Option<u32> {
        self.by_mentions.keys().next_back().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.num_statements() == 0
    }

    /// Collapse to statement level: any correct mention makes the statement correct.
    pub fn to_statement_level(&self) -> CorrectnessData {
        let by_mentions = self
            .by_mentions
            .iter()
            .map(|(&n, ks)| (n, ks.iter().map(|&k| u32::from(k >= 1)).collect()))
            .collect();
        CorrectnessData { by_mentions }
    }

    /// Merge another dataset into this one.
    pub fn extend_from(&mut self, other: &CorrectnessData) {
        for (n, ks) in other.iter() {
            self.by_mentions.entry(n).or_default().extend_from_slice(ks);
        }
    }

    /// Empirical statement-level correctness per mention count.
    pub fn empirical_correctness(&self) -> Vec<EmpiricalCorrectness> {
        self.iter()
            .filter(|(_, ks)| !ks.is_empty())
            .map(|(n, ks)| {
                let count = ks.len();
                let num_correct = ks.iter().filter(|&&k| k >= 1).count();
                let mean = num_correct as f64 / count as f64;
                // Twice the standard error of a proportion, sqrt(pq/N)
                let two_stderr = 2.0 * (mean * (1.0 - mean) / count as f64).sqrt();
                EmpiricalCorrectness {
                    num_mentions: n,
                    count,
                    num_correct,
                    mean,
                    two_stderr,
                }
            })
            .collect()
    }
}

fn check_entry(num_mentions: u32, num_correct: u32) -> Result<()> {
    if num_mentions == 0 {
        return Err(CredenceError::InvalidData(
            "mention count must be at least 1".to_string(),
        ));
    }
    if num_correct > num_mentions {
        return Err(CredenceError::InvalidCount {
            k: num_correct,
            n: num_mentions,
        });
    }
    Ok(())
}

impl TryFrom<BTreeMap<u32, Vec<u32>>> for CorrectnessData {
    type Error = CredenceError;

    fn try_from(map: BTreeMap<u32, Vec<u32>>) -> Result<Self> {
        Self::from_map(map)
    }
}

impl From<CorrectnessData> for BTreeMap<u32, Vec<u32>> {
    fn from(data: CorrectnessData) -> Self {
        data.by_mentions
    }
}

/// One row of the empirical correctness curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmpiricalCorrectness {
    pub num_mentions: u32,
    /// Statements observed with this many mentions.
    pub count: usize,
    /// Statements with at least one correct mention.
    pub num_correct: usize,
    pub mean: f64,
    pub two_stderr: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> CorrectnessData {
        CorrectnessData::from_map(BTreeMap::from([
            (1, vec![0, 0, 1, 0]),
            (2, vec![1, 2, 0, 1]),
            (5, vec![5, 4, 1, 3, 2]),
        ]))
        .unwrap()
    }

    #[test]
    fn test_rejects_more_correct_than_mentions() {
        let err = CorrectnessData::from_map(BTreeMap::from([(2, vec![3])])).unwrap_err();
        assert!(matches!(err, CredenceError::InvalidCount { k: 3, n: 2 }));
        let mut data = CorrectnessData::new();
        assert!(data.push(0, 0).is_err());
    }

    #[test]
    fn test_counts() {
        let data = sample();
        assert_eq!(data.num_mention_counts(), 3);
        assert_eq!(data.num_statements(), 13);
        assert_eq!(data.max_mentions(), Some(5));
        assert_eq!(data.mention_counts(), vec![1, 2, 5]);
    }

    #[test]
    fn test_statement_level_collapse() {
        let stmt = sample().to_statement_level();
        assert_eq!(stmt.get(2), Some(&[1, 1, 0, 1][..]));
        assert_eq!(stmt.get(5), Some(&[1, 1, 1, 1, 1][..]));
    }

    #[test]
    fn test_empirical_correctness() {
        let rows = sample().empirical_correctness();
        assert_eq!(rows[0].num_correct, 1);
        assert!((rows[0].mean - 0.25).abs() < 1e-12);
        let expected = 2.0 * (0.25f64 * 0.75 / 4.0).sqrt();
        assert!((rows[0].two_stderr - expected).abs() < 1e-12);
        assert_eq!(rows[2].two_stderr, 0.0);
    }

    #[test]
    fn test_json_roundtrip_and_validation() {
        let data = sample();
        let json = serde_json::to_string(&data).unwrap();
        let parsed: CorrectnessData = serde_json::from_str(&json).unwrap();
        assert_eq!(data, parsed);
        assert!(serde_json::from_str::<CorrectnessData>(r#"{"1": [2]}"#).is_err());
    }
}
