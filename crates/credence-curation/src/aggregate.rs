//! Aggregation of curator judgments into the correctness dataset.
//!
//! Curations are grouped by statement and evidence hash, each hash is
//! resolved to a single correct/incorrect bit, and every sampled statement
//! whose curation is complete enough contributes its number of correct
//! mentions, keyed by the number of mentions that were judged.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use credence_common::{
    Aggregation, CorrectnessData, Curation, CurationTag, EvidenceHash, ReaderProfile, Result, Statement,
    StatementHash,
};

/// Curations grouped by statement id, then evidence hash.
pub type GroupedCurations = BTreeMap<StatementHash, BTreeMap<EvidenceHash, Vec<CurationTag>>>;

/// Which statements make it into the dataset, and what counts as a mention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationPolicy {
    pub level: Aggregation,
    /// Keep statements with uncurated evidence.
    pub allow_incomplete: bool,
    /// Keep statements with uncurated evidence if some curated mention is correct.
    pub allow_incomplete_correct: bool,
}

impl From<&ReaderProfile> for AggregationPolicy {
    fn from(profile: &ReaderProfile) -> Self {
        Self {
            level: profile.aggregation,
            allow_incomplete: profile.allow_incomplete,
            allow_incomplete_correct: profile.allow_incomplete_correct,
        }
    }
}

/// Resolution of all judgments made for one evidence hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceVerdict {
    /// Every judgment is positive.
    Correct,
    /// Every judgment is negative.
    Incorrect,
    /// Curators disagree. Counted as incorrect.
    Suspicious,
}

impl EvidenceVerdict {
    pub fn resolve(tags: &[CurationTag]) -> Self {
        let positive = tags.iter().filter(|t| t.is_positive()).count();
        if positive == 0 {
            EvidenceVerdict::Incorrect
        } else if positive == tags.len() {
            EvidenceVerdict::Correct
        } else {
            EvidenceVerdict::Suspicious
        }
    }

    pub fn bit(self) -> u32 {
        u32::from(self == EvidenceVerdict::Correct)
    }
}

/// An evidence hash with disagreeing judgments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousCuration {
    pub statement_id: StatementHash,
    pub evidence_hash: EvidenceHash,
    pub tags: Vec<CurationTag>,
}

/// Running totals across aggregation calls. The caller owns it and passes
/// it to every call whose totals should be pooled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurationTally {
    /// Evidence hashes of included statements that carry a judgment.
    pub curated_hashes: BTreeSet<EvidenceHash>,
    /// Evidence objects of included statements, each statement counted once.
    pub mentions: usize,
    /// Statements included in a dataset.
    pub statements: BTreeSet<StatementHash>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationReport {
    pub dataset: CorrectnessData,
    /// Correctness bits of every included statement.
    pub correctness: BTreeMap<StatementHash, Vec<u32>>,
    /// Sampled statements left out for lack of curation.
    pub skipped: Vec<StatementHash>,
    pub suspicious: Vec<SuspiciousCuration>,
    /// Curated statement ids that were not among the sampled statements.
    pub unknown_statements: Vec<StatementHash>,
    /// Evidence objects of the statements included by this call.
    pub num_mentions: usize,
}

/// Group the curations tagged with one of `sources`.
pub fn group_curations(sources: &[String], curations: &[Curation]) -> GroupedCurations {
    let mut grouped = GroupedCurations::new();
    for cur in curations.iter().filter(|c| sources.contains(&c.source)) {
        grouped
            .entry(cur.statement_id)
            .or_default()
            .entry(cur.evidence_hash)
            .or_default()
            .push(cur.tag.clone());
    }
    grouped
}

/// Whether every evidence hash of `stmt` has at least one judgment.
pub fn is_fully_curated(stmt: &Statement, curated: &BTreeMap<EvidenceHash, Vec<CurationTag>>) -> bool {
    stmt.evidence.iter().all(|ev| curated.contains_key(&ev.source_hash))
}

/// Per-mention correctness bits for one statement at the given level.
///
/// Evidence level yields one bit per curated evidence object, so a hash
/// shared by several evidences is counted that many times. Document level
/// yields one bit per document with a curated evidence, set if any of them
/// is correct.
fn correctness_bits(
    stmt: &Statement,
    verdicts: &BTreeMap<EvidenceHash, EvidenceVerdict>,
    level: Aggregation,
) -> Vec<u32> {
    let curated = stmt
        .evidence
        .iter()
        .filter_map(|ev| verdicts.get(&ev.source_hash).map(|v| (ev, v.bit())));
    match level {
        Aggregation::Evidence => curated.map(|(_, bit)| bit).collect(),
        Aggregation::Document => {
            let mut by_doc: BTreeMap<String, u32> = BTreeMap::new();
            for (ev, bit) in curated {
                // Evidence without a document stands alone
                let doc = ev
                    .document_id
                    .clone()
                    .unwrap_or_else(|| format!("hash:{}", ev.source_hash));
                let entry = by_doc.entry(doc).or_insert(0);
                *entry = (*entry).max(bit);
            }
            by_doc.into_values().collect()
        }
    }
}

/// Build the correctness dataset for one reader.
///
/// `sampled` may list the same statement several times; each draw adds one
/// observation. Totals of included statements are added to `tally`.
pub fn get_correctness_data(
    sources: &[String],
    curations: &[Curation],
    sampled: &[Statement],
    policy: &AggregationPolicy,
    tally: &mut CurationTally,
) -> Result<AggregationReport> {
    let grouped = group_curations(sources, curations);

    let mut draws: BTreeMap<StatementHash, usize> = BTreeMap::new();
    let mut statements: BTreeMap<StatementHash, &Statement> = BTreeMap::new();
    for stmt in sampled {
        *draws.entry(stmt.id).or_insert(0) += 1;
        statements.entry(stmt.id).or_insert(stmt);
    }

    let mut report = AggregationReport::default();
    for &stmt_id in grouped.keys() {
        if !statements.contains_key(&stmt_id) {
            warn!("Curated statement {stmt_id} is not among the sampled statements");
            report.unknown_statements.push(stmt_id);
        }
    }

    let empty = BTreeMap::new();
    for (&stmt_id, &stmt) in &statements {
        let curated = grouped.get(&stmt_id).unwrap_or(&empty);

        let mut verdicts = BTreeMap::new();
        for (&hash, tags) in curated {
            if stmt.find_evidence(hash).is_none() {
                debug!("Curated evidence {hash} does not belong to statement {stmt_id}");
                continue;
            }
            let verdict = EvidenceVerdict::resolve(tags);
            if verdict == EvidenceVerdict::Suspicious {
                warn!("Suspicious curation for statement {stmt_id}, evidence {hash}: {tags:?}");
                report.suspicious.push(SuspiciousCuration {
                    statement_id: stmt_id,
                    evidence_hash: hash,
                    tags: tags.clone(),
                });
            }
            verdicts.insert(hash, verdict);
        }

        let bits = correctness_bits(stmt, &verdicts, policy.level);
        let complete = is_fully_curated(stmt, curated);
        let any_correct = bits.iter().any(|&b| b == 1);
        if !(complete || policy.allow_incomplete || (policy.allow_incomplete_correct && any_correct)) {
            info!(
                "Skipping statement {stmt_id}: {} of {} evidences curated",
                verdicts.len(),
                stmt.evidence.len()
            );
            report.skipped.push(stmt_id);
            continue;
        }
        if bits.is_empty() {
            warn!("Skipping statement {stmt_id}: no curated mentions");
            report.skipped.push(stmt_id);
            continue;
        }

        let num_mentions = bits.len() as u32;
        let num_correct: u32 = bits.iter().sum();
        report
            .dataset
            .push_repeated(num_mentions, num_correct, draws[&stmt_id])?;
        report.num_mentions += stmt.evidence.len();

        tally.curated_hashes.extend(verdicts.keys().copied());
        if tally.statements.insert(stmt_id) {
            tally.mentions += stmt.evidence.len();
        }
        report.correctness.insert(stmt_id, bits);
    }

    info!(
        "Aggregated {} statements ({} observations), skipped {}",
        report.correctness.len(),
        report.dataset.num_statements(),
        report.skipped.len()
    );
    Ok(report)
}

/// One line of the dataset summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub num_mentions: u32,
    /// Statements with at least one correct mention.
    pub num_correct: usize,
    pub total: usize,
}

impl fmt::Display for DatasetRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.num_mentions, self.num_correct, self.total)
    }
}

pub fn dataset_table(data: &CorrectnessData) -> Vec<DatasetRow> {
    data.empirical_correctness()
        .into_iter()
        .map(|row| DatasetRow {
            num_mentions: row.num_mentions,
            num_correct: row.num_correct,
            total: row.count,
        })
        .collect()
}
