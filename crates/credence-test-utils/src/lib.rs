//! Shared fixtures for Credence tests: statement and curation builders and
//! small synthetic datasets.

use std::collections::BTreeMap;

use credence_common::{
    CorrectnessData, Curation, CurationTag, Evidence, EvidenceHash, Statement, StatementHash,
};

pub use pretty_assertions::assert_eq;

/// Builder for a [`Statement`] with hand-picked evidence.
#[derive(Debug, Clone)]
pub struct StatementBuilder {
    stmt: Statement,
}

impl StatementBuilder {
    pub fn new(id: StatementHash) -> Self {
        Self {
            stmt: Statement {
                id,
                belief: 0.0,
                evidence: vec![],
            },
        }
    }

    pub fn belief(mut self, belief: f64) -> Self {
        self.stmt.belief = belief;
        self
    }

    /// Add one evidence from `source_api` read from `document`.
    pub fn evidence(mut self, source_api: &str, document: &str, hash: EvidenceHash) -> Self {
        self.stmt.evidence.push(Evidence {
            source_api: source_api.to_string(),
            document_id: Some(document.to_string()),
            source_hash: hash,
        });
        self
    }

    /// Add `count` evidences from `source_api`, each from its own document,
    /// with hashes `first_hash, first_hash + 1, ...`.
    pub fn evidences(mut self, source_api: &str, first_hash: EvidenceHash, count: usize) -> Self {
        for i in 0..count as i64 {
            let hash = first_hash + i;
            self = self.evidence(source_api, &format!("pmid{hash}"), hash);
        }
        self
    }

    pub fn build(self) -> Statement {
        self.stmt
    }
}

pub fn curation(statement_id: StatementHash, evidence_hash: EvidenceHash, tag: &str, source: &str) -> Curation {
    Curation {
        statement_id,
        evidence_hash,
        tag: CurationTag::from(tag.to_string()),
        curator: "tester".to_string(),
        source: source.to_string(),
    }
}

/// One curation per evidence of `stmt`, all with the same tag.
pub fn curate_all(stmt: &Statement, tag: &str, source: &str) -> Vec<Curation> {
    stmt.evidence
        .iter()
        .map(|ev| curation(stmt.id, ev.source_hash, tag, source))
        .collect()
}

pub fn by_id(statements: &[Statement]) -> BTreeMap<StatementHash, Statement> {
    statements.iter().map(|s| (s.id, s.clone())).collect()
}

/// Statement-level dataset: 1 of 4 correct at one mention, 3 of 4 at two,
/// 5 of 5 at five.
pub fn sanity_dataset() -> CorrectnessData {
    dataset(&[(1, &[0, 0, 1, 0]), (2, &[1, 1, 0, 1]), (5, &[1, 1, 1, 1, 1])])
}

/// Build a dataset from literal rows; panics on invalid entries.
pub fn dataset(rows: &[(u32, &[u32])]) -> CorrectnessData {
    let map = rows.iter().map(|(n, ks)| (*n, ks.to_vec())).collect();
    CorrectnessData::from_map(map).expect("fixture dataset is valid")
}
