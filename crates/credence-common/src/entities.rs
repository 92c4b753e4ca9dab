/// Core entity types consumed from the knowledge base and the curation store.
/// The core treats all of them as read-only input.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable statement identifier (the preassembly hash).
pub type StatementHash = i64;
/// Per-mention identifier; distinct evidences with identical text share it.
pub type EvidenceHash = i64;

// ---------------------------------------------------------------------------
// Statement / Evidence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Extraction system that produced the mention, e.g. "reach".
    pub source_api: String,
    /// Document the mention was read from (PMID).
    #[serde(default)]
    pub document_id: Option<String>,
    pub source_hash: EvidenceHash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub id: StatementHash,
    #[serde(default)]
    pub belief: f64,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
}

impl Statement {
    /// Number of evidences carrying the given hash.
    pub fn evidence_multiplicity(&self, hash: EvidenceHash) -> usize {
        self.evidence.iter().filter(|e| e.source_hash == hash).count()
    }

    pub fn find_evidence(&self, hash: EvidenceHash) -> Option<&Evidence> {
        self.evidence.iter().find(|e| e.source_hash == hash)
    }

    /// Mention counts per extraction source.
    pub fn mentions_by_source(&self) -> BTreeMap<String, u32> {
        let mut counts = BTreeMap::new();
        for ev in &self.evidence {
            *counts.entry(ev.source_api.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Copy of the statement keeping only evidence from one source.
    pub fn restricted_to_source(&self, source_api: &str) -> Statement {
        Statement {
            id: self.id,
            belief: self.belief,
            evidence: self
                .evidence
                .iter()
                .filter(|e| e.source_api == source_api)
                .cloned()
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Curation
// ---------------------------------------------------------------------------

/// Curator judgment for one evidence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CurationTag {
    Correct,
    Hypothesis,
    ActVsAmt,
    /// Any other tag (wrong relation, grounding, polarity, ...) counts as incorrect.
    Other(String),
}

impl CurationTag {
    /// Tags that confirm the extraction.
    pub fn is_positive(&self) -> bool {
        matches!(self, CurationTag::Correct | CurationTag::Hypothesis | CurationTag::ActVsAmt)
    }

    pub fn as_str(&self) -> &str {
        match self {
            CurationTag::Correct => "correct",
            CurationTag::Hypothesis => "hypothesis",
            CurationTag::ActVsAmt => "act_vs_amt",
            CurationTag::Other(tag) => tag,
        }
    }
}

impl From<String> for CurationTag {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "correct" => CurationTag::Correct,
            "hypothesis" => CurationTag::Hypothesis,
            "act_vs_amt" => CurationTag::ActVsAmt,
            _ => CurationTag::Other(tag),
        }
    }
}

impl From<CurationTag> for String {
    fn from(tag: CurationTag) -> Self {
        tag.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curation {
    #[serde(alias = "pa_hash")]
    pub statement_id: StatementHash,
    #[serde(alias = "source_hash")]
    pub evidence_hash: EvidenceHash,
    pub tag: CurationTag,
    #[serde(default)]
    pub curator: String,
    /// Curation batch tag, e.g. "bioexp_paper_reach".
    pub source: String,
}

// ---------------------------------------------------------------------------
// Aggregation level
// ---------------------------------------------------------------------------

/// What counts as one "mention" when aggregating curations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Each evidence is a mention.
    #[default]
    Evidence,
    /// Each distinct document is a mention.
    #[serde(alias = "pmid")]
    Document,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(source: &str, pmid: &str, hash: i64) -> Evidence {
        Evidence {
            source_api: source.to_string(),
            document_id: Some(pmid.to_string()),
            source_hash: hash,
        }
    }

    #[test]
    fn test_positive_tags() {
        assert!(CurationTag::from("correct".to_string()).is_positive());
        assert!(CurationTag::from("hypothesis".to_string()).is_positive());
        assert!(CurationTag::from("act_vs_amt".to_string()).is_positive());
        assert!(!CurationTag::from("grounding".to_string()).is_positive());
    }

    #[test]
    fn test_curation_deserializes_database_field_names() {
        let json = r#"{"pa_hash": 12, "source_hash": -5, "tag": "polarity",
                       "curator": "ann", "source": "bioexp_paper_reach"}"#;
        let cur: Curation = serde_json::from_str(json).unwrap();
        assert_eq!(cur.statement_id, 12);
        assert_eq!(cur.evidence_hash, -5);
        assert_eq!(cur.tag, CurationTag::Other("polarity".to_string()));
        assert_eq!(serde_json::to_value(&cur.tag).unwrap(), "polarity");
    }

    #[test]
    fn test_multiplicity_and_source_restriction() {
        let stmt = Statement {
            id: 1,
            belief: 0.8,
            evidence: vec![ev("reach", "1", 10), ev("reach", "1", 10), ev("sparser", "2", 11)],
        };
        assert_eq!(stmt.evidence_multiplicity(10), 2);
        assert_eq!(stmt.mentions_by_source()["reach"], 2);
        let reach_only = stmt.restricted_to_source("reach");
        assert_eq!(reach_only.evidence.len(), 2);
        assert!(reach_only.find_evidence(11).is_none());
    }

    #[test]
    fn test_aggregation_accepts_pmid_alias() {
        let level: Aggregation = serde_json::from_str("\"pmid\"").unwrap();
        assert_eq!(level, Aggregation::Document);
    }
}
