//! Typed reader profiles.
//!
//! One profile per extraction system ("reader"): where its curated samples
//! live, which curation batches belong to it, how curations are aggregated
//! and which belief model it is fitted with. Profiles are usually embedded in
//! `credence.toml` as `[[readers]]` tables but can be loaded standalone from
//! YAML or JSON.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::path::{Path, PathBuf};

use crate::entities::Aggregation;

// ── Model selection ──────────────────────────────────────────────────────────

/// Belief model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Binomial,
    BetaBinomial,
    /// Random/systematic error model behind the assembled belief scores.
    #[serde(alias = "orig_belief")]
    RandomSystematic,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::Binomial,
        ModelKind::BetaBinomial,
        ModelKind::RandomSystematic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Binomial => "binomial",
            ModelKind::BetaBinomial => "beta_binomial",
            ModelKind::RandomSystematic => "random_systematic",
        }
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orig_belief" => Ok(ModelKind::RandomSystematic),
            _ => ModelKind::ALL
                .into_iter()
                .find(|k| k.as_str() == s)
                .ok_or_else(|| format!("unknown model kind '{s}'")),
        }
    }
}

/// Which outcome the likelihood scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LikelihoodMode {
    /// Number of correct mentions out of `n`.
    #[serde(alias = "ev")]
    Evidence,
    /// Whether the statement as a whole is correct.
    #[default]
    #[serde(alias = "stmt")]
    Statement,
}

impl LikelihoodMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LikelihoodMode::Evidence => "evidence",
            LikelihoodMode::Statement => "statement",
        }
    }
}

impl FromStr for LikelihoodMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "evidence" | "ev" => Ok(LikelihoodMode::Evidence),
            "statement" | "stmt" => Ok(LikelihoodMode::Statement),
            _ => Err(format!("unknown likelihood mode '{s}'")),
        }
    }
}

/// A model kind together with its likelihood mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelSpec {
    pub kind: ModelKind,
    #[serde(default)]
    pub mode: LikelihoodMode,
}

impl ModelSpec {
    pub fn new(kind: ModelKind, mode: LikelihoodMode) -> Self {
        Self { kind, mode }
    }

    /// Every supported model variant, statement mode first.
    pub fn all() -> Vec<ModelSpec> {
        let mut specs = Vec::with_capacity(6);
        for kind in ModelKind::ALL {
            specs.push(ModelSpec::new(kind, LikelihoodMode::Statement));
            specs.push(ModelSpec::new(kind, LikelihoodMode::Evidence));
        }
        specs
    }

    /// Short label used in report tables, e.g. `beta_binomial_stmt`.
    pub fn label(&self) -> String {
        let suffix = match self.mode {
            LikelihoodMode::Evidence => "ev",
            LikelihoodMode::Statement => "stmt",
        };
        format!("{}_{suffix}", self.kind.as_str())
    }
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self::new(ModelKind::RandomSystematic, LikelihoodMode::Statement)
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

// ── Reader profile ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderProfile {
    /// Reader name, e.g. "reach".
    pub name: String,

    /// Evidence `source_api` of this reader. Defaults to `name`.
    #[serde(default)]
    pub source_api: Option<String>,

    /// Curation batch tags holding this reader's judgments.
    #[serde(default)]
    pub curation_sources: Vec<String>,

    /// JSON files listing the statement hashes sampled for curation,
    /// one entry per draw.
    #[serde(default)]
    pub sample_files: Vec<PathBuf>,

    #[serde(default)]
    pub aggregation: Aggregation,

    #[serde(default)]
    pub allow_incomplete: bool,

    #[serde(default = "default_allow_incomplete_correct")]
    pub allow_incomplete_correct: bool,

    #[serde(default)]
    pub model: ModelSpec,

    /// Empirical evidence-count distribution for this reader.
    #[serde(default)]
    pub evidence_distribution: Option<PathBuf>,

    /// Empirical document-count distribution for this reader.
    #[serde(default)]
    pub document_distribution: Option<PathBuf>,
}

fn default_allow_incomplete_correct() -> bool { false }

impl ReaderProfile {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            source_api: None,
            curation_sources: vec![format!("bioexp_paper_{name}")],
            sample_files: vec![],
            aggregation: Aggregation::default(),
            allow_incomplete: false,
            allow_incomplete_correct: default_allow_incomplete_correct(),
            model: ModelSpec::default(),
            evidence_distribution: None,
            document_distribution: None,
        }
    }

    pub fn source_api(&self) -> &str {
        self.source_api.as_deref().unwrap_or(&self.name)
    }

    /// Distribution file matching the configured aggregation level.
    pub fn mention_distribution(&self) -> Option<&PathBuf> {
        match self.aggregation {
            Aggregation::Evidence => self.evidence_distribution.as_ref(),
            Aggregation::Document => self.document_distribution.as_ref(),
        }
    }

    /// Load from YAML file
    pub fn from_yaml(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let profile: Self = serde_yaml::from_str(&content)?;
        Ok(profile)
    }

    /// Load from JSON file
    pub fn from_json(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let profile: Self = serde_json::from_str(&content)?;
        Ok(profile)
    }

    /// Load from a `.json` file, or YAML otherwise.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(path),
            _ => Self::from_yaml(path),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
