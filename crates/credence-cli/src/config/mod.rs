//! Configuration loading for Credence.
//! Reads credence.toml from the current directory, the path in the
//! CREDENCE_CONFIG env var, or the path given with --config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use credence_belief::{DesignPlan, MentionCost, SamplerConfig};
use credence_common::{MentionWeights, ReaderProfile};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub input: InputConfig,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub design: DesignConfig,
    #[serde(default)]
    pub readers: Vec<ReaderProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// JSON list of assembled statements.
    pub statements: PathBuf,
    /// JSON list of curations.
    pub curations: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Standalone reader profiles (YAML, or JSON by extension), added to
    /// the `[[readers]]` tables.
    #[serde(default)]
    pub reader_files: Vec<PathBuf>,
}

fn default_output_dir() -> PathBuf { PathBuf::from("./output") }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignConfig {
    #[serde(default = "default_budget")]
    pub budget: f64,
    #[serde(default = "default_max_mentions")]
    pub max_mentions: u32,
    #[serde(default)]
    pub cost: MentionCost,
    #[serde(default)]
    pub candidates: Option<Vec<u32>>,
}

fn default_budget()       -> f64 { 100.0 }
fn default_max_mentions() -> u32 { 10 }

impl Default for DesignConfig {
    fn default() -> Self {
        Self {
            budget: default_budget(),
            max_mentions: default_max_mentions(),
            cost: MentionCost::default(),
            candidates: None,
        }
    }
}

impl DesignConfig {
    pub fn to_plan(&self, mention_probabilities: Option<MentionWeights>) -> DesignPlan {
        DesignPlan {
            candidates: self.candidates.clone(),
            mention_probabilities,
            ..DesignPlan::new(self.budget, self.max_mentions, self.cost)
        }
    }
}

mod tests;

impl Config {
    /// Load configuration from credence.toml.
    /// An explicit path wins over CREDENCE_CONFIG, which wins over the
    /// current directory.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(
                std::env::var("CREDENCE_CONFIG").unwrap_or_else(|_| "credence.toml".to_string()),
            ),
        };

        if !path.exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Copy credence.example.toml to credence.toml and edit it.",
                path.display()
            );
        }

        let content = std::fs::read_to_string(&path)?;
        let mut config = Self::parse(&content)?;
        config.load_reader_files()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.fill_reader_defaults();
        Ok(config)
    }

    /// Append the profiles listed in `input.reader_files`.
    pub fn load_reader_files(&mut self) -> anyhow::Result<()> {
        for path in &self.input.reader_files {
            let profile = ReaderProfile::from_file(path)
                .map_err(|e| anyhow::anyhow!("Reading reader profile {}: {e}", path.display()))?;
            if self.readers.iter().any(|r| r.name == profile.name) {
                anyhow::bail!("Reader '{}' is defined more than once", profile.name);
            }
            self.readers.push(profile);
        }
        self.fill_reader_defaults();
        Ok(())
    }

    fn fill_reader_defaults(&mut self) {
        for reader in &mut self.readers {
            if reader.curation_sources.is_empty() {
                reader.curation_sources = ReaderProfile::new(&reader.name).curation_sources;
            }
        }
    }

    pub fn reader(&self, name: &str) -> anyhow::Result<&ReaderProfile> {
        self.readers
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| anyhow::anyhow!("No reader named '{name}' in the configuration"))
    }
}
