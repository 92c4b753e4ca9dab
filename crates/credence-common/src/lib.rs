//! credence-common — Shared types, errors, and datasets used across all Credence crates.

pub mod error;
pub mod entities;
pub mod correctness;
pub mod weights;
pub mod reader_config;

// Re-export commonly used types
pub use correctness::{CorrectnessData, EmpiricalCorrectness};
pub use entities::{Aggregation, Curation, CurationTag, Evidence, EvidenceHash, Statement, StatementHash};
pub use error::{CredenceError, Result};
pub use reader_config::{LikelihoodMode, ModelKind, ModelSpec, ReaderProfile};
pub use weights::MentionWeights;
