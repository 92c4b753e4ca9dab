//! credence-curation — From curator judgments to correctness datasets.
//!
//! Aggregates curations into the dataset the belief models are fitted on,
//! draws statement samples for curation, and summarises mention-count
//! distributions and belief calibration.

pub mod aggregate;
pub mod sample;
pub mod distribution;
pub mod calibration;

pub use aggregate::{
    dataset_table, get_correctness_data, group_curations, AggregationPolicy, AggregationReport, CurationTally,
    DatasetRow, EvidenceVerdict, SuspiciousCuration,
};
pub use calibration::{calibration_table, BeliefBin, DEFAULT_BELIEF_BINS};
pub use distribution::{count_mentions, mention_distribution};
pub use sample::{load_sample_hashes, restrict_to_source, sample_for_curation};
