use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredenceError {
    #[error("Invalid parameters for {model}: {params:?} ({reason})")]
    InvalidParameters {
        model: String,
        params: Vec<f64>,
        reason: String,
    },

    /// Log of a zero probability (or NaN) for an outcome that was observed.
    #[error("Numerical degeneracy: {context} (params {params:?})")]
    NumericalDegeneracy { context: String, params: Vec<f64> },

    #[error("Invalid count: k = {k}, n = {n}")]
    InvalidCount { k: u32, n: u32 },

    #[error("Invalid correctness data: {0}")]
    InvalidData(String),

    #[error("No weight for mention count {num_mentions}")]
    MissingWeight { num_mentions: u32 },

    #[error("Sampler error: {0}")]
    Sampler(String),

    #[error("Sampling cancelled after {completed_steps} steps")]
    Cancelled { completed_steps: usize },

    #[error("Posterior sample set is empty")]
    EmptyPosterior,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CredenceError>;

impl CredenceError {
    /// Degeneracy raised while scoring one observation of the dataset.
    pub fn degenerate_observation(
        model: &str,
        num_mentions: u32,
        num_correct: u32,
        params: &[f64],
    ) -> Self {
        CredenceError::NumericalDegeneracy {
            context: format!(
                "{model} assigns zero probability to {num_correct} of {num_mentions} mentions correct"
            ),
            params: params.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_observation_names_counts_and_params() {
        let err = CredenceError::degenerate_observation("binomial", 3, 0, &[1.0]);
        let msg = err.to_string();
        assert!(msg.contains("0 of 3"), "{msg}");
        assert!(msg.contains("[1.0]"), "{msg}");
    }

    #[test]
    fn test_missing_weight_message() {
        let err = CredenceError::MissingWeight { num_mentions: 7 };
        assert_eq!(err.to_string(), "No weight for mention count 7");
    }
}
