//! Error types for shape model construction and queries.

use thiserror::Error;

/// Reasons a corpus is rejected before any numerical work happens.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CorpusError {
    /// PCA over fewer than two samples is degenerate.
    #[error("at least {required} point sets required, got {found}")]
    TooFewSamples { required: usize, found: usize },

    /// The first point set has no points, so P would be zero.
    #[error("point sets must contain at least one point")]
    EmptyPointSet,

    /// Members whose point count differs from the first member.
    #[error(
        "point count mismatch: expected {expected} points (member 0), offending members {}",
        format_mismatches(.mismatched)
    )]
    PointCountMismatch {
        expected: usize,
        /// `(member index, point count)` for every offending member.
        mismatched: Vec<(usize, usize)>,
    },

    /// A coordinate is NaN or infinite.
    #[error("member {member} has a non-finite coordinate at point {point}")]
    NonFinite { member: usize, point: usize },
}

fn format_mismatches(mismatched: &[(usize, usize)]) -> String {
    mismatched
        .iter()
        .map(|(member, count)| format!("#{} ({} points)", member, count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised by the shape model core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SsmError {
    #[error("invalid corpus: {0}")]
    InvalidCorpus(#[from] CorpusError),

    /// A caller-supplied vector does not fit the model.
    #[error("dimension mismatch for {what}: expected {expected}, got {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{what} index {index} out of range (valid: 0..{len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// Triangle refers to a point the point set does not have.
    #[error("triangle {triangle} references point {index}, but only {point_count} points exist")]
    InvalidConnectivity {
        triangle: usize,
        index: usize,
        point_count: usize,
    },

    /// Stored model parts are inconsistent with each other.
    #[error("invalid model: {0}")]
    InvalidModel(String),
}

pub type SsmResult<T> = Result<T, SsmError>;
