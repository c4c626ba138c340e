use nalgebra::DMatrix;

use super::point_set::PointSet;
use crate::error::CorpusError;

pub const MIN_SAMPLES: usize = 2;

/// Population of point sets in dense correspondence.
///
/// Point `k` of every member is the same anatomical location. That property
/// comes from the registration step upstream and can only be checked here
/// through the point counts.
#[derive(Debug, Clone)]
pub struct Corpus {
    members: Vec<PointSet>,
}

impl Corpus {
    /// Validates the members and takes ownership of them.
    ///
    /// Checks run before any numerical work: sample count, empty point sets,
    /// point counts (every offending member is reported), then finiteness.
    pub fn new(members: Vec<PointSet>) -> Result<Self, CorpusError> {
        if members.len() < MIN_SAMPLES {
            return Err(CorpusError::TooFewSamples {
                required: MIN_SAMPLES,
                found: members.len(),
            });
        }

        let expected = members[0].len();
        if expected == 0 {
            return Err(CorpusError::EmptyPointSet);
        }

        let mismatched: Vec<(usize, usize)> = members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.len() != expected)
            .map(|(i, m)| (i, m.len()))
            .collect();
        if !mismatched.is_empty() {
            return Err(CorpusError::PointCountMismatch {
                expected,
                mismatched,
            });
        }

        for (member, ps) in members.iter().enumerate() {
            if let Some(point) = ps.first_non_finite() {
                return Err(CorpusError::NonFinite { member, point });
            }
        }

        Ok(Self { members })
    }

    pub fn sample_count(&self) -> usize {
        self.members.len()
    }

    pub fn point_count(&self) -> usize {
        self.members[0].len()
    }

    pub fn members(&self) -> &[PointSet] {
        &self.members
    }

    /// N x 3P data matrix, one flattened member per row.
    pub fn data_matrix(&self) -> DMatrix<f64> {
        let n = self.sample_count();
        let d = self.point_count() * 3;
        let mut data = DMatrix::zeros(n, d);
        for (i, member) in self.members.iter().enumerate() {
            for (p, point) in member.points.iter().enumerate() {
                data[(i, 3 * p)] = point.x;
                data[(i, 3 * p + 1)] = point.y;
                data[(i, 3 * p + 2)] = point.z;
            }
        }
        data
    }

    pub fn into_members(self) -> Vec<PointSet> {
        self.members
    }
}
