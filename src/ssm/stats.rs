use nalgebra::Point3;

use super::model::ShapeModel;
use super::point_set::PointSet;
use crate::error::{SsmError, SsmResult};

/// Summary of a population of distances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceStats {
    pub mean: f64,
    /// Population standard deviation (denominator N).
    pub std: f64,
    pub count: usize,
}

impl DistanceStats {
    /// Returns `None` for an empty population.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let var = samples.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean,
            std: var.sqrt(),
            count: samples.len(),
        })
    }

    /// Standard score of `value`, undefined when the population has no spread.
    pub fn z_score(&self, value: f64) -> Option<f64> {
        if self.std > 0.0 {
            Some((value - self.mean) / self.std)
        } else {
            None
        }
    }
}

/// Distance between two points of the displayed shape, scored against the
/// same distance across the corpus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceReport {
    pub point_a: usize,
    pub point_b: usize,
    pub current: f64,
    pub stats: DistanceStats,
    pub z_score: Option<f64>,
}

impl std::fmt::Display for DistanceReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Current:\n {:.2} mm", self.current)?;
        if let Some(z) = self.z_score {
            write!(f, "\n z-score: {:.2}", z)?;
        }
        write!(
            f,
            "\nStatistics\n mean: {:.2} mm\n std: {:.2} mm",
            self.stats.mean, self.stats.std
        )
    }
}

/// Builds a [`DistanceReport`] for points `a` and `b` of `current`.
pub fn distance_report(
    model: &ShapeModel,
    a: usize,
    b: usize,
    current: &PointSet,
) -> SsmResult<DistanceReport> {
    let distances = model.distance_distribution(a, b)?;
    if current.len() != model.point_count() {
        return Err(SsmError::DimensionMismatch {
            what: "point count",
            expected: model.point_count(),
            found: current.len(),
        });
    }
    let stats = DistanceStats::from_samples(&distances).ok_or(SsmError::InvalidModel(
        "model has no samples".to_string(),
    ))?;
    let pa: Point3<f64> = current.points[a];
    let pb: Point3<f64> = current.points[b];
    let current = (pa - pb).norm();

    Ok(DistanceReport {
        point_a: a,
        point_b: b,
        current,
        stats,
        z_score: stats.z_score(current),
    })
}

#[cfg(test)]
mod stats_tests {
    use super::*;
    use crate::utils::test_utils::{cube_corpus, synthetic_corpus};
    use approx::assert_relative_eq;

    #[test]
    fn test_population_std() {
        let stats = DistanceStats::from_samples(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_relative_eq!(stats.mean, 5.0);
        assert_relative_eq!(stats.std, 2.0);
        assert_relative_eq!(stats.z_score(9.0).unwrap(), 2.0);
        assert!(DistanceStats::from_samples(&[]).is_none());
    }

    #[test]
    fn test_constant_distance_has_no_z_score() {
        let model = ShapeModel::from_point_sets(cube_corpus()).unwrap();
        let report = distance_report(&model, 0, 1, &model.mean()).unwrap();
        assert_eq!(report.current, 1.0);
        assert_eq!(report.stats.mean, 1.0);
        assert_eq!(report.stats.std, 0.0);
        assert_eq!(report.z_score, None);
        assert!(!report.to_string().contains("z-score"));
    }

    #[test]
    fn test_report_on_corpus_member() {
        let corpus = synthetic_corpus(8, 10, 31);
        let model = ShapeModel::from_point_sets(corpus.clone()).unwrap();
        let report = distance_report(&model, 2, 7, &corpus[3]).unwrap();
        let expected = (corpus[3].points[2] - corpus[3].points[7]).norm();
        assert_relative_eq!(report.current, expected, epsilon = 1e-12);
        assert_eq!(report.stats.count, 8);
        assert!(report.z_score.is_some());
        assert!(report.to_string().contains("z-score"));
    }

    #[test]
    fn test_report_rejects_bad_index() {
        let model = ShapeModel::from_point_sets(cube_corpus()).unwrap();
        assert!(distance_report(&model, 0, 2, &model.mean()).is_err());
    }
}
