//! Coefficient state behind an interactive shape viewer.
//!
//! The viewer owns one [`MorphState`], mutates it from slider events and
//! asks it for a fresh [`MeshGeometry`] to draw. The shape model itself is
//! never modified.

use log::debug;

use super::model::ShapeModel;
use crate::error::{SsmError, SsmResult};
use crate::mesh::{recompute_mesh, MeshGeometry};

/// A morph endpoint: the mean shape or one corpus member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Mean,
    Case(usize),
}

impl Shape {
    /// Combo-box style index: 0 is the mean, `i + 1` is case `i`.
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Shape::Mean,
            i => Shape::Case(i - 1),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Shape::Mean => "average".to_string(),
            Shape::Case(i) => format!("case {}", i + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MorphState {
    coefficients: Vec<f64>,
    pcs: usize,
}

impl MorphState {
    /// Starts at the mean shape with `pcs` modes exposed to sliders, capped
    /// at the number of modes the model has.
    pub fn new(model: &ShapeModel, pcs: usize) -> Self {
        Self {
            coefficients: vec![0.0; model.mode_count()],
            pcs: pcs.min(model.mode_count()),
        }
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn pcs(&self) -> usize {
        self.pcs
    }

    /// Replaces the whole coefficient vector. Shorter vectors are padded with zeros.
    pub fn set_coefficients(&mut self, model: &ShapeModel, coefficients: &[f64]) -> SsmResult<()> {
        if coefficients.len() > model.mode_count() {
            return Err(SsmError::DimensionMismatch {
                what: "coefficients",
                expected: model.mode_count(),
                found: coefficients.len(),
            });
        }
        self.coefficients = vec![0.0; model.mode_count()];
        self.coefficients[..coefficients.len()].copy_from_slice(coefficients);
        Ok(())
    }

    fn shape_coefficients(model: &ShapeModel, shape: Shape) -> SsmResult<Vec<f64>> {
        match shape {
            Shape::Mean => Ok(vec![0.0; model.mode_count()]),
            Shape::Case(i) => model.sample_coefficients(i),
        }
    }

    /// Linear blend `(1 - t) · from + t · to` in coefficient space. `t`
    /// outside `[0, 1]` extrapolates.
    pub fn morph(&mut self, model: &ShapeModel, from: Shape, to: Shape, t: f64) -> SsmResult<()> {
        let a = Self::shape_coefficients(model, from)?;
        let b = Self::shape_coefficients(model, to)?;
        debug!("Morph {:?} -> {:?} at {}", from, to, t);
        self.coefficients = a
            .iter()
            .zip(&b)
            .map(|(x, y)| (1.0 - t) * x + t * y)
            .collect();
        Ok(())
    }

    /// Puts mode `m` at `sd` standard deviations, leaving the other modes as they are.
    pub fn set_mode(&mut self, model: &ShapeModel, m: usize, sd: f64) -> SsmResult<()> {
        let std = model.mode_std(m)?;
        let found = self.coefficients.len();
        let slot = self
            .coefficients
            .get_mut(m)
            .ok_or(SsmError::DimensionMismatch {
                what: "morph state modes",
                expected: model.mode_count(),
                found,
            })?;
        *slot = sd * std;
        Ok(())
    }

    /// Slider positions in standard deviations for the exposed modes.
    pub fn slider_values(&self, model: &ShapeModel) -> SsmResult<Vec<f64>> {
        let mut normed = model.normalized_coefficients(&self.coefficients)?;
        normed.truncate(self.pcs);
        Ok(normed)
    }

    pub fn magnitude(&self, model: &ShapeModel) -> SsmResult<f64> {
        model.normalized_magnitude(&self.coefficients)
    }

    /// Reconstructs the current shape on `triangles` with fresh normals.
    pub fn geometry(&self, model: &ShapeModel, triangles: &[[usize; 3]]) -> SsmResult<MeshGeometry> {
        let points = model.reconstruct(&self.coefficients)?;
        recompute_mesh(points, triangles)
    }
}

#[cfg(test)]
mod morph_tests {
    use super::*;
    use crate::utils::test_utils::synthetic_corpus;
    use approx::assert_relative_eq;

    fn model() -> ShapeModel {
        ShapeModel::from_point_sets(synthetic_corpus(5, 6, 42)).unwrap()
    }

    #[test]
    fn test_shape_index_mapping() {
        assert_eq!(Shape::from_index(0), Shape::Mean);
        assert_eq!(Shape::from_index(3), Shape::Case(2));
        assert_eq!(Shape::Case(2).label(), "case 3");
    }

    #[test]
    fn test_morph_endpoints() {
        let model = model();
        let mut state = MorphState::new(&model, 3);
        state.morph(&model, Shape::Mean, Shape::Case(1), 0.0).unwrap();
        assert!(state.coefficients().iter().all(|&c| c == 0.0));
        state.morph(&model, Shape::Mean, Shape::Case(1), 1.0).unwrap();
        let case = model.sample_coefficients(1).unwrap();
        for (a, b) in state.coefficients().iter().zip(&case) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
        state.morph(&model, Shape::Case(0), Shape::Case(1), 0.5).unwrap();
        let first = model.sample_coefficients(0).unwrap();
        for ((c, a), b) in state.coefficients().iter().zip(&first).zip(&case) {
            assert_relative_eq!(*c, 0.5 * (a + b), epsilon = 1e-12);
        }
        assert!(state.morph(&model, Shape::Mean, Shape::Case(5), 0.5).is_err());
    }

    #[test]
    fn test_set_mode_moves_slider() {
        let model = model();
        let mut state = MorphState::new(&model, 2);
        state.set_mode(&model, 1, -1.5).unwrap();
        let sliders = state.slider_values(&model).unwrap();
        assert_eq!(sliders.len(), 2);
        assert_relative_eq!(sliders[0], 0.0);
        assert_relative_eq!(sliders[1], -1.5, epsilon = 1e-12);
        assert_relative_eq!(state.magnitude(&model).unwrap(), 1.5, epsilon = 1e-12);
        assert!(state.set_mode(&model, model.mode_count(), 1.0).is_err());
    }

    #[test]
    fn test_set_mode_on_larger_model_is_error() {
        let small = ShapeModel::from_point_sets(synthetic_corpus(3, 6, 42)).unwrap();
        let large = model();
        let mut state = MorphState::new(&small, 3);
        assert!(large.mode_count() > state.coefficients().len());
        let err = state.set_mode(&large, 3, 1.0).unwrap_err();
        assert!(matches!(err, SsmError::DimensionMismatch { .. }));
        assert!(state.coefficients().iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_pcs_capped_by_mode_count() {
        let model = model();
        let state = MorphState::new(&model, 50);
        assert_eq!(state.pcs(), model.mode_count());
    }

    #[test]
    fn test_geometry_is_fresh_reconstruction() {
        let model = model();
        let mut state = MorphState::new(&model, 3);
        state.morph(&model, Shape::Mean, Shape::Case(2), 1.0).unwrap();
        let geom = state.geometry(&model, &[[0, 1, 2], [3, 4, 5]]).unwrap();
        let expected = model.reconstruct(state.coefficients()).unwrap();
        assert_eq!(geom.points, expected);
        assert_eq!(geom.cell_normals.len(), 2);
    }

    #[test]
    fn test_set_coefficients_pads() {
        let model = model();
        let mut state = MorphState::new(&model, 3);
        state.set_coefficients(&model, &[1.0]).unwrap();
        assert_eq!(state.coefficients().len(), model.mode_count());
        assert_eq!(state.coefficients()[0], 1.0);
        let too_many = vec![0.0; model.mode_count() + 1];
        assert!(state.set_coefficients(&model, &too_many).is_err());
    }
}
