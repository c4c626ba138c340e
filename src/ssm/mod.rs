//! Statistical shape model core: corpus validation, model building and
//! queries against the fitted shape space.

pub mod corpus;
pub mod model;
pub mod morph;
pub mod pca;
pub mod point_set;
pub mod stats;

pub use corpus::Corpus;
pub use model::ShapeModel;
pub use morph::{MorphState, Shape};
pub use point_set::PointSet;
pub use stats::{distance_report, DistanceReport, DistanceStats};
