//! # Geometry Engine
//!
//! Distance, connectivity and cell manipulation algorithms operating on
//! [`Structure`](crate::core::models::structure::Structure) values.
//!
//! ## Key Components
//!
//! - [`lattice`] - Fractional/Cartesian conversion, wrapping and periodic image shifts
//! - [`distances`] - Minimum-image pairwise distance matrices
//! - [`bonds`] - Covalent-radius bond checks and shortest bond lengths per species pair
//! - [`clusters`] - Connected atom groups and unwrapping of clusters across the cell
//! - [`supercell`] - Integer cell replication and molecule-preserving cell scaling
//!
//! ## Periodic images
//!
//! Periodic distances are the minimum over the 27 images of the second
//! atom shifted by `i·a + j·b + k·c`, `i, j, k ∈ {-1, 0, 1}`. This is exact
//! whenever the distance of interest is below half the smallest
//! perpendicular cell width (see [`lattice::minimum_image_is_exact`]); in
//! strongly skewed or very small cells a longer distance may be reported.

pub mod bonds;
pub mod clusters;
pub mod distances;
pub mod lattice;
pub mod supercell;

use crate::core::elements::ElementError;
use crate::core::models::structure::ModelError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Operation requires a lattice but the structure has none")]
    MissingLattice,
    #[error("Lattice is singular")]
    SingularLattice,
    #[error(transparent)]
    UnknownElement(#[from] ElementError),
    #[error("Invalid supercell scale factor {0}: factors must be integers >= 1 and the tiled cell must fit in memory")]
    InvalidScaleFactor(f64),
    #[error("Unknown supercell ordering '{0}' (expected 'cell-major' or 'atom-major')")]
    InvalidOrder(String),
    #[error("Cluster index {index} is out of range for a structure with {num_atoms} atoms")]
    InvalidCluster { index: usize, num_atoms: usize },
    #[error("Structure error: {0}")]
    Model(ModelError),
}

impl From<ModelError> for GeometryError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::MissingLattice => Self::MissingLattice,
            ModelError::SingularLattice => Self::SingularLattice,
            ModelError::Element(e) => Self::UnknownElement(e),
            other => Self::Model(other),
        }
    }
}
