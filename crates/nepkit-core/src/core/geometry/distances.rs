use super::GeometryError;
use super::lattice;
use crate::core::models::structure::Structure;
use nalgebra::{DMatrix, Matrix3, Vector3};
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Computes the `N × N` matrix of interatomic distances.
///
/// With `periodic` set, each entry is the minimum over the 27 images
/// `r_j - r_i + i·a + j·b + k·c` with `i, j, k ∈ {-1, 0, 1}`; otherwise the
/// plain Euclidean distance. The diagonal is exactly zero and the matrix is
/// symmetric.
///
/// The periodic result is only guaranteed to be the true minimum-image
/// distance for separations below half the smallest cell width
/// ([`lattice::minimum_image_is_exact`]).
///
/// # Errors
///
/// Returns [`GeometryError::MissingLattice`] when `periodic` is requested
/// without a lattice.
#[instrument(skip_all, name = "pairwise_distances")]
pub fn pairwise_distances(
    lattice: Option<&Matrix3<f64>>,
    positions: &[Vector3<f64>],
    periodic: bool,
) -> Result<DMatrix<f64>, GeometryError> {
    let n = positions.len();
    let shifts = if periodic {
        let lattice = lattice.ok_or(GeometryError::MissingLattice)?;
        lattice::image_shifts(lattice)
    } else {
        vec![Vector3::zeros()]
    };
    debug!(num_atoms = n, periodic, "Computing pairwise distance matrix.");

    #[cfg(not(feature = "parallel"))]
    let iterator = 0..n;

    #[cfg(feature = "parallel")]
    let iterator = (0..n).into_par_iter();

    let rows: Vec<Vec<f64>> = iterator
        .map(|i| {
            ((i + 1)..n)
                .map(|j| minimum_image_norm(&(positions[j] - positions[i]), &shifts))
                .collect()
        })
        .collect();

    let mut matrix = DMatrix::zeros(n, n);
    for (i, row) in rows.iter().enumerate() {
        for (offset, &d) in row.iter().enumerate() {
            let j = i + 1 + offset;
            matrix[(i, j)] = d;
            matrix[(j, i)] = d;
        }
    }
    Ok(matrix)
}

/// Distance matrix of a structure, periodic exactly when [`Structure::is_periodic`] says so.
pub fn structure_distances(structure: &Structure) -> Result<DMatrix<f64>, GeometryError> {
    let periodic = structure.is_periodic()?;
    pairwise_distances(structure.lattice(), structure.positions(), periodic)
}

/// Shortest image of a single displacement under the given translations.
pub(crate) fn minimum_image_norm(delta: &Vector3<f64>, shifts: &[Vector3<f64>]) -> f64 {
    shifts
        .iter()
        .map(|shift| (delta + shift).norm())
        .fold(f64::INFINITY, f64::min)
}
