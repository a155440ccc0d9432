use nalgebra::{Matrix3, Vector3};

/// Builds a lattice from nine row-major values (`a`, `b`, `c` rows).
pub fn lattice_from_rows(values: &[f64]) -> Option<Matrix3<f64>> {
    (values.len() == 9).then(|| Matrix3::from_row_slice(values))
}

/// Flattens a lattice back into row-major order.
pub fn flatten_rows(lattice: &Matrix3<f64>) -> [f64; 9] {
    let mut out = [0.0; 9];
    for (row, chunk) in out.chunks_exact_mut(3).enumerate() {
        for (col, slot) in chunk.iter_mut().enumerate() {
            *slot = lattice[(row, col)];
        }
    }
    out
}

pub fn volume(lattice: &Matrix3<f64>) -> f64 {
    lattice.determinant().abs()
}

/// Returns the matrix mapping Cartesian column vectors to fractional ones.
///
/// With lattice vectors stored as rows, `cart = Lᵀ · frac`, so this is
/// `(Lᵀ)⁻¹`. Returns `None` for a singular cell.
pub fn fractional_matrix(lattice: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    lattice.transpose().try_inverse()
}

pub fn to_fractional(lattice: &Matrix3<f64>, positions: &[Vector3<f64>]) -> Option<Vec<Vector3<f64>>> {
    let inv = fractional_matrix(lattice)?;
    Some(positions.iter().map(|p| inv * p).collect())
}

pub fn to_cartesian(lattice: &Matrix3<f64>, fractional: &Vector3<f64>) -> Vector3<f64> {
    lattice.transpose() * fractional
}

/// Reduces each fractional component into `[0, 1)`.
pub fn wrap_fractional(fractional: &Vector3<f64>) -> Vector3<f64> {
    fractional.map(|x| {
        let wrapped = x - x.floor();
        // x slightly below an integer can round up to exactly 1.0
        if wrapped >= 1.0 { 0.0 } else { wrapped }
    })
}

/// The smallest perpendicular distance between opposite cell faces.
pub fn min_cell_width(lattice: &Matrix3<f64>) -> f64 {
    let a: Vector3<f64> = lattice.row(0).transpose();
    let b: Vector3<f64> = lattice.row(1).transpose();
    let c: Vector3<f64> = lattice.row(2).transpose();
    let vol = volume(lattice);
    [b.cross(&c).norm(), a.cross(&c).norm(), a.cross(&b).norm()]
        .into_iter()
        .map(|area| if area > 0.0 { vol / area } else { 0.0 })
        .fold(f64::INFINITY, f64::min)
}

/// Whether the 27-image search is guaranteed exact for distances up to `cutoff`.
pub fn minimum_image_is_exact(lattice: &Matrix3<f64>, cutoff: f64) -> bool {
    cutoff < 0.5 * min_cell_width(lattice)
}

/// The 27 translations `i·a + j·b + k·c` with `i, j, k ∈ {-1, 0, 1}`.
pub fn image_shifts(lattice: &Matrix3<f64>) -> Vec<Vector3<f64>> {
    let mut shifts = Vec::with_capacity(27);
    for i in -1..=1 {
        for j in -1..=1 {
            for k in -1..=1 {
                let n = Vector3::new(i as f64, j as f64, k as f64);
                shifts.push(lattice.transpose() * n);
            }
        }
    }
    shifts
}
