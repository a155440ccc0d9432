use super::GeometryError;
use super::lattice;
use crate::core::models::fields::GlobalFields;
use crate::core::models::properties::AtomArray;
use crate::core::models::structure::{SPECIES_KEY, Structure};
use nalgebra::{Matrix3, Vector3};
use std::str::FromStr;
use tracing::{debug, instrument};

/// Atom ordering of a replicated cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupercellOrder {
    /// The whole original cell is laid down once per offset.
    CellMajor,
    /// Every original atom is repeated across all offsets before the next atom.
    #[default]
    AtomMajor,
}

impl FromStr for SupercellOrder {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cell-major" => Ok(Self::CellMajor),
            "atom-major" => Ok(Self::AtomMajor),
            other => Err(GeometryError::InvalidOrder(other.to_string())),
        }
    }
}

/// Tiles the cell `na × nb × nc` times.
///
/// Row `i` of the new lattice is row `i` of the old one times `scale[i]`.
/// Atoms are wrapped into the original cell first and then translated by
/// every integer offset, with the `a` offset varying slowest and `c`
/// fastest. Per-atom properties follow the atoms; energy, virial and stress
/// are dropped.
///
/// # Errors
///
/// [`GeometryError::InvalidScaleFactor`] unless every factor is a finite
/// integer `>= 1`; [`GeometryError::MissingLattice`] or
/// [`GeometryError::SingularLattice`] for an unusable cell.
#[instrument(skip_all, name = "supercell")]
pub fn supercell(
    structure: &Structure,
    scale: [f64; 3],
    order: SupercellOrder,
) -> Result<Structure, GeometryError> {
    let counts = validate_scale(scale, structure.num_atoms())?;
    let old_lattice = *structure.require_lattice()?;
    let mut new_lattice = old_lattice;
    for (row, &n) in counts.iter().enumerate() {
        new_lattice.set_row(row, &(old_lattice.row(row) * n as f64));
    }

    let wrapped: Vec<Vector3<f64>> = structure
        .fractional_positions()?
        .iter()
        .map(lattice::wrap_fractional)
        .collect();
    let offsets = offsets(counts);
    let num_atoms = structure.num_atoms();

    let layout: Vec<(usize, usize)> = match order {
        SupercellOrder::CellMajor => (0..offsets.len())
            .flat_map(|cell| (0..num_atoms).map(move |atom| (atom, cell)))
            .collect(),
        SupercellOrder::AtomMajor => (0..num_atoms)
            .flat_map(|atom| (0..offsets.len()).map(move |cell| (atom, cell)))
            .collect(),
    };
    debug!(
        num_atoms = layout.len(),
        cells = offsets.len(),
        ?order,
        "Replicating cell."
    );

    let scale_vec = Vector3::new(counts[0] as f64, counts[1] as f64, counts[2] as f64);
    let coords: Vec<f64> = layout
        .iter()
        .flat_map(|&(atom, cell)| {
            let frac = (wrapped[atom] + offsets[cell]).component_div(&scale_vec);
            let cart = lattice::to_cartesian(&new_lattice, &frac);
            [cart.x, cart.y, cart.z]
        })
        .collect();
    let rows: Vec<usize> = layout.iter().map(|&(atom, _)| atom).collect();

    let mut columns = Vec::with_capacity(structure.schema().len());
    for spec in structure.schema() {
        let values = if spec.name == SPECIES_KEY {
            AtomArray::Text(rows.iter().map(|&r| structure.species()[r].clone()).collect())
        } else if spec.name == structure.positions_name() {
            AtomArray::Real(coords.clone())
        } else {
            match structure.property(&spec.name) {
                Some(values) => values.select_rows(&rows, spec.count),
                None => continue,
            }
        };
        columns.push((spec.clone(), values));
    }

    let mut fields = GlobalFields::new();
    fields.pbc = Some(structure.fields.pbc.unwrap_or([true; 3]));
    fields.config_type = format!(
        "{} super cell([{} {} {}])",
        structure.config_type(),
        counts[0],
        counts[1],
        counts[2]
    );

    Ok(Structure::from_columns(Some(new_lattice), columns, fields)?)
}

/// Validates supercell factors and converts them to counts.
///
/// The tiled coordinate buffer must stay addressable, so products that
/// overflow are rejected along with the largest factor.
fn validate_scale(scale: [f64; 3], num_atoms: usize) -> Result<[usize; 3], GeometryError> {
    let mut counts = [1usize; 3];
    for (slot, &factor) in counts.iter_mut().zip(&scale) {
        if !factor.is_finite() || factor < 1.0 || factor.fract() != 0.0 || factor > usize::MAX as f64 {
            return Err(GeometryError::InvalidScaleFactor(factor));
        }
        *slot = factor as usize;
    }
    let bytes_per_atom = 3 * std::mem::size_of::<f64>();
    counts
        .iter()
        .try_fold(num_atoms.max(1), |total, &n| total.checked_mul(n))
        .and_then(|total| total.checked_mul(bytes_per_atom))
        .filter(|&bytes| bytes <= isize::MAX as usize)
        .ok_or_else(|| GeometryError::InvalidScaleFactor(scale.iter().copied().fold(1.0, f64::max)))?;
    Ok(counts)
}

fn offsets(counts: [usize; 3]) -> Vec<Vector3<f64>> {
    let mut out = Vec::with_capacity(counts.iter().product());
    for a in 0..counts[0] {
        for b in 0..counts[1] {
            for c in 0..counts[2] {
                out.push(Vector3::new(a as f64, b as f64, c as f64));
            }
        }
    }
    out
}

/// Scale factors that make every lattice vector at least `min_length` long.
pub fn scale_for_min_length(lattice: &Matrix3<f64>, min_length: f64) -> [f64; 3] {
    [0, 1, 2].map(|row| {
        let length = lattice.row(row).norm();
        if length > 0.0 {
            (min_length / length).ceil().max(1.0)
        } else {
            1.0
        }
    })
}
