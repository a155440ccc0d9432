use super::GeometryError;
use super::distances::structure_distances;
use crate::core::elements;
use crate::core::models::structure::Structure;
use itertools::Itertools;
use std::collections::BTreeMap;
use tracing::debug;

/// Default tolerance applied to covalent radius sums by [`bond_pairs`].
pub const DEFAULT_BOND_TOLERANCE: f64 = 1.15;
/// Default coefficient below which [`bad_bond_pairs`] reports a contact.
pub const DEFAULT_BAD_BOND_COEFFICIENT: f64 = 0.8;

/// Key of an unordered element pair, sorted so that `("Ag", "Cs")` and
/// `("Cs", "Ag")` collapse to one entry.
pub type ElementPair = (String, String);

fn element_pair(a: &str, b: &str) -> ElementPair {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// The shortest observed distance for every element pair present in the structure.
pub fn minimum_bond_lengths(
    structure: &Structure,
) -> Result<BTreeMap<ElementPair, f64>, GeometryError> {
    let distances = structure_distances(structure)?;
    let species = structure.species();

    let mut lengths: BTreeMap<ElementPair, f64> = BTreeMap::new();
    for (i, j) in (0..structure.num_atoms()).tuple_combinations() {
        let d = distances[(i, j)];
        lengths
            .entry(element_pair(&species[i], &species[j]))
            .and_modify(|min| *min = min.min(d))
            .or_insert(d);
    }
    Ok(lengths)
}

/// Checks every element pair's shortest distance against
/// `coefficient × (r_A + r_B)`, radii in Å.
///
/// Returns `false` as soon as one pair is closer than its threshold.
pub fn is_geometry_reasonable(
    structure: &Structure,
    coefficient: f64,
) -> Result<bool, GeometryError> {
    elements::covalent_radii(structure.species())?;
    for ((a, b), length) in minimum_bond_lengths(structure)? {
        let threshold = coefficient * (elements::covalent_radius(&a)? + elements::covalent_radius(&b)?);
        if length < threshold {
            debug!(pair = %format!("{}-{}", a, b), length, threshold, "Unphysical contact.");
            return Ok(false);
        }
    }
    Ok(true)
}

/// Atom pairs closer than `tolerance × (r_i + r_j)`, using direct Cartesian
/// separations without periodic images.
pub fn bond_pairs(
    structure: &Structure,
    tolerance: f64,
) -> Result<Vec<(usize, usize)>, GeometryError> {
    let radii = elements::covalent_radii(structure.species())?;
    let positions = structure.positions();
    Ok((0..structure.num_atoms())
        .tuple_combinations()
        .filter(|&(i, j)| (positions[i] - positions[j]).norm() < tolerance * (radii[i] + radii[j]))
        .collect())
}

/// Atom pairs whose (minimum-image) distance is below `coefficient × (r_i + r_j)`.
pub fn bad_bond_pairs(
    structure: &Structure,
    coefficient: f64,
) -> Result<Vec<(usize, usize)>, GeometryError> {
    let radii = elements::covalent_radii(structure.species())?;
    let distances = structure_distances(structure)?;
    Ok((0..structure.num_atoms())
        .tuple_combinations()
        .filter(|&(i, j)| distances[(i, j)] < coefficient * (radii[i] + radii[j]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};

    fn pair(a: &str, b: &str, separation: f64) -> Structure {
        Structure::new(
            Some(Matrix3::from_diagonal(&Vector3::new(20.0, 20.0, 20.0))),
            vec![a.into(), b.into()],
            vec![Vector3::new(1.0, 1.0, 1.0), Vector3::new(1.0 + separation, 1.0, 1.0)],
        )
        .unwrap()
    }

    #[test]
    fn minimum_bond_lengths_use_sorted_pair_keys() {
        let s = Structure::new(
            Some(Matrix3::from_diagonal(&Vector3::new(20.0, 20.0, 20.0))),
            vec!["O".into(), "H".into(), "H".into()],
            vec![
                Vector3::new(5.0, 5.0, 5.0),
                Vector3::new(5.96, 5.0, 5.0),
                Vector3::new(5.0, 6.5, 5.0),
            ],
        )
        .unwrap();
        let lengths = minimum_bond_lengths(&s).unwrap();
        assert_eq!(lengths.len(), 2);
        assert!((lengths[&("H".to_string(), "O".to_string())] - 0.96).abs() < 1e-12);
        let hh = lengths[&("H".to_string(), "H".to_string())];
        assert!((hh - (0.96f64.powi(2) + 1.5f64.powi(2)).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn minimum_bond_lengths_see_across_the_boundary() {
        let s = Structure::new(
            Some(Matrix3::from_diagonal(&Vector3::new(5.0, 5.0, 5.0))),
            vec!["Cu".into(), "Cu".into()],
            vec![Vector3::new(0.2, 0.0, 0.0), Vector3::new(4.8, 0.0, 0.0)],
        )
        .unwrap();
        let lengths = minimum_bond_lengths(&s).unwrap();
        assert!((lengths[&("Cu".to_string(), "Cu".to_string())] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn geometry_reasonableness_compares_against_scaled_radii() {
        // C (0.76) + N (0.71) = 1.47 Å; 0.7 × 1.47 ≈ 1.03 Å
        assert!(!is_geometry_reasonable(&pair("C", "N", 0.5), 0.7).unwrap());
        assert!(is_geometry_reasonable(&pair("C", "N", 2.0), 0.7).unwrap());
    }

    #[test]
    fn unknown_species_fail_loudly() {
        let s = pair("C", "Xx", 2.0);
        assert!(matches!(
            is_geometry_reasonable(&s, 0.7),
            Err(GeometryError::UnknownElement(_))
        ));
        assert!(matches!(
            bond_pairs(&s, DEFAULT_BOND_TOLERANCE),
            Err(GeometryError::UnknownElement(_))
        ));
    }

    #[test]
    fn unknown_species_fail_even_without_pairs() {
        let s = Structure::new(None, vec!["Xx".into()], vec![Vector3::zeros()]).unwrap();
        assert!(matches!(
            is_geometry_reasonable(&s, 0.7),
            Err(GeometryError::UnknownElement(_))
        ));
    }

    #[test]
    fn bond_pairs_use_direct_separation() {
        let s = Structure::new(
            Some(Matrix3::from_diagonal(&Vector3::new(5.0, 5.0, 5.0))),
            vec!["C".into(), "C".into(), "H".into()],
            vec![
                Vector3::new(0.1, 0.0, 0.0),
                Vector3::new(4.9, 0.0, 0.0),
                Vector3::new(4.9, 1.0, 0.0),
            ],
        )
        .unwrap();
        assert_eq!(bond_pairs(&s, DEFAULT_BOND_TOLERANCE).unwrap(), vec![(1, 2)]);
    }

    #[test]
    fn bad_bond_pairs_include_periodic_contacts() {
        let s = Structure::new(
            Some(Matrix3::from_diagonal(&Vector3::new(5.0, 5.0, 5.0))),
            vec!["C".into(), "C".into(), "H".into()],
            vec![
                Vector3::new(0.1, 0.0, 0.0),
                Vector3::new(4.9, 0.0, 0.0),
                Vector3::new(2.5, 2.5, 2.5),
            ],
        )
        .unwrap();
        assert_eq!(
            bad_bond_pairs(&s, DEFAULT_BAD_BOND_COEFFICIENT).unwrap(),
            vec![(0, 1)]
        );
    }
}
