use super::fields::GlobalFields;
use super::properties::{AtomArray, PropertyKind, PropertySpec};
use crate::core::elements::{self, ElementError};
use crate::core::geometry::lattice;
use nalgebra::{Matrix3, Vector3};
use std::collections::HashMap;
use thiserror::Error;

/// Schema name of the species column.
pub const SPECIES_KEY: &str = "species";
/// Schema name used for the position column when none is given by a source.
pub const POSITIONS_KEY: &str = "pos";

const POSITIONS_ALIAS: &str = "positions";
const FORCE_KEYS: [&str; 2] = ["forces", "force"];
pub const REDUCED_TENSOR_COMPONENTS: [usize; 6] = [0, 4, 8, 1, 5, 6];

pub fn is_positions_key(name: &str) -> bool {
    name == POSITIONS_KEY || name == POSITIONS_ALIAS
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Shape mismatch for '{name}': expected {expected} values, found {found}")]
    ShapeMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Structure has no lattice")]
    MissingLattice,
    #[error("Lattice is singular")]
    SingularLattice,
    #[error("Structure has neither a virial nor a stress field")]
    MissingVirialOrStress,
    #[error("Missing required per-atom property '{0}'")]
    MissingProperty(String),
    #[error("Per-atom property '{0}' is declared more than once")]
    DuplicateProperty(String),
    #[error("Property '{name}' declared with type '{kind}' holds incompatible values")]
    KindMismatch { name: String, kind: PropertyKind },
    #[error("Missing global field '{0}'")]
    MissingField(&'static str),
    #[error(transparent)]
    Element(#[from] ElementError),
}

/// One atomic configuration: cell, species, Cartesian positions, per-atom
/// properties and frame-level fields.
///
/// `Clone` is a full deep copy; a cloned structure never shares storage
/// with its source, so the `with_*`/`*ed` copy methods and their in-place
/// counterparts cannot observe each other.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    /// Lattice vectors as matrix rows. `None` for non-periodic data.
    lattice: Option<Matrix3<f64>>,
    species: Vec<String>,
    positions: Vec<Vector3<f64>>,
    /// Declared per-atom columns in source order, including species and positions.
    schema: Vec<PropertySpec>,
    /// Values of every schema entry other than species and positions.
    arrays: HashMap<String, AtomArray>,
    pub fields: GlobalFields,
}

impl Structure {
    /// Creates a structure with the default `species:S:1:pos:R:3` schema.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ShapeMismatch`] if `species` and `positions`
    /// have different lengths.
    pub fn new(
        lattice: Option<Matrix3<f64>>,
        species: Vec<String>,
        positions: Vec<Vector3<f64>>,
    ) -> Result<Self, ModelError> {
        if species.len() != positions.len() {
            return Err(ModelError::ShapeMismatch {
                name: POSITIONS_KEY.to_string(),
                expected: species.len(),
                found: positions.len(),
            });
        }
        Ok(Self {
            lattice,
            species,
            positions,
            schema: default_schema(),
            arrays: HashMap::new(),
            fields: GlobalFields::new(),
        })
    }

    /// Assembles a structure from declared per-atom columns.
    ///
    /// The column order becomes the schema order. Exactly one `species`
    /// column (text, one per atom) and one position column (`pos` or
    /// `positions`, three reals per atom) are required; all other columns
    /// must hold `N × count` values of a type matching their declaration.
    pub fn from_columns(
        lattice: Option<Matrix3<f64>>,
        columns: Vec<(PropertySpec, AtomArray)>,
        fields: GlobalFields,
    ) -> Result<Self, ModelError> {
        let num_atoms = columns
            .iter()
            .find(|(spec, _)| spec.name == SPECIES_KEY)
            .map(|(spec, values)| values.len() / spec.count.max(1))
            .ok_or_else(|| ModelError::MissingProperty(SPECIES_KEY.to_string()))?;

        let mut schema: Vec<PropertySpec> = Vec::with_capacity(columns.len());
        let mut arrays = HashMap::new();
        let mut species: Option<Vec<String>> = None;
        let mut positions: Option<Vec<Vector3<f64>>> = None;

        for (spec, values) in columns {
            if schema.iter().any(|s| s.name == spec.name) {
                return Err(ModelError::DuplicateProperty(spec.name));
            }
            if !values.matches_kind(&spec.kind) {
                return Err(ModelError::KindMismatch {
                    name: spec.name,
                    kind: spec.kind,
                });
            }
            if values.len() != num_atoms * spec.count {
                return Err(ModelError::ShapeMismatch {
                    name: spec.name,
                    expected: num_atoms * spec.count,
                    found: values.len(),
                });
            }

            if spec.name == SPECIES_KEY {
                let (AtomArray::Text(symbols), 1) = (&values, spec.count) else {
                    return Err(ModelError::KindMismatch {
                        name: spec.name,
                        kind: spec.kind,
                    });
                };
                species = Some(symbols.clone());
            } else if is_positions_key(&spec.name) && positions.is_none() {
                let (AtomArray::Real(coords), 3) = (&values, spec.count) else {
                    return Err(ModelError::ShapeMismatch {
                        name: spec.name,
                        expected: 3 * num_atoms,
                        found: num_atoms * spec.count,
                    });
                };
                positions = Some(
                    coords
                        .chunks_exact(3)
                        .map(|c| Vector3::new(c[0], c[1], c[2]))
                        .collect(),
                );
            } else {
                arrays.insert(spec.name.clone(), values);
            }
            schema.push(spec);
        }

        Ok(Self {
            lattice,
            species: species.ok_or_else(|| ModelError::MissingProperty(SPECIES_KEY.into()))?,
            positions: positions
                .ok_or_else(|| ModelError::MissingProperty(POSITIONS_KEY.into()))?,
            schema,
            arrays,
            fields,
        })
    }

    pub fn lattice(&self) -> Option<&Matrix3<f64>> {
        self.lattice.as_ref()
    }

    /// Returns the lattice or [`ModelError::MissingLattice`].
    pub fn require_lattice(&self) -> Result<&Matrix3<f64>, ModelError> {
        self.lattice.as_ref().ok_or(ModelError::MissingLattice)
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    /// Mutable access to positions. The slice cannot change the atom count.
    pub fn positions_mut(&mut self) -> &mut [Vector3<f64>] {
        &mut self.positions
    }

    /// Replaces all positions at once.
    pub fn set_positions(&mut self, positions: Vec<Vector3<f64>>) -> Result<(), ModelError> {
        if positions.len() != self.num_atoms() {
            return Err(ModelError::ShapeMismatch {
                name: self.positions_name().to_string(),
                expected: self.num_atoms(),
                found: positions.len(),
            });
        }
        self.positions = positions;
        Ok(())
    }

    pub fn num_atoms(&self) -> usize {
        self.species.len()
    }

    pub fn schema(&self) -> &[PropertySpec] {
        &self.schema
    }

    pub fn property_spec(&self, name: &str) -> Option<&PropertySpec> {
        self.schema.iter().find(|s| s.name == name)
    }

    /// Returns the values of a per-atom property other than species/positions.
    pub fn property(&self, name: &str) -> Option<&AtomArray> {
        self.arrays.get(name)
    }

    /// Per-atom forces, flattened `N × 3`, read from `forces` or else `force`.
    pub fn forces(&self) -> Option<&[f64]> {
        FORCE_KEYS
            .iter()
            .find_map(|key| self.arrays.get(*key))
            .and_then(AtomArray::as_real)
    }

    /// Adds or replaces a per-atom property.
    ///
    /// # Errors
    ///
    /// Fails if `spec` names the species or position column, if the value
    /// type does not match `spec.kind`, or if the value count is not
    /// `N × spec.count`.
    pub fn insert_property(
        &mut self,
        spec: PropertySpec,
        values: AtomArray,
    ) -> Result<(), ModelError> {
        if spec.name == SPECIES_KEY || spec.name == self.positions_name() {
            return Err(ModelError::DuplicateProperty(spec.name));
        }
        if !values.matches_kind(&spec.kind) {
            return Err(ModelError::KindMismatch {
                name: spec.name,
                kind: spec.kind,
            });
        }
        let expected = self.num_atoms() * spec.count;
        if values.len() != expected {
            return Err(ModelError::ShapeMismatch {
                name: spec.name,
                expected,
                found: values.len(),
            });
        }
        match self.schema.iter_mut().find(|s| s.name == spec.name) {
            Some(slot) => *slot = spec.clone(),
            None => self.schema.push(spec.clone()),
        }
        self.arrays.insert(spec.name, values);
        Ok(())
    }

    pub fn remove_property(&mut self, name: &str) -> Option<AtomArray> {
        let values = self.arrays.remove(name)?;
        self.schema.retain(|s| s.name != name);
        Some(values)
    }

    /// The schema name under which positions are declared (`pos` unless the source said otherwise).
    pub fn positions_name(&self) -> &str {
        self.schema
            .iter()
            .find(|s| is_positions_key(&s.name))
            .map_or(POSITIONS_KEY, |s| s.name.as_str())
    }

    pub fn config_type(&self) -> &str {
        &self.fields.config_type
    }

    pub fn set_config_type(&mut self, tag: &str) {
        self.fields.config_type = tag.to_string();
    }

    /// Whether distance queries should apply periodic images.
    ///
    /// An explicit `pbc` flag wins; without one, a structure is periodic
    /// exactly when it carries a lattice.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingLattice`] if `pbc` requests periodicity
    /// along any axis but no lattice is present.
    pub fn is_periodic(&self) -> Result<bool, ModelError> {
        match (self.fields.pbc, self.lattice.is_some()) {
            (Some(pbc), has_lattice) if pbc.iter().any(|&p| p) => {
                if has_lattice {
                    Ok(true)
                } else {
                    Err(ModelError::MissingLattice)
                }
            }
            (Some(_), _) => Ok(false),
            (None, has_lattice) => Ok(has_lattice),
        }
    }

    pub fn volume(&self) -> Option<f64> {
        self.lattice.as_ref().map(lattice::volume)
    }

    /// Lattice vector lengths `(a, b, c)`.
    pub fn abc(&self) -> Option<[f64; 3]> {
        self.lattice
            .as_ref()
            .map(|l| [l.row(0).norm(), l.row(1).norm(), l.row(2).norm()])
    }

    /// Lattice angles `(alpha, beta, gamma)` in degrees.
    pub fn angles(&self) -> Option<[f64; 3]> {
        let l = self.lattice.as_ref()?;
        let angle = |i: usize, j: usize| {
            let (u, v) = (l.row(i), l.row(j));
            let cos = (u.dot(&v) / (u.norm() * v.norm())).clamp(-1.0, 1.0);
            cos.acos().to_degrees()
        };
        Some([angle(1, 2), angle(0, 2), angle(0, 1)])
    }

    /// Species counts in order of first appearance, e.g. `"H2O1"`.
    pub fn formula(&self) -> String {
        self.species_counts()
            .iter()
            .map(|(symbol, count)| format!("{}{}", symbol, count))
            .collect()
    }

    pub fn html_formula(&self) -> String {
        self.species_counts()
            .iter()
            .map(|(symbol, count)| format!("{}<sub>{}</sub>", symbol, count))
            .collect()
    }

    fn species_counts(&self) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for symbol in &self.species {
            match counts.iter_mut().find(|(s, _)| s == symbol) {
                Some((_, n)) => *n += 1,
                None => counts.push((symbol, 1)),
            }
        }
        counts
    }

    pub fn per_atom_energy(&self) -> Option<f64> {
        let energy = self.fields.energy?;
        (self.num_atoms() > 0).then(|| energy / self.num_atoms() as f64)
    }

    pub fn atomic_numbers(&self) -> Result<Vec<u8>, ModelError> {
        Ok(self
            .species
            .iter()
            .map(|s| elements::atomic_number(s))
            .collect::<Result<_, _>>()?)
    }

    /// The virial, derived as `-stress × volume` when only a stress is stored.
    ///
    /// # Errors
    ///
    /// [`ModelError::MissingVirialOrStress`] if neither field exists, or
    /// [`ModelError::MissingLattice`] if the derivation needs a volume that
    /// is not available.
    pub fn virial(&self) -> Result<Vec<f64>, ModelError> {
        if let Some(virial) = &self.fields.virial {
            return Ok(virial.clone());
        }
        let stress = self
            .fields
            .stress
            .as_ref()
            .ok_or(ModelError::MissingVirialOrStress)?;
        let volume = self.volume().ok_or(ModelError::MissingLattice)?;
        Ok(stress.iter().map(|s| -s * volume).collect())
    }

    /// Per-atom virial in the `xx yy zz xy yz zx` training layout.
    pub fn reduced_virial(&self) -> Result<[f64; 6], ModelError> {
        let virial = self.virial()?;
        self.reduce_tensor("virial", &virial)
    }

    /// Per-atom dipole read from the `dipole` field.
    pub fn reduced_dipole(&self) -> Result<[f64; 3], ModelError> {
        let dipole = self.extra_vector("dipole")?;
        let n = self.num_atoms() as f64;
        match dipole.as_slice() {
            [x, y, z] => Ok([x / n, y / n, z / n]),
            other => Err(ModelError::ShapeMismatch {
                name: "dipole".to_string(),
                expected: 3,
                found: other.len(),
            }),
        }
    }

    /// Per-atom polarizability read from the 9-component `pol` field.
    pub fn reduced_polarizability(&self) -> Result<[f64; 6], ModelError> {
        let pol = self.extra_vector("pol")?;
        self.reduce_tensor("pol", &pol)
    }

    fn extra_vector(&self, key: &'static str) -> Result<Vec<f64>, ModelError> {
        let value = self.fields.extra(key).ok_or(ModelError::MissingField(key))?;
        value.to_vector().ok_or(ModelError::MissingField(key))
    }

    fn reduce_tensor(&self, name: &str, tensor: &[f64]) -> Result<[f64; 6], ModelError> {
        if tensor.len() != 9 {
            return Err(ModelError::ShapeMismatch {
                name: name.to_string(),
                expected: 9,
                found: tensor.len(),
            });
        }
        let n = self.num_atoms() as f64;
        Ok(REDUCED_TENSOR_COMPONENTS.map(|i| tensor[i] / n))
    }

    pub fn fractional_positions(&self) -> Result<Vec<Vector3<f64>>, ModelError> {
        let lattice = self.require_lattice()?;
        lattice::to_fractional(lattice, &self.positions).ok_or(ModelError::SingularLattice)
    }

    /// Replaces the cell and scales positions with it, keeping fractional
    /// coordinates fixed.
    pub fn set_lattice(&mut self, new_lattice: Matrix3<f64>) -> Result<(), ModelError> {
        let fractional = self.fractional_positions()?;
        self.positions = fractional
            .iter()
            .map(|f| lattice::to_cartesian(&new_lattice, f))
            .collect();
        self.lattice = Some(new_lattice);
        Ok(())
    }

    /// Copying form of [`Structure::set_lattice`].
    pub fn with_lattice(&self, new_lattice: Matrix3<f64>) -> Result<Structure, ModelError> {
        let mut copy = self.clone();
        copy.set_lattice(new_lattice)?;
        Ok(copy)
    }

    /// Moves every atom into the home cell (fractional coordinates in `[0, 1)`).
    pub fn wrap_positions(&mut self) -> Result<(), ModelError> {
        let lattice = *self.require_lattice()?;
        let fractional = self.fractional_positions()?;
        self.positions = fractional
            .iter()
            .map(|f| lattice::to_cartesian(&lattice, &lattice::wrap_fractional(f)))
            .collect();
        Ok(())
    }

    /// Copying form of [`Structure::wrap_positions`].
    pub fn wrapped(&self) -> Result<Structure, ModelError> {
        let mut copy = self.clone();
        copy.wrap_positions()?;
        Ok(copy)
    }
}

fn default_schema() -> Vec<PropertySpec> {
    vec![
        PropertySpec::new(SPECIES_KEY, PropertyKind::Str, 1),
        PropertySpec::new(POSITIONS_KEY, PropertyKind::Real, 3),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::fields::FieldValue;

    fn water() -> Structure {
        let lattice = Matrix3::from_diagonal(&Vector3::new(10.0, 10.0, 10.0));
        Structure::new(
            Some(lattice),
            vec!["O".into(), "H".into(), "H".into()],
            vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(0.96, 0.0, 0.0),
                Vector3::new(-0.24, 0.93, 0.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn new_structure_has_default_schema_and_empty_config_type() {
        let s = water();
        assert_eq!(s.num_atoms(), 3);
        let names: Vec<&str> = s.schema().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["species", "pos"]);
        assert_eq!(s.config_type(), "");
        assert_eq!(s.positions_name(), "pos");
    }

    #[test]
    fn new_rejects_mismatched_lengths() {
        let result = Structure::new(None, vec!["H".into()], vec![]);
        assert!(matches!(result, Err(ModelError::ShapeMismatch { .. })));
    }

    #[test]
    fn from_columns_preserves_declared_order_and_values() {
        let columns = vec![
            (
                PropertySpec::new("pos", PropertyKind::Real, 3),
                AtomArray::Real(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]),
            ),
            (
                PropertySpec::new("species", PropertyKind::Str, 1),
                AtomArray::Text(vec!["Cu".into(), "Au".into()]),
            ),
            (
                PropertySpec::new("forces", PropertyKind::Real, 3),
                AtomArray::Real(vec![0.1, 0.2, 0.3, -0.1, -0.2, -0.3]),
            ),
        ];
        let s = Structure::from_columns(None, columns, GlobalFields::new()).unwrap();
        assert_eq!(s.species(), &["Cu".to_string(), "Au".to_string()]);
        assert_eq!(s.positions()[1], Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(s.schema()[0].name, "pos");
        assert_eq!(s.forces().unwrap(), &[0.1, 0.2, 0.3, -0.1, -0.2, -0.3]);
    }

    #[test]
    fn from_columns_validates_shapes_and_presence() {
        let missing_species = vec![(
            PropertySpec::new("pos", PropertyKind::Real, 3),
            AtomArray::Real(vec![0.0; 3]),
        )];
        assert!(matches!(
            Structure::from_columns(None, missing_species, GlobalFields::new()),
            Err(ModelError::MissingProperty(_))
        ));

        let short_forces = vec![
            (
                PropertySpec::new("species", PropertyKind::Str, 1),
                AtomArray::Text(vec!["H".into()]),
            ),
            (
                PropertySpec::new("pos", PropertyKind::Real, 3),
                AtomArray::Real(vec![0.0; 3]),
            ),
            (
                PropertySpec::new("forces", PropertyKind::Real, 3),
                AtomArray::Real(vec![0.0; 2]),
            ),
        ];
        assert!(matches!(
            Structure::from_columns(None, short_forces, GlobalFields::new()),
            Err(ModelError::ShapeMismatch { .. })
        ));

        let wrong_kind = vec![
            (
                PropertySpec::new("species", PropertyKind::Str, 1),
                AtomArray::Text(vec!["H".into()]),
            ),
            (
                PropertySpec::new("pos", PropertyKind::Real, 3),
                AtomArray::Text(vec!["a".into(), "b".into(), "c".into()]),
            ),
        ];
        assert!(matches!(
            Structure::from_columns(None, wrong_kind, GlobalFields::new()),
            Err(ModelError::KindMismatch { .. })
        ));
    }

    #[test]
    fn derived_cell_quantities_match_cubic_cell() {
        let s = water();
        assert!((s.volume().unwrap() - 1000.0).abs() < 1e-9);
        assert_eq!(s.abc().unwrap(), [10.0, 10.0, 10.0]);
        for angle in s.angles().unwrap() {
            assert!((angle - 90.0).abs() < 1e-9);
        }
    }

    #[test]
    fn angles_follow_alpha_beta_gamma_convention() {
        let lattice = Matrix3::new(1.0, 0.0, 0.0, 0.5, 3f64.sqrt() / 2.0, 0.0, 0.0, 0.0, 1.0);
        let s = Structure::new(Some(lattice), vec![], vec![]).unwrap();
        let [alpha, beta, gamma] = s.angles().unwrap();
        assert!((alpha - 90.0).abs() < 1e-9);
        assert!((beta - 90.0).abs() < 1e-9);
        assert!((gamma - 60.0).abs() < 1e-9);
    }

    #[test]
    fn formula_counts_species_in_first_appearance_order() {
        let s = water();
        assert_eq!(s.formula(), "O1H2");
        assert_eq!(s.html_formula(), "O<sub>1</sub>H<sub>2</sub>");
    }

    #[test]
    fn per_atom_energy_requires_energy() {
        let mut s = water();
        assert_eq!(s.per_atom_energy(), None);
        s.fields.energy = Some(-9.0);
        assert_eq!(s.per_atom_energy(), Some(-3.0));
    }

    #[test]
    fn atomic_numbers_propagate_unknown_elements() {
        assert_eq!(water().atomic_numbers().unwrap(), vec![8, 1, 1]);
        let s = Structure::new(None, vec!["Zz".into()], vec![Vector3::zeros()]).unwrap();
        assert!(matches!(s.atomic_numbers(), Err(ModelError::Element(_))));
    }

    #[test]
    fn virial_prefers_stored_value_then_derives_from_stress() {
        let mut s = water();
        assert_eq!(s.virial(), Err(ModelError::MissingVirialOrStress));

        s.fields.stress = Some(vec![0.001; 9]);
        let derived = s.virial().unwrap();
        assert!((derived[0] + 1.0).abs() < 1e-9);

        s.fields.virial = Some(vec![2.0; 9]);
        assert_eq!(s.virial().unwrap(), vec![2.0; 9]);
    }

    #[test]
    fn virial_from_stress_needs_a_lattice() {
        let mut s = Structure::new(None, vec!["H".into()], vec![Vector3::zeros()]).unwrap();
        s.fields.stress = Some(vec![1.0; 9]);
        assert_eq!(s.virial(), Err(ModelError::MissingLattice));
    }

    #[test]
    fn reduced_virial_selects_training_components() {
        let mut s = water();
        s.fields.virial = Some((0..9).map(|i| i as f64 * 3.0).collect());
        assert_eq!(s.reduced_virial().unwrap(), [0.0, 4.0, 8.0, 1.0, 5.0, 6.0]);

        s.fields.virial = Some(vec![1.0; 6]);
        assert!(matches!(
            s.reduced_virial(),
            Err(ModelError::ShapeMismatch { expected: 9, found: 6, .. })
        ));
    }

    #[test]
    fn reduced_dipole_and_polarizability_read_extra_fields() {
        let mut s = water();
        assert_eq!(s.reduced_dipole(), Err(ModelError::MissingField("dipole")));
        s.fields.set_extra("dipole", FieldValue::Text("3 6 9".into()));
        assert_eq!(s.reduced_dipole().unwrap(), [1.0, 2.0, 3.0]);

        s.fields.set_extra("pol", FieldValue::Vector(vec![3.0; 9]));
        assert_eq!(s.reduced_polarizability().unwrap(), [1.0; 6]);
    }

    #[test]
    fn is_periodic_honours_pbc_and_lattice() {
        let mut s = water();
        assert_eq!(s.is_periodic(), Ok(true));
        s.fields.pbc = Some([false; 3]);
        assert_eq!(s.is_periodic(), Ok(false));

        let mut molecule = Structure::new(None, vec!["H".into()], vec![Vector3::zeros()]).unwrap();
        assert_eq!(molecule.is_periodic(), Ok(false));
        molecule.fields.pbc = Some([true, true, true]);
        assert_eq!(molecule.is_periodic(), Err(ModelError::MissingLattice));
    }

    #[test]
    fn set_lattice_scales_positions_with_cell() {
        let mut s = water();
        let doubled = Matrix3::from_diagonal(&Vector3::new(20.0, 20.0, 20.0));
        s.set_lattice(doubled).unwrap();
        assert_eq!(s.lattice(), Some(&doubled));
        assert!((s.positions()[1] - Vector3::new(1.92, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn with_lattice_does_not_touch_the_original() {
        let original = water();
        let doubled = Matrix3::from_diagonal(&Vector3::new(20.0, 20.0, 20.0));
        let mut copy = original.with_lattice(doubled).unwrap();
        assert_eq!(original, water());

        copy.positions_mut()[0] = Vector3::new(5.0, 5.0, 5.0);
        assert_eq!(original.positions()[0], Vector3::zeros());
    }

    #[test]
    fn set_lattice_fails_without_or_with_singular_lattice() {
        let mut molecule = Structure::new(None, vec!["H".into()], vec![Vector3::zeros()]).unwrap();
        assert_eq!(
            molecule.set_lattice(Matrix3::identity()),
            Err(ModelError::MissingLattice)
        );

        let mut flat = Structure::new(
            Some(Matrix3::zeros()),
            vec!["H".into()],
            vec![Vector3::zeros()],
        )
        .unwrap();
        assert_eq!(
            flat.set_lattice(Matrix3::identity()),
            Err(ModelError::SingularLattice)
        );
    }

    #[test]
    fn wrap_positions_moves_atoms_into_home_cell() {
        let mut s = water();
        s.positions_mut()[2] = Vector3::new(-0.24, 10.93, 0.0);
        let wrapped = s.wrapped().unwrap();
        assert!((wrapped.positions()[1] - Vector3::new(0.96, 0.0, 0.0)).norm() < 1e-12);
        assert!((wrapped.positions()[2] - Vector3::new(9.76, 0.93, 0.0)).norm() < 1e-9);
        assert!((s.positions()[2].y - 10.93).abs() < 1e-12);
    }

    #[test]
    fn insert_and_remove_property_keep_schema_consistent() {
        let mut s = water();
        s.insert_property(
            PropertySpec::new("forces", PropertyKind::Real, 3),
            AtomArray::Real(vec![0.0; 9]),
        )
        .unwrap();
        assert_eq!(s.schema().len(), 3);
        assert!(s.forces().is_some());

        let err = s
            .insert_property(
                PropertySpec::new("charges", PropertyKind::Real, 1),
                AtomArray::Real(vec![0.0; 2]),
            )
            .unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { expected: 3, found: 2, .. }));

        assert!(matches!(
            s.insert_property(
                PropertySpec::new("pos", PropertyKind::Real, 3),
                AtomArray::Real(vec![0.0; 9]),
            ),
            Err(ModelError::DuplicateProperty(_))
        ));

        assert!(s.remove_property("forces").is_some());
        assert_eq!(s.schema().len(), 2);
        assert!(s.forces().is_none());
    }

    #[test]
    fn set_positions_requires_matching_atom_count() {
        let mut s = water();
        assert!(s.set_positions(vec![Vector3::zeros(); 2]).is_err());
        s.set_positions(vec![Vector3::zeros(); 3]).unwrap();
        assert_eq!(s.positions()[1], Vector3::zeros());
    }
}
