use super::error::EngineError;
use crate::core::models::structure::Structure;
use std::collections::HashMap;

/// Settings of the DFT-D3 dispersion correction.
#[derive(Debug, Clone, PartialEq)]
pub struct Dftd3Parameters {
    /// Exchange-correlation functional the damping parameters belong to.
    pub functional: String,
    /// Cutoff of the dispersion energy, in Å.
    pub cutoff: f64,
    /// Cutoff of the coordination numbers, in Å.
    pub cutoff_cn: f64,
}

impl Dftd3Parameters {
    pub fn new(functional: impl Into<String>, cutoff: f64, cutoff_cn: f64) -> Self {
        Self {
            functional: functional.into(),
            cutoff,
            cutoff_cn,
        }
    }
}

/// What a backend is asked to evaluate for a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum CalculationMode {
    /// Per-atom potentials, forces and virials.
    Calculate,
    /// The DFT-D3 correction alone, in the [`CalculationMode::Calculate`] layout.
    Dftd3(Dftd3Parameters),
    /// Model plus DFT-D3 correction, in the [`CalculationMode::Calculate`] layout.
    CalculateWithDftd3(Dftd3Parameters),
    /// One descriptor vector per structure.
    Descriptor,
    /// Per-atom descriptors of each structure, flattened component-major.
    AtomDescriptor,
    Polarizability,
    Dipole,
}

/// Flat input buffers for a batch of structures, in the layout expected by
/// NEP evaluators.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchRequest {
    /// Per structure, the index of every atom's element in the model's element list.
    pub types: Vec<Vec<usize>>,
    /// Per structure, the lattice transposed and flattened:
    /// `[ax, bx, cx, ay, by, cy, az, bz, cz]`. All zeros without a lattice.
    pub boxes: Vec<[f64; 9]>,
    /// Per structure, all x coordinates, then all y, then all z.
    pub positions: Vec<Vec<f64>>,
    pub group_sizes: Vec<usize>,
}

impl BatchRequest {
    /// Encodes `structures` against the model's `element_list`.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnsupportedElement`] for the first symbol missing from
    /// `element_list`.
    pub fn compose<S: AsRef<str>>(
        structures: &[Structure],
        element_list: &[S],
    ) -> Result<Self, EngineError> {
        let type_index: HashMap<&str, usize> = element_list
            .iter()
            .enumerate()
            .map(|(i, symbol)| (symbol.as_ref(), i))
            .collect();

        let mut request = Self {
            types: Vec::with_capacity(structures.len()),
            boxes: Vec::with_capacity(structures.len()),
            positions: Vec::with_capacity(structures.len()),
            group_sizes: Vec::with_capacity(structures.len()),
        };

        for (index, structure) in structures.iter().enumerate() {
            let types = structure
                .species()
                .iter()
                .map(|symbol| {
                    type_index
                        .get(symbol.as_str())
                        .copied()
                        .ok_or_else(|| EngineError::UnsupportedElement {
                            symbol: symbol.clone(),
                            structure: index,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let cell = structure.lattice().map_or([0.0; 9], |lattice| {
                let t = lattice.transpose();
                std::array::from_fn(|k| t[(k / 3, k % 3)])
            });

            let positions = structure.positions();
            let mut coords = Vec::with_capacity(3 * positions.len());
            for axis in 0..3 {
                coords.extend(positions.iter().map(|p| p[axis]));
            }

            request.group_sizes.push(types.len());
            request.types.push(types);
            request.boxes.push(cell);
            request.positions.push(coords);
        }
        Ok(request)
    }

    /// Number of structures in the batch.
    pub fn len(&self) -> usize {
        self.group_sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.group_sizes.is_empty()
    }

    pub fn total_atoms(&self) -> usize {
        self.group_sizes.iter().sum()
    }
}

/// Unprocessed reply of a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBatchOutput {
    /// Per structure: `N` per-atom potentials, `3N` component-major forces
    /// and `9N` component-major per-atom virials.
    Potential {
        potentials: Vec<Vec<f64>>,
        forces: Vec<Vec<f64>>,
        virials: Vec<Vec<f64>>,
    },
    /// One vector per structure: fixed-width for whole-structure modes,
    /// `D × N` values for [`CalculationMode::AtomDescriptor`].
    PerStructure(Vec<Vec<f64>>),
}

/// Anything able to evaluate a NEP model on a composed batch.
///
/// Implementations may run the model in-process or hand the request to a
/// worker; callers only see the request and the reply.
pub trait BatchBackend {
    /// Element symbols in the order the model indexes them.
    fn element_list(&self) -> &[String];

    /// Evaluates `request` in the given `mode`.
    ///
    /// # Errors
    ///
    /// Implementations report their own failures as [`EngineError::Backend`].
    fn submit_batch(
        &self,
        request: &BatchRequest,
        mode: &CalculationMode,
    ) -> Result<RawBatchOutput, EngineError>;
}

impl<B: BatchBackend + ?Sized> BatchBackend for &B {
    fn element_list(&self) -> &[String] {
        (**self).element_list()
    }

    fn submit_batch(
        &self,
        request: &BatchRequest,
        mode: &CalculationMode,
    ) -> Result<RawBatchOutput, EngineError> {
        (**self).submit_batch(request, mode)
    }
}

impl<B: BatchBackend + ?Sized> BatchBackend for Box<B> {
    fn element_list(&self) -> &[String] {
        (**self).element_list()
    }

    fn submit_batch(
        &self,
        request: &BatchRequest,
        mode: &CalculationMode,
    ) -> Result<RawBatchOutput, EngineError> {
        (**self).submit_batch(request, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};

    fn triclinic_pair() -> Structure {
        let lattice = Matrix3::new(4.0, 0.0, 0.0, 1.0, 5.0, 0.0, 0.5, 0.5, 6.0);
        Structure::new(
            Some(lattice),
            vec!["O".into(), "H".into()],
            vec![Vector3::new(1.0, 2.0, 3.0), Vector3::new(4.0, 5.0, 6.0)],
        )
        .unwrap()
    }

    #[test]
    fn compose_transposes_cell_and_positions() {
        let request = BatchRequest::compose(&[triclinic_pair()], &["H", "O"]).unwrap();
        assert_eq!(request.types, vec![vec![1, 0]]);
        assert_eq!(
            request.boxes,
            vec![[4.0, 1.0, 0.5, 0.0, 5.0, 0.5, 0.0, 0.0, 6.0]]
        );
        assert_eq!(request.positions, vec![vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]]);
        assert_eq!(request.group_sizes, vec![2]);
        assert_eq!(request.total_atoms(), 2);
    }

    #[test]
    fn compose_rejects_elements_outside_the_model() {
        let water = triclinic_pair();
        let result = BatchRequest::compose(&[water.clone(), water], &["O"]);
        assert!(matches!(
            result,
            Err(EngineError::UnsupportedElement { ref symbol, structure: 0 }) if symbol == "H"
        ));
    }

    #[test]
    fn non_periodic_structures_get_a_zero_box() {
        let molecule = Structure::new(None, vec!["H".into()], vec![Vector3::zeros()]).unwrap();
        let request = BatchRequest::compose(&[molecule], &["H".to_string()]).unwrap();
        assert_eq!(request.boxes[0], [0.0; 9]);
        assert!(!request.is_empty());
    }
}
