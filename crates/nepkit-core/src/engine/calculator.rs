use super::batch::{BatchBackend, BatchRequest, CalculationMode, Dftd3Parameters, RawBatchOutput};
use super::error::EngineError;
use crate::core::models::structure::{REDUCED_TENSOR_COMPONENTS, Structure};
use tracing::{debug, instrument};

/// Component layout of the virials returned by [`NepCalculator::calculate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VirialLayout {
    /// All nine tensor components, row-major.
    #[default]
    Full,
    /// `xx yy zz xy yz zx`.
    Reduced,
}

/// Per-structure energies, per-atom forces and per-structure virials.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalculationResult {
    pub energies: Vec<f64>,
    /// Forces of every atom, structures concatenated in input order.
    pub forces: Vec<[f64; 3]>,
    pub virials: Vec<Vec<f64>>,
}

/// Turns raw backend buffers into per-structure quantities.
pub struct NepCalculator<B> {
    backend: B,
}

impl<B: BatchBackend> NepCalculator<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn element_list(&self) -> &[String] {
        self.backend.element_list()
    }

    fn submit(
        &self,
        structures: &[Structure],
        mode: &CalculationMode,
    ) -> Result<(BatchRequest, RawBatchOutput), EngineError> {
        let request = BatchRequest::compose(structures, self.backend.element_list())?;
        debug!(
            num_structures = request.len(),
            num_atoms = request.total_atoms(),
            ?mode,
            "Submitting batch."
        );
        let output = self.backend.submit_batch(&request, mode)?;
        Ok((request, output))
    }

    /// Energies, forces and virials of every structure.
    ///
    /// The energy of a structure is the sum of its per-atom potentials; its
    /// virial is the mean over atoms of each of the nine components.
    #[instrument(skip_all, name = "nep_calculate")]
    pub fn calculate(
        &self,
        structures: &[Structure],
        layout: VirialLayout,
    ) -> Result<CalculationResult, EngineError> {
        self.potential(structures, CalculationMode::Calculate, layout)
    }

    /// The DFT-D3 dispersion correction alone, aggregated like [`Self::calculate`].
    #[instrument(skip_all, name = "nep_calculate_dftd3")]
    pub fn calculate_dftd3(
        &self,
        structures: &[Structure],
        parameters: &Dftd3Parameters,
        layout: VirialLayout,
    ) -> Result<CalculationResult, EngineError> {
        self.potential(structures, CalculationMode::Dftd3(parameters.clone()), layout)
    }

    /// Model predictions with the DFT-D3 correction added.
    #[instrument(skip_all, name = "nep_calculate_with_dftd3")]
    pub fn calculate_with_dftd3(
        &self,
        structures: &[Structure],
        parameters: &Dftd3Parameters,
        layout: VirialLayout,
    ) -> Result<CalculationResult, EngineError> {
        self.potential(
            structures,
            CalculationMode::CalculateWithDftd3(parameters.clone()),
            layout,
        )
    }

    fn potential(
        &self,
        structures: &[Structure],
        mode: CalculationMode,
        layout: VirialLayout,
    ) -> Result<CalculationResult, EngineError> {
        if structures.is_empty() {
            return Ok(CalculationResult::default());
        }
        let (request, output) = self.submit(structures, &mode)?;
        let RawBatchOutput::Potential {
            potentials,
            forces,
            virials,
        } = output
        else {
            return Err(EngineError::UnexpectedOutput { mode });
        };
        check_count("structures", request.len(), potentials.len())?;
        check_count("structures", request.len(), forces.len())?;
        check_count("structures", request.len(), virials.len())?;

        let mut result = CalculationResult {
            energies: Vec::with_capacity(request.len()),
            forces: Vec::with_capacity(request.total_atoms()),
            virials: Vec::with_capacity(request.len()),
        };

        for (index, &n) in request.group_sizes.iter().enumerate() {
            check_width("potential", index, n, potentials[index].len())?;
            check_width("force", index, 3 * n, forces[index].len())?;
            check_width("virial", index, 9 * n, virials[index].len())?;

            result.energies.push(potentials[index].iter().sum());

            let f = &forces[index];
            result
                .forces
                .extend((0..n).map(|atom| [f[atom], f[n + atom], f[2 * n + atom]]));

            let full: Vec<f64> = virials[index]
                .chunks(n.max(1))
                .map(|block| block.iter().sum::<f64>() / n as f64)
                .chain(std::iter::repeat(0.0))
                .take(9)
                .collect();
            result.virials.push(match layout {
                VirialLayout::Full => full,
                VirialLayout::Reduced => REDUCED_TENSOR_COMPONENTS.iter().map(|&k| full[k]).collect(),
            });
        }
        Ok(result)
    }

    /// Descriptor of every atom of one structure, one row per atom.
    ///
    /// The backend replies with all atoms' first components, then all
    /// second components, and so on; the row width is `len / N`.
    #[instrument(skip_all, name = "nep_atom_descriptor")]
    pub fn descriptor(&self, structure: &Structure) -> Result<Vec<Vec<f64>>, EngineError> {
        let n = structure.num_atoms();
        if n == 0 {
            return Ok(Vec::new());
        }
        let mode = CalculationMode::AtomDescriptor;
        let (_, output) = self.submit(std::slice::from_ref(structure), &mode)?;
        let RawBatchOutput::PerStructure(rows) = output else {
            return Err(EngineError::UnexpectedOutput { mode });
        };
        check_count("structures", 1, rows.len())?;
        let flat = &rows[0];
        if flat.is_empty() || flat.len() % n != 0 {
            return Err(EngineError::ShapeMismatch {
                quantity: "atom descriptor",
                structure: 0,
                expected: flat.len().div_ceil(n).max(1) * n,
                found: flat.len(),
            });
        }
        let width = flat.len() / n;
        Ok((0..n)
            .map(|atom| (0..width).map(|d| flat[d * n + atom]).collect())
            .collect())
    }

    /// Structure-averaged descriptor of every structure.
    pub fn structures_descriptor(&self, structures: &[Structure]) -> Result<Vec<Vec<f64>>, EngineError> {
        self.per_structure(structures, CalculationMode::Descriptor)
    }

    pub fn structures_polarizability(
        &self,
        structures: &[Structure],
    ) -> Result<Vec<Vec<f64>>, EngineError> {
        self.per_structure(structures, CalculationMode::Polarizability)
    }

    pub fn structures_dipole(&self, structures: &[Structure]) -> Result<Vec<Vec<f64>>, EngineError> {
        self.per_structure(structures, CalculationMode::Dipole)
    }

    #[instrument(skip_all, name = "nep_per_structure", fields(mode = ?mode))]
    fn per_structure(
        &self,
        structures: &[Structure],
        mode: CalculationMode,
    ) -> Result<Vec<Vec<f64>>, EngineError> {
        if structures.is_empty() {
            return Ok(Vec::new());
        }
        let (request, output) = self.submit(structures, &mode)?;
        let RawBatchOutput::PerStructure(rows) = output else {
            return Err(EngineError::UnexpectedOutput { mode });
        };
        check_count("structures", request.len(), rows.len())?;

        let width = rows.first().map_or(0, Vec::len);
        for (index, row) in rows.iter().enumerate() {
            check_width("per-structure output", index, width, row.len())?;
        }
        Ok(rows)
    }
}

fn check_count(quantity: &'static str, expected: usize, found: usize) -> Result<(), EngineError> {
    if expected == found {
        Ok(())
    } else {
        // first structure without a matching entry
        Err(EngineError::ShapeMismatch {
            quantity,
            structure: found.min(expected),
            expected,
            found,
        })
    }
}

fn check_width(
    quantity: &'static str,
    structure: usize,
    expected: usize,
    found: usize,
) -> Result<(), EngineError> {
    if expected == found {
        Ok(())
    } else {
        Err(EngineError::ShapeMismatch {
            quantity,
            structure,
            expected,
            found,
        })
    }
}
