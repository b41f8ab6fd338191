//! Minimum-compliance problem on a plane-stress quadrilateral mesh.

use std::collections::BTreeSet;

use nalgebra::{DMatrix, SMatrix, SVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::boundary::BoundaryMapper;
use crate::design::DesignSpec;
use crate::errors::SolverError;
use crate::filter::DensityFilter;
use crate::mesh::Mesh;
use crate::solver::{DesignProblem, SolverSettings};

/// Fraction of the void stiffness ratio below which a relative Cholesky pivot
/// is taken for a mechanism rather than soft material.
const PIVOT_MARGIN: f64 = 1.0e-4;

/// Stiffness matrix of a unit square bilinear element with unit Young's modulus.
///
/// Rows and columns follow [`Mesh::element_dofs`].
#[must_use]
pub fn element_stiffness(poisson_ratio: f64) -> SMatrix<f64, 8, 8> {
    let nu = poisson_ratio;
    let k = [
        0.5 - nu / 6.0,
        0.125 + nu / 8.0,
        -0.25 - nu / 12.0,
        -0.125 + 3.0 * nu / 8.0,
        -0.25 + nu / 12.0,
        -0.125 - nu / 8.0,
        nu / 6.0,
        0.125 - 3.0 * nu / 8.0,
    ];
    const PATTERN: [[usize; 8]; 8] = [
        [0, 1, 2, 3, 4, 5, 6, 7],
        [1, 0, 7, 6, 5, 4, 3, 2],
        [2, 7, 0, 5, 6, 3, 4, 1],
        [3, 6, 5, 0, 7, 2, 1, 4],
        [4, 5, 6, 7, 0, 1, 2, 3],
        [5, 4, 3, 2, 1, 0, 7, 6],
        [6, 3, 4, 1, 2, 7, 0, 5],
        [7, 2, 1, 4, 3, 6, 5, 0],
    ];
    let scale = 1.0 / (1.0 - nu * nu);
    SMatrix::from_fn(|row, col| scale * k[PATTERN[row][col]])
}

/// Compliance of a SIMP-interpolated structure under one or more load cases.
///
/// The element modulus is `Emin + ρ^p (E0 - Emin)` where `ρ` is the filtered
/// density. Compliance is summed over the load cases.
#[derive(Clone, Debug)]
pub struct ComplianceProblem {
    /// Discretization of the domain.
    mesh: Mesh,
    /// Unit-modulus element stiffness.
    element_stiffness: SMatrix<f64, 8, 8>,
    /// Modulus of solid material.
    young_modulus: f64,
    /// Modulus of void material.
    min_young_modulus: f64,
    /// SIMP exponent.
    penalization: f64,
    /// Admissible sum of physical densities.
    volume_limit: f64,
    /// Density filter applied to the design variables.
    filter: DensityFilter,
    /// Position of each global DOF in the reduced system, `None` when fixed.
    free_index: Vec<Option<usize>>,
    /// Number of unrestrained DOFs.
    free_count: usize,
    /// Load cases as columns, reduced to the free DOFs.
    loads: DMatrix<f64>,
    /// Elements forced to density 0.
    passive: BTreeSet<usize>,
    /// Elements forced to density 1.
    active: BTreeSet<usize>,
    /// Smallest admissible pivot relative to the largest stiffness diagonal.
    pivot_tolerance: f64,
}

impl ComplianceProblem {
    /// Build the problem for a validated design.
    #[must_use]
    pub fn new(spec: &DesignSpec, boundary: &BoundaryMapper, settings: &SolverSettings) -> Self {
        let mesh = boundary.mesh();
        let material = spec.domain.material_properties;
        let fixed = boundary.fixed_dofs();

        let mut free_count = 0;
        let free_index: Vec<Option<usize>> = (0..mesh.dof_count())
            .map(|dof| {
                if fixed.contains(&dof) {
                    None
                } else {
                    free_count += 1;
                    Some(free_count - 1)
                }
            })
            .collect();

        let load_vectors = boundary.load_vectors();
        let mut loads = DMatrix::zeros(free_count, load_vectors.len());
        for (case, load) in load_vectors.iter().enumerate() {
            for (dof, slot) in free_index.iter().enumerate() {
                if let Some(row) = slot {
                    loads[(*row, case)] = load[dof];
                }
            }
        }

        Self {
            mesh,
            element_stiffness: element_stiffness(material.poisson_ratio),
            young_modulus: material.young_modulus,
            min_young_modulus: material.young_modulus * settings.min_stiffness_ratio,
            penalization: spec.penalization,
            volume_limit: spec.domain.volume_fraction * mesh.element_count() as f64,
            filter: DensityFilter::new(mesh, spec.filter_radius),
            free_index,
            free_count,
            loads,
            passive: boundary.passive_elements(),
            active: boundary.active_elements(),
            pivot_tolerance: settings.min_stiffness_ratio * PIVOT_MARGIN,
        }
    }

    /// Element modulus for a physical density.
    fn modulus(&self, density: f64) -> f64 {
        self.min_young_modulus
            + density.powf(self.penalization) * (self.young_modulus - self.min_young_modulus)
    }

    /// Assemble the sparse stiffness matrix restricted to the free DOFs.
    fn reduced_stiffness(&self, densities: &[f64]) -> CscMatrix<f64> {
        let mut triplets = CooMatrix::new(self.free_count, self.free_count);
        for (element, (x, y)) in self.mesh.elements().enumerate() {
            let scale = self.modulus(densities[element]);
            let dof_map = self.mesh.element_dofs(x, y);
            for (row_local, global_row) in dof_map.iter().enumerate() {
                let Some(row) = self.free_index[*global_row] else {
                    continue;
                };
                for (col_local, global_col) in dof_map.iter().enumerate() {
                    if let Some(col) = self.free_index[*global_col] {
                        triplets.push(row, col, scale * self.element_stiffness[(row_local, col_local)]);
                    }
                }
            }
        }
        // Duplicate entries are summed on conversion.
        CscMatrix::from(&triplets)
    }

    /// Solve for the free displacements of every load case.
    ///
    /// The reduced stiffness is symmetric positive definite exactly when the
    /// supports prevent every rigid motion; anything else is reported singular.
    fn solve_displacements(&self, stiffness: &CscMatrix<f64>) -> Result<DMatrix<f64>, SolverError> {
        if self.free_count == 0 {
            return Ok(DMatrix::zeros(0, self.loads.ncols()));
        }
        let largest = max_abs(stiffness.diagonal_as_csc().values());
        let cholesky = CscCholesky::factor(stiffness).map_err(|_| SolverError::SingularStiffness)?;

        // Squared diagonal of the factor are the pivots.
        let factor_diagonal = cholesky.l().diagonal_as_csc();
        let pivots = factor_diagonal.values();
        let smallest = pivots.iter().fold(f64::INFINITY, |low, l| low.min(l * l));
        if pivots.len() < self.free_count || !(smallest > self.pivot_tolerance * largest) {
            return Err(SolverError::SingularStiffness);
        }
        Ok(cholesky.solve(&self.loads))
    }

    /// Displacements of the eight DOFs of an element for one load case.
    fn element_displacements(
        &self,
        displacements: &DMatrix<f64>,
        case: usize,
        x: usize,
        y: usize,
    ) -> SVector<f64, 8> {
        let dof_map = self.mesh.element_dofs(x, y);
        SVector::from_fn(|local, _| {
            self.free_index[dof_map[local]].map_or(0.0, |row| displacements[(row, case)])
        })
    }

    /// Whether the density of `element` is imposed by a constant region.
    fn is_constant(&self, element: usize) -> bool {
        self.passive.contains(&element) || self.active.contains(&element)
    }
}

/// Largest magnitude in `values`, zero when empty.
fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |high, v| high.max(v.abs()))
}

impl DesignProblem for ComplianceProblem {
    fn element_count(&self) -> usize {
        self.mesh.element_count()
    }

    fn volume_limit(&self) -> f64 {
        self.volume_limit
    }

    fn physical(&self, x: &[f64]) -> Vec<f64> {
        let mut densities = self.filter.apply(x);
        for &element in &self.passive {
            densities[element] = 0.0;
        }
        for &element in &self.active {
            densities[element] = 1.0;
        }
        densities
    }

    fn evaluate(&mut self, x: &[f64], gradient: &mut [f64]) -> Result<f64, SolverError> {
        let expected = self.element_count();
        if x.len() != expected || gradient.len() != expected {
            return Err(SolverError::DimensionMismatch {
                expected,
                actual: if x.len() == expected {
                    gradient.len()
                } else {
                    x.len()
                },
            });
        }

        let densities = self.physical(x);
        let displacements = self.solve_displacements(&self.reduced_stiffness(&densities))?;
        let compliance = self.loads.dot(&displacements);
        // Work done by the loads is never negative on a sound system.
        if !compliance.is_finite() {
            return Err(SolverError::NonFiniteObjective(compliance));
        }
        if compliance < 0.0 {
            return Err(SolverError::SingularStiffness);
        }

        let ke = self.element_stiffness;
        let mut sensitivities = vec![0.0; expected];
        for (element, (ex, ey)) in self.mesh.elements().enumerate() {
            if self.is_constant(element) {
                continue;
            }
            let factor = -self.penalization
                * densities[element].powf(self.penalization - 1.0)
                * (self.young_modulus - self.min_young_modulus);
            for case in 0..self.loads.ncols() {
                let ue = self.element_displacements(&displacements, case, ex, ey);
                sensitivities[element] += factor * ue.dot(&(ke * ue));
            }
        }

        let chained = self.filter.backpropagate(&sensitivities);
        for (element, (slot, value)) in gradient.iter_mut().zip(chained).enumerate() {
            *slot = if self.is_constant(element) { 0.0 } else { value };
        }
        Ok(compliance)
    }
}
