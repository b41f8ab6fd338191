//! Linear density filter.
//!
//! Each physical density is the weighted mean of the design variables within
//! `radius` element centres, with weight `radius - distance`. The filter both
//! regularizes the problem and suppresses checkerboard patterns.

use crate::mesh::Mesh;

/// Precomputed neighbourhoods of a density filter.
#[derive(Clone, Debug)]
pub struct DensityFilter {
    /// For each element, its neighbours and their weights.
    neighbours: Vec<Vec<(usize, f64)>>,
    /// Sum of the weights of each element's neighbourhood.
    weight_sums: Vec<f64>,
}

impl DensityFilter {
    /// Build the filter for `mesh` with the given radius in elements.
    ///
    /// A radius at or below one element degenerates to the identity.
    #[must_use]
    pub fn new(mesh: Mesh, radius: f64) -> Self {
        // Number of neighbouring columns/rows that can receive a positive weight,
        // never more than the mesh spans.
        let span = mesh.nelx.max(mesh.nely);
        let reach = (radius.ceil().max(1.0) as usize)
            .saturating_sub(1)
            .min(span);
        let mut neighbours = Vec::with_capacity(mesh.element_count());
        let mut weight_sums = Vec::with_capacity(mesh.element_count());

        for (x1, y1) in mesh.elements() {
            let mut row = Vec::new();
            let x_range = x1.saturating_sub(reach)..=(x1 + reach).min(mesh.nelx - 1);
            for x2 in x_range {
                let y_range = y1.saturating_sub(reach)..=(y1 + reach).min(mesh.nely - 1);
                for y2 in y_range {
                    let dx = x1 as f64 - x2 as f64;
                    let dy = y1 as f64 - y2 as f64;
                    let weight = radius - dx.hypot(dy);
                    if weight > 0.0 {
                        row.push((mesh.element_id(x2, y2), weight));
                    }
                }
            }
            // An element always keeps itself so the mean is defined.
            if row.is_empty() {
                row.push((mesh.element_id(x1, y1), 1.0));
            }
            weight_sums.push(row.iter().map(|(_, weight)| weight).sum());
            neighbours.push(row);
        }

        Self {
            neighbours,
            weight_sums,
        }
    }

    /// Number of elements the filter was built for.
    #[must_use]
    pub fn len(&self) -> usize {
        self.neighbours.len()
    }

    /// Whether the filter covers no element.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.neighbours.is_empty()
    }

    /// Filtered (physical) densities of the design variables `x`.
    #[must_use]
    pub fn apply(&self, x: &[f64]) -> Vec<f64> {
        self.neighbours
            .iter()
            .zip(&self.weight_sums)
            .map(|(row, sum)| row.iter().map(|&(j, w)| w * x[j]).sum::<f64>() / sum)
            .collect()
    }

    /// Chain a gradient with respect to physical densities back to the design
    /// variables.
    #[must_use]
    pub fn backpropagate(&self, gradient: &[f64]) -> Vec<f64> {
        let mut result = vec![0.0; gradient.len()];
        for (i, row) in self.neighbours.iter().enumerate() {
            let scaled = gradient[i] / self.weight_sums[i];
            for &(j, weight) in row {
                result[j] += weight * scaled;
            }
        }
        result
    }
}
