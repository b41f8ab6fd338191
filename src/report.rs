use std::fmt::Write;

use ndarray::Array2;
use topoptx::{DesignSpec, Mesh, OptimizationResult};

/// Glyphs for increasing density, void first.
const SHADES: [char; 4] = [' ', '.', '+', '#'];

/// Arrange element densities as a `height × width` grid, row 0 on top.
///
/// Returns `None` when the density count does not match the mesh.
pub fn density_grid(mesh: Mesh, densities: &[f64]) -> Option<Array2<f64>> {
    // Elements are numbered column by column.
    let by_column = Array2::from_shape_vec((mesh.nelx, mesh.nely), densities.to_vec()).ok()?;
    Some(by_column.reversed_axes())
}

/// Glyph for one density value.
fn shade(density: f64) -> char {
    let level = (density.clamp(0.0, 1.0) * SHADES.len() as f64) as usize;
    SHADES[level.min(SHADES.len() - 1)]
}

/// Render a textual summary of a finished optimization.
///
/// The density map prints one character per element: blank for void, `#`
/// for solid material.
#[must_use]
pub fn render_report(spec: &DesignSpec, result: &OptimizationResult) -> String {
    let mesh = Mesh::from_dimensions(spec.domain.dimensions);
    let mut output = String::new();

    writeln!(
        &mut output,
        "Topology optimization of a {} x {} domain (volume fraction = {:.2})",
        mesh.nelx, mesh.nely, spec.domain.volume_fraction
    )
    .expect("writing to string cannot fail");

    writeln!(
        &mut output,
        "Iterations: {}, compliance = {:.6e}, volume = {:.3} of {}",
        result.iteration,
        result.objective,
        result.volume,
        mesh.element_count()
    )
    .expect("writing to string cannot fail");

    let Some(grid) = density_grid(mesh, &result.densities) else {
        output.push_str("Density map: not available (size mismatch)\n");
        return output;
    };

    let border = "-".repeat(mesh.nelx);
    writeln!(&mut output, "+{border}+").expect("writing to string cannot fail");
    for row in grid.rows() {
        let line: String = row.iter().copied().map(shade).collect();
        writeln!(&mut output, "|{line}|").expect("writing to string cannot fail");
    }
    writeln!(&mut output, "+{border}+").expect("writing to string cannot fail");

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_spec() -> DesignSpec {
        serde_json::from_value(serde_json::json!({
            "domain": {
                "materialProperties": { "poissonRatio": 0.3, "youngModulus": 1.0 },
                "dimensions": { "width": 2, "height": 2 },
                "volumeFraction": 0.5
            },
            "boundaryConditions": { "supports": [], "forces": [] },
            "penalization": 3.0,
            "filterRadius": 1.4
        }))
        .expect("design parses")
    }

    #[test]
    fn grid_places_elements_by_column() {
        let grid = density_grid(Mesh::new(3, 2), &[0.0, 0.1, 0.2, 0.3, 0.4, 0.5])
            .expect("sizes match");
        assert_eq!(grid.dim(), (2, 3));
        assert_eq!(grid[[0, 1]], 0.2);
        assert_eq!(grid[[1, 2]], 0.5);
    }

    #[test]
    fn grid_rejects_wrong_length() {
        assert!(density_grid(Mesh::new(2, 2), &[1.0; 3]).is_none());
    }

    #[test]
    fn shades_cover_unit_interval() {
        assert_eq!(shade(0.0), ' ');
        assert_eq!(shade(0.3), '.');
        assert_eq!(shade(0.6), '+');
        assert_eq!(shade(1.0), '#');
    }

    #[test]
    fn formats_human_readable_report() {
        let result = OptimizationResult::finished(vec![1.0, 0.0, 1.0, 0.0], 12.5, 30);
        let report = render_report(&square_spec(), &result);
        assert!(report.contains("2 x 2 domain"));
        assert!(report.contains("Iterations: 30"));
        assert!(report.contains("|##|\n|  |"));
    }
}
