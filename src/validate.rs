//! Structural well-posedness checks for submitted designs.
//!
//! Every rule is evaluated so that a rejected submission receives the complete
//! list of problems in a single response.

use crate::design::{
    Axis, BoundaryConditions, ConstantRegion, DesignSpec, Dimensions, Force, Position, Support,
    SupportKind,
};
use crate::errors::{ValidationErrors, Violation};

/// Check a design against all well-posedness rules.
///
/// Returns an empty list when the design is valid. Violations are reported in
/// rule order: material, domain, optimization parameters, supports, forces and
/// constant regions.
///
/// # Examples
/// ```
/// use topoptx::validate::validate;
/// use topoptx::{DesignSpec, Violation};
///
/// let spec: DesignSpec = serde_json::from_str(r#"{
///     "domain": {
///         "materialProperties": { "poissonRatio": 0.3, "youngModulus": 1.0 },
///         "dimensions": { "width": 2, "height": 2 },
///         "volumeFraction": 0.5
///     },
///     "boundaryConditions": { "supports": [], "forces": [] },
///     "penalization": 3.0,
///     "filterRadius": 1.4
/// }"#).expect("well-formed design");
///
/// assert_eq!(validate(&spec), vec![Violation::MissingSupports, Violation::MissingForces]);
/// ```
#[must_use]
pub fn validate(spec: &DesignSpec) -> Vec<Violation> {
    let mut violations = Vec::new();
    check_material(spec, &mut violations);
    check_domain(spec, &mut violations);
    check_parameters(spec, &mut violations);

    let bounds = spec.domain.dimensions;
    let conditions = &spec.boundary_conditions;
    check_supports(conditions, bounds, &mut violations);
    check_forces(conditions, bounds, &mut violations);
    check_regions(&conditions.constant_regions, bounds, &mut violations);
    violations
}

impl DesignSpec {
    /// Validate the design, collecting every violation.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] holding all violated rules when the design is
    /// not well posed.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let violations = validate(self);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors::new(violations))
        }
    }
}

fn check_material(spec: &DesignSpec, violations: &mut Vec<Violation>) {
    let material = spec.domain.material_properties;
    let nu = material.poisson_ratio;
    if nu == 0.0 {
        violations.push(Violation::ZeroPoissonRatio);
    } else if !(nu > -1.0 && nu <= 0.5) {
        violations.push(Violation::PoissonRatioOutOfRange(nu));
    }
    if !(material.young_modulus > 0.0) {
        violations.push(Violation::NonPositiveYoungModulus(material.young_modulus));
    }
}

fn check_domain(spec: &DesignSpec, violations: &mut Vec<Violation>) {
    let domain = spec.domain;
    if !(domain.volume_fraction > 0.0) {
        violations.push(Violation::NonPositiveVolumeFraction(domain.volume_fraction));
    }
    if !domain.dimensions.is_valid() {
        violations.push(Violation::DomainTooSmall {
            width: domain.dimensions.width,
            height: domain.dimensions.height,
        });
    }
}

fn check_parameters(spec: &DesignSpec, violations: &mut Vec<Violation>) {
    if !(spec.penalization > 1.0) {
        violations.push(Violation::PenalizationTooLow(spec.penalization));
    }
    if !(spec.filter_radius > 0.0 && spec.filter_radius.is_finite()) {
        violations.push(Violation::NonPositiveFilterRadius(spec.filter_radius));
    }
}

/// Whether a position lies on the node grid of a domain.
fn node_in_bounds(position: Position, bounds: Dimensions) -> bool {
    (0..=bounds.width).contains(&position.x) && (0..=bounds.height).contains(&position.y)
}

/// Whether `count` nodes starting at `position` along `axis` stay on the node grid.
fn line_in_bounds(position: Position, axis: Axis, count: i64, bounds: Dimensions) -> bool {
    if count < 1 {
        return false;
    }
    let last = match axis {
        Axis::X => position.x.checked_add(count - 1).map(|x| Position::new(x, position.y)),
        Axis::Y => position.y.checked_add(count - 1).map(|y| Position::new(position.x, y)),
    };
    last.map_or(false, |last| {
        node_in_bounds(position, bounds) && node_in_bounds(last, bounds)
    })
}

fn check_supports(
    conditions: &BoundaryConditions,
    bounds: Dimensions,
    violations: &mut Vec<Violation>,
) {
    let supports = &conditions.supports;
    if supports.is_empty() {
        violations.push(Violation::MissingSupports);
        return;
    }

    for (index, support) in supports.iter().enumerate() {
        if !node_in_bounds(support.position, bounds) {
            violations.push(Violation::SupportOutOfBounds {
                index,
                x: support.position.x,
                y: support.position.y,
            });
        } else if let Some(extent) = support.extent {
            if !line_in_bounds(support.position, extent.axis, extent.length, bounds) {
                violations.push(Violation::SupportExtentOutOfBounds { index });
            }
        }
    }

    if !is_determinate(supports) {
        violations.push(Violation::UndeterminedSupports);
    }
}

/// Kinematic determinacy of a non-empty support set.
fn is_determinate(supports: &[Support]) -> bool {
    let dimensioned = |kind: SupportKind| {
        supports
            .iter()
            .any(|support| support.kind == kind && support.has_valid_dimensions())
    };
    let mobile = dimensioned(SupportKind::Mobile);
    let fixed = dimensioned(SupportKind::Fixed);
    let mixed = supports.len() >= 2
        && supports.iter().any(|s| s.kind != supports[0].kind)
        && supports.iter().any(Support::has_valid_dimensions);
    mobile || fixed || mixed
}

fn check_forces(
    conditions: &BoundaryConditions,
    bounds: Dimensions,
    violations: &mut Vec<Violation>,
) {
    let forces = &conditions.forces;
    if forces.is_empty() {
        violations.push(Violation::MissingForces);
        return;
    }

    for (index, force) in forces.iter().enumerate() {
        if force.load == 0.0 || !force.load.is_finite() {
            violations.push(Violation::InvalidLoad {
                index,
                load: force.load,
            });
        }
        if !node_in_bounds(force.position, bounds) {
            violations.push(Violation::ForceOutOfBounds {
                index,
                x: force.position.x,
                y: force.position.y,
            });
        } else if !force_line_fits(force, bounds) {
            violations.push(Violation::ForceExtentOutOfBounds {
                index,
                size: force.size,
            });
        }
    }
}

fn force_line_fits(force: &Force, bounds: Dimensions) -> bool {
    match force.size {
        0 => true,
        size => line_in_bounds(force.position, force.orientation, size, bounds),
    }
}

fn check_regions(regions: &[ConstantRegion], bounds: Dimensions, violations: &mut Vec<Violation>) {
    for (index, region) in regions.iter().enumerate() {
        let Dimensions { width, height } = region.dimensions;
        if !region.dimensions.is_valid() {
            violations.push(Violation::RegionTooSmall {
                index,
                width,
                height,
            });
        }
        let Position { x, y } = region.position;
        let beyond = |start: i64, extent: i64, limit: i64| {
            start.checked_add(extent).map_or(true, |end| end > limit)
        };
        if x < 0 || y < 0 || beyond(x, width, bounds.width) || beyond(y, height, bounds.height) {
            violations.push(Violation::RegionOutOfBounds { index });
        }
    }
}
