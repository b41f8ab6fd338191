//! Design problem description: domain, material and boundary conditions.
//!
//! The types mirror the JSON documents accepted by the optimization service.
//! Field names are camelCase on the wire. Integer geometry is kept signed so
//! that malformed submissions survive parsing and are reported by
//! [`validate`](crate::validate::validate) instead of failing opaquely.

use serde::{Deserialize, Serialize};

/// Integer coordinate on the mesh grid.
///
/// Supports and forces are placed on nodes, constant regions on elements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Column, growing to the right.
    pub x: i64,
    /// Row, growing downwards.
    pub y: i64,
}

impl Position {
    /// Create a [`Position`] with explicit coordinates.
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Width and height measured in elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Extent along the X axis.
    pub width: i64,
    /// Extent along the Y axis.
    pub height: i64,
}

impl Dimensions {
    /// Create [`Dimensions`] with explicit extents.
    #[must_use]
    pub const fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }

    /// Whether both extents are at least one element.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.width >= 1 && self.height >= 1
    }
}

/// Isotropic linear elastic material.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialProperties {
    /// Poisson's ratio.
    pub poisson_ratio: f64,
    /// Young's modulus of the solid phase.
    pub young_modulus: f64,
}

/// The rectangular design domain.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    /// Material filling the solid phase.
    pub material_properties: MaterialProperties,
    /// Size of the element grid.
    pub dimensions: Dimensions,
    /// Fraction of the domain that may be filled with material.
    pub volume_fraction: f64,
}

/// Cartesian axis of the mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Horizontal.
    X,
    /// Vertical.
    Y,
}

impl Axis {
    /// Offset of the DOF aligned with this axis within a node's DOF pair.
    #[must_use]
    pub const fn dof_offset(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
        }
    }
}

/// How a support restrains the nodes it covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SupportKind {
    /// Both displacement components are fixed.
    Fixed,
    /// Only the component aligned with the support axis is fixed.
    Mobile,
}

/// Run of nodes covered by a line support.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    /// Direction the line runs in.
    pub axis: Axis,
    /// Number of nodes on the line, starting at the support position.
    pub length: i64,
}

/// A displacement boundary condition.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Support {
    /// First node covered by the support.
    pub position: Position,
    /// Restraint applied to each covered node.
    #[serde(rename = "type")]
    pub kind: SupportKind,
    /// Present for line supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent: Option<Extent>,
    /// Footprint consulted by the determinacy check only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

impl Support {
    /// Axis whose DOF a mobile support restrains.
    ///
    /// Point supports without an extent restrain the horizontal DOF.
    #[must_use]
    pub fn axis(&self) -> Axis {
        self.extent.map_or(Axis::X, |extent| extent.axis)
    }

    /// Whether the support carries a footprint of at least one element.
    #[must_use]
    pub fn has_valid_dimensions(&self) -> bool {
        self.dimensions.map_or(false, |d| d.is_valid())
    }
}

/// A nodal load case.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Force {
    /// First node the load acts on.
    pub position: Position,
    /// Direction of the load; line loads also run along this axis.
    pub orientation: Axis,
    /// Magnitude applied at every loaded node.
    pub load: f64,
    /// Number of loaded nodes for a line load, zero for a point load.
    #[serde(default)]
    pub size: i64,
}

impl Force {
    /// Whether the load is spread over a run of nodes.
    #[must_use]
    pub const fn is_distributed(&self) -> bool {
        self.size > 0
    }
}

/// Density imposed on a constant region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegionKind {
    /// Elements forced to density 0.
    Void,
    /// Elements forced to density 1.
    Material,
}

/// Rectangle of elements excluded from optimization.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstantRegion {
    /// Top-left element of the rectangle.
    pub position: Position,
    /// Size of the rectangle in elements.
    pub dimensions: Dimensions,
    /// Density imposed on the covered elements.
    #[serde(rename = "type")]
    pub kind: RegionKind,
}

/// Supports, loads and constant regions of a design.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundaryConditions {
    /// Displacement restraints in submission order.
    pub supports: Vec<Support>,
    /// Load cases in submission order.
    pub forces: Vec<Force>,
    /// Regions with fixed density.
    #[serde(default)]
    pub constant_regions: Vec<ConstantRegion>,
}

/// A complete structural design problem.
///
/// # Examples
/// ```
/// use topoptx::DesignSpec;
///
/// let spec: DesignSpec = serde_json::from_str(r#"{
///     "domain": {
///         "materialProperties": { "poissonRatio": 0.3, "youngModulus": 1.0 },
///         "dimensions": { "width": 4, "height": 2 },
///         "volumeFraction": 0.5
///     },
///     "boundaryConditions": {
///         "supports": [{ "position": { "x": 0, "y": 0 }, "type": "FIXED" }],
///         "forces": [{ "position": { "x": 4, "y": 2 }, "orientation": "Y", "load": -1.0 }]
///     },
///     "penalization": 3.0,
///     "filterRadius": 1.5
/// }"#).expect("well-formed design");
/// assert!(spec.boundary_conditions.constant_regions.is_empty());
/// assert_eq!(spec.element_count(), 8);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignSpec {
    /// Design domain and material.
    pub domain: Domain,
    /// Supports, forces and constant regions.
    pub boundary_conditions: BoundaryConditions,
    /// SIMP penalization exponent.
    pub penalization: f64,
    /// Radius of the density filter in elements.
    #[serde(alias = "filterIndex")]
    pub filter_radius: f64,
}

impl DesignSpec {
    /// Number of elements in the design domain, zero for degenerate domains.
    #[must_use]
    pub fn element_count(&self) -> usize {
        let Dimensions { width, height } = self.domain.dimensions;
        usize::try_from(width.max(0) * height.max(0)).unwrap_or(0)
    }
}
