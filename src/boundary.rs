//! Translation of supports, forces and constant regions into FE primitives.

use std::collections::BTreeSet;

use nalgebra::DVector;

use crate::design::{Axis, BoundaryConditions, Position, RegionKind, SupportKind};
use crate::mesh::Mesh;

/// Maps validated boundary conditions onto a [`Mesh`].
///
/// The mapper assumes its input passed [`validate`](crate::validate::validate);
/// geometry outside the mesh is a caller error and is skipped rather than reported.
#[derive(Clone, Debug)]
pub struct BoundaryMapper {
    /// Grid the conditions are applied to.
    mesh: Mesh,
    /// Validated conditions.
    conditions: BoundaryConditions,
}

impl BoundaryMapper {
    /// Create a mapper for `conditions` on `mesh`.
    #[must_use]
    pub fn new(mesh: Mesh, conditions: BoundaryConditions) -> Self {
        Self { mesh, conditions }
    }

    /// Grid the conditions are applied to.
    #[must_use]
    pub fn mesh(&self) -> Mesh {
        self.mesh
    }

    /// DOFs restrained by any support.
    ///
    /// Fixed supports restrain both DOFs of every covered node, mobile supports
    /// only the DOF aligned with their axis. The result does not depend on the
    /// order of the supports.
    ///
    /// # Examples
    /// ```
    /// use topoptx::design::{Position, Support, SupportKind, BoundaryConditions};
    /// use topoptx::{BoundaryMapper, Mesh};
    ///
    /// let conditions = BoundaryConditions {
    ///     supports: vec![Support {
    ///         position: Position::new(1, 0),
    ///         kind: SupportKind::Fixed,
    ///         extent: None,
    ///         dimensions: None,
    ///     }],
    ///     ..BoundaryConditions::default()
    /// };
    /// let mapper = BoundaryMapper::new(Mesh::new(2, 2), conditions);
    /// assert_eq!(mapper.fixed_dofs().into_iter().collect::<Vec<_>>(), vec![6, 7]);
    /// ```
    #[must_use]
    pub fn fixed_dofs(&self) -> BTreeSet<usize> {
        let mut fixed = BTreeSet::new();
        for support in &self.conditions.supports {
            let (axis, count) = support
                .extent
                .map_or((Axis::X, 1), |extent| (extent.axis, extent.length));
            for node in self.line_nodes(support.position, axis, count) {
                match support.kind {
                    SupportKind::Fixed => {
                        fixed.insert(Mesh::dof(node, Axis::X));
                        fixed.insert(Mesh::dof(node, Axis::Y));
                    }
                    SupportKind::Mobile => {
                        fixed.insert(Mesh::dof(node, support.axis()));
                    }
                }
            }
        }
        fixed
    }

    /// One load vector per force, in submission order.
    ///
    /// Every node covered by a line load receives the full load value on the DOF
    /// aligned with the force orientation; loads are not split across the line.
    #[must_use]
    pub fn load_vectors(&self) -> Vec<DVector<f64>> {
        let ndof = self.mesh.dof_count();
        self.conditions
            .forces
            .iter()
            .map(|force| {
                let count = if force.is_distributed() { force.size } else { 1 };
                let mut load = DVector::zeros(ndof);
                for node in self.line_nodes(force.position, force.orientation, count) {
                    load[Mesh::dof(node, force.orientation)] = force.load;
                }
                load
            })
            .collect()
    }

    /// Elements forced to density 0.
    #[must_use]
    pub fn passive_elements(&self) -> BTreeSet<usize> {
        self.region_elements(RegionKind::Void)
    }

    /// Elements forced to density 1.
    #[must_use]
    pub fn active_elements(&self) -> BTreeSet<usize> {
        self.region_elements(RegionKind::Material)
    }

    /// Union of the elements covered by regions of one kind.
    ///
    /// A region at `(x, y)` of size `w` × `h` covers the half-open cell range
    /// `[x, x + w) × [y, y + h)`.
    fn region_elements(&self, kind: RegionKind) -> BTreeSet<usize> {
        let mut elements = BTreeSet::new();
        for region in self
            .conditions
            .constant_regions
            .iter()
            .filter(|region| region.kind == kind)
        {
            let (Some(x0), Some(y0)) = (to_index(region.position.x), to_index(region.position.y))
            else {
                continue;
            };
            let width = to_index(region.dimensions.width).unwrap_or(0);
            let height = to_index(region.dimensions.height).unwrap_or(0);
            let x_end = (x0 + width).min(self.mesh.nelx);
            let y_end = (y0 + height).min(self.mesh.nely);
            for x in x0..x_end {
                for y in y0..y_end {
                    elements.insert(self.mesh.element_id(x, y));
                }
            }
        }
        elements
    }

    /// Node ids of `count` consecutive nodes starting at `start` along `axis`.
    fn line_nodes(&self, start: Position, axis: Axis, count: i64) -> Vec<usize> {
        let (Some(x0), Some(y0)) = (to_index(start.x), to_index(start.y)) else {
            return Vec::new();
        };
        let count = to_index(count).unwrap_or(0);
        (0..count)
            .map(|step| match axis {
                Axis::X => (x0 + step, y0),
                Axis::Y => (x0, y0 + step),
            })
            .filter(|&(x, y)| x <= self.mesh.nelx && y <= self.mesh.nely)
            .map(|(x, y)| self.mesh.node_id(x, y))
            .collect()
    }
}

/// Convert a signed grid coordinate into an index.
fn to_index(value: i64) -> Option<usize> {
    usize::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{ConstantRegion, Dimensions, Extent, Force, Support};

    fn support(x: i64, y: i64, kind: SupportKind, extent: Option<Extent>) -> Support {
        Support {
            position: Position::new(x, y),
            kind,
            extent,
            dimensions: None,
        }
    }

    fn region(x: i64, y: i64, width: i64, height: i64, kind: RegionKind) -> ConstantRegion {
        ConstantRegion {
            position: Position::new(x, y),
            dimensions: Dimensions::new(width, height),
            kind,
        }
    }

    fn mapper(nelx: usize, nely: usize, conditions: BoundaryConditions) -> BoundaryMapper {
        BoundaryMapper::new(Mesh::new(nelx, nely), conditions)
    }

    #[test]
    fn fixed_point_support_restrains_both_dofs() {
        let conditions = BoundaryConditions {
            supports: vec![support(0, 0, SupportKind::Fixed, None)],
            ..BoundaryConditions::default()
        };
        let fixed = mapper(2, 2, conditions).fixed_dofs();
        assert_eq!(fixed.into_iter().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn mobile_line_support_restrains_its_axis() {
        let conditions = BoundaryConditions {
            supports: vec![support(
                0,
                2,
                SupportKind::Mobile,
                Some(Extent {
                    axis: Axis::X,
                    length: 3,
                }),
            )],
            ..BoundaryConditions::default()
        };
        let mesh = Mesh::new(2, 2);
        let fixed = mapper(2, 2, conditions).fixed_dofs();
        let expected: BTreeSet<usize> = (0..3)
            .map(|x| Mesh::dof(mesh.node_id(x, 2), Axis::X))
            .collect();
        assert_eq!(fixed, expected);
    }

    #[test]
    fn vertical_fixed_line_clamps_an_edge() {
        let conditions = BoundaryConditions {
            supports: vec![support(
                0,
                0,
                SupportKind::Fixed,
                Some(Extent {
                    axis: Axis::Y,
                    length: 3,
                }),
            )],
            ..BoundaryConditions::default()
        };
        let fixed = mapper(2, 2, conditions).fixed_dofs();
        assert_eq!(fixed.into_iter().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn fixed_dofs_ignore_support_order() {
        let supports = vec![
            support(0, 0, SupportKind::Fixed, None),
            support(
                2,
                0,
                SupportKind::Mobile,
                Some(Extent {
                    axis: Axis::Y,
                    length: 2,
                }),
            ),
            support(1, 1, SupportKind::Mobile, None),
        ];
        let mut reversed = supports.clone();
        reversed.reverse();

        let forward = mapper(
            2,
            2,
            BoundaryConditions {
                supports,
                ..BoundaryConditions::default()
            },
        );
        let backward = mapper(
            2,
            2,
            BoundaryConditions {
                supports: reversed,
                ..BoundaryConditions::default()
            },
        );
        assert_eq!(forward.fixed_dofs(), backward.fixed_dofs());
        assert_eq!(forward.fixed_dofs(), forward.fixed_dofs());
    }

    #[test]
    fn each_force_is_its_own_load_case() {
        let conditions = BoundaryConditions {
            forces: vec![
                Force {
                    position: Position::new(2, 0),
                    orientation: Axis::Y,
                    load: -1.0,
                    size: 0,
                },
                Force {
                    position: Position::new(2, 0),
                    orientation: Axis::X,
                    load: 2.0,
                    size: 0,
                },
            ],
            ..BoundaryConditions::default()
        };
        let loads = mapper(2, 2, conditions).load_vectors();
        assert_eq!(loads.len(), 2);
        assert_eq!(loads[0].len(), 18);
        // Node (2, 0) has id 6.
        assert_eq!(loads[0][13], -1.0);
        assert_eq!(loads[0].sum(), -1.0);
        assert_eq!(loads[1][12], 2.0);
        assert_eq!(loads[1].sum(), 2.0);
    }

    #[test]
    fn line_force_overwrites_every_node_with_the_full_load() {
        let conditions = BoundaryConditions {
            forces: vec![Force {
                position: Position::new(0, 1),
                orientation: Axis::Y,
                load: 3.0,
                size: 2,
            }],
            ..BoundaryConditions::default()
        };
        let mesh = Mesh::new(2, 2);
        let loads = mapper(2, 2, conditions).load_vectors();
        assert_eq!(loads[0][Mesh::dof(mesh.node_id(0, 1), Axis::Y)], 3.0);
        assert_eq!(loads[0][Mesh::dof(mesh.node_id(0, 2), Axis::Y)], 3.0);
        assert_eq!(loads[0].sum(), 6.0);
    }

    #[test]
    fn regions_exclude_their_far_edge() {
        let conditions = BoundaryConditions {
            constant_regions: vec![region(1, 0, 2, 1, RegionKind::Void)],
            ..BoundaryConditions::default()
        };
        let mesh = Mesh::new(3, 2);
        let passive = mapper(3, 2, conditions).passive_elements();
        let expected: BTreeSet<usize> = [mesh.element_id(1, 0), mesh.element_id(2, 0)]
            .into_iter()
            .collect();
        assert_eq!(passive, expected);
    }

    #[test]
    fn regions_split_by_kind_and_union() {
        let conditions = BoundaryConditions {
            constant_regions: vec![
                region(0, 0, 1, 2, RegionKind::Material),
                region(0, 1, 2, 1, RegionKind::Material),
                region(2, 0, 1, 1, RegionKind::Void),
            ],
            ..BoundaryConditions::default()
        };
        let mapper = mapper(3, 2, conditions);
        assert_eq!(
            mapper.active_elements().into_iter().collect::<Vec<_>>(),
            vec![0, 1, 3]
        );
        assert_eq!(
            mapper.passive_elements().into_iter().collect::<Vec<_>>(),
            vec![4]
        );
    }
}
