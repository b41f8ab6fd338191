//! Numbering of nodes, elements and degrees of freedom on the regular grid.
//!
//! Nodes and elements are numbered column by column: `id = y + x * rows`.
//! Every node owns two DOFs, the horizontal one at `2 * node` and the vertical
//! one at `2 * node + 1`.

use crate::design::{Axis, Dimensions};

/// A regular grid of `nelx` × `nely` bilinear quadrilateral elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mesh {
    /// Number of element columns.
    pub nelx: usize,
    /// Number of element rows.
    pub nely: usize,
}

impl Mesh {
    /// Create a mesh with explicit element counts.
    #[must_use]
    pub const fn new(nelx: usize, nely: usize) -> Self {
        Self { nelx, nely }
    }

    /// Create a mesh matching validated domain dimensions.
    ///
    /// Negative extents clamp to zero; callers validate designs first.
    #[must_use]
    pub fn from_dimensions(dimensions: Dimensions) -> Self {
        let clamp = |value: i64| usize::try_from(value).unwrap_or(0);
        Self::new(clamp(dimensions.width), clamp(dimensions.height))
    }

    /// Number of elements.
    #[must_use]
    pub const fn element_count(&self) -> usize {
        self.nelx * self.nely
    }

    /// Number of nodes.
    #[must_use]
    pub const fn node_count(&self) -> usize {
        (self.nelx + 1) * (self.nely + 1)
    }

    /// Number of degrees of freedom.
    #[must_use]
    pub const fn dof_count(&self) -> usize {
        2 * self.node_count()
    }

    /// Identifier of the node at grid coordinate `(x, y)`.
    ///
    /// # Examples
    /// ```
    /// use topoptx::Mesh;
    ///
    /// let mesh = Mesh::new(2, 2);
    /// assert_eq!(mesh.node_id(0, 0), 0);
    /// assert_eq!(mesh.node_id(0, 2), 2);
    /// assert_eq!(mesh.node_id(1, 0), 3);
    /// ```
    #[must_use]
    pub const fn node_id(&self, x: usize, y: usize) -> usize {
        y + x * (self.nely + 1)
    }

    /// Identifier of the element whose top-left node is `(x, y)`.
    #[must_use]
    pub const fn element_id(&self, x: usize, y: usize) -> usize {
        y + x * self.nely
    }

    /// DOF of `node` aligned with `axis`.
    #[must_use]
    pub const fn dof(node: usize, axis: Axis) -> usize {
        2 * node + axis.dof_offset()
    }

    /// The eight DOFs of an element, counter-clockwise from the bottom-left node.
    ///
    /// The ordering matches [`element_stiffness`](crate::fem::element_stiffness).
    #[must_use]
    pub const fn element_dofs(&self, x: usize, y: usize) -> [usize; 8] {
        let n1 = (self.nely + 1) * x + y;
        let n2 = (self.nely + 1) * (x + 1) + y;
        [
            2 * n1 + 2,
            2 * n1 + 3,
            2 * n2 + 2,
            2 * n2 + 3,
            2 * n2,
            2 * n2 + 1,
            2 * n1,
            2 * n1 + 1,
        ]
    }

    /// Grid coordinate of every element in id order.
    pub fn elements(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.nelx).flat_map(move |x| (0..self.nely).map(move |y| (x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_grid_size() {
        let mesh = Mesh::new(3, 2);
        assert_eq!(mesh.element_count(), 6);
        assert_eq!(mesh.node_count(), 12);
        assert_eq!(mesh.dof_count(), 24);
    }

    #[test]
    fn elements_iterate_in_id_order() {
        let mesh = Mesh::new(3, 2);
        for (expected, (x, y)) in mesh.elements().enumerate() {
            assert_eq!(mesh.element_id(x, y), expected);
        }
    }

    #[test]
    fn element_dofs_touch_the_four_corner_nodes() {
        let mesh = Mesh::new(2, 2);
        let dofs = mesh.element_dofs(1, 0);
        let mut nodes: Vec<usize> = dofs.iter().map(|dof| dof / 2).collect();
        nodes.sort_unstable();
        nodes.dedup();
        let expected = [
            mesh.node_id(1, 0),
            mesh.node_id(1, 1),
            mesh.node_id(2, 0),
            mesh.node_id(2, 1),
        ];
        assert_eq!(nodes, expected);
    }

    #[test]
    fn negative_dimensions_clamp_to_empty_mesh() {
        let mesh = Mesh::from_dimensions(Dimensions::new(-2, 3));
        assert_eq!(mesh.element_count(), 0);
    }
}
