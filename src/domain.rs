/// Solution fields defined over a Mesh
pub mod fields;
/// The internal geometric structure of a Domain
pub mod mesh;
/// Polynomial expansion orders of one solution component
pub mod space;

use mesh::{
    h_refinement::{HRef, HRefError},
    p_refinement::PolyOrders,
    Mesh, MAX_POLYNOMIAL_ORDER,
};
use space::{Space, SpaceKind};

use log::info;
use std::collections::BTreeMap;

/// High Level Description of a multi-component FEM Domain
///
/// Meshes are held in an arena. Each component of the solution has one [Space] which refers to its Mesh by index;
/// components discretized on the same Mesh share its refinement state but keep their own expansion orders.
#[derive(Debug, Clone)]
pub struct Domain {
    pub meshes: Vec<Mesh>,
    pub spaces: Vec<Space>,
}

impl Domain {
    pub fn blank() -> Self {
        Self {
            meshes: Vec::new(),
            spaces: Vec::new(),
        }
    }

    /// Build a Domain where every component lives on the same Mesh
    pub fn single_mesh(mesh: Mesh, kinds: &[SpaceKind], orders: PolyOrders) -> Self {
        let mut dom = Self::blank();
        let mesh_id = dom.add_mesh(mesh);
        for kind in kinds {
            dom.add_space(mesh_id, *kind, orders);
        }
        dom.assign_dofs();
        dom
    }

    /// Add a Mesh to the arena, returning its index
    pub fn add_mesh(&mut self, mesh: Mesh) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    /// Add a component discretized over an existing Mesh, returning the component index
    pub fn add_space(&mut self, mesh_id: usize, kind: SpaceKind, orders: PolyOrders) -> usize {
        assert!(
            mesh_id < self.meshes.len(),
            "Mesh {} does not exist; Cannot add Space!",
            mesh_id
        );
        self.spaces
            .push(Space::new(mesh_id, &self.meshes[mesh_id], kind, orders));
        self.spaces.len() - 1
    }

    pub fn num_components(&self) -> usize {
        self.spaces.len()
    }

    /// The Mesh a component is discretized over
    pub fn mesh_of(&self, component: usize) -> &Mesh {
        &self.meshes[self.spaces[component].mesh_id]
    }

    /// Are two components discretized over the same Mesh
    pub fn shares_mesh(&self, comp_a: usize, comp_b: usize) -> bool {
        self.spaces[comp_a].mesh_id == self.spaces[comp_b].mesh_id
    }

    /// Components (other than `component`) discretized over the same Mesh as `component`
    pub fn sharing_components(&self, component: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.spaces.len())
            .filter(move |other| *other != component && self.shares_mesh(component, *other))
    }

    /// Number the Degrees of Freedom of every Space consecutively. Returns the total count.
    pub fn assign_dofs(&mut self) -> usize {
        let mut next = 0;
        for space in self.spaces.iter_mut() {
            next = space.assign_dofs(&self.meshes[space.mesh_id], next);
        }
        next
    }

    /// Construct the reference Domain: every Mesh isotropically refined once, every expansion order raised by one
    pub fn reference(&self) -> Result<Self, HRefError> {
        let mut reference = self.clone();

        for (mesh_id, mesh) in reference.meshes.iter_mut().enumerate() {
            let coarse_ids = mesh.active_elem_ids();
            mesh.global_h_refinement(HRef::T)?;

            let mut parents = BTreeMap::new();
            for elem_id in coarse_ids {
                for child_id in mesh.elems[elem_id].child_ids().unwrap_or_default() {
                    parents.insert(child_id, elem_id);
                }
            }

            for space in reference
                .spaces
                .iter_mut()
                .filter(|space| space.mesh_id == mesh_id)
            {
                space.distribute_orders(&parents);
                for elem_id in mesh.active_elem_ids() {
                    let orders = space.get_element_order(elem_id);
                    space.set_element_order_internal(
                        elem_id,
                        PolyOrders::from(
                            (orders.ni + 1).min(MAX_POLYNOMIAL_ORDER),
                            (orders.nj + 1).min(MAX_POLYNOMIAL_ORDER),
                        ),
                    );
                }
            }
        }

        let num_dofs = reference.assign_dofs();
        info!(
            "Constructed reference Domain: {} active Elems, {} DoFs",
            reference
                .meshes
                .iter()
                .map(|mesh| mesh.num_active_elems())
                .sum::<usize>(),
            num_dofs
        );

        Ok(reference)
    }
}

/// Hands out sequential IDs
#[derive(Debug)]
pub(crate) struct IdTracker {
    next_id: usize,
}

impl IdTracker {
    pub fn new(start: usize) -> Self {
        Self { next_id: start }
    }

    /// Reserve `n` consecutive IDs, returning the first
    pub fn next_n_ids(&mut self, n: usize) -> usize {
        self.next_id += n;
        self.next_id - n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_and_independent_meshes() {
        let mut dom = Domain::single_mesh(
            Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [2, 2]),
            &[SpaceKind::H1, SpaceKind::L2],
            PolyOrders::uniform(2),
        );
        let other = dom.add_mesh(Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [1, 1]));
        dom.add_space(other, SpaceKind::H1, PolyOrders::uniform(1));

        assert_eq!(dom.num_components(), 3);
        assert!(dom.shares_mesh(0, 1));
        assert!(!dom.shares_mesh(0, 2));
        assert_eq!(dom.sharing_components(0).collect::<Vec<_>>(), vec![1]);
        assert_eq!(dom.mesh_of(2).num_active_elems(), 1);

        assert_eq!(dom.assign_dofs(), 9 * 4 * 2 + 4);
    }

    #[test]
    fn reference_domain() {
        let dom = Domain::single_mesh(
            Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [2, 1]),
            &[SpaceKind::H1],
            PolyOrders::from(1, 2),
        );
        let reference = dom.reference().unwrap();

        let mesh = &reference.meshes[0];
        assert_eq!(mesh.num_active_elems(), 8);
        for elem_id in mesh.active_elem_ids() {
            assert_eq!(mesh.elem_depth(elem_id), 1);
            assert_eq!(
                reference.spaces[0].get_element_order(elem_id),
                PolyOrders::from(2, 3)
            );
        }

        // the coarse domain is untouched
        assert_eq!(dom.meshes[0].num_active_elems(), 2);
        assert_eq!(dom.spaces[0].get_element_order(0), PolyOrders::from(1, 2));
    }

    #[test]
    fn reference_of_refined_domain() {
        let mut dom = Domain::single_mesh(
            Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [2, 1]),
            &[SpaceKind::L2],
            PolyOrders::uniform(2),
        );
        let children = dom.meshes[0].refine_elem(0, HRef::T).unwrap();
        dom.spaces[0].set_element_order_internal(children[1], PolyOrders::from(4, 1));
        dom.assign_dofs();

        let reference = dom.reference().unwrap();
        let mesh = &reference.meshes[0];

        // only the active Elems are split
        assert_eq!(mesh.num_active_elems(), 4 * 4 + 4);
        assert!(children.iter().all(|child| mesh.elems[*child].has_children()));
        for grandchild in mesh.elems[children[1]].child_ids().unwrap() {
            assert_eq!(mesh.elem_depth(grandchild), 2);
            assert_eq!(reference.spaces[0].get_element_order(grandchild), PolyOrders::from(5, 2));
        }
    }

    #[test]
    fn id_tracker() {
        let mut tracker = IdTracker::new(3);
        assert_eq!(tracker.next_n_ids(4), 3);
        assert_eq!(tracker.next_n_ids(2), 7);
    }
}
