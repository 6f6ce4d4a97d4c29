use super::mesh::{
    p_refinement::{PRef, PRefError, PolyOrders},
    Mesh,
};
use std::collections::BTreeMap;
use std::ops::Range;

/// The function space a component of the solution lives in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpaceKind {
    /// Continuous fields; errors are measured in the H1 norm by default
    H1,
    /// Discontinuous fields; errors are measured in the L2 norm by default
    L2,
}

/// Polynomial expansion orders for every `Elem` of one Mesh, belonging to one solution component
///
/// Several `Space`s may reference the same Mesh (via `mesh_id`) while keeping independent orders
#[derive(Debug, Clone)]
pub struct Space {
    pub mesh_id: usize,
    pub kind: SpaceKind,
    default_orders: PolyOrders,
    orders: Vec<PolyOrders>,
    dofs: BTreeMap<usize, Range<usize>>,
}

impl Space {
    /// Create a Space over a Mesh with the same expansion orders on every `Elem`
    pub fn new(mesh_id: usize, mesh: &Mesh, kind: SpaceKind, orders: PolyOrders) -> Self {
        assert!(
            orders.is_valid(),
            "Expansion orders {:?} are out of range; Cannot construct Space!",
            orders
        );

        let mut space = Self {
            mesh_id,
            kind,
            default_orders: orders,
            orders: Vec::new(),
            dofs: BTreeMap::new(),
        };
        space.set_uniform_order(mesh, orders);
        space
    }

    /// Expansion orders of an `Elem` (the Space's default orders if never set)
    pub fn get_element_order(&self, elem_id: usize) -> PolyOrders {
        self.orders
            .get(elem_id)
            .copied()
            .unwrap_or(self.default_orders)
    }

    /// Set the expansion orders of an `Elem` without any validation against the Mesh
    pub fn set_element_order_internal(&mut self, elem_id: usize, orders: PolyOrders) {
        if elem_id >= self.orders.len() {
            self.orders.resize(elem_id + 1, self.default_orders);
        }
        self.orders[elem_id] = orders;
    }

    /// Set the expansion orders of every `Elem` in the Mesh
    pub fn set_uniform_order(&mut self, mesh: &Mesh, orders: PolyOrders) {
        self.orders = vec![orders; mesh.max_elem_id()];
    }

    /// Apply a [PRef] to a list of `Elem`s by their ID
    ///
    /// All refinements are validated before any are applied
    pub fn p_refine_elems(
        &mut self,
        mesh: &Mesh,
        elems: Vec<usize>,
        refinement: PRef,
    ) -> Result<(), PRefError> {
        let mut new_orders: BTreeMap<usize, PolyOrders> = BTreeMap::new();
        for elem_id in elems {
            if elem_id >= mesh.max_elem_id() {
                return Err(PRefError::ElemDoesntExist(elem_id));
            }

            let mut orders = self.get_element_order(elem_id);
            orders.refine(refinement)?;

            if new_orders.insert(elem_id, orders).is_some() {
                return Err(PRefError::DoubleRefinement(elem_id));
            }
        }

        for (elem_id, orders) in new_orders {
            self.set_element_order_internal(elem_id, orders);
        }

        Ok(())
    }

    /// Copy each parent's expansion orders onto its children
    ///
    /// `parents` maps child IDs to parent IDs; entries are processed in ascending child ID order so that
    /// nested refinements inherit from their (already updated) parents
    pub fn distribute_orders(&mut self, parents: &BTreeMap<usize, usize>) {
        for (child_id, parent_id) in parents {
            let orders = self.get_element_order(*parent_id);
            self.set_element_order_internal(*child_id, orders);
        }
    }

    /// Enumerate Degrees of Freedom over the active `Elem`s of the Mesh starting at `first`
    ///
    /// Each active `Elem` owns `(ni + 1) * (nj + 1)` consecutive indices. Returns the next unused index.
    pub fn assign_dofs(&mut self, mesh: &Mesh, first: usize) -> usize {
        self.dofs.clear();

        let mut next = first;
        for elem_id in mesh.active_elem_ids() {
            let num_terms = self.get_element_order(elem_id).num_terms();
            self.dofs.insert(elem_id, next..next + num_terms);
            next += num_terms;
        }

        next
    }

    /// Number of Degrees of Freedom enumerated by the last call to [assign_dofs](Self::assign_dofs)
    pub fn num_dofs(&self) -> usize {
        self.dofs.values().map(|range| range.len()).sum()
    }

    pub fn elem_dofs(&self, elem_id: usize) -> Option<Range<usize>> {
        self.dofs.get(&elem_id).cloned()
    }
}
