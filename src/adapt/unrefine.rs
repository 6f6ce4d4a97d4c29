use super::Adapt;
use crate::domain::{mesh::p_refinement::PolyOrders, Domain};
use crate::error::AdaptError;

use log::info;
use std::collections::BTreeSet;

impl Adapt {
    /// Coarsen the Meshes and Spaces where the stored element errors are small
    ///
    /// Groups of active, non-curved siblings whose summed error is below `thr` times the error of the worst element are merged
    /// into their parent, which takes the summed error and the direction-wise maximum of the siblings' orders. Afterwards,
    /// every other active element whose error is below `thr / 4` times the worst error loses one order in each direction.
    ///
    /// Requires a preceding [calc_err_est](Adapt::calc_err_est) and exactly two components.
    /// Returns the number of changes made (merges plus order reductions).
    pub fn unrefine(&mut self, domain: &mut Domain, thr: f64) -> Result<usize, AdaptError> {
        if !self.have_errors {
            return Err(AdaptError::ErrorsNotCalculated);
        }
        if self.num != 2 {
            return Err(AdaptError::UnrefineComponents(self.num));
        }
        if domain.num_components() != self.num {
            return Err(AdaptError::ComponentMismatch {
                expected: self.num,
                found: domain.num_components(),
            });
        }

        let scale = match self.regular_queue.first() {
            Some(head) => self.errors.get(head.comp, head.id),
            None => 0.0,
        };

        let changes = if domain.shares_mesh(0, 1) {
            self.unrefine_mesh(domain, &[0, 1], thr * scale)?
        } else {
            self.unrefine_mesh(domain, &[0], thr * scale)? + self.unrefine_mesh(domain, &[1], thr * scale)?
        };

        info!("Unrefined {} elements", changes);

        self.have_errors = false;
        domain.assign_dofs();

        Ok(changes)
    }

    /// Unrefine the Mesh underlying a set of components which share it
    fn unrefine_mesh(&mut self, domain: &mut Domain, comps: &[usize], limit: f64) -> Result<usize, AdaptError> {
        let mesh_id = domain.spaces[comps[0]].mesh_id;
        let mut merged = BTreeSet::new();

        for elem_id in domain.meshes[mesh_id].inactive_elem_ids() {
            let mesh = &domain.meshes[mesh_id];
            let sons = match mesh.elems[elem_id].child_ids() {
                Some(sons) => sons,
                None => continue,
            };
            if sons
                .iter()
                .any(|son| !mesh.elems[*son].is_active() || mesh.elems[*son].is_curved())
            {
                continue;
            }

            let sums: Vec<f64> = comps
                .iter()
                .map(|comp| sons.iter().map(|son| self.errors.get(*comp, *son)).sum())
                .collect();
            if sums.iter().any(|sum| *sum >= limit) {
                continue;
            }

            let orders: Vec<PolyOrders> = comps
                .iter()
                .map(|comp| {
                    sons.iter()
                        .map(|son| domain.spaces[*comp].get_element_order(*son))
                        .fold(PolyOrders::from(0, 0), |acc, o| acc.max_with(o))
                })
                .collect();

            domain.meshes[mesh_id].unrefine_elem(elem_id)?;
            for ((comp, sum), orders) in comps.iter().zip(sums).zip(orders) {
                self.errors.set(*comp, elem_id, sum);
                domain.spaces[*comp].set_element_order_internal(elem_id, orders);
            }
            merged.insert(elem_id);
        }

        let mut changes = merged.len();
        for elem_id in domain.meshes[mesh_id].active_elem_ids() {
            if merged.contains(&elem_id) {
                continue;
            }
            for comp in comps {
                if self.errors.get(*comp, elem_id) < limit / 4.0 {
                    let orders = domain.spaces[*comp].get_element_order(elem_id);
                    domain.spaces[*comp].set_element_order_internal(elem_id, orders.decremented());
                    changes += 1;
                }
            }
        }

        Ok(changes)
    }
}
