use super::refinement::ElementReference;
use crate::domain::mesh::Mesh;

use std::cmp::Ordering;

/// Squared error of every element of every component, indexed `[component][elem_id]`
#[derive(Clone, Debug, Default)]
pub struct ElementErrors {
    errors: Vec<Vec<f64>>,
}

impl ElementErrors {
    /// Discard all stored errors and prepare zeroed storage for `max_ids[c]` elements of each component `c`
    pub fn reset(&mut self, max_ids: &[usize]) {
        self.errors = max_ids.iter().map(|max_id| vec![0.0; *max_id]).collect();
    }

    pub fn num_components(&self) -> usize {
        self.errors.len()
    }

    /// Stored error of an element (zero if none was ever stored)
    pub fn get(&self, comp: usize, elem_id: usize) -> f64 {
        self.errors
            .get(comp)
            .and_then(|comp_errors| comp_errors.get(elem_id))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn add(&mut self, comp: usize, elem_id: usize, err: f64) {
        let current = self.get(comp, elem_id);
        self.set(comp, elem_id, current + err);
    }

    pub fn set(&mut self, comp: usize, elem_id: usize, err: f64) {
        let comp_errors = &mut self.errors[comp];
        if elem_id >= comp_errors.len() {
            comp_errors.resize(elem_id + 1, 0.0);
        }
        comp_errors[elem_id] = err;
    }

    /// Divide the errors of a set of elements of one component by `divisor`
    pub fn normalize(&mut self, comp: usize, elem_ids: &[usize], divisor: f64) {
        for elem_id in elem_ids {
            let err = self.get(comp, *elem_id);
            self.set(comp, *elem_id, err / divisor);
        }
    }
}

/// Order two element references by descending error, breaking ties by lower component then lower id
pub fn compare_elements(errors: &ElementErrors, a: &ElementReference, b: &ElementReference) -> Ordering {
    errors
        .get(b.comp, b.id)
        .total_cmp(&errors.get(a.comp, a.id))
        .then(a.comp.cmp(&b.comp))
        .then(a.id.cmp(&b.id))
}

/// List every active (element, component) pair sorted by [compare_elements]
///
/// `meshes[c]` is the Mesh of component `c`
pub fn fill_regular_queue(errors: &ElementErrors, meshes: &[&Mesh]) -> Vec<ElementReference> {
    let mut queue: Vec<ElementReference> = meshes
        .iter()
        .enumerate()
        .flat_map(|(comp, mesh)| {
            mesh.active_elem_ids()
                .into_iter()
                .map(move |elem_id| ElementReference::new(elem_id, comp))
        })
        .collect();

    queue.sort_by(|a, b| compare_elements(errors, a, b));
    queue
}
