use super::{
    refinement::{ElementReference, ElementToRefine, RefinementType},
    selector::{ElemContext, Selector},
};
use crate::domain::{fields::SolutionRef, Domain};

use log::debug;
use std::collections::HashMap;

fn context<'a>(domain: &'a Domain, reference: &[SolutionRef<'a>], comp: usize, elem_id: usize) -> ElemContext<'a> {
    ElemContext {
        mesh: domain.mesh_of(comp),
        elem_id,
        current: domain.spaces[comp].get_element_order(elem_id),
        reference: reference.get(comp).copied(),
    }
}

/// Make the refinements of components sharing a Mesh agree on how each element is split
///
/// `idx` maps each (element, component) pair to its position in `to_refine` and is kept up to date as entries are added.
/// Only the entries present on entry are examined; synthesized entries are appended after them.
pub fn fix_shared_mesh_refinements(
    domain: &Domain,
    to_refine: &mut Vec<ElementToRefine>,
    idx: &mut HashMap<ElementReference, usize>,
    selectors: &[Box<dyn Selector>],
    reference: &[SolutionRef],
) {
    let num_original = to_refine.len();

    for inx in 0..num_original {
        let ElementToRefine { id, comp, q, .. } = to_refine[inx];
        let sharing: Vec<usize> = domain.sharing_components(comp).collect();
        if sharing.is_empty() {
            continue;
        }

        let mut selected = to_refine[inx].split;
        for other in sharing.iter() {
            if selected == RefinementType::H {
                break;
            }
            if let Some(ii) = idx.get(&ElementReference::new(id, *other)) {
                selected = selected.combined_with(to_refine[*ii].split);
            }
        }

        if selected == RefinementType::P {
            continue;
        }

        let suggested = if selected == RefinementType::H { Some(q) } else { None };

        if to_refine[inx].split != selected {
            debug!(
                "Elem {} (comp {}): {:?} promoted to {:?} by a component sharing its Mesh",
                id, comp, to_refine[inx].split, selected
            );
            to_refine[inx].split = selected;
            to_refine[inx].p = selectors[comp].generate_shared_mesh_orders(
                &context(domain, reference, comp, id),
                selected,
                suggested.as_ref(),
            );
        }

        for other in sharing {
            let elem_ref = ElementReference::new(id, other);
            match idx.get(&elem_ref) {
                Some(ii) => {
                    let entry = &mut to_refine[*ii];
                    if entry.split != selected {
                        entry.split = selected;
                        entry.p = selectors[other].generate_shared_mesh_orders(
                            &context(domain, reference, other, id),
                            selected,
                            suggested.as_ref(),
                        );
                    }
                }
                None => {
                    let p = selectors[other].generate_shared_mesh_orders(
                        &context(domain, reference, other, id),
                        selected,
                        suggested.as_ref(),
                    );
                    idx.insert(elem_ref, to_refine.len());
                    to_refine.push(ElementToRefine {
                        id,
                        comp: other,
                        split: selected,
                        p,
                        q: p,
                    });
                }
            }
        }
    }
}

/// Give every active element of a shared Mesh the direction-wise maximum of the orders of all components sharing it
pub fn homogenize_shared_mesh_orders(domain: &mut Domain) {
    for comp in 0..domain.num_components() {
        let sharing: Vec<usize> = domain.sharing_components(comp).collect();
        if sharing.is_empty() {
            continue;
        }

        for elem_id in domain.mesh_of(comp).active_elem_ids() {
            let orders = sharing.iter().fold(
                domain.spaces[comp].get_element_order(elem_id),
                |acc, other| acc.max_with(domain.spaces[*other].get_element_order(elem_id)),
            );
            domain.spaces[comp].set_element_order_internal(elem_id, orders);
        }
    }
}
