/// Bilinear forms measuring errors and norms
pub mod error_form;
/// Element error computation over the common refinement of the coarse and reference Meshes
pub mod error_calc;
/// Parameters controlling an adaptivity step
pub mod params;
/// Element error storage and ranking
pub mod queue;
/// Consistency of refinements across components sharing a Mesh
pub mod reconcile;
/// Refinement decisions
pub mod refinement;
/// Refinement selection policies
pub mod selector;
/// Simultaneous traversal of several Meshes
pub mod traverse;
mod unrefine;

use error_form::{ErrorForm, NormForm, ProjNorm};
use params::{
    AdaptParams, Strategy, STRATEGY_0_INITIAL_PREV_ERROR, STRATEGY_0_REL_CHANGE, STRATEGY_3_BUDGET_FACTOR,
};
use queue::ElementErrors;
use reconcile::{fix_shared_mesh_refinements, homogenize_shared_mesh_orders};
use refinement::{ElementReference, ElementToRefine, RefinementType};
use selector::{ElemContext, Selector};

use crate::domain::{fields::SolutionRef, mesh::p_refinement::PolyOrders, Domain};
use crate::error::AdaptError;
use crate::integration::glq::QuadratureTable;

use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Instant;

#[cfg(feature = "json_export")]
use json::JsonValue;
#[cfg(feature = "json_export")]
use std::{fs::File, io::BufWriter};

/// Maximum number of solution components handled by one [Adapt]
pub const MAX_COMPONENTS: usize = 10;

/// Result of an error pass
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorSummary {
    /// total error over all components
    pub total: f64,
    /// error of each component
    pub components: Vec<f64>,
}

/// The hp-Adaptivity engine
///
/// An adaptivity step consists of an error pass ([calc_err_est](Adapt::calc_err_est)) comparing coarse and reference solutions,
/// followed by a call to [adapt](Adapt::adapt) which refines the worst elements of the Domain (or [unrefine](Adapt::unrefine),
/// which coarsens the best ones). Element errors are valid until the Domain is changed.
pub struct Adapt {
    num: usize,
    error_form: BTreeMap<(usize, usize), Box<dyn ErrorForm>>,
    errors: ElementErrors,
    errors_squared_sum: f64,
    have_errors: bool,
    regular_queue: Vec<ElementReference>,
    priority_queue: VecDeque<ElementReference>,
    last_refinements: Vec<ElementToRefine>,
    quad: QuadratureTable,
}

impl Adapt {
    /// Create an engine for the components of a Domain, measuring each in the norm natural to its Space
    pub fn new(domain: &Domain) -> Result<Self, AdaptError> {
        let norms: Vec<ProjNorm> = domain
            .spaces
            .iter()
            .map(|space| ProjNorm::for_space(space.kind))
            .collect();
        Self::with_norms(domain, &norms)
    }

    /// Create an engine measuring component `i` in `norms[i]`
    pub fn with_norms(domain: &Domain, norms: &[ProjNorm]) -> Result<Self, AdaptError> {
        let num = domain.num_components();
        if num == 0 {
            return Err(AdaptError::TooFewComponents);
        }
        if num > MAX_COMPONENTS {
            return Err(AdaptError::TooManyComponents(num));
        }
        if norms.len() != num {
            return Err(AdaptError::ComponentMismatch {
                expected: num,
                found: norms.len(),
            });
        }

        let error_form = norms
            .iter()
            .enumerate()
            .map(|(i, norm)| ((i, i), Box::new(NormForm::new(*norm)) as Box<dyn ErrorForm>))
            .collect();

        Ok(Self {
            num,
            error_form,
            errors: ElementErrors::default(),
            errors_squared_sum: 0.0,
            have_errors: false,
            regular_queue: Vec::new(),
            priority_queue: VecDeque::new(),
            last_refinements: Vec::new(),
            quad: QuadratureTable::new(),
        })
    }

    /// Replace the error form of the component pair `(i, j)`
    pub fn set_error_form(&mut self, i: usize, j: usize, form: Box<dyn ErrorForm>) -> Result<(), AdaptError> {
        if i >= self.num || j >= self.num {
            return Err(AdaptError::InvalidComponent(i, j));
        }
        self.error_form.insert((i, j), form);
        Ok(())
    }

    /// Remove the error form of an off-diagonal component pair
    pub fn remove_error_form(&mut self, i: usize, j: usize) -> Result<(), AdaptError> {
        if i >= self.num || j >= self.num || i == j {
            return Err(AdaptError::InvalidComponent(i, j));
        }
        self.error_form.remove(&(i, j));
        Ok(())
    }

    pub fn num_components(&self) -> usize {
        self.num
    }

    /// Are the stored element errors valid for the current Domain
    pub fn have_errors(&self) -> bool {
        self.have_errors
    }

    /// Stored (squared) error of an element of a component
    pub fn element_error(&self, comp: usize, elem_id: usize) -> f64 {
        self.errors.get(comp, elem_id)
    }

    /// Total (squared) error of the last error pass used for adaptation
    pub fn errors_squared_sum(&self) -> f64 {
        self.errors_squared_sum
    }

    /// Active (element, component) pairs sorted by descending error
    pub fn regular_queue(&self) -> &[ElementReference] {
        &self.regular_queue
    }

    /// Queue an element to be examined before any element of the regular queue during the next [adapt](Adapt::adapt)
    pub fn push_priority(&mut self, elem_ref: ElementReference) {
        self.priority_queue.push_back(elem_ref);
    }

    /// Refinements applied by the last call to [adapt](Adapt::adapt)
    pub fn last_refinements(&self) -> &[ElementToRefine] {
        &self.last_refinements
    }

    /// Refine the elements with the largest errors
    ///
    /// `selectors[c]` decides how elements of component `c` are refined. `reference` holds the reference solution of every
    /// component, or is empty if no selector needs it. Returns `true` if nothing was (or could be) refined.
    ///
    /// With [Strategy::Absolute], a step that refines nothing keeps the stored errors, even if regularization changed the
    /// Mesh during the same call; call [calc_err_est](Adapt::calc_err_est) again before relying on them in that case.
    pub fn adapt(
        &mut self,
        domain: &mut Domain,
        selectors: &mut [Box<dyn Selector>],
        reference: &[SolutionRef],
        params: &AdaptParams,
    ) -> Result<bool, AdaptError> {
        if !self.have_errors {
            return Err(AdaptError::ErrorsNotCalculated);
        }
        if domain.num_components() != self.num {
            return Err(AdaptError::ComponentMismatch {
                expected: self.num,
                found: domain.num_components(),
            });
        }
        if selectors.len() != self.num {
            return Err(AdaptError::ComponentMismatch {
                expected: self.num,
                found: selectors.len(),
            });
        }
        if !reference.is_empty() && reference.len() != self.num {
            return Err(AdaptError::ComponentMismatch {
                expected: self.num,
                found: reference.len(),
            });
        }
        if reference.is_empty() {
            if let Some(comp) = selectors.iter().position(|selector| selector.needs_reference()) {
                return Err(AdaptError::MissingReference(comp));
            }
        }

        let timer = Instant::now();

        let mut to_refine: Vec<ElementToRefine> = Vec::new();
        let mut idx: HashMap<ElementReference, usize> = HashMap::new();

        let mut err0 = STRATEGY_0_INITIAL_PREV_ERROR;
        let mut processed_error = 0.0;
        let mut thr_first: Option<f64> = None;

        let mut num_examined = 0;
        let mut num_priority = 0;
        let mut num_ignored = 0;
        let mut num_not_changed = 0;

        let mut next_regular = 0;
        loop {
            let (elem_ref, regular) = match self.priority_queue.pop_front() {
                Some(elem_ref) => {
                    num_priority += 1;
                    (elem_ref, false)
                }
                None => match self.regular_queue.get(next_regular) {
                    Some(elem_ref) => {
                        next_regular += 1;
                        (*elem_ref, true)
                    }
                    None => break,
                },
            };
            num_examined += 1;

            if self.should_ignore_element(domain, &idx, elem_ref) {
                num_ignored += 1;
                continue;
            }

            let err = self.errors.get(elem_ref.comp, elem_ref.id);

            if regular {
                let first = *thr_first.get_or_insert(params.threshold * err);
                if self.should_stop(params, err, err0, processed_error, first) {
                    break;
                }
            }

            let ctx = ElemContext {
                mesh: domain.mesh_of(elem_ref.comp),
                elem_id: elem_ref.id,
                current: domain.spaces[elem_ref.comp].get_element_order(elem_ref.id),
                reference: reference.get(elem_ref.comp).copied(),
            };
            let selected = selectors[elem_ref.comp].select_refinement(&ctx);

            match selected {
                Some(selected) if self.can_refine_element(domain, elem_ref, &selected.split, &selected.p) => {
                    let etr = ElementToRefine::new(elem_ref.id, elem_ref.comp, selected);
                    debug!(
                        "Elem {} (comp {}): {:?} with son orders {:?}",
                        etr.id,
                        etr.comp,
                        etr.split,
                        etr.son_orders()
                    );

                    if etr.split.is_geometric() {
                        self.queue_sharing_components(domain, &idx, elem_ref);
                    }

                    idx.insert(elem_ref, to_refine.len());
                    to_refine.push(etr);
                    err0 = err;
                    processed_error += err;
                }
                _ => {
                    debug!("Elem {} (comp {}) not changed", elem_ref.id, elem_ref.comp);
                    num_not_changed += 1;
                }
            }
        }
        self.priority_queue.clear();

        info!(
            "Examined elements: {} (from priority queue: {}, ignored: {}, not changed: {}); elements to process: {}",
            num_examined,
            num_priority,
            num_ignored,
            num_not_changed,
            to_refine.len()
        );

        let done = if num_examined == 0 {
            true
        } else if to_refine.is_empty() {
            warn!("None of the elements selected for refinement could be refined; adaptivity step not successful");
            true
        } else {
            false
        };

        fix_shared_mesh_refinements(domain, &mut to_refine, &mut idx, selectors, reference);

        for etr in to_refine.iter() {
            apply_refinement(domain, etr)?;
        }

        homogenize_shared_mesh_orders(domain);

        if let Some(level) = params.regularize {
            let level = if level == 0 {
                warn!("Total mesh regularization is not supported; a 1-irregular mesh is used instead");
                1
            } else {
                level
            };

            for mesh_id in 0..domain.meshes.len() {
                let parents = domain.meshes[mesh_id].regularize(level)?;
                for space in domain.spaces.iter_mut().filter(|space| space.mesh_id == mesh_id) {
                    space.distribute_orders(&parents);
                }
            }
        }

        info!(
            "Refined elements: {} in {:.3} s",
            to_refine.len(),
            timer.elapsed().as_secs_f64()
        );

        self.last_refinements = to_refine;
        self.have_errors = params.strategy == Strategy::Absolute && done;
        domain.assign_dofs();

        Ok(done)
    }

    fn should_stop(&self, params: &AdaptParams, err: f64, err0: f64, processed: f64, thr_first: f64) -> bool {
        match params.strategy {
            Strategy::ProcessedFraction => {
                processed > params.threshold.sqrt() * self.errors_squared_sum
                    && ((err - err0) / err0).abs() > STRATEGY_0_REL_CHANGE
            }
            Strategy::RelativeToFirst => err < thr_first,
            Strategy::Absolute => err < params.threshold,
            Strategy::RelativeOrBudget => {
                err < thr_first || processed > STRATEGY_3_BUDGET_FACTOR * params.to_be_processed
            }
        }
    }

    /// An element is skipped if it is no longer active or was already decided for its component during this step
    fn should_ignore_element(
        &self,
        domain: &Domain,
        idx: &HashMap<ElementReference, usize>,
        elem_ref: ElementReference,
    ) -> bool {
        if elem_ref.comp >= self.num || idx.contains_key(&elem_ref) {
            return true;
        }
        !domain
            .mesh_of(elem_ref.comp)
            .get_elem(elem_ref.id)
            .map_or(false, |elem| elem.is_active())
    }

    /// Can a selected refinement be applied to an element
    fn can_refine_element(
        &self,
        domain: &Domain,
        elem_ref: ElementReference,
        split: &RefinementType,
        orders: &[PolyOrders; 4],
    ) -> bool {
        if !orders[0..split.num_sons()].iter().all(|o| o.is_valid()) {
            return false;
        }
        !split.is_geometric()
            || domain
                .mesh_of(elem_ref.comp)
                .elem_is_h_refineable(elem_ref.id)
                .unwrap_or(false)
    }

    /// Queue the other components sharing a Mesh with an element about to be split, so their selectors see it this step
    fn queue_sharing_components(
        &mut self,
        domain: &Domain,
        idx: &HashMap<ElementReference, usize>,
        elem_ref: ElementReference,
    ) {
        for other in domain.sharing_components(elem_ref.comp) {
            let sibling = ElementReference::new(elem_ref.id, other);
            if !idx.contains_key(&sibling) && !self.priority_queue.contains(&sibling) {
                self.priority_queue.push_back(sibling);
            }
        }
    }

    /// Write the refinements applied by the last call to [adapt](Adapt::adapt) to a JSON file
    #[cfg(feature = "json_export")]
    pub fn export_refinements_to_json(&self, path: impl AsRef<str>) -> std::io::Result<()> {
        let f = File::create(path.as_ref())?;
        let mut w = BufWriter::new(&f);

        JsonValue::from(
            self.last_refinements
                .iter()
                .map(|etr| etr.to_json())
                .collect::<Vec<_>>(),
        )
        .write_pretty(&mut w, 4)?;

        Ok(())
    }
}

/// Apply one refinement decision to the Mesh and Space of its component
///
/// Splitting an element which already has children only re-assigns the orders of its sons
pub(crate) fn apply_refinement(domain: &mut Domain, etr: &ElementToRefine) -> Result<(), AdaptError> {
    let mesh_id = domain.spaces[etr.comp].mesh_id;

    match etr.split.to_href() {
        None => domain.spaces[etr.comp].set_element_order_internal(etr.id, etr.p[0]),
        Some(h_ref) => {
            if domain.meshes[mesh_id].elems[etr.id].is_active() {
                let children = domain.meshes[mesh_id].refine_elem(etr.id, h_ref)?;
                let parents: BTreeMap<usize, usize> = children.iter().map(|child| (*child, etr.id)).collect();
                for space in domain.spaces.iter_mut().filter(|space| space.mesh_id == mesh_id) {
                    space.distribute_orders(&parents);
                }
            }

            let sons = domain.meshes[mesh_id].elems[etr.id].sons();
            for (orders, slot) in etr.p.iter().zip(h_ref.son_slots()) {
                if let Some(son) = sons[*slot] {
                    domain.spaces[etr.comp].set_element_order_internal(son, *orders);
                }
            }
        }
    }

    Ok(())
}
