use super::{
    super::IdTracker,
    element::Element,
    h_refinement::{HLevels, HRef, HRefError, HRefLoc},
    EXPECTED_NUM_H_REFINEMENTS,
};
use smallvec::SmallVec;
use std::sync::Arc;

#[cfg(feature = "json_export")]
use json::{object, JsonValue};

/// `Elem`s are the basic geometric unit in the `Mesh` in Parametric Space
///
/// `Elem`s are responsible for keeping track of:
/// * Connections to their parent `Elem` (and their own h-refinement state)
/// * Connections to their child `Elem`s (if h-refined)
/// * Their status in the Mesh (active, inactive, or retired by an h-Unrefinement)
///
/// `Elem`s also maintain a connection to their associated [`Element`] for mappings to Real Space.
/// Polynomial expansion orders are not stored here: several Spaces may share one Mesh, each with its own orders.
///
/// ## Son Slots
///
/// The children of an `Elem` are exposed through four "son slots". The slot layout depends on the type of h-refinement:
///
/// ```text
///      T-Type             V-Type             U-Type
///  -------------      -------------      -------------
///  |  2  |  3  |      |     1     |      |     |     |
///  |-----------|      |-----------|      |  2  |  3  |
///  |  0  |  1  |      |     0     |      |     |     |
///  -------------      -------------      -------------
/// ```
#[derive(Debug, Clone)]
pub struct Elem {
    pub id: usize,
    pub element: Arc<Element>,
    pub h_levels: HLevels,
    refinement: Option<HRef>,
    children: Option<SmallVec<[usize; 4]>>,
    ancestors: SmallVec<[(usize, HRefLoc); EXPECTED_NUM_H_REFINEMENTS]>,
    retired: bool,
}

impl Elem {
    /// Construct a new base-layer Elem covering an entire Element
    pub fn new(id: usize, element: Arc<Element>) -> Self {
        Self {
            id,
            element,
            h_levels: HLevels::default(),
            refinement: None,
            children: None,
            ancestors: SmallVec::new(),
            retired: false,
        }
    }

    /// Construct 2 or 4 child Elems from an [HRef] of this Elem
    pub(crate) fn h_refine(
        &mut self,
        refinement: HRef,
        id_tracker: &mut IdTracker,
    ) -> Result<Vec<Elem>, HRefError> {
        if self.retired {
            return Err(HRefError::ElemRetired(self.id));
        }

        match self.children {
            Some(_) => Err(HRefError::ElemHasChildren(self.id)),
            None => {
                let children = refinement
                    .indices_and_ids(id_tracker)
                    .map(|(idx, id)| {
                        let mut ancestors = self.ancestors.clone();
                        ancestors.push((self.id, refinement.loc(idx)));

                        Elem {
                            id,
                            element: self.element.clone(),
                            h_levels: self.h_levels.refined(refinement),
                            refinement: None,
                            children: None,
                            ancestors,
                            retired: false,
                        }
                    })
                    .collect::<Vec<Elem>>();

                self.children = Some(children.iter().map(|child| child.id).collect());
                self.refinement = Some(refinement);
                Ok(children)
            }
        }
    }

    /// Remove this Elem's children, returning their IDs. The children must all be active.
    pub(crate) fn take_children(&mut self) -> Result<SmallVec<[usize; 4]>, HRefError> {
        if self.retired {
            return Err(HRefError::ElemRetired(self.id));
        }

        self.refinement = None;
        self.children.take().ok_or(HRefError::ElemHasNoChildren(self.id))
    }

    pub(crate) fn retire(&mut self) {
        self.retired = true;
    }

    /// An Elem is active if it is a leaf of the refinement tree and has not been retired
    pub fn is_active(&self) -> bool {
        !self.retired && self.children.is_none()
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Has this `Elem` been h-Refined
    pub fn has_children(&self) -> bool {
        self.children.is_some()
    }

    pub fn is_curved(&self) -> bool {
        self.element.curved
    }

    /// The type of h-Refinement that produced this Elem's children (if any)
    pub fn refinement(&self) -> Option<HRef> {
        self.refinement
    }

    /// Returns a vector of ids for this Elem's children. Returns `None` if this Elem has no children.
    pub fn child_ids(&self) -> Option<SmallVec<[usize; 4]>> {
        self.children.clone()
    }

    /// This Elem's children arranged in their son slots (see the [type level docs](Elem))
    pub fn sons(&self) -> [Option<usize>; 4] {
        let mut sons = [None; 4];
        if let (Some(refinement), Some(children)) = (self.refinement, &self.children) {
            for (slot, child_id) in refinement.son_slots().iter().zip(children.iter()) {
                sons[*slot] = Some(*child_id);
            }
        }
        sons
    }

    /// Id of the Parent Elem if this Elem has a parent
    pub fn parent_id(&self) -> Option<usize> {
        self.ancestors.last().map(|(id, _)| *id)
    }

    /// Number of h-Refinements between this Elem and the base layer of the Mesh
    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    /// Get the bounds of this `Elem` in parametric space relative to its associated `Element`
    pub fn parametric_range(&self) -> [[f64; 2]; 2] {
        self.ancestors
            .iter()
            .fold([[-1.0, 1.0], [-1.0, 1.0]], |acc, (_, href_loc)| {
                href_loc.sub_range(acc)
            })
    }

    /// Produce a Json Object that describes this Elem
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "id": self.id,
            "element_id": self.element.id,
            "parent": self.parent_id(),
            "active": self.is_active(),
            "retired": self.retired,
            "h_levels": self.h_levels,
            "children": JsonValue::from(
                match &self.children {
                    Some(ids) => ids.to_vec(),
                    None => Vec::new(),
                }
            )
        }
    }
}
