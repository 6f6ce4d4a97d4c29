use crate::domain::mesh::{h_refinement::HRef, p_refinement::PolyOrders};

#[cfg(feature = "json_export")]
use json::{object, JsonValue};

/// The kind of refinement selected for an element
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefinementType {
    /// change the polynomial orders only
    P,
    /// isotropic split into 4 sons
    H,
    /// split into a bottom and a top son (son slots 0 and 1)
    AnisoH,
    /// split into a left and a right son (son slots 2 and 3)
    AnisoV,
}

impl RefinementType {
    /// The mesh refinement realizing this split (`None` for [P](Self::P))
    pub fn to_href(&self) -> Option<HRef> {
        match self {
            Self::P => None,
            Self::H => Some(HRef::T),
            Self::AnisoH => Some(HRef::V),
            Self::AnisoV => Some(HRef::U),
        }
    }

    /// Number of son orders carried by a refinement of this type
    pub fn num_sons(&self) -> usize {
        match self {
            Self::P => 1,
            Self::H => 4,
            Self::AnisoH | Self::AnisoV => 2,
        }
    }

    pub fn is_geometric(&self) -> bool {
        !matches!(self, Self::P)
    }

    /// The split which satisfies both `self` and `other` on an element shared by two components
    ///
    /// P yields to any split, two different anisotropic splits combine into an isotropic one
    pub fn combined_with(&self, other: Self) -> Self {
        match (*self, other) {
            (a, b) if a == b => a,
            (Self::P, b) => b,
            (a, Self::P) => a,
            _ => Self::H,
        }
    }
}

#[cfg(feature = "json_export")]
impl From<RefinementType> for JsonValue {
    fn from(split: RefinementType) -> Self {
        JsonValue::from(match split {
            RefinementType::P => "P",
            RefinementType::H => "H",
            RefinementType::AnisoH => "ANISO-H",
            RefinementType::AnisoV => "ANISO-V",
        })
    }
}

/// An (element, component) pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementReference {
    pub id: usize,
    pub comp: usize,
}

impl ElementReference {
    pub fn new(id: usize, comp: usize) -> Self {
        Self { id, comp }
    }
}

/// The outcome of a selector accepting an element for refinement
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectedRefinement {
    pub split: RefinementType,
    /// orders of the (up to four) sons; `p[0]` is the new order for a [P](RefinementType::P) refinement
    pub p: [PolyOrders; 4],
    /// orders suggested for an isotropic split of this element (used when reconciling shared meshes)
    pub q: [PolyOrders; 4],
}

impl SelectedRefinement {
    pub fn p_refinement(orders: PolyOrders) -> Self {
        Self {
            split: RefinementType::P,
            p: [orders; 4],
            q: [orders; 4],
        }
    }

    pub fn split(split: RefinementType, p: [PolyOrders; 4], q: [PolyOrders; 4]) -> Self {
        Self { split, p, q }
    }
}

/// A refinement decision for one element of one component
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementToRefine {
    pub id: usize,
    pub comp: usize,
    pub split: RefinementType,
    pub p: [PolyOrders; 4],
    pub q: [PolyOrders; 4],
}

impl ElementToRefine {
    pub fn new(id: usize, comp: usize, selected: SelectedRefinement) -> Self {
        Self {
            id,
            comp,
            split: selected.split,
            p: selected.p,
            q: selected.q,
        }
    }

    pub fn reference(&self) -> ElementReference {
        ElementReference::new(self.id, self.comp)
    }

    /// The son orders actually used by this refinement
    pub fn son_orders(&self) -> &[PolyOrders] {
        &self.p[0..self.split.num_sons()]
    }

    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "id": self.id,
            "comp": self.comp,
            "split": self.split,
            "orders": JsonValue::from(self.son_orders().iter().map(|o| JsonValue::from(*o)).collect::<Vec<_>>()),
        }
    }
}
