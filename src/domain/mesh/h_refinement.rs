use thiserror::Error;

#[cfg(feature = "json_export")]
use json::{object, JsonValue};

/// Description of an h-Refinement
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HRef {
    /// isotropic (4 child `Elem`s)
    T,
    /// anisotropic about the u-direction (2 child `Elem`s: left and right)
    U,
    /// anisotropic about the v-direction (2 child `Elem`s: bottom and top)
    V,
}

impl HRef {
    /// Number of child `Elem`s produced by this refinement
    pub fn num_children(&self) -> usize {
        match self {
            Self::T => 4,
            Self::U | Self::V => 2,
        }
    }

    /// The location of the `idx`'th child `Elem` relative to its parent
    pub fn loc(&self, idx: usize) -> HRefLoc {
        match (self, idx) {
            (Self::T, 0) => HRefLoc::T(Quadrant::SW),
            (Self::T, 1) => HRefLoc::T(Quadrant::SE),
            (Self::T, 2) => HRefLoc::T(Quadrant::NW),
            (Self::T, 3) => HRefLoc::T(Quadrant::NE),
            (Self::U, 0) => HRefLoc::U(Bisection::BL),
            (Self::U, 1) => HRefLoc::U(Bisection::TR),
            (Self::V, 0) => HRefLoc::V(Bisection::BL),
            (Self::V, 1) => HRefLoc::V(Bisection::TR),
            _ => panic!(
                "{:?} refinements only produce {} children; Child index {} is invalid!",
                self,
                self.num_children(),
                idx
            ),
        }
    }

    /// The "son slots" occupied by the children of this refinement.
    ///
    /// Isotropic refinements fill all four slots. Refinements producing bottom/top children (V) occupy the first two slots
    /// while refinements producing left/right children (U) occupy the last two.
    pub fn son_slots(&self) -> &'static [usize] {
        match self {
            Self::T => &[0, 1, 2, 3],
            Self::V => &[0, 1],
            Self::U => &[2, 3],
        }
    }

    /// Generate a list of child indices and new IDs
    pub(crate) fn indices_and_ids(
        &self,
        id_tracker: &mut super::super::IdTracker,
    ) -> impl Iterator<Item = (usize, usize)> {
        let first_id = id_tracker.next_n_ids(self.num_children());
        (0..self.num_children()).map(move |idx| (idx, first_id + idx))
    }
}

/// Quadrant of a child Elem following a T-Type h-Refinement (from the parent Elem's perspective)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quadrant {
    /// south west
    SW,
    /// south east
    SE,
    /// north west
    NW,
    /// north east
    NE,
}

impl Quadrant {
    pub fn index(&self) -> usize {
        match self {
            Self::SW => 0,
            Self::SE => 1,
            Self::NW => 2,
            Self::NE => 3,
        }
    }
}

/// Location of a child Elem following a U-Type or V-Type h-refinement (from the parent Elem's perspective).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bisection {
    /// Bottom (V-type) or Left (U-type)
    BL,
    /// Top (V-Type) or Right (U-type)
    TR,
}

impl Bisection {
    pub fn index(&self) -> usize {
        match self {
            Self::BL => 0,
            Self::TR => 1,
        }
    }
}

/// The location of an [Elem](super::elem::Elem) relative to its parent following an h-refinement
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HRefLoc {
    T(Quadrant),
    U(Bisection),
    V(Bisection),
}

impl HRefLoc {
    pub fn index(&self) -> usize {
        match self {
            Self::T(quad) => quad.index(),
            Self::U(bi) | Self::V(bi) => bi.index(),
        }
    }

    /// Narrow a parametric range `[[u_min, u_max], [v_min, v_max]]` down to the portion covered by this location
    pub fn sub_range(&self, [[u_min, u_max], [v_min, v_max]]: [[f64; 2]; 2]) -> [[f64; 2]; 2] {
        let u_mid = (u_min + u_max) / 2.0;
        let v_mid = (v_min + v_max) / 2.0;

        match self {
            Self::T(Quadrant::SW) => [[u_min, u_mid], [v_min, v_mid]],
            Self::T(Quadrant::SE) => [[u_mid, u_max], [v_min, v_mid]],
            Self::T(Quadrant::NW) => [[u_min, u_mid], [v_mid, v_max]],
            Self::T(Quadrant::NE) => [[u_mid, u_max], [v_mid, v_max]],
            Self::U(Bisection::BL) => [[u_min, u_mid], [v_min, v_max]],
            Self::U(Bisection::TR) => [[u_mid, u_max], [v_min, v_max]],
            Self::V(Bisection::BL) => [[u_min, u_max], [v_min, v_mid]],
            Self::V(Bisection::TR) => [[u_min, u_max], [v_mid, v_max]],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Description of an Elem's h-Refinement levels in the u and v directions
pub struct HLevels {
    pub u: u8,
    pub v: u8,
}

impl HLevels {
    pub fn from(u: u8, v: u8) -> Self {
        Self { u, v }
    }

    pub fn refined(&self, refinement: HRef) -> Self {
        match refinement {
            HRef::T => Self::from(self.u + 1, self.v + 1),
            HRef::U => Self::from(self.u + 1, self.v),
            HRef::V => Self::from(self.u, self.v + 1),
        }
    }
}

#[cfg(feature = "json_export")]
impl From<HLevels> for JsonValue {
    fn from(levels: HLevels) -> Self {
        object! {
            "u": levels.u,
            "v": levels.v,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HRefError {
    #[error("Elem {0} has children; Cannot apply h-Refinement!")]
    ElemHasChildren(usize),
    #[error("Elem {0} does not exist; Cannot apply h-Refinement!")]
    ElemDoesntExist(usize),
    #[error("Elem {0} has been retired by an h-Unrefinement; Cannot modify it!")]
    ElemRetired(usize),
    #[error("Elem {0} has no children; Cannot apply h-Unrefinement!")]
    ElemHasNoChildren(usize),
    #[error("Elem {0} has an inactive child; Cannot apply h-Unrefinement!")]
    NestedChildren(usize),
    #[error("Multiple h-Refinements were specified for Elem {0}; Cannot apply h-Refinements!")]
    DoubleRefinement(usize),
    #[error("Elem {0}'s Edges are too short; Cannot apply h-Refinement!")]
    MinEdgeLength(usize),
}
