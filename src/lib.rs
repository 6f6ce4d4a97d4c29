//! hp-Adaptive mesh refinement for multi-component Finite Element discretizations.
//!
//! The [`adapt::Adapt`] engine compares coarse and reference solutions over a [`domain::Domain`],
//! ranks the elements by their error contribution, consults one [`adapt::selector::Selector`] per
//! component, and applies the resulting h-, p-, and hp-refinements to the meshes and spaces.

/// The hp-Adaptivity engine
pub mod adapt;
/// Meshes, Spaces, and Solution fields
pub mod domain;
/// Error types
pub mod error;
/// Numerical Integration tools
pub mod integration;

pub use adapt::{
    error_form::{ErrorForm, NormForm, ProjNorm},
    params::{AdaptParams, ErrorFlags, ErrorNormalization, Strategy},
    refinement::{ElementReference, ElementToRefine, RefinementType},
    selector::{CandidateList, ElemContext, HOnlySelector, POnlySelector, ProjectionSelector, Selector},
    Adapt, ErrorSummary, MAX_COMPONENTS,
};
pub use domain::{
    fields::{ExactSolution, MeshFunction, ProjectedSolution, SolutionRef},
    mesh::{p_refinement::PolyOrders, Mesh},
    space::{Space, SpaceKind},
    Domain,
};
pub use error::AdaptError;
