use crate::domain::mesh::{h_refinement::HRefError, p_refinement::PRefError};
use thiserror::Error;

/// Usage errors reported by the adaptivity engine. Operations returning one of these leave all state untouched.
#[derive(Debug, Error)]
pub enum AdaptError {
    #[error("Too many components ({0}); At most {max} are supported!", max = crate::adapt::MAX_COMPONENTS)]
    TooManyComponents(usize),
    #[error("At least one component is required!")]
    TooFewComponents,
    #[error("Expected {expected} entries (one per component), found {found}!")]
    ComponentMismatch { expected: usize, found: usize },
    #[error("Component {0} and {1} do not share a Mesh structure; Cannot compare their solutions!")]
    IncompatibleMeshes(usize, usize),
    #[error("Invalid component index pair ({0}, {1})!")]
    InvalidComponent(usize, usize),
    #[error("Unknown error flag bits: {0:#x}!")]
    UnknownErrorFlags(u32),
    #[error("Unknown adaptivity strategy: {0}!")]
    UnknownStrategy(i32),
    #[error("Element errors have not been calculated; Call calc_err_est before adapting!")]
    ErrorsNotCalculated,
    #[error("The selector of component {0} requires a reference solution, but none was provided!")]
    MissingReference(usize),
    #[error("h-Unrefinement is only supported for exactly two components, found {0}!")]
    UnrefineComponents(usize),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    HRef(#[from] HRefError),
    #[error(transparent)]
    PRef(#[from] PRefError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
