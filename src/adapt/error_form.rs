use crate::domain::{fields::FnValues, space::SpaceKind};

/// A bilinear functional used to measure errors and norms
///
/// `value` integrates the form over one region given the sampled fields and the
/// products of quadrature weights and Jacobian determinants at each point.
pub trait ErrorForm: Send + Sync {
    fn value(&self, jwt: &[f64], u: &FnValues, v: &FnValues) -> f64;

    /// Polynomial order of the integrand given the orders of the two fields
    fn order(&self, u_order: usize, v_order: usize) -> usize;
}

/// Norms in which projection and solution errors are measured
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjNorm {
    L2,
    H1,
    H1Semi,
}

impl ProjNorm {
    /// The norm natural to a kind of Space
    pub fn for_space(kind: SpaceKind) -> Self {
        match kind {
            SpaceKind::H1 => Self::H1,
            SpaceKind::L2 => Self::L2,
        }
    }

    /// Point-wise integrand of the norm's inner product
    pub fn integrand(&self, u: f64, u_dx: f64, u_dy: f64, v: f64, v_dx: f64, v_dy: f64) -> f64 {
        match self {
            Self::L2 => u * v,
            Self::H1 => u * v + u_dx * v_dx + u_dy * v_dy,
            Self::H1Semi => u_dx * v_dx + u_dy * v_dy,
        }
    }
}

/// The inner product associated with a [ProjNorm]
#[derive(Clone, Copy, Debug)]
pub struct NormForm {
    pub norm: ProjNorm,
}

impl NormForm {
    pub fn new(norm: ProjNorm) -> Self {
        Self { norm }
    }
}

impl ErrorForm for NormForm {
    fn value(&self, jwt: &[f64], u: &FnValues, v: &FnValues) -> f64 {
        jwt.iter()
            .enumerate()
            .map(|(p, w)| {
                w * self
                    .norm
                    .integrand(u.val[p], u.dx[p], u.dy[p], v.val[p], v.dx[p], v.dy[p])
            })
            .sum()
    }

    fn order(&self, u_order: usize, v_order: usize) -> usize {
        u_order + v_order
    }
}
