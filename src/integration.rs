/// Gauss-Legendre-Quadrature rules and 2D tensor-product integration
pub mod glq;
/// Legendre polynomial tables used by discrete fields and projections
pub mod legendre;
