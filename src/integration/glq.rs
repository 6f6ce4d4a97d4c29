use nalgebra::{DMatrix, SymmetricEigen};

/// Largest polynomial order which can be integrated exactly. Requests for higher orders are clamped to this value.
pub const MAX_QUAD_ORDER: usize = 24;

/// 2D Gauss Legendre Quadrature integral of some function F defined over an m by n rectangular region.
/// ```
/// use hp_adapt::integration::glq::*;
///
/// // define glq points over `(-1, 1)` in both directions
/// let (u_points, u_weights) = gauss_quadrature_points(10);
/// let (v_points, v_weights) = gauss_quadrature_points(10);
///
/// // compute the integral of (u^2 * v^2)
/// let solution = real_gauss_quad(&u_weights, &v_weights, |m, n| {
///    u_points[m].powi(2) * v_points[n].powi(2)
/// });
///
/// assert!((solution - 4.0 / 9.0).abs() < 1e-12);
///
/// ```
pub fn real_gauss_quad<F>(u_weights: &[f64], v_weights: &[f64], integrand: F) -> f64
where
    F: Fn(usize, usize) -> f64,
{
    let mut solution = 0.0;
    for (m, u_w) in u_weights.iter().enumerate() {
        let mut inner_solution = 0.0;
        for (n, v_w) in v_weights.iter().enumerate() {
            inner_solution += integrand(m, n) * v_w;
        }
        solution += inner_solution * u_w;
    }
    solution
}

/// Get a set of n Gauss-Legendre-Quadrature Integration points and weights over the range `(-1, 1)`
///
/// ```
/// use hp_adapt::integration::glq::*;
///
/// let (points, weights) = gauss_quadrature_points(10);
/// assert_eq!(points.len(), 10);
/// assert_eq!(weights.len(), 10);
/// assert!(points.iter().sum::<f64>().abs() < 1e-12);
/// assert!((weights.iter().sum::<f64>() - 2.0).abs() < 1e-12);
/// ```
// https://en.wikipedia.org/wiki/Gaussian_quadrature#Gauss%E2%80%93Legendre_quadrature
pub fn gauss_quadrature_points(n: usize) -> (Vec<f64>, Vec<f64>) {
    assert!(n > 0, "At least one quadrature point is required!");

    let betas: Vec<f64> = (1..n)
        .map(|i| 0.5 / (1.0 - (2.0 * i as f64).powi(-2)).sqrt())
        .collect();

    let polymat: DMatrix<f64> = DMatrix::from_fn(n, n, |r, c| {
        if r == c + 1 {
            betas[r - 1]
        } else if c == r + 1 {
            betas[c - 1]
        } else {
            0.0
        }
    });

    let eigen_decomp = SymmetricEigen::new(polymat);

    let mut xw: Vec<(f64, f64)> = eigen_decomp
        .eigenvalues
        .iter()
        .cloned()
        .zip(
            eigen_decomp
                .eigenvectors
                .row(0)
                .iter()
                .map(|weight| (*weight).powi(2) * 2.0),
        )
        .collect();

    xw.sort_by(|a, b| a.0.total_cmp(&b.0));

    xw.into_iter().unzip()
}

/// Scale a set of Gauss-Legendre-Quadrature Integration points to fall within a specific range
///
/// ```
/// use hp_adapt::integration::glq::*;
/// let (points, _) = gauss_quadrature_points(10);
///
/// // scale the points to the range `(-0.75, 0.25)`
/// let (scale, points_scaled) = scale_gauss_quad_points(&points, -0.75, 0.25);
///
/// assert!(points_scaled.iter().all(|p| *p > -0.75 && *p < 0.25));
/// assert!((0.5 - scale).abs() < 1e-12);
/// ```
pub fn scale_gauss_quad_points(points: &[f64], min: f64, max: f64) -> (f64, Vec<f64>) {
    let scale_factor = (max - min) / 2.0;
    let offset = (max + min) / 2.0;

    (
        scale_factor,
        points
            .iter()
            .map(|x| x * scale_factor + offset)
            .collect::<Vec<f64>>(),
    )
}

/// Clamp a requested integration order to [MAX_QUAD_ORDER]
///
/// Returns the usable order and whether clamping occurred
pub fn limit_order(order: usize) -> (usize, bool) {
    if order > MAX_QUAD_ORDER {
        (MAX_QUAD_ORDER, true)
    } else {
        (order, false)
    }
}

/// Number of Gauss-Legendre points needed to integrate a polynomial of the given order exactly
pub fn points_for_order(order: usize) -> usize {
    order / 2 + 1
}

/// Gauss-Legendre rules for every order up to [MAX_QUAD_ORDER], computed once
#[derive(Debug, Clone)]
pub struct QuadratureTable {
    rules: Vec<(Vec<f64>, Vec<f64>)>,
}

impl QuadratureTable {
    pub fn new() -> Self {
        Self {
            rules: (1..=points_for_order(MAX_QUAD_ORDER))
                .map(gauss_quadrature_points)
                .collect(),
        }
    }

    /// Points and weights over `(-1, 1)` integrating polynomials up to `order` exactly (`order` is clamped)
    pub fn rule(&self, order: usize) -> (&[f64], &[f64]) {
        let (order, _) = limit_order(order);
        let (points, weights) = &self.rules[points_for_order(order) - 1];
        (points, weights)
    }
}

impl Default for QuadratureTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GLQ_ACCURACY: f64 = 1e-9;
    // test points
    const X_20: [f64; 20] = [
        -0.993128599,
        -0.963971927,
        -0.912234428,
        -0.839116972,
        -0.746331906,
        -0.636053681,
        -0.510867002,
        -0.373706089,
        -0.227785851,
        -0.076526521,
        0.076526521,
        0.227785851,
        0.373706089,
        0.510867002,
        0.636053681,
        0.746331906,
        0.839116972,
        0.912234428,
        0.963971927,
        0.993128599,
    ];
    const W_20: [f64; 20] = [
        0.017614007,
        0.04060143,
        0.062672048,
        0.083276742,
        0.10193012,
        0.118194532,
        0.131688638,
        0.142096109,
        0.149172986,
        0.152753387,
        0.152753387,
        0.149172986,
        0.142096109,
        0.131688638,
        0.118194532,
        0.10193012,
        0.083276742,
        0.062672048,
        0.04060143,
        0.017614007,
    ];

    #[test]
    fn glq_point_generation_and_scaling() {
        let (glq_points, glq_weights) = gauss_quadrature_points(20);

        for (glq_ref, glq_test) in X_20.iter().zip(glq_points.iter()) {
            assert!((glq_ref - glq_test).abs() < GLQ_ACCURACY);
        }

        for (glq_w_ref, glq_w_test) in W_20.iter().zip(glq_weights.iter()) {
            assert!((glq_w_ref - glq_w_test).abs() < GLQ_ACCURACY);
        }

        let (glq_scale, glq_scaled_points) = scale_gauss_quad_points(&glq_points, 0.25, 0.5);

        assert!((glq_scale - 0.125).abs() < 1e-14);
        assert!((glq_scaled_points[0] - 0.250858925).abs() < GLQ_ACCURACY);
        assert!((glq_scaled_points[19] - 0.499141075).abs() < GLQ_ACCURACY);
    }

    #[test]
    fn table_integrates_exactly() {
        let table = QuadratureTable::new();

        for order in 0..=MAX_QUAD_ORDER {
            let (points, weights) = table.rule(order);
            let solution: f64 = points
                .iter()
                .zip(weights.iter())
                .map(|(x, w)| x.powi(order as i32) * w)
                .sum();
            let expected = if order % 2 == 0 {
                2.0 / (order as f64 + 1.0)
            } else {
                0.0
            };
            assert!((solution - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn order_limiting() {
        assert_eq!(limit_order(7), (7, false));
        assert_eq!(limit_order(MAX_QUAD_ORDER + 3), (MAX_QUAD_ORDER, true));
        assert_eq!(points_for_order(0), 1);
        assert_eq!(points_for_order(5), 3);

        let table = QuadratureTable::new();
        assert_eq!(table.rule(100).0.len(), points_for_order(MAX_QUAD_ORDER));
    }
}
