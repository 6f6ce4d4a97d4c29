use super::{
    mesh::{
        geometry::{Point, M2D, V2D},
        p_refinement::PolyOrders,
        Mesh,
    },
    space::Space,
};
use crate::integration::{
    glq::{limit_order, real_gauss_quad, scale_gauss_quad_points, QuadratureTable, MAX_QUAD_ORDER},
    legendre::LegendrePoly,
};

use rayon::prelude::*;
use std::collections::BTreeMap;

/// A scalar field defined piecewise over the active `Elem`s of some Mesh
pub trait MeshFunction: Sync {
    /// Value of the field at a real-space point inside the active `Elem` with id `elem_id`
    fn value(&self, elem_id: usize, point: &Point) -> f64;

    /// Real-space gradient of the field at a point inside the active `Elem` with id `elem_id`
    fn gradient(&self, elem_id: usize, point: &Point) -> V2D;

    /// Polynomial order of the field (used to choose quadrature orders)
    fn fn_order(&self) -> usize;

    /// Is this an analytic field (not a discrete solution)
    fn is_exact(&self) -> bool {
        false
    }
}

/// A [MeshFunction] bound to the Mesh it is defined over
#[derive(Clone, Copy)]
pub struct SolutionRef<'a> {
    pub mesh: &'a Mesh,
    pub function: &'a dyn MeshFunction,
}

impl<'a> SolutionRef<'a> {
    pub fn new(mesh: &'a Mesh, function: &'a dyn MeshFunction) -> Self {
        Self { mesh, function }
    }

    /// Evaluate the field at an arbitrary point. Returns `None` if the point is outside the Mesh.
    pub fn value_at(&self, point: &Point) -> Option<f64> {
        self.mesh
            .find_active_elem(point)
            .map(|elem_id| self.function.value(elem_id, point))
    }

    /// Evaluate the field's gradient at an arbitrary point. Returns `None` if the point is outside the Mesh.
    pub fn gradient_at(&self, point: &Point) -> Option<V2D> {
        self.mesh
            .find_active_elem(point)
            .map(|elem_id| self.function.gradient(elem_id, point))
    }

    pub fn fn_order(&self) -> usize {
        self.function.fn_order()
    }

    pub fn is_exact(&self) -> bool {
        self.function.is_exact()
    }
}

type ScalarFn = dyn Fn(f64, f64) -> f64 + Send + Sync;
type GradientFn = dyn Fn(f64, f64) -> [f64; 2] + Send + Sync;

/// An analytic field given by closures for its value and gradient
pub struct ExactSolution {
    value: Box<ScalarFn>,
    gradient: Box<GradientFn>,
    order: usize,
}

impl ExactSolution {
    /// Build an exact field. Its order is reported as [MAX_QUAD_ORDER] unless overridden with [with_order](Self::with_order).
    pub fn new<V, G>(value: V, gradient: G) -> Self
    where
        V: Fn(f64, f64) -> f64 + Send + Sync + 'static,
        G: Fn(f64, f64) -> [f64; 2] + Send + Sync + 'static,
    {
        Self {
            value: Box::new(value),
            gradient: Box::new(gradient),
            order: MAX_QUAD_ORDER,
        }
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }
}

impl MeshFunction for ExactSolution {
    fn value(&self, _: usize, point: &Point) -> f64 {
        (self.value)(point.x, point.y)
    }

    fn gradient(&self, _: usize, point: &Point) -> V2D {
        V2D::from((self.gradient)(point.x, point.y))
    }

    fn fn_order(&self) -> usize {
        self.order
    }

    fn is_exact(&self) -> bool {
        true
    }
}

/// Tensor-product Legendre expansion of a scalar field over an axis-aligned rectangle
#[derive(Clone, Debug)]
pub struct RectExpansion {
    bounds: [Point; 2],
    orders: PolyOrders,
    coefficients: Vec<f64>,
}

impl RectExpansion {
    pub fn zero(bounds: [Point; 2], orders: PolyOrders) -> Self {
        Self {
            bounds,
            orders,
            coefficients: vec![0.0; orders.num_terms()],
        }
    }

    /// L2 projection of `f` onto the expansion of the given orders using a quadrature rule over `(-1, 1)`
    pub fn project<F>(bounds: [Point; 2], orders: PolyOrders, (points, weights): (&[f64], &[f64]), f: F) -> Self
    where
        F: Fn(&Point) -> f64,
    {
        let [min, max] = bounds;
        let (_, x_points) = scale_gauss_quad_points(points, min.x, max.x);
        let (_, y_points) = scale_gauss_quad_points(points, min.y, max.y);

        let samples: Vec<Vec<f64>> = x_points
            .iter()
            .map(|x| y_points.iter().map(|y| f(&Point::new(*x, *y))).collect())
            .collect();

        let max_n = orders.max_order();
        let leg = LegendrePoly::with(max_n, points);

        let coefficients = orders
            .permutations()
            .map(|[i, j]| {
                let (i, j) = (i as usize, j as usize);
                let inner = real_gauss_quad(weights, weights, |m, n| {
                    samples[m][n] * leg.l[i][m] * leg.l[j][n]
                });
                inner / (LegendrePoly::norm_squared(i as u8) * LegendrePoly::norm_squared(j as u8))
            })
            .collect();

        Self {
            bounds,
            orders,
            coefficients,
        }
    }

    pub fn bounds(&self) -> [Point; 2] {
        self.bounds
    }

    pub fn orders(&self) -> PolyOrders {
        self.orders
    }

    fn local_coords(&self, point: &Point) -> [f64; 2] {
        let [min, max] = &self.bounds;
        [
            2.0 * (point.x - min.x) / (max.x - min.x) - 1.0,
            2.0 * (point.y - min.y) / (max.y - min.y) - 1.0,
        ]
    }

    fn jacobian(&self) -> M2D {
        let [min, max] = &self.bounds;
        M2D::from([(max.x - min.x) / 2.0, 0.0], [0.0, (max.y - min.y) / 2.0])
    }

    pub fn value(&self, point: &Point) -> f64 {
        let [u, v] = self.local_coords(point);
        let leg_u = LegendrePoly::with(self.orders.ni, &[u]);
        let leg_v = LegendrePoly::with(self.orders.nj, &[v]);

        self.orders
            .permutations()
            .zip(self.coefficients.iter())
            .map(|([i, j], c)| c * leg_u.l[i as usize][0] * leg_v.l[j as usize][0])
            .sum()
    }

    pub fn gradient(&self, point: &Point) -> V2D {
        let [u, v] = self.local_coords(point);
        let leg_u = LegendrePoly::with(self.orders.ni, &[u]);
        let leg_v = LegendrePoly::with(self.orders.nj, &[v]);

        let para_grad = self
            .orders
            .permutations()
            .zip(self.coefficients.iter())
            .fold(V2D::default(), |acc, ([i, j], c)| {
                let (i, j) = (i as usize, j as usize);
                acc + V2D::from([
                    c * leg_u.d1[i][0] * leg_v.l[j][0],
                    c * leg_u.l[i][0] * leg_v.d1[j][0],
                ])
            });

        self.jacobian().inverse().transpose() * para_grad
    }
}

/// A discrete field: one [RectExpansion] per active `Elem` of the Mesh it was built over
#[derive(Clone, Debug)]
pub struct ProjectedSolution {
    expansions: BTreeMap<usize, RectExpansion>,
}

impl ProjectedSolution {
    /// A field which is zero everywhere, with the expansion orders of a Space
    pub fn zero(mesh: &Mesh, space: &Space) -> Self {
        Self {
            expansions: mesh
                .active_elem_ids()
                .into_iter()
                .map(|elem_id| {
                    (
                        elem_id,
                        RectExpansion::zero(mesh.elem_bounds(elem_id), space.get_element_order(elem_id)),
                    )
                })
                .collect(),
        }
    }

    /// Project a source field onto the expansion orders of a Space, `Elem` by `Elem`
    ///
    /// The source may live on a different Mesh covering the same region; it is treated as zero wherever it is undefined
    pub fn project(mesh: &Mesh, space: &Space, source: &SolutionRef) -> Self {
        let table = QuadratureTable::new();

        let expansions = mesh
            .active_elem_ids()
            .into_par_iter()
            .map(|elem_id| {
                let orders = space.get_element_order(elem_id);
                let (order, _) = limit_order(source.fn_order() + orders.max_order() as usize);

                (
                    elem_id,
                    RectExpansion::project(mesh.elem_bounds(elem_id), orders, table.rule(order), |point| {
                        source.value_at(point).unwrap_or(0.0)
                    }),
                )
            })
            .collect();

        Self { expansions }
    }

    fn expansion(&self, elem_id: usize) -> &RectExpansion {
        match self.expansions.get(&elem_id) {
            Some(expansion) => expansion,
            None => panic!(
                "ProjectedSolution has no expansion over Elem {}; it must be active on the Mesh the solution was built over!",
                elem_id
            ),
        }
    }
}

impl MeshFunction for ProjectedSolution {
    fn value(&self, elem_id: usize, point: &Point) -> f64 {
        self.expansion(elem_id).value(point)
    }

    fn gradient(&self, elem_id: usize, point: &Point) -> V2D {
        self.expansion(elem_id).gradient(point)
    }

    fn fn_order(&self) -> usize {
        self.expansions
            .values()
            .map(|expansion| expansion.orders().max_order() as usize)
            .max()
            .unwrap_or(0)
    }
}

/// Values and gradients of a field sampled at a set of quadrature points
#[derive(Clone, Debug, Default)]
pub struct FnValues {
    pub val: Vec<f64>,
    pub dx: Vec<f64>,
    pub dy: Vec<f64>,
}

impl FnValues {
    /// Sample a [MeshFunction] over an `Elem` of its Mesh
    pub fn sample(function: &dyn MeshFunction, elem_id: usize, points: &[Point]) -> Self {
        let mut values = Self {
            val: Vec::with_capacity(points.len()),
            dx: Vec::with_capacity(points.len()),
            dy: Vec::with_capacity(points.len()),
        };

        for point in points {
            let gradient = function.gradient(elem_id, point);
            values.val.push(function.value(elem_id, point));
            values.dx.push(gradient.x());
            values.dy.push(gradient.y());
        }

        values
    }

    /// Point-wise difference `self - other`
    pub fn subtract(&self, other: &Self) -> Self {
        let diff = |a: &[f64], b: &[f64]| a.iter().zip(b.iter()).map(|(a, b)| a - b).collect();

        Self {
            val: diff(&self.val, &other.val),
            dx: diff(&self.dx, &other.dx),
            dy: diff(&self.dy, &other.dy),
        }
    }

    pub fn len(&self) -> usize {
        self.val.len()
    }

    pub fn is_empty(&self) -> bool {
        self.val.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::super::{mesh::h_refinement::HRef, space::SpaceKind};
    use super::*;

    fn bilinear() -> ExactSolution {
        ExactSolution::new(|x, y| 1.0 + 2.0 * x - y + 3.0 * x * y, |x, y| [2.0 + 3.0 * y, -1.0 + 3.0 * x])
            .with_order(2)
    }

    #[test]
    fn projection_reproduces_polynomials() {
        let mut mesh = Mesh::uniform_rect([0.0, 2.0], [0.0, 1.0], [2, 1]);
        mesh.refine_elem(1, HRef::U).unwrap();
        let space = Space::new(0, &mesh, SpaceKind::H1, PolyOrders::uniform(1));

        let coarse = Mesh::uniform_rect([0.0, 2.0], [0.0, 1.0], [1, 1]);
        let exact = bilinear();
        let projected = ProjectedSolution::project(&mesh, &space, &SolutionRef::new(&coarse, &exact));

        let field = SolutionRef::new(&mesh, &projected);
        for point in [Point::new(0.3, 0.7), Point::new(1.2, 0.1), Point::new(1.9, 0.95)] {
            let expected = 1.0 + 2.0 * point.x - point.y + 3.0 * point.x * point.y;
            assert!((field.value_at(&point).unwrap() - expected).abs() < 1e-12);

            let gradient = field.gradient_at(&point).unwrap();
            assert!((gradient.x() - (2.0 + 3.0 * point.y)).abs() < 1e-12);
            assert!((gradient.y() - (-1.0 + 3.0 * point.x)).abs() < 1e-12);
        }

        assert_eq!(projected.fn_order(), 1);
        assert!(!projected.is_exact());
        assert!(field.value_at(&Point::new(3.0, 0.5)).is_none());
    }

    #[test]
    fn zero_field_and_differences() {
        let mesh = Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [1, 1]);
        let space = Space::new(0, &mesh, SpaceKind::L2, PolyOrders::uniform(2));
        let zero = ProjectedSolution::zero(&mesh, &space);
        let exact = bilinear();

        let points = [Point::new(0.25, 0.25), Point::new(0.5, 0.75)];
        let exact_values = FnValues::sample(&exact, 0, &points);
        let zero_values = FnValues::sample(&zero, 0, &points);

        let diff = exact_values.subtract(&zero_values);
        assert_eq!(diff.len(), 2);
        assert!((diff.val[1] - (1.0 + 1.0 - 0.75 + 3.0 * 0.375)).abs() < 1e-14);
        assert!((diff.dy[0] - (-1.0 + 0.75)).abs() < 1e-14);
    }

    #[test]
    #[should_panic]
    fn evaluate_outside_expansion() {
        let mesh = Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [1, 1]);
        let space = Space::new(0, &mesh, SpaceKind::L2, PolyOrders::uniform(2));
        let zero = ProjectedSolution::zero(&mesh, &space);
        zero.value(3, &Point::new(0.5, 0.5));
    }
}
