use super::{
    params::{ErrorFlags, ErrorNormalization},
    queue::fill_regular_queue,
    traverse::{multi_mesh_leaves, TraversalLeaf},
    Adapt, ErrorSummary,
};
use crate::domain::{
    fields::{FnValues, SolutionRef},
    mesh::{geometry::Point, Mesh},
};
use crate::error::AdaptError;
use crate::integration::glq::{limit_order, scale_gauss_quad_points};

use log::{info, warn};
use rayon::prelude::*;
use smallvec::SmallVec;

/// Contribution of one error form to one component over one traversal leaf
struct Contribution {
    comp: usize,
    coarse_elem: usize,
    err: f64,
    nrm: f64,
}

struct LeafResult {
    contributions: SmallVec<[Contribution; 4]>,
    clamped: bool,
}

impl Adapt {
    /// Compute the error of each coarse solution with respect to its reference solution and store the element errors for [adapt](Adapt::adapt)
    ///
    /// `flags` is a combination of the `*_ERROR_*` bit codes in [params](super::params).
    /// Refills the regular queue and clears the priority queue.
    pub fn calc_err_est(
        &mut self,
        coarse: &[SolutionRef],
        reference: &[SolutionRef],
        flags: u32,
    ) -> Result<ErrorSummary, AdaptError> {
        self.calc_err_internal(coarse, reference, true, ErrorFlags::from_bits(flags)?)
    }

    /// Compute the error of each coarse solution with respect to an exact (or reference) solution without storing element errors
    pub fn calc_err_exact(
        &mut self,
        coarse: &[SolutionRef],
        exact: &[SolutionRef],
        flags: u32,
    ) -> Result<ErrorSummary, AdaptError> {
        self.calc_err_internal(coarse, exact, false, ErrorFlags::from_bits(flags)?)
    }

    pub(crate) fn calc_err_internal(
        &mut self,
        coarse: &[SolutionRef],
        reference: &[SolutionRef],
        store: bool,
        flags: ErrorFlags,
    ) -> Result<ErrorSummary, AdaptError> {
        let n = self.num;
        if coarse.len() != n {
            return Err(AdaptError::ComponentMismatch {
                expected: n,
                found: coarse.len(),
            });
        }
        if reference.len() != n {
            return Err(AdaptError::ComponentMismatch {
                expected: n,
                found: reference.len(),
            });
        }

        let meshes: Vec<&Mesh> = coarse
            .iter()
            .chain(reference.iter())
            .map(|sln| sln.mesh)
            .collect();
        let leaves = multi_mesh_leaves(&meshes)?;

        // the function orders do not depend on the leaf
        let form_orders: Vec<usize> = self
            .error_form
            .iter()
            .map(|((i, j), form)| form.order(reference[*i].fn_order(), reference[*j].fn_order()))
            .collect();

        let results: Vec<LeafResult> = leaves
            .par_iter()
            .map(|leaf| self.integrate_leaf(leaf, &form_orders, coarse, reference))
            .collect();

        let mut norms = vec![0.0; n];
        let mut comp_errors = vec![0.0; n];
        let mut total_norm = 0.0;
        let mut total_error = 0.0;
        let mut num_clamped = 0;

        if store {
            let max_ids: Vec<usize> = coarse.iter().map(|sln| sln.mesh.max_elem_id()).collect();
            self.errors.reset(&max_ids);
        }

        for result in results {
            if result.clamped {
                num_clamped += 1;
            }
            for c in result.contributions {
                norms[c.comp] += c.nrm;
                total_norm += c.nrm;
                total_error += c.err;
                comp_errors[c.comp] += c.err;
                if store {
                    self.errors.add(c.comp, c.coarse_elem, c.err);
                }
            }
        }

        if num_clamped > 0 {
            warn!(
                "Integration order exceeded the maximum on {} of {} regions; results may be inaccurate",
                num_clamped,
                leaves.len()
            );
        }

        if store {
            if flags.element == ErrorNormalization::Relative {
                for (comp, sln) in coarse.iter().enumerate() {
                    if norms[comp] > 0.0 {
                        self.errors
                            .normalize(comp, &sln.mesh.active_elem_ids(), norms[comp]);
                    }
                }
            }

            self.errors_squared_sum = match flags.total {
                ErrorNormalization::Absolute => total_error,
                ErrorNormalization::Relative => relative(total_error, total_norm),
            };

            let coarse_meshes: Vec<&Mesh> = coarse.iter().map(|sln| sln.mesh).collect();
            self.regular_queue = fill_regular_queue(&self.errors, &coarse_meshes);
            self.priority_queue.clear();
            self.have_errors = true;
        }

        let summary = match flags.total {
            ErrorNormalization::Absolute => ErrorSummary {
                total: total_error.sqrt(),
                components: comp_errors.iter().map(|err| err.sqrt()).collect(),
            },
            ErrorNormalization::Relative => ErrorSummary {
                total: relative(total_error, total_norm).sqrt(),
                components: comp_errors
                    .iter()
                    .zip(norms.iter())
                    .map(|(err, nrm)| relative(*err, *nrm).sqrt())
                    .collect(),
            },
        };

        info!(
            "Error pass over {} regions: total error {:.6e} ({:?})",
            leaves.len(),
            summary.total,
            flags.total
        );

        Ok(summary)
    }

    fn integrate_leaf(
        &self,
        leaf: &TraversalLeaf,
        form_orders: &[usize],
        coarse: &[SolutionRef],
        reference: &[SolutionRef],
    ) -> LeafResult {
        let n = self.num;
        let mut result = LeafResult {
            contributions: SmallVec::new(),
            clamped: false,
        };

        for (((i, j), form), form_order) in self.error_form.iter().zip(form_orders) {
            let (i, j) = (*i, *j);
            let (ref_i, ref_j) = (leaf.elems[n + i], leaf.elems[n + j]);

            let mapping_order = reference[i].mesh.elems[ref_i].element.mapping_order() as usize;
            let requested = mapping_order + *form_order;
            let (order, clamped) = limit_order(requested);
            if clamped && !(reference[i].is_exact() || reference[j].is_exact()) {
                result.clamped = true;
            }

            let (points, jwt) = leaf_quadrature(&leaf.bounds, self.quad.rule(order));

            let rsln_i = FnValues::sample(reference[i].function, ref_i, &points);
            let rsln_j = FnValues::sample(reference[j].function, ref_j, &points);
            let err_i = FnValues::sample(coarse[i].function, leaf.elems[i], &points).subtract(&rsln_i);
            let err_j = FnValues::sample(coarse[j].function, leaf.elems[j], &points).subtract(&rsln_j);

            result.contributions.push(Contribution {
                comp: i,
                coarse_elem: leaf.elems[i],
                err: form.value(&jwt, &err_i, &err_j).abs(),
                nrm: form.value(&jwt, &rsln_i, &rsln_j).abs(),
            });
        }

        result
    }
}

/// Tensor-product quadrature points and `weight * jacobian` products over a rectangle
fn leaf_quadrature([min, max]: &[Point; 2], (points, weights): (&[f64], &[f64])) -> (Vec<Point>, Vec<f64>) {
    let (sx, x_points) = scale_gauss_quad_points(points, min.x, max.x);
    let (sy, y_points) = scale_gauss_quad_points(points, min.y, max.y);

    let mut real_points = Vec::with_capacity(points.len() * points.len());
    let mut jwt = Vec::with_capacity(points.len() * points.len());

    for (x, wx) in x_points.iter().zip(weights.iter()) {
        for (y, wy) in y_points.iter().zip(weights.iter()) {
            real_points.push(Point::new(*x, *y));
            jwt.push(wx * wy * sx * sy);
        }
    }

    (real_points, jwt)
}

/// `err / nrm`, or `err` itself when the norm vanishes
fn relative(err: f64, nrm: f64) -> f64 {
    if nrm > 0.0 {
        err / nrm
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::super::params::{ELEMENT_ERROR_ABS, ELEMENT_ERROR_REL, TOTAL_ERROR_ABS, TOTAL_ERROR_REL};
    use super::*;
    use crate::domain::{
        fields::{ExactSolution, MeshFunction, ProjectedSolution},
        mesh::{geometry::V2D, h_refinement::HRef, p_refinement::PolyOrders},
        space::SpaceKind,
        Domain,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Exact field which counts how often its order is queried
    struct CountingField {
        inner: ExactSolution,
        order_queries: AtomicUsize,
    }

    impl MeshFunction for CountingField {
        fn value(&self, elem_id: usize, point: &Point) -> f64 {
            self.inner.value(elem_id, point)
        }

        fn gradient(&self, elem_id: usize, point: &Point) -> V2D {
            self.inner.gradient(elem_id, point)
        }

        fn fn_order(&self) -> usize {
            self.order_queries.fetch_add(1, Ordering::Relaxed);
            self.inner.fn_order()
        }
    }

    fn bump() -> ExactSolution {
        ExactSolution::new(
            |x, y| x * y * (1.0 - x) * (1.0 - y),
            |x, y| [(1.0 - 2.0 * x) * y * (1.0 - y), (1.0 - 2.0 * y) * x * (1.0 - x)],
        )
        .with_order(4)
    }

    #[test]
    fn element_errors_sum_to_total() {
        let domain = Domain::single_mesh(
            Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [2, 2]),
            &[SpaceKind::H1],
            PolyOrders::uniform(1),
        );
        let reference = domain.reference().unwrap();

        let exact = bump();
        let coarse_sln = ProjectedSolution::zero(domain.mesh_of(0), &domain.spaces[0]);
        let fine_sln = ProjectedSolution::project(
            reference.mesh_of(0),
            &reference.spaces[0],
            &SolutionRef::new(reference.mesh_of(0), &exact),
        );

        let mut adapt = Adapt::new(&domain).unwrap();
        let summary = adapt
            .calc_err_est(
                &[SolutionRef::new(domain.mesh_of(0), &coarse_sln)],
                &[SolutionRef::new(reference.mesh_of(0), &fine_sln)],
                TOTAL_ERROR_ABS | ELEMENT_ERROR_ABS,
            )
            .unwrap();

        let element_sum: f64 = domain
            .mesh_of(0)
            .active_elem_ids()
            .iter()
            .map(|id| adapt.element_error(0, *id))
            .sum();

        assert!(adapt.have_errors());
        assert!(summary.total > 0.0);
        assert!((element_sum - summary.total.powi(2)).abs() < 1e-12);
        assert!((summary.components[0] - summary.total).abs() < 1e-12);
        for id in domain.mesh_of(0).active_elem_ids() {
            assert!(adapt.element_error(0, id) >= 0.0);
        }
        // the bump is symmetric about the center of the square
        let first = adapt.element_error(0, 0);
        for id in 1..4 {
            assert!((adapt.element_error(0, id) - first).abs() < 1e-10);
        }
    }

    #[test]
    fn relative_errors() {
        let domain = Domain::single_mesh(
            Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [2, 1]),
            &[SpaceKind::L2],
            PolyOrders::uniform(1),
        );
        let reference = domain.reference().unwrap();

        let exact = bump();
        let coarse_sln = ProjectedSolution::zero(domain.mesh_of(0), &domain.spaces[0]);
        let coarse = [SolutionRef::new(domain.mesh_of(0), &coarse_sln)];
        let fine = [SolutionRef::new(reference.mesh_of(0), &exact)];

        let mut adapt = Adapt::new(&domain).unwrap();

        // a zero coarse solution is 100% off
        let summary = adapt
            .calc_err_exact(&coarse, &fine, TOTAL_ERROR_REL | ELEMENT_ERROR_REL)
            .unwrap();
        assert!((summary.total - 1.0).abs() < 1e-12);
        assert!(!adapt.have_errors());

        adapt
            .calc_err_est(&coarse, &fine, TOTAL_ERROR_REL | ELEMENT_ERROR_REL)
            .unwrap();
        let relative_sum = adapt.element_error(0, 0) + adapt.element_error(0, 1);
        assert!((relative_sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn differently_refined_meshes() {
        let mut domain = Domain::blank();
        let plain = domain.add_mesh(Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [2, 2]));
        let mut split_mesh = Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [2, 2]);
        let children = split_mesh.refine_elem(0, HRef::T).unwrap();
        let split = domain.add_mesh(split_mesh);
        domain.add_space(plain, SpaceKind::H1, PolyOrders::uniform(1));
        domain.add_space(split, SpaceKind::H1, PolyOrders::uniform(1));
        domain.assign_dofs();
        let reference = domain.reference().unwrap();

        let exact = bump();
        let zeros: Vec<ProjectedSolution> = (0..2)
            .map(|comp| ProjectedSolution::zero(domain.mesh_of(comp), &domain.spaces[comp]))
            .collect();
        let coarse: Vec<SolutionRef> = (0..2)
            .map(|comp| SolutionRef::new(domain.mesh_of(comp), &zeros[comp]))
            .collect();
        let fine: Vec<SolutionRef> = (0..2)
            .map(|comp| SolutionRef::new(reference.mesh_of(comp), &exact))
            .collect();

        // 16 regions below the split Elem, 4 below each of the others
        let meshes: Vec<&Mesh> = coarse.iter().chain(fine.iter()).map(|sln| sln.mesh).collect();
        assert_eq!(multi_mesh_leaves(&meshes).unwrap().len(), 16 + 3 * 4);

        let mut adapt = Adapt::new(&domain).unwrap();
        let summary = adapt
            .calc_err_est(&coarse, &fine, TOTAL_ERROR_ABS | ELEMENT_ERROR_ABS)
            .unwrap();

        // the unsplit Elem collects the error of every region its counterpart's children cover
        let children_sum: f64 = children.iter().map(|child| adapt.element_error(1, *child)).sum();
        assert!(children_sum > 0.0);
        assert!((adapt.element_error(0, 0) - children_sum).abs() < 1e-12);
        assert_eq!(adapt.element_error(1, 0), 0.0);
        for elem_id in 1..4 {
            assert!((adapt.element_error(0, elem_id) - adapt.element_error(1, elem_id)).abs() < 1e-12);
        }

        let element_sum: f64 = (0..2)
            .flat_map(|comp| {
                domain
                    .mesh_of(comp)
                    .active_elem_ids()
                    .into_iter()
                    .map(move |elem_id| (comp, elem_id))
            })
            .map(|(comp, elem_id)| adapt.element_error(comp, elem_id))
            .sum();
        assert!((element_sum - summary.total.powi(2)).abs() < 1e-12);
        assert!((summary.components[0] - summary.components[1]).abs() < 1e-12);
    }

    #[test]
    fn field_orders_queried_once_per_form() {
        let domain = Domain::single_mesh(
            Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [4, 4]),
            &[SpaceKind::H1],
            PolyOrders::uniform(1),
        );
        let reference = domain.reference().unwrap();

        let coarse_sln = ProjectedSolution::zero(domain.mesh_of(0), &domain.spaces[0]);
        let counting = CountingField {
            inner: bump(),
            order_queries: AtomicUsize::new(0),
        };

        let mut adapt = Adapt::new(&domain).unwrap();
        adapt
            .calc_err_est(
                &[SolutionRef::new(domain.mesh_of(0), &coarse_sln)],
                &[SolutionRef::new(reference.mesh_of(0), &counting)],
                TOTAL_ERROR_ABS | ELEMENT_ERROR_ABS,
            )
            .unwrap();

        // one form (0, 0), asking for the order of both of its arguments; independent of the 64 regions
        assert_eq!(counting.order_queries.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn mismatched_inputs() {
        let domain = Domain::single_mesh(
            Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [2, 1]),
            &[SpaceKind::L2],
            PolyOrders::uniform(1),
        );
        let exact = bump();
        let sln = SolutionRef::new(domain.mesh_of(0), &exact);

        let mut adapt = Adapt::new(&domain).unwrap();
        assert!(matches!(
            adapt.calc_err_est(&[sln, sln], &[sln], 0),
            Err(AdaptError::ComponentMismatch { expected: 1, found: 2 })
        ));
        assert!(matches!(
            adapt.calc_err_est(&[sln], &[sln], 0x02),
            Err(AdaptError::UnknownErrorFlags(0x02))
        ));
        assert!(!adapt.have_errors());
    }
}
