use super::{ElemContext, Selector};
use crate::adapt::{
    error_form::ProjNorm,
    refinement::{RefinementType, SelectedRefinement},
};
use crate::domain::{
    fields::{FnValues, RectExpansion, SolutionRef},
    mesh::{geometry::{Point, V2D}, p_refinement::PolyOrders, MAX_POLYNOMIAL_ORDER},
};
use crate::integration::glq::{limit_order, scale_gauss_quad_points, QuadratureTable};

use log::debug;

/// Projection errors are never considered smaller than this
pub const ERROR_FLOOR: f64 = 1e-30;

/// Families of refinement candidates considered by a [ProjectionSelector]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandidateList {
    /// uniform order increases
    PIso,
    /// uniform and single-direction order increases
    PAniso,
    /// isotropic split, sons keep the element's orders
    HIso,
    /// uniform order increases and isotropic splits with a range of son orders
    HpIso,
    /// all of the above plus anisotropic splits
    HpAniso,
}

impl CandidateList {
    fn p_iso(&self) -> bool {
        !matches!(self, Self::HIso)
    }

    fn p_aniso(&self) -> bool {
        matches!(self, Self::PAniso | Self::HpAniso)
    }

    fn h(&self) -> bool {
        matches!(self, Self::HIso | Self::HpIso | Self::HpAniso)
    }

    fn hp(&self) -> bool {
        matches!(self, Self::HpIso | Self::HpAniso)
    }

    fn aniso(&self) -> bool {
        matches!(self, Self::HpAniso)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Candidate {
    split: RefinementType,
    sons: [PolyOrders; 4],
}

impl Candidate {
    fn new(split: RefinementType, sons: [PolyOrders; 4]) -> Self {
        Self { split, sons }
    }

    fn son_orders(&self) -> &[PolyOrders] {
        &self.sons[0..self.split.num_sons()]
    }

    fn num_dofs(&self) -> usize {
        self.son_orders().iter().map(|o| o.num_terms()).sum()
    }
}

/// Samples of the reference solution over one son region
struct Region {
    bounds: [Point; 2],
    points: Vec<Point>,
    jwt: Vec<f64>,
    reference: FnValues,
}

impl Region {
    fn new(reference: &SolutionRef, bounds: [Point; 2], (points, weights): (&[f64], &[f64])) -> Self {
        let [min, max] = bounds;
        let (sx, x_points) = scale_gauss_quad_points(points, min.x, max.x);
        let (sy, y_points) = scale_gauss_quad_points(points, min.y, max.y);

        let mut region = Self {
            bounds,
            points: Vec::with_capacity(points.len() * points.len()),
            jwt: Vec::with_capacity(points.len() * points.len()),
            reference: FnValues::default(),
        };

        for (x, wx) in x_points.iter().zip(weights.iter()) {
            for (y, wy) in y_points.iter().zip(weights.iter()) {
                let point = Point::new(*x, *y);
                let gradient = reference.gradient_at(&point).unwrap_or_default();

                region.reference.val.push(reference.value_at(&point).unwrap_or(0.0));
                region.reference.dx.push(gradient.x());
                region.reference.dy.push(gradient.y());
                region.points.push(point);
                region.jwt.push(wx * wy * sx * sy);
            }
        }

        region
    }

    /// Squared distance between the reference solution and an expansion over this region
    fn error(&self, norm: ProjNorm, expansion: &RectExpansion) -> f64 {
        self.points
            .iter()
            .enumerate()
            .map(|(p, point)| {
                let e = self.reference.val[p] - expansion.value(point);
                let grad: V2D = expansion.gradient(point);
                let e_dx = self.reference.dx[p] - grad.x();
                let e_dy = self.reference.dy[p] - grad.y();
                self.jwt[p] * norm.integrand(e, e_dx, e_dy, e, e_dx, e_dy)
            })
            .sum()
    }
}

/// Chooses refinements by projecting the reference solution onto a list of candidate refinements
///
/// Each candidate is scored by the decrease of its projection error relative to the number of unknowns it adds:
/// `(ln e0 - ln e) / (dof - dof0) ^ conv_exp`. The best positively scored candidate is selected.
pub struct ProjectionSelector {
    pub cand_list: CandidateList,
    pub conv_exp: f64,
    pub max_order: u8,
    pub norm: ProjNorm,
    quad: QuadratureTable,
}

impl ProjectionSelector {
    pub fn new(cand_list: CandidateList, conv_exp: f64, max_order: u8) -> Self {
        Self {
            cand_list,
            conv_exp,
            max_order: std::cmp::min(max_order, MAX_POLYNOMIAL_ORDER),
            norm: ProjNorm::H1,
            quad: QuadratureTable::new(),
        }
    }

    pub fn with_norm(mut self, norm: ProjNorm) -> Self {
        self.norm = norm;
        self
    }

    fn clamp(&self, o: u16) -> u8 {
        o.clamp(1, self.max_order as u16) as u8
    }

    fn orders(&self, ni: u16, nj: u16) -> PolyOrders {
        PolyOrders::from(self.clamp(ni), self.clamp(nj))
    }

    fn candidates(&self, current: PolyOrders) -> Vec<Candidate> {
        let (ni, nj) = (current.ni as u16, current.nj as u16);
        let mut candidates = Vec::new();

        if self.cand_list.p_iso() {
            for inc in 1..=2 {
                candidates.push(Candidate::new(RefinementType::P, [self.orders(ni + inc, nj + inc); 4]));
            }
        }
        if self.cand_list.p_aniso() {
            candidates.push(Candidate::new(RefinementType::P, [self.orders(ni + 1, nj); 4]));
            candidates.push(Candidate::new(RefinementType::P, [self.orders(ni, nj + 1); 4]));
        }
        if self.cand_list.h() {
            candidates.push(Candidate::new(RefinementType::H, [current; 4]));
        }
        if self.cand_list.hp() {
            let (hi, hj) = ((ni + 1) / 2, (nj + 1) / 2);
            for inc in 0..=1 {
                candidates.push(Candidate::new(RefinementType::H, [self.orders(hi + inc, hj + inc); 4]));
            }
        }
        if self.cand_list.aniso() {
            let (ti, tj) = (2 * (ni + 1) / 3, 2 * (nj + 1) / 3);
            for inc in 0..=1 {
                candidates.push(Candidate::new(RefinementType::AnisoH, [self.orders(ni, tj + inc); 4]));
                candidates.push(Candidate::new(RefinementType::AnisoV, [self.orders(ti + inc, nj); 4]));
            }
        }

        let mut unique: Vec<Candidate> = Vec::with_capacity(candidates.len());
        for cand in candidates {
            let is_current = cand.split == RefinementType::P && cand.sons[0] == current;
            if !is_current && !unique.contains(&cand) {
                unique.push(cand);
            }
        }
        unique
    }

    fn candidate_error(
        &self,
        reference: &SolutionRef,
        regions: &[Region],
        orders: &[PolyOrders],
    ) -> f64 {
        regions
            .iter()
            .zip(orders.iter())
            .map(|(region, son_orders)| {
                let (proj_order, _) = limit_order(reference.fn_order() + son_orders.max_order() as usize);
                let expansion = RectExpansion::project(
                    region.bounds,
                    *son_orders,
                    self.quad.rule(proj_order),
                    |point| reference.value_at(point).unwrap_or(0.0),
                );
                region.error(self.norm, &expansion)
            })
            .sum()
    }
}

impl Selector for ProjectionSelector {
    fn select_refinement(&mut self, ctx: &ElemContext) -> Option<SelectedRefinement> {
        let reference = match ctx.reference {
            Some(reference) => reference,
            None => {
                debug!("No reference solution for Elem {}; leaving it unchanged", ctx.elem_id);
                return None;
            }
        };

        let candidates = self.candidates(ctx.current);
        let max_cand_order = candidates
            .iter()
            .flat_map(|cand| cand.son_orders().iter().map(|o| o.max_order()))
            .fold(ctx.current.max_order(), std::cmp::max) as usize;
        let (err_order, _) = limit_order(2 * std::cmp::max(reference.fn_order(), max_cand_order));
        let rule = self.quad.rule(err_order);

        let mut regions: Vec<(RefinementType, Vec<Region>)> = Vec::with_capacity(4);
        for split in std::iter::once(RefinementType::P).chain(candidates.iter().map(|cand| cand.split)) {
            if !regions.iter().any(|(s, _)| *s == split) {
                let son_regions = ctx
                    .son_bounds(split)
                    .into_iter()
                    .map(|bounds| Region::new(&reference, bounds, rule))
                    .collect();
                regions.push((split, son_regions));
            }
        }
        let err0 = self
            .candidate_error(&reference, regions_of(&regions, RefinementType::P), &[ctx.current])
            .max(ERROR_FLOOR);
        let dof0 = ctx.current.num_terms();

        let mut best: Option<(f64, Candidate)> = None;
        let mut best_h: Option<(f64, Candidate)> = None;

        for cand in candidates {
            let err = self
                .candidate_error(&reference, regions_of(&regions, cand.split), cand.son_orders())
                .max(ERROR_FLOOR);
            let dof = cand.num_dofs();

            let score = if dof > dof0 {
                (err0.ln() - err.ln()) / ((dof - dof0) as f64).powf(self.conv_exp)
            } else {
                0.0
            };

            if cand.split == RefinementType::H && best_h.map_or(true, |(s, _)| score > s) {
                best_h = Some((score, cand));
            }
            if score > 0.0 && best.map_or(true, |(s, _)| score > s) {
                best = Some((score, cand));
            }
        }

        let (score, selected) = best?;
        debug!(
            "Elem {}: selected {:?} {:?} (score {:.3e})",
            ctx.elem_id,
            selected.split,
            selected.son_orders(),
            score
        );

        let q = best_h.map_or([ctx.current; 4], |(_, cand)| cand.sons);
        Some(match selected.split {
            RefinementType::P => SelectedRefinement {
                split: RefinementType::P,
                p: selected.sons,
                q,
            },
            split => SelectedRefinement::split(split, selected.sons, q),
        })
    }

    fn needs_reference(&self) -> bool {
        true
    }
}

fn regions_of(regions: &[(RefinementType, Vec<Region>)], split: RefinementType) -> &[Region] {
    regions
        .iter()
        .find(|(s, _)| *s == split)
        .map(|(_, r)| r.as_slice())
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{fields::ExactSolution, mesh::Mesh};

    fn quartic() -> ExactSolution {
        ExactSolution::new(|x, y| x * x * y * y, |x, y| [2.0 * x * y * y, 2.0 * x * x * y]).with_order(4)
    }

    #[test]
    fn polynomial_data_prefers_p() {
        let mesh = Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [1, 1]);
        let exact = quartic();
        let ctx = ElemContext {
            mesh: &mesh,
            elem_id: 0,
            current: PolyOrders::uniform(1),
            reference: Some(SolutionRef::new(&mesh, &exact)),
        };

        let mut selector = ProjectionSelector::new(CandidateList::HpIso, 1.0, MAX_POLYNOMIAL_ORDER);
        let selected = selector.select_refinement(&ctx).unwrap();

        assert_eq!(selected.split, RefinementType::P);
        assert_eq!(selected.p[0], PolyOrders::uniform(2));
        assert!(selector.needs_reference());
    }

    #[test]
    fn h_only_candidates() {
        let mesh = Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [1, 1]);
        let exact = quartic();
        let ctx = ElemContext {
            mesh: &mesh,
            elem_id: 0,
            current: PolyOrders::uniform(1),
            reference: Some(SolutionRef::new(&mesh, &exact)),
        };

        let mut selector = ProjectionSelector::new(CandidateList::HIso, 1.0, MAX_POLYNOMIAL_ORDER).with_norm(ProjNorm::L2);
        let selected = selector.select_refinement(&ctx).unwrap();

        assert_eq!(selected.split, RefinementType::H);
        assert_eq!(selected.p, [PolyOrders::uniform(1); 4]);
        assert_eq!(selected.q, [PolyOrders::uniform(1); 4]);
    }

    #[test]
    fn candidate_lists() {
        let selector = ProjectionSelector::new(CandidateList::HpAniso, 1.0, 3);
        let candidates = selector.candidates(PolyOrders::from(3, 1));

        assert!(candidates
            .iter()
            .all(|cand| cand.son_orders().iter().all(|o| o.ni <= 3 && o.nj <= 3 && o.ni >= 1 && o.nj >= 1)));
        assert!(candidates
            .iter()
            .all(|cand| !(cand.split == RefinementType::P && cand.sons[0] == PolyOrders::from(3, 1))));
        assert!(candidates.iter().any(|cand| cand.split == RefinementType::AnisoV));

        let p_only = ProjectionSelector::new(CandidateList::PIso, 1.0, 10);
        assert!(p_only
            .candidates(PolyOrders::uniform(2))
            .iter()
            .all(|cand| cand.split == RefinementType::P));
    }
}
