mod projection;

pub use projection::{CandidateList, ProjectionSelector};

use super::refinement::{RefinementType, SelectedRefinement};
use crate::domain::{
    fields::SolutionRef,
    mesh::{geometry::Point, p_refinement::PolyOrders, Mesh, MAX_POLYNOMIAL_ORDER},
};

use smallvec::SmallVec;

/// Everything a [Selector] may inspect when deciding how to refine an element
#[derive(Clone, Copy)]
pub struct ElemContext<'a> {
    pub mesh: &'a Mesh,
    pub elem_id: usize,
    /// current expansion orders of the element in the component being refined
    pub current: PolyOrders,
    /// reference solution of the component being refined (if one was provided)
    pub reference: Option<SolutionRef<'a>>,
}

impl<'a> ElemContext<'a> {
    /// Real-space bounds of the element's sons for a given split, in son order
    pub fn son_bounds(&self, split: RefinementType) -> SmallVec<[[Point; 2]; 4]> {
        let elem = &self.mesh.elems[self.elem_id];
        let range = elem.parametric_range();

        match split.to_href() {
            None => SmallVec::from_slice(&[self.mesh.elem_bounds(self.elem_id)]),
            Some(h_ref) => (0..h_ref.num_children())
                .map(|idx| elem.element.real_bounds(h_ref.loc(idx).sub_range(range)))
                .collect(),
        }
    }
}

/// A refinement policy for the elements of one component
pub trait Selector {
    /// Decide how an element should be refined. Returns `None` to leave it unchanged.
    fn select_refinement(&mut self, ctx: &ElemContext) -> Option<SelectedRefinement>;

    /// Son orders of an element whose split was imposed by another component sharing its Mesh
    ///
    /// `suggested` holds the orders the deciding component proposed for an isotropic split (if any); they are used verbatim.
    /// Otherwise the orders are reduced along each split direction so the sons keep roughly the parent's number of unknowns.
    fn generate_shared_mesh_orders(
        &self,
        ctx: &ElemContext,
        split: RefinementType,
        suggested: Option<&[PolyOrders; 4]>,
    ) -> [PolyOrders; 4] {
        if let Some(orders) = suggested {
            return *orders;
        }

        let PolyOrders { ni, nj } = ctx.current;
        let halved = |o: u8| std::cmp::max((o + 1) / 2, 1);
        let two_thirds = |o: u8| std::cmp::max((2 * (o as u16 + 1) / 3) as u8, 1);

        [match split {
            RefinementType::P => ctx.current,
            RefinementType::H => PolyOrders::from(halved(ni), halved(nj)),
            RefinementType::AnisoH => PolyOrders::from(ni, two_thirds(nj)),
            RefinementType::AnisoV => PolyOrders::from(two_thirds(ni), nj),
        }; 4]
    }

    /// Does this selector evaluate the reference solution
    fn needs_reference(&self) -> bool {
        false
    }
}

/// Always splits elements isotropically; the sons inherit the element's orders
#[derive(Clone, Copy, Debug, Default)]
pub struct HOnlySelector;

impl Selector for HOnlySelector {
    fn select_refinement(&mut self, ctx: &ElemContext) -> Option<SelectedRefinement> {
        Some(SelectedRefinement::split(
            RefinementType::H,
            [ctx.current; 4],
            [ctx.current; 4],
        ))
    }
}

/// Raises the expansion orders of elements by a fixed increment, never splitting them
#[derive(Clone, Copy, Debug)]
pub struct POnlySelector {
    pub order_increase: u8,
}

impl POnlySelector {
    pub fn new(order_increase: u8) -> Self {
        Self { order_increase }
    }
}

impl Default for POnlySelector {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Selector for POnlySelector {
    fn select_refinement(&mut self, ctx: &ElemContext) -> Option<SelectedRefinement> {
        let raise = |o: u8| std::cmp::min(o.saturating_add(self.order_increase), MAX_POLYNOMIAL_ORDER);
        let orders = PolyOrders::from(raise(ctx.current.ni), raise(ctx.current.nj));

        if orders == ctx.current {
            None
        } else {
            Some(SelectedRefinement::p_refinement(orders))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(mesh: &Mesh, current: PolyOrders) -> ElemContext<'_> {
        ElemContext {
            mesh,
            elem_id: 0,
            current,
            reference: None,
        }
    }

    #[test]
    fn simple_selectors() {
        let mesh = Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [1, 1]);

        let h_ref = HOnlySelector
            .select_refinement(&context(&mesh, PolyOrders::from(2, 3)))
            .unwrap();
        assert_eq!(h_ref.split, RefinementType::H);
        assert_eq!(h_ref.p, [PolyOrders::from(2, 3); 4]);

        let mut p_only = POnlySelector::new(2);
        let p_ref = p_only
            .select_refinement(&context(&mesh, PolyOrders::from(2, 9)))
            .unwrap();
        assert_eq!(p_ref.split, RefinementType::P);
        assert_eq!(p_ref.p[0], PolyOrders::from(4, MAX_POLYNOMIAL_ORDER));

        assert!(p_only
            .select_refinement(&context(&mesh, PolyOrders::uniform(MAX_POLYNOMIAL_ORDER)))
            .is_none());
    }

    #[test]
    fn shared_mesh_orders() {
        let mesh = Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [1, 1]);
        let ctx = context(&mesh, PolyOrders::from(4, 1));

        assert_eq!(
            HOnlySelector.generate_shared_mesh_orders(&ctx, RefinementType::H, None),
            [PolyOrders::from(2, 1); 4]
        );
        assert_eq!(
            HOnlySelector.generate_shared_mesh_orders(&ctx, RefinementType::AnisoV, None)[0],
            PolyOrders::from(3, 1)
        );
        assert_eq!(
            HOnlySelector.generate_shared_mesh_orders(&ctx, RefinementType::AnisoH, None)[1],
            PolyOrders::from(4, 1)
        );

        let suggested = [PolyOrders::from(3, 3); 4];
        assert_eq!(
            HOnlySelector.generate_shared_mesh_orders(&ctx, RefinementType::H, Some(&suggested)),
            suggested
        );
    }

    #[test]
    fn son_bounds() {
        let mesh = Mesh::uniform_rect([0.0, 2.0], [0.0, 1.0], [1, 1]);
        let ctx = context(&mesh, PolyOrders::default());

        let quadrants = ctx.son_bounds(RefinementType::H);
        assert_eq!(quadrants.len(), 4);
        assert!((quadrants[1][0].x - 1.0).abs() < 1e-14);
        assert!((quadrants[2][0].y - 0.5).abs() < 1e-14);

        let halves = ctx.son_bounds(RefinementType::AnisoH);
        assert_eq!(halves.len(), 2);
        assert!((halves[0][1].y - 0.5).abs() < 1e-14);
        assert!((halves[0][1].x - 2.0).abs() < 1e-14);

        let halves = ctx.son_bounds(RefinementType::AnisoV);
        assert!((halves[1][0].x - 1.0).abs() < 1e-14);
    }
}
