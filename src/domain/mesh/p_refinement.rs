use super::MAX_POLYNOMIAL_ORDER;
use thiserror::Error;

#[cfg(feature = "json_export")]
use json::{object, JsonValue};

/// Polynomial expansion orders of an Elem in the u and v directions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PolyOrders {
    /// Maximum u-directed polynomial expansion order
    pub ni: u8,
    /// Maximum v-directed polynomial expansion order
    pub nj: u8,
}

impl PolyOrders {
    pub const fn from(i: u8, j: u8) -> Self {
        Self { ni: i, nj: j }
    }

    pub const fn uniform(n: u8) -> Self {
        Self { ni: n, nj: n }
    }

    /// Update the u- and v-directed expansion orders according to a [PRef]
    pub fn refine(&mut self, refinement: PRef) -> Result<(), PRefError> {
        self.ni = refinement.refine_i(self.ni)?;
        self.nj = refinement.refine_j(self.nj)?;

        Ok(())
    }

    /// Direction-wise maximum of two sets of orders
    pub fn max_with(&self, other: Self) -> Self {
        Self {
            ni: std::cmp::max(self.ni, other.ni),
            nj: std::cmp::max(self.nj, other.nj),
        }
    }

    /// Reduce both orders by one, never going below 1
    pub fn decremented(&self) -> Self {
        Self {
            ni: std::cmp::max(self.ni.saturating_sub(1), 1),
            nj: std::cmp::max(self.nj.saturating_sub(1), 1),
        }
    }

    /// Largest of the two directional orders
    pub fn max_order(&self) -> u8 {
        std::cmp::max(self.ni, self.nj)
    }

    /// Are both orders within `[1, MAX_POLYNOMIAL_ORDER]`
    pub fn is_valid(&self) -> bool {
        (1..=MAX_POLYNOMIAL_ORDER).contains(&self.ni) && (1..=MAX_POLYNOMIAL_ORDER).contains(&self.nj)
    }

    /// Number of tensor-product expansion terms: (ni + 1) * (nj + 1)
    pub fn num_terms(&self) -> usize {
        (self.ni as usize + 1) * (self.nj as usize + 1)
    }

    /// Get the permutations of [i, j] with i ∈ [0, Ni] and j ∈ [0, Nj]
    pub fn permutations(&self) -> impl Iterator<Item = [u8; 2]> + '_ {
        (0..=self.ni).flat_map(move |i_order| (0..=self.nj).map(move |j_order| [i_order, j_order]))
    }
}

impl Default for PolyOrders {
    fn default() -> Self {
        Self { ni: 1, nj: 1 }
    }
}

#[cfg(feature = "json_export")]
impl From<PolyOrders> for JsonValue {
    fn from(orders: PolyOrders) -> Self {
        object! {
            "u": orders.ni,
            "v": orders.nj,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PRefInt {
    Increment(u8),
    Decrement(u8),
    None,
}

impl PRefInt {
    fn refine(&self, n: u8) -> Result<u8, PRefError> {
        match self {
            Self::Increment(delta) => {
                if n + *delta > MAX_POLYNOMIAL_ORDER {
                    Err(PRefError::ExceededMaxExpansion)
                } else {
                    Ok(n + *delta)
                }
            }
            Self::Decrement(delta) => {
                if *delta >= n {
                    Err(PRefError::NegExpansion)
                } else {
                    Ok(n - *delta)
                }
            }
            Self::None => Ok(n),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Description of a p-Refinement
pub struct PRef {
    di: PRefInt,
    dj: PRefInt,
}

impl PRef {
    pub const fn from(i: i8, j: i8) -> Self {
        Self {
            di: Self::delta(i),
            dj: Self::delta(j),
        }
    }

    const fn delta(d: i8) -> PRefInt {
        if d > 0 {
            PRefInt::Increment(d as u8)
        } else if d < 0 {
            PRefInt::Decrement(d.unsigned_abs())
        } else {
            PRefInt::None
        }
    }

    fn refine_i(&self, i_current: u8) -> Result<u8, PRefError> {
        self.di.refine(i_current)
    }

    fn refine_j(&self, j_current: u8) -> Result<u8, PRefError> {
        self.dj.refine(j_current)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PRefError {
    #[error("Negative p-Refinement will result in 0 or negative expansion; Cannot p-Refine!")]
    NegExpansion,
    #[error("Positive p-Refinement will result in expansion order over maximum; Cannot p-Refine!")]
    ExceededMaxExpansion,
    #[error("Elem {0} does not exist; Cannot apply p-Refinement!")]
    ElemDoesntExist(usize),
    #[error("Multiple p-refinements were specified for Elem {0}; Cannot apply p-Refinements")]
    DoubleRefinement(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_p_refinements() {
        let mut orders = PolyOrders::uniform(2);
        orders.refine(PRef::from(2, -1)).unwrap();
        assert_eq!(orders, PolyOrders::from(4, 1));

        assert_eq!(orders.refine(PRef::from(0, -1)), Err(PRefError::NegExpansion));
        assert_eq!(
            orders.refine(PRef::from(MAX_POLYNOMIAL_ORDER as i8, 0)),
            Err(PRefError::ExceededMaxExpansion)
        );
    }

    #[test]
    fn order_arithmetic() {
        let a = PolyOrders::from(3, 1);
        let b = PolyOrders::from(2, 4);
        assert_eq!(a.max_with(b), PolyOrders::from(3, 4));
        assert_eq!(a.decremented(), PolyOrders::from(2, 1));
        assert_eq!(a.num_terms(), 8);
        assert_eq!(a.permutations().count(), 8);
        assert!(!PolyOrders::from(0, 2).is_valid());
    }
}
