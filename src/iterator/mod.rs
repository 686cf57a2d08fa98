//! Pattern iterators over incident rings.
//!
//! A 3-tuple pattern binds `(source, connector, target)`; every position is
//! either a fixed address or a type mask. At least one position must be fixed
//! so the walk can start from an incident ring. 5-tuple patterns add an
//! attribute arc and the node it comes from.

mod iter3;
mod iter5;

pub use iter3::{Iter3Pattern, ScIterator3, Triples};
pub use iter5::{Quintuples, ScIterator5};

use crate::types::{ScAddr, ScType};

/// One position of an iterator pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterParam {
    /// The position must be exactly this element.
    Fixed(ScAddr),
    /// The position may be any element whose type contains these bits.
    Any(ScType),
}

impl IterParam {
    /// Unconstrained position.
    pub const ANY: IterParam = IterParam::Any(ScType::UNKNOWN);

    /// Fixed address, if any.
    pub fn fixed(self) -> Option<ScAddr> {
        match self {
            IterParam::Fixed(addr) => Some(addr),
            IterParam::Any(_) => None,
        }
    }

    pub(crate) fn is_fixed(self) -> bool {
        matches!(self, IterParam::Fixed(_))
    }

    /// True when an element at `addr` with type `ty` fits this position.
    pub(crate) fn accepts(self, addr: ScAddr, ty: ScType) -> bool {
        match self {
            IterParam::Fixed(fixed) => fixed == addr,
            IterParam::Any(mask) => ty.matches(mask),
        }
    }
}

impl From<ScAddr> for IterParam {
    fn from(addr: ScAddr) -> Self {
        IterParam::Fixed(addr)
    }
}

impl From<ScType> for IterParam {
    fn from(ty: ScType) -> Self {
        IterParam::Any(ty)
    }
}
