use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use serde::{Deserialize, Serialize};

/// Element type: a 16-bit mask of semantic kind, constancy and subtype bits.
///
/// Node subtype bits and connector subtype bits share the same positions, so
/// subtype bits are only meaningful together with the kind bits.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ScType(u16);

impl ScType {
    /// No bits set. As a pattern it matches any element.
    pub const UNKNOWN: ScType = ScType(0);

    // kinds
    /// Node kind.
    pub const NODE: ScType = ScType(0x1);
    /// Link: a node carrying a content stream.
    pub const LINK: ScType = ScType(0x1 | 0x2);
    /// Undirected connector.
    pub const COMMON_EDGE: ScType = ScType(0x4);
    /// Directed, non-membership connector.
    pub const COMMON_ARC: ScType = ScType(0x8);
    /// Directed membership connector with positivity and permanency bits.
    pub const MEMBERSHIP_ARC: ScType = ScType(0x10);

    // constancy
    /// Constant element.
    pub const CONST: ScType = ScType(0x20);
    /// Variable element.
    pub const VAR: ScType = ScType(0x40);

    // membership arc subtypes
    /// Positive membership.
    pub const POS_ARC: ScType = ScType(0x80);
    /// Negative membership.
    pub const NEG_ARC: ScType = ScType(0x100);
    /// Fuzzy membership.
    pub const FUZ_ARC: ScType = ScType(0x200);
    /// Temporary membership.
    pub const TEMP_ARC: ScType = ScType(0x400);
    /// Actual (currently holding) membership.
    pub const ACTUAL_ARC: ScType = ScType(0x4000);
    /// Inactual membership.
    pub const INACTUAL_ARC: ScType = ScType(0x8000);
    /// Permanent membership. Permanent arcs are always actual.
    pub const PERM_ARC: ScType = ScType(0x4000 | 0x800);

    // node subtypes
    /// Tuple node subtype.
    pub const TUPLE: ScType = ScType(0x80);
    /// Structure node subtype.
    pub const STRUCTURE: ScType = ScType(0x100);
    /// Role relation node subtype.
    pub const ROLE: ScType = ScType(0x200);
    /// Non-role relation node subtype.
    pub const NOROLE: ScType = ScType(0x400);
    /// Class node subtype.
    pub const CLASS: ScType = ScType(0x800);
    /// Superclass (abstract) node subtype.
    pub const SUPERCLASS: ScType = ScType(0x1000);
    /// Material node subtype.
    pub const MATERIAL: ScType = ScType(0x2000);

    // masks
    /// Semantic kind bits.
    pub const ELEMENT_MASK: ScType = ScType(0x1 | 0x4 | 0x8 | 0x10);
    /// Every connector kind.
    pub const CONNECTOR_MASK: ScType = ScType(0x4 | 0x8 | 0x10);
    /// Directed connector kinds.
    pub const ARC_MASK: ScType = ScType(0x8 | 0x10);
    /// Constancy bits.
    pub const CONSTANCY_MASK: ScType = ScType(0x20 | 0x40);
    /// Positivity bits.
    pub const POSITIVITY_MASK: ScType = ScType(0x80 | 0x100 | 0x200);
    /// Permanency bits (the actual bit is part of the permanent marker).
    pub const PERMANENCY_MASK: ScType = ScType(0x4000 | 0x800 | 0x400);
    /// Actuality bits.
    pub const ACTUALITY_MASK: ScType = ScType(0x4000 | 0x8000);
    /// Node subtype bits, including the link marker.
    pub const NODE_MASK: ScType =
        ScType(0x2 | 0x80 | 0x100 | 0x200 | 0x400 | 0x800 | 0x1000 | 0x2000);

    // common combinations
    /// Constant node.
    pub const NODE_CONST: ScType = ScType(0x1 | 0x20);
    /// Variable node.
    pub const NODE_VAR: ScType = ScType(0x1 | 0x40);
    /// Constant tuple node.
    pub const NODE_CONST_TUPLE: ScType = ScType(0x1 | 0x20 | 0x80);
    /// Constant structure node.
    pub const NODE_CONST_STRUCTURE: ScType = ScType(0x1 | 0x20 | 0x100);
    /// Constant role relation.
    pub const NODE_CONST_ROLE: ScType = ScType(0x1 | 0x20 | 0x200);
    /// Constant non-role relation.
    pub const NODE_CONST_NOROLE: ScType = ScType(0x1 | 0x20 | 0x400);
    /// Constant class node.
    pub const NODE_CONST_CLASS: ScType = ScType(0x1 | 0x20 | 0x800);
    /// Constant superclass node.
    pub const NODE_CONST_SUPERCLASS: ScType = ScType(0x1 | 0x20 | 0x1000);
    /// Constant material node.
    pub const NODE_CONST_MATERIAL: ScType = ScType(0x1 | 0x20 | 0x2000);
    /// Variable tuple node.
    pub const NODE_VAR_TUPLE: ScType = ScType(0x1 | 0x40 | 0x80);
    /// Variable structure node.
    pub const NODE_VAR_STRUCTURE: ScType = ScType(0x1 | 0x40 | 0x100);
    /// Variable role relation.
    pub const NODE_VAR_ROLE: ScType = ScType(0x1 | 0x40 | 0x200);
    /// Variable non-role relation.
    pub const NODE_VAR_NOROLE: ScType = ScType(0x1 | 0x40 | 0x400);
    /// Variable class node.
    pub const NODE_VAR_CLASS: ScType = ScType(0x1 | 0x40 | 0x800);
    /// Variable superclass node.
    pub const NODE_VAR_SUPERCLASS: ScType = ScType(0x1 | 0x40 | 0x1000);
    /// Variable material node.
    pub const NODE_VAR_MATERIAL: ScType = ScType(0x1 | 0x40 | 0x2000);
    /// Constant link.
    pub const LINK_CONST: ScType = ScType(0x3 | 0x20);
    /// Variable link.
    pub const LINK_VAR: ScType = ScType(0x3 | 0x40);
    /// Constant undirected common edge.
    pub const CONST_COMMON_EDGE: ScType = ScType(0x4 | 0x20);
    /// Variable undirected common edge.
    pub const VAR_COMMON_EDGE: ScType = ScType(0x4 | 0x40);
    /// Constant common arc.
    pub const CONST_COMMON_ARC: ScType = ScType(0x8 | 0x20);
    /// Variable common arc.
    pub const VAR_COMMON_ARC: ScType = ScType(0x8 | 0x40);
    /// Constant positive membership arc.
    pub const CONST_POS_ARC: ScType = ScType(0x10 | 0x20 | 0x80);
    /// Constant negative membership arc.
    pub const CONST_NEG_ARC: ScType = ScType(0x10 | 0x20 | 0x100);
    /// Constant fuzzy membership arc.
    pub const CONST_FUZ_ARC: ScType = ScType(0x10 | 0x20 | 0x200);
    /// Constant permanent positive membership arc.
    pub const CONST_PERM_POS_ARC: ScType = ScType(0x10 | 0x20 | 0x80 | 0x4800);
    /// Constant permanent negative membership arc.
    pub const CONST_PERM_NEG_ARC: ScType = ScType(0x10 | 0x20 | 0x100 | 0x4800);
    /// Constant temporary positive membership arc.
    pub const CONST_TEMP_POS_ARC: ScType = ScType(0x10 | 0x20 | 0x80 | 0x400);
    /// Constant temporary negative membership arc.
    pub const CONST_TEMP_NEG_ARC: ScType = ScType(0x10 | 0x20 | 0x100 | 0x400);
    /// Constant actual temporary positive membership arc.
    pub const CONST_ACTUAL_TEMP_POS_ARC: ScType = ScType(0x10 | 0x20 | 0x80 | 0x4400);
    /// Constant actual temporary negative membership arc.
    pub const CONST_ACTUAL_TEMP_NEG_ARC: ScType = ScType(0x10 | 0x20 | 0x100 | 0x4400);
    /// Constant inactual temporary positive membership arc.
    pub const CONST_INACTUAL_TEMP_POS_ARC: ScType = ScType(0x10 | 0x20 | 0x80 | 0x8400);
    /// Constant inactual temporary negative membership arc.
    pub const CONST_INACTUAL_TEMP_NEG_ARC: ScType = ScType(0x10 | 0x20 | 0x100 | 0x8400);
    /// Variable positive membership arc.
    pub const VAR_POS_ARC: ScType = ScType(0x10 | 0x40 | 0x80);
    /// Variable permanent positive membership arc.
    pub const VAR_PERM_POS_ARC: ScType = ScType(0x10 | 0x40 | 0x80 | 0x4800);
    /// Variable temporary positive membership arc.
    pub const VAR_TEMP_POS_ARC: ScType = ScType(0x10 | 0x40 | 0x80 | 0x400);

    /// Wraps raw bits.
    pub const fn from_bits(bits: u16) -> Self {
        ScType(bits)
    }

    /// Raw bits.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Bits of `self` selected by `mask`.
    pub const fn masked(self, mask: ScType) -> ScType {
        ScType(self.0 & mask.0)
    }

    /// True when every bit of `subtype` is set.
    pub const fn has_subtype(self, subtype: ScType) -> bool {
        self.0 & subtype.0 == subtype.0
    }

    /// True when any bit of `mask` is set.
    pub const fn has_any(self, mask: ScType) -> bool {
        self.0 & mask.0 != 0
    }

    /// Iterator-style match: every bit of `pattern` must be present.
    ///
    /// `UNKNOWN` as a pattern matches every element.
    pub const fn matches(self, pattern: ScType) -> bool {
        self.has_subtype(pattern)
    }

    /// True for an empty mask.
    pub const fn is_unknown(self) -> bool {
        self.0 == 0
    }

    /// Semantic kind bits only.
    pub const fn kind(self) -> ScType {
        self.masked(Self::ELEMENT_MASK)
    }

    /// Node kind, links included.
    pub const fn is_node(self) -> bool {
        self.0 & Self::NODE.0 != 0
    }

    /// Node carrying the link marker.
    pub const fn is_link(self) -> bool {
        self.has_subtype(Self::LINK)
    }

    /// Any connector kind.
    pub const fn is_connector(self) -> bool {
        self.has_any(Self::CONNECTOR_MASK)
    }

    /// Undirected connector.
    pub const fn is_common_edge(self) -> bool {
        self.has_any(Self::COMMON_EDGE)
    }

    /// Directed connector.
    pub const fn is_arc(self) -> bool {
        self.has_any(Self::ARC_MASK)
    }

    /// Directed, non-membership connector.
    pub const fn is_common_arc(self) -> bool {
        self.has_any(Self::COMMON_ARC)
    }

    /// Membership connector.
    pub const fn is_membership_arc(self) -> bool {
        self.has_any(Self::MEMBERSHIP_ARC)
    }

    /// Constant constancy bit.
    pub const fn is_const(self) -> bool {
        self.has_any(Self::CONST)
    }

    /// Variable constancy bit.
    pub const fn is_var(self) -> bool {
        self.has_any(Self::VAR)
    }

    /// Whether an element of this type may be narrowed to `ext`.
    ///
    /// Every group of bits fixed in `self` (semantic kind, constancy, node
    /// subtype, permanency, positivity, actuality) must be identical in `ext`;
    /// groups left open in `self` may take any value. `ext` may only carry
    /// bits that belong to the kind of `self`.
    pub fn can_extend_to(self, ext: ScType) -> bool {
        let fixed_equal = |mask: ScType| {
            let own = self.masked(mask);
            own.is_unknown() || own == ext.masked(mask)
        };
        let only_bits = |allowed: ScType| ext.0 & !allowed.0 == 0;

        if !fixed_equal(Self::ELEMENT_MASK) || !fixed_equal(Self::CONSTANCY_MASK) {
            return false;
        }

        if self.is_node() {
            only_bits(Self::NODE | Self::CONSTANCY_MASK | Self::NODE_MASK)
                && fixed_equal(Self::NODE_MASK)
        } else if self.is_membership_arc() {
            only_bits(
                Self::MEMBERSHIP_ARC
                    | Self::CONSTANCY_MASK
                    | Self::POSITIVITY_MASK
                    | Self::PERMANENCY_MASK
                    | Self::ACTUALITY_MASK,
            ) && fixed_equal(Self::PERMANENCY_MASK)
                && fixed_equal(Self::POSITIVITY_MASK)
                && fixed_equal(Self::ACTUALITY_MASK)
        } else if self.is_connector() {
            only_bits(self.kind() | Self::CONSTANCY_MASK)
        } else {
            true
        }
    }
}

impl BitOr for ScType {
    type Output = ScType;

    fn bitor(self, rhs: ScType) -> ScType {
        ScType(self.0 | rhs.0)
    }
}

impl BitOrAssign for ScType {
    fn bitor_assign(&mut self, rhs: ScType) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ScType {
    type Output = ScType;

    fn bitand(self, rhs: ScType) -> ScType {
        ScType(self.0 & rhs.0)
    }
}

impl Not for ScType {
    type Output = ScType;

    fn not(self) -> ScType {
        ScType(!self.0)
    }
}

impl From<u16> for ScType {
    fn from(value: u16) -> Self {
        ScType(value)
    }
}

impl From<ScType> for u16 {
    fn from(value: ScType) -> Self {
        value.0
    }
}

impl fmt::Display for ScType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}
