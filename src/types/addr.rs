use std::fmt;

use serde::{Deserialize, Serialize};

/// Address of an sc-element: a segment number and a slot offset inside it.
///
/// Segment numbers and offsets both start at 1; `{0, 0}` is the empty address.
/// The derived ordering matches the ordering of [`ScAddr::to_packed`], which
/// is the canonical order used when several monitors are locked at once.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize,
)]
pub struct ScAddr {
    seg: u16,
    offset: u16,
}

impl ScAddr {
    /// The empty address.
    pub const EMPTY: ScAddr = ScAddr { seg: 0, offset: 0 };

    /// Builds an address from its parts.
    pub const fn new(seg: u16, offset: u16) -> Self {
        Self { seg, offset }
    }

    /// Segment number.
    pub const fn seg(self) -> u16 {
        self.seg
    }

    /// Slot offset inside the segment.
    pub const fn offset(self) -> u16 {
        self.offset
    }

    /// True for `{0, 0}`.
    pub const fn is_empty(self) -> bool {
        self.seg == 0 && self.offset == 0
    }

    /// Packs into `seg << 16 | offset`.
    pub const fn to_packed(self) -> u32 {
        ((self.seg as u32) << 16) | self.offset as u32
    }

    /// Inverse of [`ScAddr::to_packed`].
    pub const fn from_packed(raw: u32) -> Self {
        Self {
            seg: (raw >> 16) as u16,
            offset: (raw & 0xFFFF) as u16,
        }
    }
}

impl fmt::Display for ScAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.seg, self.offset)
    }
}

impl From<ScAddr> for u32 {
    fn from(value: ScAddr) -> Self {
        value.to_packed()
    }
}

impl From<u32> for ScAddr {
    fn from(value: u32) -> Self {
        ScAddr::from_packed(value)
    }
}
