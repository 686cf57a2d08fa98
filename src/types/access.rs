use std::fmt;

use serde::{Deserialize, Serialize};

/// Read and write levels, each in `0..=15`.
///
/// A context may read an element when its read level is at least the
/// element's, and likewise for writes. Elements inherit the levels of the
/// context that created them.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct AccessLevels {
    read: u8,
    write: u8,
}

impl AccessLevels {
    /// Highest level representable in a nibble.
    pub const MAX_LEVEL: u8 = 0x0F;
    /// Lowest levels: can only touch elements created at level zero.
    pub const MIN: AccessLevels = AccessLevels { read: 0, write: 0 };
    /// Highest levels: can touch every element.
    pub const MAX: AccessLevels = AccessLevels {
        read: Self::MAX_LEVEL,
        write: Self::MAX_LEVEL,
    };

    /// Builds levels, clamping each to [`AccessLevels::MAX_LEVEL`].
    pub const fn new(read: u8, write: u8) -> Self {
        let read = if read > Self::MAX_LEVEL { Self::MAX_LEVEL } else { read };
        let write = if write > Self::MAX_LEVEL { Self::MAX_LEVEL } else { write };
        Self { read, write }
    }

    /// Read level.
    pub const fn read(self) -> u8 {
        self.read
    }

    /// Write level.
    pub const fn write(self) -> u8 {
        self.write
    }

    /// `(read << 4) | write`.
    pub const fn to_packed(self) -> u8 {
        (self.read << 4) | self.write
    }

    /// Inverse of [`AccessLevels::to_packed`].
    pub const fn from_packed(raw: u8) -> Self {
        Self {
            read: raw >> 4,
            write: raw & 0x0F,
        }
    }

    /// True when `self` may read an element protected by `element`.
    pub const fn can_read(self, element: AccessLevels) -> bool {
        self.read >= element.read
    }

    /// True when `self` may write an element protected by `element`.
    pub const fn can_write(self, element: AccessLevels) -> bool {
        self.write >= element.write
    }
}

impl fmt::Display for AccessLevels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}w{}", self.read, self.write)
    }
}
