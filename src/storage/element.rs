//! Fixed-size element records stored in segment slots.
//!
//! Every element heads two circular incident lists (outgoing and incoming).
//! The lists are threaded through the connectors themselves: a connector
//! carries one [`RingLink`] per list it belongs to. Directed connectors sit in
//! `begin`'s outgoing ring and `end`'s incoming ring. Undirected edges between
//! two distinct endpoints also sit in `end`'s outgoing ring and `begin`'s
//! incoming ring through their reverse links. A ring is only ever modified
//! while the owner's monitor is held exclusively.

use serde::Serialize;

use crate::types::{AccessLevels, ScAddr, ScType};

/// Element is being erased; no new connector may attach to it.
pub(crate) const FLAG_ERASING: u8 = 0x01;

/// Direction of an incident list.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize)]
pub enum Direction {
    /// Connectors leaving the element.
    Outgoing,
    /// Connectors entering the element.
    Incoming,
}

impl Direction {
    /// Both directions, outgoing first.
    pub const BOTH: [Direction; 2] = [Direction::Outgoing, Direction::Incoming];

    /// Short label used in logs and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Outgoing => "out",
            Direction::Incoming => "in",
        }
    }
}

/// Coarse element category used by statistics and metrics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize)]
pub enum ElementKind {
    /// Plain node.
    Node,
    /// Node with content.
    Link,
    /// Arc or edge.
    Connector,
}

impl ElementKind {
    /// Category of a live element type.
    pub fn of(ty: ScType) -> Self {
        if ty.is_connector() {
            ElementKind::Connector
        } else if ty.is_link() {
            ElementKind::Link
        } else {
            ElementKind::Node
        }
    }
}

/// Neighbour pointers of one connector inside one ring.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub(crate) struct RingLink {
    pub prev: ScAddr,
    pub next: ScAddr,
}

impl RingLink {
    pub(crate) const fn single(addr: ScAddr) -> Self {
        Self {
            prev: addr,
            next: addr,
        }
    }
}

/// Connector-only part of a record.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub(crate) struct ConnectorRecord {
    pub begin: ScAddr,
    pub end: ScAddr,
    pub out_link: RingLink,
    pub in_link: RingLink,
    pub rev_out_link: RingLink,
    pub rev_in_link: RingLink,
}

/// Live element record.
#[derive(Clone, Debug)]
pub(crate) struct Element {
    pub ty: ScType,
    pub flags: u8,
    pub access: AccessLevels,
    pub first_out: ScAddr,
    pub first_in: ScAddr,
    pub out_count: u32,
    pub in_count: u32,
    pub connector: Option<ConnectorRecord>,
}

impl Element {
    pub(crate) fn node(ty: ScType, access: AccessLevels) -> Self {
        Self {
            ty,
            flags: 0,
            access,
            first_out: ScAddr::EMPTY,
            first_in: ScAddr::EMPTY,
            out_count: 0,
            in_count: 0,
            connector: None,
        }
    }

    pub(crate) fn connector(ty: ScType, access: AccessLevels, begin: ScAddr, end: ScAddr) -> Self {
        Self {
            connector: Some(ConnectorRecord {
                begin,
                end,
                ..ConnectorRecord::default()
            }),
            ..Self::node(ty, access)
        }
    }

    pub(crate) fn is_erasing(&self) -> bool {
        self.flags & FLAG_ERASING != 0
    }

    pub(crate) fn head(&self, dir: Direction) -> ScAddr {
        match dir {
            Direction::Outgoing => self.first_out,
            Direction::Incoming => self.first_in,
        }
    }

    pub(crate) fn set_head(&mut self, dir: Direction, head: ScAddr) {
        match dir {
            Direction::Outgoing => self.first_out = head,
            Direction::Incoming => self.first_in = head,
        }
    }

    pub(crate) fn count(&self, dir: Direction) -> u32 {
        match dir {
            Direction::Outgoing => self.out_count,
            Direction::Incoming => self.in_count,
        }
    }

    pub(crate) fn count_mut(&mut self, dir: Direction) -> &mut u32 {
        match dir {
            Direction::Outgoing => &mut self.out_count,
            Direction::Incoming => &mut self.in_count,
        }
    }

    pub(crate) fn has_incident(&self) -> bool {
        !self.first_out.is_empty() || !self.first_in.is_empty()
    }

    pub(crate) fn endpoints(&self) -> Option<(ScAddr, ScAddr)> {
        self.connector.as_ref().map(|c| (c.begin, c.end))
    }

    /// Endpoint opposite to `owner`; `None` for nodes or unrelated owners.
    pub(crate) fn other_endpoint(&self, owner: ScAddr) -> Option<ScAddr> {
        let c = self.connector.as_ref()?;
        if c.begin == owner {
            Some(c.end)
        } else if c.end == owner {
            Some(c.begin)
        } else {
            None
        }
    }

    /// Link this connector uses inside `owner`'s `dir` ring.
    ///
    /// Returns `None` when the connector does not belong to that ring.
    pub(crate) fn ring_link(&self, owner: ScAddr, dir: Direction) -> Option<RingLink> {
        let undirected = self.ty.is_common_edge();
        let c = self.connector.as_ref()?;
        match dir {
            Direction::Outgoing if c.begin == owner => Some(c.out_link),
            Direction::Outgoing if undirected && c.end == owner => Some(c.rev_out_link),
            Direction::Incoming if c.end == owner => Some(c.in_link),
            Direction::Incoming if undirected && c.begin == owner => Some(c.rev_in_link),
            _ => None,
        }
    }

    pub(crate) fn ring_link_mut(&mut self, owner: ScAddr, dir: Direction) -> Option<&mut RingLink> {
        let undirected = self.ty.is_common_edge();
        let c = self.connector.as_mut()?;
        match dir {
            Direction::Outgoing if c.begin == owner => Some(&mut c.out_link),
            Direction::Outgoing if undirected && c.end == owner => Some(&mut c.rev_out_link),
            Direction::Incoming if c.end == owner => Some(&mut c.in_link),
            Direction::Incoming if undirected && c.begin == owner => Some(&mut c.rev_in_link),
            _ => None,
        }
    }

    /// Number of ring entries a connector of this shape must occupy.
    pub(crate) fn expected_ring_entries(&self) -> u64 {
        match self.connector {
            None => 0,
            Some(c) if self.ty.is_common_edge() && c.begin != c.end => 4,
            Some(_) => 2,
        }
    }
}

/// Content of one slot.
#[derive(Clone, Debug)]
pub(crate) enum Slot {
    /// Free slot; `next_free` chains released offsets (0 terminates).
    Empty { next_free: u16 },
    Live(Element),
}
