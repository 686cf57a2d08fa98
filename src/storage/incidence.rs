//! Splicing connectors into and out of incident rings.
//!
//! Callers must hold the owner's monitor exclusively for [`make_incident`]
//! and [`remove_incident`], and at least shared for [`walk_ring`]. Under that
//! discipline every ring is observed in a consistent state.

use crate::error::{ScError, ScResult};
use crate::storage::element::{Direction, RingLink};
use crate::storage::segment::SegmentTable;
use crate::types::ScAddr;

fn link_of(
    segments: &SegmentTable,
    conn: ScAddr,
    owner: ScAddr,
    dir: Direction,
) -> ScResult<RingLink> {
    segments
        .read(conn, |el| el.ring_link(owner, dir))?
        .ok_or(ScError::Corruption("connector is not incident to ring owner"))
}

fn update_link(
    segments: &SegmentTable,
    conn: ScAddr,
    owner: ScAddr,
    dir: Direction,
    f: impl FnOnce(&mut RingLink),
) -> ScResult<()> {
    let found = segments.write(conn, |el| match el.ring_link_mut(owner, dir) {
        Some(link) => {
            f(link);
            true
        }
        None => false,
    })?;
    if found {
        Ok(())
    } else {
        Err(ScError::Corruption("connector is not incident to ring owner"))
    }
}

/// Inserts `conn` at the head of `owner`'s `dir` ring.
pub(crate) fn make_incident(
    segments: &SegmentTable,
    conn: ScAddr,
    owner: ScAddr,
    dir: Direction,
) -> ScResult<()> {
    let head = segments.read(owner, |el| el.head(dir))?;
    if head.is_empty() {
        update_link(segments, conn, owner, dir, |link| *link = RingLink::single(conn))?;
    } else {
        let tail = link_of(segments, head, owner, dir)?.prev;
        update_link(segments, conn, owner, dir, |link| {
            *link = RingLink {
                prev: tail,
                next: head,
            }
        })?;
        update_link(segments, tail, owner, dir, |link| link.next = conn)?;
        update_link(segments, head, owner, dir, |link| link.prev = conn)?;
    }
    segments.write(owner, |el| {
        el.set_head(dir, conn);
        *el.count_mut(dir) += 1;
    })
}

/// Unlinks `conn` from `owner`'s `dir` ring, clearing the head when it empties.
pub(crate) fn remove_incident(
    segments: &SegmentTable,
    conn: ScAddr,
    owner: ScAddr,
    dir: Direction,
) -> ScResult<()> {
    let link = link_of(segments, conn, owner, dir)?;
    let next_head = if link.next == conn {
        ScAddr::EMPTY
    } else {
        update_link(segments, link.prev, owner, dir, |l| l.next = link.next)?;
        update_link(segments, link.next, owner, dir, |l| l.prev = link.prev)?;
        link.next
    };
    update_link(segments, conn, owner, dir, |l| *l = RingLink::default())?;
    segments.write(owner, |el| {
        if el.head(dir) == conn {
            el.set_head(dir, next_head);
        }
        let count = el.count_mut(dir);
        *count = count.saturating_sub(1);
    })
}

/// Next connector after `conn` in `owner`'s ring, `None` once the walk wraps to the head.
///
/// Fails with `AddrNotValid` when `conn` was erased or no longer belongs to the ring.
pub(crate) fn ring_next(
    segments: &SegmentTable,
    conn: ScAddr,
    owner: ScAddr,
    dir: Direction,
) -> ScResult<Option<ScAddr>> {
    let next = segments
        .read(conn, |el| el.ring_link(owner, dir).map(|link| link.next))?
        .filter(|next| !next.is_empty())
        .ok_or(ScError::AddrNotValid(conn))?;
    let head = segments.read(owner, |el| el.head(dir))?;
    Ok((next != head).then_some(next))
}

/// Visits every connector of `owner`'s `dir` ring, head first.
///
/// The walk is bounded by the ring's recorded length so a damaged ring can
/// not loop forever.
pub(crate) fn walk_ring(
    segments: &SegmentTable,
    owner: ScAddr,
    dir: Direction,
    mut visit: impl FnMut(ScAddr),
) -> ScResult<()> {
    let (head, count) = segments.read(owner, |el| (el.head(dir), el.count(dir)))?;
    if head.is_empty() {
        return Ok(());
    }
    let mut cur = head;
    for _ in 0..count {
        visit(cur);
        cur = link_of(segments, cur, owner, dir)?.next;
        if cur == head {
            return Ok(());
        }
    }
    Err(ScError::Corruption("incident ring longer than its count"))
}
