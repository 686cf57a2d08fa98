use tracing::trace;

use crate::error::{ScError, ScResult};
use crate::iterator::IterParam;
use crate::storage::element::Direction;
use crate::storage::{ring_next, ScStorage};
use crate::types::{AccessLevels, ScAddr, ScType};

/// Which positions of a 3-tuple pattern are fixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Iter3Pattern {
    /// Fixed source; walks its outgoing ring.
    FixedAnyAny,
    /// Fixed target; walks its incoming ring.
    AnyAnyFixed,
    /// Fixed source and target; walks the source's outgoing ring.
    FixedAnyFixed,
    /// Fixed connector.
    AnyFixedAny,
    /// Fixed source and connector.
    FixedFixedAny,
    /// Fixed connector and target.
    AnyFixedFixed,
    /// Everything fixed; checks a single triple.
    FixedFixedFixed,
}

impl Iter3Pattern {
    /// Classifies `params`; fails when nothing is fixed.
    pub fn of(params: &[IterParam; 3]) -> ScResult<Self> {
        let fixed = (params[0].is_fixed(), params[1].is_fixed(), params[2].is_fixed());
        Ok(match fixed {
            (true, false, false) => Iter3Pattern::FixedAnyAny,
            (false, false, true) => Iter3Pattern::AnyAnyFixed,
            (true, false, true) => Iter3Pattern::FixedAnyFixed,
            (false, true, false) => Iter3Pattern::AnyFixedAny,
            (true, true, false) => Iter3Pattern::FixedFixedAny,
            (false, true, true) => Iter3Pattern::AnyFixedFixed,
            (true, true, true) => Iter3Pattern::FixedFixedFixed,
            (false, false, false) => {
                return Err(ScError::InvalidParams("iterator pattern needs a fixed position"))
            }
        })
    }

    /// Conventional short name, `f` for fixed and `a` for any.
    pub fn name(self) -> &'static str {
        match self {
            Iter3Pattern::FixedAnyAny => "f_a_a",
            Iter3Pattern::AnyAnyFixed => "a_a_f",
            Iter3Pattern::FixedAnyFixed => "f_a_f",
            Iter3Pattern::AnyFixedAny => "a_f_a",
            Iter3Pattern::FixedFixedAny => "f_f_a",
            Iter3Pattern::AnyFixedFixed => "a_f_f",
            Iter3Pattern::FixedFixedFixed => "f_f_f",
        }
    }

    fn walks_ring(self) -> bool {
        matches!(
            self,
            Iter3Pattern::FixedAnyAny | Iter3Pattern::AnyAnyFixed | Iter3Pattern::FixedAnyFixed
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cursor {
    Start,
    At(ScAddr),
    Done,
}

/// Iterator over `(source, connector, target)` triples.
///
/// Ring patterns hold the anchor's monitor shared only for the duration of
/// one [`ScIterator3::next`] call. A connector erased between two calls ends
/// the walk; callers that erase while iterating should start a new iterator
/// afterwards. Undirected edges are reported from whichever endpoint the walk
/// is anchored at, so the same edge may appear with source and target swapped.
pub struct ScIterator3<'s> {
    storage: &'s ScStorage,
    pattern: Iter3Pattern,
    params: [IterParam; 3],
    levels: AccessLevels,
    cursor: Cursor,
    results: [ScAddr; 3],
}

impl<'s> ScIterator3<'s> {
    /// Creates an iterator reading with `levels`.
    ///
    /// Fails with `InvalidParams` when no position is fixed. A fixed address
    /// that is not live yields an iterator that is already exhausted.
    pub fn new(
        storage: &'s ScStorage,
        p1: impl Into<IterParam>,
        p2: impl Into<IterParam>,
        p3: impl Into<IterParam>,
        levels: AccessLevels,
    ) -> ScResult<Self> {
        let params = [p1.into(), p2.into(), p3.into()];
        let pattern = Iter3Pattern::of(&params)?;
        trace!(pattern = pattern.name(), "iterator3 created");
        Ok(Self {
            storage,
            pattern,
            params,
            levels,
            cursor: Cursor::Start,
            results: [ScAddr::EMPTY; 3],
        })
    }

    /// Outgoing connectors of `source`.
    pub fn f_a_a(
        storage: &'s ScStorage,
        source: ScAddr,
        connector: ScType,
        target: ScType,
        levels: AccessLevels,
    ) -> Self {
        Self::with_pattern(
            storage,
            Iter3Pattern::FixedAnyAny,
            [source.into(), connector.into(), target.into()],
            levels,
        )
    }

    /// Incoming connectors of `target`.
    pub fn a_a_f(
        storage: &'s ScStorage,
        source: ScType,
        connector: ScType,
        target: ScAddr,
        levels: AccessLevels,
    ) -> Self {
        Self::with_pattern(
            storage,
            Iter3Pattern::AnyAnyFixed,
            [source.into(), connector.into(), target.into()],
            levels,
        )
    }

    /// Connectors from `source` to `target`.
    pub fn f_a_f(
        storage: &'s ScStorage,
        source: ScAddr,
        connector: ScType,
        target: ScAddr,
        levels: AccessLevels,
    ) -> Self {
        Self::with_pattern(
            storage,
            Iter3Pattern::FixedAnyFixed,
            [source.into(), connector.into(), target.into()],
            levels,
        )
    }

    pub(crate) fn with_pattern(
        storage: &'s ScStorage,
        pattern: Iter3Pattern,
        params: [IterParam; 3],
        levels: AccessLevels,
    ) -> Self {
        Self {
            storage,
            pattern,
            params,
            levels,
            cursor: Cursor::Start,
            results: [ScAddr::EMPTY; 3],
        }
    }

    /// Pattern this iterator was built for.
    pub fn pattern(&self) -> Iter3Pattern {
        self.pattern
    }

    /// Address at position `idx` of the current triple.
    ///
    /// Positions are `0` source, `1` connector, `2` target. Returns the empty
    /// address before the first and after the last result.
    pub fn get(&self, idx: usize) -> ScResult<ScAddr> {
        self.results
            .get(idx)
            .copied()
            .ok_or(ScError::InvalidParams("iterator3 position out of range"))
    }

    /// Current triple.
    pub fn results(&self) -> [ScAddr; 3] {
        self.results
    }

    /// Advances to the next matching triple; false once exhausted.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        match self.cursor {
            Cursor::Done => false,
            _ if self.pattern.walks_ring() => self.next_in_ring(),
            _ => self.next_single(),
        }
    }

    /// Consumes the iterator into a std iterator of triples.
    pub fn triples(self) -> Triples<'s> {
        Triples { inner: self }
    }

    fn finish(&mut self) -> bool {
        self.cursor = Cursor::Done;
        self.results = [ScAddr::EMPTY; 3];
        false
    }

    fn readable(&self, addr: ScAddr) -> Option<ScType> {
        self.storage
            .segments()
            .read(addr, |el| self.levels.can_read(el.access).then_some(el.ty))
            .ok()
            .flatten()
    }

    fn next_in_ring(&mut self) -> bool {
        let (anchor, dir) = match self.pattern {
            Iter3Pattern::AnyAnyFixed => (self.params[2], Direction::Incoming),
            _ => (self.params[0], Direction::Outgoing),
        };
        let Some(anchor) = anchor.fixed() else {
            return self.finish();
        };
        let partner = match self.pattern {
            Iter3Pattern::FixedAnyFixed => self.params[2].fixed(),
            _ => None,
        };

        let storage = self.storage;
        let segments = storage.segments();
        let _guard = match partner {
            Some(partner) => storage.monitors().read_n(&[anchor, partner]),
            None => storage.monitors().read(anchor),
        };

        let mut candidate = match self.cursor {
            Cursor::Start => {
                if self.readable(anchor).is_none() {
                    return self.finish();
                }
                match segments.read(anchor, |el| el.head(dir)) {
                    Ok(head) if !head.is_empty() => head,
                    _ => return self.finish(),
                }
            }
            Cursor::At(current) => match ring_next(segments, current, anchor, dir) {
                Ok(Some(next)) => next,
                _ => return self.finish(),
            },
            Cursor::Done => return false,
        };

        loop {
            storage.metrics().ring_scan(dir);
            self.cursor = Cursor::At(candidate);
            if let Some(other) = self.match_candidate(candidate, anchor) {
                self.results = match dir {
                    Direction::Outgoing => [anchor, candidate, other],
                    Direction::Incoming => [other, candidate, anchor],
                };
                return true;
            }
            candidate = match ring_next(segments, candidate, anchor, dir) {
                Ok(Some(next)) => next,
                _ => return self.finish(),
            };
        }
    }

    /// Opposite endpoint of `conn` when the connector and that endpoint fit.
    fn match_candidate(&self, conn: ScAddr, anchor: ScAddr) -> Option<ScAddr> {
        let (conn_ty, other) = self
            .storage
            .segments()
            .read(conn, |el| {
                self.levels
                    .can_read(el.access)
                    .then(|| el.other_endpoint(anchor).map(|other| (el.ty, other)))
                    .flatten()
            })
            .ok()
            .flatten()?;
        if !self.params[1].accepts(conn, conn_ty) {
            return None;
        }
        let other_param = match self.pattern {
            Iter3Pattern::AnyAnyFixed => self.params[0],
            _ => self.params[2],
        };
        let other_ty = self.readable(other)?;
        other_param.accepts(other, other_ty).then_some(other)
    }

    fn next_single(&mut self) -> bool {
        if self.cursor != Cursor::Start {
            return self.finish();
        }
        let Some(conn) = self.params[1].fixed() else {
            return self.finish();
        };
        let storage = self.storage;
        let _guard = storage.monitors().read(conn);
        let Ok(Some((ty, begin, end))) = storage.segments().read(conn, |el| {
            el.endpoints().map(|(begin, end)| (el.ty, begin, end))
        }) else {
            return self.finish();
        };
        if self.readable(conn).is_none() {
            return self.finish();
        }

        let undirected = ty.is_common_edge();
        let fixed_source = self.params[0].fixed();
        let fixed_target = self.params[2].fixed();
        let oriented = [(begin, end), (end, begin)]
            .into_iter()
            .take(if undirected { 2 } else { 1 })
            .find(|(source, target)| {
                fixed_source.map_or(true, |f| f == *source)
                    && fixed_target.map_or(true, |f| f == *target)
            });
        let Some((source, target)) = oriented else {
            return self.finish();
        };

        let fits = |param: IterParam, addr: ScAddr| {
            self.readable(addr)
                .is_some_and(|ty| param.accepts(addr, ty))
        };
        if !fits(self.params[0], source) || !fits(self.params[2], target) {
            return self.finish();
        }
        self.cursor = Cursor::At(conn);
        self.results = [source, conn, target];
        true
    }
}

/// Std iterator adapter returned by [`ScIterator3::triples`].
pub struct Triples<'s> {
    inner: ScIterator3<'s>,
}

impl Iterator for Triples<'_> {
    type Item = [ScAddr; 3];

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().then(|| self.inner.results())
    }
}
