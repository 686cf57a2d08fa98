use crate::error::{ScError, ScResult};
use crate::iterator::{Iter3Pattern, IterParam, ScIterator3};
use crate::storage::ScStorage;
use crate::types::{AccessLevels, ScAddr, ScType};

/// Iterator over `(source, connector, target, attr_arc, attr_node)` tuples.
///
/// The first three positions form the main triple. For every main triple the
/// attribute triple `attr_node -> attr_arc -> connector` is walked over the
/// main connector's incoming ring, so a relation node attributes the
/// connector it points at.
pub struct ScIterator5<'s> {
    storage: &'s ScStorage,
    main: ScIterator3<'s>,
    attr: Option<ScIterator3<'s>>,
    attr_pattern: Iter3Pattern,
    attr_arc: IterParam,
    attr_node: IterParam,
    levels: AccessLevels,
    done: bool,
    results: [ScAddr; 5],
}

impl<'s> ScIterator5<'s> {
    /// Creates an iterator; the main triple must have a fixed position.
    pub fn new(
        storage: &'s ScStorage,
        params: [IterParam; 5],
        levels: AccessLevels,
    ) -> ScResult<Self> {
        let [p1, p2, p3, p4, p5] = params;
        let main = ScIterator3::new(storage, p1, p2, p3, levels)?;
        if p4.fixed().is_some_and(|a| a.is_empty()) || p5.fixed().is_some_and(|a| a.is_empty()) {
            return Err(ScError::InvalidParams("attribute positions must not be empty"));
        }
        // The main connector always fills the last attribute position.
        let attr_pattern = Iter3Pattern::of(&[p5, p4, IterParam::Fixed(ScAddr::EMPTY)])?;
        Ok(Self {
            storage,
            main,
            attr: None,
            attr_pattern,
            attr_arc: p4,
            attr_node: p5,
            levels,
            done: false,
            results: [ScAddr::EMPTY; 5],
        })
    }

    /// Outgoing connectors of `source` attributed by `attr_node`.
    pub fn f_a_a_a_f(
        storage: &'s ScStorage,
        source: ScAddr,
        connector: ScType,
        target: ScType,
        attr_arc: ScType,
        attr_node: ScAddr,
        levels: AccessLevels,
    ) -> ScResult<Self> {
        Self::new(
            storage,
            [source.into(), connector.into(), target.into(), attr_arc.into(), attr_node.into()],
            levels,
        )
    }

    /// Incoming connectors of `target` attributed by `attr_node`.
    pub fn a_a_f_a_f(
        storage: &'s ScStorage,
        source: ScType,
        connector: ScType,
        target: ScAddr,
        attr_arc: ScType,
        attr_node: ScAddr,
        levels: AccessLevels,
    ) -> ScResult<Self> {
        Self::new(
            storage,
            [source.into(), connector.into(), target.into(), attr_arc.into(), attr_node.into()],
            levels,
        )
    }

    /// Connectors between `source` and `target` attributed by `attr_node`.
    pub fn f_a_f_a_f(
        storage: &'s ScStorage,
        source: ScAddr,
        connector: ScType,
        target: ScAddr,
        attr_arc: ScType,
        attr_node: ScAddr,
        levels: AccessLevels,
    ) -> ScResult<Self> {
        Self::new(
            storage,
            [source.into(), connector.into(), target.into(), attr_arc.into(), attr_node.into()],
            levels,
        )
    }

    /// Connectors between `source` and `target` with any attribute.
    pub fn f_a_f_a_a(
        storage: &'s ScStorage,
        source: ScAddr,
        connector: ScType,
        target: ScAddr,
        attr_arc: ScType,
        attr_node: ScType,
        levels: AccessLevels,
    ) -> ScResult<Self> {
        Self::new(
            storage,
            [source.into(), connector.into(), target.into(), attr_arc.into(), attr_node.into()],
            levels,
        )
    }

    /// Outgoing connectors of `source` with any attribute.
    pub fn f_a_a_a_a(
        storage: &'s ScStorage,
        source: ScAddr,
        connector: ScType,
        target: ScType,
        attr_arc: ScType,
        attr_node: ScType,
        levels: AccessLevels,
    ) -> ScResult<Self> {
        Self::new(
            storage,
            [source.into(), connector.into(), target.into(), attr_arc.into(), attr_node.into()],
            levels,
        )
    }

    /// Incoming connectors of `target` with any attribute.
    pub fn a_a_f_a_a(
        storage: &'s ScStorage,
        source: ScType,
        connector: ScType,
        target: ScAddr,
        attr_arc: ScType,
        attr_node: ScType,
        levels: AccessLevels,
    ) -> ScResult<Self> {
        Self::new(
            storage,
            [source.into(), connector.into(), target.into(), attr_arc.into(), attr_node.into()],
            levels,
        )
    }

    /// Address at position `idx` of the current tuple.
    ///
    /// Positions `0..=2` are the main triple, `3` the attribute arc and `4`
    /// the attribute node.
    pub fn get(&self, idx: usize) -> ScResult<ScAddr> {
        self.results
            .get(idx)
            .copied()
            .ok_or(ScError::InvalidParams("iterator5 position out of range"))
    }

    /// Current tuple.
    pub fn results(&self) -> [ScAddr; 5] {
        self.results
    }

    /// Advances to the next matching tuple; false once exhausted.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        if self.done {
            return false;
        }
        loop {
            if let Some(attr) = self.attr.as_mut() {
                if attr.next() {
                    let main = self.main.results();
                    let attr = attr.results();
                    self.results = [main[0], main[1], main[2], attr[1], attr[0]];
                    return true;
                }
                self.attr = None;
            }
            if !self.main.next() {
                self.done = true;
                self.results = [ScAddr::EMPTY; 5];
                return false;
            }
            let connector = self.main.results()[1];
            self.attr = Some(ScIterator3::with_pattern(
                self.storage,
                self.attr_pattern,
                [self.attr_node, self.attr_arc, connector.into()],
                self.levels,
            ));
        }
    }

    /// Consumes the iterator into a std iterator of tuples.
    pub fn quintuples(self) -> Quintuples<'s> {
        Quintuples { inner: self }
    }
}

/// Std iterator adapter returned by [`ScIterator5::quintuples`].
pub struct Quintuples<'s> {
    inner: ScIterator5<'s>,
}

impl Iterator for Quintuples<'_> {
    type Item = [ScAddr; 5];

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().then(|| self.inner.results())
    }
}
