//! Access-scoped handles to a memory instance.

use tracing::trace;

use crate::error::{ScError, ScResult};
use crate::iterator::{IterParam, ScIterator3, ScIterator5};
use crate::memory::ScMemory;
use crate::storage::{merge_subtype, IncidenceReport, ScStat, ScStorage};
use crate::transaction::{ElementSnapshot, Transaction, TransactionState};
use crate::types::{AccessLevels, ScAddr, ScType};

/// Entry point for every element operation.
///
/// A context carries the access levels of its caller. Elements it creates get
/// those levels; reads require `context.read >= element.read` and writes
/// require `context.write >= element.write`.
#[derive(Clone, Copy)]
pub struct ScMemoryContext<'m> {
    memory: &'m ScMemory,
    levels: AccessLevels,
}

impl<'m> ScMemoryContext<'m> {
    pub(crate) fn new(memory: &'m ScMemory, levels: AccessLevels) -> Self {
        Self { memory, levels }
    }

    /// Memory this context operates on.
    pub fn memory(&self) -> &'m ScMemory {
        self.memory
    }

    /// Levels of this context.
    pub fn access_levels(&self) -> AccessLevels {
        self.levels
    }

    fn storage(&self) -> &'m ScStorage {
        self.memory.storage()
    }

    fn check_read(&self, addr: ScAddr) -> ScResult<()> {
        let access = self.storage().element_access(addr)?;
        if self.levels.can_read(access) {
            Ok(())
        } else {
            Err(ScError::NoReadRights)
        }
    }

    pub(crate) fn check_write(&self, addr: ScAddr) -> ScResult<()> {
        let access = self.storage().element_access(addr)?;
        if self.levels.can_write(access) {
            Ok(())
        } else {
            Err(ScError::NoWriteRights)
        }
    }

    fn readable(&self, addr: ScAddr) -> bool {
        self.storage()
            .element_access(addr)
            .is_ok_and(|access| self.levels.can_read(access))
    }

    /// Creates a node.
    pub fn node_new(&self, ty: ScType) -> ScResult<ScAddr> {
        self.storage().node_new(ty, self.levels)
    }

    /// Creates a link without content.
    pub fn link_new(&self, ty: ScType) -> ScResult<ScAddr> {
        self.storage().link_new(ty, self.levels)
    }

    /// Creates a connector from `begin` to `end`.
    pub fn connector_new(&self, ty: ScType, begin: ScAddr, end: ScAddr) -> ScResult<ScAddr> {
        if begin.is_empty() || end.is_empty() {
            return Err(ScError::InvalidParams("connector endpoints must not be empty"));
        }
        self.check_write(begin)?;
        self.check_write(end)?;
        self.storage().connector_new(ty, begin, end, self.levels)
    }

    /// Erases `addr` and, recursively, every connector attached to it.
    pub fn erase_element(&self, addr: ScAddr) -> ScResult<Vec<ScAddr>> {
        if addr.is_empty() {
            return Err(ScError::InvalidParams("empty address"));
        }
        self.check_write(addr)?;
        self.storage().erase_element(addr)
    }

    /// True when `addr` denotes a live element.
    pub fn is_element(&self, addr: ScAddr) -> bool {
        self.storage().is_element(addr)
    }

    /// Type of `addr`.
    pub fn element_type(&self, addr: ScAddr) -> ScResult<ScType> {
        self.check_read(addr)?;
        self.storage().element_type(addr)
    }

    /// Narrows the type of `addr`.
    pub fn set_element_subtype(&self, addr: ScAddr, ty: ScType) -> ScResult<()> {
        self.check_write(addr)?;
        self.storage().set_element_subtype(addr, ty)
    }

    /// Access levels of `addr`.
    pub fn element_access(&self, addr: ScAddr) -> ScResult<AccessLevels> {
        self.check_read(addr)?;
        self.storage().element_access(addr)
    }

    /// Replaces the access levels of `addr`.
    pub fn set_element_access(&self, addr: ScAddr, access: AccessLevels) -> ScResult<()> {
        self.check_write(addr)?;
        self.storage().set_element_access(addr, access)
    }

    /// `(begin, end)` of a connector.
    pub fn connector_endpoints(&self, addr: ScAddr) -> ScResult<(ScAddr, ScAddr)> {
        self.check_read(addr)?;
        self.storage().connector_endpoints(addr)
    }

    /// Begin of a connector.
    pub fn connector_begin(&self, addr: ScAddr) -> ScResult<ScAddr> {
        self.connector_endpoints(addr).map(|(begin, _)| begin)
    }

    /// End of a connector.
    pub fn connector_end(&self, addr: ScAddr) -> ScResult<ScAddr> {
        self.connector_endpoints(addr).map(|(_, end)| end)
    }

    /// Length of the outgoing ring of `addr`.
    pub fn outgoing_arcs_count(&self, addr: ScAddr) -> ScResult<u32> {
        self.check_read(addr)?;
        self.storage().outgoing_count(addr)
    }

    /// Length of the incoming ring of `addr`.
    pub fn incoming_arcs_count(&self, addr: ScAddr) -> ScResult<u32> {
        self.check_read(addr)?;
        self.storage().incoming_count(addr)
    }

    /// Replaces the content of a link.
    pub fn set_link_content(&self, addr: ScAddr, bytes: impl AsRef<[u8]>) -> ScResult<()> {
        self.check_write(addr)?;
        self.storage().set_link_content(addr, bytes.as_ref())
    }

    /// Content of a link, `None` if never set.
    pub fn link_content(&self, addr: ScAddr) -> ScResult<Option<Vec<u8>>> {
        self.check_read(addr)?;
        self.storage().link_content(addr)
    }

    /// Content of a link decoded as UTF-8, lossily.
    pub fn link_content_string(&self, addr: ScAddr) -> ScResult<Option<String>> {
        Ok(self
            .link_content(addr)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Readable links whose content equals `bytes`.
    pub fn find_links_with_content(&self, bytes: impl AsRef<[u8]>) -> Vec<ScAddr> {
        let mut found = self.storage().find_links_with_content(bytes.as_ref());
        found.retain(|addr| self.readable(*addr));
        found
    }

    /// Readable links whose content contains `needle`.
    pub fn find_links_by_content_substring(&self, needle: impl AsRef<[u8]>) -> Vec<ScAddr> {
        let mut found = self.storage().find_links_by_content_substring(needle.as_ref());
        found.retain(|addr| self.readable(*addr));
        found
    }

    /// Distinct contents containing `needle`.
    pub fn find_link_contents_by_substring(&self, needle: impl AsRef<[u8]>) -> Vec<Vec<u8>> {
        self.storage()
            .find_link_contents_by_substring(needle.as_ref())
    }

    /// 3-tuple iterator over `(p1, p2, p3)`.
    pub fn iterator3(
        &self,
        p1: impl Into<IterParam>,
        p2: impl Into<IterParam>,
        p3: impl Into<IterParam>,
    ) -> ScResult<ScIterator3<'m>> {
        ScIterator3::new(self.storage(), p1, p2, p3, self.levels)
    }

    /// 5-tuple iterator over `(p1, p2, p3, p4, p5)`.
    pub fn iterator5(
        &self,
        p1: impl Into<IterParam>,
        p2: impl Into<IterParam>,
        p3: impl Into<IterParam>,
        p4: impl Into<IterParam>,
        p5: impl Into<IterParam>,
    ) -> ScResult<ScIterator5<'m>> {
        ScIterator5::new(
            self.storage(),
            [p1.into(), p2.into(), p3.into(), p4.into(), p5.into()],
            self.levels,
        )
    }

    /// Element counts of the memory.
    pub fn stat(&self) -> ScStat {
        self.storage().stat()
    }

    /// Full incidence check of the memory.
    pub fn validate_incidence(&self) -> IncidenceReport {
        self.storage().validate_incidence()
    }

    /// Opens a transaction bound to this context.
    pub fn begin_transaction(&self) -> ScTransaction<'_, 'm> {
        let txn = self.memory.transactions().begin();
        trace!(txn = txn.id(), "transaction opened");
        ScTransaction { ctx: self, txn }
    }
}

/// Transaction bound to a context.
///
/// Creations and erasures apply immediately and are recorded. Subtype,
/// access and content changes are staged until [`ScTransaction::commit`];
/// reads through the transaction see its own staged changes.
pub struct ScTransaction<'c, 'm> {
    ctx: &'c ScMemoryContext<'m>,
    txn: Transaction<'m>,
}

impl<'c, 'm> ScTransaction<'c, 'm> {
    /// Transaction id.
    pub fn id(&self) -> u64 {
        self.txn.id()
    }

    /// Current state.
    pub fn state(&self) -> TransactionState {
        self.txn.state()
    }

    /// Underlying transaction and its staging lists.
    pub fn inner(&self) -> &Transaction<'m> {
        &self.txn
    }

    /// Creates a node and records it.
    pub fn node_new(&mut self, ty: ScType) -> ScResult<ScAddr> {
        self.txn.ensure_open()?;
        let addr = self.ctx.node_new(ty)?;
        self.txn.buffer_mut()?.record_created(addr);
        Ok(addr)
    }

    /// Creates a link and records it.
    pub fn link_new(&mut self, ty: ScType) -> ScResult<ScAddr> {
        self.txn.ensure_open()?;
        let addr = self.ctx.link_new(ty)?;
        self.txn.buffer_mut()?.record_created(addr);
        Ok(addr)
    }

    /// Creates a connector and records it.
    pub fn connector_new(&mut self, ty: ScType, begin: ScAddr, end: ScAddr) -> ScResult<ScAddr> {
        self.txn.ensure_open()?;
        let addr = self.ctx.connector_new(ty, begin, end)?;
        self.txn.buffer_mut()?.record_created(addr);
        Ok(addr)
    }

    /// Erases `addr` with its cascade and records every erased address.
    pub fn erase_element(&mut self, addr: ScAddr) -> ScResult<Vec<ScAddr>> {
        self.txn.ensure_open()?;
        let erased = self.ctx.erase_element(addr)?;
        let buffer = self.txn.buffer_mut()?;
        for removed in &erased {
            buffer.record_removed(*removed);
        }
        Ok(erased)
    }

    fn snapshot(&self, addr: ScAddr) -> ElementSnapshot {
        self.txn.buffer().staged_snapshot(addr).unwrap_or_default()
    }

    /// Type of `addr` including staged narrowing.
    pub fn element_type(&self, addr: ScAddr) -> ScResult<ScType> {
        let stored = self.ctx.element_type(addr)?;
        Ok(self.snapshot(addr).ty.unwrap_or(stored))
    }

    /// Stages a subtype change, checked against the staged type.
    pub fn set_element_subtype(&mut self, addr: ScAddr, ty: ScType) -> ScResult<()> {
        self.ctx.check_write(addr)?;
        let merged = merge_subtype(self.element_type(addr)?, ty)?;
        let snapshot = ElementSnapshot {
            ty: Some(merged),
            ..self.snapshot(addr)
        };
        self.txn.buffer_mut()?.record_modified(addr, snapshot);
        Ok(())
    }

    /// Access levels of `addr` including staged changes.
    pub fn element_access(&self, addr: ScAddr) -> ScResult<AccessLevels> {
        let stored = self.ctx.element_access(addr)?;
        Ok(self.snapshot(addr).access.unwrap_or(stored))
    }

    /// Stages new access levels.
    pub fn set_element_access(&mut self, addr: ScAddr, access: AccessLevels) -> ScResult<()> {
        self.ctx.check_write(addr)?;
        let snapshot = ElementSnapshot {
            access: Some(access),
            ..self.snapshot(addr)
        };
        self.txn.buffer_mut()?.record_modified(addr, snapshot);
        Ok(())
    }

    /// Stages new link content.
    pub fn set_link_content(&mut self, addr: ScAddr, bytes: impl AsRef<[u8]>) -> ScResult<()> {
        self.ctx.check_write(addr)?;
        if !self.ctx.storage().element_type(addr)?.is_link() {
            return Err(ScError::InvalidType("element is not a link"));
        }
        self.txn.buffer_mut()?.record_content(addr, bytes.as_ref());
        Ok(())
    }

    /// Link content including staged content.
    pub fn link_content(&self, addr: ScAddr) -> ScResult<Option<Vec<u8>>> {
        let stored = self.ctx.link_content(addr)?;
        Ok(match self.txn.buffer().staged_content(addr) {
            Some(staged) => Some(staged.to_vec()),
            None => stored,
        })
    }

    /// Applies every staged change.
    pub fn commit(&mut self) -> ScResult<()> {
        self.txn.commit(self.ctx.storage())
    }

    /// Discards staged changes. Elements created through this transaction
    /// stay allocated; erase them explicitly if they must not survive.
    pub fn rollback(&mut self) -> ScResult<()> {
        self.txn.rollback()
    }

    /// Releases the transaction, rolling it back if still open.
    pub fn destroy(self) {
        self.txn.destroy();
    }
}
