//! Transaction ids, lifecycle and commit.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;
use tracing::debug;

use crate::error::{ScError, ScResult};
use crate::storage::{merge_subtype, ScStorage};
use crate::transaction::buffer::{ElementSnapshot, TransactionBuffer};
use crate::types::{ScAddr, ScType};

/// Lifecycle of one transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TransactionState {
    /// Nothing recorded yet.
    Created,
    /// At least one change recorded.
    Active,
    /// Staged changes are being applied.
    Committing,
    /// Terminal: staged changes were applied.
    Committed,
    /// Staged changes are being discarded.
    RollingBack,
    /// Terminal: staged changes were discarded.
    RolledBack,
}

impl TransactionState {
    /// True for `Committed` and `RolledBack`.
    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionState::Committed | TransactionState::RolledBack)
    }
}

/// Issues transaction ids and counts open transactions.
#[derive(Debug, Default)]
pub struct TransactionManager {
    next_id: AtomicU64,
    active: AtomicUsize,
}

impl TransactionManager {
    /// Manager whose first id is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a transaction with the next id.
    pub fn begin(&self) -> Transaction<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.active.fetch_add(1, Ordering::AcqRel);
        Transaction {
            id,
            state: TransactionState::Created,
            buffer: TransactionBuffer::new(),
            manager: self,
        }
    }

    /// Transactions opened and not yet finished.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }

    fn finish(&self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// One transaction: an id, a state and its staging buffer.
///
/// Dropping an unfinished transaction rolls it back.
#[derive(Debug)]
pub struct Transaction<'m> {
    id: u64,
    state: TransactionState,
    buffer: TransactionBuffer,
    manager: &'m TransactionManager,
}

enum Planned {
    Snapshot(ScAddr, Option<ScType>, ElementSnapshot),
    Content(ScAddr, usize),
}

impl<'m> Transaction<'m> {
    /// Monotonic id, unique per manager.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Staging lists.
    pub fn buffer(&self) -> &TransactionBuffer {
        &self.buffer
    }

    /// Fails with `InvalidState` once the transaction is finished.
    pub fn ensure_open(&self) -> ScResult<()> {
        if self.state.is_terminal() {
            Err(ScError::InvalidState("transaction is finished"))
        } else {
            Ok(())
        }
    }

    /// Mutable staging lists; moves a fresh transaction to `Active`.
    pub fn buffer_mut(&mut self) -> ScResult<&mut TransactionBuffer> {
        match self.state {
            TransactionState::Created => self.state = TransactionState::Active,
            TransactionState::Active => {}
            _ => return Err(ScError::InvalidState("transaction is finished")),
        }
        Ok(&mut self.buffer)
    }

    /// Applies every staged change to `storage`.
    ///
    /// All staged addresses are locked at once, validated, then written. When
    /// validation fails nothing is applied and the transaction stays `Active`
    /// so the caller may roll it back.
    pub fn commit(&mut self, storage: &ScStorage) -> ScResult<()> {
        if self.state.is_terminal() {
            return Err(ScError::InvalidState("transaction is finished"));
        }
        self.state = TransactionState::Committing;
        let addrs = self.buffer.staged_addrs();
        let result = {
            let _guard = storage.monitors().write_n(&addrs);
            self.validate(storage)
                .and_then(|plan| self.apply(storage, plan))
        };
        match result {
            Ok(()) => {
                debug!(
                    txn = self.id,
                    created = self.buffer.created().len(),
                    modified = self.buffer.modified().len(),
                    removed = self.buffer.removed().len(),
                    content = self.buffer.content_changes().len(),
                    "transaction committed"
                );
                self.buffer.clear();
                self.state = TransactionState::Committed;
                self.manager.finish();
                Ok(())
            }
            Err(err) => {
                debug!(txn = self.id, error = %err, "transaction commit refused");
                self.state = TransactionState::Active;
                Err(err)
            }
        }
    }

    fn validate(&self, storage: &ScStorage) -> ScResult<Vec<Planned>> {
        let mut plan = Vec::new();
        for (addr, snapshot) in self.buffer.modified() {
            let ty = match snapshot.ty {
                Some(ty) => Some(merge_subtype(storage.element_type(*addr)?, ty)?),
                None => {
                    storage.element_type(*addr)?;
                    None
                }
            };
            plan.push(Planned::Snapshot(*addr, ty, *snapshot));
        }
        for (idx, (addr, _)) in self.buffer.content_changes().iter().enumerate() {
            if !storage.element_type(*addr)?.is_link() {
                return Err(ScError::InvalidType("element is not a link"));
            }
            plan.push(Planned::Content(*addr, idx));
        }
        Ok(plan)
    }

    fn apply(&self, storage: &ScStorage, plan: Vec<Planned>) -> ScResult<()> {
        for step in plan {
            match step {
                Planned::Snapshot(addr, ty, snapshot) => {
                    if let Some(ty) = ty {
                        storage.apply_subtype_locked(addr, ty)?;
                    }
                    if let Some(access) = snapshot.access {
                        storage.apply_access_locked(addr, access)?;
                    }
                }
                Planned::Content(addr, idx) => {
                    let bytes = &self.buffer.content_changes()[idx].1;
                    storage.apply_content_locked(addr, bytes)?;
                }
            }
        }
        Ok(())
    }

    /// Discards staged changes. Created slots stay allocated.
    ///
    /// Rolling back twice is a no-op; rolling back a committed transaction
    /// fails with `InvalidState`.
    pub fn rollback(&mut self) -> ScResult<()> {
        match self.state {
            TransactionState::RolledBack => return Ok(()),
            TransactionState::Committed => {
                return Err(ScError::InvalidState("transaction already committed"))
            }
            _ => {}
        }
        self.state = TransactionState::RollingBack;
        debug!(
            txn = self.id,
            created = self.buffer.created().len(),
            discarded = self.buffer.modified().len() + self.buffer.content_changes().len(),
            "transaction rolled back"
        );
        self.buffer.clear();
        self.state = TransactionState::RolledBack;
        self.manager.finish();
        Ok(())
    }

    /// Releases the transaction, rolling it back if it is still open.
    pub fn destroy(self) {}
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            let _ = self.rollback();
        }
    }
}
