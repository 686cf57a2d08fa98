//! The memory service: one storage, its transactions and its lifecycle.

use tracing::{debug, info};

use crate::config::MemoryConfig;
use crate::context::ScMemoryContext;
use crate::error::{ScError, ScResult};
use crate::helper;
use crate::logging;
use crate::storage::fs_memory::{self, DumpSummary};
use crate::storage::metrics::MetricsSnapshot;
use crate::storage::{ScStat, ScStorage};
use crate::transaction::TransactionManager;
use crate::types::{AccessLevels, ScAddr};

/// A running sc-memory instance.
///
/// Created with [`ScMemory::initialize`] and finished with
/// [`ScMemory::shutdown`]. The instance is `Send + Sync`; threads share it by
/// reference or through an `Arc` and each opens its own contexts.
pub struct ScMemory {
    config: MemoryConfig,
    storage: ScStorage,
    transactions: TransactionManager,
    nrel_system_identifier: ScAddr,
}

impl ScMemory {
    /// Builds the storage, restoring the dump when one is configured.
    ///
    /// The dump in `repo_path` is loaded unless `clear` is set or no dump
    /// exists yet. The `nrel_system_identifier` relation is resolved or
    /// created before returning.
    pub fn initialize(config: MemoryConfig) -> ScResult<Self> {
        config.validate()?;
        if let Some(level) = &config.log_level {
            if let Err(err) = logging::init_logging(level) {
                debug!(error = %err, "logging not installed");
            }
        }

        let storage = match &config.repo_path {
            Some(dir) if !config.clear && fs_memory::dump_exists(dir) => {
                fs_memory::load(dir, &config)?.0
            }
            _ => ScStorage::new(&config),
        };

        let mut memory = Self {
            config,
            storage,
            transactions: TransactionManager::new(),
            nrel_system_identifier: ScAddr::EMPTY,
        };
        let nrel = helper::bootstrap_nrel_system_identifier(&memory.context(AccessLevels::MIN))?;
        memory.nrel_system_identifier = nrel;

        let stat = memory.stat();
        info!(
            nodes = stat.node_count,
            links = stat.link_count,
            connectors = stat.connector_count,
            segments = stat.segments_count,
            "memory initialized"
        );
        Ok(memory)
    }

    /// Context with the given access levels.
    pub fn context(&self, levels: AccessLevels) -> ScMemoryContext<'_> {
        ScMemoryContext::new(self, levels)
    }

    /// Underlying element store.
    pub fn storage(&self) -> &ScStorage {
        &self.storage
    }

    /// Transaction id source.
    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    /// Configuration the memory was started with.
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// The `nrel_system_identifier` relation node.
    pub fn nrel_system_identifier(&self) -> ScAddr {
        self.nrel_system_identifier
    }

    /// Element counts.
    pub fn stat(&self) -> ScStat {
        self.storage.stat()
    }

    /// Operation counters, when enabled in the configuration.
    pub fn metrics_snapshot(&self) -> Option<MetricsSnapshot> {
        self.storage.metrics_snapshot()
    }

    /// Writes the dump into the configured repository.
    pub fn save(&self) -> ScResult<DumpSummary> {
        let dir = self.config.repo_path.as_deref().ok_or(ScError::NoRepoPath)?;
        fs_memory::save(&self.storage, dir)
    }

    /// Stops the memory, saving the dump when `save_on_shutdown` is set.
    pub fn shutdown(self) -> ScResult<()> {
        let open = self.transactions.active_count();
        if open > 0 {
            debug!(open, "shutting down with open transactions");
        }
        if self.config.save_on_shutdown {
            self.save()?;
        }
        info!(elements = self.stat().element_count(), "memory shut down");
        Ok(())
    }
}
