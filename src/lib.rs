//! Semantic-network memory engine.
//!
//! Elements (nodes, links and connectors) live in fixed-capacity segments and
//! are addressed by [`ScAddr`]. Every element keeps two incidence rings so
//! that connectors can be walked from either endpoint. Connectors may point at
//! other connectors, and erasing an element erases everything incident to it.
//!
//! All operations go through a [`ScMemoryContext`] obtained from a running
//! [`ScMemory`]:
//!
//! ```
//! use sc_memory::{AccessLevels, MemoryConfig, ScMemory, ScType};
//!
//! let memory = ScMemory::initialize(MemoryConfig::small())?;
//! let ctx = memory.context(AccessLevels::MIN);
//! let a = ctx.node_new(ScType::NODE_CONST)?;
//! let b = ctx.node_new(ScType::NODE_CONST)?;
//! let arc = ctx.connector_new(ScType::CONST_PERM_POS_ARC, a, b)?;
//!
//! let mut it = ctx.iterator3(a, ScType::CONST_PERM_POS_ARC, ScType::NODE_CONST)?;
//! assert!(it.next());
//! assert_eq!(it.results(), [a, arc, b]);
//! # Ok::<(), sc_memory::ScError>(())
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod error;
pub mod helper;
pub mod iterator;
pub mod keynodes;
pub mod logging;
pub mod memory;
pub mod primitives;
pub mod storage;
pub mod transaction;
pub mod types;

pub use config::MemoryConfig;
pub use context::{ScMemoryContext, ScTransaction};
pub use error::{ScError, ScResult};
pub use iterator::{Iter3Pattern, IterParam, ScIterator3, ScIterator5};
pub use keynodes::{KeynodeRegistry, KeynodeSpec};
pub use memory::ScMemory;
pub use storage::{IncidenceReport, ScStat};
pub use transaction::TransactionState;
pub use types::{AccessLevels, ScAddr, ScType};
