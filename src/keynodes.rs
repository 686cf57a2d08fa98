//! Keynodes: well-known elements resolved by system identifier at startup.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::context::ScMemoryContext;
use crate::error::{ScError, ScResult};
use crate::helper;
use crate::types::{ScAddr, ScType};

/// One keynode to resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeynodeSpec {
    /// System identifier of the keynode.
    pub idtf: &'static str,
    /// Type used when the keynode has to be created.
    pub ty: ScType,
}

impl KeynodeSpec {
    /// Keynode created as a const node when missing.
    pub const fn node(idtf: &'static str) -> Self {
        Self {
            idtf,
            ty: ScType::NODE_CONST,
        }
    }

    /// Keynode created with an explicit type when missing.
    pub const fn typed(idtf: &'static str, ty: ScType) -> Self {
        Self { idtf, ty }
    }
}

/// Resolved keynodes, looked up by identifier.
#[derive(Clone, Debug, Default)]
pub struct KeynodeRegistry {
    addrs: FxHashMap<&'static str, ScAddr>,
}

impl KeynodeRegistry {
    /// Resolves every spec, creating missing keynodes.
    ///
    /// Stops at the first failure and reports which identifier caused it.
    pub fn bootstrap(ctx: &ScMemoryContext<'_>, specs: &[KeynodeSpec]) -> ScResult<Self> {
        let mut addrs = FxHashMap::default();
        for spec in specs {
            let addr = helper::resolve_system_identifier(ctx, spec.idtf, spec.ty).map_err(
                |source| ScError::Keynode {
                    idtf: spec.idtf.to_string(),
                    source: Box::new(source),
                },
            )?;
            addrs.insert(spec.idtf, addr);
        }
        debug!(count = addrs.len(), "keynodes resolved");
        Ok(Self { addrs })
    }

    /// Address of a resolved keynode.
    pub fn get(&self, idtf: &str) -> Option<ScAddr> {
        self.addrs.get(idtf).copied()
    }

    /// Address of a resolved keynode, or `NotFound`.
    pub fn require(&self, idtf: &str) -> ScResult<ScAddr> {
        self.get(idtf).ok_or(ScError::NotFound("keynode"))
    }

    /// Number of resolved keynodes.
    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    /// True when nothing was resolved.
    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }
}
