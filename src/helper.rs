//! System identifiers.
//!
//! An element is named by a const common arc from the element to a link that
//! holds the identifier. The arc itself is marked by a const permanent
//! membership arc coming from the `nrel_system_identifier` relation node:
//!
//! ```text
//! element =(common arc)=> link("idtf")
//!                ^
//!                | const perm pos arc
//!      nrel_system_identifier
//! ```

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::ScMemoryContext;
use crate::error::{ScError, ScResult};
use crate::types::{ScAddr, ScType};

/// Identifier of the relation node that names every other element.
pub const NREL_SYSTEM_IDENTIFIER: &str = "nrel_system_identifier";

/// The five elements that make up one identifier relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SystemIdentifierFiver {
    /// Named element.
    pub element: ScAddr,
    /// Common arc from the element to the link.
    pub arc: ScAddr,
    /// Link holding the identifier.
    pub link: ScAddr,
    /// Membership arc from the relation node to `arc`.
    pub attr_arc: ScAddr,
    /// The `nrel_system_identifier` node.
    pub relation: ScAddr,
}

impl SystemIdentifierFiver {
    fn from_results(results: [ScAddr; 5]) -> Self {
        Self {
            element: results[0],
            arc: results[1],
            link: results[2],
            attr_arc: results[3],
            relation: results[4],
        }
    }
}

/// True when `idtf` is a non-empty string of ASCII letters, digits, `_` and `.`.
pub fn is_valid_system_identifier(idtf: &str) -> bool {
    !idtf.is_empty()
        && idtf
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.')
}

/// Fails with `InvalidSystemIdentifier` unless `idtf` is well formed.
pub fn check_system_identifier(idtf: &str) -> ScResult<()> {
    if is_valid_system_identifier(idtf) {
        Ok(())
    } else {
        Err(ScError::InvalidSystemIdentifier(idtf.to_string()))
    }
}

/// Finds the `nrel_system_identifier` node, creating it when absent.
///
/// The relation names itself: its identifier arc is attributed by the node
/// at the arc's beginning. Finding two such nodes is an error.
pub(crate) fn bootstrap_nrel_system_identifier(ctx: &ScMemoryContext<'_>) -> ScResult<ScAddr> {
    let mut found = None;
    for link in ctx.find_links_with_content(NREL_SYSTEM_IDENTIFIER) {
        let mut it = ctx.iterator5(
            ScType::NODE_CONST_NOROLE,
            ScType::CONST_COMMON_ARC,
            link,
            ScType::CONST_PERM_POS_ARC,
            ScType::NODE_CONST_NOROLE,
        )?;
        while it.next() {
            let [element, _, _, _, relation] = it.results();
            if element != relation {
                continue;
            }
            if found.is_some_and(|existing| existing != element) {
                return Err(ScError::DuplicatedSystemIdentifier(
                    NREL_SYSTEM_IDENTIFIER.to_string(),
                ));
            }
            found = Some(element);
        }
    }
    if let Some(node) = found {
        debug!(addr = %node, "resolved nrel_system_identifier");
        return Ok(node);
    }

    info!("creating nrel_system_identifier");
    let mut created = Vec::with_capacity(2);
    let result = (|| -> ScResult<ScAddr> {
        let node = ctx.node_new(ScType::NODE_CONST_NOROLE)?;
        created.push(node);
        let link = ctx.link_new(ScType::CONST)?;
        created.push(link);
        ctx.set_link_content(link, NREL_SYSTEM_IDENTIFIER)?;
        let arc = ctx.connector_new(ScType::CONST_COMMON_ARC, node, link)?;
        ctx.connector_new(ScType::CONST_PERM_POS_ARC, node, arc)?;
        Ok(node)
    })();
    if result.is_err() {
        discard(ctx, &created);
    }
    result
}

/// Erases partially built structures, newest first. Connectors between them
/// go with the cascade.
fn discard(ctx: &ScMemoryContext<'_>, created: &[ScAddr]) {
    for addr in created.iter().rev() {
        if !ctx.is_element(*addr) {
            continue;
        }
        if let Err(err) = ctx.erase_element(*addr) {
            warn!(addr = %addr, error = %err, "partial identifier structure left behind");
        }
    }
}

/// Full identifier relation of the element named `idtf`.
pub fn find_system_identifier_fiver(
    ctx: &ScMemoryContext<'_>,
    idtf: &str,
) -> ScResult<Option<SystemIdentifierFiver>> {
    check_system_identifier(idtf)?;
    let nrel = ctx.memory().nrel_system_identifier();
    for link in ctx.find_links_with_content(idtf) {
        let mut it = ctx.iterator5(
            ScType::UNKNOWN,
            ScType::CONST_COMMON_ARC,
            link,
            ScType::CONST_PERM_POS_ARC,
            nrel,
        )?;
        if it.next() {
            return Ok(Some(SystemIdentifierFiver::from_results(it.results())));
        }
    }
    Ok(None)
}

/// Element named `idtf`, if any.
pub fn find_element_by_system_identifier(
    ctx: &ScMemoryContext<'_>,
    idtf: &str,
) -> ScResult<Option<ScAddr>> {
    Ok(find_system_identifier_fiver(ctx, idtf)?.map(|fiver| fiver.element))
}

/// Names `addr` with `idtf`.
///
/// Fails with `DuplicatedSystemIdentifier` when another element already
/// carries the identifier.
pub fn set_system_identifier(
    ctx: &ScMemoryContext<'_>,
    addr: ScAddr,
    idtf: &str,
) -> ScResult<SystemIdentifierFiver> {
    if find_system_identifier_fiver(ctx, idtf)?.is_some() {
        return Err(ScError::DuplicatedSystemIdentifier(idtf.to_string()));
    }
    ctx.check_write(addr)?;
    let relation = ctx.memory().nrel_system_identifier();
    ctx.check_write(relation)?;

    let link = ctx.link_new(ScType::CONST)?;
    let result = (|| -> ScResult<SystemIdentifierFiver> {
        ctx.set_link_content(link, idtf)?;
        let arc = ctx.connector_new(ScType::CONST_COMMON_ARC, addr, link)?;
        let attr_arc = ctx.connector_new(ScType::CONST_PERM_POS_ARC, relation, arc)?;
        Ok(SystemIdentifierFiver {
            element: addr,
            arc,
            link,
            attr_arc,
            relation,
        })
    })();
    if result.is_err() {
        discard(ctx, &[link]);
    }
    result
}

/// Identifier of `addr`, if it has one.
pub fn system_identifier(ctx: &ScMemoryContext<'_>, addr: ScAddr) -> ScResult<Option<String>> {
    let nrel = ctx.memory().nrel_system_identifier();
    let mut it = ctx.iterator5(
        addr,
        ScType::CONST_COMMON_ARC,
        ScType::LINK_CONST,
        ScType::CONST_PERM_POS_ARC,
        nrel,
    )?;
    if !it.next() {
        return Ok(None);
    }
    ctx.link_content_string(it.get(2)?)
}

/// Element named `idtf`, created with type `ty` and named when absent.
pub fn resolve_system_identifier(
    ctx: &ScMemoryContext<'_>,
    idtf: &str,
    ty: ScType,
) -> ScResult<ScAddr> {
    if let Some(existing) = find_element_by_system_identifier(ctx, idtf)? {
        return Ok(existing);
    }
    let addr = if ty.is_link() {
        ctx.link_new(ty)?
    } else {
        ctx.node_new(ty)?
    };
    if let Err(err) = set_system_identifier(ctx, addr, idtf) {
        ctx.erase_element(addr)?;
        return Err(err);
    }
    Ok(addr)
}
