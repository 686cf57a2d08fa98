#![allow(missing_docs)]

use sc_memory::{
    AccessLevels, MemoryConfig, ScAddr, ScError, ScMemory, ScResult, ScType, TransactionState,
};

#[test]
fn staged_changes_are_private_until_commit() -> ScResult<()> {
    let memory = ScMemory::initialize(MemoryConfig::small())?;
    let ctx = memory.context(AccessLevels::MIN);
    let observer = memory.context(AccessLevels::MIN);
    let node = ctx.node_new(ScType::NODE_CONST)?;
    let link = ctx.link_new(ScType::LINK_CONST)?;
    ctx.set_link_content(link, "before")?;

    let mut txn = ctx.begin_transaction();
    assert_eq!(txn.state(), TransactionState::Created);
    txn.set_element_subtype(node, ScType::NODE_CONST_CLASS)?;
    txn.set_link_content(link, "after")?;
    assert_eq!(txn.state(), TransactionState::Active);

    assert_eq!(txn.element_type(node)?, ScType::NODE_CONST_CLASS);
    assert_eq!(txn.link_content(link)?, Some(b"after".to_vec()));
    assert_eq!(observer.element_type(node)?, ScType::NODE_CONST);
    assert_eq!(observer.link_content_string(link)?, Some("before".to_string()));

    txn.commit()?;
    assert_eq!(txn.state(), TransactionState::Committed);
    assert_eq!(observer.element_type(node)?, ScType::NODE_CONST_CLASS);
    assert_eq!(observer.link_content_string(link)?, Some("after".to_string()));
    assert_eq!(observer.find_links_with_content("after"), vec![link]);
    Ok(())
}

#[test]
fn later_staged_change_replaces_earlier_one() -> ScResult<()> {
    let memory = ScMemory::initialize(MemoryConfig::small())?;
    let ctx = memory.context(AccessLevels::MIN);
    let link = ctx.link_new(ScType::LINK_CONST)?;

    let mut txn = ctx.begin_transaction();
    txn.set_link_content(link, "first")?;
    txn.set_link_content(link, "second")?;
    txn.set_element_access(link, AccessLevels::new(2, 3))?;
    assert_eq!(txn.inner().buffer().content_changes().len(), 1);
    assert_eq!(txn.element_access(link)?, AccessLevels::new(2, 3));
    txn.commit()?;

    let admin = memory.context(AccessLevels::MAX);
    assert_eq!(admin.link_content_string(link)?, Some("second".to_string()));
    assert_eq!(admin.element_access(link)?, AccessLevels::new(2, 3));
    assert!(matches!(ctx.link_content(link), Err(ScError::NoReadRights)));
    Ok(())
}

#[test]
fn commit_refuses_when_a_target_was_erased() -> ScResult<()> {
    let memory = ScMemory::initialize(MemoryConfig::small())?;
    let ctx = memory.context(AccessLevels::MIN);
    let kept = ctx.node_new(ScType::NODE_CONST)?;
    let doomed = ctx.node_new(ScType::NODE_CONST)?;

    let mut txn = ctx.begin_transaction();
    txn.set_element_subtype(kept, ScType::NODE_CONST_STRUCTURE)?;
    txn.set_element_subtype(doomed, ScType::NODE_CONST_TUPLE)?;
    ctx.erase_element(doomed)?;

    assert!(matches!(txn.commit(), Err(ScError::AddrNotValid(addr)) if addr == doomed));
    assert_eq!(txn.state(), TransactionState::Active);
    assert_eq!(ctx.element_type(kept)?, ScType::NODE_CONST);

    txn.rollback()?;
    assert_eq!(txn.state(), TransactionState::RolledBack);
    assert_eq!(ctx.element_type(kept)?, ScType::NODE_CONST);
    Ok(())
}

#[test]
fn terminal_states_are_stable() -> ScResult<()> {
    let memory = ScMemory::initialize(MemoryConfig::small())?;
    let ctx = memory.context(AccessLevels::MIN);

    let mut rolled = ctx.begin_transaction();
    rolled.node_new(ScType::NODE_CONST)?;
    rolled.rollback()?;
    rolled.rollback()?;
    assert!(matches!(rolled.commit(), Err(ScError::InvalidState(_))));
    assert!(matches!(
        rolled.node_new(ScType::NODE_CONST),
        Err(ScError::InvalidState(_))
    ));
    rolled.destroy();

    let mut committed = ctx.begin_transaction();
    committed.node_new(ScType::NODE_CONST)?;
    committed.commit()?;
    assert!(matches!(committed.commit(), Err(ScError::InvalidState(_))));
    assert!(matches!(committed.rollback(), Err(ScError::InvalidState(_))));
    committed.destroy();

    assert_eq!(memory.transactions().active_count(), 0);
    Ok(())
}

#[test]
fn dropping_an_open_transaction_discards_staged_changes() -> ScResult<()> {
    let memory = ScMemory::initialize(MemoryConfig::small())?;
    let ctx = memory.context(AccessLevels::MIN);
    let node = ctx.node_new(ScType::NODE_CONST)?;
    {
        let mut txn = ctx.begin_transaction();
        txn.set_element_subtype(node, ScType::NODE_CONST_MATERIAL)?;
        assert_eq!(memory.transactions().active_count(), 1);
    }
    assert_eq!(memory.transactions().active_count(), 0);
    assert_eq!(ctx.element_type(node)?, ScType::NODE_CONST);
    Ok(())
}

#[test]
fn erase_through_transaction_is_recorded() -> ScResult<()> {
    let memory = ScMemory::initialize(MemoryConfig::small())?;
    let ctx = memory.context(AccessLevels::MIN);

    let mut txn = ctx.begin_transaction();
    let a = txn.node_new(ScType::NODE_CONST)?;
    let b = txn.node_new(ScType::NODE_CONST)?;
    let arc = txn.connector_new(ScType::CONST_PERM_POS_ARC, a, b)?;
    assert_eq!(txn.inner().buffer().created().len(), 3);

    let erased = txn.erase_element(a)?;
    assert_eq!(erased, vec![arc, a]);
    assert!(txn.inner().buffer().was_removed(arc));
    assert!(!ctx.is_element(arc));
    txn.commit()?;
    assert!(ctx.is_element(b));
    Ok(())
}

#[test]
fn failed_structural_operation_keeps_transaction_fresh() -> ScResult<()> {
    let memory = ScMemory::initialize(MemoryConfig::small())?;
    let ctx = memory.context(AccessLevels::MIN);
    let node = ctx.node_new(ScType::NODE_CONST)?;
    let erased = ctx.node_new(ScType::NODE_CONST)?;
    ctx.erase_element(erased)?;

    let mut txn = ctx.begin_transaction();
    assert!(matches!(
        txn.connector_new(ScType::CONST_PERM_POS_ARC, node, ScAddr::EMPTY),
        Err(ScError::InvalidParams(_))
    ));
    assert!(matches!(
        txn.erase_element(erased),
        Err(ScError::AddrNotValid(_))
    ));
    assert_eq!(txn.state(), TransactionState::Created);
    assert!(txn.inner().buffer().created().is_empty());

    txn.node_new(ScType::NODE_CONST)?;
    assert_eq!(txn.state(), TransactionState::Active);
    Ok(())
}

#[test]
fn transaction_ids_are_unique() {
    let memory = ScMemory::initialize(MemoryConfig::small()).expect("memory");
    let ctx = memory.context(AccessLevels::MIN);
    let first = ctx.begin_transaction();
    let second = ctx.begin_transaction();
    assert_ne!(first.id(), second.id());
    assert_eq!(memory.transactions().active_count(), 2);
}
