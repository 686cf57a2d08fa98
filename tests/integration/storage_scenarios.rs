#![allow(missing_docs)]

use sc_memory::{AccessLevels, IterParam, MemoryConfig, ScError, ScMemory, ScResult, ScType};

fn memory() -> ScResult<ScMemory> {
    ScMemory::initialize(MemoryConfig::small())
}

#[test]
fn membership_arc_between_two_nodes() -> ScResult<()> {
    let memory = memory()?;
    let ctx = memory.context(AccessLevels::MIN);
    let a = ctx.node_new(ScType::NODE_CONST)?;
    let b = ctx.node_new(ScType::NODE_CONST)?;
    let arc = ctx.connector_new(ScType::CONST_PERM_POS_ARC, a, b)?;

    assert_eq!(ctx.connector_endpoints(arc)?, (a, b));
    assert_eq!(ctx.connector_begin(arc)?, a);
    assert_eq!(ctx.connector_end(arc)?, b);
    assert_eq!(ctx.outgoing_arcs_count(a)?, 1);
    assert_eq!(ctx.incoming_arcs_count(b)?, 1);

    let found: Vec<_> = ctx
        .iterator3(a, ScType::CONST_PERM_POS_ARC, IterParam::ANY)?
        .triples()
        .collect();
    assert_eq!(found, vec![[a, arc, b]]);

    assert!(matches!(
        ctx.connector_endpoints(a),
        Err(ScError::InvalidType(_))
    ));
    assert!(ctx.validate_incidence().is_consistent());
    Ok(())
}

#[test]
fn self_loop_edge_is_erased_with_its_node() -> ScResult<()> {
    let memory = memory()?;
    let ctx = memory.context(AccessLevels::MIN);
    let a = ctx.node_new(ScType::NODE_CONST)?;
    let edge = ctx.connector_new(ScType::CONST_COMMON_EDGE, a, a)?;

    let found: Vec<_> = ctx
        .iterator3(a, ScType::CONST_COMMON_EDGE, IterParam::ANY)?
        .triples()
        .collect();
    assert_eq!(found, vec![[a, edge, a]]);
    assert!(ctx.validate_incidence().is_consistent());

    let erased = ctx.erase_element(a)?;
    assert!(erased.contains(&edge));
    assert!(!ctx.is_element(a));
    assert!(!ctx.is_element(edge));
    assert!(ctx.validate_incidence().is_consistent());
    Ok(())
}

#[test]
fn erasing_while_requerying_empties_a_class() -> ScResult<()> {
    let memory = memory()?;
    let ctx = memory.context(AccessLevels::MIN);
    let class = ctx.node_new(ScType::NODE_CONST_CLASS)?;
    let mut instances = Vec::new();
    for _ in 0..6 {
        let instance = ctx.node_new(ScType::NODE_CONST)?;
        ctx.connector_new(ScType::CONST_PERM_POS_ARC, class, instance)?;
        instances.push(instance);
    }
    assert_eq!(ctx.outgoing_arcs_count(class)?, 6);

    let mut erased = 0;
    loop {
        let mut it = ctx.iterator3(class, ScType::CONST_PERM_POS_ARC, ScType::NODE_CONST)?;
        if !it.next() {
            break;
        }
        ctx.erase_element(it.get(1)?)?;
        erased += 1;
    }
    assert_eq!(erased, 6);
    assert_eq!(ctx.outgoing_arcs_count(class)?, 0);
    for instance in instances {
        assert!(ctx.is_element(instance));
        assert_eq!(ctx.incoming_arcs_count(instance)?, 0);
    }
    assert!(ctx.validate_incidence().is_consistent());
    Ok(())
}

#[test]
fn rollback_keeps_created_slots() -> ScResult<()> {
    let memory = memory()?;
    let ctx = memory.context(AccessLevels::MIN);
    let observer = memory.context(AccessLevels::MIN);

    let mut txn = ctx.begin_transaction();
    let x = txn.node_new(ScType::NODE_CONST)?;
    assert!(observer.is_element(x));
    txn.rollback()?;

    assert!(observer.is_element(x));
    assert_eq!(observer.element_type(x)?, ScType::NODE_CONST);
    ctx.erase_element(x)?;
    assert!(!observer.is_element(x));
    Ok(())
}

#[test]
fn full_memory_refuses_then_reuses_freed_slot() -> ScResult<()> {
    let memory = ScMemory::initialize(MemoryConfig::small().max_segments(1).segment_capacity(16))?;
    let ctx = memory.context(AccessLevels::MIN);

    let mut nodes = Vec::new();
    let err = loop {
        match ctx.node_new(ScType::NODE_CONST) {
            Ok(addr) => nodes.push(addr),
            Err(err) => break err,
        }
        assert!(nodes.len() <= 16, "allocation never refused");
    };
    assert!(matches!(err, ScError::FullMemory { max_segments: 1 }));
    assert!(!nodes.is_empty());
    for node in &nodes {
        assert!(ctx.is_element(*node));
    }

    let victim = nodes[nodes.len() / 2];
    ctx.erase_element(victim)?;
    let reused = ctx.node_new(ScType::NODE_CONST_CLASS)?;
    assert_eq!(reused, victim);
    assert_eq!(ctx.element_type(reused)?, ScType::NODE_CONST_CLASS);
    assert!(matches!(
        ctx.node_new(ScType::NODE_CONST),
        Err(ScError::FullMemory { .. })
    ));
    Ok(())
}

#[test]
fn access_levels_gate_reads_and_writes() -> ScResult<()> {
    let memory = memory()?;
    let admin = memory.context(AccessLevels::new(8, 8));
    let guest = memory.context(AccessLevels::MIN);

    let secret = admin.node_new(ScType::NODE_CONST)?;
    let public = guest.node_new(ScType::NODE_CONST)?;
    admin.connector_new(ScType::CONST_PERM_POS_ARC, public, secret)?;

    assert!(matches!(guest.element_type(secret), Err(ScError::NoReadRights)));
    assert!(matches!(guest.erase_element(secret), Err(ScError::NoWriteRights)));
    assert!(matches!(
        guest.connector_new(ScType::CONST_PERM_POS_ARC, public, secret),
        Err(ScError::NoWriteRights)
    ));

    let visible: Vec<_> = guest
        .iterator3(public, ScType::CONST_PERM_POS_ARC, IterParam::ANY)?
        .triples()
        .collect();
    assert!(visible.is_empty());
    let visible: Vec<_> = admin
        .iterator3(public, ScType::CONST_PERM_POS_ARC, IterParam::ANY)?
        .triples()
        .collect();
    assert_eq!(visible.len(), 1);

    admin.set_element_access(secret, AccessLevels::MIN)?;
    assert_eq!(guest.element_type(secret)?, ScType::NODE_CONST);
    Ok(())
}

#[test]
fn link_content_search() -> ScResult<()> {
    let memory = memory()?;
    let ctx = memory.context(AccessLevels::MIN);
    let apple = ctx.link_new(ScType::LINK_CONST)?;
    let pineapple = ctx.link_new(ScType::LINK_CONST)?;
    let empty = ctx.link_new(ScType::LINK_CONST)?;
    ctx.set_link_content(apple, "apple")?;
    ctx.set_link_content(pineapple, "pineapple")?;
    ctx.set_link_content(empty, b"")?;

    assert_eq!(ctx.link_content(empty)?, Some(Vec::new()));
    assert_eq!(ctx.find_links_with_content("apple"), vec![apple]);
    let mut by_substring = ctx.find_links_by_content_substring("apple");
    by_substring.sort();
    let mut expected = vec![apple, pineapple];
    expected.sort();
    assert_eq!(by_substring, expected);
    assert!(ctx
        .find_link_contents_by_substring("pine")
        .contains(&b"pineapple".to_vec()));

    ctx.set_link_content(apple, "pear")?;
    assert!(ctx.find_links_with_content("apple").is_empty());
    ctx.erase_element(pineapple)?;
    assert!(ctx.find_links_by_content_substring("apple").is_empty());

    let node = ctx.node_new(ScType::NODE_CONST)?;
    assert!(matches!(
        ctx.set_link_content(node, "x"),
        Err(ScError::InvalidType(_))
    ));
    Ok(())
}
