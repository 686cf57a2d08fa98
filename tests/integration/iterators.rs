#![allow(missing_docs)]

use sc_memory::iterator::Iter3Pattern;
use sc_memory::{
    AccessLevels, IterParam, MemoryConfig, ScAddr, ScError, ScIterator5, ScMemory, ScResult, ScType,
};

fn sorted(mut triples: Vec<[ScAddr; 3]>) -> Vec<[ScAddr; 3]> {
    triples.sort();
    triples
}

#[test]
fn ring_patterns_filter_by_type() -> ScResult<()> {
    let memory = ScMemory::initialize(MemoryConfig::small())?;
    let ctx = memory.context(AccessLevels::MIN);
    let a = ctx.node_new(ScType::NODE_CONST)?;
    let b = ctx.node_new(ScType::NODE_CONST_CLASS)?;
    let c = ctx.link_new(ScType::LINK_CONST)?;
    let ab = ctx.connector_new(ScType::CONST_PERM_POS_ARC, a, b)?;
    let ac = ctx.connector_new(ScType::CONST_PERM_POS_ARC, a, c)?;
    let ab_common = ctx.connector_new(ScType::CONST_COMMON_ARC, a, b)?;

    let all: Vec<_> = ctx
        .iterator3(a, IterParam::ANY, IterParam::ANY)?
        .triples()
        .collect();
    assert_eq!(
        sorted(all),
        sorted(vec![[a, ab, b], [a, ac, c], [a, ab_common, b]])
    );

    let to_links: Vec<_> = ctx
        .iterator3(a, ScType::CONST_PERM_POS_ARC, ScType::LINK)?
        .triples()
        .collect();
    assert_eq!(to_links, vec![[a, ac, c]]);

    let into_b: Vec<_> = ctx
        .iterator3(ScType::NODE_CONST, ScType::CONST_COMMON_ARC, b)?
        .triples()
        .collect();
    assert_eq!(into_b, vec![[a, ab_common, b]]);

    let between: Vec<_> = ctx.iterator3(a, ScType::ARC_MASK, b)?.triples().collect();
    assert_eq!(between.len(), 0, "no connector carries every arc kind bit");
    let between: Vec<_> = ctx.iterator3(a, IterParam::ANY, b)?.triples().collect();
    assert_eq!(sorted(between), sorted(vec![[a, ab, b], [a, ab_common, b]]));
    Ok(())
}

#[test]
fn fixed_connector_patterns_yield_one_triple() -> ScResult<()> {
    let memory = ScMemory::initialize(MemoryConfig::small())?;
    let ctx = memory.context(AccessLevels::MIN);
    let a = ctx.node_new(ScType::NODE_CONST)?;
    let b = ctx.node_new(ScType::NODE_CONST)?;
    let arc = ctx.connector_new(ScType::CONST_PERM_POS_ARC, a, b)?;

    let mut it = ctx.iterator3(IterParam::ANY, arc, IterParam::ANY)?;
    assert_eq!(it.pattern(), Iter3Pattern::AnyFixedAny);
    assert!(it.next());
    assert_eq!(it.results(), [a, arc, b]);
    assert!(!it.next());

    let mut it = ctx.iterator3(a, arc, b)?;
    assert_eq!(it.pattern(), Iter3Pattern::FixedFixedFixed);
    assert!(it.next());

    let mut it = ctx.iterator3(b, arc, IterParam::ANY)?;
    assert!(!it.next(), "b is not the source of arc");

    let mut it = ctx.iterator3(IterParam::ANY, arc, ScType::LINK)?;
    assert!(!it.next(), "target type does not match");
    Ok(())
}

#[test]
fn undirected_edges_are_seen_from_both_ends() -> ScResult<()> {
    let memory = ScMemory::initialize(MemoryConfig::small())?;
    let ctx = memory.context(AccessLevels::MIN);
    let a = ctx.node_new(ScType::NODE_CONST)?;
    let b = ctx.node_new(ScType::NODE_CONST)?;
    let edge = ctx.connector_new(ScType::CONST_COMMON_EDGE, a, b)?;

    let from_a: Vec<_> = ctx
        .iterator3(a, ScType::CONST_COMMON_EDGE, IterParam::ANY)?
        .triples()
        .collect();
    let from_b: Vec<_> = ctx
        .iterator3(b, ScType::CONST_COMMON_EDGE, IterParam::ANY)?
        .triples()
        .collect();
    assert_eq!(from_a, vec![[a, edge, b]]);
    assert_eq!(from_b, vec![[b, edge, a]]);
    assert_eq!(ctx.connector_endpoints(edge)?, (a, b));
    assert!(ctx.validate_incidence().is_consistent());

    ctx.erase_element(edge)?;
    assert!(ctx
        .iterator3(b, IterParam::ANY, IterParam::ANY)?
        .triples()
        .next()
        .is_none());
    assert!(ctx.validate_incidence().is_consistent());
    Ok(())
}

#[test]
fn dead_anchor_and_bad_positions() -> ScResult<()> {
    let memory = ScMemory::initialize(MemoryConfig::small())?;
    let ctx = memory.context(AccessLevels::MIN);
    let a = ctx.node_new(ScType::NODE_CONST)?;
    ctx.erase_element(a)?;

    let mut it = ctx.iterator3(a, IterParam::ANY, IterParam::ANY)?;
    assert!(!it.next());
    assert!(!it.next());
    assert_eq!(it.results(), [ScAddr::EMPTY; 3]);
    assert!(matches!(it.get(3), Err(ScError::InvalidParams(_))));

    assert!(matches!(
        ctx.iterator3(IterParam::ANY, ScType::CONST_PERM_POS_ARC, IterParam::ANY),
        Err(ScError::InvalidParams(_))
    ));
    Ok(())
}

#[test]
fn five_tuple_walks_attribute_arcs() -> ScResult<()> {
    let memory = ScMemory::initialize(MemoryConfig::small())?;
    let ctx = memory.context(AccessLevels::MIN);
    let person = ctx.node_new(ScType::NODE_CONST)?;
    let name = ctx.link_new(ScType::LINK_CONST)?;
    let nickname = ctx.link_new(ScType::LINK_CONST)?;
    let nrel_name = ctx.node_new(ScType::NODE_CONST_NOROLE)?;
    let nrel_nick = ctx.node_new(ScType::NODE_CONST_NOROLE)?;

    let name_arc = ctx.connector_new(ScType::CONST_COMMON_ARC, person, name)?;
    let name_attr = ctx.connector_new(ScType::CONST_PERM_POS_ARC, nrel_name, name_arc)?;
    let nick_arc = ctx.connector_new(ScType::CONST_COMMON_ARC, person, nickname)?;
    let nick_attr = ctx.connector_new(ScType::CONST_PERM_POS_ARC, nrel_nick, nick_arc)?;

    let named: Vec<_> = ctx
        .iterator5(
            person,
            ScType::CONST_COMMON_ARC,
            ScType::LINK_CONST,
            ScType::CONST_PERM_POS_ARC,
            nrel_name,
        )?
        .quintuples()
        .collect();
    assert_eq!(named, vec![[person, name_arc, name, name_attr, nrel_name]]);

    let mut every: Vec<_> = ScIterator5::f_a_a_a_a(
        memory.storage(),
        person,
        ScType::CONST_COMMON_ARC,
        ScType::LINK_CONST,
        ScType::CONST_PERM_POS_ARC,
        ScType::NODE_CONST_NOROLE,
        AccessLevels::MIN,
    )?
    .quintuples()
    .collect();
    every.sort();
    let mut expected = vec![
        [person, name_arc, name, name_attr, nrel_name],
        [person, nick_arc, nickname, nick_attr, nrel_nick],
    ];
    expected.sort();
    assert_eq!(every, expected);

    let mut it = ScIterator5::a_a_f_a_f(
        memory.storage(),
        ScType::NODE_CONST,
        ScType::CONST_COMMON_ARC,
        nickname,
        ScType::CONST_PERM_POS_ARC,
        nrel_nick,
        AccessLevels::MIN,
    )?;
    assert!(it.next());
    assert_eq!(it.get(0)?, person);
    assert_eq!(it.get(3)?, nick_attr);
    assert!(matches!(it.get(5), Err(ScError::InvalidParams(_))));
    assert!(!it.next());

    let mut it = ScIterator5::f_a_f_a_f(
        memory.storage(),
        person,
        ScType::CONST_COMMON_ARC,
        name,
        ScType::CONST_PERM_POS_ARC,
        nrel_nick,
        AccessLevels::MIN,
    )?;
    assert!(!it.next(), "name arc is not attributed by nrel_nick");

    ctx.erase_element(nrel_name)?;
    assert!(!ctx.is_element(name_attr));
    assert!(ctx.is_element(name_arc));
    Ok(())
}
