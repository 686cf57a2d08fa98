#![allow(missing_docs)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use sc_memory::{AccessLevels, MemoryConfig, ScAddr, ScMemory, ScResult, ScType};

const THREADS: usize = 8;
const CONNECTORS_PER_THREAD: usize = 10_000;
const NODE_COUNT: usize = 512;
const SEED: u64 = 0x5c_3e30;

#[test]
fn concurrent_connectors_keep_rings_consistent() -> ScResult<()> {
    let memory = ScMemory::initialize(MemoryConfig::small())?;
    let ctx = memory.context(AccessLevels::MIN);
    let nodes: Vec<ScAddr> = (0..NODE_COUNT)
        .map(|_| ctx.node_new(ScType::NODE_CONST))
        .collect::<ScResult<_>>()?;
    let connectors_before = memory.stat().connector_count;

    std::thread::scope(|scope| {
        for worker in 0..THREADS {
            let memory = &memory;
            let nodes = &nodes;
            scope.spawn(move || {
                let ctx = memory.context(AccessLevels::MIN);
                let mut rng = ChaCha8Rng::seed_from_u64(SEED + worker as u64);
                for _ in 0..CONNECTORS_PER_THREAD {
                    let begin = nodes[rng.gen_range(0..nodes.len())];
                    let end = nodes[rng.gen_range(0..nodes.len())];
                    ctx.connector_new(ScType::CONST_PERM_POS_ARC, begin, end)
                        .expect("connector between live nodes");
                }
            });
        }
    });

    let total = (THREADS * CONNECTORS_PER_THREAD) as u64;
    let mut outgoing = 0u64;
    let mut incoming = 0u64;
    for node in &nodes {
        outgoing += u64::from(ctx.outgoing_arcs_count(*node)?);
        incoming += u64::from(ctx.incoming_arcs_count(*node)?);
    }
    assert_eq!(outgoing, total);
    assert_eq!(incoming, total);
    assert_eq!(memory.stat().connector_count, connectors_before + total);

    let report = ctx.validate_incidence();
    assert!(report.is_consistent(), "{:?}", report.errors);
    assert_eq!(report.outgoing_total, report.incoming_total);
    Ok(())
}

#[test]
fn concurrent_erase_and_create_on_shared_hub() -> ScResult<()> {
    let memory = ScMemory::initialize(MemoryConfig::small())?;
    let ctx = memory.context(AccessLevels::MIN);
    let hub = ctx.node_new(ScType::NODE_CONST_CLASS)?;
    let erased = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for worker in 0..4u64 {
            let memory = &memory;
            let erased = &erased;
            scope.spawn(move || {
                let ctx = memory.context(AccessLevels::MIN);
                let mut rng = ChaCha8Rng::seed_from_u64(SEED ^ worker);
                let mut mine = Vec::new();
                for _ in 0..2_000 {
                    let leaf = ctx.node_new(ScType::NODE_CONST).expect("node");
                    ctx.connector_new(ScType::CONST_PERM_POS_ARC, hub, leaf)
                        .expect("arc from hub");
                    mine.push(leaf);
                    if rng.gen_bool(0.5) {
                        let idx = rng.gen_range(0..mine.len());
                        let victim = mine.swap_remove(idx);
                        ctx.erase_element(victim).expect("erase own leaf");
                        erased.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    let expected = 4 * 2_000 - erased.load(Ordering::Relaxed) as u32;
    assert_eq!(ctx.outgoing_arcs_count(hub)?, expected);
    let report = ctx.validate_incidence();
    assert!(report.is_consistent(), "{:?}", report.errors);

    let cascade = ctx.erase_element(hub)?;
    assert_eq!(cascade.len() as u32, expected + 1);
    assert!(ctx.validate_incidence().is_consistent());
    Ok(())
}

#[test]
fn concurrent_erase_of_shared_endpoints_with_attributes() -> ScResult<()> {
    const RING: usize = 400;
    const ROUNDS: usize = 20;
    const WORKERS: usize = 4;

    let memory = ScMemory::initialize(MemoryConfig::small())?;
    let ctx = memory.context(AccessLevels::MIN);
    let relations = [
        ctx.node_new(ScType::NODE_CONST_NOROLE)?,
        ctx.node_new(ScType::NODE_CONST_NOROLE)?,
    ];

    for round in 0..ROUNDS {
        let before = memory.stat();
        let nodes: Vec<ScAddr> = (0..RING)
            .map(|_| ctx.node_new(ScType::NODE_CONST))
            .collect::<ScResult<_>>()?;
        let mut structure: HashSet<ScAddr> = nodes.iter().copied().collect();
        for i in 0..RING {
            let next = nodes[(i + 1) % RING];
            let edge = ctx.connector_new(ScType::CONST_COMMON_EDGE, nodes[i], next)?;
            structure.insert(edge);
            for relation in relations {
                let attr = ctx.connector_new(ScType::CONST_PERM_POS_ARC, relation, edge)?;
                structure.insert(attr);
            }
        }
        assert_eq!(structure.len(), RING * 4);

        let erased = Mutex::new(Vec::new());
        std::thread::scope(|scope| {
            for worker in 0..WORKERS {
                let memory = &memory;
                let nodes = &nodes;
                let erased = &erased;
                scope.spawn(move || {
                    let ctx = memory.context(AccessLevels::MIN);
                    let seed = SEED + (round * WORKERS + worker) as u64;
                    let mut rng = ChaCha8Rng::seed_from_u64(seed);
                    let mut mine: Vec<ScAddr> =
                        nodes.iter().copied().skip(worker).step_by(WORKERS).collect();
                    mine.shuffle(&mut rng);
                    let mut local = Vec::new();
                    for node in mine {
                        local.extend(ctx.erase_element(node).expect("erase ring node"));
                    }
                    erased.lock().extend(local);
                });
            }
        });

        let erased = erased.into_inner();
        let unique: HashSet<ScAddr> = erased.iter().copied().collect();
        assert_eq!(erased.len(), unique.len(), "round {round}: element erased twice");
        assert_eq!(unique, structure, "round {round}");

        let after = memory.stat();
        assert_eq!(after.node_count, before.node_count);
        assert_eq!(after.connector_count, before.connector_count);
        for relation in relations {
            assert_eq!(ctx.outgoing_arcs_count(relation)?, 0);
        }
        let report = ctx.validate_incidence();
        assert!(report.is_consistent(), "round {round}: {:?}", report.errors);
    }
    assert!(memory.storage().monitors().is_empty());
    Ok(())
}
