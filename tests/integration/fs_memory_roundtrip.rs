#![allow(missing_docs)]

use std::fs;

use sc_memory::storage::fs_memory::{self, DUMP_FILE_NAME};
use sc_memory::{AccessLevels, IterParam, MemoryConfig, ScError, ScMemory, ScResult, ScType};
use tempfile::tempdir;

#[test]
fn restored_memory_keeps_addresses_rings_and_content() -> ScResult<()> {
    let dir = tempdir().expect("tempdir");
    let config = MemoryConfig::small().repo_path(dir.path());

    let memory = ScMemory::initialize(config.clone())?;
    let ctx = memory.context(AccessLevels::MIN);
    let class = ctx.node_new(ScType::NODE_CONST_CLASS)?;
    let instance = ctx.node_new(ScType::NODE_CONST)?;
    let label = ctx.link_new(ScType::LINK_CONST)?;
    ctx.set_link_content(label, "instance label")?;
    let member = ctx.connector_new(ScType::CONST_PERM_POS_ARC, class, instance)?;
    let edge = ctx.connector_new(ScType::CONST_COMMON_EDGE, instance, label)?;
    let scratch = ctx.node_new(ScType::NODE_CONST)?;
    ctx.erase_element(scratch)?;
    let stat_before = memory.stat();
    let summary = memory.save()?;
    assert_eq!(summary.elements, stat_before.element_count());
    memory.shutdown()?;

    let memory = ScMemory::initialize(config)?;
    let ctx = memory.context(AccessLevels::MIN);
    assert_eq!(memory.stat(), stat_before);
    assert_eq!(ctx.connector_endpoints(member)?, (class, instance));
    assert_eq!(ctx.connector_endpoints(edge)?, (instance, label));
    assert_eq!(ctx.link_content_string(label)?, Some("instance label".to_string()));
    assert_eq!(ctx.find_links_with_content("instance label"), vec![label]);
    assert!(!ctx.is_element(scratch));

    let found: Vec<_> = ctx
        .iterator3(class, ScType::CONST_PERM_POS_ARC, IterParam::ANY)?
        .triples()
        .collect();
    assert_eq!(found, vec![[class, member, instance]]);
    assert!(ctx.validate_incidence().is_consistent());

    let reused = ctx.node_new(ScType::NODE_CONST)?;
    assert_eq!(reused, scratch, "free chain survives the dump");
    Ok(())
}

#[test]
fn corrupted_dump_is_rejected() -> ScResult<()> {
    let dir = tempdir().expect("tempdir");
    let config = MemoryConfig::small().repo_path(dir.path());
    let memory = ScMemory::initialize(config.clone())?;
    memory.save()?;
    drop(memory);

    let path = dir.path().join(DUMP_FILE_NAME);
    let mut bytes = fs::read(&path).expect("read dump");
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0xff;
    fs::write(&path, bytes).expect("write dump");

    assert!(matches!(
        ScMemory::initialize(config),
        Err(ScError::Corruption(_))
    ));
    Ok(())
}

#[test]
fn load_requires_a_directory() {
    let dir = tempdir().expect("tempdir");
    let file = dir.path().join("not-a-dir");
    fs::write(&file, b"x").expect("write");
    assert!(matches!(
        fs_memory::load(&file, &MemoryConfig::small()),
        Err(ScError::NoRepoPath)
    ));
    assert!(matches!(
        fs_memory::load(&dir.path().join("missing"), &MemoryConfig::small()),
        Err(ScError::NoRepoPath)
    ));
}

#[test]
fn truncated_dump_is_rejected() -> ScResult<()> {
    let dir = tempdir().expect("tempdir");
    let memory = ScMemory::initialize(MemoryConfig::small())?;
    fs_memory::save(memory.storage(), dir.path())?;

    let path = dir.path().join(DUMP_FILE_NAME);
    let bytes = fs::read(&path).expect("read dump");
    fs::write(&path, &bytes[..bytes.len() - 9]).expect("write dump");
    assert!(matches!(
        fs_memory::load(dir.path(), &MemoryConfig::small()),
        Err(ScError::Corruption(_))
    ));
    Ok(())
}
