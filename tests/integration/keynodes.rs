#![allow(missing_docs)]

use sc_memory::helper::{self, NREL_SYSTEM_IDENTIFIER};
use sc_memory::{
    AccessLevels, KeynodeRegistry, KeynodeSpec, MemoryConfig, ScError, ScMemory, ScResult, ScType,
};
use tempfile::tempdir;

const AGENT_KEYNODES: &[KeynodeSpec] = &[
    KeynodeSpec::node("question_initiated"),
    KeynodeSpec::typed("action_search", ScType::NODE_CONST_CLASS),
    KeynodeSpec::typed("rrel_1", ScType::NODE_CONST_ROLE),
    KeynodeSpec::typed("lang_en", ScType::NODE_CONST_CLASS),
];

#[test]
fn keynodes_survive_a_restart() -> ScResult<()> {
    let dir = tempdir().expect("tempdir");
    let config = MemoryConfig::small()
        .repo_path(dir.path())
        .save_on_shutdown(true);

    let memory = ScMemory::initialize(config.clone())?;
    let registry = KeynodeRegistry::bootstrap(&memory.context(AccessLevels::MIN), AGENT_KEYNODES)?;
    let search = registry.require("action_search")?;
    let elements = memory.stat().element_count();
    memory.shutdown()?;

    let memory = ScMemory::initialize(config)?;
    let ctx = memory.context(AccessLevels::MIN);
    let again = KeynodeRegistry::bootstrap(&ctx, AGENT_KEYNODES)?;
    assert_eq!(again.require("action_search")?, search);
    assert_eq!(memory.stat().element_count(), elements);
    assert_eq!(
        helper::system_identifier(&ctx, again.require("rrel_1")?)?,
        Some("rrel_1".to_string())
    );
    assert_eq!(ctx.element_type(again.require("rrel_1")?)?, ScType::NODE_CONST_ROLE);
    Ok(())
}

#[test]
fn identifiers_are_unique_across_elements() -> ScResult<()> {
    let memory = ScMemory::initialize(MemoryConfig::small())?;
    let ctx = memory.context(AccessLevels::MIN);
    let registry = KeynodeRegistry::bootstrap(&ctx, AGENT_KEYNODES)?;
    let stranger = ctx.node_new(ScType::NODE_CONST)?;
    assert!(matches!(
        helper::set_system_identifier(&ctx, stranger, "lang_en"),
        Err(ScError::DuplicatedSystemIdentifier(_))
    ));
    assert_eq!(
        helper::find_element_by_system_identifier(&ctx, "lang_en")?,
        registry.get("lang_en")
    );
    assert_eq!(
        helper::find_element_by_system_identifier(&ctx, NREL_SYSTEM_IDENTIFIER)?,
        Some(memory.nrel_system_identifier())
    );
    Ok(())
}

#[test]
fn erasing_a_keynode_frees_its_identifier() -> ScResult<()> {
    let memory = ScMemory::initialize(MemoryConfig::small())?;
    let ctx = memory.context(AccessLevels::MIN);
    let registry = KeynodeRegistry::bootstrap(&ctx, AGENT_KEYNODES)?;
    let old = registry.require("question_initiated")?;
    ctx.erase_element(old)?;
    assert_eq!(
        helper::find_element_by_system_identifier(&ctx, "question_initiated")?,
        None
    );

    let fresh = KeynodeRegistry::bootstrap(&ctx, AGENT_KEYNODES)?;
    let replacement = fresh.require("question_initiated")?;
    assert!(ctx.is_element(replacement));
    assert_eq!(fresh.require("lang_en")?, registry.require("lang_en")?);
    Ok(())
}
