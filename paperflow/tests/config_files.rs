//! The shipped configuration files load and cover every stage.

use paperflow::config::{AgentsConfig, TasksConfig};
use paperflow::core::StageName;
use std::path::PathBuf;

fn config_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../config")
}

#[test]
fn test_agents_yaml_loads() {
    let agents = AgentsConfig::load(&config_dir().join("agents.yaml")).unwrap();
    for stage in StageName::ALL {
        assert!(agents.for_stage(stage).is_some(), "no agent for {stage}");
    }
    assert_eq!(agents.for_stage(StageName::Review).unwrap().role, "YAML Reviewer");
}

#[test]
fn test_tasks_yaml_loads() {
    let tasks = TasksConfig::load(&config_dir().join("tasks.yaml")).unwrap();

    let inputs = tasks.document_inputs("Lee - Soil Carbon.pdf");
    assert!(inputs["template"].contains("FILE: Lee - Soil Carbon.pdf"));

    let article = tasks.article().unwrap();
    assert_eq!(article.sections.len(), 6);
    assert_eq!(article.sections[0].key, "gap");
    assert_eq!(article.sections[5].heading, "What Comes Next");
}
