//! Integration tests for command dispatch through the surface bridge

use promptdock_core::{broadcast::Hub, commands::list_commands, Bridge, Config};
use serde_json::{json, Value};

fn call(bridge: &Bridge, command: &str, args: Value) -> Value {
    serde_json::from_str(&bridge.call(command, &args.to_string())).unwrap()
}

#[test]
fn test_ping_command() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = Bridge::setup(&Config::with_data_dir(dir.path()), Hub::new()).unwrap();

    let result = call(&bridge, "ping", json!({"message": "hello"}));
    assert_eq!(result["pong"], json!(true));
    assert_eq!(result["message"], json!("hello"));
}

#[test]
fn test_command_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = Bridge::setup(&Config::with_data_dir(dir.path()), Hub::new()).unwrap();

    let result = call(&bridge, "nonexistent_command", json!({}));
    assert_eq!(result["error"], json!(true));
    assert_eq!(result["category"], json!("command"));
}

#[test]
fn test_list_commands() {
    let commands = list_commands();

    assert!(commands.contains(&"ping".to_string()));
    assert!(commands.contains(&"snapshot.import".to_string()));
}

#[test]
fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_data_dir(dir.path());

    let id = {
        let bridge = Bridge::setup(&config, Hub::new()).unwrap();
        let added = call(
            &bridge,
            "prompts.upsert",
            json!({"name": "Reviewer", "content": "Check the diff", "tags": ["code"]}),
        );
        call(&bridge, "settings.set", json!({"insertMode": "append"}));
        added["prompt"]["id"].clone()
    };

    let bridge = Bridge::setup(&config, Hub::new()).unwrap();
    let state = call(&bridge, "state.read", json!({}));
    let prompts = state["prompts"].as_array().unwrap();

    // Seeded default plus the one we added; no second seeding on reopen
    assert_eq!(prompts.len(), 2);
    assert!(prompts.iter().any(|p| p["id"] == id && p["tags"] == json!(["code"])));
    assert_eq!(state["settings"]["insertMode"], json!("append"));
}

#[test]
fn test_export_import_between_installs() {
    let source_dir = tempfile::tempdir().unwrap();
    let source = Bridge::setup(&Config::with_data_dir(source_dir.path()), Hub::new()).unwrap();
    call(&source, "prompts.upsert", json!({"name": "B", "content": "b"}));
    call(&source, "settings.set", json!({"theme": "dark"}));
    let exported = call(&source, "snapshot.export", json!({}));

    let target_dir = tempfile::tempdir().unwrap();
    let target = Bridge::setup(&Config::with_data_dir(target_dir.path()), Hub::new()).unwrap();
    call(&target, "prompts.upsert", json!({"name": "Doomed", "content": "gone"}));

    let imported = call(&target, "snapshot.import", json!({"text": exported["text"]}));
    assert_eq!(imported["count"], json!(2));

    let state = call(&target, "state.read", json!({}));
    let names: Vec<_> = state["prompts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    assert!(!names.contains(&"Doomed".to_string()));
    assert_eq!(state["settings"]["theme"], json!("dark"));
}

#[test]
fn test_empty_import_requires_force() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = Bridge::setup(&Config::with_data_dir(dir.path()), Hub::new()).unwrap();
    let empty = json!({"version": 1, "settings": {}, "prompts": []}).to_string();

    let refused = call(&bridge, "snapshot.import", json!({"text": empty}));
    assert_eq!(refused["category"], json!("validation"));
    assert_eq!(call(&bridge, "prompts.list", json!({}))["prompts"].as_array().unwrap().len(), 1);

    let forced = call(&bridge, "snapshot.import", json!({"text": empty, "force": true}));
    assert_eq!(forced["count"], json!(0));
    assert_eq!(call(&bridge, "prompts.list", json!({}))["prompts"], json!([]));
}
