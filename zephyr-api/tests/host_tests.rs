//! ScriptHost 集成测试：加载、挂载、逐帧更新、事件、热重载

mod common;
use common::TestHost;
use zephyr_api::{EntityId, EventArgs, ZephyrError, ZephyrValue};

const GUARD: &str = r#"
    number alertness = 0;

    function Hear(number loudness) {
        alertness = alertness + loudness;
        return alertness;
    }

    state Idle {
        onEnter { Print("idle"); }
        onUpdate {
            if (alertness > 5) { changeState("Alert"); }
        }
    }

    state Alert {
        onEnter { Print("alert"); health = health + 10; }
        onUpdate { Print("searching"); }
    }
"#;

#[test]
fn test_load_attach_and_update() {
    let mut t = TestHost::new();
    t.host.load_script("guard", GUARD).unwrap();
    let id = t.host.spawn_entity(TestHost::actor(50.0));
    t.host.attach_script(id, "guard", EventArgs::new()).unwrap();

    assert_eq!(t.host.current_state(id), Some("Idle"));
    assert_eq!(t.printed(), vec!["idle"]);

    let result = t
        .host
        .fire_script_event(id, "Hear", &EventArgs::new().with("loudness", 8))
        .unwrap();
    assert_eq!(result.return_value(), ZephyrValue::Number(8.0));

    t.host.update();
    assert_eq!(t.host.current_state(id), Some("Alert"));
    assert_eq!(
        t.host.entity(id).and_then(|e| e.get_field("health")),
        Some(ZephyrValue::Number(60.0))
    );

    t.host.update();
    assert_eq!(t.printed(), vec!["idle", "alert", "searching"]);
}

#[test]
fn test_load_invalid_script_returns_diagnostics() {
    let mut t = TestHost::new();
    let err = t
        .host
        .load_script("broken", "state A { onUpdate { changeState(\"B\"); } }")
        .unwrap_err();

    assert!(matches!(err, ZephyrError::Compile(_)));
    assert_eq!(err.diagnostics().len(), 1);
    // 无效定义仍然注册，挂载的实例不运行
    assert!(t.host.registry().contains("broken"));
    let id = t.host.spawn_entity(TestHost::actor(1.0));
    t.host.attach_script(id, "broken", EventArgs::new()).unwrap();
    t.host.update();
    assert!(t.host.instance(id).is_some_and(|i| !i.is_active()));
}

#[test]
fn test_attach_errors() {
    let mut t = TestHost::new();
    let id = t.host.spawn_entity(TestHost::actor(1.0));
    assert!(matches!(
        t.host.attach_script(id, "missing", EventArgs::new()),
        Err(ZephyrError::UnknownScript(_))
    ));

    t.host.load_script("guard", GUARD).unwrap();
    assert!(matches!(
        t.host.attach_script(EntityId(99), "guard", EventArgs::new()),
        Err(ZephyrError::UnknownEntity(_))
    ));
    assert!(matches!(
        t.host.change_state(id, "Alert"),
        Err(ZephyrError::UnknownEntity(_))
    ));
}

#[test]
fn test_initial_values_and_initialize_script_values() {
    let mut t = TestHost::new();
    t.host.load_script("guard", GUARD).unwrap();
    let id = t.host.spawn_entity(TestHost::actor(1.0));
    t.host
        .attach_script(id, "guard", EventArgs::new().with("alertness", 3))
        .unwrap();
    assert_eq!(t.host.variable(id, "alertness"), Some(&ZephyrValue::Number(3.0)));

    t.host
        .initialize_script_values(id, &EventArgs::new().with("alertness", 9))
        .unwrap();
    t.host.update();
    assert_eq!(t.host.current_state(id), Some("Alert"));
}

#[test]
fn test_change_state_from_host() {
    let mut t = TestHost::new();
    t.host.load_script("guard", GUARD).unwrap();
    let id = t.host.spawn_entity(TestHost::actor(1.0));
    t.host.attach_script(id, "guard", EventArgs::new()).unwrap();

    assert!(t.host.change_state(id, "Alert").unwrap());
    assert!(!t.host.change_state(id, "Nowhere").unwrap());
    assert_eq!(t.host.current_state(id), Some("Alert"));
    assert_eq!(t.warnings(), 1);
}

#[test]
fn test_broadcast_in_entity_order() {
    let mut t = TestHost::new();
    t.host.load_script("guard", GUARD).unwrap();
    let a = t.host.spawn_entity(TestHost::actor(1.0));
    let b = t.host.spawn_entity(TestHost::actor(1.0));
    t.host.attach_script(b, "guard", EventArgs::new().with("alertness", 10)).unwrap();
    t.host.attach_script(a, "guard", EventArgs::new()).unwrap();

    let results = t.host.broadcast_event("Hear", &EventArgs::new().with("loudness", 1));
    let ids: Vec<EntityId> = results.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![a, b]);
    assert_eq!(results[0].1.return_value(), ZephyrValue::Number(1.0));
    assert_eq!(results[1].1.return_value(), ZephyrValue::Number(11.0));
}

#[test]
fn test_despawn_removes_instance() {
    let mut t = TestHost::new();
    t.host.load_script("guard", GUARD).unwrap();
    let id = t.host.spawn_entity(TestHost::actor(1.0));
    t.host.attach_script(id, "guard", EventArgs::new()).unwrap();

    assert!(t.host.despawn(id));
    assert!(!t.host.despawn(id));
    assert_eq!(t.host.instance_count(), 0);
    assert_eq!(t.host.current_state(id), None);
    t.host.update();
}

#[test]
fn test_reload_script_source_rebuilds_instances() {
    let mut t = TestHost::new();
    t.host.load_script("guard", GUARD).unwrap();
    let id = t.host.spawn_entity(TestHost::actor(1.0));
    t.host
        .attach_script(id, "guard", EventArgs::new().with("alertness", 2))
        .unwrap();
    t.host.change_state(id, "Alert").unwrap();
    t.clear_printed();

    let patched = GUARD.replace("Print(\"idle\")", "Print(\"idle v2\")");
    t.host.reload_script_source("guard", &patched).unwrap();

    // 重建后回到初始状态，初始值重新应用
    assert_eq!(t.host.current_state(id), Some("Idle"));
    assert_eq!(t.host.variable(id, "alertness"), Some(&ZephyrValue::Number(2.0)));
    assert_eq!(t.printed(), vec!["idle v2"]);
    assert_eq!(t.host.registry().source("guard"), Some(patched.as_str()));
}

#[test]
fn test_reload_broken_source_makes_instances_inert() {
    let mut t = TestHost::new();
    t.host.load_script("guard", GUARD).unwrap();
    let id = t.host.spawn_entity(TestHost::actor(1.0));
    t.host.attach_script(id, "guard", EventArgs::new()).unwrap();
    t.clear_printed();

    let err = t
        .host
        .reload_script_source("guard", "state Idle { onUpdate { Print(; } }")
        .unwrap_err();
    assert_eq!(err.phase(), "compiler");

    t.host.update();
    assert!(t.printed().is_empty());

    // 修好后重新运行
    t.host.reload_script_source("guard", GUARD).unwrap();
    assert_eq!(t.printed(), vec!["idle"]);
}

#[test]
fn test_reload_all_and_unknown_script() {
    let mut t = TestHost::new();
    t.host.load_script("guard", GUARD).unwrap();
    t.host.load_script("door", "state Closed { }").unwrap();
    assert!(t.host.reload_all().is_ok());
    assert_eq!(t.host.registry().len(), 2);
    assert!(t.host.reload_script("guard").is_ok());
    assert!(matches!(
        t.host.reload_script("window"),
        Err(ZephyrError::UnknownScript(_))
    ));
}

#[test]
fn test_dump_chunk() {
    let mut t = TestHost::new();
    t.host.load_script("guard", GUARD).unwrap();

    let text = t.host.dump_chunk("guard", "Idle.onUpdate").unwrap();
    assert!(text.starts_with("== Idle.onUpdate =="));
    assert!(text.contains("CHANGE_STATE"));

    let text = t.host.dump_chunk("guard", "function Hear").unwrap();
    assert!(text.starts_with("== function Hear =="));
    assert!(text.contains("RETURN"));
    assert_eq!(t.host.dump_chunk("guard", "Hear").ok(), Some(text));
    assert!(t.host.dump_chunk("guard", "<init>").is_ok());

    assert!(matches!(
        t.host.dump_chunk("guard", "Idle.onExit"),
        Err(ZephyrError::UnknownChunk { .. })
    ));
    assert!(matches!(
        t.host.dump_chunk("nope", "Idle.onUpdate"),
        Err(ZephyrError::UnknownScript(_))
    ));
}

#[test]
fn test_runtime_faults_never_escape() {
    let mut t = TestHost::new();
    t.host
        .load_script(
            "faulty",
            r#"state Main { onUpdate { Print(1 + "a"); Print(nothing.x); Missing(); Print("done"); } }"#,
        )
        .unwrap();
    let id = t.host.spawn_entity(TestHost::actor(1.0));
    t.host.attach_script(id, "faulty", EventArgs::new()).unwrap();
    t.host.update();

    assert_eq!(t.printed(), vec!["null", "null", "done"]);
    assert!(t.warnings() >= 3);
}
