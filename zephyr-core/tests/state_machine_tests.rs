//! 状态机测试：切换时机、onEnter / onExit 顺序、事件分派

mod common;
use common::Harness;
use zephyr_core::{EventArgs, ZephyrValue};

const TRAFFIC: &str = r#"
    state Idle {
        onEnter { Print("enter Idle"); }
        onUpdate {
            changeState("Run");
            Print("after request");
        }
        onExit { Print("exit Idle"); }
    }
    state Run {
        onEnter { Print("enter Run"); }
        onUpdate { Print("run"); }
        onExit { Print("exit Run"); }
    }
"#;

#[test]
fn test_start_enters_first_state() {
    let mut harness = Harness::new();
    let instance = harness.spawn(TRAFFIC);
    assert!(instance.is_active());
    assert_eq!(instance.current_state(), "Idle");
    assert_eq!(harness.printed(), vec!["enter Idle"]);
}

#[test]
fn test_change_state_is_deferred_to_chunk_end() {
    let mut harness = Harness::new();
    let mut instance = harness.spawn(TRAFFIC);
    harness.clear_printed();

    harness.update(&mut instance);
    // 请求之后的语句仍然执行，然后才是 onExit → onEnter
    assert_eq!(
        harness.printed(),
        vec!["after request", "exit Idle", "enter Run"]
    );
    assert_eq!(instance.current_state(), "Run");
    assert_eq!(instance.pending_state(), None);

    harness.clear_printed();
    harness.update(&mut instance);
    assert_eq!(harness.printed(), vec!["run"]);
}

#[test]
fn test_last_request_wins() {
    let mut harness = Harness::new();
    let mut instance = harness.spawn(
        r#"
        state A { onUpdate { changeState("B"); changeState("C"); } }
        state B { onEnter { Print("B"); } }
        state C { onEnter { Print("C"); } }
        "#,
    );
    harness.update(&mut instance);
    assert_eq!(instance.current_state(), "C");
    assert_eq!(harness.printed(), vec!["C"]);
}

#[test]
fn test_unknown_runtime_target_keeps_state() {
    let mut harness = Harness::new();
    let mut instance = harness.spawn(
        r#"
        state Idle {
            onUpdate { string target = "Nowhere"; changeState(target); }
            onExit { Print("exit"); }
        }
        "#,
    );
    assert!(instance.is_active());

    harness.update(&mut instance);
    assert_eq!(instance.current_state(), "Idle");
    assert!(harness.printed().is_empty());
    assert_eq!(harness.warnings(), 1);
    assert_eq!(harness.logs.find("unknown state 'Nowhere'").len(), 1);
}

#[test]
fn test_host_change_state_runs_exit_then_enter() {
    let mut harness = Harness::new();
    let mut instance = harness.spawn(TRAFFIC);
    harness.clear_printed();

    let changed = harness.with_env(|env| instance.change_state(env, "Run"));
    assert!(changed);
    assert_eq!(harness.printed(), vec!["exit Idle", "enter Run"]);

    let changed = harness.with_env(|env| instance.change_state(env, "Missing"));
    assert!(!changed);
    assert_eq!(instance.current_state(), "Run");
}

#[test]
fn test_request_in_on_exit_is_discarded() {
    let mut harness = Harness::new();
    let mut instance = harness.spawn(
        r#"
        state A {
            onUpdate { changeState("B"); }
            onExit { changeState("C"); }
        }
        state B { }
        state C { }
        "#,
    );
    harness.update(&mut instance);
    assert_eq!(instance.current_state(), "B");
}

#[test]
fn test_on_enter_request_chains() {
    let mut harness = Harness::new();
    let mut instance = harness.spawn(
        r#"
        state A { onUpdate { changeState("B"); } }
        state B { onEnter { Print("B"); changeState("C"); } }
        state C { onEnter { Print("C"); } }
        "#,
    );
    harness.update(&mut instance);
    assert_eq!(instance.current_state(), "C");
    assert_eq!(harness.printed(), vec!["B", "C"]);
}

#[test]
fn test_transition_chain_limit() {
    let mut harness = Harness::new();
    let instance = harness.spawn(
        r#"
        state A { onEnter { Print("A"); changeState("B"); } }
        state B { onEnter { Print("B"); changeState("A"); } }
        "#,
    );
    // 初始 onEnter + 16 次切换，然后丢弃请求
    assert_eq!(harness.printed().len(), 17);
    assert_eq!(instance.current_state(), "A");
    assert_eq!(instance.pending_state(), None);
    assert_eq!(harness.warnings(), 1);
    assert_eq!(harness.logs.find("transition chain exceeded").len(), 1);
}

#[test]
fn test_fire_event_binds_parameters_by_name() {
    let mut harness = Harness::new();
    let mut instance = harness.spawn(
        r#"
        function Damage(number amount, string source) {
            health = health - amount;
            Print(source);
            return health;
        }
        state Main { }
        "#,
    );

    let args = EventArgs::new().with("source", "trap").with("amount", 30);
    let result = harness.with_env(|env| instance.fire_event(env, "Damage", &args));

    assert_eq!(result.return_value(), ZephyrValue::Number(70.0));
    assert_eq!(harness.printed(), vec!["trap"]);
    assert_eq!(
        harness.field(instance.entity(), "health"),
        Some(ZephyrValue::Number(70.0))
    );
}

#[test]
fn test_fire_event_positional_arguments() {
    let mut harness = Harness::new();
    let mut instance = harness.spawn(
        "function Twice(number n) { return n * 2; } state Main { }",
    );
    let mut args = EventArgs::new();
    args.push(21);
    let result = harness.with_env(|env| instance.fire_event(env, "Twice", &args));
    assert_eq!(result.return_value(), ZephyrValue::Number(42.0));
}

#[test]
fn test_fire_event_falls_back_to_native() {
    let mut harness = Harness::new();
    let mut instance = harness.spawn("state Main { }");
    let mut args = EventArgs::new();
    args.push("hello");
    harness.with_env(|env| instance.fire_event(env, "Print", &args));
    assert_eq!(harness.printed(), vec!["hello"]);
}

#[test]
fn test_unhandled_event_is_noop() {
    let mut harness = Harness::new();
    let mut instance = harness.spawn("number score = 5; state Main { }");

    let result = harness.with_env(|env| {
        instance.fire_event(env, "Nope", &EventArgs::new().with("x", 1))
    });

    assert!(result.is_empty());
    assert_eq!(harness.warnings(), 1);
    assert_eq!(instance.variable("score"), Some(&ZephyrValue::Number(5.0)));
    assert_eq!(instance.current_state(), "Main");
}

#[test]
fn test_instances_are_independent() {
    let mut harness = Harness::new();
    let source = "number ticks = 0; state Main { onUpdate { ticks = ticks + 1; } }";
    let definition = harness.compile(source);
    let mut first = harness.spawn_with(definition.clone(), EventArgs::new());
    let mut second = harness.spawn_with(definition, EventArgs::new());

    harness.update(&mut first);
    harness.update(&mut first);
    harness.update(&mut second);

    assert_eq!(first.variable("ticks"), Some(&ZephyrValue::Number(2.0)));
    assert_eq!(second.variable("ticks"), Some(&ZephyrValue::Number(1.0)));
    assert_ne!(first.entity(), second.entity());
}

#[test]
fn test_initial_values_override_initializer() {
    let mut harness = Harness::new();
    let definition = harness.compile(
        "number hp = 10; string tag = \"none\"; state Main { onEnter { Print(hp); Print(tag); } }",
    );
    let values = EventArgs::new().with("hp", true).with("tag", "boss");
    let instance = harness.spawn_with(definition, values);

    // bool 按 number 槽转换为 1
    assert_eq!(harness.printed(), vec!["1", "boss"]);
    assert_eq!(instance.variable("hp"), Some(&ZephyrValue::Number(1.0)));
    assert_eq!(instance.initial_values().len(), 2);
}

#[test]
fn test_invalid_definition_is_inert() {
    let mut harness = Harness::new();
    let mut instance = harness.spawn(
        r#"
        state Main {
            onEnter { Print("enter"); }
            onUpdate { number x = ; }
        }
        "#,
    );
    assert!(!instance.is_active());
    assert!(!instance.definition().diagnostics.is_empty());

    harness.logs.clear();
    harness.update(&mut instance);
    let changed = harness.with_env(|env| instance.change_state(env, "Main"));
    let result = harness.with_env(|env| instance.fire_event(env, "Print", &EventArgs::new()));

    assert!(!changed);
    assert!(result.is_empty());
    assert!(harness.printed().is_empty());
    assert_eq!(harness.warnings(), 0);
}
