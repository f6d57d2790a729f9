//! 测试辅助工具
//!
//! 提供编译、生成实例、逐帧运行脚本的辅助函数，以及记录输出的原生函数

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use zephyr_config::{CompilerConfig, LimitConfig};
use zephyr_core::{
    compile, CompiledScriptDefinition, EntityId, EntityRegistry, EventArgs, EventBridge,
    ExecutionEnv, FieldEntity, ScriptInstance, Vec2,
};
use zephyr_log::{Level, LogRingBuffer, Logger};

/// 一个最小的宿主：原生函数、实体表和捕获日志
pub struct Harness {
    pub natives: EventBridge,
    pub entities: EntityRegistry,
    pub limits: LimitConfig,
    pub logger: Arc<Logger>,
    pub logs: Arc<LogRingBuffer>,
    printed: Rc<RefCell<Vec<String>>>,
    counter: Rc<Cell<u32>>,
}

impl Harness {
    /// 注册 `Print(value)` 与 `Count()` 两个原生函数
    pub fn new() -> Self {
        let logs = LogRingBuffer::new(1024);
        let logger = Logger::new(Level::Debug).with_sink(logs.clone());

        let printed = Rc::new(RefCell::new(Vec::new()));
        let counter = Rc::new(Cell::new(0));

        let mut natives = EventBridge::new();
        let sink = printed.clone();
        natives.register("Print", move |args: &EventArgs| {
            let text = args
                .positional(0)
                .map(|v| v.to_string())
                .unwrap_or_default();
            sink.borrow_mut().push(text);
            EventArgs::new()
        });
        let calls = counter.clone();
        natives.register("Count", move |_: &EventArgs| {
            calls.set(calls.get() + 1);
            EventArgs::returning(true)
        });

        Self {
            natives,
            entities: EntityRegistry::new(),
            limits: LimitConfig::default(),
            logger,
            logs,
            printed,
            counter,
        }
    }

    pub fn compile(&self, source: &str) -> Arc<CompiledScriptDefinition> {
        Arc::new(compile(
            "test",
            source,
            &CompilerConfig::default(),
            self.logger.clone(),
        ))
    }

    /// 编译脚本，生成带 health / speed / pos 字段的实体并启动实例
    pub fn spawn(&mut self, source: &str) -> ScriptInstance {
        let definition = self.compile(source);
        self.spawn_with(definition, EventArgs::new())
    }

    pub fn spawn_with(
        &mut self,
        definition: Arc<CompiledScriptDefinition>,
        values: EventArgs,
    ) -> ScriptInstance {
        let entity = self.entities.insert(
            FieldEntity::new()
                .with_field("health", 100.0)
                .with_field("speed", 2.5)
                .with_field("pos", Vec2::new(1.0, 2.0)),
        );
        let mut instance = ScriptInstance::new(entity, definition);
        self.with_env(|env| instance.start(env, values));
        instance
    }

    pub fn with_env<R>(&mut self, f: impl FnOnce(&mut ExecutionEnv) -> R) -> R {
        let mut env = ExecutionEnv {
            natives: &self.natives,
            entities: &mut self.entities,
            limits: &self.limits,
            logger: &self.logger,
        };
        f(&mut env)
    }

    /// 运行一帧
    pub fn update(&mut self, instance: &mut ScriptInstance) {
        self.with_env(|env| instance.update(env));
    }

    pub fn field(&self, entity: EntityId, name: &str) -> Option<zephyr_core::ZephyrValue> {
        self.entities.get(entity).and_then(|e| e.get_field(name))
    }

    /// `Print` 收到的所有文本
    pub fn printed(&self) -> Vec<String> {
        self.printed.borrow().clone()
    }

    pub fn clear_printed(&self) {
        self.printed.borrow_mut().clear();
    }

    /// `Count` 被调用的次数
    pub fn count(&self) -> u32 {
        self.counter.get()
    }

    pub fn warnings(&self) -> usize {
        self.logs.count_at_least(Level::Warn)
    }
}

/// 运行只有一个 onUpdate 的脚本一帧，返回打印内容
pub fn run_update(body: &str) -> (Harness, Vec<String>) {
    let mut harness = Harness::new();
    let source = format!("state Main {{ onUpdate {{ {body} }} }}");
    let mut instance = harness.spawn(&source);
    assert!(
        instance.is_active(),
        "{:?}",
        instance.definition().diagnostics
    );
    harness.update(&mut instance);
    let printed = harness.printed();
    (harness, printed)
}
