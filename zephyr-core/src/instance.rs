//! 脚本实例：把编译好的定义绑定到一个实体上的状态机

use crate::bytecode::Chunk;
use crate::definition::{CompiledScriptDefinition, Handler};
use crate::entity::EntityId;
use crate::error::RuntimeError;
use crate::event::{EventArgs, TARGET_KEY};
use crate::value::ZephyrValue;
use crate::vm::{ExecutionEnv, Scope, Vm};
use std::sync::Arc;
use zephyr_log::{debug, diag, Level, Location};

/// 一个实体上运行的脚本
///
/// 通过 `EntityId` 引用实体，从不持有实体本身。定义无效时所有操作都是空操作。
#[derive(Debug, Clone)]
pub struct ScriptInstance {
    entity: EntityId,
    definition: Arc<CompiledScriptDefinition>,
    current_state: String,
    variables: Scope,
    pending_state: Option<String>,
    /// 创建时的初始值，重载时重新应用
    initial_values: EventArgs,
}

impl ScriptInstance {
    pub fn new(entity: EntityId, definition: Arc<CompiledScriptDefinition>) -> Self {
        let current_state = definition.initial_state().unwrap_or_default().to_string();
        Self {
            entity,
            definition,
            current_state,
            variables: Scope::new(),
            pending_state: None,
            initial_values: EventArgs::new(),
        }
    }

    /// 运行初始化块，应用初始值，进入初始状态
    pub fn start(&mut self, env: &mut ExecutionEnv, initial_values: EventArgs) {
        self.initial_values = initial_values;
        if !self.is_active() {
            debug!(
                env.logger,
                "script '{}' on {} is inert (compile failed)",
                self.definition.name,
                self.entity
            );
            return;
        }

        let definition = Arc::clone(&self.definition);
        self.run_chunk(env, &definition.initializer, Scope::new());
        let values = self.initial_values.clone();
        self.initialize_values(env, &values);

        self.run_handler(env, Handler::Enter);
        self.apply_pending(env);
    }

    /// 一帧：运行当前状态的 onUpdate，然后应用其间请求的状态切换
    pub fn update(&mut self, env: &mut ExecutionEnv) {
        if !self.is_active() {
            return;
        }
        self.run_handler(env, Handler::Update);
        self.apply_pending(env);
    }

    /// 宿主请求的状态切换，立即执行；目标不存在时返回 false
    pub fn change_state(&mut self, env: &mut ExecutionEnv, target: &str) -> bool {
        if !self.is_active() {
            return false;
        }
        let changed = self.transition(env, target);
        self.apply_pending(env);
        changed
    }

    /// 宿主触发脚本事件
    ///
    /// 优先调用同名脚本函数，否则调用原生处理器（`target` 为本实体）；
    /// 两者都不存在时记录警告，返回空参数包。
    pub fn fire_event(&mut self, env: &mut ExecutionEnv, name: &str, args: &EventArgs) -> EventArgs {
        if !self.is_active() {
            return EventArgs::new();
        }

        let definition = Arc::clone(&self.definition);
        if let Some(function) = definition.function(name) {
            let result = {
                let mut vm = Vm::new(
                    env,
                    &definition,
                    &mut self.variables,
                    &mut self.pending_state,
                    self.entity,
                );
                vm.invoke(function, args)
            };
            self.apply_pending(env);
            return EventArgs::returning(result);
        }

        let mut native_args = args.clone();
        native_args.set(TARGET_KEY, self.entity);
        match env.natives.invoke(name, &native_args) {
            Ok(result) => result,
            Err(err) => {
                diag!(
                    env.logger,
                    Level::Warn,
                    Location::new(&self.definition.name, &self.current_state, 0),
                    "{}: {}",
                    err.category(),
                    err
                );
                EventArgs::new()
            }
        }
    }

    /// 覆盖实例变量；声明过类型的变量按类型转换
    pub fn initialize_values(&mut self, env: &mut ExecutionEnv, values: &EventArgs) {
        for (name, value) in values.iter() {
            let result = if self.variables.contains(name) {
                self.variables.assign(name, value.clone()).map(|_| ())
            } else {
                self.variables.define(name, None, value.clone())
            };
            if let Err(err) = result {
                diag!(
                    env.logger,
                    Level::Warn,
                    Location::new(&self.definition.name, "<init>", 0),
                    "{}: '{}': {}",
                    err.category(),
                    name,
                    err
                );
            }
        }
    }

    /// 丢弃尚未应用的状态切换
    pub fn discard_pending(&mut self) -> Option<String> {
        self.pending_state.take()
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn definition(&self) -> &Arc<CompiledScriptDefinition> {
        &self.definition
    }

    pub fn current_state(&self) -> &str {
        &self.current_state
    }

    pub fn pending_state(&self) -> Option<&str> {
        self.pending_state.as_deref()
    }

    pub fn variable(&self, name: &str) -> Option<&ZephyrValue> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> &Scope {
        &self.variables
    }

    pub fn initial_values(&self) -> &EventArgs {
        &self.initial_values
    }

    /// 定义编译成功时实例才会运行
    pub fn is_active(&self) -> bool {
        self.definition.is_valid
    }

    // ===== 状态机 =====

    /// onExit → 切换 → onEnter；onExit 中的切换请求被丢弃
    fn transition(&mut self, env: &mut ExecutionEnv, target: &str) -> bool {
        if !self.definition.has_state(target) {
            let err = RuntimeError::UnknownState(target.to_string());
            diag!(
                env.logger,
                Level::Warn,
                Location::new(&self.definition.name, &self.current_state, 0),
                "{}: {}",
                err.category(),
                err
            );
            return false;
        }

        self.run_handler(env, Handler::Exit);
        self.pending_state = None;

        debug!(
            env.logger,
            "{} '{}': {} -> {}",
            self.entity,
            self.definition.name,
            self.current_state,
            target
        );
        self.current_state = target.to_string();
        self.run_handler(env, Handler::Enter);
        true
    }

    /// 应用代码块结束时留下的切换请求；onEnter 可以继续请求，链长受限
    fn apply_pending(&mut self, env: &mut ExecutionEnv) {
        let mut applied = 0;
        while let Some(target) = self.pending_state.take() {
            if applied >= env.limits.max_transition_chain {
                diag!(
                    env.logger,
                    Level::Warn,
                    Location::new(&self.definition.name, &self.current_state, 0),
                    "RuntimeLimitError: transition chain exceeded {} steps, '{}' dropped",
                    env.limits.max_transition_chain,
                    target
                );
                break;
            }
            self.transition(env, &target);
            applied += 1;
        }
    }

    fn run_handler(&mut self, env: &mut ExecutionEnv, handler: Handler) {
        let definition = Arc::clone(&self.definition);
        let chunk = definition
            .state(&self.current_state)
            .and_then(|state| state.handler(handler));
        if let Some(chunk) = chunk {
            self.run_chunk(env, chunk, Scope::new());
        }
    }

    fn run_chunk(&mut self, env: &mut ExecutionEnv, chunk: &Chunk, locals: Scope) -> ZephyrValue {
        let definition = Arc::clone(&self.definition);
        let mut vm = Vm::new(
            env,
            &definition,
            &mut self.variables,
            &mut self.pending_state,
            self.entity,
        );
        vm.execute(chunk, locals)
    }
}
