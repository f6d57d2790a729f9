//! 字节码解释器
//!
//! 每次代码块调用创建一个执行上下文（值栈 + 局部作用域），除了所属实例的
//! 变量作用域以外不在调用之间保留任何状态。运行时错误在检测点记录一次，
//! 替换为安全默认值后继续执行；只有致命错误（栈溢出、损坏的字节码）
//! 中止当前代码块。

mod execution;
mod operators;
mod scope;

pub use operators::{
    add_values, compare_values, div_values, equal_values, mul_values, negate_value, not_value,
    sub_values,
};
pub use scope::{Scope, Variable};

use crate::bytecode::Chunk;
use crate::definition::{CompiledScriptDefinition, FunctionDefinition};
use crate::entity::{EntityId, EntityRegistry};
use crate::error::RuntimeError;
use crate::event::{EventArgs, EventBridge, TARGET_KEY};
use crate::value::{ValueType, ZephyrValue};
use std::sync::Arc;
use zephyr_config::LimitConfig;
use zephyr_log::{diag, Level, Location, Logger};

/// 一帧内所有实例共享的宿主环境
pub struct ExecutionEnv<'a> {
    pub natives: &'a EventBridge,
    pub entities: &'a mut EntityRegistry,
    pub limits: &'a LimitConfig,
    pub logger: &'a Arc<Logger>,
}

/// 代表一个脚本实例执行代码块
pub struct Vm<'a, 'e> {
    env: &'a mut ExecutionEnv<'e>,
    definition: &'a CompiledScriptDefinition,
    /// 实例作用域
    variables: &'a mut Scope,
    /// CHANGE_STATE 请求，代码块结束后由实例应用
    pending_state: &'a mut Option<String>,
    entity: EntityId,
    /// 脚本函数嵌套深度
    depth: usize,
}

/// 一次代码块调用的执行上下文
struct Frame<'c> {
    chunk: &'c Chunk,
    ip: usize,
    /// 当前指令的起始位置（诊断用）
    op_start: usize,
    stack: Vec<ZephyrValue>,
    locals: Scope,
}

impl<'a, 'e> Vm<'a, 'e> {
    pub fn new(
        env: &'a mut ExecutionEnv<'e>,
        definition: &'a CompiledScriptDefinition,
        variables: &'a mut Scope,
        pending_state: &'a mut Option<String>,
        entity: EntityId,
    ) -> Self {
        Self {
            env,
            definition,
            variables,
            pending_state,
            entity,
            depth: 0,
        }
    }

    /// 执行代码块直到 RETURN 或结尾，返回结果值
    pub fn execute(&mut self, chunk: &Chunk, locals: Scope) -> ZephyrValue {
        let mut frame = Frame {
            chunk,
            ip: 0,
            op_start: 0,
            stack: Vec::new(),
            locals,
        };
        loop {
            match self.step(&mut frame) {
                Ok(Some(value)) => return value,
                Ok(None) => {}
                Err(err) => {
                    self.report(frame.chunk, frame.op_start, &err);
                    return ZephyrValue::NONE;
                }
            }
        }
    }

    /// 宿主触发的脚本函数调用：参数先按名称绑定，再按位置
    pub fn invoke(&mut self, function: &FunctionDefinition, args: &EventArgs) -> ZephyrValue {
        let mut locals = Scope::new();
        for (i, param) in function.params.iter().enumerate() {
            let value = args
                .get(&param.name)
                .or_else(|| args.positional(i))
                .cloned()
                .unwrap_or(ZephyrValue::NONE);
            if let Err(err) = locals.define(param.name.as_str(), Some(param.ty), value) {
                self.report(&function.chunk, 0, &err);
            }
        }
        self.execute(&function.chunk, locals)
    }

    // ===== 调用 =====

    /// FUNCTION_CALL / MEMBER_FUNCTION_CALL 的分派
    fn call(
        &mut self,
        frame: &Frame,
        name: &str,
        args: Vec<ZephyrValue>,
        receiver: Option<ZephyrValue>,
    ) -> Result<ZephyrValue, RuntimeError> {
        let definition = self.definition;
        let own_receiver = match &receiver {
            None => true,
            Some(value) => value.get_as_entity() == Some(self.entity),
        };
        if own_receiver {
            if let Some(function) = definition.function(name) {
                return self.call_script(frame, function, args);
            }
        }
        self.call_native(name, args, receiver)
    }

    fn call_script(
        &mut self,
        frame: &Frame,
        function: &FunctionDefinition,
        args: Vec<ZephyrValue>,
    ) -> Result<ZephyrValue, RuntimeError> {
        let limit = self.env.limits.max_call_depth;
        if self.depth >= limit {
            return Err(RuntimeError::CallDepthExceeded(limit));
        }

        if args.len() > function.params.len() {
            diag!(
                self.env.logger,
                Level::Warn,
                self.location(frame.chunk, frame.op_start),
                "'{}' takes {} arguments, {} extra ignored",
                function.name,
                function.params.len(),
                args.len() - function.params.len()
            );
        }

        // 按位置绑定，缺少的参数取零值
        let mut locals = Scope::new();
        let mut args = args.into_iter();
        for param in &function.params {
            let value = args.next().unwrap_or(ZephyrValue::NONE);
            if let Err(err) = locals.define(param.name.as_str(), Some(param.ty), value) {
                self.report(frame.chunk, frame.op_start, &err);
            }
        }

        self.depth += 1;
        let result = self.execute(&function.chunk, locals);
        self.depth -= 1;
        Ok(result)
    }

    fn call_native(
        &mut self,
        name: &str,
        args: Vec<ZephyrValue>,
        receiver: Option<ZephyrValue>,
    ) -> Result<ZephyrValue, RuntimeError> {
        let mut event = EventArgs::new();
        for arg in args {
            event.push(arg);
        }
        if let Some(target) = receiver {
            event.set(TARGET_KEY, target);
        }
        let result = self.env.natives.invoke(name, &event)?;
        Ok(result.return_value())
    }

    // ===== 变量 =====

    /// 查找顺序：局部 → 实例 → self → 所属实体的字段
    fn get_variable(&self, locals: &Scope, name: &str) -> Result<ZephyrValue, RuntimeError> {
        if let Some(value) = locals.get(name).or_else(|| self.variables.get(name)) {
            return Ok(value.clone());
        }
        if name == "self" {
            return Ok(ZephyrValue::EntityId(self.entity));
        }
        self.env
            .entities
            .get(self.entity)
            .and_then(|entity| entity.get_field(name))
            .ok_or_else(|| RuntimeError::UnknownVariable(name.to_string()))
    }

    fn set_variable(
        &mut self,
        locals: &mut Scope,
        name: &str,
        value: ZephyrValue,
    ) -> Result<(), RuntimeError> {
        if locals.contains(name) {
            return locals.assign(name, value).map(|_| ());
        }
        if self.variables.contains(name) {
            return self.variables.assign(name, value).map(|_| ());
        }
        if let Some(entity) = self.env.entities.get_mut(self.entity) {
            if entity.get_field(name).is_some() && entity.set_field(name, value) {
                return Ok(());
            }
        }
        Err(RuntimeError::UnknownVariable(name.to_string()))
    }

    fn define_variable(
        &mut self,
        locals: &mut Scope,
        name: &str,
        ty: ValueType,
        instance: bool,
        value: ZephyrValue,
    ) -> Result<(), RuntimeError> {
        let scope = if instance { &mut *self.variables } else { locals };
        scope.define(name, Some(ty), value)
    }

    // ===== 成员 =====

    fn get_member(&self, receiver: &ZephyrValue, member: &str) -> Result<ZephyrValue, RuntimeError> {
        let unknown = || RuntimeError::UnknownMember {
            member: member.to_string(),
            on: receiver.value_type(),
        };
        match receiver {
            ZephyrValue::Vec2(v) => v.component(member).map(ZephyrValue::Number).ok_or_else(unknown),
            ZephyrValue::Vec3(v) => v.component(member).map(ZephyrValue::Number).ok_or_else(unknown),
            ZephyrValue::EntityId(id) => self
                .env
                .entities
                .get(*id)
                .ok_or(RuntimeError::UnknownEntity(*id))?
                .get_field(member)
                .ok_or_else(unknown),
            _ => Err(unknown()),
        }
    }

    fn set_entity_field(
        &mut self,
        id: EntityId,
        member: &str,
        value: ZephyrValue,
    ) -> Result<(), RuntimeError> {
        let entity = self
            .env
            .entities
            .get_mut(id)
            .ok_or(RuntimeError::UnknownEntity(id))?;
        if entity.set_field(member, value) {
            Ok(())
        } else {
            Err(RuntimeError::UnknownMember {
                member: member.to_string(),
                on: ValueType::Entity,
            })
        }
    }

    // ===== 诊断 =====

    fn location(&self, chunk: &Chunk, offset: usize) -> Location {
        Location::new(&self.definition.name, &chunk.name, chunk.line_at(offset))
    }

    /// 在检测点记录运行时错误
    fn report(&self, chunk: &Chunk, offset: usize, err: &RuntimeError) {
        let level = if err.is_fatal() {
            Level::Error
        } else {
            Level::Warn
        };
        diag!(
            self.env.logger,
            level,
            self.location(chunk, offset),
            "{}: {}",
            err.category(),
            err
        );
    }
}
