//! 编译产物与脚本注册表

use crate::bytecode::Chunk;
use crate::compiler::compile;
use crate::error::CompileError;
use crate::value::ValueType;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use zephyr_config::CompilerConfig;
use zephyr_log::{info, Logger};

/// 初始化代码块名
pub const INIT_CHUNK: &str = "<init>";

/// 函数代码块名的前缀：`function Name`
pub const FUNCTION_CHUNK_PREFIX: &str = "function ";

pub fn function_chunk_name(function: &str) -> String {
    format!("{FUNCTION_CHUNK_PREFIX}{function}")
}

/// 状态事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Enter,
    Update,
    Exit,
}

impl Handler {
    pub fn as_str(&self) -> &'static str {
        match self {
            Handler::Enter => "onEnter",
            Handler::Update => "onUpdate",
            Handler::Exit => "onExit",
        }
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一个状态：三个可选的事件处理块
#[derive(Debug, Clone, PartialEq)]
pub struct StateDefinition {
    pub name: String,
    pub on_enter: Option<Chunk>,
    pub on_update: Option<Chunk>,
    pub on_exit: Option<Chunk>,
}

impl StateDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            on_enter: None,
            on_update: None,
            on_exit: None,
        }
    }

    pub fn handler(&self, handler: Handler) -> Option<&Chunk> {
        match handler {
            Handler::Enter => self.on_enter.as_ref(),
            Handler::Update => self.on_update.as_ref(),
            Handler::Exit => self.on_exit.as_ref(),
        }
    }

    pub(crate) fn slot_mut(&mut self, handler: Handler) -> &mut Option<Chunk> {
        match handler {
            Handler::Enter => &mut self.on_enter,
            Handler::Update => &mut self.on_update,
            Handler::Exit => &mut self.on_exit,
        }
    }
}

/// 带类型的函数参数
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: ValueType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub params: Vec<Parameter>,
    pub chunk: Chunk,
}

/// 编译后的脚本定义，编译完成后只读，由所有实例共享
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledScriptDefinition {
    pub name: String,
    /// 按声明顺序，第一个是初始状态
    pub states: Vec<StateDefinition>,
    pub functions: BTreeMap<String, FunctionDefinition>,
    /// 顶层变量声明
    pub initializer: Chunk,
    pub diagnostics: Vec<CompileError>,
    /// 任一代码块编译失败即为 false，实例全部静默
    pub is_valid: bool,
}

impl CompiledScriptDefinition {
    pub fn initial_state(&self) -> Option<&str> {
        self.states.first().map(|s| s.name.as_str())
    }

    pub fn state(&self, name: &str) -> Option<&StateDefinition> {
        self.states.iter().find(|s| s.name == name)
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.state(name).is_some()
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDefinition> {
        self.functions.get(name)
    }

    /// 按名称查找代码块：`State.onUpdate`、`function Name`（或只写函数名）、`<init>`
    pub fn chunk(&self, name: &str) -> Option<&Chunk> {
        if name == INIT_CHUNK {
            return Some(&self.initializer);
        }
        let function_name = name
            .strip_prefix(FUNCTION_CHUNK_PREFIX)
            .map(str::trim)
            .unwrap_or(name);
        if let Some(function) = self.functions.get(function_name) {
            return Some(&function.chunk);
        }
        let (state, handler) = name.split_once('.')?;
        let handler = match handler {
            "onEnter" => Handler::Enter,
            "onUpdate" => Handler::Update,
            "onExit" => Handler::Exit,
            _ => return None,
        };
        self.state(state)?.handler(handler)
    }

    /// 所有已编译代码块的名称
    pub fn chunk_names(&self) -> Vec<String> {
        let mut names = vec![INIT_CHUNK.to_string()];
        for state in &self.states {
            for handler in [Handler::Enter, Handler::Update, Handler::Exit] {
                if let Some(chunk) = state.handler(handler) {
                    names.push(chunk.name.clone());
                }
            }
        }
        names.extend(self.functions.values().map(|f| f.chunk.name.clone()));
        names
    }
}

/// 脚本注册表：按脚本名缓存编译结果，保留源码以便热重载
///
/// 由宿主持有并显式传递，没有全局实例。
pub struct ScriptRegistry {
    definitions: BTreeMap<String, Arc<CompiledScriptDefinition>>,
    sources: BTreeMap<String, String>,
    config: CompilerConfig,
    logger: Arc<Logger>,
}

impl ScriptRegistry {
    pub fn new(config: CompilerConfig, logger: Arc<Logger>) -> Self {
        Self {
            definitions: BTreeMap::new(),
            sources: BTreeMap::new(),
            config,
            logger,
        }
    }

    /// 编译并注册；无效的定义同样会被注册
    pub fn load(&mut self, name: &str, source: &str) -> Arc<CompiledScriptDefinition> {
        let definition = Arc::new(compile(name, source, &self.config, self.logger.clone()));
        info!(
            self.logger,
            "loaded script '{}': {} states, {} functions, {} diagnostics",
            name,
            definition.states.len(),
            definition.functions.len(),
            definition.diagnostics.len()
        );
        self.sources.insert(name.to_string(), source.to_string());
        self.definitions
            .insert(name.to_string(), Arc::clone(&definition));
        definition
    }

    pub fn get(&self, name: &str) -> Option<Arc<CompiledScriptDefinition>> {
        self.definitions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn source(&self, name: &str) -> Option<&str> {
        self.sources.get(name).map(String::as_str)
    }

    /// 移除定义和源码
    pub fn remove(&mut self, name: &str) -> Option<Arc<CompiledScriptDefinition>> {
        self.sources.remove(name);
        self.definitions.remove(name)
    }

    /// 清空已编译的定义，保留源码
    pub fn clear(&mut self) {
        self.definitions.clear();
    }

    /// 用保留的源码重新编译
    pub fn reload(&mut self, name: &str) -> Option<Arc<CompiledScriptDefinition>> {
        let source = self.sources.get(name)?.clone();
        Some(self.load(name, &source))
    }

    /// 清空后重新编译所有保留的源码
    pub fn reload_all(&mut self) -> Vec<Arc<CompiledScriptDefinition>> {
        self.clear();
        let sources: Vec<(String, String)> = self
            .sources
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        sources
            .into_iter()
            .map(|(name, source)| self.load(&name, &source))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.definitions.keys().cloned().collect()
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl fmt::Debug for ScriptRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRegistry")
            .field("scripts", &self.names())
            .field("config", &self.config)
            .finish()
    }
}
