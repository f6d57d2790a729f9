//! Zephyr 核心
//!
//! 嵌入式游戏脚本语言：源码 → 词法分析 → 单遍编译为字节码块 →
//! 栈式虚拟机执行，由状态机运行时把脚本绑定到游戏实体上。
//!
//! ```text
//! lexer/      - Token 流（错误 token 不中断扫描）
//! compiler/   - 递归下降 + 优先级爬升，直接生成 Chunk
//! bytecode/   - OpCode 与 Chunk（常量池、行号表、反汇编）
//! definition  - CompiledScriptDefinition 与 ScriptRegistry
//! vm/         - 字节码解释器
//! instance    - ScriptInstance 状态机
//! event       - EventArgs 与原生处理器注册表
//! entity      - EntityId 与实体字段能力接口
//! ```

pub mod bytecode;
pub mod compiler;
pub mod definition;
pub mod entity;
pub mod error;
pub mod event;
pub mod instance;
pub mod lexer;
pub mod value;
pub mod vm;

pub use bytecode::{Chunk, ChunkError, OpCode};
pub use compiler::compile;
pub use definition::{
    function_chunk_name, CompiledScriptDefinition, FunctionDefinition, Handler, Parameter,
    ScriptRegistry, StateDefinition, FUNCTION_CHUNK_PREFIX, INIT_CHUNK,
};
pub use entity::{EntityId, EntityRegistry, FieldEntity, ScriptEntity};
pub use error::{CompileError, CompileErrorKind, LexError, LexErrorKind, RuntimeError};
pub use event::{EventArgs, EventBridge, RETURN_KEY, TARGET_KEY};
pub use instance::ScriptInstance;
pub use lexer::{tokenize, Lexer, Token, TokenKind};
pub use value::{ValueType, Vec2, Vec3, ZephyrValue};
pub use vm::{ExecutionEnv, Scope, Variable, Vm};
