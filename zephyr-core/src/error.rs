//! 错误类型
//!
//! 词法、编译错误会被收集成诊断列表；运行时错误从不越过 VM 边界，
//! 只在检测点记录一次日志，然后以默认值继续执行。

use crate::entity::EntityId;
use crate::value::ValueType;
use std::fmt;
use thiserror::Error;

/// 词法错误种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    InvalidChar,
    UnterminatedString,
    InvalidEscape,
    InvalidNumber,
    UnterminatedComment,
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LexErrorKind::InvalidChar => "invalid character",
            LexErrorKind::UnterminatedString => "unterminated string",
            LexErrorKind::InvalidEscape => "invalid escape sequence",
            LexErrorKind::InvalidNumber => "malformed number",
            LexErrorKind::UnterminatedComment => "unterminated block comment",
        };
        f.write_str(text)
    }
}

/// 词法错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {kind} '{text}'")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub line: usize,
    pub column: usize,
    /// 出错的源码片段
    pub text: String,
}

/// 编译错误种类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// 非法 token（来自词法错误）
    Lex(LexErrorKind),
    UnexpectedToken,
    UnexpectedEof,
    InvalidAssignmentTarget,
    UndefinedState,
    DuplicateState,
    DuplicateHandler,
    DuplicateFunction,
    NoStates,
    TooManyConstants,
    TooManyArguments,
    JumpTooLarge,
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileErrorKind::Lex(kind) => write!(f, "LexError({kind})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// 编译诊断：一个错误只中止它所在的代码块
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{script}] {chunk} line {line}: {message}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub script: String,
    pub chunk: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// 运行时错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("cannot convert {found} to {expected}")]
    TypeMismatch {
        expected: ValueType,
        found: ValueType,
    },

    #[error("operator '{op}' not defined for {left} and {right}")]
    InvalidOperands {
        op: &'static str,
        left: ValueType,
        right: ValueType,
    },

    #[error("operator '{op}' not defined for {operand}")]
    InvalidOperand { op: &'static str, operand: ValueType },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("{on} has no member '{member}'")]
    UnknownMember { member: String, on: ValueType },

    #[error("cannot assign member '{0}' of a temporary value")]
    TemporaryMember(String),

    #[error("unknown state '{0}'")]
    UnknownState(String),

    #[error("entity {0} does not exist")]
    UnknownEntity(EntityId),

    #[error("no script function or native handler named '{0}'")]
    UnhandledEvent(String),

    #[error("native handler '{name}' failed: {message}")]
    NativeCall { name: String, message: String },

    #[error("value stack overflow (limit {0})")]
    StackOverflow(usize),

    #[error("call depth limit {0} exceeded")]
    CallDepthExceeded(usize),

    #[error("malformed bytecode: {0}")]
    MalformedBytecode(String),
}

impl RuntimeError {
    /// 错误分类名（日志中使用）
    pub fn category(&self) -> &'static str {
        match self {
            RuntimeError::TypeMismatch { .. }
            | RuntimeError::InvalidOperands { .. }
            | RuntimeError::InvalidOperand { .. } => "RuntimeTypeError",
            RuntimeError::UnknownVariable(_)
            | RuntimeError::UnknownMember { .. }
            | RuntimeError::TemporaryMember(_)
            | RuntimeError::UnknownState(_)
            | RuntimeError::UnknownEntity(_)
            | RuntimeError::UnhandledEvent(_) => "RuntimeLookupError",
            RuntimeError::NativeCall { .. } => "NativeCallError",
            RuntimeError::StackOverflow(_)
            | RuntimeError::CallDepthExceeded(_)
            | RuntimeError::MalformedBytecode(_) => "RuntimeLimitError",
        }
    }

    /// 是否中止当前代码块
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RuntimeError::StackOverflow(_) | RuntimeError::MalformedBytecode(_)
        )
    }
}
