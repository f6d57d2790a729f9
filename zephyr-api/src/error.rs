//! API 错误类型
//!
//! 提供统一的错误类型和结构化错误报告。

use serde::Serialize;
use thiserror::Error;
use zephyr_core::{CompileError, CompileErrorKind, EntityId};

/// Zephyr 宿主操作的错误类型
#[derive(Error, Debug)]
pub enum ZephyrError {
    /// 脚本编译失败（定义仍然注册，实例不会运行）
    #[error("{}", describe_compile_errors(.0))]
    Compile(Vec<CompileError>),

    /// 注册表中没有该脚本
    #[error("unknown script '{0}'")]
    UnknownScript(String),

    /// 实体不存在或没有挂载脚本
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    /// 脚本中没有该代码块
    #[error("script '{script}' has no chunk named '{chunk}'")]
    UnknownChunk { script: String, chunk: String },

    /// 读取脚本源码失败
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_compile_errors(errors: &[CompileError]) -> String {
    match errors {
        [] => "compilation failed".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

impl ZephyrError {
    /// 第一条诊断的行号（如果有）
    pub fn line(&self) -> Option<usize> {
        match self {
            ZephyrError::Compile(errors) => errors.first().map(|e| e.line).filter(|l| *l > 0),
            _ => None,
        }
    }

    /// 第一条诊断的列号（如果有）
    pub fn column(&self) -> Option<usize> {
        match self {
            ZephyrError::Compile(errors) => errors.first().map(|e| e.column).filter(|c| *c > 0),
            _ => None,
        }
    }

    /// 获取错误阶段名称
    pub fn phase(&self) -> &'static str {
        match self {
            ZephyrError::Compile(errors) => match errors.first().map(|e| &e.kind) {
                Some(CompileErrorKind::Lex(_)) => "lexer",
                _ => "compiler",
            },
            ZephyrError::UnknownScript(_)
            | ZephyrError::UnknownEntity(_)
            | ZephyrError::UnknownChunk { .. } => "host",
            ZephyrError::Io(_) => "io",
        }
    }

    /// 编译诊断列表（其他错误为空）
    pub fn diagnostics(&self) -> &[CompileError] {
        match self {
            ZephyrError::Compile(errors) => errors,
            _ => &[],
        }
    }

    /// 转换为结构化错误报告
    ///
    /// CLI 可以直接打印，工具集成可以序列化为 JSON。
    pub fn to_report(&self) -> ErrorReport {
        match self {
            ZephyrError::Compile(errors) => match errors.first() {
                Some(first) => ErrorReport {
                    phase: self.phase(),
                    line: self.line(),
                    column: self.column(),
                    error_kind: first.kind.to_string(),
                    message: first.message.clone(),
                    details: Some(ErrorDetails::Chunk {
                        script: first.script.clone(),
                        chunk: first.chunk.clone(),
                        count: errors.len(),
                    }),
                },
                None => ErrorReport::plain(self.phase(), "CompileError", self.to_string()),
            },
            ZephyrError::UnknownScript(_) => {
                ErrorReport::plain(self.phase(), "UnknownScript", self.to_string())
            }
            ZephyrError::UnknownEntity(_) => {
                ErrorReport::plain(self.phase(), "UnknownEntity", self.to_string())
            }
            ZephyrError::UnknownChunk { .. } => {
                ErrorReport::plain(self.phase(), "UnknownChunk", self.to_string())
            }
            ZephyrError::Io(e) => ErrorReport::plain(self.phase(), "Io", e.to_string()),
        }
    }
}

/// 结构化错误报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    /// 错误阶段: lexer, compiler, host, io
    pub phase: &'static str,
    /// 错误行号（1-based，如果有）
    pub line: Option<usize>,
    /// 错误列号（1-based，如果有）
    pub column: Option<usize>,
    /// 错误类型（可用于程序化处理）
    pub error_kind: String,
    /// 人类可读的错误消息
    pub message: String,
    /// 额外详情
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

/// 错误额外详情
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorDetails {
    /// 出错的脚本和代码块，以及诊断总数
    Chunk {
        script: String,
        chunk: String,
        count: usize,
    },
}

impl ErrorReport {
    fn plain(phase: &'static str, error_kind: &str, message: String) -> Self {
        Self {
            phase,
            line: None,
            column: None,
            error_kind: error_kind.to_string(),
            message,
            details: None,
        }
    }

    /// 转换为 JSON 格式
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"message\":{:?}}}", self.message))
    }

    /// 简洁格式（适合终端）
    pub fn to_short(&self) -> String {
        format!("{}: {}", self.phase, self.message)
    }
}

impl std::fmt::Display for ErrorReport {
    /// 默认的 CLI 友好格式
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let chunk = match &self.details {
            Some(ErrorDetails::Chunk { script, chunk, .. }) => format!(" {script}/{chunk}"),
            None => String::new(),
        };
        match (self.line, self.column) {
            (Some(line), Some(col)) => write!(
                f,
                "[{}:{}]{} {} error: {}",
                line, col, chunk, self.phase, self.message
            ),
            _ => write!(f, "[{}]{} error: {}", self.phase, chunk, self.message),
        }
    }
}
