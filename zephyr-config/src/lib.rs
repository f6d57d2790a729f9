//! Zephyr Config - Pure configuration data structures
//!
//! Only data, no logic or global state. Every struct deserializes from a
//! partial JSON object; missing fields take their defaults.

use serde::{Deserialize, Serialize};

/// Configuration for compiler behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Record a source line for every emitted byte
    pub emit_debug_info: bool,
    /// Log the disassembly of every chunk after compiling it
    pub dump_bytecode: bool,
}

/// Configuration for execution limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Maximum value stack depth of a single chunk invocation
    pub max_stack_size: usize,
    /// Maximum nesting of script-to-script calls
    pub max_call_depth: usize,
    /// Maximum transitions applied back to back after one chunk
    pub max_transition_chain: usize,
}

/// Execution phase, used for log targets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lexer,
    Compiler,
    Vm,
    Runtime,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Lexer => "lexer",
            Phase::Compiler => "compiler",
            Phase::Vm => "vm",
            Phase::Runtime => "runtime",
        }
    }

    /// Log target name for this phase
    pub fn target(&self) -> String {
        format!("zephyr::{}", self.as_str())
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            emit_debug_info: true,
            dump_bytecode: false,
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_stack_size: 1024,
            max_call_depth: 64,
            max_transition_chain: 16,
        }
    }
}
