//! API 层配置
//!
//! 包含执行配置 RunConfig 和进程级默认配置（供 CLI 使用）

use once_cell::sync::OnceCell;
use std::sync::Arc;
use zephyr_config::{CompilerConfig, LimitConfig};
use zephyr_log::Logger;

/// Host configuration
#[derive(Clone)]
pub struct RunConfig {
    /// Compiler configuration
    pub compiler: CompilerConfig,
    /// Execution limits
    pub limits: LimitConfig,
    /// Logger shared by compiler, VM and host
    pub logger: Arc<Logger>,
}

impl RunConfig {
    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_limits(mut self, limits: LimitConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_compiler(mut self, compiler: CompilerConfig) -> Self {
        self.compiler = compiler;
        self
    }
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("compiler", &self.compiler)
            .field("limits", &self.limits)
            .field("log_level", &self.logger.level())
            .finish()
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            compiler: CompilerConfig::default(),
            limits: LimitConfig::default(),
            logger: Logger::noop(),
        }
    }
}

// Process-wide default for CLI convenience; `ScriptHost::new` never reads it
static GLOBAL_CONFIG: OnceCell<RunConfig> = OnceCell::new();

/// Install the process-wide default configuration
///
/// Returns the rejected config if one is already installed.
pub fn init(config: RunConfig) -> Result<(), RunConfig> {
    GLOBAL_CONFIG.set(config)
}

/// Get the process-wide default configuration, if installed
pub fn config() -> Option<&'static RunConfig> {
    GLOBAL_CONFIG.get()
}

/// Check if config is initialized
pub fn is_initialized() -> bool {
    GLOBAL_CONFIG.get().is_some()
}
