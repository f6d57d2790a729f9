//! Zephyr API - host-facing layer
//!
//! Provides the embedding interface, including:
//! - Script host facade (ScriptHost)
//! - Configuration abstraction (RunConfig)
//! - Unified error handling (ZephyrError)
//!
//! For CLI convenience, a process-wide default RunConfig can be installed
//! with `init_config`; library users pass a config to `ScriptHost::new`.

pub mod config;
pub mod error;
pub mod host;

pub use config::{config as get_config, init as init_config, is_initialized, RunConfig};
pub use error::{ErrorDetails, ErrorReport, ZephyrError};
pub use host::ScriptHost;

// Re-export config types from zephyr_config
pub use zephyr_config;
pub use zephyr_config::{CompilerConfig, LimitConfig, Phase};

// Re-export core types
pub use zephyr_core::{
    CompileError, CompileErrorKind, CompiledScriptDefinition, EntityId, EventArgs, EventBridge,
    FieldEntity, ScriptEntity, ScriptInstance, ValueType, Vec2, Vec3, ZephyrValue,
};
pub use zephyr_log;

/// Compile a script without registering it; diagnostics are returned as an error
pub fn check(
    name: &str,
    source: &str,
    config: &RunConfig,
) -> Result<CompiledScriptDefinition, ZephyrError> {
    let definition = zephyr_core::compile(name, source, &config.compiler, config.logger.clone());
    if definition.is_valid {
        Ok(definition)
    } else {
        Err(ZephyrError::Compile(definition.diagnostics))
    }
}
