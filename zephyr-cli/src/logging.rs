//! CLI 日志系统初始化
//!
//! 基于 `tracing-subscriber` 实现分阶段日志控制。zephyr-log 记录通过
//! [`TracingSink`] 转发为 tracing 事件，目标按记录来源模块映射到
//! `zephyr::lexer` / `zephyr::compiler` / `zephyr::vm` / `zephyr::runtime`，
//! 再由各阶段的级别过滤。

use crate::config::LogConfig;
use std::io;
use tracing_subscriber::{filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};
use zephyr_config::Phase;
use zephyr_log::{LogSink, Record};

/// 日志输出格式
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// 彩色格式化（开发使用）
    Pretty,
    /// 紧凑格式
    Compact,
    /// JSON 格式（工具集成）
    Json,
}

/// 使用指定格式和日志配置初始化日志系统，输出到 stderr
pub fn init(log_config: &LogConfig, format: LogFormat) {
    let mut targets = Targets::new().with_default(log_config.global);
    for phase in [Phase::Lexer, Phase::Compiler, Phase::Vm, Phase::Runtime] {
        targets = targets.with_target(phase.target(), log_config.level_for(phase));
    }
    targets = targets.with_target("zephyr::cli", log_config.global);

    let layer = create_format_layer(format, io::stderr).with_filter(targets);
    tracing_subscriber::registry().with(layer).init();
}

/// Create formatter layer based on format
fn create_format_layer<W, F>(format: LogFormat, make_writer: F) -> Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>
where
    W: io::Write + Send + Sync + 'static,
    F: Fn() -> W + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
    }
}

/// 记录来源模块所属的阶段；字节码反汇编在编译期输出，归入 compiler
pub fn phase_of(module_path: &str) -> Phase {
    let module = module_path.strip_prefix("zephyr_core::").unwrap_or("");
    match module.split("::").next() {
        Some("lexer") => Phase::Lexer,
        Some("compiler" | "bytecode") => Phase::Compiler,
        Some("vm") => Phase::Vm,
        _ => Phase::Runtime,
    }
}

/// 把 zephyr-log 记录转发给 tracing
pub struct TracingSink;

// tracing 的 target 必须是字面量
macro_rules! emit {
    ($macro:ident, $target:literal, $record:expr) => {
        match &$record.location {
            Some(loc) => tracing::$macro!(
                target: $target,
                script = %loc.script,
                chunk = %loc.chunk,
                line = loc.line,
                "{}",
                $record.message
            ),
            None => tracing::$macro!(target: $target, source = $record.target, "{}", $record.message),
        }
    };
}

macro_rules! forward {
    ($macro:ident, $record:expr) => {
        match phase_of($record.target) {
            Phase::Lexer => emit!($macro, "zephyr::lexer", $record),
            Phase::Compiler => emit!($macro, "zephyr::compiler", $record),
            Phase::Vm => emit!($macro, "zephyr::vm", $record),
            Phase::Runtime => emit!($macro, "zephyr::runtime", $record),
        }
    };
}

impl LogSink for TracingSink {
    fn write(&self, record: &Record) {
        match record.level {
            zephyr_log::Level::Trace => forward!(trace, record),
            zephyr_log::Level::Debug => forward!(debug, record),
            zephyr_log::Level::Info => forward!(info, record),
            zephyr_log::Level::Warn => forward!(warn, record),
            zephyr_log::Level::Error => forward!(error, record),
        }
    }
}

/// tracing 级别对应的 zephyr-log 级别
pub fn to_log_level(level: tracing::Level) -> zephyr_log::Level {
    match level {
        tracing::Level::TRACE => zephyr_log::Level::Trace,
        tracing::Level::DEBUG => zephyr_log::Level::Debug,
        tracing::Level::INFO => zephyr_log::Level::Info,
        tracing::Level::WARN => zephyr_log::Level::Warn,
        _ => zephyr_log::Level::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::Context;
    use zephyr_log::{Level, Location};

    /// 收集事件的 (target, level)
    struct Capture(Arc<Mutex<Vec<(String, tracing::Level)>>>);

    impl<S: tracing::Subscriber> Layer<S> for Capture {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let meta = event.metadata();
            self.0.lock().unwrap().push((meta.target().to_string(), *meta.level()));
        }
    }

    #[test]
    fn test_phase_of_module_path() {
        assert_eq!(phase_of("zephyr_core::compiler::expr"), Phase::Compiler);
        assert_eq!(phase_of("zephyr_core::bytecode::chunk"), Phase::Compiler);
        assert_eq!(phase_of("zephyr_core::vm::execution"), Phase::Vm);
        assert_eq!(phase_of("zephyr_core::lexer"), Phase::Lexer);
        assert_eq!(phase_of("zephyr_core::instance"), Phase::Runtime);
        assert_eq!(phase_of("zephyr_api::host"), Phase::Runtime);
    }

    #[test]
    fn test_tracing_sink_routes_records_to_phase_targets() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(Capture(seen.clone()));

        tracing::subscriber::with_default(subscriber, || {
            TracingSink.write(&Record::new(Level::Info, "zephyr_core::bytecode::chunk", "== <init> =="));
            TracingSink.write(
                &Record::new(Level::Warn, "zephyr_core::vm::execution", "unknown variable 'hp'")
                    .with_location(Location::new("guard", "Idle.onUpdate", 3)),
            );
            TracingSink.write(&Record::new(Level::Debug, "zephyr_core::instance", "Idle -> Chase"));
        });

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (Phase::Compiler.target(), tracing::Level::INFO),
                (Phase::Vm.target(), tracing::Level::WARN),
                (Phase::Runtime.target(), tracing::Level::DEBUG),
            ]
        );
    }

    #[test]
    fn test_to_log_level() {
        assert_eq!(to_log_level(tracing::Level::WARN), zephyr_log::Level::Warn);
        assert_eq!(to_log_level(tracing::Level::ERROR), zephyr_log::Level::Error);
        assert_eq!(to_log_level(tracing::Level::TRACE), zephyr_log::Level::Trace);
    }
}
