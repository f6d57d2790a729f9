//! 日志宏
//!
//! 级别宏记录编译器和运行时自身的过程信息，不带脚本位置。脚本的警告和
//! 错误总是指向某个代码块的某一行，统一用 [`diag!`] 记录。
//!
//! target 默认取调用处的 `module_path!()`，也可以用 `target:` 显式指定。

/// 通用日志宏，级别未启用时不格式化消息
#[macro_export]
macro_rules! log {
    ($logger:expr, target: $target:expr, $level:expr, $($arg:tt)*) => {{
        let level = $level;
        if $logger.is_enabled(level) {
            $logger.log(level, $target, ::std::format!($($arg)*));
        }
    }};
    ($logger:expr, $level:expr, $($arg:tt)*) => {
        $crate::log!($logger, target: module_path!(), $level, $($arg)*)
    };
}

/// 逐条指令的执行跟踪
#[macro_export]
macro_rules! trace {
    ($logger:expr, target: $target:expr, $($arg:tt)*) => {
        $crate::log!($logger, target: $target, $crate::Level::Trace, $($arg)*)
    };
    ($logger:expr, $($arg:tt)*) => {
        $crate::log!($logger, $crate::Level::Trace, $($arg)*)
    };
}

/// 编译摘要、状态切换
#[macro_export]
macro_rules! debug {
    ($logger:expr, target: $target:expr, $($arg:tt)*) => {
        $crate::log!($logger, target: $target, $crate::Level::Debug, $($arg)*)
    };
    ($logger:expr, $($arg:tt)*) => {
        $crate::log!($logger, $crate::Level::Debug, $($arg)*)
    };
}

/// 脚本加载、字节码反汇编
#[macro_export]
macro_rules! info {
    ($logger:expr, target: $target:expr, $($arg:tt)*) => {
        $crate::log!($logger, target: $target, $crate::Level::Info, $($arg)*)
    };
    ($logger:expr, $($arg:tt)*) => {
        $crate::log!($logger, $crate::Level::Info, $($arg)*)
    };
}

/// 记录带脚本位置的诊断
///
/// ```
/// use zephyr_log::{diag, Level, Location, Logger, LogRingBuffer};
///
/// let ring = LogRingBuffer::new(8);
/// let logger = Logger::new(Level::Warn).with_sink(ring.clone());
/// let at = Location::new("guard", "Idle.onUpdate", 3);
/// diag!(logger, Level::Warn, at, "unknown variable '{}'", "hp");
/// assert_eq!(ring.in_chunk("Idle.onUpdate")[0].location.as_ref().unwrap().line, 3);
/// ```
#[macro_export]
macro_rules! diag {
    ($logger:expr, $level:expr, $location:expr, $($arg:tt)*) => {{
        let level = $level;
        if $logger.is_enabled(level) {
            $logger.log_at(level, module_path!(), $location, ::std::format!($($arg)*));
        }
    }};
}

#[cfg(test)]
mod tests {
    use crate::{Level, Location, LogRingBuffer, Logger};

    #[test]
    fn test_level_macros_filter_below_logger_level() {
        let ring = LogRingBuffer::new(16);
        let logger = Logger::new(Level::Info).with_sink(ring.clone());

        trace!(logger, "PUSH_CONSTANT {}", 0);
        debug!(logger, "compiled 'guard': valid=true");
        info!(logger, "== Idle.onUpdate ==");

        let records = ring.dump_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Level::Info);
        assert_eq!(records[0].message, "== Idle.onUpdate ==");
    }

    #[test]
    fn test_target_defaults_to_calling_module() {
        let ring = LogRingBuffer::new(4);
        let logger = Logger::new(Level::Trace).with_sink(ring.clone());

        debug!(logger, "Idle -> Chase");
        debug!(logger, target: "zephyr_core::vm", "frame pushed");

        let records = ring.dump_records();
        assert_eq!(records[0].target, module_path!());
        assert_eq!(records[1].target, "zephyr_core::vm");
    }

    #[test]
    fn test_disabled_level_skips_formatting() {
        struct Loud;
        impl std::fmt::Display for Loud {
            fn fmt(&self, _: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                panic!("formatted a disabled record")
            }
        }

        let logger = Logger::new(Level::Warn);
        trace!(logger, "{}", Loud);
        diag!(logger, Level::Debug, Location::new("a", "b", 1), "{}", Loud);
    }

    #[test]
    fn test_diag_macro_attaches_location() {
        let ring = LogRingBuffer::new(10);
        let logger = Logger::new(Level::Debug).with_sink(ring.clone());

        diag!(
            logger,
            Level::Warn,
            Location::new("door", "Open.onEnter", 12),
            "unknown member '{}'",
            "w"
        );

        let records = ring.for_script("door");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].location, Some(Location::new("door", "Open.onEnter", 12)));
        assert_eq!(records[0].message, "unknown member 'w'");
    }
}
