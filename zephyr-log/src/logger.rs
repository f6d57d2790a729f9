//! 日志器实现

use crate::record::{Level, Location, Record};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// 日志输出目标trait
pub trait LogSink: Send + Sync {
    fn write(&self, record: &Record);
}

/// 日志器
///
/// 不提供全局实例，需要日志的组件在构造时接收 `Arc<Logger>`。
pub struct Logger {
    level: AtomicU8,
    sinks: Mutex<Vec<Box<dyn LogSink>>>,
}

impl Logger {
    pub fn new(level: Level) -> Arc<Self> {
        Arc::new(Logger {
            level: AtomicU8::new(level as u8),
            sinks: Mutex::new(Vec::new()),
        })
    }

    /// 添加输出目标（构建器风格）
    pub fn with_sink<S: LogSink + 'static>(self: Arc<Self>, sink: S) -> Arc<Self> {
        self.add_sink(sink);
        self
    }

    pub fn add_sink<S: LogSink + 'static>(&self, sink: S) {
        if let Ok(mut sinks) = self.sinks.lock() {
            sinks.push(Box::new(sink));
        }
    }

    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed)).unwrap_or(Level::Info)
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        level >= self.level()
    }

    #[inline(never)]
    pub fn log(&self, level: Level, target: &'static str, message: impl Into<String>) {
        if !self.is_enabled(level) {
            return;
        }
        self.dispatch(&Record::new(level, target, message));
    }

    /// 记录带脚本位置的日志
    #[inline(never)]
    pub fn log_at(
        &self,
        level: Level,
        target: &'static str,
        location: Location,
        message: impl Into<String>,
    ) {
        if !self.is_enabled(level) {
            return;
        }
        self.dispatch(&Record::new(level, target, message).with_location(location));
    }

    fn dispatch(&self, record: &Record) {
        if let Ok(sinks) = self.sinks.lock() {
            for sink in sinks.iter() {
                sink.write(record);
            }
        }
    }

    /// 创建不输出任何内容的日志器
    pub fn noop() -> Arc<Self> {
        Self::new(Level::Error)
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogRingBuffer;

    #[test]
    fn test_logger_creation() {
        let logger = Logger::new(Level::Debug);
        assert_eq!(logger.level(), Level::Debug);
        assert!(logger.is_enabled(Level::Debug));
        assert!(!logger.is_enabled(Level::Trace));
    }

    #[test]
    fn test_level_change() {
        let logger = Logger::new(Level::Info);
        assert!(!logger.is_enabled(Level::Debug));

        logger.set_level(Level::Debug);
        assert!(logger.is_enabled(Level::Debug));
    }

    #[test]
    fn test_log_disabled_level() {
        let ring = LogRingBuffer::new(100);
        let logger = Logger::new(Level::Warn).with_sink(ring.clone());

        logger.log(Level::Debug, "test", "should not appear");
        assert_eq!(ring.len(), 0);

        logger.log(Level::Warn, "test", "should appear");
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_log_at_records_location() {
        let ring = LogRingBuffer::new(10);
        let logger = Logger::new(Level::Debug).with_sink(ring.clone());

        logger.log_at(
            Level::Error,
            "test",
            Location::new("turret", "function Fire", 4),
            "unexpected token",
        );
        logger.log(Level::Info, "test", "plain");

        let records = ring.dump_records();
        assert_eq!(records[0].location.as_ref().map(|l| l.line), Some(4));
        assert_eq!(records[1].location, None);
    }

    #[test]
    fn test_multiple_sinks_receive_record() {
        let first = LogRingBuffer::new(10);
        let second = LogRingBuffer::new(10);
        let logger = Logger::new(Level::Info)
            .with_sink(first.clone())
            .with_sink(second.clone());

        logger.log(Level::Info, "test", "fan out");
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_noop_logger() {
        let logger = Logger::noop();
        logger.log(Level::Error, "test", "goes nowhere");
        assert_eq!(logger.level(), Level::Error);
    }
}
