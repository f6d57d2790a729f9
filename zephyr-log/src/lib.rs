//! zephyr-log - 结构化日志系统
//!
//! 为 Zephyr 编译器和脚本运行时设计的日志系统：
//! - **显式传递**：无全局 logger，`Arc<Logger>` 通过构造函数传入
//! - **带位置**：脚本诊断记录附带 脚本名 / 代码块名 / 源码行号
//! - **可捕获**：环形缓冲区保留最后 N 条日志，测试中用于断言诊断
//!
//! 记录的 target 默认是产生它的模块路径，宿主据此把记录归入
//! lexer / compiler / vm / runtime 阶段。
//!
//! # 快速开始
//!
//! ```
//! use zephyr_log::{diag, debug, Level, Location, LogRingBuffer, Logger};
//!
//! let ring = LogRingBuffer::new(64);
//! let logger = Logger::new(Level::Debug).with_sink(ring.clone());
//! debug!(logger, "compiled {} chunks", 3);
//! diag!(logger, Level::Warn, Location::new("guard", "Idle.onUpdate", 4), "unknown variable 'hp'");
//! assert_eq!(ring.in_chunk("Idle.onUpdate").len(), 1);
//! ```

mod logger;
mod macros;
mod record;
mod ring_buffer;

pub use logger::{LogSink, Logger};
pub use record::{Level, Location, Record};
pub use ring_buffer::LogRingBuffer;

/// 日志系统错误类型
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// 无法识别的日志级别字符串
    #[error("Unknown log level: {0}")]
    UnknownLevel(String),
}
