//! 日志记录定义

use std::fmt;
use std::str::FromStr;

/// 日志级别
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Level {
    /// 最详细的跟踪信息
    Trace = 0,
    /// 调试信息（编译摘要、状态切换）
    Debug = 1,
    /// 一般信息（字节码反汇编在此级别输出）
    Info = 2,
    /// 警告（脚本运行时错误）
    Warn = 3,
    /// 错误（编译失败）
    Error = 4,
}

impl Level {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Level::Trace),
            1 => Some(Level::Debug),
            2 => Some(Level::Info),
            3 => Some(Level::Warn),
            4 => Some(Level::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Level {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            _ => Err(crate::Error::UnknownLevel(s.to_string())),
        }
    }
}

/// 脚本源码位置：脚本名 + 代码块名 + 行号
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub script: String,
    pub chunk: String,
    pub line: usize,
}

impl Location {
    pub fn new(script: impl Into<String>, chunk: impl Into<String>, line: usize) -> Self {
        Self {
            script: script.into(),
            chunk: chunk.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.script, self.chunk, self.line)
    }
}

/// 单条日志记录
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// Unix时间戳（毫秒）
    pub timestamp_ms: u64,
    pub level: Level,
    /// 模块路径（编译期确定）
    pub target: &'static str,
    pub message: String,
    /// 脚本诊断的源码位置
    pub location: Option<Location>,
}

impl Record {
    pub fn new(level: Level, target: &'static str, message: impl Into<String>) -> Self {
        Self {
            timestamp_ms: current_timestamp_ms(),
            level,
            target,
            message: message.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// 格式化记录为单行字符串
    pub fn format(&self) -> String {
        let location = match &self.location {
            Some(at) => format!(" [{at}]"),
            None => String::new(),
        };

        format!(
            "[{}] {} {}{}: {}",
            format_timestamp(self.timestamp_ms),
            self.level,
            self.target,
            location,
            self.message
        )
    }
}

fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn format_timestamp(timestamp_ms: u64) -> String {
    let secs = timestamp_ms / 1000;
    let millis = timestamp_ms % 1000;

    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;

    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_u8() {
        assert_eq!(Level::from_u8(0), Some(Level::Trace));
        assert_eq!(Level::from_u8(4), Some(Level::Error));
        assert_eq!(Level::from_u8(5), None);
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!("warn".parse::<Level>().unwrap(), Level::Warn);
        assert_eq!("DEBUG".parse::<Level>().unwrap(), Level::Debug);
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn test_record_format_without_location() {
        let record = Record {
            timestamp_ms: 3_600_000 + 120_000 + 3_000 + 456,
            level: Level::Info,
            target: "zephyr::lexer",
            message: "token found".to_string(),
            location: None,
        };

        assert_eq!(
            record.format(),
            "[01:02:03.456] INFO zephyr::lexer: token found"
        );
    }

    #[test]
    fn test_record_format_with_location() {
        let record = Record::new(Level::Warn, "zephyr::vm", "type mismatch")
            .with_location(Location::new("guard", "Idle.onUpdate", 7));

        let formatted = record.format();
        assert!(formatted.contains("WARN"));
        assert!(formatted.contains("[guard:Idle.onUpdate:7]"));
        assert!(formatted.ends_with("type mismatch"));
    }
}
