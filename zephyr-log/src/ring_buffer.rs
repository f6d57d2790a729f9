//! 诊断捕获缓冲区
//!
//! 保留最后 N 条记录，按脚本或代码块查询。宿主用它在界面里展示某个脚本
//! 最近的运行时警告，测试用它断言诊断。

use crate::logger::LogSink;
use crate::record::{Level, Record};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Captured {
    records: VecDeque<Record>,
    /// 被挤出缓冲区的记录数
    dropped: usize,
}

/// 日志环形缓冲区，满了以后丢弃最旧的记录
pub struct LogRingBuffer {
    inner: Mutex<Captured>,
    capacity: usize,
}

impl LogRingBuffer {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(LogRingBuffer {
            inner: Mutex::new(Captured {
                records: VecDeque::with_capacity(capacity),
                dropped: 0,
            }),
            capacity,
        })
    }

    fn push(&self, record: Record) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if self.capacity == 0 {
            inner.dropped += 1;
            return;
        }
        if inner.records.len() >= self.capacity {
            inner.records.pop_front();
            inner.dropped += 1;
        }
        inner.records.push_back(record);
    }

    fn select(&self, keep: impl Fn(&Record) -> bool) -> Vec<Record> {
        match self.inner.lock() {
            Ok(inner) => inner.records.iter().filter(|r| keep(r)).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// 当前所有记录（按时间顺序）
    pub fn dump_records(&self) -> Vec<Record> {
        self.select(|_| true)
    }

    /// 每条记录一行
    pub fn dump(&self) -> String {
        self.dump_records()
            .iter()
            .map(Record::format)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 级别不低于 `level` 的记录数
    pub fn count_at_least(&self, level: Level) -> usize {
        self.select(|r| r.level >= level).len()
    }

    /// 消息包含 `needle` 的记录
    pub fn find(&self, needle: &str) -> Vec<Record> {
        self.select(|r| r.message.contains(needle))
    }

    /// 位于脚本 `script` 的诊断
    pub fn for_script(&self, script: &str) -> Vec<Record> {
        self.select(|r| r.location.as_ref().is_some_and(|at| at.script == script))
    }

    /// 位于代码块 `chunk`（如 `Idle.onUpdate`、`function Heal`）的诊断
    pub fn in_chunk(&self, chunk: &str) -> Vec<Record> {
        self.select(|r| r.location.as_ref().is_some_and(|at| at.chunk == chunk))
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            *inner = Captured::default();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.dropped).unwrap_or(0)
    }
}

impl LogSink for Arc<LogRingBuffer> {
    fn write(&self, record: &Record) {
        self.push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Location;

    fn warn_at(script: &str, chunk: &str, line: usize, message: &str) -> Record {
        Record::new(Level::Warn, "zephyr_core::vm", message).with_location(Location::new(script, chunk, line))
    }

    #[test]
    fn test_oldest_records_are_dropped() {
        let buffer = LogRingBuffer::new(3);
        assert!(buffer.is_empty());

        for frame in 0..5 {
            buffer.push(Record::new(Level::Debug, "test", format!("frame {frame}")));
        }

        let records = buffer.dump_records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].message, "frame 2");
        assert_eq!(records[2].message, "frame 4");
        assert_eq!(buffer.dropped_count(), 2);
        assert_eq!(buffer.capacity(), 3);
    }

    #[test]
    fn test_zero_capacity_drops_everything() {
        let buffer = LogRingBuffer::new(0);
        buffer.push(Record::new(Level::Error, "test", "lost"));
        assert!(buffer.is_empty());
        assert_eq!(buffer.dropped_count(), 1);
    }

    #[test]
    fn test_query_by_script_and_chunk() {
        let buffer = LogRingBuffer::new(10);
        buffer.push(Record::new(Level::Debug, "test", "compiled 'guard'"));
        buffer.push(warn_at("guard", "Idle.onUpdate", 4, "unknown variable 'hp'"));
        buffer.push(warn_at("guard", "function Heal", 2, "RuntimeTypeError"));
        buffer.push(warn_at("door", "Idle.onUpdate", 1, "unknown state 'Nope'"));

        assert_eq!(buffer.for_script("guard").len(), 2);
        assert_eq!(buffer.in_chunk("Idle.onUpdate").len(), 2);
        assert_eq!(buffer.in_chunk("function Heal")[0].message, "RuntimeTypeError");
        assert_eq!(buffer.count_at_least(Level::Warn), 3);
        assert_eq!(buffer.find("unknown").len(), 2);
        assert!(buffer.for_script("turret").is_empty());
    }

    #[test]
    fn test_clear_resets_dropped_count() {
        let buffer = LogRingBuffer::new(1);
        buffer.push(warn_at("guard", "<init>", 0, "first"));
        buffer.push(warn_at("guard", "<init>", 0, "second"));
        assert_eq!(buffer.dropped_count(), 1);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.dropped_count(), 0);
    }

    #[test]
    fn test_dump_one_line_per_record() {
        let buffer = LogRingBuffer::new(10);
        buffer.push(Record::new(Level::Info, "test", "== <init> =="));
        buffer.push(warn_at("guard", "Idle.onEnter", 3, "unknown member 'w'"));

        let dump = buffer.dump();
        assert_eq!(dump.lines().count(), 2);
        assert!(dump.contains("INFO"));
        assert!(dump.contains("guard:Idle.onEnter:3"));
    }
}
