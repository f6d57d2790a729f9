//! 测试辅助工具

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use zephyr_api::{EventArgs, FieldEntity, RunConfig, ScriptHost};
use zephyr_log::{Level, LogRingBuffer, Logger};

/// 带日志捕获和 `Print` 原生函数的宿主
pub struct TestHost {
    pub host: ScriptHost,
    pub logs: Arc<LogRingBuffer>,
    printed: Rc<RefCell<Vec<String>>>,
}

impl TestHost {
    pub fn new() -> Self {
        let logs = LogRingBuffer::new(1024);
        let logger = Logger::new(Level::Debug).with_sink(logs.clone());
        let mut host = ScriptHost::new(RunConfig::default().with_logger(logger));

        let printed = Rc::new(RefCell::new(Vec::new()));
        let sink = printed.clone();
        host.natives_mut().register("Print", move |args: &EventArgs| {
            let text = args
                .positional(0)
                .map(|v| v.to_string())
                .unwrap_or_default();
            sink.borrow_mut().push(text);
            EventArgs::new()
        });

        Self {
            host,
            logs,
            printed,
        }
    }

    /// 带 health 字段的实体
    pub fn actor(health: f32) -> FieldEntity {
        FieldEntity::new().with_field("health", health)
    }

    pub fn printed(&self) -> Vec<String> {
        self.printed.borrow().clone()
    }

    pub fn clear_printed(&self) {
        self.printed.borrow_mut().clear();
    }

    pub fn warnings(&self) -> usize {
        self.logs.count_at_least(Level::Warn)
    }
}
