//! 事件参数与原生处理器注册表
//!
//! `EventArgs` 是脚本与宿主之间唯一的参数格式；`EventBridge` 是脚本影响
//! 引擎子系统的唯一通道。

use crate::error::RuntimeError;
use crate::value::ZephyrValue;
use std::collections::HashMap;
use std::fmt;

/// 原生处理器的返回值键
pub const RETURN_KEY: &str = "return";
/// 成员调用的接收者键
pub const TARGET_KEY: &str = "target";

/// 有序、按名称索引的参数包
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventArgs {
    entries: Vec<(String, ZephyrValue)>,
}

impl EventArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// 构建器风格的 `set`
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ZephyrValue>) -> Self {
        self.set(key, value);
        self
    }

    /// 只包含返回值的参数包
    pub fn returning(value: impl Into<ZephyrValue>) -> Self {
        Self::new().with(RETURN_KEY, value)
    }

    /// 设置键值，已存在的键原位覆盖
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ZephyrValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ZephyrValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// 以下一个位置序号为键追加
    pub fn push(&mut self, value: impl Into<ZephyrValue>) {
        let key = self.positional_count().to_string();
        self.entries.push((key, value.into()));
    }

    /// 第 `index` 个位置参数（键为 "0"、"1"…）
    pub fn positional(&self, index: usize) -> Option<&ZephyrValue> {
        self.get(&index.to_string())
    }

    fn positional_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.parse::<usize>().is_ok())
            .count()
    }

    /// 第 `index` 个条目，不论键名
    pub fn nth(&self, index: usize) -> Option<&ZephyrValue> {
        self.entries.get(index).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ZephyrValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 处理器的返回值：`"return"` 条目，否则第一个条目，否则 NONE
    pub fn return_value(&self) -> ZephyrValue {
        self.get(RETURN_KEY)
            .or_else(|| self.nth(0))
            .cloned()
            .unwrap_or(ZephyrValue::NONE)
    }
}

impl fmt::Display for EventArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        write!(f, "}}")
    }
}

type NativeHandler = Box<dyn Fn(&EventArgs) -> Result<EventArgs, String>>;

/// 原生处理器注册表：事件名 → 宿主回调
///
/// 单线程使用，处理器不要求 `Send`。
#[derive(Default)]
pub struct EventBridge {
    handlers: HashMap<String, NativeHandler>,
}

impl EventBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册不会失败的处理器，同名处理器被替换
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&EventArgs) -> EventArgs + 'static,
    {
        self.handlers
            .insert(name.into(), Box::new(move |args| Ok(handler(args))));
    }

    /// 注册可能失败的处理器；`Err` 记为 NativeCallError
    pub fn register_fallible<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&EventArgs) -> Result<EventArgs, String> + 'static,
    {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.handlers.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// 已注册的事件名（排序）
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// 同步调用处理器
    pub fn invoke(&self, name: &str, args: &EventArgs) -> Result<EventArgs, RuntimeError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| RuntimeError::UnhandledEvent(name.to_string()))?;
        handler(args).map_err(|message| RuntimeError::NativeCall {
            name: name.to_string(),
            message,
        })
    }
}

impl fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBridge")
            .field("handlers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_positional_and_named_entries() {
        let mut args = EventArgs::new().with("target", 3.0);
        args.push("hello");
        args.push(true);

        assert_eq!(args.positional(0), Some(&ZephyrValue::from("hello")));
        assert_eq!(args.positional(1), Some(&ZephyrValue::Bool(true)));
        assert_eq!(args.get("target"), Some(&ZephyrValue::Number(3.0)));
        assert_eq!(args.len(), 3);
        assert_eq!(args.to_string(), "{target: 3, 0: hello, 1: true}");
    }

    #[test]
    fn test_set_overwrites_in_place() {
        let mut args = EventArgs::new().with("a", 1.0).with("b", 2.0);
        args.set("a", 5.0);
        assert_eq!(args.nth(0), Some(&ZephyrValue::Number(5.0)));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_return_value_fallbacks() {
        assert_eq!(EventArgs::returning(7.0).return_value(), ZephyrValue::Number(7.0));
        assert_eq!(
            EventArgs::new().with("x", "first").return_value(),
            ZephyrValue::from("first")
        );
        assert!(EventArgs::new().return_value().is_none());
    }

    #[test]
    fn test_bridge_invokes_handlers() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();

        let mut bridge = EventBridge::new();
        bridge.register("Count", move |_| {
            counter.set(counter.get() + 1);
            EventArgs::returning(counter.get() as f32)
        });
        bridge.register_fallible("Explode", |_| Err("boom".to_string()));

        let result = bridge.invoke("Count", &EventArgs::new()).unwrap();
        assert_eq!(result.return_value(), ZephyrValue::Number(1.0));
        assert_eq!(calls.get(), 1);

        let err = bridge.invoke("Explode", &EventArgs::new()).unwrap_err();
        assert_eq!(err.category(), "NativeCallError");
        assert_eq!(err.to_string(), "native handler 'Explode' failed: boom");

        let err = bridge.invoke("Missing", &EventArgs::new()).unwrap_err();
        assert!(matches!(err, RuntimeError::UnhandledEvent(_)));

        assert_eq!(bridge.names(), vec!["Count", "Explode"]);
        assert!(bridge.unregister("Count"));
        assert!(!bridge.contains("Count"));
    }
}
