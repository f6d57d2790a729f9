//! 变量作用域

use crate::error::RuntimeError;
use crate::value::{ValueType, ZephyrValue};
use std::collections::BTreeMap;

/// 变量槽：声明了类型的槽在存储时强制转换
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub ty: Option<ValueType>,
    pub value: ZephyrValue,
}

impl Variable {
    /// 按槽的类型转换；失败时得到类型零值和错误
    fn coerce(ty: Option<ValueType>, value: ZephyrValue) -> (ZephyrValue, Option<RuntimeError>) {
        let Some(ty) = ty else {
            return (value, None);
        };
        if value.is_none() {
            return (ty.zero_value(), None);
        }
        match value.evaluate_as(ty) {
            Ok(converted) => (converted, None),
            Err(err) => (ty.zero_value(), Some(err)),
        }
    }
}

/// 名称 → 变量
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    vars: BTreeMap<String, Variable>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// 声明（或重新声明）变量
    ///
    /// 转换失败时槽位仍然存在，值为零值，错误返回给调用方记录
    pub fn define(
        &mut self,
        name: impl Into<String>,
        ty: Option<ValueType>,
        value: ZephyrValue,
    ) -> Result<(), RuntimeError> {
        let (value, err) = Variable::coerce(ty, value);
        self.vars.insert(name.into(), Variable { ty, value });
        err.map_or(Ok(()), Err)
    }

    /// 给已存在的变量赋值，返回 `Ok(false)` 表示变量不存在
    pub fn assign(&mut self, name: &str, value: ZephyrValue) -> Result<bool, RuntimeError> {
        let Some(var) = self.vars.get_mut(name) else {
            return Ok(false);
        };
        let (value, err) = Variable::coerce(var.ty, value);
        var.value = value;
        err.map_or(Ok(true), Err)
    }

    pub fn get(&self, name: &str) -> Option<&ZephyrValue> {
        self.vars.get(name).map(|v| &v.value)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }
}
