//! 运算符实现 (add_values, sub_values 等)
//!
//! 类型不匹配返回 `RuntimeError`，由 VM 记录并压入 NONE

use crate::error::RuntimeError;
use crate::value::ZephyrValue;
use std::cmp::Ordering;

fn invalid(op: &'static str, a: &ZephyrValue, b: &ZephyrValue) -> RuntimeError {
    RuntimeError::InvalidOperands {
        op,
        left: a.value_type(),
        right: b.value_type(),
    }
}

/// 加法：数值、同类型向量逐分量、字符串拼接
pub fn add_values(a: &ZephyrValue, b: &ZephyrValue) -> Result<ZephyrValue, RuntimeError> {
    match (a, b) {
        (ZephyrValue::Number(x), ZephyrValue::Number(y)) => Ok(ZephyrValue::Number(x + y)),
        (ZephyrValue::Vec2(x), ZephyrValue::Vec2(y)) => Ok(ZephyrValue::Vec2(*x + *y)),
        (ZephyrValue::Vec3(x), ZephyrValue::Vec3(y)) => Ok(ZephyrValue::Vec3(*x + *y)),
        (ZephyrValue::String(x), ZephyrValue::String(y)) => {
            Ok(ZephyrValue::String(format!("{x}{y}")))
        }
        _ => Err(invalid("+", a, b)),
    }
}

pub fn sub_values(a: &ZephyrValue, b: &ZephyrValue) -> Result<ZephyrValue, RuntimeError> {
    match (a, b) {
        (ZephyrValue::Number(x), ZephyrValue::Number(y)) => Ok(ZephyrValue::Number(x - y)),
        (ZephyrValue::Vec2(x), ZephyrValue::Vec2(y)) => Ok(ZephyrValue::Vec2(*x - *y)),
        (ZephyrValue::Vec3(x), ZephyrValue::Vec3(y)) => Ok(ZephyrValue::Vec3(*x - *y)),
        _ => Err(invalid("-", a, b)),
    }
}

/// 乘法：同类型向量逐分量，向量与数值缩放
pub fn mul_values(a: &ZephyrValue, b: &ZephyrValue) -> Result<ZephyrValue, RuntimeError> {
    match (a, b) {
        (ZephyrValue::Number(x), ZephyrValue::Number(y)) => Ok(ZephyrValue::Number(x * y)),
        (ZephyrValue::Vec2(x), ZephyrValue::Vec2(y)) => Ok(ZephyrValue::Vec2(*x * *y)),
        (ZephyrValue::Vec3(x), ZephyrValue::Vec3(y)) => Ok(ZephyrValue::Vec3(*x * *y)),
        (ZephyrValue::Vec2(v), ZephyrValue::Number(s))
        | (ZephyrValue::Number(s), ZephyrValue::Vec2(v)) => Ok(ZephyrValue::Vec2(*v * *s)),
        (ZephyrValue::Vec3(v), ZephyrValue::Number(s))
        | (ZephyrValue::Number(s), ZephyrValue::Vec3(v)) => Ok(ZephyrValue::Vec3(*v * *s)),
        _ => Err(invalid("*", a, b)),
    }
}

/// 除法：IEEE 语义，除以零得到无穷大
pub fn div_values(a: &ZephyrValue, b: &ZephyrValue) -> Result<ZephyrValue, RuntimeError> {
    match (a, b) {
        (ZephyrValue::Number(x), ZephyrValue::Number(y)) => Ok(ZephyrValue::Number(x / y)),
        (ZephyrValue::Vec2(x), ZephyrValue::Vec2(y)) => Ok(ZephyrValue::Vec2(*x / *y)),
        (ZephyrValue::Vec3(x), ZephyrValue::Vec3(y)) => Ok(ZephyrValue::Vec3(*x / *y)),
        (ZephyrValue::Vec2(v), ZephyrValue::Number(s)) => Ok(ZephyrValue::Vec2(*v / *s)),
        (ZephyrValue::Vec3(v), ZephyrValue::Number(s)) => Ok(ZephyrValue::Vec3(*v / *s)),
        _ => Err(invalid("/", a, b)),
    }
}

pub fn negate_value(a: &ZephyrValue) -> Result<ZephyrValue, RuntimeError> {
    match a {
        ZephyrValue::Number(x) => Ok(ZephyrValue::Number(-x)),
        ZephyrValue::Vec2(v) => Ok(ZephyrValue::Vec2(-*v)),
        ZephyrValue::Vec3(v) => Ok(ZephyrValue::Vec3(-*v)),
        other => Err(RuntimeError::InvalidOperand {
            op: "-",
            operand: other.value_type(),
        }),
    }
}

pub fn not_value(a: &ZephyrValue) -> Result<ZephyrValue, RuntimeError> {
    a.evaluate_as_bool()
        .map(|b| ZephyrValue::Bool(!b))
        .map_err(|_| RuntimeError::InvalidOperand {
            op: "!",
            operand: a.value_type(),
        })
}

/// 相等：同类型按值比较；一侧为 NONE 时不相等；其余类型不匹配为错误
pub fn equal_values(a: &ZephyrValue, b: &ZephyrValue) -> Result<bool, RuntimeError> {
    if a.value_type() == b.value_type() {
        return Ok(a == b);
    }
    if a.is_none() || b.is_none() {
        return Ok(false);
    }
    Err(invalid("==", a, b))
}

/// 比较：数值之间或字符串之间
///
/// NaN 参与时两者无序，返回 `Ok(None)`，四种比较都得到 false
pub fn compare_values(
    op: &'static str,
    a: &ZephyrValue,
    b: &ZephyrValue,
) -> Result<Option<Ordering>, RuntimeError> {
    match (a, b) {
        (ZephyrValue::Number(x), ZephyrValue::Number(y)) => Ok(x.partial_cmp(y)),
        (ZephyrValue::String(x), ZephyrValue::String(y)) => Ok(Some(x.cmp(y))),
        _ => Err(invalid(op, a, b)),
    }
}
