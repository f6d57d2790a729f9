//! ZephyrValue：脚本与宿主之间传递的带标签值
//!
//! 两种访问方式：
//! - `get_as_*`：原始访问，不做转换，标签不匹配时返回 `None`
//! - `evaluate_as_*`：按规则强制转换，失败返回 `RuntimeError::TypeMismatch`，
//!   由调用方记录日志并改用 [`ValueType::zero_value`]

use crate::entity::EntityId;
use crate::error::RuntimeError;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// 二维向量
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// 按分量名读取（`x`/`y`）
    pub fn component(&self, name: &str) -> Option<f32> {
        match name {
            "x" => Some(self.x),
            "y" => Some(self.y),
            _ => None,
        }
    }

    /// 返回替换了一个分量的新向量
    pub fn with_component(mut self, name: &str, value: f32) -> Option<Self> {
        match name {
            "x" => self.x = value,
            "y" => self.y = value,
            _ => return None,
        }
        Some(self)
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x * rhs.x, self.y * rhs.y)
    }
}

impl Div for Vec2 {
    type Output = Vec2;
    fn div(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x / rhs.x, self.y / rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Vec2 {
    type Output = Vec2;
    fn div(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

/// 三维向量
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn component(&self, name: &str) -> Option<f32> {
        match name {
            "x" => Some(self.x),
            "y" => Some(self.y),
            "z" => Some(self.z),
            _ => None,
        }
    }

    pub fn with_component(mut self, name: &str, value: f32) -> Option<Self> {
        match name {
            "x" => self.x = value,
            "y" => self.y = value,
            "z" => self.z = value,
            _ => return None,
        }
        Some(self)
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }
}

impl Div for Vec3 {
    type Output = Vec3;
    fn div(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x / rhs.x, self.y / rhs.y, self.z / rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f32> for Vec3 {
    type Output = Vec3;
    fn div(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

/// 值的类型标签，也用作变量声明类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    None = 0,
    Number = 1,
    Vec2 = 2,
    Vec3 = 3,
    Bool = 4,
    String = 5,
    Entity = 6,
}

impl ValueType {
    pub const fn name(&self) -> &'static str {
        match self {
            ValueType::None => "null",
            ValueType::Number => "number",
            ValueType::Vec2 => "vec2",
            ValueType::Vec3 => "vec3",
            ValueType::Bool => "bool",
            ValueType::String => "string",
            ValueType::Entity => "entity",
        }
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ValueType::None),
            1 => Some(ValueType::Number),
            2 => Some(ValueType::Vec2),
            3 => Some(ValueType::Vec3),
            4 => Some(ValueType::Bool),
            5 => Some(ValueType::String),
            6 => Some(ValueType::Entity),
            _ => None,
        }
    }

    /// 该类型的零值（强制转换失败时的替代值）
    pub fn zero_value(&self) -> ZephyrValue {
        match self {
            ValueType::None => ZephyrValue::None,
            ValueType::Number => ZephyrValue::Number(0.0),
            ValueType::Vec2 => ZephyrValue::Vec2(Vec2::ZERO),
            ValueType::Vec3 => ZephyrValue::Vec3(Vec3::ZERO),
            ValueType::Bool => ZephyrValue::Bool(false),
            ValueType::String => ZephyrValue::String(String::new()),
            ValueType::Entity => ZephyrValue::EntityId(EntityId::INVALID),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 运行时值
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ZephyrValue {
    /// NONE：`null` 字面量，以及失败操作的结果
    #[default]
    None,
    Number(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Bool(bool),
    String(String),
    EntityId(EntityId),
}

impl ZephyrValue {
    pub const NONE: ZephyrValue = ZephyrValue::None;

    pub fn value_type(&self) -> ValueType {
        match self {
            ZephyrValue::None => ValueType::None,
            ZephyrValue::Number(_) => ValueType::Number,
            ZephyrValue::Vec2(_) => ValueType::Vec2,
            ZephyrValue::Vec3(_) => ValueType::Vec3,
            ZephyrValue::Bool(_) => ValueType::Bool,
            ZephyrValue::String(_) => ValueType::String,
            ZephyrValue::EntityId(_) => ValueType::Entity,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ZephyrValue::None)
    }

    // ==================== 原始访问 ====================

    pub fn get_as_number(&self) -> Option<f32> {
        match self {
            ZephyrValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn get_as_vec2(&self) -> Option<Vec2> {
        match self {
            ZephyrValue::Vec2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_as_vec3(&self) -> Option<Vec3> {
        match self {
            ZephyrValue::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_as_bool(&self) -> Option<bool> {
        match self {
            ZephyrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn get_as_string(&self) -> Option<&str> {
        match self {
            ZephyrValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_as_entity(&self) -> Option<EntityId> {
        match self {
            ZephyrValue::EntityId(id) => Some(*id),
            _ => None,
        }
    }

    // ==================== 强制转换 ====================

    /// Bool → 1/0，其余非数值类型为类型错误
    pub fn evaluate_as_number(&self) -> Result<f32, RuntimeError> {
        match self {
            ZephyrValue::Number(n) => Ok(*n),
            ZephyrValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            other => Err(other.mismatch(ValueType::Number)),
        }
    }

    /// 真值：0 为假，NONE 为假，有效实体为真
    pub fn evaluate_as_bool(&self) -> Result<bool, RuntimeError> {
        match self {
            ZephyrValue::Bool(b) => Ok(*b),
            ZephyrValue::Number(n) => Ok(*n != 0.0),
            ZephyrValue::None => Ok(false),
            ZephyrValue::EntityId(id) => Ok(id.is_valid()),
            other => Err(other.mismatch(ValueType::Bool)),
        }
    }

    pub fn evaluate_as_vec2(&self) -> Result<Vec2, RuntimeError> {
        match self {
            ZephyrValue::Vec2(v) => Ok(*v),
            other => Err(other.mismatch(ValueType::Vec2)),
        }
    }

    pub fn evaluate_as_vec3(&self) -> Result<Vec3, RuntimeError> {
        match self {
            ZephyrValue::Vec3(v) => Ok(*v),
            ZephyrValue::Vec2(v) => Ok(Vec3::new(v.x, v.y, 0.0)),
            other => Err(other.mismatch(ValueType::Vec3)),
        }
    }

    /// 所有类型都能格式化为字符串
    pub fn evaluate_as_string(&self) -> Result<String, RuntimeError> {
        Ok(match self {
            ZephyrValue::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn evaluate_as_entity(&self) -> Result<EntityId, RuntimeError> {
        match self {
            ZephyrValue::EntityId(id) => Ok(*id),
            ZephyrValue::None => Ok(EntityId::INVALID),
            other => Err(other.mismatch(ValueType::Entity)),
        }
    }

    /// 转换为声明类型（变量存储时使用）
    pub fn evaluate_as(&self, ty: ValueType) -> Result<ZephyrValue, RuntimeError> {
        Ok(match ty {
            ValueType::None => self.clone(),
            ValueType::Number => ZephyrValue::Number(self.evaluate_as_number()?),
            ValueType::Vec2 => ZephyrValue::Vec2(self.evaluate_as_vec2()?),
            ValueType::Vec3 => ZephyrValue::Vec3(self.evaluate_as_vec3()?),
            ValueType::Bool => ZephyrValue::Bool(self.evaluate_as_bool()?),
            ValueType::String => ZephyrValue::String(self.evaluate_as_string()?),
            ValueType::Entity => ZephyrValue::EntityId(self.evaluate_as_entity()?),
        })
    }

    fn mismatch(&self, expected: ValueType) -> RuntimeError {
        RuntimeError::TypeMismatch {
            expected,
            found: self.value_type(),
        }
    }
}

/// 整数值不带小数部分：`3` 而不是 `3.0`
fn format_number(f: &mut fmt::Formatter<'_>, n: f32) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e9 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for ZephyrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZephyrValue::None => f.write_str("null"),
            ZephyrValue::Number(n) => format_number(f, *n),
            ZephyrValue::Vec2(v) => {
                f.write_str("(")?;
                format_number(f, v.x)?;
                f.write_str(", ")?;
                format_number(f, v.y)?;
                f.write_str(")")
            }
            ZephyrValue::Vec3(v) => {
                f.write_str("(")?;
                format_number(f, v.x)?;
                f.write_str(", ")?;
                format_number(f, v.y)?;
                f.write_str(", ")?;
                format_number(f, v.z)?;
                f.write_str(")")
            }
            ZephyrValue::Bool(b) => write!(f, "{b}"),
            ZephyrValue::String(s) => f.write_str(s),
            ZephyrValue::EntityId(id) => write!(f, "{id}"),
        }
    }
}

impl From<f32> for ZephyrValue {
    fn from(value: f32) -> Self {
        ZephyrValue::Number(value)
    }
}

/// 宿主代码中的 f64 / 整数字面量
impl From<f64> for ZephyrValue {
    fn from(value: f64) -> Self {
        ZephyrValue::Number(value as f32)
    }
}

impl From<i32> for ZephyrValue {
    fn from(value: i32) -> Self {
        ZephyrValue::Number(value as f32)
    }
}

impl From<bool> for ZephyrValue {
    fn from(value: bool) -> Self {
        ZephyrValue::Bool(value)
    }
}

impl From<&str> for ZephyrValue {
    fn from(value: &str) -> Self {
        ZephyrValue::String(value.to_string())
    }
}

impl From<String> for ZephyrValue {
    fn from(value: String) -> Self {
        ZephyrValue::String(value)
    }
}

impl From<Vec2> for ZephyrValue {
    fn from(value: Vec2) -> Self {
        ZephyrValue::Vec2(value)
    }
}

impl From<Vec3> for ZephyrValue {
    fn from(value: Vec3) -> Self {
        ZephyrValue::Vec3(value)
    }
}

impl From<EntityId> for ZephyrValue {
    fn from(value: EntityId) -> Self {
        ZephyrValue::EntityId(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_as_is_raw() {
        let v = ZephyrValue::Bool(true);
        assert_eq!(v.get_as_bool(), Some(true));
        assert_eq!(v.get_as_number(), None);
        assert_eq!(ZephyrValue::from("hi").get_as_string(), Some("hi"));
    }

    #[test]
    fn test_bool_number_truthiness() {
        assert_eq!(ZephyrValue::Bool(true).evaluate_as_number(), Ok(1.0));
        assert_eq!(ZephyrValue::Bool(false).evaluate_as_number(), Ok(0.0));
        assert_eq!(ZephyrValue::Number(0.0).evaluate_as_bool(), Ok(false));
        assert_eq!(ZephyrValue::Number(-2.5).evaluate_as_bool(), Ok(true));
        assert_eq!(ZephyrValue::None.evaluate_as_bool(), Ok(false));
    }

    #[test]
    fn test_number_formats_to_string() {
        assert_eq!(ZephyrValue::Number(3.0).evaluate_as_string().unwrap(), "3");
        assert_eq!(ZephyrValue::Number(2.5).evaluate_as_string().unwrap(), "2.5");
        assert_eq!(ZephyrValue::Number(-7.0).to_string(), "-7");
        assert_eq!(ZephyrValue::Vec2(Vec2::new(3.0, 4.5)).to_string(), "(3, 4.5)");
    }

    #[test]
    fn test_entity_passes_through() {
        let id = EntityId(42);
        assert_eq!(ZephyrValue::EntityId(id).evaluate_as_entity(), Ok(id));
        assert_eq!(
            ZephyrValue::EntityId(id).evaluate_as(ValueType::Entity),
            Ok(ZephyrValue::EntityId(id))
        );
    }

    #[test]
    fn test_impossible_coercion_is_type_error() {
        let err = ZephyrValue::from("north").evaluate_as_vec2().unwrap_err();
        assert_eq!(
            err,
            RuntimeError::TypeMismatch {
                expected: ValueType::Vec2,
                found: ValueType::String
            }
        );
        assert_eq!(err.category(), "RuntimeTypeError");
        assert_eq!(ValueType::Vec2.zero_value(), ZephyrValue::Vec2(Vec2::ZERO));
    }

    #[test]
    fn test_string_is_deep_copied() {
        let original = ZephyrValue::from("guard");
        let mut copy = original.clone();
        if let ZephyrValue::String(s) = &mut copy {
            s.push_str("_2");
        }
        assert_eq!(original.get_as_string(), Some("guard"));
        assert_eq!(copy.get_as_string(), Some("guard_2"));
    }

    #[test]
    fn test_vector_components() {
        let v = Vec2::new(3.0, 4.0);
        assert_eq!(v.component("x"), Some(3.0));
        assert_eq!(v.component("y"), Some(4.0));
        assert_eq!(v.component("z"), None);
        assert_eq!(v.with_component("x", 9.0), Some(Vec2::new(9.0, 4.0)));
        assert_eq!(v.length(), 5.0);

        let w = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(w.with_component("z", 0.0), Some(Vec3::new(1.0, 2.0, 0.0)));
        assert_eq!(w.with_component("w", 0.0), None);
    }
}
