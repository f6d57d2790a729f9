//! 主执行循环：一次执行一条指令

use super::operators::{
    add_values, compare_values, div_values, equal_values, mul_values, negate_value, not_value,
    sub_values,
};
use super::{Frame, Vm};
use crate::bytecode::{OpCode, MEMBER_OF_FIELD, MEMBER_OF_STACK, SCOPE_INSTANCE};
use crate::error::RuntimeError;
use crate::value::{ValueType, Vec2, Vec3, ZephyrValue};
use std::cmp::Ordering;

impl<'c> Frame<'c> {
    fn read_u8(&mut self) -> Result<u8, RuntimeError> {
        let byte = self
            .chunk
            .read_u8(self.ip)
            .ok_or_else(|| RuntimeError::MalformedBytecode("truncated operand".to_string()))?;
        self.ip += 1;
        Ok(byte)
    }

    fn read_i16(&mut self) -> Result<i16, RuntimeError> {
        let value = self
            .chunk
            .read_i16(self.ip)
            .ok_or_else(|| RuntimeError::MalformedBytecode("truncated jump offset".to_string()))?;
        self.ip += 2;
        Ok(value)
    }

    fn read_constant(&mut self) -> Result<ZephyrValue, RuntimeError> {
        let idx = self.read_u8()?;
        self.chunk
            .constants
            .get(idx as usize)
            .cloned()
            .ok_or_else(|| RuntimeError::MalformedBytecode(format!("constant {idx} out of range")))
    }

    /// 读取一个名字常量，借用自代码块而不是帧
    fn read_name(&mut self) -> Result<&'c str, RuntimeError> {
        let idx = self.read_u8()?;
        self.name_at(idx)
    }

    fn name_at(&self, idx: u8) -> Result<&'c str, RuntimeError> {
        let chunk: &'c crate::bytecode::Chunk = self.chunk;
        chunk
            .constant_str(idx)
            .ok_or_else(|| RuntimeError::MalformedBytecode(format!("constant {idx} is not a name")))
    }

    fn jump(&mut self, offset: i16) -> Result<(), RuntimeError> {
        let target = self.ip as isize + offset as isize;
        if target < 0 || target as usize > self.chunk.code.len() {
            return Err(RuntimeError::MalformedBytecode(format!(
                "jump to {target} out of bounds"
            )));
        }
        self.ip = target as usize;
        Ok(())
    }

    fn push(&mut self, value: ZephyrValue, limit: usize) -> Result<(), RuntimeError> {
        if self.stack.len() >= limit {
            return Err(RuntimeError::StackOverflow(limit));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<ZephyrValue, RuntimeError> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::MalformedBytecode("stack underflow".to_string()))
    }

    /// 弹出两个操作数，返回 (a, b)
    fn pop_two(&mut self) -> Result<(ZephyrValue, ZephyrValue), RuntimeError> {
        let b = self.pop()?;
        let a = self.pop()?;
        Ok((a, b))
    }

    fn pop_n(&mut self, count: usize) -> Result<Vec<ZephyrValue>, RuntimeError> {
        if self.stack.len() < count {
            return Err(RuntimeError::MalformedBytecode("stack underflow".to_string()));
        }
        Ok(self.stack.split_off(self.stack.len() - count))
    }

    fn peek(&self) -> Result<&ZephyrValue, RuntimeError> {
        self.stack
            .last()
            .ok_or_else(|| RuntimeError::MalformedBytecode("stack underflow".to_string()))
    }
}

impl<'a, 'e> Vm<'a, 'e> {
    /// 执行一条指令；`Ok(Some(v))` 表示代码块返回
    pub(super) fn step(&mut self, frame: &mut Frame) -> Result<Option<ZephyrValue>, RuntimeError> {
        if frame.ip >= frame.chunk.code.len() {
            return Ok(Some(ZephyrValue::NONE));
        }
        frame.op_start = frame.ip;
        let byte = frame.read_u8()?;
        let op = OpCode::try_from(byte)
            .map_err(|b| RuntimeError::MalformedBytecode(format!("unknown opcode 0x{b:02x}")))?;

        #[cfg(feature = "trace_execution")]
        zephyr_log::trace!(
            self.env.logger,
            "{:04} {:<20} {:?}",
            frame.op_start,
            op.name(),
            frame.stack
        );

        let limit = self.env.limits.max_stack_size;
        match op {
            // ===== 常量 =====
            OpCode::Constant | OpCode::ConstantVec2 | OpCode::ConstantVec3 => {
                let value = frame.read_constant()?;
                frame.push(value, limit)?;
            }
            OpCode::Null => frame.push(ZephyrValue::NONE, limit)?,
            OpCode::MakeVec2 => {
                let components = frame.pop_n(2)?;
                let x = self.number_or_zero(frame, &components[0]);
                let y = self.number_or_zero(frame, &components[1]);
                frame.push(ZephyrValue::Vec2(Vec2::new(x, y)), limit)?;
            }
            OpCode::MakeVec3 => {
                let components = frame.pop_n(3)?;
                let x = self.number_or_zero(frame, &components[0]);
                let y = self.number_or_zero(frame, &components[1]);
                let z = self.number_or_zero(frame, &components[2]);
                frame.push(ZephyrValue::Vec3(Vec3::new(x, y, z)), limit)?;
            }

            // ===== 变量 =====
            OpCode::DefineVariable => {
                let name = frame.read_name()?;
                let ty = frame.read_u8()?;
                let scope = frame.read_u8()?;
                let ty = ValueType::from_u8(ty)
                    .ok_or_else(|| RuntimeError::MalformedBytecode(format!("unknown type {ty}")))?;
                let value = frame.pop()?;
                let result = self.define_variable(
                    &mut frame.locals,
                    name,
                    ty,
                    scope == SCOPE_INSTANCE,
                    value,
                );
                self.recover(frame, result)?;
            }
            OpCode::GetVariableValue => {
                let name = frame.read_name()?;
                let result = self.get_variable(&frame.locals, name);
                let value = self.value_or_none(frame, result)?;
                frame.push(value, limit)?;
            }
            OpCode::Assignment => {
                let name = frame.read_name()?;
                let value = frame.pop()?;
                let result = self.set_variable(&mut frame.locals, name, value);
                self.recover(frame, result)?;
            }

            // ===== 成员 =====
            OpCode::MemberAccessor => {
                let member = frame.read_name()?;
                let receiver = frame.pop()?;
                let result = self.get_member(&receiver, member);
                let value = self.value_or_none(frame, result)?;
                frame.push(value, limit)?;
            }
            OpCode::MemberAssignment => {
                let form = frame.read_u8()?;
                let name_idx = frame.read_u8()?;
                let member = frame.read_name()?;
                let value = frame.pop()?;
                let result = match form {
                    MEMBER_OF_STACK => {
                        let receiver = frame.pop()?;
                        self.assign_stack_member(receiver, member, value)
                    }
                    MEMBER_OF_FIELD => {
                        let container = frame.pop()?;
                        let field = frame.name_at(name_idx)?;
                        self.assign_field_member(frame, container, field, member, value)
                    }
                    _ => {
                        let name = frame.name_at(name_idx)?;
                        self.assign_member(frame, name, member, value)
                    }
                };
                self.recover(frame, result)?;
            }

            // ===== 算术 =====
            OpCode::Add => self.binary(frame, add_values)?,
            OpCode::Subtract => self.binary(frame, sub_values)?,
            OpCode::Multiply => self.binary(frame, mul_values)?,
            OpCode::Divide => self.binary(frame, div_values)?,
            OpCode::Negate => {
                let a = frame.pop()?;
                let value = self.value_or_none(frame, negate_value(&a))?;
                frame.push(value, limit)?;
            }
            OpCode::Not => {
                let a = frame.pop()?;
                let value = self.value_or_none(frame, not_value(&a))?;
                frame.push(value, limit)?;
            }

            // ===== 比较 =====
            OpCode::Equal => self.binary(frame, |a, b| {
                equal_values(a, b).map(ZephyrValue::Bool)
            })?,
            OpCode::NotEqual => self.binary(frame, |a, b| {
                equal_values(a, b)
                    .map(|eq| ZephyrValue::Bool(!eq))
                    .map_err(|_| RuntimeError::InvalidOperands {
                        op: "!=",
                        left: a.value_type(),
                        right: b.value_type(),
                    })
            })?,
            OpCode::Less => self.binary(frame, |a, b| {
                compare_values("<", a, b).map(|o| ZephyrValue::Bool(o == Some(Ordering::Less)))
            })?,
            OpCode::LessEqual => self.binary(frame, |a, b| {
                compare_values("<=", a, b)
                    .map(|o| ZephyrValue::Bool(matches!(o, Some(Ordering::Less | Ordering::Equal))))
            })?,
            OpCode::Greater => self.binary(frame, |a, b| {
                compare_values(">", a, b).map(|o| ZephyrValue::Bool(o == Some(Ordering::Greater)))
            })?,
            OpCode::GreaterEqual => self.binary(frame, |a, b| {
                compare_values(">=", a, b)
                    .map(|o| ZephyrValue::Bool(matches!(o, Some(Ordering::Greater | Ordering::Equal))))
            })?,

            // ===== 控制流 =====
            OpCode::And => {
                let offset = frame.read_i16()?;
                let left = frame.peek()?.clone();
                if self.truthy(frame, &left)? {
                    frame.pop()?;
                } else {
                    frame.jump(offset)?;
                }
            }
            OpCode::Or => {
                let offset = frame.read_i16()?;
                let left = frame.peek()?.clone();
                if self.truthy(frame, &left)? {
                    frame.jump(offset)?;
                } else {
                    frame.pop()?;
                }
            }
            OpCode::If => {
                let offset = frame.read_i16()?;
                let condition = frame.pop()?;
                if !self.truthy(frame, &condition)? {
                    frame.jump(offset)?;
                }
            }
            OpCode::Jump | OpCode::Loop => {
                let offset = frame.read_i16()?;
                frame.jump(offset)?;
            }

            // ===== 调用 =====
            OpCode::FunctionCall => {
                let name = frame.read_name()?;
                let argc = frame.read_u8()?;
                let args = frame.pop_n(argc as usize)?;
                let result = self.call(frame, name, args, None);
                let value = self.value_or_none(frame, result)?;
                frame.push(value, limit)?;
            }
            OpCode::MemberFunctionCall => {
                let name = frame.read_name()?;
                let argc = frame.read_u8()?;
                let args = frame.pop_n(argc as usize)?;
                let receiver = frame.pop()?;
                let result = self.call(frame, name, args, Some(receiver));
                let value = self.value_or_none(frame, result)?;
                frame.push(value, limit)?;
            }

            // ===== 状态机 =====
            OpCode::ChangeState => {
                let target = frame.pop()?;
                match target.get_as_string() {
                    // 代码块结束后才应用，多次请求以最后一次为准
                    Some(name) => *self.pending_state = Some(name.to_string()),
                    None => {
                        let err = RuntimeError::TypeMismatch {
                            expected: ValueType::String,
                            found: target.value_type(),
                        };
                        self.recover(frame, Err(err))?;
                    }
                }
            }

            OpCode::Pop => {
                frame.pop()?;
            }
            OpCode::Return => {
                let value = frame.stack.pop().unwrap_or(ZephyrValue::NONE);
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// 二元运算：弹出两个操作数，结果（或 NONE）压栈
    fn binary<F>(&mut self, frame: &mut Frame, op: F) -> Result<(), RuntimeError>
    where
        F: FnOnce(&ZephyrValue, &ZephyrValue) -> Result<ZephyrValue, RuntimeError>,
    {
        let (a, b) = frame.pop_two()?;
        let value = self.value_or_none(frame, op(&a, &b))?;
        frame.push(value, self.env.limits.max_stack_size)
    }

    /// `v.x = e` / `target.field = e`，向量分量写回变量本身
    fn assign_member(
        &mut self,
        frame: &mut Frame,
        variable: &str,
        member: &str,
        value: ZephyrValue,
    ) -> Result<(), RuntimeError> {
        let current = self.get_variable(&frame.locals, variable)?;
        match self.write_member(frame, current, member, value)? {
            Some(updated) => self.set_variable(&mut frame.locals, variable, updated),
            None => Ok(()),
        }
    }

    /// `expr.m = e`：只有实体接收者能被写入，向量临时值没有存放位置
    fn assign_stack_member(
        &mut self,
        receiver: ZephyrValue,
        member: &str,
        value: ZephyrValue,
    ) -> Result<(), RuntimeError> {
        match receiver {
            ZephyrValue::EntityId(id) => self.set_entity_field(id, member, value),
            _ => Err(RuntimeError::TemporaryMember(member.to_string())),
        }
    }

    /// `expr.f.m = e`：读出实体字段 `f`，改写分量 `m` 后写回
    fn assign_field_member(
        &mut self,
        frame: &Frame,
        container: ZephyrValue,
        field: &str,
        member: &str,
        value: ZephyrValue,
    ) -> Result<(), RuntimeError> {
        let current = self.get_member(&container, field)?;
        match (container, self.write_member(frame, current, member, value)?) {
            (ZephyrValue::EntityId(id), Some(updated)) => self.set_entity_field(id, field, updated),
            (_, None) => Ok(()),
            (_, Some(_)) => Err(RuntimeError::TemporaryMember(field.to_string())),
        }
    }

    /// 把 `value` 写进 `current` 的成员 `member`
    ///
    /// 向量返回替换分量后的新值，由调用方写回；实体直接写字段，返回 `None`。
    fn write_member(
        &mut self,
        frame: &Frame,
        current: ZephyrValue,
        member: &str,
        value: ZephyrValue,
    ) -> Result<Option<ZephyrValue>, RuntimeError> {
        let unknown = |on: ValueType| RuntimeError::UnknownMember {
            member: member.to_string(),
            on,
        };
        match current {
            ZephyrValue::Vec2(v) => {
                let component = self.number_or_zero(frame, &value);
                v.with_component(member, component)
                    .map(|v| Some(ZephyrValue::Vec2(v)))
                    .ok_or_else(|| unknown(ValueType::Vec2))
            }
            ZephyrValue::Vec3(v) => {
                let component = self.number_or_zero(frame, &value);
                v.with_component(member, component)
                    .map(|v| Some(ZephyrValue::Vec3(v)))
                    .ok_or_else(|| unknown(ValueType::Vec3))
            }
            ZephyrValue::EntityId(id) => self.set_entity_field(id, member, value).map(|_| None),
            other => Err(unknown(other.value_type())),
        }
    }

    /// 记录可恢复的错误；致命错误继续向上传播
    fn recover(&self, frame: &Frame, result: Result<(), RuntimeError>) -> Result<(), RuntimeError> {
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                self.report(frame.chunk, frame.op_start, &err);
                Ok(())
            }
        }
    }

    fn value_or_none(
        &self,
        frame: &Frame,
        result: Result<ZephyrValue, RuntimeError>,
    ) -> Result<ZephyrValue, RuntimeError> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                self.recover(frame, Err(err))?;
                Ok(ZephyrValue::NONE)
            }
        }
    }

    fn truthy(&self, frame: &Frame, value: &ZephyrValue) -> Result<bool, RuntimeError> {
        match value.evaluate_as_bool() {
            Ok(b) => Ok(b),
            Err(err) => {
                self.recover(frame, Err(err))?;
                Ok(false)
            }
        }
    }

    fn number_or_zero(&self, frame: &Frame, value: &ZephyrValue) -> f32 {
        value.evaluate_as_number().unwrap_or_else(|err| {
            self.report(frame.chunk, frame.op_start, &err);
            0.0
        })
    }
}
