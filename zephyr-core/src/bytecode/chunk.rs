//! 字节码块实现

use super::{OpCode, MEMBER_OF_FIELD, MEMBER_OF_VARIABLE, SCOPE_INSTANCE};
use crate::value::{ValueType, ZephyrValue};
use std::fmt::Write;
use std::sync::Arc;
use zephyr_log::{info, Logger};

/// 写入字节码块时的错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("too many constants in one chunk (limit 256)")]
    TooManyConstants,
    #[error("jump distance {0} does not fit in 16 bits")]
    JumpTooLarge(usize),
}

/// 字节码块：一个状态处理器或一个函数的编译结果，编译后只读
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 块名：`Idle.onUpdate`、函数名或 `<init>`
    pub name: String,
    /// 指令字节码
    pub code: Vec<u8>,
    /// 常量池
    pub constants: Vec<ZephyrValue>,
    /// 行号信息 (与 code 一一对应)
    pub lines: Vec<usize>,
}

impl Chunk {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: Vec::new(),
            constants: Vec::new(),
            lines: Vec::new(),
        }
    }

    pub fn write_byte(&mut self, byte: u8, line: usize) {
        self.code.push(byte);
        self.lines.push(line);
    }

    pub fn write_op(&mut self, op: OpCode, line: usize) {
        self.write_byte(op as u8, line);
    }

    pub fn write_op_u8(&mut self, op: OpCode, operand: u8, line: usize) {
        self.write_op(op, line);
        self.write_byte(operand, line);
    }

    pub fn write_op_u8_u8(&mut self, op: OpCode, first: u8, second: u8, line: usize) {
        self.write_op(op, line);
        self.write_byte(first, line);
        self.write_byte(second, line);
    }

    /// 写入 i16 操作数 (跳转用)
    pub fn write_i16(&mut self, value: i16, line: usize) {
        for byte in value.to_le_bytes() {
            self.write_byte(byte, line);
        }
    }

    /// 写入跳转指令，返回占位操作数的位置，稍后 patch
    pub fn write_jump(&mut self, op: OpCode, line: usize) -> usize {
        self.write_op(op, line);
        let offset = self.code.len();
        self.write_i16(-1, line);
        offset
    }

    /// 把跳转目标修补为当前位置
    ///
    /// VM 读完操作数后 ip 指向 offset + 2，偏移 = 目标 - (offset + 2)
    pub fn patch_jump(&mut self, offset: usize) -> Result<(), ChunkError> {
        let jump = self.code.len() - (offset + 2);
        let jump = i16::try_from(jump).map_err(|_| ChunkError::JumpTooLarge(jump))?;
        let bytes = jump.to_le_bytes();
        self.code[offset] = bytes[0];
        self.code[offset + 1] = bytes[1];
        Ok(())
    }

    /// 写入向后跳转到 `loop_start` 的 LOOP 指令
    pub fn write_loop(&mut self, loop_start: usize, line: usize) -> Result<(), ChunkError> {
        self.write_op(OpCode::Loop, line);
        // +2 为 i16 操作数本身
        let distance = self.code.len() - loop_start + 2;
        let jump = i16::try_from(distance).map_err(|_| ChunkError::JumpTooLarge(distance))?;
        self.write_i16(-jump, line);
        Ok(())
    }

    /// 添加常量，相同的值复用同一个槽位
    pub fn add_constant(&mut self, value: ZephyrValue) -> Result<u8, ChunkError> {
        if let Some(idx) = self.constants.iter().position(|c| *c == value) {
            return Ok(idx as u8);
        }
        let idx = self.constants.len();
        if idx > u8::MAX as usize {
            return Err(ChunkError::TooManyConstants);
        }
        self.constants.push(value);
        Ok(idx as u8)
    }

    /// 当前代码位置 (用于计算跳转)
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    pub fn read_u8(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    pub fn read_i16(&self, offset: usize) -> Option<i16> {
        let low = *self.code.get(offset)?;
        let high = *self.code.get(offset + 1)?;
        Some(i16::from_le_bytes([low, high]))
    }

    pub fn line_at(&self, offset: usize) -> usize {
        self.lines.get(offset).copied().unwrap_or(0)
    }

    /// 常量池中的字符串（变量名、成员名、函数名）
    pub fn constant_str(&self, idx: u8) -> Option<&str> {
        self.constants.get(idx as usize)?.get_as_string()
    }

    /// 反汇编为文本
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "== {} ==", self.name);
        if !self.constants.is_empty() {
            let _ = writeln!(out, "Constants:");
            for (i, constant) in self.constants.iter().enumerate() {
                let _ = writeln!(out, "  [{:3}] {:?}", i, constant);
            }
        }
        let _ = writeln!(out, "Bytecode:");

        let mut offset = 0;
        while offset < self.code.len() {
            offset = self.disassemble_instruction(offset, &mut out);
        }
        out
    }

    /// 按行输出到 logger（Info 级别，只在 `dump_bytecode` 打开时调用）
    pub fn log_disassembly(&self, logger: &Arc<Logger>) {
        for line in self.disassemble().lines() {
            info!(logger, "{}", line);
        }
    }

    /// 反汇编单条指令，返回下一条指令的位置
    pub fn disassemble_instruction(&self, offset: usize, out: &mut String) -> usize {
        let line_info = if offset > 0 && self.lines[offset] == self.lines[offset - 1] {
            "   | ".to_string()
        } else {
            format!("{:4} ", self.lines[offset])
        };

        let opcode = match OpCode::try_from(self.code[offset]) {
            Ok(op) => op,
            Err(byte) => {
                let _ = writeln!(out, "{:04} {}<invalid 0x{:02x}>", offset, line_info, byte);
                return offset + 1;
            }
        };

        let operand = |i: usize| self.read_u8(offset + 1 + i).unwrap_or(0);
        let constant = |idx: u8| {
            self.constants
                .get(idx as usize)
                .map(|c| format!("{c:?}"))
                .unwrap_or_else(|| "<missing>".to_string())
        };

        let detail = match opcode {
            OpCode::Constant
            | OpCode::ConstantVec2
            | OpCode::ConstantVec3
            | OpCode::GetVariableValue
            | OpCode::Assignment
            | OpCode::MemberAccessor => {
                format!(" {:3} {}", operand(0), constant(operand(0)))
            }
            OpCode::DefineVariable => {
                let ty = ValueType::from_u8(operand(1))
                    .map(|t| t.name())
                    .unwrap_or("?");
                let scope = if operand(2) == SCOPE_INSTANCE {
                    "instance"
                } else {
                    "local"
                };
                format!(" {:3} {} {} {}", operand(0), constant(operand(0)), ty, scope)
            }
            OpCode::MemberAssignment => {
                let receiver = match operand(0) {
                    MEMBER_OF_VARIABLE => constant(operand(1)),
                    MEMBER_OF_FIELD => format!("<stack>.{}", constant(operand(1))),
                    _ => "<stack>".to_string(),
                };
                format!(" {} . {}", receiver, constant(operand(2)))
            }
            OpCode::FunctionCall | OpCode::MemberFunctionCall => {
                format!(" {} ({} args)", constant(operand(0)), operand(1))
            }
            OpCode::And | OpCode::Or | OpCode::If | OpCode::Jump | OpCode::Loop => {
                let jump = self.read_i16(offset + 1).unwrap_or(0);
                let target = (offset as isize + 3 + jump as isize).max(0);
                format!(" {:04} -> {:04}", offset, target)
            }
            _ => String::new(),
        };

        let _ = writeln!(out, "{:04} {}{:<20}{}", offset, line_info, opcode.name(), detail);
        offset + 1 + opcode.operand_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_are_deduplicated() {
        let mut chunk = Chunk::new("test");
        let a = chunk.add_constant(ZephyrValue::from("health")).unwrap();
        let b = chunk.add_constant(ZephyrValue::Number(1.0)).unwrap();
        let c = chunk.add_constant(ZephyrValue::from("health")).unwrap();
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(chunk.constants.len(), 2);
    }

    #[test]
    fn test_constant_pool_limit() {
        let mut chunk = Chunk::new("test");
        for i in 0..256 {
            chunk.add_constant(ZephyrValue::Number(i as f32)).unwrap();
        }
        assert_eq!(
            chunk.add_constant(ZephyrValue::Number(999.0)),
            Err(ChunkError::TooManyConstants)
        );
    }

    #[test]
    fn test_patch_jump_targets_current_offset() {
        let mut chunk = Chunk::new("test");
        let jump = chunk.write_jump(OpCode::If, 1);
        chunk.write_op(OpCode::Pop, 1);
        chunk.write_op(OpCode::Pop, 1);
        chunk.patch_jump(jump).unwrap();

        assert_eq!(chunk.read_i16(jump), Some(2));
        assert_eq!(chunk.lines.len(), chunk.code.len());
    }

    #[test]
    fn test_write_loop_jumps_backwards() {
        let mut chunk = Chunk::new("test");
        let start = chunk.current_offset();
        chunk.write_op(OpCode::Null, 1);
        chunk.write_op(OpCode::Pop, 1);
        chunk.write_loop(start, 2).unwrap();

        // 执行完 LOOP 的操作数后 ip = 5，5 + (-5) = 0
        assert_eq!(chunk.read_i16(3), Some(-5));
    }

    #[test]
    fn test_disassemble_lists_instructions() {
        let mut chunk = Chunk::new("Idle.onUpdate");
        let name = chunk.add_constant(ZephyrValue::from("Print")).unwrap();
        let text = chunk.add_constant(ZephyrValue::from("hi")).unwrap();
        chunk.write_op_u8(OpCode::Constant, text, 3);
        chunk.write_op_u8_u8(OpCode::FunctionCall, name, 1, 3);
        chunk.write_op(OpCode::Pop, 4);

        let text = chunk.disassemble();
        assert!(text.starts_with("== Idle.onUpdate =="));
        assert!(text.contains("CONSTANT"));
        assert!(text.contains("FUNCTION_CALL"));
        assert!(text.contains("(1 args)"));
        assert!(text.contains("   | "));
        assert!(text.contains("POP"));
    }
}
