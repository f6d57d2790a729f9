//! 字节码定义

mod chunk;

pub use chunk::{Chunk, ChunkError};

/// 操作码
///
/// 操作数紧跟在操作码之后，小端序：
/// - `u8` 常量池索引（名字、字面量）
/// - `i16` 跳转偏移，相对于操作数之后的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// [const] 压入常量
    Constant = 0,
    /// [const] 压入 Vec2 常量
    ConstantVec2,
    /// [const] 压入 Vec3 常量
    ConstantVec3,
    /// 压入 NONE
    Null,
    /// 弹出 x, y 组成 Vec2
    MakeVec2,
    /// 弹出 x, y, z 组成 Vec3
    MakeVec3,

    /// [name, type, scope] 声明变量，初值出栈
    DefineVariable,
    /// [name] 读取变量
    GetVariableValue,
    /// [name] 写入变量，值出栈
    Assignment,
    /// [member] 读取成员
    MemberAccessor,
    /// [form, name, member] 写入成员，form 见 `MEMBER_OF_*`
    MemberAssignment,

    Add,
    Subtract,
    Multiply,
    Divide,
    Negate,
    Not,

    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    /// [i16] 栈顶为假则跳转（保留栈顶），否则弹出
    And,
    /// [i16] 栈顶为真则跳转（保留栈顶），否则弹出
    Or,
    /// [i16] 弹出条件，为假则跳转
    If,
    /// [i16] 无条件跳转
    Jump,
    /// [i16] 向后跳转（循环）
    Loop,

    /// [name, argc] 调用脚本函数或原生处理器
    FunctionCall,
    /// [name, argc] 以栈上接收者调用
    MemberFunctionCall,
    /// 弹出目标状态名，块结束后切换
    ChangeState,

    Pop,
    /// 弹出返回值并结束代码块
    Return,
}

/// DEFINE_VARIABLE 的作用域操作数
pub const SCOPE_LOCAL: u8 = 0;
pub const SCOPE_INSTANCE: u8 = 1;

/// MEMBER_ASSIGNMENT 的接收者形式（第一个操作数）
///
/// - `MEMBER_OF_VARIABLE`: `v.m = e`，name 为变量名，新值写回变量
/// - `MEMBER_OF_STACK`: `expr.m = e`，接收者在值下方，只能是实体；name 不使用
/// - `MEMBER_OF_FIELD`: `expr.f.m = e`，容器在值下方，读出字段 name、改写分量后写回
pub const MEMBER_OF_VARIABLE: u8 = 0;
pub const MEMBER_OF_STACK: u8 = 1;
pub const MEMBER_OF_FIELD: u8 = 2;

impl OpCode {
    const ALL: [OpCode; 33] = [
        OpCode::Constant,
        OpCode::ConstantVec2,
        OpCode::ConstantVec3,
        OpCode::Null,
        OpCode::MakeVec2,
        OpCode::MakeVec3,
        OpCode::DefineVariable,
        OpCode::GetVariableValue,
        OpCode::Assignment,
        OpCode::MemberAccessor,
        OpCode::MemberAssignment,
        OpCode::Add,
        OpCode::Subtract,
        OpCode::Multiply,
        OpCode::Divide,
        OpCode::Negate,
        OpCode::Not,
        OpCode::Equal,
        OpCode::NotEqual,
        OpCode::Less,
        OpCode::LessEqual,
        OpCode::Greater,
        OpCode::GreaterEqual,
        OpCode::And,
        OpCode::Or,
        OpCode::If,
        OpCode::Jump,
        OpCode::Loop,
        OpCode::FunctionCall,
        OpCode::MemberFunctionCall,
        OpCode::ChangeState,
        OpCode::Pop,
        OpCode::Return,
    ];

    /// 操作数字节数
    pub const fn operand_size(&self) -> usize {
        match self {
            OpCode::Constant
            | OpCode::ConstantVec2
            | OpCode::ConstantVec3
            | OpCode::GetVariableValue
            | OpCode::Assignment
            | OpCode::MemberAccessor => 1,
            OpCode::FunctionCall
            | OpCode::MemberFunctionCall
            | OpCode::And
            | OpCode::Or
            | OpCode::If
            | OpCode::Jump
            | OpCode::Loop => 2,
            OpCode::DefineVariable | OpCode::MemberAssignment => 3,
            _ => 0,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            OpCode::Constant => "CONSTANT",
            OpCode::ConstantVec2 => "CONSTANT_VEC2",
            OpCode::ConstantVec3 => "CONSTANT_VEC3",
            OpCode::Null => "NULL",
            OpCode::MakeVec2 => "MAKE_VEC2",
            OpCode::MakeVec3 => "MAKE_VEC3",
            OpCode::DefineVariable => "DEFINE_VARIABLE",
            OpCode::GetVariableValue => "GET_VARIABLE_VALUE",
            OpCode::Assignment => "ASSIGNMENT",
            OpCode::MemberAccessor => "MEMBER_ACCESSOR",
            OpCode::MemberAssignment => "MEMBER_ASSIGNMENT",
            OpCode::Add => "ADD",
            OpCode::Subtract => "SUBTRACT",
            OpCode::Multiply => "MULTIPLY",
            OpCode::Divide => "DIVIDE",
            OpCode::Negate => "NEGATE",
            OpCode::Not => "NOT",
            OpCode::Equal => "EQUAL",
            OpCode::NotEqual => "NOT_EQUAL",
            OpCode::Less => "LESS",
            OpCode::LessEqual => "LESS_EQUAL",
            OpCode::Greater => "GREATER",
            OpCode::GreaterEqual => "GREATER_EQUAL",
            OpCode::And => "AND",
            OpCode::Or => "OR",
            OpCode::If => "IF",
            OpCode::Jump => "JUMP",
            OpCode::Loop => "LOOP",
            OpCode::FunctionCall => "FUNCTION_CALL",
            OpCode::MemberFunctionCall => "MEMBER_FUNCTION_CALL",
            OpCode::ChangeState => "CHANGE_STATE",
            OpCode::Pop => "POP",
            OpCode::Return => "RETURN",
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match OpCode::ALL.get(byte as usize) {
            Some(op) if *op as u8 == byte => Ok(*op),
            _ => Err(byte),
        }
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
