use crate::bytecode::OpCode;
use crate::lexer::TokenKind;
use crate::value::ValueType;

/// 二元运算符优先级，0 表示不是二元运算符
///
/// 所有二元运算符都是左结合的
pub fn get_precedence(op: TokenKind) -> i32 {
    match op {
        TokenKind::Or => 60,
        TokenKind::And => 80,
        TokenKind::DoubleEqual
        | TokenKind::ExclamationEqual
        | TokenKind::GreaterThan
        | TokenKind::LessThan
        | TokenKind::GreaterThanEqual
        | TokenKind::LessThanEqual => 100,
        TokenKind::Plus | TokenKind::Minus => 200,
        TokenKind::Asterisk | TokenKind::Slash => 300,
        _ => 0,
    }
}

/// 非短路二元运算符对应的指令
pub fn binary_opcode(op: TokenKind) -> Option<OpCode> {
    let opcode = match op {
        TokenKind::Plus => OpCode::Add,
        TokenKind::Minus => OpCode::Subtract,
        TokenKind::Asterisk => OpCode::Multiply,
        TokenKind::Slash => OpCode::Divide,
        TokenKind::DoubleEqual => OpCode::Equal,
        TokenKind::ExclamationEqual => OpCode::NotEqual,
        TokenKind::LessThan => OpCode::Less,
        TokenKind::LessThanEqual => OpCode::LessEqual,
        TokenKind::GreaterThan => OpCode::Greater,
        TokenKind::GreaterThanEqual => OpCode::GreaterEqual,
        _ => return None,
    };
    Some(opcode)
}

/// 类型关键字对应的值类型
pub fn declared_type(kind: TokenKind) -> Option<ValueType> {
    let ty = match kind {
        TokenKind::TypeNumber => ValueType::Number,
        TokenKind::TypeVec2 => ValueType::Vec2,
        TokenKind::TypeVec3 => ValueType::Vec3,
        TokenKind::TypeBool => ValueType::Bool,
        TokenKind::TypeString => ValueType::String,
        TokenKind::TypeEntity => ValueType::Entity,
        _ => return None,
    };
    Some(ty)
}
