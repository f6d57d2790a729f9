//! 表达式编译（优先级爬升）

use super::precedence::{binary_opcode, get_precedence};
use super::{CompileResult, Compiler};
use crate::bytecode::{OpCode, MEMBER_OF_FIELD, MEMBER_OF_STACK};
use crate::error::{CompileErrorKind, LexErrorKind};
use crate::lexer::TokenKind;
use crate::value::{Vec2, Vec3, ZephyrValue};

/// 编译表达式，结果留在栈顶
pub(super) fn expression(compiler: &mut Compiler) -> CompileResult<()> {
    precedence(compiler, 0)
}

/// 编译表达式语句，允许以成员赋值结尾
///
/// 返回 true 表示编译成了赋值（栈上不留值）
pub(super) fn expression_statement(compiler: &mut Compiler) -> CompileResult<bool> {
    match compiler.peek_kind() {
        TokenKind::Minus | TokenKind::Exclamation | TokenKind::Not => {
            expression(compiler)?;
            Ok(false)
        }
        _ => {
            if primary(compiler, true)? {
                return Ok(true);
            }
            binary_tail(compiler, 0)?;
            Ok(false)
        }
    }
}

fn precedence(compiler: &mut Compiler, min_precedence: i32) -> CompileResult<()> {
    unary(compiler)?;
    binary_tail(compiler, min_precedence)
}

/// 左操作数已在栈上，循环处理后续的二元运算符
fn binary_tail(compiler: &mut Compiler, min_precedence: i32) -> CompileResult<()> {
    loop {
        let op = compiler.peek_kind();
        let op_precedence = get_precedence(op);
        if op_precedence <= min_precedence {
            break;
        }
        compiler.advance();

        match op {
            // 短路：左值决定结果时跳过右操作数，左值留在栈上
            TokenKind::And | TokenKind::Or => {
                let jump_op = if op == TokenKind::And {
                    OpCode::And
                } else {
                    OpCode::Or
                };
                let jump = compiler.emit_jump(jump_op);
                precedence(compiler, op_precedence)?;
                compiler.patch_jump(jump)?;
            }
            _ => {
                precedence(compiler, op_precedence)?;
                if let Some(opcode) = binary_opcode(op) {
                    compiler.emit_op(opcode);
                }
            }
        }
    }
    Ok(())
}

fn unary(compiler: &mut Compiler) -> CompileResult<()> {
    match compiler.peek_kind() {
        TokenKind::Minus => {
            compiler.advance();
            unary(compiler)?;
            compiler.emit_op(OpCode::Negate);
        }
        TokenKind::Exclamation | TokenKind::Not => {
            compiler.advance();
            unary(compiler)?;
            compiler.emit_op(OpCode::Not);
        }
        _ => {
            primary(compiler, false)?;
        }
    }
    Ok(())
}

/// 基础表达式（带后缀）
fn primary(compiler: &mut Compiler, can_assign: bool) -> CompileResult<bool> {
    let token = compiler.advance();
    match token.kind {
        TokenKind::Number => {
            let value: f32 = token.lexeme.parse().map_err(|_| {
                compiler.error_at(
                    &token,
                    CompileErrorKind::Lex(LexErrorKind::InvalidNumber),
                    &format!("malformed number '{}'", token.lexeme),
                )
            })?;
            compiler.emit_constant(OpCode::Constant, ZephyrValue::Number(value))?;
        }
        TokenKind::String => {
            compiler.emit_constant(OpCode::Constant, ZephyrValue::String(token.lexeme))?;
        }
        TokenKind::True => compiler.emit_constant(OpCode::Constant, ZephyrValue::Bool(true))?,
        TokenKind::False => compiler.emit_constant(OpCode::Constant, ZephyrValue::Bool(false))?,
        TokenKind::Null => compiler.emit_op(OpCode::Null),
        TokenKind::SelfValue => {
            let idx = compiler.identifier_constant("self")?;
            compiler.emit_op_operands(OpCode::GetVariableValue, &[idx]);
        }
        TokenKind::LeftParenthesis => {
            expression(compiler)?;
            compiler.expect(TokenKind::RightParenthesis, "expected ')' after expression")?;
        }
        TokenKind::TypeVec2 | TokenKind::TypeVec3
            if compiler.check(TokenKind::LeftParenthesis) =>
        {
            vector_constructor(compiler, token.kind)?;
        }
        TokenKind::Identifier => {
            if compiler.check(TokenKind::LeftParenthesis) {
                let argc = arguments(compiler)?;
                let idx = compiler.identifier_constant(&token.lexeme)?;
                compiler.emit_op_operands(OpCode::FunctionCall, &[idx, argc]);
            } else {
                let idx = compiler.identifier_constant(&token.lexeme)?;
                compiler.emit_op_operands(OpCode::GetVariableValue, &[idx]);
            }
        }
        _ => {
            return Err(compiler.error_at(
                &token,
                CompileErrorKind::UnexpectedToken,
                "expected expression",
            ))
        }
    }
    postfix(compiler, can_assign)
}

/// 成员访问、成员调用与链尾的成员赋值
///
/// 最后一次成员读取延迟发出：链尾遇到 `=` 时，`a.f.m = e` 改为对容器 `a`
/// 的字段 `f` 读-改-写，`a.m = e` 直接写接收者。
fn postfix(compiler: &mut Compiler, can_assign: bool) -> CompileResult<bool> {
    let mut pending: Option<u8> = None;
    while compiler.match_token(TokenKind::Dot) {
        let member = compiler.expect_identifier("expected member name after '.'")?;
        let idx = compiler.identifier_constant(&member.lexeme)?;

        if compiler.check(TokenKind::LeftParenthesis) {
            flush_member(compiler, pending.take());
            let argc = arguments(compiler)?;
            compiler.emit_op_operands(OpCode::MemberFunctionCall, &[idx, argc]);
        } else if can_assign && compiler.check(TokenKind::Equal) {
            compiler.advance();
            expression(compiler)?;
            let operands = match pending {
                Some(field) => [MEMBER_OF_FIELD, field, idx],
                None => [MEMBER_OF_STACK, 0, idx],
            };
            compiler.emit_op_operands(OpCode::MemberAssignment, &operands);
            return Ok(true);
        } else {
            flush_member(compiler, pending.replace(idx));
        }
    }
    flush_member(compiler, pending);
    Ok(false)
}

fn flush_member(compiler: &mut Compiler, member: Option<u8>) {
    if let Some(idx) = member {
        compiler.emit_op_operands(OpCode::MemberAccessor, &[idx]);
    }
}

/// `( a, b, ... )`，返回参数个数
fn arguments(compiler: &mut Compiler) -> CompileResult<u8> {
    let open = compiler.expect(TokenKind::LeftParenthesis, "expected '('")?;
    let mut count = 0usize;
    if !compiler.check(TokenKind::RightParenthesis) {
        loop {
            expression(compiler)?;
            count += 1;
            if count > u8::MAX as usize {
                return Err(compiler.error_at(
                    &open,
                    CompileErrorKind::TooManyArguments,
                    "a call can pass at most 255 arguments",
                ));
            }
            if !compiler.match_token(TokenKind::Comma) {
                break;
            }
        }
    }
    compiler.expect(TokenKind::RightParenthesis, "expected ')' after arguments")?;
    Ok(count as u8)
}

/// `vec2(x, y)` / `vec3(x, y, z)`
///
/// 分量全是数字字面量时折叠成一个常量
fn vector_constructor(compiler: &mut Compiler, kind: TokenKind) -> CompileResult<()> {
    let arity = if kind == TokenKind::TypeVec2 { 2 } else { 3 };

    if let Some((components, consumed)) = literal_components(compiler, arity) {
        compiler.pos += consumed;
        let (op, value) = if arity == 2 {
            (
                OpCode::ConstantVec2,
                ZephyrValue::Vec2(Vec2::new(components[0], components[1])),
            )
        } else {
            (
                OpCode::ConstantVec3,
                ZephyrValue::Vec3(Vec3::new(components[0], components[1], components[2])),
            )
        };
        return compiler.emit_constant(op, value);
    }

    let open = compiler.peek().clone();
    let argc = arguments(compiler)?;
    if argc as usize != arity {
        return Err(compiler.error_at(
            &open,
            CompileErrorKind::UnexpectedToken,
            &format!("vec{} takes {} components", arity, arity),
        ));
    }
    compiler.emit_op(if arity == 2 {
        OpCode::MakeVec2
    } else {
        OpCode::MakeVec3
    });
    Ok(())
}

/// 检查 `( [-]n , [-]n ... )` 形式，返回分量和需要消费的 token 数
fn literal_components(compiler: &Compiler, arity: usize) -> Option<(Vec<f32>, usize)> {
    let mut offset = 0;
    if compiler.peek_kind_at(offset) != TokenKind::LeftParenthesis {
        return None;
    }
    offset += 1;

    let mut components = Vec::with_capacity(arity);
    for i in 0..arity {
        if i > 0 {
            if compiler.peek_kind_at(offset) != TokenKind::Comma {
                return None;
            }
            offset += 1;
        }
        let negative = compiler.peek_kind_at(offset) == TokenKind::Minus;
        if negative {
            offset += 1;
        }
        if compiler.peek_kind_at(offset) != TokenKind::Number {
            return None;
        }
        let value: f32 = compiler.tokens[compiler.pos + offset].lexeme.parse().ok()?;
        components.push(if negative { -value } else { value });
        offset += 1;
    }

    if compiler.peek_kind_at(offset) != TokenKind::RightParenthesis {
        return None;
    }
    Some((components, offset + 1))
}
