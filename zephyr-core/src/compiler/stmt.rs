//! 语句编译

use super::expr;
use super::precedence::declared_type;
use super::{CompileResult, Compiler, StateRef};
use crate::bytecode::{OpCode, MEMBER_OF_VARIABLE, SCOPE_LOCAL};
use crate::error::CompileErrorKind;
use crate::lexer::TokenKind;
use zephyr_log::trace;

/// 编译 `{ ... }`；局部变量在整个代码块内可见，不另开作用域
pub(super) fn block(compiler: &mut Compiler) -> CompileResult<()> {
    compiler.expect(TokenKind::LeftCurlyBrace, "expected '{'")?;
    while !compiler.check(TokenKind::RightCurlyBrace) && !compiler.check(TokenKind::Eof) {
        statement(compiler)?;
    }
    compiler.expect(TokenKind::RightCurlyBrace, "expected '}'")?;
    Ok(())
}

/// 编译语句
pub(super) fn statement(compiler: &mut Compiler) -> CompileResult<()> {
    match compiler.peek_kind() {
        kind if kind.is_type_keyword() && compiler.peek_kind_at(1) == TokenKind::Identifier => {
            variable_declaration(compiler, SCOPE_LOCAL)
        }
        TokenKind::If => if_statement(compiler),
        TokenKind::While => while_statement(compiler),
        TokenKind::Return => return_statement(compiler),
        TokenKind::ChangeState => change_state_statement(compiler),
        TokenKind::LeftCurlyBrace => block(compiler),
        TokenKind::Semicolon => {
            compiler.advance();
            Ok(())
        }
        _ => assignment_or_expression(compiler),
    }
}

/// `type name [= expr];`
///
/// 没有初始值时压入 null，由 VM 换成类型的零值
pub(super) fn variable_declaration(compiler: &mut Compiler, scope: u8) -> CompileResult<()> {
    let type_token = compiler.advance();
    let ty = declared_type(type_token.kind).ok_or_else(|| {
        compiler.error_at(
            &type_token,
            CompileErrorKind::UnexpectedToken,
            "expected a type",
        )
    })?;
    let name = compiler.expect_identifier("expected variable name")?;

    if compiler.match_token(TokenKind::Equal) {
        expr::expression(compiler)?;
    } else {
        compiler.emit_op(OpCode::Null);
    }
    compiler.expect(
        TokenKind::Semicolon,
        "expected ';' after variable declaration",
    )?;

    let idx = compiler.identifier_constant(&name.lexeme)?;
    trace!(
        compiler.logger,
        "define {} {} in {}",
        ty,
        name.lexeme,
        compiler.chunk.name
    );
    compiler.emit_op_operands(OpCode::DefineVariable, &[idx, ty as u8, scope]);
    Ok(())
}

/// 编译 if / else if / else
fn if_statement(compiler: &mut Compiler) -> CompileResult<()> {
    compiler.advance();
    compiler.expect(TokenKind::LeftParenthesis, "expected '(' after 'if'")?;
    expr::expression(compiler)?;
    compiler.expect(TokenKind::RightParenthesis, "expected ')' after condition")?;

    // 条件为假时跳过 then 分支
    let then_jump = compiler.emit_jump(OpCode::If);
    block(compiler)?;

    if compiler.match_token(TokenKind::Else) {
        // then 分支执行完后跳过 else 分支
        let else_jump = compiler.emit_jump(OpCode::Jump);
        compiler.patch_jump(then_jump)?;
        if compiler.check(TokenKind::If) {
            if_statement(compiler)?;
        } else {
            block(compiler)?;
        }
        compiler.patch_jump(else_jump)?;
    } else {
        compiler.patch_jump(then_jump)?;
    }
    Ok(())
}

fn while_statement(compiler: &mut Compiler) -> CompileResult<()> {
    compiler.advance();
    let loop_start = compiler.chunk.current_offset();

    compiler.expect(TokenKind::LeftParenthesis, "expected '(' after 'while'")?;
    expr::expression(compiler)?;
    compiler.expect(TokenKind::RightParenthesis, "expected ')' after condition")?;

    let exit_jump = compiler.emit_jump(OpCode::If);
    block(compiler)?;
    compiler.emit_loop(loop_start)?;
    compiler.patch_jump(exit_jump)?;
    Ok(())
}

fn return_statement(compiler: &mut Compiler) -> CompileResult<()> {
    compiler.advance();
    if compiler.match_token(TokenKind::Semicolon) {
        compiler.emit_op(OpCode::Null);
    } else {
        expr::expression(compiler)?;
        compiler.expect(TokenKind::Semicolon, "expected ';' after return value")?;
    }
    compiler.emit_op(OpCode::Return);
    Ok(())
}

/// `changeState(expr);`，字面量目标在编译结束后检查是否存在
fn change_state_statement(compiler: &mut Compiler) -> CompileResult<()> {
    compiler.advance();
    compiler.expect(TokenKind::LeftParenthesis, "expected '(' after 'changeState'")?;

    if compiler.check(TokenKind::String)
        && compiler.peek_kind_at(1) == TokenKind::RightParenthesis
    {
        let target = compiler.peek().clone();
        compiler.state_refs.push(StateRef {
            target: target.lexeme,
            chunk: compiler.chunk.name.clone(),
            line: target.line,
            column: target.column,
        });
    }

    expr::expression(compiler)?;
    compiler.expect(TokenKind::RightParenthesis, "expected ')' after state name")?;
    compiler.expect(TokenKind::Semicolon, "expected ';' after changeState")?;
    compiler.emit_op(OpCode::ChangeState);
    Ok(())
}

/// 赋值语句或表达式语句
///
/// `x = e;` 和 `x.m = e;` 按变量名存取，更长的链 `a.b.m = e;` 先求出容器再读-改-写
fn assignment_or_expression(compiler: &mut Compiler) -> CompileResult<()> {
    let first = compiler.peek_kind();

    if first == TokenKind::Identifier && compiler.peek_kind_at(1) == TokenKind::Equal {
        let name = compiler.advance();
        compiler.advance();
        expr::expression(compiler)?;
        compiler.expect(TokenKind::Semicolon, "expected ';' after assignment")?;
        let idx = compiler.identifier_constant(&name.lexeme)?;
        compiler.emit_op_operands(OpCode::Assignment, &[idx]);
        return Ok(());
    }

    let is_variable = matches!(first, TokenKind::Identifier | TokenKind::SelfValue);
    if is_variable
        && compiler.peek_kind_at(1) == TokenKind::Dot
        && compiler.peek_kind_at(2) == TokenKind::Identifier
        && compiler.peek_kind_at(3) == TokenKind::Equal
    {
        let variable = compiler.advance();
        compiler.advance();
        let member = compiler.advance();
        compiler.advance();
        expr::expression(compiler)?;
        compiler.expect(TokenKind::Semicolon, "expected ';' after assignment")?;

        let variable_name = if variable.kind == TokenKind::SelfValue {
            "self"
        } else {
            variable.lexeme.as_str()
        };
        let variable_idx = compiler.identifier_constant(variable_name)?;
        let member_idx = compiler.identifier_constant(&member.lexeme)?;
        compiler.emit_op_operands(
            OpCode::MemberAssignment,
            &[MEMBER_OF_VARIABLE, variable_idx, member_idx],
        );
        return Ok(());
    }

    let assigned = expr::expression_statement(compiler)?;
    if !assigned && compiler.check(TokenKind::Equal) {
        return Err(compiler.error_at_current(
            CompileErrorKind::InvalidAssignmentTarget,
            "invalid assignment target",
        ));
    }
    compiler.expect(TokenKind::Semicolon, "expected ';' after expression")?;
    if !assigned {
        // 表达式语句的结果丢弃
        compiler.emit_op(OpCode::Pop);
    }
    Ok(())
}
