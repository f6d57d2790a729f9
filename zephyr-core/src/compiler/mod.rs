//! 单遍编译器
//!
//! 语句用递归下降，表达式用优先级爬升，边解析边写入 Chunk，不构建 AST。
//! 一个代码块（状态事件处理器、函数、顶层变量声明）内的错误只中止该代码块，
//! 其余代码块继续编译并累积诊断。

mod expr;
mod precedence;
mod stmt;

pub use precedence::{binary_opcode, declared_type, get_precedence};

use crate::bytecode::{Chunk, ChunkError, OpCode, SCOPE_INSTANCE};
use crate::definition::{
    function_chunk_name, CompiledScriptDefinition, FunctionDefinition, Handler, Parameter,
    StateDefinition, INIT_CHUNK,
};
use crate::error::{CompileError, CompileErrorKind};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::value::ZephyrValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use zephyr_config::CompilerConfig;
use zephyr_log::{debug, diag, Level, Location, Logger};

type CompileResult<T> = Result<T, CompileError>;

/// 顶层（不属于任何代码块）的诊断使用的块名
const TOP_LEVEL: &str = "<script>";

/// 编译一个脚本
///
/// 总是返回定义；有诊断时 `is_valid` 为 false。
pub fn compile(
    script: &str,
    source: &str,
    config: &CompilerConfig,
    logger: Arc<Logger>,
) -> CompiledScriptDefinition {
    let tokens = tokenize(source);
    Compiler::new(script, tokens, config, logger).compile_script()
}

/// 字面量 `changeState("X")` 的目标，编译结束后统一检查
struct StateRef {
    target: String,
    chunk: String,
    line: usize,
    column: usize,
}

struct Compiler<'a> {
    script: String,
    tokens: Vec<Token>,
    pos: usize,
    config: &'a CompilerConfig,
    logger: Arc<Logger>,
    /// 正在生成的代码块
    chunk: Chunk,
    initializer: Chunk,
    states: Vec<StateDefinition>,
    functions: BTreeMap<String, FunctionDefinition>,
    diagnostics: Vec<CompileError>,
    state_refs: Vec<StateRef>,
}

impl<'a> Compiler<'a> {
    fn new(script: &str, tokens: Vec<Token>, config: &'a CompilerConfig, logger: Arc<Logger>) -> Self {
        Self {
            script: script.to_string(),
            tokens,
            pos: 0,
            config,
            logger,
            chunk: Chunk::new(TOP_LEVEL),
            initializer: Chunk::new(INIT_CHUNK),
            states: Vec::new(),
            functions: BTreeMap::new(),
            diagnostics: Vec::new(),
            state_refs: Vec::new(),
        }
    }

    fn compile_script(mut self) -> CompiledScriptDefinition {
        while !self.check(TokenKind::Eof) {
            if let Err(err) = self.declaration() {
                self.report(err);
                self.synchronize();
            }
        }

        let line = self.line();
        self.initializer.write_op(OpCode::Null, line);
        self.initializer.write_op(OpCode::Return, line);

        if self.states.is_empty() {
            let eof = self.peek().clone();
            let err = self.error_at(&eof, CompileErrorKind::NoStates, "script declares no states");
            self.report(err);
        }
        self.check_state_refs();

        let definition = CompiledScriptDefinition {
            name: self.script,
            states: self.states,
            functions: self.functions,
            initializer: self.initializer,
            is_valid: self.diagnostics.is_empty(),
            diagnostics: self.diagnostics,
        };

        debug!(
            self.logger,
            "compiled '{}': valid={} states={} functions={}",
            definition.name,
            definition.is_valid,
            definition.states.len(),
            definition.functions.len()
        );
        if self.config.dump_bytecode {
            for name in definition.chunk_names() {
                if let Some(chunk) = definition.chunk(&name) {
                    chunk.log_disassembly(&self.logger);
                }
            }
        }
        definition
    }

    // ===== 顶层声明 =====

    fn declaration(&mut self) -> CompileResult<()> {
        match self.peek_kind() {
            TokenKind::State => self.state_declaration(),
            TokenKind::Function => self.function_declaration(),
            kind if kind.is_type_keyword() => self.instance_variable(),
            _ => Err(self.error_at_current(
                CompileErrorKind::UnexpectedToken,
                "expected 'state', 'function' or a variable declaration",
            )),
        }
    }

    fn state_declaration(&mut self) -> CompileResult<()> {
        self.advance();
        let name_token = self.expect_identifier("expected state name")?;
        let name = name_token.lexeme.clone();

        let open = self.pos;
        self.expect(TokenKind::LeftCurlyBrace, "expected '{' after state name")?;
        let close = self.matching_brace(open);

        let mut state = StateDefinition::new(&name);
        while !self.check(TokenKind::RightCurlyBrace) && !self.check(TokenKind::Eof) {
            let handler = match self.peek_kind() {
                TokenKind::OnEnter => Handler::Enter,
                TokenKind::OnUpdate => Handler::Update,
                TokenKind::OnExit => Handler::Exit,
                _ => {
                    let err = self.error_at_current(
                        CompileErrorKind::UnexpectedToken,
                        "expected 'onEnter', 'onUpdate' or 'onExit'",
                    );
                    self.report(err);
                    self.pos = close;
                    break;
                }
            };
            let handler_token = self.advance();

            if state.handler(handler).is_some() {
                let err = self.error_at(
                    &handler_token,
                    CompileErrorKind::DuplicateHandler,
                    &format!("state '{}' already has an {} handler", name, handler),
                );
                self.report(err);
                self.skip_block();
                continue;
            }

            let chunk = self.chunk_body(format!("{}.{}", name, handler));
            *state.slot_mut(handler) = chunk;
        }
        self.expect(TokenKind::RightCurlyBrace, "expected '}' after state body")?;

        if self.states.iter().any(|s| s.name == name) {
            let err = self.error_at(
                &name_token,
                CompileErrorKind::DuplicateState,
                &format!("state '{}' is declared more than once", name),
            );
            self.report(err);
        } else {
            self.states.push(state);
        }
        Ok(())
    }

    fn function_declaration(&mut self) -> CompileResult<()> {
        self.advance();
        let name_token = self.expect_identifier("expected function name")?;
        let name = name_token.lexeme.clone();

        self.expect(TokenKind::LeftParenthesis, "expected '(' after function name")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParenthesis) {
            loop {
                let ty = match declared_type(self.peek_kind()) {
                    Some(ty) => ty,
                    None => {
                        return Err(self.error_at_current(
                            CompileErrorKind::UnexpectedToken,
                            "expected parameter type",
                        ))
                    }
                };
                self.advance();
                let param = self.expect_identifier("expected parameter name")?;
                params.push(Parameter {
                    name: param.lexeme,
                    ty,
                });
                if params.len() > u8::MAX as usize {
                    return Err(self.error_at(
                        &name_token,
                        CompileErrorKind::TooManyArguments,
                        "a function can take at most 255 parameters",
                    ));
                }
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParenthesis, "expected ')' after parameters")?;

        let duplicate = self.functions.contains_key(&name);
        let chunk = self.chunk_body(function_chunk_name(&name));
        if duplicate {
            let err = self.error_at(
                &name_token,
                CompileErrorKind::DuplicateFunction,
                &format!("function '{}' is declared more than once", name),
            );
            self.report(err);
        } else if let Some(chunk) = chunk {
            self.functions
                .insert(name.clone(), FunctionDefinition { name, params, chunk });
        }
        Ok(())
    }

    /// 顶层变量声明写入初始化块；失败时回滚写入的字节
    fn instance_variable(&mut self) -> CompileResult<()> {
        let mark = self.initializer.code.len();
        let outer = std::mem::replace(&mut self.chunk, Chunk::new(TOP_LEVEL));
        self.chunk = std::mem::replace(&mut self.initializer, outer);

        let result = stmt::variable_declaration(self, SCOPE_INSTANCE);

        let outer = std::mem::replace(&mut self.chunk, Chunk::new(TOP_LEVEL));
        self.initializer = std::mem::replace(&mut self.chunk, outer);
        if result.is_err() {
            self.initializer.code.truncate(mark);
            self.initializer.lines.truncate(mark);
        }
        result
    }

    /// 编译 `{ ... }` 为一个独立代码块
    ///
    /// 出错时记录诊断并跳到匹配的 `}` 之后，返回 None。
    fn chunk_body(&mut self, name: String) -> Option<Chunk> {
        let open = self.pos;
        let close = self.matching_brace(open);
        let outer = std::mem::replace(&mut self.chunk, Chunk::new(name));

        let result = stmt::block(self).map(|()| {
            let line = self.line();
            self.emit_op_at(OpCode::Null, line);
            self.emit_op_at(OpCode::Return, line);
        });

        let chunk = std::mem::replace(&mut self.chunk, outer);
        match result {
            Ok(()) => Some(chunk),
            Err(err) => {
                // 报告时仍需要出错代码块的名字
                self.report(err);
                self.pos = (close + 1).min(self.tokens.len() - 1);
                None
            }
        }
    }

    fn check_state_refs(&mut self) {
        let refs = std::mem::take(&mut self.state_refs);
        for state_ref in refs {
            if self.states.iter().any(|s| s.name == state_ref.target) {
                continue;
            }
            let err = CompileError {
                kind: CompileErrorKind::UndefinedState,
                script: self.script.clone(),
                chunk: state_ref.chunk,
                line: state_ref.line,
                column: state_ref.column,
                message: format!("undefined state '{}'", state_ref.target),
            };
            self.report(err);
        }
    }

    // ===== 错误处理 =====

    fn report(&mut self, err: CompileError) {
        diag!(
            self.logger,
            Level::Error,
            Location::new(&err.script, &err.chunk, err.line),
            "CompileError: {}",
            err.message
        );
        self.diagnostics.push(err);
    }

    fn error_at(&self, token: &Token, kind: CompileErrorKind, message: &str) -> CompileError {
        let (kind, message) = match token.kind {
            TokenKind::Error => {
                let lex = token.error.unwrap_or(crate::error::LexErrorKind::InvalidChar);
                (
                    CompileErrorKind::Lex(lex),
                    format!("{} '{}'", lex, token.lexeme),
                )
            }
            TokenKind::Eof if kind == CompileErrorKind::UnexpectedToken => (
                CompileErrorKind::UnexpectedEof,
                format!("{}, found end of file", message),
            ),
            _ if kind == CompileErrorKind::UnexpectedToken => {
                (kind, format!("{}, found '{}'", message, token.lexeme))
            }
            _ => (kind, message.to_string()),
        };
        CompileError {
            kind,
            script: self.script.clone(),
            chunk: self.chunk.name.clone(),
            line: token.line,
            column: token.column,
            message,
        }
    }

    fn error_at_current(&self, kind: CompileErrorKind, message: &str) -> CompileError {
        self.error_at(self.peek(), kind, message)
    }

    fn chunk_error(&self, err: ChunkError) -> CompileError {
        let kind = match err {
            ChunkError::TooManyConstants => CompileErrorKind::TooManyConstants,
            ChunkError::JumpTooLarge(_) => CompileErrorKind::JumpTooLarge,
        };
        let token = &self.tokens[self.pos.saturating_sub(1)];
        self.error_at(token, kind, &err.to_string())
    }

    /// 顶层错误恢复：跳到下一个 state / function / 类型关键字
    fn synchronize(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Eof | TokenKind::State | TokenKind::Function => return,
                kind if kind.is_type_keyword() => return,
                TokenKind::LeftCurlyBrace => self.skip_block(),
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// 从 `{` 跳到匹配的 `}` 之后
    fn skip_block(&mut self) {
        let close = self.matching_brace(self.pos);
        self.pos = (close + 1).min(self.tokens.len() - 1);
    }

    /// 与 `open` 处的 `{` 匹配的 `}` 的位置；不是 `{` 时返回 `open`
    fn matching_brace(&self, open: usize) -> usize {
        if self.tokens.get(open).map(|t| t.kind) != Some(TokenKind::LeftCurlyBrace) {
            return open;
        }
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(open) {
            match token.kind {
                TokenKind::LeftCurlyBrace => depth += 1,
                TokenKind::RightCurlyBrace => {
                    depth -= 1;
                    if depth == 0 {
                        return i;
                    }
                }
                TokenKind::Eof => return i,
                _ => {}
            }
        }
        self.tokens.len() - 1
    }

    // ===== Token 操作 =====

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        let last = self.tokens.len() - 1;
        self.tokens[(self.pos + offset).min(last)].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> CompileResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_at_current(CompileErrorKind::UnexpectedToken, message))
        }
    }

    fn expect_identifier(&mut self, message: &str) -> CompileResult<Token> {
        self.expect(TokenKind::Identifier, message)
    }

    // ===== 字节码生成 =====

    /// 最近消费的 token 所在行；关闭调试信息时为 0
    fn line(&self) -> usize {
        if !self.config.emit_debug_info {
            return 0;
        }
        self.tokens[self.pos.saturating_sub(1)].line
    }

    fn emit_op(&mut self, op: OpCode) {
        let line = self.line();
        self.chunk.write_op(op, line);
    }

    fn emit_op_at(&mut self, op: OpCode, line: usize) {
        self.chunk.write_op(op, line);
    }

    fn emit_op_operands(&mut self, op: OpCode, operands: &[u8]) {
        let line = self.line();
        self.chunk.write_op(op, line);
        for &byte in operands {
            self.chunk.write_byte(byte, line);
        }
    }

    fn emit_jump(&mut self, op: OpCode) -> usize {
        let line = self.line();
        self.chunk.write_jump(op, line)
    }

    fn patch_jump(&mut self, offset: usize) -> CompileResult<()> {
        self.chunk.patch_jump(offset).map_err(|e| self.chunk_error(e))
    }

    fn emit_loop(&mut self, loop_start: usize) -> CompileResult<()> {
        let line = self.line();
        self.chunk
            .write_loop(loop_start, line)
            .map_err(|e| self.chunk_error(e))
    }

    fn make_constant(&mut self, value: ZephyrValue) -> CompileResult<u8> {
        self.chunk.add_constant(value).map_err(|e| self.chunk_error(e))
    }

    fn identifier_constant(&mut self, name: &str) -> CompileResult<u8> {
        self.make_constant(ZephyrValue::String(name.to_string()))
    }

    fn emit_constant(&mut self, op: OpCode, value: ZephyrValue) -> CompileResult<()> {
        let idx = self.make_constant(value)?;
        self.emit_op_operands(op, &[idx]);
        Ok(())
    }
}
