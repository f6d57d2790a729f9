//! 词法分析
//!
//! 输出有限的 token 序列，总以 `Eof` 结尾。非法输入产生
//! `TokenKind::Error`（携带出错文本和行号），扫描从下一个字符继续，
//! 这样一次编译可以报告多个诊断。

mod token;

pub use token::{keyword, Token, TokenKind, KEYWORD_TABLE};

use crate::error::{LexError, LexErrorKind};
use tracing::{debug, trace};

const TARGET: &str = "zephyr::lexer";

/// 扫描整个源码
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    errors: Vec<LexError>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            errors: Vec::new(),
        }
    }

    /// 扫描到结尾
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    /// 已遇到的词法错误
    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    pub fn next_token(&mut self) -> Token {
        if let Some(error) = self.skip_whitespace_and_comments() {
            return error;
        }

        let line = self.line;
        let column = self.column;
        let Some(c) = self.advance() else {
            return Token::new(TokenKind::Eof, "", line, column);
        };

        let token = match c {
            c if is_identifier_start(c) => self.scan_identifier(c, line, column),
            c if c.is_ascii_digit() => self.scan_number(c, line, column),
            '"' => self.scan_string(line, column),
            _ => self.scan_operator(c, line, column),
        };

        trace!(target: TARGET, kind = ?token.kind, line, column, lexeme = %token.lexeme, "token");
        token
    }

    // ==================== 字符流 ====================

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn check(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&mut self, kind: LexErrorKind, text: String, line: usize, column: usize) -> Token {
        debug!(target: TARGET, %kind, line, column, text = %text, "lex error");
        self.errors.push(LexError {
            kind,
            line,
            column,
            text: text.clone(),
        });
        Token::error(kind, text, line, column)
    }

    // ==================== 扫描 ====================

    /// 跳过空白与注释；未闭合的块注释返回错误 token
    fn skip_whitespace_and_comments(&mut self) -> Option<Token> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_next() == Some('*') => {
                    let (line, column) = (self.line, self.column);
                    self.advance();
                    self.advance();
                    let mut closed = false;
                    while let Some(c) = self.advance() {
                        if c == '*' && self.peek() == Some('/') {
                            self.advance();
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Some(self.error(
                            LexErrorKind::UnterminatedComment,
                            "/*".to_string(),
                            line,
                            column,
                        ));
                    }
                }
                _ => return None,
            }
        }
    }

    fn scan_identifier(&mut self, first: char, line: usize, column: usize) -> Token {
        let mut text = String::from(first);
        while let Some(c) = self.peek() {
            if !is_identifier_continue(c) {
                break;
            }
            text.push(c);
            self.advance();
        }
        let kind = keyword(&text).unwrap_or(TokenKind::Identifier);
        Token::new(kind, text, line, column)
    }

    /// `12`、`2.5`；`1.` 和 `1.2.3` 是错误
    fn scan_number(&mut self, first: char, line: usize, column: usize) -> Token {
        let mut text = String::from(first);
        self.take_digits(&mut text);

        if self.peek() == Some('.') {
            match self.peek_next() {
                Some(c) if c.is_ascii_digit() => {
                    text.push('.');
                    self.advance();
                    self.take_digits(&mut text);
                }
                // `1.` 后面不是数字：可能是成员访问 `1.x`，按非法数字处理
                _ => {
                    text.push('.');
                    self.advance();
                    return self.error(LexErrorKind::InvalidNumber, text, line, column);
                }
            }

            if self.peek() == Some('.') {
                while let Some(c) = self.peek() {
                    if !(c.is_ascii_digit() || c == '.') {
                        break;
                    }
                    text.push(c);
                    self.advance();
                }
                return self.error(LexErrorKind::InvalidNumber, text, line, column);
            }
        }

        Token::new(TokenKind::Number, text, line, column)
    }

    fn take_digits(&mut self, text: &mut String) {
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            text.push(c);
            self.advance();
        }
    }

    /// 双引号字符串，支持 `\n \t \" \\`；不能跨行
    fn scan_string(&mut self, line: usize, column: usize) -> Token {
        let mut value = String::new();
        let mut raw = String::from('"');
        let mut bad_escape = false;

        loop {
            match self.peek() {
                None | Some('\n') => {
                    return self.error(LexErrorKind::UnterminatedString, raw, line, column);
                }
                Some('"') => {
                    self.advance();
                    raw.push('"');
                    break;
                }
                Some('\\') => {
                    self.advance();
                    raw.push('\\');
                    let escaped = match self.peek() {
                        Some('n') => Some('\n'),
                        Some('t') => Some('\t'),
                        Some('"') => Some('"'),
                        Some('\\') => Some('\\'),
                        _ => None,
                    };
                    match escaped {
                        Some(c) => {
                            raw.push(self.peek().unwrap_or(c));
                            self.advance();
                            value.push(c);
                        }
                        None => bad_escape = true,
                    }
                }
                Some(c) => {
                    self.advance();
                    raw.push(c);
                    value.push(c);
                }
            }
        }

        if bad_escape {
            return self.error(LexErrorKind::InvalidEscape, raw, line, column);
        }
        Token::new(TokenKind::String, value, line, column)
    }

    fn scan_operator(&mut self, c: char, line: usize, column: usize) -> Token {
        let (kind, text) = match c {
            '=' if self.check('=') => (TokenKind::DoubleEqual, "=="),
            '!' if self.check('=') => (TokenKind::ExclamationEqual, "!="),
            '>' if self.check('=') => (TokenKind::GreaterThanEqual, ">="),
            '<' if self.check('=') => (TokenKind::LessThanEqual, "<="),
            '&' if self.check('&') => (TokenKind::And, "&&"),
            '|' if self.check('|') => (TokenKind::Or, "||"),
            '=' => (TokenKind::Equal, "="),
            '!' => (TokenKind::Exclamation, "!"),
            '>' => (TokenKind::GreaterThan, ">"),
            '<' => (TokenKind::LessThan, "<"),
            '+' => (TokenKind::Plus, "+"),
            '-' => (TokenKind::Minus, "-"),
            '*' => (TokenKind::Asterisk, "*"),
            '/' => (TokenKind::Slash, "/"),
            ',' => (TokenKind::Comma, ","),
            ';' => (TokenKind::Semicolon, ";"),
            '.' => (TokenKind::Dot, "."),
            '(' => (TokenKind::LeftParenthesis, "("),
            ')' => (TokenKind::RightParenthesis, ")"),
            '{' => (TokenKind::LeftCurlyBrace, "{"),
            '}' => (TokenKind::RightCurlyBrace, "}"),
            other => {
                return self.error(LexErrorKind::InvalidChar, other.to_string(), line, column);
            }
        };
        Token::new(kind, text, line, column)
    }
}

pub fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(input: &str) -> Vec<(TokenKind, String)> {
        tokenize(input)
            .into_iter()
            .map(|t| (t.kind, t.lexeme))
            .collect()
    }

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lexer_tokenizes_keywords() {
        assert_eq!(
            kinds("state function onEnter onUpdate onExit changeState if else"),
            vec![
                TokenKind::State,
                TokenKind::Function,
                TokenKind::OnEnter,
                TokenKind::OnUpdate,
                TokenKind::OnExit,
                TokenKind::ChangeState,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("true false null number vec2 vec3 bool string entity"),
            vec![
                TokenKind::True,
                TokenKind::False,
                TokenKind::Null,
                TokenKind::TypeNumber,
                TokenKind::TypeVec2,
                TokenKind::TypeVec3,
                TokenKind::TypeBool,
                TokenKind::TypeString,
                TokenKind::TypeEntity,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert_eq!(
            kinds("State onupdate"),
            vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn test_lexer_tokenizes_operators() {
        assert_eq!(
            kinds("== != >= <= > < + - * / ! = && || and or not"),
            vec![
                TokenKind::DoubleEqual,
                TokenKind::ExclamationEqual,
                TokenKind::GreaterThanEqual,
                TokenKind::LessThanEqual,
                TokenKind::GreaterThan,
                TokenKind::LessThan,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Asterisk,
                TokenKind::Slash,
                TokenKind::Exclamation,
                TokenKind::Equal,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_tokenizes_literals() {
        let tokens = lex_all(r#"42 2.5 "hi\n" speed_2"#);
        assert_eq!(tokens[0], (TokenKind::Number, "42".to_string()));
        assert_eq!(tokens[1], (TokenKind::Number, "2.5".to_string()));
        assert_eq!(tokens[2], (TokenKind::String, "hi\n".to_string()));
        assert_eq!(tokens[3], (TokenKind::Identifier, "speed_2".to_string()));
    }

    #[test]
    fn test_lexer_skips_comments() {
        let source = "// header\nstate /* inline\n comment */ Idle";
        let tokens = tokenize(source);
        assert_eq!(tokens[0].kind, TokenKind::State);
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_error_token_carries_text_and_line() {
        let tokens = tokenize("x = 1;\ny = @;");
        let error = tokens.iter().find(|t| t.kind == TokenKind::Error).unwrap();
        assert_eq!(error.lexeme, "@");
        assert_eq!(error.line, 2);
        assert_eq!(error.error, Some(LexErrorKind::InvalidChar));
    }

    #[test]
    fn test_lexing_continues_after_errors() {
        let mut lexer = Lexer::new("a # b $ 1.2.3 \"open");
        let tokens = lexer.tokenize();
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::Identifier,
                TokenKind::Error,
                TokenKind::Identifier,
                TokenKind::Error,
                TokenKind::Error,
                TokenKind::Error,
                TokenKind::Eof,
            ]
        );
        let error_kinds: Vec<_> = lexer.errors().iter().map(|e| e.kind).collect();
        assert_eq!(
            error_kinds,
            vec![
                LexErrorKind::InvalidChar,
                LexErrorKind::InvalidChar,
                LexErrorKind::InvalidNumber,
                LexErrorKind::UnterminatedString,
            ]
        );
    }

    #[test]
    fn test_invalid_escape_and_unterminated_comment() {
        let tokens = tokenize(r#""bad\q" /* never closed"#);
        assert_eq!(tokens[0].error, Some(LexErrorKind::InvalidEscape));
        assert_eq!(tokens[1].error, Some(LexErrorKind::UnterminatedComment));
        assert_eq!(tokens[2].kind, TokenKind::Eof);
    }

    #[test]
    fn test_member_access_on_identifier() {
        assert_eq!(
            kinds("v.x"),
            vec![
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }
}
