//! Zephyr Token 类型定义

use crate::error::LexErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TokenKind {
    // 关键字
    State = 0,
    Function,
    OnEnter,
    OnUpdate,
    OnExit,
    ChangeState,
    If,
    Else,
    While,
    Return,
    True,
    False,
    Null,
    And,
    Or,
    Not,
    SelfValue,

    // 类型关键字
    TypeNumber = 40,
    TypeVec2,
    TypeVec3,
    TypeBool,
    TypeString,
    TypeEntity,

    // 字面量
    Number = 100,
    String,

    Identifier = 120,

    // 双字符符号
    DoubleEqual = 130,
    ExclamationEqual,
    GreaterThanEqual,
    LessThanEqual,

    // 单字符符号
    GreaterThan = 150,
    LessThan,
    Plus,
    Minus,
    Asterisk,
    Slash,
    Exclamation,
    Equal,
    Comma,
    Semicolon,
    Dot,
    LeftParenthesis,
    RightParenthesis,
    LeftCurlyBrace,
    RightCurlyBrace,

    /// 非法输入，扫描继续
    Error = 250,
    Eof = 255,
}

impl TokenKind {
    pub fn is_type_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::TypeNumber
                | TokenKind::TypeVec2
                | TokenKind::TypeVec3
                | TokenKind::TypeBool
                | TokenKind::TypeString
                | TokenKind::TypeEntity
        )
    }

    pub fn is_handler_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::OnEnter | TokenKind::OnUpdate | TokenKind::OnExit
        )
    }
}

/// 关键字表
pub static KEYWORD_TABLE: &[(&str, TokenKind)] = &[
    ("state", TokenKind::State),
    ("function", TokenKind::Function),
    ("onEnter", TokenKind::OnEnter),
    ("onUpdate", TokenKind::OnUpdate),
    ("onExit", TokenKind::OnExit),
    ("changeState", TokenKind::ChangeState),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("while", TokenKind::While),
    ("return", TokenKind::Return),
    ("true", TokenKind::True),
    ("false", TokenKind::False),
    ("null", TokenKind::Null),
    ("and", TokenKind::And),
    ("or", TokenKind::Or),
    ("not", TokenKind::Not),
    ("self", TokenKind::SelfValue),
    ("number", TokenKind::TypeNumber),
    ("vec2", TokenKind::TypeVec2),
    ("vec3", TokenKind::TypeVec3),
    ("bool", TokenKind::TypeBool),
    ("string", TokenKind::TypeString),
    ("entity", TokenKind::TypeEntity),
];

pub fn keyword(text: &str) -> Option<TokenKind> {
    KEYWORD_TABLE
        .iter()
        .find(|(word, _)| *word == text)
        .map(|(_, kind)| *kind)
}

/// 单个 token；只在编译期间存在
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 原始文本；字符串字面量为转义处理后的内容
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
    /// 仅 `TokenKind::Error` 携带
    pub error: Option<LexErrorKind>,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
            column,
            error: None,
        }
    }

    pub fn error(kind: LexErrorKind, text: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind: TokenKind::Error,
            lexeme: text.into(),
            line,
            column,
            error: Some(kind),
        }
    }
}
