//! Lexer (tokenizer) for C source code
//!
//! Converts raw source text into a flat stream of preprocessing tokens. Line
//! ends are kept as [`Token::Newline`] so the preprocessor can find directive
//! boundaries; backslash-newline continuations and comments are removed here.
//!
//! Keywords are not recognised by the lexer. A macro may be named like a
//! keyword (`#define inline __inline`), so identifiers are classified only
//! after preprocessing, see [`Token::classify`].

use super::ast::{FileId, SourceLocation};
use std::fmt;

/// C keywords, including the GNU and MSVC spellings the parser understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Auto,
    Bool,
    Break,
    Case,
    Char,
    Const,
    Continue,
    Default,
    Do,
    Double,
    Else,
    Enum,
    Extern,
    Float,
    For,
    Goto,
    If,
    Inline,
    Int,
    Long,
    Noreturn,
    Register,
    Restrict,
    Return,
    Short,
    Signed,
    Sizeof,
    Static,
    Struct,
    Switch,
    Typedef,
    Union,
    Unsigned,
    Void,
    Volatile,
    While,

    // GNU
    Attribute,
    Asm,
    Extension,

    // MSVC, only with ms-extensions
    Declspec,
    Int8,
    Int16,
    Int32,
    Int64,
    Cdecl,
    Stdcall,
    Fastcall,
    Vectorcall,
    /// `__ptr32`, `__ptr64`, `__unaligned`, `__w64`: accepted and ignored
    MsModifier,
}

impl Keyword {
    /// Look up a keyword by spelling
    pub fn from_name(name: &str, ms_extensions: bool) -> Option<Keyword> {
        let keyword = match name {
            "auto" => Keyword::Auto,
            "_Bool" => Keyword::Bool,
            "break" => Keyword::Break,
            "case" => Keyword::Case,
            "char" => Keyword::Char,
            "const" | "__const" | "__const__" => Keyword::Const,
            "continue" => Keyword::Continue,
            "default" => Keyword::Default,
            "do" => Keyword::Do,
            "double" => Keyword::Double,
            "else" => Keyword::Else,
            "enum" => Keyword::Enum,
            "extern" => Keyword::Extern,
            "float" => Keyword::Float,
            "for" => Keyword::For,
            "goto" => Keyword::Goto,
            "if" => Keyword::If,
            "inline" | "__inline" | "__inline__" => Keyword::Inline,
            "int" => Keyword::Int,
            "long" => Keyword::Long,
            "_Noreturn" => Keyword::Noreturn,
            "register" => Keyword::Register,
            "restrict" | "__restrict" | "__restrict__" => Keyword::Restrict,
            "return" => Keyword::Return,
            "short" => Keyword::Short,
            "signed" | "__signed" | "__signed__" => Keyword::Signed,
            "sizeof" => Keyword::Sizeof,
            "static" => Keyword::Static,
            "struct" => Keyword::Struct,
            "switch" => Keyword::Switch,
            "typedef" => Keyword::Typedef,
            "union" => Keyword::Union,
            "unsigned" => Keyword::Unsigned,
            "void" => Keyword::Void,
            "volatile" | "__volatile" | "__volatile__" => Keyword::Volatile,
            "while" => Keyword::While,
            "__attribute__" | "__attribute" => Keyword::Attribute,
            "asm" | "__asm" | "__asm__" => Keyword::Asm,
            "__extension__" => Keyword::Extension,
            _ if ms_extensions => match name {
                "__declspec" => Keyword::Declspec,
                "__int8" => Keyword::Int8,
                "__int16" => Keyword::Int16,
                "__int32" => Keyword::Int32,
                "__int64" => Keyword::Int64,
                "__cdecl" | "_cdecl" => Keyword::Cdecl,
                "__stdcall" | "_stdcall" => Keyword::Stdcall,
                "__fastcall" | "_fastcall" => Keyword::Fastcall,
                "__vectorcall" => Keyword::Vectorcall,
                "__forceinline" => Keyword::Inline,
                "__ptr32" | "__ptr64" | "__unaligned" | "__w64" => Keyword::MsModifier,
                _ => return None,
            },
            _ => return None,
        };
        Some(keyword)
    }

    /// Canonical spelling
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Auto => "auto",
            Keyword::Bool => "_Bool",
            Keyword::Break => "break",
            Keyword::Case => "case",
            Keyword::Char => "char",
            Keyword::Const => "const",
            Keyword::Continue => "continue",
            Keyword::Default => "default",
            Keyword::Do => "do",
            Keyword::Double => "double",
            Keyword::Else => "else",
            Keyword::Enum => "enum",
            Keyword::Extern => "extern",
            Keyword::Float => "float",
            Keyword::For => "for",
            Keyword::Goto => "goto",
            Keyword::If => "if",
            Keyword::Inline => "inline",
            Keyword::Int => "int",
            Keyword::Long => "long",
            Keyword::Noreturn => "_Noreturn",
            Keyword::Register => "register",
            Keyword::Restrict => "restrict",
            Keyword::Return => "return",
            Keyword::Short => "short",
            Keyword::Signed => "signed",
            Keyword::Sizeof => "sizeof",
            Keyword::Static => "static",
            Keyword::Struct => "struct",
            Keyword::Switch => "switch",
            Keyword::Typedef => "typedef",
            Keyword::Union => "union",
            Keyword::Unsigned => "unsigned",
            Keyword::Void => "void",
            Keyword::Volatile => "volatile",
            Keyword::While => "while",
            Keyword::Attribute => "__attribute__",
            Keyword::Asm => "asm",
            Keyword::Extension => "__extension__",
            Keyword::Declspec => "__declspec",
            Keyword::Int8 => "__int8",
            Keyword::Int16 => "__int16",
            Keyword::Int32 => "__int32",
            Keyword::Int64 => "__int64",
            Keyword::Cdecl => "__cdecl",
            Keyword::Stdcall => "__stdcall",
            Keyword::Fastcall => "__fastcall",
            Keyword::Vectorcall => "__vectorcall",
            Keyword::MsModifier => "__ptr64",
        }
    }
}

/// Punctuators, including the preprocessor-only `#` and `##`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Punct {
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    LBracket,  // [
    RBracket,  // ]
    Semicolon, // ;
    Comma,     // ,
    Dot,       // .
    Ellipsis,  // ...
    Arrow,     // ->
    Question,  // ?
    Colon,     // :

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,

    Eq,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,

    AndAnd,
    OrOr,
    Bang,

    Amp,
    Pipe,
    Caret,
    Tilde,
    LtLt,
    GtGt,

    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    LtLtEq,
    GtGtEq,

    Hash,
    HashHash,
}

impl Punct {
    pub fn as_str(self) -> &'static str {
        match self {
            Punct::LParen => "(",
            Punct::RParen => ")",
            Punct::LBrace => "{",
            Punct::RBrace => "}",
            Punct::LBracket => "[",
            Punct::RBracket => "]",
            Punct::Semicolon => ";",
            Punct::Comma => ",",
            Punct::Dot => ".",
            Punct::Ellipsis => "...",
            Punct::Arrow => "->",
            Punct::Question => "?",
            Punct::Colon => ":",
            Punct::Plus => "+",
            Punct::Minus => "-",
            Punct::Star => "*",
            Punct::Slash => "/",
            Punct::Percent => "%",
            Punct::PlusPlus => "++",
            Punct::MinusMinus => "--",
            Punct::Eq => "=",
            Punct::EqEq => "==",
            Punct::NotEq => "!=",
            Punct::Lt => "<",
            Punct::Le => "<=",
            Punct::Gt => ">",
            Punct::Ge => ">=",
            Punct::AndAnd => "&&",
            Punct::OrOr => "||",
            Punct::Bang => "!",
            Punct::Amp => "&",
            Punct::Pipe => "|",
            Punct::Caret => "^",
            Punct::Tilde => "~",
            Punct::LtLt => "<<",
            Punct::GtGt => ">>",
            Punct::PlusEq => "+=",
            Punct::MinusEq => "-=",
            Punct::StarEq => "*=",
            Punct::SlashEq => "/=",
            Punct::PercentEq => "%=",
            Punct::AmpEq => "&=",
            Punct::PipeEq => "|=",
            Punct::CaretEq => "^=",
            Punct::LtLtEq => "<<=",
            Punct::GtGtEq => ">>=",
            Punct::Hash => "#",
            Punct::HashHash => "##",
        }
    }
}

/// Preprocessing token.
///
/// Every variant carries a [`SourceLocation`] so that parse errors can report
/// an accurate line and column without a separate token→location table.
/// Literals keep their raw spelling (prefix and quotes included); they are
/// decoded by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String, SourceLocation),
    Keyword(Keyword, SourceLocation),
    Number(String, SourceLocation),
    CharLiteral(String, SourceLocation),
    StringLiteral(String, SourceLocation),
    Punct(Punct, SourceLocation),
    /// A character that starts no C token (`@`, `` ` ``, a stray quote)
    Other(char, SourceLocation),
    Newline(SourceLocation),
    Eof(SourceLocation),
}

impl Token {
    /// Returns the source location where this token appears.
    pub fn location(&self) -> SourceLocation {
        match self {
            Token::Ident(_, loc)
            | Token::Keyword(_, loc)
            | Token::Number(_, loc)
            | Token::CharLiteral(_, loc)
            | Token::StringLiteral(_, loc)
            | Token::Punct(_, loc)
            | Token::Other(_, loc)
            | Token::Newline(loc)
            | Token::Eof(loc) => *loc,
        }
    }

    /// Source spelling of the token
    pub fn spelling(&self) -> String {
        match self {
            Token::Ident(s, _)
            | Token::Number(s, _)
            | Token::CharLiteral(s, _)
            | Token::StringLiteral(s, _) => s.clone(),
            Token::Keyword(k, _) => k.as_str().to_string(),
            Token::Punct(p, _) => p.as_str().to_string(),
            Token::Other(c, _) => c.to_string(),
            Token::Newline(_) | Token::Eof(_) => String::new(),
        }
    }

    pub fn is_punct(&self, punct: Punct) -> bool {
        matches!(self, Token::Punct(p, _) if *p == punct)
    }

    pub fn ident(&self) -> Option<&str> {
        match self {
            Token::Ident(name, _) => Some(name),
            _ => None,
        }
    }

    /// Same token at a different location (macro expansion results)
    pub fn relocated(&self, location: SourceLocation) -> Token {
        match self {
            Token::Ident(s, _) => Token::Ident(s.clone(), location),
            Token::Keyword(k, _) => Token::Keyword(*k, location),
            Token::Number(s, _) => Token::Number(s.clone(), location),
            Token::CharLiteral(s, _) => Token::CharLiteral(s.clone(), location),
            Token::StringLiteral(s, _) => Token::StringLiteral(s.clone(), location),
            Token::Punct(p, _) => Token::Punct(*p, location),
            Token::Other(c, _) => Token::Other(*c, location),
            Token::Newline(_) => Token::Newline(location),
            Token::Eof(_) => Token::Eof(location),
        }
    }

    /// Turn identifiers that spell a keyword into [`Token::Keyword`]
    pub fn classify(self, ms_extensions: bool) -> Token {
        match self {
            Token::Ident(name, loc) => match Keyword::from_name(&name, ms_extensions) {
                Some(keyword) => Token::Keyword(keyword, loc),
                None => Token::Ident(name, loc),
            },
            other => other,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s, _) => write!(f, "identifier '{}'", s),
            Token::Keyword(k, _) => write!(f, "'{}'", k.as_str()),
            Token::Number(s, _) => write!(f, "number {}", s),
            Token::CharLiteral(s, _) => write!(f, "char literal {}", s),
            Token::StringLiteral(s, _) => write!(f, "string literal {}", s),
            Token::Punct(p, _) => write!(f, "'{}'", p.as_str()),
            Token::Other(c, _) => write!(f, "stray '{}'", c),
            Token::Newline(_) => write!(f, "end of line"),
            Token::Eof(_) => write!(f, "end of file"),
        }
    }
}

/// Lexer error type
#[derive(Debug)]
pub struct LexError {
    pub message: String,
    pub location: SourceLocation,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lexer error at line {}, column {}: {}",
            self.location.line, self.location.column, self.message
        )
    }
}

impl std::error::Error for LexError {}

/// Lexer for C source code
pub struct Lexer {
    input: Vec<char>,
    file: FileId,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    /// Create a new lexer for the given source string.
    pub fn new(input: &str, file: FileId) -> Self {
        Self {
            input: input.chars().collect(),
            file,
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire input. The result always ends with
    /// `Newline, Eof` so every directive line is terminated.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments()?;

            let loc = self.current_location();
            match self.peek() {
                None => {
                    if !matches!(tokens.last(), Some(Token::Newline(_)) | None) {
                        tokens.push(Token::Newline(loc));
                    }
                    tokens.push(Token::Eof(loc));
                    break;
                }
                Some('\n') => {
                    self.advance();
                    tokens.push(Token::Newline(loc));
                }
                Some(_) => tokens.push(self.next_token()),
            }
        }

        Ok(tokens)
    }

    /// Get next token
    fn next_token(&mut self) -> Token {
        let loc = self.current_location();
        let Some(ch) = self.peek() else {
            return Token::Eof(loc);
        };

        // Wide and unicode literal prefixes
        if matches!(ch, 'L' | 'u' | 'U') {
            let (quote_at, prefix_len) = match (self.peek_ahead(1), self.peek_ahead(2)) {
                (Some('8'), Some(q)) if ch == 'u' && (q == '"' || q == '\'') => (q, 2),
                (Some(q), _) if q == '"' || q == '\'' => (q, 1),
                _ => (' ', 0),
            };
            if prefix_len > 0 {
                return self.quoted_literal(quote_at, prefix_len);
            }
        }

        match ch {
            '"' | '\'' => self.quoted_literal(ch, 0),
            '0'..='9' => self.number_literal(),
            '.' if self.peek_ahead(1).is_some_and(|c| c.is_ascii_digit()) => self.number_literal(),
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => self.identifier(),
            _ => self.punctuator(),
        }
    }

    fn punctuator(&mut self) -> Token {
        let loc = self.current_location();
        let Some(ch) = self.advance() else {
            return Token::Eof(loc);
        };

        let punct = match ch {
            '(' => Punct::LParen,
            ')' => Punct::RParen,
            '{' => Punct::LBrace,
            '}' => Punct::RBrace,
            '[' => Punct::LBracket,
            ']' => Punct::RBracket,
            ';' => Punct::Semicolon,
            ',' => Punct::Comma,
            '?' => Punct::Question,
            ':' => Punct::Colon,
            '~' => Punct::Tilde,
            '.' => {
                if self.peek() == Some('.') && self.peek_ahead(1) == Some('.') {
                    self.advance();
                    self.advance();
                    Punct::Ellipsis
                } else {
                    Punct::Dot
                }
            }
            '+' => self.select(&[('+', Punct::PlusPlus), ('=', Punct::PlusEq)], Punct::Plus),
            '-' => self.select(
                &[('-', Punct::MinusMinus), ('=', Punct::MinusEq), ('>', Punct::Arrow)],
                Punct::Minus,
            ),
            '*' => self.select(&[('=', Punct::StarEq)], Punct::Star),
            '/' => self.select(&[('=', Punct::SlashEq)], Punct::Slash),
            '%' => self.select(&[('=', Punct::PercentEq)], Punct::Percent),
            '=' => self.select(&[('=', Punct::EqEq)], Punct::Eq),
            '!' => self.select(&[('=', Punct::NotEq)], Punct::Bang),
            '^' => self.select(&[('=', Punct::CaretEq)], Punct::Caret),
            '&' => self.select(&[('&', Punct::AndAnd), ('=', Punct::AmpEq)], Punct::Amp),
            '|' => self.select(&[('|', Punct::OrOr), ('=', Punct::PipeEq)], Punct::Pipe),
            '#' => self.select(&[('#', Punct::HashHash)], Punct::Hash),
            '<' => {
                if self.peek() == Some('<') {
                    self.advance();
                    self.select(&[('=', Punct::LtLtEq)], Punct::LtLt)
                } else {
                    self.select(&[('=', Punct::Le)], Punct::Lt)
                }
            }
            '>' => {
                if self.peek() == Some('>') {
                    self.advance();
                    self.select(&[('=', Punct::GtGtEq)], Punct::GtGt)
                } else {
                    self.select(&[('=', Punct::Ge)], Punct::Gt)
                }
            }
            other => return Token::Other(other, loc),
        };

        Token::Punct(punct, loc)
    }

    /// Consume one of the listed follow characters, or return `single`
    fn select(&mut self, follows: &[(char, Punct)], single: Punct) -> Punct {
        for (next, punct) in follows {
            if self.peek() == Some(*next) {
                self.advance();
                return *punct;
            }
        }
        single
    }

    /// Char or string literal, raw spelling. A literal left open at the end
    /// of the line is not an error here: the quote becomes [`Token::Other`]
    /// so text like `#error don't` in a skipped block lexes cleanly.
    fn quoted_literal(&mut self, quote: char, prefix_len: usize) -> Token {
        let loc = self.current_location();

        let mut offset = prefix_len + 1;
        let mut closed = false;
        while let Some(ch) = self.peek_ahead(offset) {
            if ch == '\n' {
                break;
            }
            if ch == '\\' {
                offset += 2;
                continue;
            }
            offset += 1;
            if ch == quote {
                closed = true;
                break;
            }
        }

        if !closed {
            if prefix_len > 0 {
                // the prefix was an identifier after all
                return self.identifier();
            }
            self.advance();
            return Token::Other(quote, loc);
        }

        let mut raw = String::new();
        for _ in 0..offset {
            if let Some(ch) = self.advance() {
                raw.push(ch);
            }
        }

        if quote == '"' {
            Token::StringLiteral(raw, loc)
        } else {
            Token::CharLiteral(raw, loc)
        }
    }

    /// Preprocessing number: digits, letters, `_`, `.`, and signed exponents
    fn number_literal(&mut self) -> Token {
        let loc = self.current_location();
        let mut raw = String::new();

        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
                raw.push(ch);
                self.advance();
                if matches!(ch, 'e' | 'E' | 'p' | 'P') && matches!(self.peek(), Some('+') | Some('-')) {
                    if let Some(sign) = self.advance() {
                        raw.push(sign);
                    }
                }
            } else {
                break;
            }
        }

        Token::Number(raw, loc)
    }

    fn identifier(&mut self) -> Token {
        let loc = self.current_location();
        let mut ident = String::new();

        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Token::Ident(ident, loc)
    }

    /// Skip whitespace (but not newlines), comments and line continuations
    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') | Some('\x0c') | Some('\x0b') => {
                    self.advance();
                }
                Some('\\') if self.continuation_len() > 0 => {
                    for _ in 0..self.continuation_len() {
                        self.advance();
                    }
                }
                Some('/') => {
                    if self.peek_ahead(1) == Some('/') {
                        self.skip_line_comment();
                    } else if self.peek_ahead(1) == Some('*') {
                        self.skip_block_comment()?;
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Length of a `\` + newline sequence at the cursor, 0 if there is none
    fn continuation_len(&self) -> usize {
        match (self.peek_ahead(1), self.peek_ahead(2)) {
            (Some('\n'), _) => 2,
            (Some('\r'), Some('\n')) => 3,
            _ => 0,
        }
    }

    /// Skip single-line comment (// ...), leaving the newline in place
    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            if ch == '\\' && self.continuation_len() > 0 {
                for _ in 0..self.continuation_len() {
                    self.advance();
                }
                continue;
            }
            self.advance();
        }
    }

    /// Skip multi-line comment (/* ... */)
    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start_loc = self.current_location();
        self.advance(); // skip '/'
        self.advance(); // skip '*'

        while !self.is_at_end() {
            if self.peek() == Some('*') && self.peek_ahead(1) == Some('/') {
                self.advance(); // skip '*'
                self.advance(); // skip '/'
                return Ok(());
            }
            self.advance();
        }

        Err(LexError {
            message: "Unterminated block comment".to_string(),
            location: start_loc,
        })
    }

    /// Peek at current character without consuming
    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// Peek ahead n characters
    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).copied()
    }

    /// Advance to next character
    fn advance(&mut self) -> Option<char> {
        let ch = *self.input.get(self.position)?;
        self.position += 1;

        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(ch)
    }

    /// Check if at end of input
    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Get current source location
    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.file, self.line, self.column)
    }
}

/// Tokens touch in the source (no whitespace between them)
pub fn adjacent(prev: &Token, next: &Token) -> bool {
    let a = prev.location();
    let b = next.location();
    a.file == b.file && a.line == b.line && b.column == a.column + prev.spelling().chars().count()
}

/// Source-like spelling of a token run; a space separates tokens that were
/// not adjacent in the source
pub fn join_spelling(tokens: &[Token]) -> String {
    let mut text = String::new();
    for (index, token) in tokens.iter().enumerate() {
        if index > 0 && !adjacent(&tokens[index - 1], token) {
            text.push(' ');
        }
        text.push_str(&token.spelling());
    }
    text
}

/// Decode the escapes of a char or string literal body
fn unescape(body: &str) -> Vec<u32> {
    let chars: Vec<char> = body.chars().collect();
    let mut out = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        i += 1;
        if ch != '\\' || i >= chars.len() {
            out.push(ch as u32);
            continue;
        }
        let escaped = chars[i];
        i += 1;
        let value = match escaped {
            'n' => 0x0a,
            't' => 0x09,
            'r' => 0x0d,
            'a' => 0x07,
            'b' => 0x08,
            'f' => 0x0c,
            'v' => 0x0b,
            'e' => 0x1b,
            'x' => {
                let mut value: u32 = 0;
                while i < chars.len() && chars[i].is_ascii_hexdigit() {
                    value = value.wrapping_mul(16) + chars[i].to_digit(16).unwrap_or(0);
                    i += 1;
                }
                value
            }
            '0'..='7' => {
                let mut value = escaped.to_digit(8).unwrap_or(0);
                let mut digits = 1;
                while digits < 3 && i < chars.len() && chars[i].is_digit(8) {
                    value = value * 8 + chars[i].to_digit(8).unwrap_or(0);
                    i += 1;
                    digits += 1;
                }
                value
            }
            other => other as u32,
        };
        out.push(value);
    }

    out
}

/// Strip an `L`/`u`/`U`/`u8` prefix and the quotes
fn literal_body(raw: &str, quote: char) -> &str {
    let start = raw.find(quote).map(|i| i + 1).unwrap_or(0);
    let end = raw.rfind(quote).filter(|e| *e >= start).unwrap_or(raw.len());
    &raw[start..end]
}

/// Value of a character literal; multi-character constants are packed
/// big-endian like GCC and MSVC do
pub fn decode_char_literal(raw: &str) -> i64 {
    let units = unescape(literal_body(raw, '\''));
    let wide = !raw.starts_with('\'');
    match units.as_slice() {
        [] => 0,
        [single] if wide => i64::from(*single),
        // plain char is signed
        [single] => i64::from(*single as u8 as i8),
        many => many
            .iter()
            .fold(0i64, |acc, u| (acc << 8) | i64::from(*u as u8)),
    }
}

/// Contents of a string literal with escapes decoded
pub fn decode_string_literal(raw: &str) -> String {
    unescape(literal_body(raw, '"'))
        .into_iter()
        .map(|u| char::from_u32(u).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        Lexer::new(source, 1).tokenize().unwrap()
    }

    #[test]
    fn test_simple_tokens() {
        let tokens = lex("int main() { return 0; }");

        assert!(matches!(tokens[0], Token::Ident(ref s, _) if s == "int"));
        assert!(matches!(tokens[1], Token::Ident(ref s, _) if s == "main"));
        assert!(tokens[2].is_punct(Punct::LParen));
        assert!(tokens[3].is_punct(Punct::RParen));
        assert!(tokens[4].is_punct(Punct::LBrace));
        assert!(matches!(tokens[6], Token::Number(ref n, _) if n == "0"));
        assert!(tokens[7].is_punct(Punct::Semicolon));
        assert!(tokens[8].is_punct(Punct::RBrace));
        assert!(matches!(tokens[9], Token::Newline(_)));
        assert!(matches!(tokens[10], Token::Eof(_)));
    }

    #[test]
    fn test_operators() {
        let tokens = lex("++ -- += <<= >>= ... -> ## # &= |=");
        let puncts: Vec<Punct> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Punct(p, _) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(
            puncts,
            vec![
                Punct::PlusPlus,
                Punct::MinusMinus,
                Punct::PlusEq,
                Punct::LtLtEq,
                Punct::GtGtEq,
                Punct::Ellipsis,
                Punct::Arrow,
                Punct::HashHash,
                Punct::Hash,
                Punct::AmpEq,
                Punct::PipeEq,
            ]
        );
    }

    #[test]
    fn test_comments_and_continuations() {
        let tokens = lex("int x; // comment\nint y; /* block\ncomment */ int \\\nz;");
        let idents: Vec<&str> = tokens.iter().filter_map(|t| t.ident()).collect();
        assert_eq!(idents, vec!["int", "x", "int", "y", "int", "z"]);

        let newlines = tokens
            .iter()
            .filter(|t| matches!(t, Token::Newline(_)))
            .count();
        // the block comment and the continuation swallow their line ends
        assert_eq!(newlines, 2);
    }

    #[test]
    fn test_numbers_keep_spelling() {
        let tokens = lex("0x1Fu 10UL 1.5e+3f .5 077");
        let numbers: Vec<String> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Number(n, _) => Some(n.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(numbers, vec!["0x1Fu", "10UL", "1.5e+3f", ".5", "077"]);
    }

    #[test]
    fn test_literals() {
        let tokens = lex(r#""hello\nworld" L"wide" 'a' '\x41' L'b'"#);
        assert!(matches!(tokens[0], Token::StringLiteral(ref s, _) if s == r#""hello\nworld""#));
        assert!(matches!(tokens[1], Token::StringLiteral(ref s, _) if s == r#"L"wide""#));
        assert!(matches!(tokens[2], Token::CharLiteral(ref s, _) if s == "'a'"));

        assert_eq!(decode_string_literal(r#""hello\nworld""#), "hello\nworld");
        assert_eq!(decode_string_literal(r#"L"wide""#), "wide");
        assert_eq!(decode_char_literal("'a'"), 97);
        assert_eq!(decode_char_literal(r"'\x41'"), 65);
        assert_eq!(decode_char_literal(r"'\0'"), 0);
        assert_eq!(decode_char_literal(r"'\377'"), -1);
        assert_eq!(decode_char_literal("L'b'"), 98);
    }

    #[test]
    fn test_unterminated_quote_is_stray() {
        let tokens = lex("#error don't\nint x;");
        assert!(tokens.iter().any(|t| matches!(t, Token::Other('\'', _))));
        assert!(tokens.iter().any(|t| t.ident() == Some("x")));
    }

    #[test]
    fn test_locations_carry_file() {
        let tokens = Lexer::new("a\n  b", 7).tokenize().unwrap();
        assert_eq!(tokens[0].location(), SourceLocation::new(7, 1, 1));
        assert_eq!(tokens[2].location(), SourceLocation::new(7, 2, 3));
    }

    #[test]
    fn test_keyword_classification() {
        let kw = Token::Ident("__inline".to_string(), SourceLocation::default()).classify(false);
        assert!(matches!(kw, Token::Keyword(Keyword::Inline, _)));

        let ms = Token::Ident("__int64".to_string(), SourceLocation::default());
        assert!(matches!(ms.clone().classify(false), Token::Ident(..)));
        assert!(matches!(ms.classify(true), Token::Keyword(Keyword::Int64, _)));
    }

    #[test]
    fn test_unterminated_block_comment() {
        let err = Lexer::new("/* open", 1).tokenize().unwrap_err();
        assert!(err.message.contains("Unterminated"));
    }
}
