use super::ast::{Span, Target};
use super::error::CompileError;
use super::types::TypeName;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    String(String),
    /// `$"spaced name"`
    VarName(String),
    /// `` `<red>styled` ``
    StyledText(String),

    // Identifiers & keywords
    Ident(String),
    Type(TypeName),
    Target(Target),
    Func,
    Codeblock,
    Out,
    Const,
    Local,
    Game,
    Save,
    Var,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Semicolon,
    Colon,
    Question,
    Dot,
    Comma,
    Ellipsis, // ...

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Eq,
    Lt,
    Gt,

    Eof,
}

impl Token {
    /// Short description used in parser diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::String(s) => format!("string \"{s}\""),
            Token::VarName(s) => format!("variable name $\"{s}\""),
            Token::StyledText(s) => format!("styled text `{s}`"),
            Token::Ident(s) => format!("identifier '{s}'"),
            Token::Type(t) => format!("type '{t}'"),
            Token::Target(t) => format!("target '{}'", t.wire_name()),
            Token::Eof => "end of file".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::Func => "func",
            Token::Codeblock => "codeblock",
            Token::Out => "out",
            Token::Const => "const",
            Token::Local => "local",
            Token::Game => "game",
            Token::Save => "save",
            Token::Var => "var",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Semicolon => ";",
            Token::Colon => ":",
            Token::Question => "?",
            Token::Dot => ".",
            Token::Comma => ",",
            Token::Ellipsis => "...",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Caret => "^",
            Token::Eq => "=",
            Token::Lt => "<",
            Token::Gt => ">",
            _ => "?",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Tokenize `source`, stopping at the first malformed token.
pub fn lex(source: &str) -> Result<Vec<SpannedToken>, CompileError> {
    let mut lexer = Lexer::new(source);
    lexer.tokenize()
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<SpannedToken>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn tokenize(&mut self) -> Result<Vec<SpannedToken>, CompileError> {
        loop {
            self.skip_whitespace_and_comments();
            let Some(ch) = self.peek() else {
                break;
            };
            let start = self.pos;

            match ch {
                b'(' => self.single(Token::LParen),
                b')' => self.single(Token::RParen),
                b'[' => self.single(Token::LBracket),
                b']' => self.single(Token::RBracket),
                b'{' => self.single(Token::LBrace),
                b'}' => self.single(Token::RBrace),
                b';' => self.single(Token::Semicolon),
                b':' => self.single(Token::Colon),
                b'?' => self.single(Token::Question),
                b',' => self.single(Token::Comma),
                b'+' => self.single(Token::Plus),
                b'-' => self.single(Token::Minus),
                b'*' => self.single(Token::Star),
                b'/' => self.single(Token::Slash),
                b'^' => self.single(Token::Caret),
                b'=' => self.single(Token::Eq),
                b'<' => self.single(Token::Lt),
                b'>' => self.single(Token::Gt),
                b'.' => {
                    if self.bytes.get(self.pos + 1) == Some(&b'.')
                        && self.bytes.get(self.pos + 2) == Some(&b'.')
                    {
                        self.pos += 3;
                        self.push(Token::Ellipsis, start);
                    } else {
                        self.single(Token::Dot);
                    }
                }
                b'"' => {
                    let s = self.lex_quoted(b'"')?;
                    self.push(Token::String(s), start);
                }
                b'`' => {
                    let s = self.lex_quoted(b'`')?;
                    self.push(Token::StyledText(s), start);
                }
                b'$' => {
                    self.pos += 1;
                    if self.peek() != Some(b'"') {
                        return Err(CompileError::lexer(
                            "Expected '\"' after '$'",
                            Span::new(start, self.pos),
                        ));
                    }
                    let s = self.lex_quoted(b'"')?;
                    self.push(Token::VarName(s), start);
                }
                b'@' => self.lex_target(start)?,
                b'0'..=b'9' => self.lex_number(start)?,
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.lex_ident(start),
                _ => {
                    let c = self.source[start..].chars().next().unwrap_or('?');
                    return Err(CompileError::lexer(
                        format!("Unexpected character '{c}'"),
                        Span::new(start, start + c.len_utf8()),
                    ));
                }
            }
        }

        self.tokens.push(SpannedToken {
            token: Token::Eof,
            span: Span::new(self.pos, self.pos),
        });
        Ok(std::mem::take(&mut self.tokens))
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn single(&mut self, token: Token) {
        let start = self.pos;
        self.pos += 1;
        self.push(token, start);
    }

    fn push(&mut self, token: Token, start: usize) {
        self.tokens.push(SpannedToken {
            token,
            span: Span::new(start, self.pos),
        });
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'/' if self.bytes.get(self.pos + 1) == Some(&b'/') => {
                    while self.peek().is_some_and(|b| b != b'\n') {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    /// Body of a single-line literal delimited by `quote`. Backslash escapes
    /// are kept verbatim; the engine interprets them.
    fn lex_quoted(&mut self, quote: u8) -> Result<String, CompileError> {
        let start = self.pos;
        self.pos += 1;
        let body_start = self.pos;
        loop {
            match self.peek() {
                Some(b) if b == quote => break,
                Some(b'\\') if self.bytes.get(self.pos + 1).is_some_and(|b| *b != b'\n') => {
                    self.pos += 2;
                }
                Some(b'\n') | None => {
                    return Err(CompileError::lexer(
                        "Unterminated string literal",
                        Span::new(start, self.pos),
                    ));
                }
                Some(_) => self.pos += 1,
            }
        }
        let body = self.source[body_start..self.pos].to_string();
        self.pos += 1;
        Ok(body)
    }

    fn lex_number(&mut self, start: usize) -> Result<(), CompileError> {
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') && self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_digit) {
            self.pos += 1;
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text = &self.source[start..self.pos];
        let value = text.parse::<f64>().map_err(|_| {
            CompileError::lexer(format!("Invalid number: {text}"), Span::new(start, self.pos))
        })?;
        self.push(Token::Number(value), start);
        Ok(())
    }

    fn scan_word(&mut self) -> &'a str {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.pos += 1;
        }
        &self.source[start..self.pos]
    }

    fn lex_target(&mut self, start: usize) -> Result<(), CompileError> {
        self.pos += 1;
        let word = self.scan_word();
        match Target::from_keyword(word) {
            Some(target) => {
                self.push(Token::Target(target), start);
                Ok(())
            }
            None => Err(CompileError::lexer(
                format!("Unknown target '@{word}'"),
                Span::new(start, self.pos),
            )),
        }
    }

    fn lex_ident(&mut self, start: usize) {
        let word = self.scan_word();
        let token = match word {
            "func" => Token::Func,
            "codeblock" => Token::Codeblock,
            "out" => Token::Out,
            "const" => Token::Const,
            "local" => Token::Local,
            "game" => Token::Game,
            "save" => Token::Save,
            "var" => Token::Var,
            _ => match TypeName::from_keyword(word) {
                Some(ty) => Token::Type(ty),
                None => Token::Ident(word.to_string()),
            },
        };
        self.push(token, start);
    }
}
