use crate::error::LexError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    CurlyOpen,     // {
    CurlyClose,    // }
    MustacheOpen,  // {{
    MustacheClose, // }}
    BlockOpen,     // {{#
    BlockClose,    // {{/

    Less,         // <
    Greater,      // >
    TagClose,     // </
    Slash,        // /
    SlashGreater, // />
    Equal,        // =
    Hash,         // #

    Quote,  // "
    String, // raw text between quotes
    Identifier,
    Number,
    Whitespace,
    Newline,

    // Keywords
    If,
    Else,
    Each,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Number(f64),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => f.write_str(s),
            // Integral numbers keep one decimal so `3` reads as `3.0`.
            Literal::Number(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{n:.1}"),
            Literal::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub literal: Option<Literal>,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, literal: Option<Literal>, line: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            literal,
            line,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.kind, self.text.escape_debug())?;
        match &self.literal {
            Some(literal) => write!(f, " {literal}"),
            None => f.write_str(" null"),
        }
    }
}

fn keyword(text: &str) -> Option<TokenKind> {
    match text {
        "if" => Some(TokenKind::If),
        "else" => Some(TokenKind::Else),
        "each" => Some(TokenKind::Each),
        _ => None,
    }
}

fn is_alpha(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '_' | '+' | '-' | ',' | '.' | ':' | '@' | '$' | '!' | '?')
}

fn is_inline_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r')
}

/// Single-pass scanner turning template source into tokens.
///
/// Text inside double quotes is scanned in string mode: raw runs become
/// [`TokenKind::String`] tokens while `{{ ... }}` interpolations inside the
/// quotes are tokenized normally, so the parser can rebuild them as nested
/// statements.
pub struct Tokenizer<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
    start: usize,
    cursor: usize,
    line: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            tokens: Vec::new(),
            errors: Vec::new(),
            start: 0,
            cursor: 0,
            line: 1,
        }
    }

    /// Scan the whole source.
    ///
    /// The token list always ends with exactly one [`TokenKind::Eof`], even
    /// when errors were reported.
    pub fn scan(mut self) -> (Vec<Token>, Vec<LexError>) {
        while !self.is_at_end() {
            self.start = self.cursor;
            self.scan_token();
        }
        self.tokens.push(Token::new(TokenKind::Eof, "", None, self.line));
        (self.tokens, self.errors)
    }

    fn scan_token(&mut self) {
        let Some(c) = self.advance() else {
            return;
        };
        match c {
            '{' => {
                if self.matches_pair('{', '#') {
                    self.add_token(TokenKind::BlockOpen);
                } else if self.matches_pair('{', '/') {
                    self.add_token(TokenKind::BlockClose);
                } else if self.matches('{') {
                    self.add_token(TokenKind::MustacheOpen);
                } else {
                    self.add_token(TokenKind::CurlyOpen);
                }
            }
            '}' => {
                let kind = if self.matches('}') {
                    TokenKind::MustacheClose
                } else {
                    TokenKind::CurlyClose
                };
                self.add_token(kind);
            }
            '<' => {
                let kind = if self.matches('/') {
                    TokenKind::TagClose
                } else {
                    TokenKind::Less
                };
                self.add_token(kind);
            }
            '>' => self.add_token(TokenKind::Greater),
            '/' => {
                let kind = if self.matches('>') {
                    TokenKind::SlashGreater
                } else {
                    TokenKind::Slash
                };
                self.add_token(kind);
            }
            '=' => self.add_token(TokenKind::Equal),
            '#' => self.add_token(TokenKind::Hash),
            '"' => self.string(),
            '\n' => {
                self.add_token(TokenKind::Newline);
                self.line += 1;
            }
            c if is_inline_space(c) => {
                while self.peek().is_some_and(is_inline_space) {
                    self.advance();
                }
                self.add_token(TokenKind::Whitespace);
            }
            c if c.is_ascii_digit() => self.number(),
            c if is_alpha(c) => self.identifier(),
            c => self.error(format!("Unexpected character: '{}'", c.escape_debug())),
        }
    }

    /// Scans `"..."`, re-entering normal scanning for every `{{` inside.
    fn string(&mut self) {
        self.add_token(TokenKind::Quote);
        let open_line = self.line;

        loop {
            self.start = self.cursor;
            match self.peek() {
                None => {
                    self.errors.push(LexError {
                        line: open_line,
                        message: "Unterminated string.".to_string(),
                    });
                    return;
                }
                Some('"') => {
                    self.advance();
                    self.add_token(TokenKind::Quote);
                    return;
                }
                Some('{') if self.peek_next() == Some('{') => self.interpolation(),
                Some(_) => self.string_run(),
            }
        }
    }

    /// Tokenizes one `{{ ... }}` inside a string, stopping after `}}`, at a
    /// quote, or at end of input.
    fn interpolation(&mut self) {
        while !self.is_at_end() && self.peek() != Some('"') {
            self.start = self.cursor;
            self.scan_token();
            if self
                .tokens
                .last()
                .is_some_and(|t| t.kind == TokenKind::MustacheClose)
            {
                return;
            }
        }
    }

    fn string_run(&mut self) {
        let start_line = self.line;
        while let Some(c) = self.peek() {
            if c == '"' || (c == '{' && self.peek_next() == Some('{')) {
                break;
            }
            if c == '\n' {
                self.line += 1;
            }
            self.advance();
        }
        let value = &self.source[self.start..self.cursor];
        self.tokens.push(Token::new(
            TokenKind::String,
            value,
            Some(Literal::Str(value.to_string())),
            start_line,
        ));
    }

    fn number(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        match self.source[self.start..self.cursor].parse::<f64>() {
            Ok(value) => self.add_literal(TokenKind::Number, Some(Literal::Number(value))),
            Err(_) => self.error(format!(
                "Invalid number: {}",
                &self.source[self.start..self.cursor]
            )),
        }
    }

    fn identifier(&mut self) {
        while self.peek().is_some_and(|c| is_alpha(c) || c.is_ascii_digit()) {
            self.advance();
        }
        let text = &self.source[self.start..self.cursor];
        self.add_token(keyword(text).unwrap_or(TokenKind::Identifier));
    }

    fn is_at_end(&self) -> bool {
        self.cursor >= self.source.len()
    }

    fn peek(&self) -> Option<char> {
        self.source[self.cursor..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.cursor..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.cursor += c.len_utf8();
        Some(c)
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.cursor += expected.len_utf8();
            true
        } else {
            false
        }
    }

    /// Consumes `first` then `second` only if both are next; otherwise
    /// leaves the cursor untouched.
    fn matches_pair(&mut self, first: char, second: char) -> bool {
        if self.peek() == Some(first) && self.peek_next() == Some(second) {
            self.cursor += first.len_utf8() + second.len_utf8();
            true
        } else {
            false
        }
    }

    fn add_token(&mut self, kind: TokenKind) {
        self.add_literal(kind, None);
    }

    fn add_literal(&mut self, kind: TokenKind, literal: Option<Literal>) {
        let text = &self.source[self.start..self.cursor];
        self.tokens.push(Token::new(kind, text, literal, self.line));
    }

    fn error(&mut self, message: String) {
        self.errors.push(LexError {
            line: self.line,
            message,
        });
    }
}

/// Scan `source` into tokens, collecting every lexical error.
pub fn scan(source: &str) -> (Vec<Token>, Vec<LexError>) {
    Tokenizer::new(source).scan()
}
