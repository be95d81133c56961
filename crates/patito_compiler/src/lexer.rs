//! Lexer: source text → tokens.

use patito_syntax::diagnostics::Diagnostic;
use patito_syntax::span::Span;
use patito_syntax::token::{Token, TokenKind};
use std::iter::Peekable;
use std::str::Chars;

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    offset: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            offset: 0,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.offset += c.len_utf8() as u32;
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.offset)
    }

    fn skip_trivia(&mut self) {
        loop {
            while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                self.bump();
            }
            let mut ahead = self.chars.clone();
            if ahead.next() == Some('/') && ahead.next() == Some('/') {
                while matches!(self.peek(), Some(c) if c != '\n') {
                    self.bump();
                }
                continue;
            }
            break;
        }
    }

    fn read_word(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                break;
            }
            s.push(c);
            self.bump();
        }
        s
    }

    fn read_string(&mut self, start: u32) -> Result<String, Diagnostic> {
        self.bump(); // opening quote
        let mut s = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(Diagnostic::error(
                        "unterminated string literal",
                        Some(self.span_from(start)),
                    ))
                }
                Some('"') => return Ok(s),
                Some('\\') => match self.bump() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('"') => s.push('"'),
                    Some('\\') => s.push('\\'),
                    _ => {
                        return Err(Diagnostic::error(
                            "invalid escape in string literal",
                            Some(self.span_from(start)),
                        ))
                    }
                },
                Some(c) => s.push(c),
            }
        }
    }

    fn read_number(&mut self, start: u32) -> Result<TokenKind, Diagnostic> {
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            text.extend(self.bump());
        }
        let mut ahead = self.chars.clone();
        let is_float = ahead.next() == Some('.') && matches!(ahead.next(), Some(c) if c.is_ascii_digit());
        if is_float {
            text.extend(self.bump());
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                text.extend(self.bump());
            }
            return text.parse().map(TokenKind::FloatLiteral).map_err(|_| {
                Diagnostic::error(
                    format!("invalid float literal '{}'", text),
                    Some(self.span_from(start)),
                )
            });
        }
        text.parse().map(TokenKind::IntLiteral).map_err(|_| {
            Diagnostic::error(
                format!("integer literal '{}' does not fit in 64 bits", text),
                Some(self.span_from(start)),
            )
        })
    }

    pub fn next_token(&mut self) -> Result<Token, Diagnostic> {
        self.skip_trivia();
        let start = self.offset;
        let Some(c) = self.peek() else {
            return Ok(Token::new(TokenKind::Eof, self.span_from(start)));
        };

        if c.is_ascii_alphabetic() || c == '_' {
            let word = self.read_word();
            let kind = TokenKind::keyword(&word).unwrap_or(TokenKind::Ident(word));
            return Ok(Token::new(kind, self.span_from(start)));
        }
        if c == '"' {
            let s = self.read_string(start)?;
            return Ok(Token::new(
                TokenKind::StringLiteral(s),
                self.span_from(start),
            ));
        }
        if c.is_ascii_digit() {
            let kind = self.read_number(start)?;
            return Ok(Token::new(kind, self.span_from(start)));
        }

        self.bump();
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            ':' if self.eat('=') => TokenKind::Assign,
            ':' => TokenKind::Colon,
            '=' if self.eat('=') => TokenKind::Eq,
            '=' => TokenKind::Assign,
            '<' if self.eat('=') => TokenKind::Le,
            '<' => TokenKind::Lt,
            '>' if self.eat('=') => TokenKind::Ge,
            '>' => TokenKind::Gt,
            '!' if self.eat('=') => TokenKind::Ne,
            other => {
                return Err(Diagnostic::error(
                    format!("unexpected character '{}'", other),
                    Some(self.span_from(start)),
                ))
            }
        };
        Ok(Token::new(kind, self.span_from(start)))
    }

    /// Lex the entire source into a token stream ending in `Eof`.
    pub fn collect_tokens(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token()?;
            let is_eof = t.is_eof();
            tokens.push(t);
            if is_eof {
                return Ok(tokens);
            }
        }
    }
}
