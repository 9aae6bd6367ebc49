use std::{iter::Peekable, num::ParseIntError};

use crate::token::{Span, Spanned, Token, TokenKind, KEYWORDS};

/// Lexes the whole input eagerly, stopping at the first error.
///
/// The parser doesn't use this (it pulls tokens on demand), but it's handy for
/// tooling and tests.
pub fn lex(src: &str) -> Result<Vec<Token<'_>>, Spanned<Error>> {
    Lexer::new(src).collect()
}

/// The kiloc lexer.
///
/// Produces one token per [`Lexer::next_token`] call, never looking more than
/// one character ahead.
pub struct Lexer<'src> {
    src: &'src str,
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    current_lo: usize,
    line: u32,
    current_line: u32,
    /// Set once the iterator yielded the end of input or an error.
    fused: bool,
}

impl<'src> Lexer<'src> {
    /// Constructs a new lexer with the default state.
    pub fn new(src: &'src str) -> Lexer<'src> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
            line: 1,
            current_line: 1,
            fused: false,
        }
    }

    /// Scans the next token, skipping whitespace and line comments.
    ///
    /// Once the input is exhausted, every call returns an [`TokenKind::Eof`]
    /// token.
    pub fn next_token(&mut self) -> Result<Token<'src>, Spanned<Error>> {
        use TokenKind::*;
        loop {
            let kind = match self.mark_advance() {
                '\0' if self.is_at_end() => Eof,
                ' ' | '\t' | '\r' => continue,
                '\n' => {
                    self.line += 1;
                    continue;
                }
                '/' => match self.peek() {
                    '/' => {
                        self.line_comment();
                        continue;
                    }
                    _ => Slash,
                },
                '+' => Plus,
                '*' => Star,
                '-' => match self.peek() {
                    '>' => self.advance_with(Arrow),
                    _ => Minus,
                },
                '=' => match self.peek() {
                    '=' => self.advance_with(EqEq),
                    _ => Assign,
                },
                '!' => match self.peek() {
                    '=' => self.advance_with(NotEq),
                    _ => return Err(self.span().wrap(Error::LoneBang)),
                },
                '<' => match self.peek() {
                    '=' => self.advance_with(LessEq),
                    _ => Less,
                },
                '>' => match self.peek() {
                    '=' => self.advance_with(GreaterEq),
                    _ => Greater,
                },
                ';' => Semicolon,
                ',' => Comma,
                '(' => LParen,
                ')' => RParen,
                '{' => LBrace,
                '}' => RBrace,
                '"' => self.string()?,
                c if c.is_ascii_alphabetic() || c == '_' => self.identifier_or_keyword(),
                c if c.is_ascii_digit() => self.number(),
                c => return Err(self.span().wrap(Error::UnexpectedChar(c))),
            };
            return Ok(self.produce(kind));
        }
    }

    /// Scans a string literal. There are no escape sequences: the literal ends
    /// at the very next quotation mark.
    fn string(&mut self) -> Result<TokenKind, Spanned<Error>> {
        loop {
            match self.advance() {
                '"' => return Ok(TokenKind::StringLiteral),
                '\0' if self.is_at_end() => {
                    // Reported at the line the literal started on.
                    return Err(self.span().wrap(Error::UnterminatedString));
                }
                '\n' => self.line += 1,
                _ => (),
            }
        }
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        while matches!(self.peek(), c if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    fn number(&mut self) -> TokenKind {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        TokenKind::IntLiteral
    }

    fn line_comment(&mut self) {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
    }
}

impl<'src> Lexer<'src> {
    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> char {
        self.current_lo = self.cursor;
        self.current_line = self.line;
        self.advance()
    }

    /// Returns the next char and advances the iterator.
    fn advance(&mut self) -> char {
        self.iter
            .next()
            .inspect(|c| self.cursor += c.len_utf8())
            .unwrap_or('\0')
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next char without advancing the iterator.
    fn peek(&mut self) -> char {
        self.iter.peek().copied().unwrap_or('\0')
    }

    fn is_at_end(&self) -> bool {
        self.cursor >= self.src.len()
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor, self.current_line)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &'src str {
        &self.src[self.current_lo..self.cursor]
    }

    fn produce(&self, kind: TokenKind) -> Token<'src> {
        Token::new(kind, self.substr(), self.span())
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Result<Token<'src>, Spanned<Error>>;

    /// Yields every token up to and including [`TokenKind::Eof`], or up to the
    /// first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }
        let next = self.next_token();
        self.fused = next.as_ref().map_or(true, Token::is_eof);
        Some(next)
    }
}

impl std::iter::FusedIterator for Lexer<'_> {}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("'!' must be followed by '='")]
    LoneBang,
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
}

/// Turns token lexemes into tree values.
pub mod extract {
    use super::*;

    pub fn int(token: Token<'_>) -> Result<i32, ParseIntError> {
        debug_assert_eq!(token.kind, TokenKind::IntLiteral);
        token.text.parse()
    }

    pub fn ident(token: Token<'_>) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::Identifier);
        Box::from(token.text)
    }

    pub fn string(token: Token<'_>) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::StringLiteral);
        let quoted = token.text;
        Box::from(&quoted[1..quoted.len() - 1])
    }
}
