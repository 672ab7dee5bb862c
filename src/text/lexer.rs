//! Script tokenizer
//!
//! S-expression surface: parens, lowercase keywords, `$` identifiers,
//! string literals, and numeric literals kept as raw text for the parser
//! to interpret per instruction. Handles `;;` line comments and nested
//! `(; ;)` block comments.

use std::iter::Peekable;
use std::str::Chars;

use crate::util::Location;

/// Lexer error
#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("Unterminated string starting at {0}")]
    UnterminatedString(Location),
    #[error("Unterminated block comment starting at {0}")]
    UnterminatedComment(Location),
    #[error("Invalid escape sequence at {0}")]
    InvalidEscape(Location),
    #[error("Unexpected character '{ch}' at {location}")]
    UnexpectedChar { ch: char, location: Location },
    #[error("Empty identifier at {0}")]
    EmptyIdent(Location),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LParen,
    RParen,
    /// Lowercase word: an instruction or structural keyword
    Keyword(String),
    /// `$`-prefixed symbolic identifier, prefix stripped
    Ident(String),
    /// Quoted string literal, unescaped
    Text(String),
    /// Numeric literal, raw text
    Number(String),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

/// Tokenize a full script source
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

fn is_atom_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '+' | '-' | ':' | '@' | '!' | '#')
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn location(&self) -> Location {
        Location::new(self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            let location = self.location();
            let Some(&ch) = self.chars.peek() else {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    location,
                });
            };

            match ch {
                ' ' | '\t' | '\r' | '\n' => {
                    self.bump();
                }
                ';' => self.skip_line_comment(location)?,
                '(' => {
                    self.bump();
                    if self.chars.peek() == Some(&';') {
                        self.skip_block_comment(location)?;
                    } else {
                        return Ok(Token {
                            kind: TokenKind::LParen,
                            location,
                        });
                    }
                }
                ')' => {
                    self.bump();
                    return Ok(Token {
                        kind: TokenKind::RParen,
                        location,
                    });
                }
                '"' => return self.string(location),
                '$' => return self.ident(location),
                '0'..='9' => return self.number(location),
                '+' | '-' => return self.number(location),
                'a'..='z' => return self.keyword(location),
                other => {
                    return Err(LexError::UnexpectedChar {
                        ch: other,
                        location,
                    })
                }
            }
        }
    }

    fn skip_line_comment(
        &mut self,
        location: Location,
    ) -> Result<(), LexError> {
        self.bump();
        // A lone ';' is not a token in this grammar
        if self.chars.peek() != Some(&';') {
            return Err(LexError::UnexpectedChar { ch: ';', location });
        }
        while let Some(ch) = self.bump() {
            if ch == '\n' {
                break;
            }
        }
        Ok(())
    }

    /// Called with the opening '(' consumed and ';' pending
    fn skip_block_comment(
        &mut self,
        location: Location,
    ) -> Result<(), LexError> {
        self.bump();
        let mut depth = 1usize;
        while depth > 0 {
            match self.bump() {
                Some('(') if self.chars.peek() == Some(&';') => {
                    self.bump();
                    depth += 1;
                }
                Some(';') if self.chars.peek() == Some(&')') => {
                    self.bump();
                    depth -= 1;
                }
                Some(_) => {}
                None => return Err(LexError::UnterminatedComment(location)),
            }
        }
        Ok(())
    }

    fn string(
        &mut self,
        location: Location,
    ) -> Result<Token, LexError> {
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => {
                    return Ok(Token {
                        kind: TokenKind::Text(text),
                        location,
                    })
                }
                Some('\\') => {
                    let escape_loc = self.location();
                    match self.bump() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some('r') => text.push('\r'),
                        Some('\\') => text.push('\\'),
                        Some('"') => text.push('"'),
                        Some('\'') => text.push('\''),
                        Some(hi) if hi.is_ascii_hexdigit() => {
                            let lo = self
                                .bump()
                                .filter(char::is_ascii_hexdigit)
                                .ok_or(LexError::InvalidEscape(escape_loc))?;
                            let byte = (hi.to_digit(16).unwrap_or(0) * 16
                                + lo.to_digit(16).unwrap_or(0))
                                as u8;
                            text.push(byte as char);
                        }
                        _ => return Err(LexError::InvalidEscape(escape_loc)),
                    }
                }
                Some(ch) => text.push(ch),
                None => return Err(LexError::UnterminatedString(location)),
            }
        }
    }

    fn ident(
        &mut self,
        location: Location,
    ) -> Result<Token, LexError> {
        self.bump();
        let name = self.take_atom();
        if name.is_empty() {
            return Err(LexError::EmptyIdent(location));
        }
        Ok(Token {
            kind: TokenKind::Ident(name),
            location,
        })
    }

    fn number(
        &mut self,
        location: Location,
    ) -> Result<Token, LexError> {
        let text = self.take_atom();
        Ok(Token {
            kind: TokenKind::Number(text),
            location,
        })
    }

    fn keyword(
        &mut self,
        location: Location,
    ) -> Result<Token, LexError> {
        let text = self.take_atom();
        // `nan`/`inf` and friends surface as keywords; the parser accepts
        // them where a float literal is expected
        Ok(Token {
            kind: TokenKind::Keyword(text),
            location,
        })
    }

    fn take_atom(&mut self) -> String {
        let mut text = String::new();
        while let Some(&ch) = self.chars.peek() {
            if !is_atom_char(ch) {
                break;
            }
            text.push(ch);
            self.bump();
        }
        text
    }
}
