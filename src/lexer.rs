// ABOUTME: Hand-rolled tokenizer producing a position-tracked token stream

use crate::error::{LexError, Pos};

const MAX_STRING_LEN: usize = 64 * 1024;
const MAX_INT_DIGITS: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Str(String),
    Ident(String),
    // keywords
    Let,
    If,
    Else,
    Switch,
    Case,
    Default,
    While,
    For,
    In,
    Break,
    Continue,
    Class,
    Module,
    TypeAlias,
    Try,
    Catch,
    Throw,
    Fn,
    Return,
    Import,
    True,
    False,
    Null,
    // punctuation / operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    EqEq,
    Bang,
    BangEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    AndAnd,
    OrOr,
    QuestionQuestion,
    Question,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semi,
    Dot,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
}

fn keyword(ident: &str) -> Option<TokenKind> {
    Some(match ident {
        "let" => TokenKind::Let,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "switch" => TokenKind::Switch,
        "case" => TokenKind::Case,
        "default" => TokenKind::Default,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "in" => TokenKind::In,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "class" => TokenKind::Class,
        "module" => TokenKind::Module,
        "typealias" => TokenKind::TypeAlias,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "throw" => TokenKind::Throw,
        "fn" => TokenKind::Fn,
        "return" => TokenKind::Return,
        "import" => TokenKind::Import,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        _ => return None,
    })
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src: src.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn here(&self) -> Pos {
        Pos::new(self.line, self.col)
    }

    fn peek_byte(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.advance();
                }
                Some(b'#') => {
                    while let Some(b) = self.peek_byte() {
                        if b == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia();
        let start = self.here();
        let Some(b) = self.peek_byte() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                pos: start,
            });
        };

        if b.is_ascii_digit() {
            return self.lex_int(start);
        }
        if b == b'"' {
            return self.lex_string(start);
        }
        if b.is_ascii_alphabetic() || b == b'_' {
            return self.lex_ident(start);
        }

        self.advance();
        let kind = match b {
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b';' => TokenKind::Semi,
            b'.' => TokenKind::Dot,
            b'=' => {
                if self.peek_byte() == Some(b'=') {
                    self.advance();
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            b'!' => {
                if self.peek_byte() == Some(b'=') {
                    self.advance();
                    TokenKind::BangEq
                } else {
                    TokenKind::Bang
                }
            }
            b'<' => {
                if self.peek_byte() == Some(b'=') {
                    self.advance();
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            b'>' => {
                if self.peek_byte() == Some(b'=') {
                    self.advance();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            b'&' => {
                if self.peek_byte() == Some(b'&') {
                    self.advance();
                    TokenKind::AndAnd
                } else {
                    return Err(LexError::UnexpectedChar {
                        ch: '&',
                        pos: start,
                    });
                }
            }
            b'|' => {
                if self.peek_byte() == Some(b'|') {
                    self.advance();
                    TokenKind::OrOr
                } else {
                    return Err(LexError::UnexpectedChar {
                        ch: '|',
                        pos: start,
                    });
                }
            }
            b'?' => {
                if self.peek_byte() == Some(b'?') {
                    self.advance();
                    TokenKind::QuestionQuestion
                } else {
                    TokenKind::Question
                }
            }
            other => {
                return Err(LexError::UnexpectedChar {
                    ch: other as char,
                    pos: start,
                })
            }
        };
        Ok(Token { kind, pos: start })
    }

    fn lex_int(&mut self, start: Pos) -> Result<Token, LexError> {
        let begin = self.pos;
        while self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
            self.advance();
        }
        let text = std::str::from_utf8(&self.src[begin..self.pos]).unwrap();
        if text.len() > MAX_INT_DIGITS {
            return Err(LexError::IntTooLong { pos: start });
        }
        let value: i64 = text
            .parse()
            .map_err(|_| LexError::IntOverflow { pos: start })?;
        Ok(Token {
            kind: TokenKind::Int(value),
            pos: start,
        })
    }

    fn lex_ident(&mut self, start: Pos) -> Result<Token, LexError> {
        let begin = self.pos;
        while self
            .peek_byte()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.advance();
        }
        let text = std::str::from_utf8(&self.src[begin..self.pos]).unwrap().to_string();
        let kind = keyword(&text).unwrap_or(TokenKind::Ident(text));
        Ok(Token { kind, pos: start })
    }

    fn lex_string(&mut self, start: Pos) -> Result<Token, LexError> {
        self.advance(); // opening quote
        let mut out = String::new();
        loop {
            match self.peek_byte() {
                None => return Err(LexError::UnterminatedString { pos: start }),
                Some(b'"') => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    self.advance();
                    match self.advance() {
                        None => return Err(LexError::UnterminatedString { pos: start }),
                        Some(b'n') => out.push('\n'),
                        Some(b't') => out.push('\t'),
                        Some(b'r') => out.push('\r'),
                        Some(b'"') => out.push('"'),
                        Some(b'\\') => out.push('\\'),
                        Some(other) => {
                            // Unknown escapes pass through literally as two
                            // bytes, keeping e.g. Windows path literals intact.
                            out.push('\\');
                            out.push(other as char);
                        }
                    }
                }
                Some(_) => {
                    out.push(self.advance().unwrap() as char);
                }
            }
            if out.len() > MAX_STRING_LEN {
                return Err(LexError::StringTooLong { pos: start });
            }
        }
        Ok(Token {
            kind: TokenKind::Str(out),
            pos: start,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_operators_longest_match_first() {
        assert_eq!(
            kinds("== != && || ?? <= >="),
            vec![
                TokenKind::EqEq,
                TokenKind::BangEq,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::QuestionQuestion,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unknown_escape_preserved_literally() {
        let toks = Lexer::new(r#""C:\Users\x""#).tokenize().unwrap();
        match &toks[0].kind {
            TokenKind::Str(s) => assert_eq!(s, r"C:\Users\x"),
            _ => panic!("expected string token"),
        }
    }

    #[test]
    fn tracks_line_and_column() {
        let toks = Lexer::new("let\nx = 1;").tokenize().unwrap();
        assert_eq!(toks[0].pos, Pos::new(1, 1));
        assert_eq!(toks[1].pos, Pos::new(2, 1));
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(kinds("# comment\n1"), vec![TokenKind::Int(1), TokenKind::Eof]);
    }

    #[test]
    fn rejects_standalone_ampersand() {
        assert!(Lexer::new("&").tokenize().is_err());
    }
}
