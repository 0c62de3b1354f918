//! Source text to a flat token buffer (spec §3.1, §4.3 "pre-tokenization").
//!
//! This crate purposefully does not depend on the other `cembed` crates —
//! same posture as the teacher's own `rustc_lexer`, which the teacher's
//! `Cargo.toml` comments "purposefully does not depend on other rustc
//! crates". Reading the stream with the preprocessor gate applied (the
//! "Reading" half of spec §4.3) is layered on top in `cembed_interp`, which
//! is the thing that actually needs macro/include state.

mod numeric;

use std::fmt;

/// 1-based line, 1-based column — used for diagnostics and for the
/// adjacency check `#define NAME(` (no space) vs `#define NAME (`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Keyword {
    Void,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Signed,
    Unsigned,
    Struct,
    Union,
    Enum,
    Typedef,
    Static,
    Auto,
    Register,
    Extern,
    Const,
    Volatile,
    If,
    Else,
    While,
    Do,
    For,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Return,
    Goto,
    Sizeof,
}

impl Keyword {
    fn lookup(s: &str) -> Option<Keyword> {
        use Keyword::*;
        Some(match s {
            "void" => Void,
            "char" => Char,
            "short" => Short,
            "int" => Int,
            "long" => Long,
            "float" => Float,
            "double" => Double,
            "signed" => Signed,
            "unsigned" => Unsigned,
            "struct" => Struct,
            "union" => Union,
            "enum" => Enum,
            "typedef" => Typedef,
            "static" => Static,
            "auto" => Auto,
            "register" => Register,
            "extern" => Extern,
            "const" => Const,
            "volatile" => Volatile,
            "if" => If,
            "else" => Else,
            "while" => While,
            "do" => Do,
            "for" => For,
            "switch" => Switch,
            "case" => Case,
            "default" => Default,
            "break" => Break,
            "continue" => Continue,
            "return" => Return,
            "goto" => Goto,
            "sizeof" => Sizeof,
            _ => return None,
        })
    }
}

/// Operators and punctuation. Order here is irrelevant (unlike the C
/// original's `OperatorPrecedence[]` array, which had to line up
/// positionally with an enum) — `cembed_eval` looks precedence up by
/// matching on the variant.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Punct {
    Comma,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    ShlAssign,
    ShrAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    Question,
    Colon,
    OrOr,
    AndAnd,
    Or,
    Xor,
    Amp,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Incr,
    Decr,
    Not,
    Tilde,
    LBracket,
    RBracket,
    Dot,
    Arrow,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Semicolon,
    Ellipsis,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HashDirective {
    Include,
    Define,
    Undef,
    If,
    Ifdef,
    Ifndef,
    Elif,
    Else,
    Endif,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Keyword(Keyword),
    IntLit(i64),
    FloatLit(f64),
    CharLit(u8),
    StrLit(Vec<u8>),
    /// `#include <name>` or `#include "name"`; `system` distinguishes the
    /// bracket form (spec §4.3 "`HashInclude` (next string uses
    /// angle-brackets as quotes)").
    HeaderName { name: String, system: bool },
    Punct(Punct),
    Hash(HashDirective),
    /// A directive this lexer does not special-case (`#line`, `#pragma`,
    /// `#error ...`); the reader skips it like plain text.
    HashOther(String),
    /// Retained so the reader can keep line counts correct (spec §3.1);
    /// skipped by the reader outside preprocessor-directive mode.
    EndOfLine,
    /// Marks the end of a function body that was copied into its own
    /// token buffer (spec §3.1, §4.5 "Function definitions").
    EndOfFunction,
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
}

#[derive(Debug, PartialEq, Eq)]
pub enum LexError {
    UnterminatedString(Pos),
    UnterminatedChar(Pos),
    UnterminatedComment(Pos),
    BadEscape(Pos, char),
    BadNumber(Pos),
    IllegalChar(Pos, char),
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::UnterminatedString(p) => write!(f, "{}: unterminated string literal", p),
            LexError::UnterminatedChar(p) => write!(f, "{}: unterminated character literal", p),
            LexError::UnterminatedComment(p) => write!(f, "{}: unterminated comment", p),
            LexError::BadEscape(p, c) => write!(f, "{}: unknown escape sequence '\\{}'", p, c),
            LexError::BadNumber(p) => write!(f, "{}: malformed numeric literal", p),
            LexError::IllegalChar(p, c) => write!(f, "{}: illegal character '{}'", p, c),
        }
    }
}

impl std::error::Error for LexError {}

pub struct Lexer<'src> {
    src: &'src [u8],
    pos: usize,
    line: u32,
    col: u32,
    tokens: Vec<Token>,
    last_was_include: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Lexer { src: src.as_bytes(), pos: 0, line: 1, col: 1, tokens: Vec::new(), last_was_include: false }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.src.get(self.pos + n).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn here(&self) -> Pos {
        Pos { line: self.line, col: self.col }
    }

    fn push(&mut self, kind: TokenKind, pos: Pos) {
        let is_include = matches!(kind, TokenKind::Hash(HashDirective::Include));
        self.tokens.push(Token { kind, pos });
        self.last_was_include = is_include;
    }

    /// Tokenizes the whole buffer. The buffer remains alive as long as the
    /// returned `Vec<Token>` (spec §4.3: "allocated as a single heap block
    /// that lives as long as the program text" — here, the `Vec` itself).
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        loop {
            self.skip_inline_whitespace();
            let Some(c) = self.peek() else {
                let pos = self.here();
                self.push(TokenKind::Eof, pos);
                break;
            };
            let pos = self.here();
            match c {
                b'\n' => {
                    self.advance();
                    self.push(TokenKind::EndOfLine, pos);
                }
                b'\r' => {
                    self.advance();
                    if self.peek() == Some(b'\n') {
                        self.advance();
                    }
                    self.push(TokenKind::EndOfLine, pos);
                }
                b'\\' if matches!(self.peek_at(1), Some(b'\n') | Some(b'\r')) => {
                    // Line splice: consume silently, line counter already
                    // advances via `advance()`.
                    self.advance();
                    if self.peek() == Some(b'\r') {
                        self.advance();
                    }
                    if self.peek() == Some(b'\n') {
                        self.advance();
                    }
                }
                b'/' if self.peek_at(1) == Some(b'/') => {
                    while !matches!(self.peek(), None | Some(b'\n') | Some(b'\r')) {
                        self.advance();
                    }
                }
                b'/' if self.peek_at(1) == Some(b'*') => {
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            None => return Err(LexError::UnterminatedComment(pos)),
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            _ => {
                                self.advance();
                            }
                        }
                    }
                }
                b'#' => {
                    self.advance();
                    self.lex_hash(pos)?;
                }
                b'"' => {
                    let s = self.lex_string(pos)?;
                    if self.last_was_include {
                        self.push(TokenKind::HeaderName { name: String::from_utf8_lossy(&s).into_owned(), system: false }, pos);
                    } else {
                        self.push(TokenKind::StrLit(s), pos);
                    }
                }
                b'<' if self.last_was_include => {
                    let name = self.lex_header_angle(pos)?;
                    self.push(TokenKind::HeaderName { name, system: true }, pos);
                }
                b'\'' => {
                    let ch = self.lex_char(pos)?;
                    self.push(TokenKind::CharLit(ch), pos);
                }
                c if c.is_ascii_digit() => {
                    let tok = numeric::lex_number(&mut NumCursor(self), pos)?;
                    self.push(tok, pos);
                }
                c if c == b'_' || c.is_ascii_alphabetic() => {
                    let ident = self.lex_ident();
                    match Keyword::lookup(&ident) {
                        Some(kw) => self.push(TokenKind::Keyword(kw), pos),
                        None => self.push(TokenKind::Ident(ident), pos),
                    }
                }
                _ => {
                    let p = self.lex_punct(pos)?;
                    self.push(TokenKind::Punct(p), pos);
                }
            }
        }
        Ok(self.tokens)
    }

    fn skip_inline_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.advance();
        }
    }

    fn lex_hash(&mut self, pos: Pos) -> Result<(), LexError> {
        self.skip_inline_whitespace();
        let ident = if self.peek().map_or(false, |c| c.is_ascii_alphabetic()) {
            self.lex_ident()
        } else {
            String::new()
        };
        let directive = match ident.as_str() {
            "include" => Some(HashDirective::Include),
            "define" => Some(HashDirective::Define),
            "undef" => Some(HashDirective::Undef),
            "if" => Some(HashDirective::If),
            "ifdef" => Some(HashDirective::Ifdef),
            "ifndef" => Some(HashDirective::Ifndef),
            "elif" => Some(HashDirective::Elif),
            "else" => Some(HashDirective::Else),
            "endif" => Some(HashDirective::Endif),
            _ => None,
        };
        match directive {
            Some(d) => self.push(TokenKind::Hash(d), pos),
            None => self.push(TokenKind::HashOther(ident), pos),
        }
        Ok(())
    }

    fn lex_ident(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c == b'_' || c.is_ascii_alphanumeric()) {
            self.advance();
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn lex_header_angle(&mut self, pos: Pos) -> Result<String, LexError> {
        self.advance(); // '<'
        let start = self.pos;
        while !matches!(self.peek(), None | Some(b'>')) {
            self.advance();
        }
        if self.peek().is_none() {
            return Err(LexError::UnterminatedString(pos));
        }
        let name = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        self.advance(); // '>'
        Ok(name)
    }

    fn lex_string(&mut self, pos: Pos) -> Result<Vec<u8>, LexError> {
        self.advance(); // opening quote
        let mut out = Vec::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => return Err(LexError::UnterminatedString(pos)),
                Some(b'"') => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    self.advance();
                    if let Some(c) = self.lex_escape(pos)? {
                        out.push(c);
                    }
                }
                Some(c) => {
                    self.advance();
                    out.push(c);
                }
            }
        }
        Ok(out)
    }

    fn lex_char(&mut self, pos: Pos) -> Result<u8, LexError> {
        self.advance(); // opening quote
        let value = match self.peek() {
            None => return Err(LexError::UnterminatedChar(pos)),
            Some(b'\\') => {
                self.advance();
                self.lex_escape(pos)?.unwrap_or(0)
            }
            Some(c) => {
                self.advance();
                c
            }
        };
        if self.peek() != Some(b'\'') {
            return Err(LexError::UnterminatedChar(pos));
        }
        self.advance();
        Ok(value)
    }

    /// Decodes one escape sequence after the backslash has been consumed.
    /// Returns `None` for an escaped line-ending (line splice inside a
    /// literal contributes nothing to the literal's bytes).
    fn lex_escape(&mut self, pos: Pos) -> Result<Option<u8>, LexError> {
        let c = self.peek().ok_or(LexError::UnterminatedString(pos))?;
        Ok(Some(match c {
            b'n' => {
                self.advance();
                b'\n'
            }
            b't' => {
                self.advance();
                b'\t'
            }
            b'r' => {
                self.advance();
                b'\r'
            }
            b'a' => {
                self.advance();
                0x07
            }
            b'b' => {
                self.advance();
                0x08
            }
            b'f' => {
                self.advance();
                0x0c
            }
            b'v' => {
                self.advance();
                0x0b
            }
            b'\\' => {
                self.advance();
                b'\\'
            }
            b'\'' => {
                self.advance();
                b'\''
            }
            b'"' => {
                self.advance();
                b'"'
            }
            b'\n' => {
                self.advance();
                return Ok(None);
            }
            b'\r' => {
                self.advance();
                if self.peek() == Some(b'\n') {
                    self.advance();
                }
                return Ok(None);
            }
            b'x' => {
                self.advance();
                let mut v: u32 = 0;
                let mut n = 0;
                while n < 2 {
                    match self.peek() {
                        Some(d) if d.is_ascii_hexdigit() => {
                            v = v * 16 + (d as char).to_digit(16).unwrap();
                            self.advance();
                            n += 1;
                        }
                        _ => break,
                    }
                }
                v as u8
            }
            b'0'..=b'7' => {
                let mut v: u32 = 0;
                let mut n = 0;
                while n < 3 {
                    match self.peek() {
                        Some(d @ b'0'..=b'7') => {
                            v = v * 8 + (d - b'0') as u32;
                            self.advance();
                            n += 1;
                        }
                        _ => break,
                    }
                }
                v as u8
            }
            other => return Err(LexError::BadEscape(pos, other as char)),
        }))
    }

    fn lex_punct(&mut self, pos: Pos) -> Result<Punct, LexError> {
        macro_rules! op {
            ($len:expr, $p:expr) => {{
                for _ in 0..$len {
                    self.advance();
                }
                return Ok($p);
            }};
        }
        let c0 = self.peek().unwrap();
        let c1 = self.peek_at(1);
        let c2 = self.peek_at(2);
        match (c0, c1, c2) {
            (b'.', Some(b'.'), Some(b'.')) => op!(3, Punct::Ellipsis),
            (b'<', Some(b'<'), Some(b'=')) => op!(3, Punct::ShlAssign),
            (b'>', Some(b'>'), Some(b'=')) => op!(3, Punct::ShrAssign),
            (b'=', Some(b'='), _) => op!(2, Punct::Eq),
            (b'!', Some(b'='), _) => op!(2, Punct::Ne),
            (b'<', Some(b'='), _) => op!(2, Punct::Le),
            (b'>', Some(b'='), _) => op!(2, Punct::Ge),
            (b'&', Some(b'&'), _) => op!(2, Punct::AndAnd),
            (b'|', Some(b'|'), _) => op!(2, Punct::OrOr),
            (b'+', Some(b'+'), _) => op!(2, Punct::Incr),
            (b'-', Some(b'-'), _) => op!(2, Punct::Decr),
            (b'-', Some(b'>'), _) => op!(2, Punct::Arrow),
            (b'<', Some(b'<'), _) => op!(2, Punct::Shl),
            (b'>', Some(b'>'), _) => op!(2, Punct::Shr),
            (b'+', Some(b'='), _) => op!(2, Punct::AddAssign),
            (b'-', Some(b'='), _) => op!(2, Punct::SubAssign),
            (b'*', Some(b'='), _) => op!(2, Punct::MulAssign),
            (b'/', Some(b'='), _) => op!(2, Punct::DivAssign),
            (b'%', Some(b'='), _) => op!(2, Punct::ModAssign),
            (b'&', Some(b'='), _) => op!(2, Punct::AndAssign),
            (b'|', Some(b'='), _) => op!(2, Punct::OrAssign),
            (b'^', Some(b'='), _) => op!(2, Punct::XorAssign),
            (b',', ..) => op!(1, Punct::Comma),
            (b'=', ..) => op!(1, Punct::Assign),
            (b'?', ..) => op!(1, Punct::Question),
            (b':', ..) => op!(1, Punct::Colon),
            (b'|', ..) => op!(1, Punct::Or),
            (b'^', ..) => op!(1, Punct::Xor),
            (b'&', ..) => op!(1, Punct::Amp),
            (b'<', ..) => op!(1, Punct::Lt),
            (b'>', ..) => op!(1, Punct::Gt),
            (b'+', ..) => op!(1, Punct::Plus),
            (b'-', ..) => op!(1, Punct::Minus),
            (b'*', ..) => op!(1, Punct::Star),
            (b'/', ..) => op!(1, Punct::Slash),
            (b'%', ..) => op!(1, Punct::Percent),
            (b'!', ..) => op!(1, Punct::Not),
            (b'~', ..) => op!(1, Punct::Tilde),
            (b'[', ..) => op!(1, Punct::LBracket),
            (b']', ..) => op!(1, Punct::RBracket),
            (b'.', ..) => op!(1, Punct::Dot),
            (b'(', ..) => op!(1, Punct::LParen),
            (b')', ..) => op!(1, Punct::RParen),
            (b'{', ..) => op!(1, Punct::LBrace),
            (b'}', ..) => op!(1, Punct::RBrace),
            (b';', ..) => op!(1, Punct::Semicolon),
            (c, ..) => Err(LexError::IllegalChar(pos, c as char)),
        }
    }
}

/// Thin cursor adapter so `numeric` can advance/peek without the whole
/// `Lexer` being `pub`.
pub(crate) struct NumCursor<'a, 'src>(&'a mut Lexer<'src>);

impl<'a, 'src> NumCursor<'a, 'src> {
    pub(crate) fn peek(&self) -> Option<u8> {
        self.0.peek()
    }
    pub(crate) fn peek_at(&self, n: usize) -> Option<u8> {
        self.0.peek_at(n)
    }
    pub(crate) fn advance(&mut self) -> Option<u8> {
        self.0.advance()
    }
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(src).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn integer_bases() {
        assert_eq!(kinds("10"), vec![TokenKind::IntLit(10), TokenKind::Eof]);
        assert_eq!(kinds("0x1F"), vec![TokenKind::IntLit(31), TokenKind::Eof]);
        assert_eq!(kinds("0b101"), vec![TokenKind::IntLit(5), TokenKind::Eof]);
        assert_eq!(kinds("017"), vec![TokenKind::IntLit(15), TokenKind::Eof]);
        assert_eq!(kinds("10u"), vec![TokenKind::IntLit(10), TokenKind::Eof]);
        assert_eq!(kinds("10UL"), vec![TokenKind::IntLit(10), TokenKind::Eof]);
    }

    #[test]
    fn float_literals() {
        assert_eq!(kinds("3.14"), vec![TokenKind::FloatLit(3.14), TokenKind::Eof]);
        assert_eq!(kinds("1e3"), vec![TokenKind::FloatLit(1000.0), TokenKind::Eof]);
        assert_eq!(kinds("2.5f"), vec![TokenKind::FloatLit(2.5), TokenKind::Eof]);
    }

    #[test]
    fn string_and_char_escapes() {
        assert_eq!(kinds(r#""a\nb""#), vec![TokenKind::StrLit(b"a\nb".to_vec()), TokenKind::Eof]);
        assert_eq!(kinds(r"'\x41'"), vec![TokenKind::CharLit(b'A'), TokenKind::Eof]);
        assert_eq!(kinds(r"'\101'"), vec![TokenKind::CharLit(b'A'), TokenKind::Eof]);
    }

    #[test]
    fn keywords_and_idents() {
        assert_eq!(
            kinds("int foo"),
            vec![TokenKind::Keyword(Keyword::Int), TokenKind::Ident("foo".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn operators_prefer_longest_match() {
        assert_eq!(
            kinds("<<="),
            vec![TokenKind::Punct(Punct::ShlAssign), TokenKind::Eof]
        );
        assert_eq!(kinds("->"), vec![TokenKind::Punct(Punct::Arrow), TokenKind::Eof]);
        assert_eq!(
            kinds("a<b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Punct(Punct::Lt),
                TokenKind::Ident("b".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn preprocessor_tokens() {
        assert_eq!(
            kinds("#define FOO"),
            vec![
                TokenKind::Hash(HashDirective::Define),
                TokenKind::Ident("FOO".into()),
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("#include <stdio.h>"),
            vec![
                TokenKind::Hash(HashDirective::Include),
                TokenKind::HeaderName { name: "stdio.h".into(), system: true },
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn line_splice_keeps_next_token_on_joined_line() {
        let toks = tokenize("int a\\\n = 1;").unwrap();
        // No EndOfLine between `a` and `=` since the newline was spliced away.
        assert!(!toks.iter().any(|t| t.kind == TokenKind::EndOfLine));
    }

    #[test]
    fn line_comment_does_not_eat_newline() {
        let toks = tokenize("a // comment\nb").unwrap();
        assert!(toks.iter().any(|t| t.kind == TokenKind::EndOfLine));
    }
}
