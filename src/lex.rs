//! Restricted tokenizer for annotated declaration sites.
//!
//! This is not a host-language lexer. It understands exactly the surface the
//! scanner walks: identifiers, integer/float/string literals, the punctuation
//! of declarations (`{ } ( ) < > , ; = : ::`), plain `//` comment lines (kept
//! as [`Tok::Doc`] so the scanner can attach them), and the `//!` annotation
//! introducer, which flips the lexer into a mode that ends at the newline
//! with an explicit [`Tok::AnnotEnd`]. Everything else comes out as
//! [`Tok::Unknown`] and turns into a scan error upstream.

use std::fmt;

use crate::error::Location;

// ————————————————————————————————————————————————————————————————————————————
// TOKENS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    /// One `//` or `///` comment line, introducer stripped, trimmed.
    Doc(String),
    /// `//!` — start of a trailing annotation list.
    AnnotStart,
    /// Newline (or end of input) while inside an annotation list.
    AnnotEnd,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Lt,
    Gt,
    Comma,
    Semi,
    Eq,
    Colon,
    ColonColon,
    Minus,
    Unknown(char),
    Eof,
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tok::Ident(s) => write!(f, "{s}"),
            Tok::Int(v) => write!(f, "{v}"),
            Tok::Float(v) => write!(f, "{v}"),
            Tok::Str(s) => write!(f, "\"{s}\""),
            Tok::Doc(_) => write!(f, "comment"),
            Tok::AnnotStart => write!(f, "//!"),
            Tok::AnnotEnd => write!(f, "end of annotation"),
            Tok::LParen => write!(f, "("),
            Tok::RParen => write!(f, ")"),
            Tok::LBrace => write!(f, "{{"),
            Tok::RBrace => write!(f, "}}"),
            Tok::Lt => write!(f, "<"),
            Tok::Gt => write!(f, ">"),
            Tok::Comma => write!(f, ","),
            Tok::Semi => write!(f, ";"),
            Tok::Eq => write!(f, "="),
            Tok::Colon => write!(f, ":"),
            Tok::ColonColon => write!(f, "::"),
            Tok::Minus => write!(f, "-"),
            Tok::Unknown(c) => write!(f, "{c}"),
            Tok::Eof => write!(f, "end of file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub loc: Location,
    /// Byte offset of the token start in the full source.
    pub offset: usize,
}

// ————————————————————————————————————————————————————————————————————————————
// LEXER
// ————————————————————————————————————————————————————————————————————————————

pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    col: u32,
    in_annot: bool,
}

impl<'a> Lexer<'a> {
    /// Lex `src` starting at `offset`, with line/column computed from the
    /// text before the offset so positions match the whole file.
    pub fn at(src: &'a str, offset: usize) -> Self {
        let mut line = 1u32;
        let mut col = 1u32;
        for c in src[..offset].chars() {
            if c == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        Lexer { src, pos: offset, line, col, in_annot: false }
    }

    pub fn new(src: &'a str) -> Self {
        Lexer::at(src, 0)
    }

    fn loc(&self) -> Location {
        Location::new(self.line, self.col)
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn starts_with(&self, pat: &str) -> bool {
        self.src[self.pos..].starts_with(pat)
    }

    fn bump_str(&mut self, pat: &str) {
        for _ in pat.chars() {
            self.bump_char();
        }
    }

    /// Consume to end of line, returning the consumed text. The newline
    /// itself stays in the input.
    fn take_line(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            self.bump_char();
        }
        &self.src[start..self.pos]
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            // Inside an annotation list, the newline is significant.
            if self.in_annot {
                while matches!(self.peek_char(), Some(' ') | Some('\t') | Some('\r')) {
                    self.bump_char();
                }
                match self.peek_char() {
                    None | Some('\n') => {
                        let tok = Token { tok: Tok::AnnotEnd, loc: self.loc(), offset: self.pos };
                        self.in_annot = false;
                        self.bump_char();
                        return tok;
                    }
                    Some(_) if self.starts_with("//") => {
                        // A trailing remark ends the annotation payload.
                        let tok = Token { tok: Tok::AnnotEnd, loc: self.loc(), offset: self.pos };
                        self.in_annot = false;
                        self.take_line();
                        return tok;
                    }
                    _ => {}
                }
            } else {
                while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
                    self.bump_char();
                }
            }

            let loc = self.loc();
            let offset = self.pos;
            let Some(c) = self.peek_char() else {
                return Token { tok: Tok::Eof, loc, offset };
            };

            if self.starts_with("//!") {
                self.bump_str("//!");
                self.in_annot = true;
                return Token { tok: Tok::AnnotStart, loc, offset };
            }
            if self.starts_with("//") {
                let n = if self.starts_with("///") { 3 } else { 2 };
                for _ in 0..n {
                    self.bump_char();
                }
                let text = self.take_line().trim().to_string();
                return Token { tok: Tok::Doc(text), loc, offset };
            }
            if self.starts_with("/*") {
                self.bump_str("/*");
                while self.pos < self.src.len() && !self.starts_with("*/") {
                    self.bump_char();
                }
                self.bump_str("*/");
                continue;
            }
            if c == '#' && !self.in_annot {
                // Preprocessor line; nothing on it concerns the scanner.
                self.take_line();
                continue;
            }
            if c == '"' {
                return self.string_literal(loc, offset);
            }
            if c.is_ascii_alphabetic() || c == '_' {
                return self.ident(loc, offset);
            }
            if c.is_ascii_digit() {
                return self.number(loc, offset);
            }

            self.bump_char();
            let tok = match c {
                '(' => Tok::LParen,
                ')' => Tok::RParen,
                '{' => Tok::LBrace,
                '}' => Tok::RBrace,
                '<' => Tok::Lt,
                '>' => Tok::Gt,
                ',' => Tok::Comma,
                ';' => Tok::Semi,
                '=' => Tok::Eq,
                '-' => Tok::Minus,
                ':' => {
                    if self.peek_char() == Some(':') {
                        self.bump_char();
                        Tok::ColonColon
                    } else {
                        Tok::Colon
                    }
                }
                other => Tok::Unknown(other),
            };
            return Token { tok, loc, offset };
        }
    }

    fn string_literal(&mut self, loc: Location, offset: usize) -> Token {
        self.bump_char(); // opening quote
        let mut out = String::new();
        loop {
            match self.peek_char() {
                None | Some('\n') => break,
                Some('"') => {
                    self.bump_char();
                    break;
                }
                Some('\\') => {
                    self.bump_char();
                    match self.bump_char() {
                        Some('n') => out.push('\n'),
                        Some('t') => out.push('\t'),
                        Some('r') => out.push('\r'),
                        Some('0') => out.push('\0'),
                        Some(other) => out.push(other),
                        None => break,
                    }
                }
                Some(c) => {
                    self.bump_char();
                    out.push(c);
                }
            }
        }
        Token { tok: Tok::Str(out), loc, offset }
    }

    fn ident(&mut self, loc: Location, offset: usize) -> Token {
        let start = self.pos;
        while matches!(self.peek_char(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.bump_char();
        }
        let text = self.src[start..self.pos].to_string();
        Token { tok: Tok::Ident(text), loc, offset }
    }

    fn number(&mut self, loc: Location, offset: usize) -> Token {
        let start = self.pos;
        if self.starts_with("0x") || self.starts_with("0X") {
            self.bump_str("0x");
            while matches!(self.peek_char(), Some(c) if c.is_ascii_hexdigit()) {
                self.bump_char();
            }
            let digits = &self.src[start + 2..self.pos];
            let value = u64::from_str_radix(digits, 16).unwrap_or(0) as i64;
            return Token { tok: Tok::Int(value), loc, offset };
        }

        let mut is_float = false;
        while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
            self.bump_char();
        }
        if self.peek_char() == Some('.') {
            is_float = true;
            self.bump_char();
            while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
                self.bump_char();
            }
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let save = (self.pos, self.line, self.col);
            self.bump_char();
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.bump_char();
            }
            if matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
                is_float = true;
                while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
                    self.bump_char();
                }
            } else {
                (self.pos, self.line, self.col) = save;
            }
        }
        let text = &self.src[start..self.pos];
        // C++ float suffix, accepted and dropped.
        if matches!(self.peek_char(), Some('f') | Some('F')) {
            let after = self.src[self.pos..].chars().nth(1);
            if !matches!(after, Some(c) if c.is_ascii_alphanumeric() || c == '_') {
                self.bump_char();
                is_float = true;
            }
        }

        let tok = if is_float {
            Tok::Float(text.parse::<f64>().unwrap_or(0.0))
        } else {
            match text.parse::<i64>() {
                Ok(v) => Tok::Int(v),
                Err(_) => Tok::Float(text.parse::<f64>().unwrap_or(0.0)),
            }
        };
        Token { tok, loc, offset }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// STREAM
// ————————————————————————————————————————————————————————————————————————————

/// Buffered token stream with two tokens of lookahead.
pub struct Tokens<'a> {
    lexer: Lexer<'a>,
    buf: Vec<Token>,
}

impl<'a> Tokens<'a> {
    pub fn new(lexer: Lexer<'a>) -> Self {
        Tokens { lexer, buf: Vec::new() }
    }

    fn fill(&mut self, n: usize) {
        while self.buf.len() < n {
            let t = self.lexer.next_token();
            self.buf.push(t);
        }
    }

    pub fn peek(&mut self) -> &Token {
        self.fill(1);
        &self.buf[0]
    }

    pub fn peek2(&mut self) -> &Token {
        self.fill(2);
        &self.buf[1]
    }

    pub fn next(&mut self) -> Token {
        self.fill(1);
        self.buf.remove(0)
    }

    /// Consume the next token if it matches exactly.
    pub fn eat(&mut self, tok: &Tok) -> bool {
        if &self.peek().tok == tok {
            self.next();
            true
        } else {
            false
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        let mut lx = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let t = lx.next_token();
            let done = t.tok == Tok::Eof;
            out.push(t.tok);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn member_line_with_annotation() {
        let got = toks("double yaw_speed; //! IN_RANGE(0.1, 6.28)\n");
        assert_eq!(
            got,
            vec![
                Tok::Ident("double".into()),
                Tok::Ident("yaw_speed".into()),
                Tok::Semi,
                Tok::AnnotStart,
                Tok::Ident("IN_RANGE".into()),
                Tok::LParen,
                Tok::Float(0.1),
                Tok::Comma,
                Tok::Float(6.28),
                Tok::RParen,
                Tok::AnnotEnd,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn annotation_ends_at_end_of_input() {
        let got = toks("//! NOT_EMPTY()");
        assert_eq!(
            got,
            vec![
                Tok::AnnotStart,
                Tok::Ident("NOT_EMPTY".into()),
                Tok::LParen,
                Tok::RParen,
                Tok::AnnotEnd,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn trailing_remark_ends_annotation_payload() {
        let got = toks("//! LESS(10) // capped by the renderer\nint x;");
        assert_eq!(
            got,
            vec![
                Tok::AnnotStart,
                Tok::Ident("LESS".into()),
                Tok::LParen,
                Tok::Int(10),
                Tok::RParen,
                Tok::AnnotEnd,
                Tok::Ident("int".into()),
                Tok::Ident("x".into()),
                Tok::Semi,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn doc_comments_keep_text_without_introducer() {
        let got = toks("// Yaw speed in radians.\n/// Second line.\n");
        assert_eq!(
            got,
            vec![
                Tok::Doc("Yaw speed in radians.".into()),
                Tok::Doc("Second line.".into()),
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn block_comments_and_preprocessor_lines_vanish() {
        let got = toks("#pragma once\n/* legacy\n   block */ struct");
        assert_eq!(got, vec![Tok::Ident("struct".into()), Tok::Eof]);
    }

    #[test]
    fn numbers_cover_suffix_hex_and_exponent() {
        let got = toks("1 2.5 500.0f 0x10 1e3");
        assert_eq!(
            got,
            vec![
                Tok::Int(1),
                Tok::Float(2.5),
                Tok::Float(500.0),
                Tok::Int(16),
                Tok::Float(1000.0),
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        let got = toks(r#""a\"b\n""#);
        assert_eq!(got, vec![Tok::Str("a\"b\n".into()), Tok::Eof]);
    }

    #[test]
    fn double_colon_is_one_token() {
        let got = toks("Damage::Kinetic");
        assert_eq!(
            got,
            vec![
                Tok::Ident("Damage".into()),
                Tok::ColonColon,
                Tok::Ident("Kinetic".into()),
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn positions_are_one_based_lines_and_columns() {
        let mut lx = Lexer::new("int a;\n  int b;");
        let t = lx.next_token();
        assert_eq!(t.loc, Location::new(1, 1));
        lx.next_token(); // a
        lx.next_token(); // ;
        let t = lx.next_token();
        assert_eq!(t.tok, Tok::Ident("int".into()));
        assert_eq!(t.loc, Location::new(2, 3));
    }

    #[test]
    fn lexing_from_an_offset_keeps_file_positions() {
        let src = "line one\nCONFIG_SPEC(Turret)";
        let off = src.find("CONFIG_SPEC").unwrap();
        let mut lx = Lexer::at(src, off);
        let t = lx.next_token();
        assert_eq!(t.tok, Tok::Ident("CONFIG_SPEC".into()));
        assert_eq!(t.loc, Location::new(2, 1));
    }
}
