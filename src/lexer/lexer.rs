//! Token definitions and the look-ahead lexer.
//!
//! The whole source is tokenised up front into a flat vector, so the parser
//! has cheap random access to upcoming tokens. `save_state`/`restore_state`
//! snapshot the cursor into that append-only vector, which makes a restore
//! byte-exact: replaying after a restore yields the identical token sequence.

use std::fmt;

use logos::Logos;

use crate::errors::{self, ErrorKind, SourceLocation};

/// Skip a `/* ... */` block comment (non-nesting). An unterminated comment
/// silently runs to end of input.
fn lex_block_comment(lex: &mut logos::Lexer<'_, TokenKind>) -> logos::Skip {
    match lex.remainder().find("*/") {
        Some(end) => lex.bump(end + 2),
        None => lex.bump(lex.remainder().len()),
    }
    logos::Skip
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum TokenKind {
    // ── literals ────────────────────────────────────────────────
    /// Integer literal: `42`, `0`, `0x1F`. Hex is decoded downstream.
    #[regex(r"0[xX][0-9a-fA-F]+|[0-9]+")]
    IntLit,

    /// Float literal: `3.14`, `0.5`.
    #[regex(r"[0-9]+\.[0-9]+")]
    FloatLit,

    /// String literal with `\n` `\t` `\"` `\\` escapes.
    #[regex(r#""([^"\\]|\\.)*""#)]
    StringLit,

    // ── keywords ────────────────────────────────────────────────
    #[token("return")]
    Return,

    #[token("break")]
    Break,

    #[token("continue")]
    Continue,

    #[token("if")]
    If,

    #[token("else")]
    Else,

    #[token("while")]
    While,

    #[token("ptr")]
    Ptr,

    #[token("import")]
    Import,

    #[token("class")]
    Class,

    #[token("typedef")]
    Typedef,

    #[token("intdef")]
    Intdef,

    // ── symbols ─────────────────────────────────────────────────
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token(".")]
    Period,

    #[token(",")]
    Comma,

    #[token(";")]
    Semi,

    #[token("&")]
    Ampersand,

    #[token("$")]
    Dollar,

    #[token("%")]
    Percent,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Asterisk,

    #[token("/")]
    Slash,

    #[token("=")]
    Equals,

    #[token("<")]
    Less,

    #[token(">")]
    Greater,

    /// Never produced — the callback skips the comment body.
    #[token("/*", lex_block_comment)]
    BlockComment,

    // ── misc ────────────────────────────────────────────────────
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,

    EndOfFile,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::IntLit => "<int literal>",
            TokenKind::FloatLit => "<float literal>",
            TokenKind::StringLit => "<string literal>",
            TokenKind::Return => "return",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Ptr => "ptr",
            TokenKind::Import => "import",
            TokenKind::Class => "class",
            TokenKind::Typedef => "typedef",
            TokenKind::Intdef => "intdef",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Period => ".",
            TokenKind::Comma => ",",
            TokenKind::Semi => ";",
            TokenKind::Ampersand => "&",
            TokenKind::Dollar => "$",
            TokenKind::Percent => "%",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Asterisk => "*",
            TokenKind::Slash => "/",
            TokenKind::Equals => "=",
            TokenKind::Less => "<",
            TokenKind::Greater => ">",
            TokenKind::BlockComment => "/*",
            TokenKind::Identifier => "<identifier>",
            TokenKind::EndOfFile => "<end of file>",
        };
        write!(f, "{text}")
    }
}

/// A single token together with its source text and position.
///
/// For string literals `text` holds the *unescaped* contents without the
/// surrounding quotes; for everything else it is the matched source slice.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub row: u32,
    pub col: u32,
}

/// Snapshot of the lexer's position, returned by [`Lexer::save_state`].
#[derive(Debug, Clone, Copy)]
pub struct LexerState {
    cursor: usize,
}

/// Look-ahead lexer over a pre-tokenised source.
pub struct Lexer {
    tokens: Vec<Token>,
    cursor: usize,
}

impl Lexer {
    /// Tokenise `source` in full. Any invalid character or unterminated
    /// string literal is fatal.
    pub fn new(source: &str) -> Self {
        let line_starts = line_starts(source);

        let mut lex = TokenKind::lexer(source);
        let mut tokens = Vec::new();

        while let Some(result) = lex.next() {
            let span = lex.span();
            let (row, col) = position(&line_starts, span.start);

            match result {
                Ok(kind) => {
                    let text = if kind == TokenKind::StringLit {
                        unescape(&source[span.start + 1..span.end - 1])
                    } else {
                        lex.slice().to_string()
                    };
                    tokens.push(Token { kind, text, row, col });
                }
                Err(()) => {
                    let location = SourceLocation {
                        row,
                        col,
                        ..SourceLocation::default()
                    };
                    if source[span.start..].starts_with('"') {
                        errors::fatal_at(ErrorKind::Syntax, "Unterminated string literal", location);
                    }
                    let bad = source[span.start..].chars().next().unwrap_or('\0');
                    errors::fatal_at(
                        ErrorKind::Syntax,
                        format!("Invalid character found during lexing: '{bad}'"),
                        location,
                    );
                }
            }
        }

        let (row, col) = position(&line_starts, source.len());
        tokens.push(Token {
            kind: TokenKind::EndOfFile,
            text: String::new(),
            row,
            col,
        });

        Self { tokens, cursor: 0 }
    }

    /// Look at the current token without consuming it.
    pub fn peek(&self) -> &Token {
        self.peek_nth(0)
    }

    /// Look `offset` tokens ahead without consuming anything. Past the end
    /// of input this keeps returning the end-of-file token.
    pub fn peek_nth(&self, offset: usize) -> &Token {
        let index = (self.cursor + offset).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    /// Does the current token have the given kind?
    pub fn peek_kind(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    /// Does the token `offset` ahead have the given kind?
    pub fn peek_kind_nth(&self, kind: TokenKind, offset: usize) -> bool {
        self.peek_nth(offset).kind == kind
    }

    /// Consume and return the current token. At end of input the end-of-file
    /// token is returned over and over.
    pub fn consume(&mut self) -> Token {
        let token = self.tokens[self.cursor].clone();
        if self.cursor + 1 < self.tokens.len() {
            self.cursor += 1;
        }
        token
    }

    pub fn save_state(&self) -> LexerState {
        LexerState { cursor: self.cursor }
    }

    pub fn restore_state(&mut self, state: LexerState) {
        self.cursor = state.cursor;
    }
}

/// Decode string-literal escapes: `\n`, `\t`, `\"`, `\\`; any other pair
/// yields the second character literally.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Byte offsets of the first character of every line.
fn line_starts(source: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, b) in source.bytes().enumerate() {
        if b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

/// Translate a byte offset into 1-based (row, col).
fn position(line_starts: &[usize], offset: usize) -> (u32, u32) {
    let row = line_starts.partition_point(|&start| start <= offset);
    let col = offset - line_starts[row - 1] + 1;
    (row as u32, col as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_matches_consume() {
        let mut lexer = Lexer::new("int main ( ) { }");
        while !lexer.peek_kind(TokenKind::EndOfFile) {
            let peeked = lexer.peek().clone();
            let consumed = lexer.consume();
            assert_eq!(peeked.kind, consumed.kind);
            assert_eq!(peeked.text, consumed.text);
        }
    }

    #[test]
    fn save_restore_replays_identical_tokens() {
        let mut lexer = Lexer::new("class Point { int x; int y; }");
        lexer.consume();
        lexer.consume();

        let state = lexer.save_state();
        let first: Vec<_> = (0..5).map(|_| lexer.consume()).collect();
        lexer.restore_state(state);
        let second: Vec<_> = (0..5).map(|_| lexer.consume()).collect();

        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.kind, b.kind);
            assert_eq!(a.text, b.text);
            assert_eq!((a.row, a.col), (b.row, b.col));
        }
    }

    #[test]
    fn keywords_and_identifiers() {
        let mut lexer = Lexer::new("return if else while ptr import class typedef intdef value");
        let kinds: Vec<_> = std::iter::from_fn(|| {
            let t = lexer.consume();
            (t.kind != TokenKind::EndOfFile).then_some(t.kind)
        })
        .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Return,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::While,
                TokenKind::Ptr,
                TokenKind::Import,
                TokenKind::Class,
                TokenKind::Typedef,
                TokenKind::Intdef,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let mut lexer = Lexer::new("a // line comment\nb /* block\ncomment */ c");
        assert_eq!(lexer.consume().text, "a");
        assert_eq!(lexer.consume().text, "b");
        assert_eq!(lexer.consume().text, "c");
        assert!(lexer.peek_kind(TokenKind::EndOfFile));
    }

    #[test]
    fn rows_and_columns_are_one_based() {
        let mut lexer = Lexer::new("int\n  foo;");
        let int_tok = lexer.consume();
        assert_eq!((int_tok.row, int_tok.col), (1, 1));
        let foo_tok = lexer.consume();
        assert_eq!((foo_tok.row, foo_tok.col), (2, 3));
    }

    #[test]
    fn numeric_literals() {
        let mut lexer = Lexer::new("42 0x1F 3.14");
        let a = lexer.consume();
        assert_eq!((a.kind, a.text.as_str()), (TokenKind::IntLit, "42"));
        let b = lexer.consume();
        assert_eq!((b.kind, b.text.as_str()), (TokenKind::IntLit, "0x1F"));
        let c = lexer.consume();
        assert_eq!((c.kind, c.text.as_str()), (TokenKind::FloatLit, "3.14"));
    }

    #[test]
    fn string_escapes_are_decoded() {
        let mut lexer = Lexer::new(r#""line\n\ttab \"quoted\" back\\slash \q""#);
        let tok = lexer.consume();
        assert_eq!(tok.kind, TokenKind::StringLit);
        assert_eq!(tok.text, "line\n\ttab \"quoted\" back\\slash q");
    }

    #[test]
    fn double_equals_lexes_as_two_tokens() {
        let mut lexer = Lexer::new("a == b");
        assert_eq!(lexer.consume().kind, TokenKind::Identifier);
        assert_eq!(lexer.consume().kind, TokenKind::Equals);
        assert_eq!(lexer.consume().kind, TokenKind::Equals);
        assert_eq!(lexer.consume().kind, TokenKind::Identifier);
    }
}
