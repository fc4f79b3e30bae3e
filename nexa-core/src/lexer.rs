//! Lexer for Nexa.
//!
//! The lexer never fails: malformed input is reported as an
//! [`TokenKind::Invalid`] token and left for the parser to reject with
//! a located diagnostic.

use std::fmt;

use crate::span::Span;

/// Kind of a token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Special
    Eof,
    Invalid,

    // Identifiers and literals
    Ident,
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    CharLiteral,
    BoolLiteral, // true / false

    // Type keywords
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    Bool,

    // Statement keywords
    Print,
    Loop,

    // Operators
    Plus,  // +
    Minus, // -
    Star,  // *
    Slash, // /
    Equal, // =

    // Punctuation
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Semi,     // ;
    Dot,      // .

    // Shape brackets
    Less,          // <
    Greater,       // >
    DoubleLess,    // <<
    DoubleGreater, // >>
    Pipe,          // |
    DoublePipe,    // ||
    LBrace,        // {
    RBrace,        // }
    DoubleLBrace,  // {{
    DoubleRBrace,  // }}
}

impl TokenKind {
    /// Human readable description used in parser diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Eof => "end of input",
            TokenKind::Invalid => "invalid token",
            TokenKind::Ident => "identifier",
            TokenKind::IntLiteral => "integer literal",
            TokenKind::FloatLiteral => "float literal",
            TokenKind::StringLiteral => "string literal",
            TokenKind::CharLiteral => "char literal",
            TokenKind::BoolLiteral => "bool literal",
            TokenKind::Int => "`int`",
            TokenKind::Long => "`long`",
            TokenKind::Float => "`float`",
            TokenKind::Double => "`double`",
            TokenKind::Char => "`char`",
            TokenKind::String => "`string`",
            TokenKind::Bool => "`bool`",
            TokenKind::Print => "`print`",
            TokenKind::Loop => "`loop`",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::Equal => "`=`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::Comma => "`,`",
            TokenKind::Semi => "`;`",
            TokenKind::Dot => "`.`",
            TokenKind::Less => "`<`",
            TokenKind::Greater => "`>`",
            TokenKind::DoubleLess => "`<<`",
            TokenKind::DoubleGreater => "`>>`",
            TokenKind::Pipe => "`|`",
            TokenKind::DoublePipe => "`||`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::DoubleLBrace => "`{{`",
            TokenKind::DoubleRBrace => "`}}`",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A single token.
///
/// `lexeme` is the raw source text of the token, except for string and
/// char literals where it holds the text between the quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

/// Lex a source string into tokens, terminated by an `Eof` token.
///
/// A leading `#!` line is skipped; it still counts as line 1.
pub fn lex(source: &str) -> Vec<Token> {
    let mut lexer = Lexer {
        source,
        chars: source.as_bytes(),
        index: 0,
        line: 1,
        column: 1,
    };
    lexer.skip_shebang();
    lexer.run()
}

struct Lexer<'src> {
    source: &'src str,
    chars: &'src [u8],
    index: usize,
    line: u32,
    column: u32,
}

/// Position of the first byte of the token being scanned.
#[derive(Clone, Copy)]
struct Mark {
    index: usize,
    line: u32,
    column: u32,
}

impl<'src> Lexer<'src> {
    fn run(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia();
            let Some(ch) = self.peek_char() else {
                break;
            };

            let start = self.mark();
            let token = match ch {
                b'+' => self.single(TokenKind::Plus, start),
                b'-' => self.single(TokenKind::Minus, start),
                b'*' => self.single(TokenKind::Star, start),
                b'/' => self.single(TokenKind::Slash, start),
                b'=' => self.single(TokenKind::Equal, start),
                b'(' => self.single(TokenKind::LParen, start),
                b')' => self.single(TokenKind::RParen, start),
                b'[' => self.single(TokenKind::LBracket, start),
                b']' => self.single(TokenKind::RBracket, start),
                b',' => self.single(TokenKind::Comma, start),
                b';' => self.single(TokenKind::Semi, start),
                b'.' => self.single(TokenKind::Dot, start),
                b'<' => self.single_or_double(TokenKind::Less, TokenKind::DoubleLess, start),
                b'>' => {
                    self.single_or_double(TokenKind::Greater, TokenKind::DoubleGreater, start)
                }
                b'|' => self.single_or_double(TokenKind::Pipe, TokenKind::DoublePipe, start),
                b'{' => self.single_or_double(TokenKind::LBrace, TokenKind::DoubleLBrace, start),
                b'}' => self.single_or_double(TokenKind::RBrace, TokenKind::DoubleRBrace, start),
                b'"' => self.lex_string(start),
                b'\'' => self.lex_char(start),
                b'0'..=b'9' => self.lex_number(start),
                _ if is_ident_start(ch) => self.lex_ident_or_keyword(start),
                _ => self.unexpected_char(start),
            };
            tokens.push(token);
        }

        let eof = self.mark();
        tokens.push(self.token(TokenKind::Eof, String::new(), eof));
        tokens
    }

    fn skip_shebang(&mut self) {
        if self.chars.starts_with(b"#!") {
            while let Some(ch) = self.peek_char() {
                if ch == b'\n' {
                    break;
                }
                self.consume_char();
            }
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) {
                self.consume_char();
            } else if ch == b'/' && self.peek_next() == Some(b'/') {
                while let Some(ch) = self.peek_char() {
                    if ch == b'\n' {
                        break;
                    }
                    self.consume_char();
                }
            } else {
                break;
            }
        }
    }

    fn mark(&self) -> Mark {
        Mark {
            index: self.index,
            line: self.line,
            column: self.column,
        }
    }

    fn token(&self, kind: TokenKind, lexeme: String, start: Mark) -> Token {
        Token {
            kind,
            lexeme,
            span: Span::new(
                start.index as u32,
                self.index as u32,
                start.line,
                start.column,
            ),
        }
    }

    /// Token whose lexeme is exactly the consumed source text.
    fn raw_token(&self, kind: TokenKind, start: Mark) -> Token {
        let lexeme = self.source[start.index..self.index].to_string();
        self.token(kind, lexeme, start)
    }

    fn single(&mut self, kind: TokenKind, start: Mark) -> Token {
        self.consume_char();
        self.raw_token(kind, start)
    }

    /// Longest match for the doubled bracket forms (`<<`, `||`, `}}`, ...).
    fn single_or_double(&mut self, single: TokenKind, double: TokenKind, start: Mark) -> Token {
        let ch = self.peek_char();
        self.consume_char();
        if self.peek_char() == ch {
            self.consume_char();
            self.raw_token(double, start)
        } else {
            self.raw_token(single, start)
        }
    }

    fn unexpected_char(&mut self, start: Mark) -> Token {
        // Consume a whole UTF-8 sequence so the lexeme stays valid text.
        self.consume_char();
        while self.peek_char().is_some_and(|ch| ch & 0b1100_0000 == 0b1000_0000) {
            self.consume_char();
        }
        self.raw_token(TokenKind::Invalid, start)
    }

    fn lex_string(&mut self, start: Mark) -> Token {
        // Consume the opening quote
        self.consume_char();

        let content_start = self.index;
        while let Some(ch) = self.peek_char() {
            if ch == b'"' {
                let text = self.source[content_start..self.index].to_string();
                self.consume_char(); // closing quote
                return self.token(TokenKind::StringLiteral, text, start);
            }
            self.consume_char();
        }

        // Unterminated string
        self.raw_token(TokenKind::Invalid, start)
    }

    fn lex_char(&mut self, start: Mark) -> Token {
        // Consume the opening quote
        self.consume_char();

        match (self.peek_char(), self.peek_next()) {
            (Some(ch), Some(b'\'')) if ch != b'\'' && ch != b'\n' => {
                self.consume_char();
                self.consume_char(); // closing quote
                self.token(TokenKind::CharLiteral, (ch as char).to_string(), start)
            }
            _ => {
                // Empty, multi-byte or unterminated: swallow up to the next
                // quote on this line so the parser sees a single bad token.
                while let Some(ch) = self.peek_char() {
                    if ch == b'\n' {
                        break;
                    }
                    self.consume_char();
                    if ch == b'\'' {
                        break;
                    }
                }
                self.raw_token(TokenKind::Invalid, start)
            }
        }
    }

    fn lex_number(&mut self, start: Mark) -> Token {
        // integer or float: digits [ '.' digits ]?
        self.consume_digits();

        let mut is_float = false;
        if self.peek_char() == Some(b'.') && self.peek_next().is_some_and(|ch| ch.is_ascii_digit())
        {
            is_float = true;
            self.consume_char(); // '.'
            self.consume_digits();
        }

        let kind = if is_float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntLiteral
        };
        self.raw_token(kind, start)
    }

    fn consume_digits(&mut self) {
        while self.peek_char().is_some_and(|ch| ch.is_ascii_digit()) {
            self.consume_char();
        }
    }

    fn lex_ident_or_keyword(&mut self, start: Mark) -> Token {
        while self.peek_char().is_some_and(is_ident_continue) {
            self.consume_char();
        }

        let text = &self.source[start.index..self.index];
        let kind = match text {
            "int" => TokenKind::Int,
            "long" => TokenKind::Long,
            "float" => TokenKind::Float,
            "double" => TokenKind::Double,
            "char" => TokenKind::Char,
            "string" => TokenKind::String,
            "bool" => TokenKind::Bool,
            "print" => TokenKind::Print,
            "loop" => TokenKind::Loop,
            "true" | "false" => TokenKind::BoolLiteral,
            _ => TokenKind::Ident,
        };
        self.raw_token(kind, start)
    }

    fn peek_char(&self) -> Option<u8> {
        self.chars.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.chars.get(self.index + 1).copied()
    }

    fn consume_char(&mut self) {
        let Some(ch) = self.peek_char() else {
            return;
        };
        self.index += 1;
        if ch == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).into_iter().map(|token| token.kind).collect()
    }

    #[test]
    fn lexes_typed_declaration() {
        use TokenKind::*;
        assert_eq!(
            kinds("int x = 1 + 2.5;"),
            vec![Int, Ident, Equal, IntLiteral, Plus, FloatLiteral, Semi, Eof]
        );
    }

    #[test]
    fn prefers_doubled_brackets() {
        use TokenKind::*;
        assert_eq!(
            kinds("<<a>> <b> ||c|| |d| {{e}} {f}"),
            vec![
                DoubleLess,
                Ident,
                DoubleGreater,
                Less,
                Ident,
                Greater,
                DoublePipe,
                Ident,
                DoublePipe,
                Pipe,
                Ident,
                Pipe,
                DoubleLBrace,
                Ident,
                DoubleRBrace,
                LBrace,
                Ident,
                RBrace,
                Eof
            ]
        );
    }

    #[test]
    fn tracks_lines_and_columns() {
        let tokens = lex("int a = 1;\n  print(a);");
        let print = tokens
            .iter()
            .find(|token| token.kind == TokenKind::Print)
            .expect("print token");
        assert_eq!((print.span.line, print.span.column), (2, 3));
    }

    #[test]
    fn skips_comments_and_division_survives() {
        use TokenKind::*;
        assert_eq!(
            kinds("a / b // trailing comment\nc"),
            vec![Ident, Slash, Ident, Ident, Eof]
        );
    }

    #[test]
    fn skips_shebang_line() {
        let tokens = lex("#!/usr/bin/env nexa\nprint(1);");
        assert_eq!(tokens[0].kind, TokenKind::Print);
        assert_eq!(tokens[0].span.line, 2);
    }

    #[test]
    fn recognizes_keywords_and_bools() {
        use TokenKind::*;
        assert_eq!(
            kinds("long double char bool string float loop true false ints"),
            vec![Long, Double, Char, Bool, String, Float, Loop, BoolLiteral, BoolLiteral, Ident, Eof]
        );
    }

    #[test]
    fn number_without_fraction_digits_stops_before_dot() {
        use TokenKind::*;
        assert_eq!(kinds("3.x"), vec![IntLiteral, Dot, Ident, Eof]);
    }

    #[test]
    fn string_lexeme_excludes_quotes() {
        let tokens = lex("\"hello world\"");
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].lexeme, "hello world");
    }

    #[test]
    fn unterminated_string_is_invalid_token() {
        let tokens = lex("print(\"oops");
        assert_eq!(tokens[2].kind, TokenKind::Invalid);
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
    }

    #[test]
    fn char_literal_is_exactly_one_byte() {
        let tokens = lex("'a' 'ab' ''");
        assert_eq!(tokens[0].kind, TokenKind::CharLiteral);
        assert_eq!(tokens[0].lexeme, "a");
        assert_eq!(tokens[1].kind, TokenKind::Invalid);
        assert_eq!(tokens[2].kind, TokenKind::Invalid);
    }

    #[test]
    fn unknown_character_becomes_invalid_token() {
        let tokens = lex("int a = 1 @ 2;");
        let invalid = &tokens[4];
        assert_eq!(invalid.kind, TokenKind::Invalid);
        assert_eq!(invalid.lexeme, "@");
        assert_eq!(invalid.span.column, 11);
    }

    proptest! {
        #[test]
        fn integer_lexeme_round_trips(n in any::<u64>()) {
            let text = n.to_string();
            let tokens = lex(&text);
            prop_assert_eq!(tokens.len(), 2);
            prop_assert_eq!(tokens[0].kind, TokenKind::IntLiteral);
            prop_assert_eq!(tokens[0].lexeme.parse::<u64>().ok(), Some(n));
        }
    }
}
