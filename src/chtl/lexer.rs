//! CHTL Lexer (component C1): produces a token stream for the CHTL parser
//! (spec.md §4.C1). No teacher lexer exists (the teacher consumes tokens
//! `oxc_parser` already produced); written in the plain
//! `chars().peekable()`-forward-scan idiom the teacher uses for its own
//! string-building helpers (`template.rs`, `utils.rs`).

use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCategory, Position};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier(String),
    StringLiteral(String),
    UnquotedLiteral(String),
    Number(String),
    /// `{ } [ ] ( ) ; : = , .`
    Punct(char),
    LineComment(String),
    BlockComment(String),
    /// `--…` generator comment, preserved verbatim.
    GeneratorComment(String),
    /// `[Template]`, `[Custom]`, `[Origin]`, `[Import]`, `[Namespace]`, `[Configuration]`.
    BlockOpener(String),
    /// `@Style`, `@Element`, `@Var`, `@Html`, `@JavaScript`, `@Chtl`, `@CJmod`, `@Config`.
    TypeSigil(String),
    /// `.name` or `#name`.
    Selector(String),
    Keyword(String),
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

const KEYWORDS: &[&str] = &[
    "text", "style", "script", "inherit", "delete", "insert", "after", "before", "replace",
    "at", "top", "bottom", "from", "as", "except", "use", "html5",
];

const BLOCK_OPENERS: &[&str] = &["Template", "Custom", "Origin", "Import", "Namespace", "Configuration"];

pub struct Lexer<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn byte_offset(&self) -> u32 {
        self.chars[..self.pos].iter().map(|c| c.len_utf8()).sum::<usize>() as u32
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column, self.byte_offset())
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    pub fn tokenize(mut self, diagnostics: &mut DiagnosticBag) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let start_pos = self.position();
            let Some(c) = self.peek() else {
                tokens.push(Token { kind: TokenKind::Eof, position: start_pos });
                break;
            };

            let kind = match c {
                '[' => self.lex_block_opener(),
                '@' => self.lex_type_sigil(),
                '"' | '\'' => self.lex_string(diagnostics, start_pos),
                '.' | '#' if self.peek_at(1).is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '-') => {
                    self.lex_selector()
                }
                '/' if self.peek_at(1) == Some('/') => self.lex_line_comment(),
                '/' if self.peek_at(1) == Some('*') => self.lex_block_comment(diagnostics, start_pos),
                '-' if self.peek_at(1) == Some('-') => self.lex_generator_comment(),
                '{' | '}' | '(' | ')' | ';' | ':' | '=' | ',' | '.' | '[' | ']' | '&' => {
                    self.advance();
                    TokenKind::Punct(c)
                }
                c if c.is_ascii_digit() => self.lex_number(),
                c if is_ident_start(c) => self.lex_identifier_or_keyword(),
                _ => self.lex_unquoted_literal(),
            };

            tokens.push(Token { kind, position: start_pos });
        }
        tokens
    }

    fn lex_block_opener(&mut self) -> TokenKind {
        let start = self.pos;
        self.advance(); // consume '['
        while matches!(self.peek(), Some(c) if c != ']') {
            self.advance();
        }
        let name: String = self.chars[start + 1..self.pos].iter().collect();
        if self.peek() == Some(']') {
            self.advance();
        }
        if BLOCK_OPENERS.contains(&name.as_str()) {
            TokenKind::BlockOpener(name)
        } else {
            TokenKind::Punct('[')
        }
    }

    fn lex_type_sigil(&mut self) -> TokenKind {
        let start = self.pos;
        self.advance(); // consume '@'
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let name: String = self.chars[start + 1..self.pos].iter().collect();
        TokenKind::TypeSigil(name)
    }

    fn lex_string(&mut self, diagnostics: &mut DiagnosticBag, start_pos: Position) -> TokenKind {
        let quote = self.advance().unwrap();
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    diagnostics.push(Diagnostic::error(
                        DiagnosticCategory::Lexical,
                        "unterminated string literal",
                        start_pos,
                    ));
                    break;
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    if let Some(escaped) = self.advance() {
                        value.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        TokenKind::StringLiteral(value)
    }

    fn lex_selector(&mut self) -> TokenKind {
        let start = self.pos;
        self.advance(); // '.' or '#'
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '-') {
            self.advance();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        TokenKind::Selector(text)
    }

    fn lex_line_comment(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c != '\n') {
            self.advance();
        }
        TokenKind::LineComment(self.chars[start..self.pos].iter().collect())
    }

    fn lex_block_comment(&mut self, diagnostics: &mut DiagnosticBag, start_pos: Position) -> TokenKind {
        let start = self.pos;
        self.advance();
        self.advance();
        loop {
            match (self.peek(), self.peek_at(1)) {
                (None, _) => {
                    diagnostics.push(Diagnostic::error(
                        DiagnosticCategory::Lexical,
                        "unterminated block comment",
                        start_pos,
                    ));
                    break;
                }
                (Some('*'), Some('/')) => {
                    self.advance();
                    self.advance();
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }
        TokenKind::BlockComment(self.chars[start..self.pos].iter().collect())
    }

    fn lex_generator_comment(&mut self) -> TokenKind {
        let start = self.pos;
        self.advance();
        self.advance();
        while matches!(self.peek(), Some(c) if c != '\n') {
            self.advance();
        }
        let text: String = self.chars[start + 2..self.pos].iter().collect();
        TokenKind::GeneratorComment(text.trim().to_string())
    }

    fn lex_number(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.advance();
        }
        TokenKind::Number(self.chars[start..self.pos].iter().collect())
    }

    fn lex_identifier_or_keyword(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '-') {
            self.advance();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if KEYWORDS.contains(&text.as_str()) {
            TokenKind::Keyword(text)
        } else {
            TokenKind::Identifier(text)
        }
    }

    fn lex_unquoted_literal(&mut self) -> TokenKind {
        let start = self.pos;
        const DELIMS: &[char] = &['{', '}', '[', ']', '(', ')', ';', ':', '=', ',', '"', '\''];
        while matches!(self.peek(), Some(c) if !c.is_whitespace() && !DELIMS.contains(&c)) {
            self.advance();
        }
        if self.pos == start {
            // Lone delimiter-ish character we didn't special-case; consume
            // one char to guarantee forward progress.
            self.advance();
        }
        TokenKind::UnquotedLiteral(self.chars[start..self.pos].iter().collect())
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// Convenience wrapper mirroring spec.md's `scan`-style entry point.
pub fn tokenize(source: &str, diagnostics: &mut DiagnosticBag) -> Vec<Token> {
    Lexer::new(source).tokenize(diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut bag = DiagnosticBag::default();
        tokenize(source, &mut bag).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_block_opener_and_sigil() {
        let k = kinds("[Template] @Style Btn { color: red; }");
        assert_eq!(k[0], TokenKind::BlockOpener("Template".to_string()));
        assert_eq!(k[1], TokenKind::TypeSigil("Style".to_string()));
        assert_eq!(k[2], TokenKind::Identifier("Btn".to_string()));
    }

    #[test]
    fn lexes_selector_and_keyword() {
        let k = kinds(".card { color: red; }");
        assert_eq!(k[0], TokenKind::Selector(".card".to_string()));
    }

    #[test]
    fn lexes_generator_comment_verbatim() {
        let k = kinds("-- hello world\ndiv {}");
        assert_eq!(k[0], TokenKind::GeneratorComment("hello world".to_string()));
    }

    #[test]
    fn reports_unterminated_string() {
        let mut bag = DiagnosticBag::default();
        tokenize("text { \"oops", &mut bag);
        assert!(bag.has_errors());
    }
}
