//! CHTL-JS Lexer (component J1): tokenizes the CHTL-JS dialect layered over
//! plain JavaScript — enhanced selectors, `->`, `&->`, and the
//! `listen`/`delegate`/`animate`/`vir` keywords — everything else passes
//! through as [`TokenKind::JsChunk`] runs for the generator to reproduce
//! verbatim. Same forward-scan-over-`Vec<char>` idiom as `chtl::lexer`.

use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCategory, Position};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// `{{ css-text }}`, captured verbatim between the double braces.
    EnhancedSelector(String),
    Arrow,
    AmpArrow,
    Identifier(String),
    Keyword(String),
    StringLiteral(String),
    Number(String),
    Punct(char),
    /// A run of plain JS text not otherwise recognized (operators, other
    /// punctuation sequences); reproduced verbatim by the generator.
    JsChunk(String),
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

const KEYWORDS: &[&str] = &["listen", "delegate", "animate", "vir", "function", "target", "return"];

pub struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    _source: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            _source: source,
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
                '{' if self.peek_at(1) == Some('{') => self.lex_enhanced_selector(diagnostics, start_pos),
                '&' if self.peek_at(1) == Some('-') && self.peek_at(2) == Some('>') => {
                    self.advance();
                    self.advance();
                    self.advance();
                    TokenKind::AmpArrow
                }
                '-' if self.peek_at(1) == Some('>') => {
                    self.advance();
                    self.advance();
                    TokenKind::Arrow
                }
                '"' | '\'' => self.lex_string(diagnostics, start_pos),
                '{' | '}' | '(' | ')' | '[' | ']' | ';' | ':' | ',' | '.' => {
                    self.advance();
                    TokenKind::Punct(c)
                }
                c if c.is_ascii_digit() => self.lex_number(),
                c if is_ident_start(c) => self.lex_identifier_or_keyword(),
                _ => self.lex_js_chunk(),
            };

            tokens.push(Token { kind, position: start_pos });
        }
        tokens
    }

    /// Captures everything between `{{` and the matching `}}` verbatim — the
    /// enhanced selector's CSS-like text is not itself tokenized further
    /// here; the parser re-parses `css_text` when it needs the selector kind.
    fn lex_enhanced_selector(&mut self, diagnostics: &mut DiagnosticBag, start_pos: Position) -> TokenKind {
        self.advance();
        self.advance();
        let start = self.pos;
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some('}'), Some('}')) => break,
                (None, _) => {
                    diagnostics.push(Diagnostic::error(
                        DiagnosticCategory::Lexical,
                        "unterminated enhanced selector `{{ ... }}`",
                        start_pos,
                    ));
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if self.peek() == Some('}') {
            self.advance();
            self.advance();
        }
        TokenKind::EnhancedSelector(text.trim().to_string())
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
                        value.push(escaped);
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

    fn lex_number(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.advance();
        }
        TokenKind::Number(self.chars[start..self.pos].iter().collect())
    }

    fn lex_identifier_or_keyword(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '$') {
            self.advance();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if KEYWORDS.contains(&text.as_str()) {
            TokenKind::Keyword(text)
        } else {
            TokenKind::Identifier(text)
        }
    }

    fn lex_js_chunk(&mut self) -> TokenKind {
        let start = self.pos;
        const STOP: &[char] = &['{', '}', '(', ')', '[', ']', ';', ':', ',', '.', '"', '\''];
        while matches!(self.peek(), Some(c) if !c.is_whitespace() && !STOP.contains(&c) && !(c == '-' && self.peek_at(1) == Some('>'))) {
            self.advance();
        }
        if self.pos == start {
            self.advance();
        }
        TokenKind::JsChunk(self.chars[start..self.pos].iter().collect())
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

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
    fn lexes_enhanced_selector_verbatim() {
        let k = kinds("{{.box}}->listen({click: fn})");
        assert_eq!(k[0], TokenKind::EnhancedSelector(".box".to_string()));
        assert_eq!(k[1], TokenKind::Arrow);
        assert_eq!(k[2], TokenKind::Keyword("listen".to_string()));
    }

    #[test]
    fn lexes_amp_arrow_and_vir_keyword() {
        let k = kinds("{{.box}} &-> listen({}); vir box = bind(obj);");
        assert!(k.contains(&TokenKind::AmpArrow));
        assert!(k.contains(&TokenKind::Keyword("vir".to_string())));
    }

    #[test]
    fn reports_unterminated_selector() {
        let mut bag = DiagnosticBag::default();
        tokenize("{{.box", &mut bag);
        assert!(bag.has_errors());
    }
}
