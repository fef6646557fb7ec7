//! CHTL-JS Parser (component J2): recognizes enhanced selectors, `listen`,
//! `delegate`, `animate` and `vir` declarations against the token stream
//! `chtljs::lexer` produces, leaving everything else as verbatim
//! [`JsNode::Raw`] runs. Same `Option`-returning, synchronize-on-failure
//! shape as `chtl::parser`.

use indexmap::IndexMap;

use crate::arena::Arena;
use crate::chtljs::ast::{AccessKind, JsNode, MemberType, Node};
use crate::chtljs::lexer::{Token, TokenKind};
use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCategory, Position};

pub struct Parser<'d> {
    tokens: Vec<Token>,
    pos: usize,
    pub arena: Arena<JsNode>,
    diagnostics: &'d mut DiagnosticBag,
}

impl<'d> Parser<'d> {
    pub fn new(tokens: Vec<Token>, diagnostics: &'d mut DiagnosticBag) -> Self {
        Self { tokens, pos: 0, arena: Arena::new(), diagnostics }
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn position(&self) -> Position {
        self.tokens[self.pos.min(self.tokens.len() - 1)].position
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos.min(self.tokens.len() - 1)].kind.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    pub fn parse_program(&mut self) -> Vec<Node> {
        let mut items = Vec::new();
        while !self.is_eof() {
            items.push(self.parse_item());
        }
        items
    }

    fn parse_item(&mut self) -> Node {
        match self.peek().clone() {
            TokenKind::EnhancedSelector(_) => self.parse_selector_statement(),
            TokenKind::Keyword(k) if k == "animate" => self.parse_animate_call(),
            TokenKind::Keyword(k) if k == "vir" => self.parse_vir_decl(),
            _ => self.parse_raw_run(),
        }
    }

    /// `{{css}}`, optionally `[index]`, optionally followed by
    /// `->`/`&->` `listen`/`delegate` `{` object-literal `}`.
    fn parse_selector_statement(&mut self) -> Node {
        let selector = self.parse_selector_node();
        match self.peek().clone() {
            TokenKind::Arrow | TokenKind::AmpArrow => {
                self.advance();
                match self.peek().clone() {
                    TokenKind::Keyword(k) if k == "listen" => self.parse_listen(selector),
                    TokenKind::Keyword(k) if k == "delegate" => self.parse_delegate(selector),
                    TokenKind::Identifier(prop) => {
                        self.advance();
                        self.arena.alloc(JsNode::MemberAccess { object: selector, property: prop, access: AccessKind::Arrow })
                    }
                    other => {
                        self.error(format!("expected `listen`/`delegate` or member name after `->`, found {other:?}"));
                        selector
                    }
                }
            }
            _ => selector,
        }
    }

    fn parse_selector_node(&mut self) -> Node {
        match self.advance() {
            TokenKind::EnhancedSelector(css_text) => {
                let mut index = None;
                if matches!(self.peek(), TokenKind::Punct('[')) {
                    self.advance();
                    if let TokenKind::Number(n) = self.peek().clone() {
                        self.advance();
                        index = n.parse::<i64>().ok();
                    }
                    if matches!(self.peek(), TokenKind::Punct(']')) {
                        self.advance();
                    }
                }
                self.arena.alloc(JsNode::Selector { css_text, index })
            }
            other => {
                self.error(format!("expected enhanced selector, found {other:?}"));
                self.arena.alloc(JsNode::Raw { text: String::new() })
            }
        }
    }

    /// `listen { event: handler, ... }`.
    fn parse_listen(&mut self, target: Node) -> Node {
        self.advance(); // `listen`
        let events = self.parse_event_object();
        self.consume_trailing_semicolon();
        self.arena.alloc(JsNode::Listen { target, events })
    }

    /// `delegate { target: [sel, ...], event: handler, ... }`, per spec.md
    /// §4.J2 — no enclosing parens, same shape as `listen`.
    fn parse_delegate(&mut self, parent: Node) -> Node {
        self.advance(); // `delegate`
        if !self.expect_punct('{') {
            return self.arena.alloc(JsNode::Raw { text: String::new() });
        }
        let mut targets = Vec::new();
        let mut events = IndexMap::new();
        loop {
            match self.peek().clone() {
                TokenKind::Punct('}') | TokenKind::Eof => break,
                TokenKind::Identifier(key) | TokenKind::Keyword(key) => {
                    self.advance();
                    self.expect_punct(':');
                    if key == "target" {
                        targets = self.parse_target_list();
                    } else {
                        let value = self.parse_value_node();
                        events.insert(key, value);
                    }
                    if matches!(self.peek(), TokenKind::Punct(',')) {
                        self.advance();
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
        self.expect_punct('}');
        self.consume_trailing_semicolon();
        self.arena.alloc(JsNode::Delegate { parent, targets, events })
    }

    fn parse_target_list(&mut self) -> Vec<String> {
        let mut targets = Vec::new();
        if matches!(self.peek(), TokenKind::EnhancedSelector(_)) {
            if let TokenKind::EnhancedSelector(css) = self.advance() {
                targets.push(css);
            }
            return targets;
        }
        if self.expect_punct('[') {
            loop {
                match self.peek().clone() {
                    TokenKind::Punct(']') | TokenKind::Eof => break,
                    TokenKind::EnhancedSelector(css) => {
                        self.advance();
                        targets.push(css);
                    }
                    TokenKind::StringLiteral(s) => {
                        self.advance();
                        targets.push(s);
                    }
                    _ => {
                        self.advance();
                    }
                }
                if matches!(self.peek(), TokenKind::Punct(',')) {
                    self.advance();
                }
            }
            self.expect_punct(']');
        }
        targets
    }

    /// `animate({ target: {{sel}}, duration: 300, ... })`, called without a
    /// preceding selector (the target is named inside the object literal).
    fn parse_animate_call(&mut self) -> Node {
        self.advance(); // `animate`
        if !self.expect_punct('(') {
            return self.arena.alloc(JsNode::Raw { text: String::new() });
        }
        if !self.expect_punct('{') {
            return self.arena.alloc(JsNode::Raw { text: String::new() });
        }
        let mut target = None;
        let mut duration = None;
        let mut easing = None;
        let mut begin = None;
        let mut end = None;
        let mut when = Vec::new();
        let mut loop_count = None;
        let mut direction = None;
        let mut delay = None;
        let mut callback = None;

        loop {
            match self.peek().clone() {
                TokenKind::Punct('}') | TokenKind::Eof => break,
                TokenKind::Identifier(key) | TokenKind::Keyword(key) => {
                    self.advance();
                    self.expect_punct(':');
                    match key.as_str() {
                        "target" => target = Some(self.parse_value_node()),
                        "duration" => duration = Some(self.parse_value_node()),
                        "easing" => easing = Some(self.parse_value_node()),
                        "begin" => begin = Some(self.parse_value_node()),
                        "end" => end = Some(self.parse_value_node()),
                        "when" => when = self.parse_when_list(),
                        "loop" => loop_count = Some(self.parse_value_node()),
                        "direction" => direction = Some(self.parse_value_node()),
                        "delay" => delay = Some(self.parse_value_node()),
                        "callback" => callback = Some(self.parse_value_node()),
                        _ => {
                            self.parse_value_node();
                        }
                    }
                    if matches!(self.peek(), TokenKind::Punct(',')) {
                        self.advance();
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
        self.expect_punct('}');
        self.expect_punct(')');
        self.consume_trailing_semicolon();

        let target = target.unwrap_or_else(|| self.arena.alloc(JsNode::Raw { text: String::new() }));
        self.arena.alloc(JsNode::Animate {
            target,
            duration,
            easing,
            begin,
            end,
            when,
            loop_count,
            direction,
            delay,
            callback,
        })
    }

    fn parse_when_list(&mut self) -> Vec<Node> {
        let mut items = Vec::new();
        if self.expect_punct('[') {
            loop {
                match self.peek().clone() {
                    TokenKind::Punct(']') | TokenKind::Eof => break,
                    TokenKind::Punct('{') => {
                        items.push(self.parse_raw_object());
                    }
                    _ => {
                        self.advance();
                    }
                }
                if matches!(self.peek(), TokenKind::Punct(',')) {
                    self.advance();
                }
            }
            self.expect_punct(']');
        }
        items
    }

    /// `vir NAME = EXPR;` — the right-hand side's call result is captured
    /// opaquely as a single-member object keyed `"value"`, since CHTL-JS's
    /// dynamic binding determines the real member shape only at the bound
    /// call's own definition (spec.md §9's dynamic-lookup note): a
    /// `vir x = bind(fn)` declares one function member and a `vir x =
    /// bind({...})` mirrors the object literal's own keys.
    fn parse_vir_decl(&mut self) -> Node {
        self.advance(); // `vir`
        let name = match self.advance() {
            TokenKind::Identifier(n) => n,
            other => {
                self.error(format!("expected identifier after `vir`, found {other:?}"));
                String::new()
            }
        };
        self.expect_punct_eq();
        let members = self.parse_vir_binding();
        self.consume_trailing_semicolon();
        self.arena.alloc(JsNode::VirDecl { name, members })
    }

    fn expect_punct_eq(&mut self) {
        if matches!(self.peek(), TokenKind::JsChunk(s) if s == "=") {
            self.advance();
        } else {
            self.error("expected `=` in `vir` declaration");
        }
    }

    fn parse_vir_binding(&mut self) -> IndexMap<String, MemberType> {
        let mut members = IndexMap::new();
        // Skip the call name and opening paren.
        if let TokenKind::Identifier(_) = self.peek().clone() {
            self.advance();
        }
        if !matches!(self.peek(), TokenKind::Punct('(')) {
            return members;
        }
        self.advance();
        match self.peek().clone() {
            TokenKind::Punct('{') => {
                self.advance();
                loop {
                    match self.peek().clone() {
                        TokenKind::Punct('}') | TokenKind::Eof => break,
                        TokenKind::Identifier(key) | TokenKind::Keyword(key) => {
                            self.advance();
                            self.expect_punct(':');
                            let value = self.parse_value_node();
                            // The bound object's own shape (function vs.
                            // plain value) is only known at its definition
                            // site; every key of a `vir` binding target is
                            // treated as a callable member (the common case
                            // — `listen`/`delegate`/`animate` handlers), with
                            // non-function values still reachable by name
                            // through `VirMemberRef`.
                            members.insert(key, MemberType::Function(value));
                            if matches!(self.peek(), TokenKind::Punct(',')) {
                                self.advance();
                            }
                        }
                        _ => {
                            self.advance();
                        }
                    }
                }
                self.expect_punct('}');
            }
            TokenKind::Identifier(fn_name) => {
                self.advance();
                let node = self.arena.alloc(JsNode::Raw { text: fn_name.clone() });
                members.insert("call".to_string(), MemberType::Function(node));
            }
            _ => {}
        }
        while !matches!(self.peek(), TokenKind::Punct(')') | TokenKind::Eof) {
            self.advance();
        }
        if matches!(self.peek(), TokenKind::Punct(')')) {
            self.advance();
        }
        members
    }

    /// `{ key: value, ... }` object literal mapping event names to handlers.
    /// `listen { event: handler, ... }`, per spec.md §4.J2's `target ->
    /// listen { event : handler (, …)? }` production — no enclosing parens.
    fn parse_event_object(&mut self) -> IndexMap<String, Node> {
        let mut events = IndexMap::new();
        if !self.expect_punct('{') {
            return events;
        }
        loop {
            match self.peek().clone() {
                TokenKind::Punct('}') | TokenKind::Eof => break,
                TokenKind::Identifier(key) | TokenKind::Keyword(key) => {
                    self.advance();
                    self.expect_punct(':');
                    let value = self.parse_value_node();
                    events.insert(key, value);
                    if matches!(self.peek(), TokenKind::Punct(',')) {
                        self.advance();
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
        self.expect_punct('}');
        events
    }

    /// Captures one value expression (function literal, identifier,
    /// selector, string, number, or a balanced `{...}` object) as raw text,
    /// stopping at the next top-level `,` or closing delimiter.
    fn parse_value_node(&mut self) -> Node {
        if matches!(self.peek(), TokenKind::Punct('{')) {
            return self.parse_raw_object();
        }
        if let TokenKind::EnhancedSelector(_) = self.peek().clone() {
            return self.parse_selector_node();
        }
        let mut text = String::new();
        let mut depth = 0i32;
        loop {
            match self.peek().clone() {
                TokenKind::Eof => break,
                TokenKind::Punct(',') if depth == 0 => break,
                TokenKind::Punct('}') if depth == 0 => break,
                TokenKind::Punct(')') if depth == 0 => break,
                TokenKind::Punct(c @ ('(' | '[')) => {
                    depth += 1;
                    text.push(c);
                    self.advance();
                }
                TokenKind::Punct(c @ (')' | ']')) => {
                    depth -= 1;
                    text.push(c);
                    self.advance();
                }
                other => {
                    text.push_str(&token_text(&other));
                    text.push(' ');
                    self.advance();
                }
            }
        }
        self.arena.alloc(JsNode::Raw { text: text.trim().to_string() })
    }

    fn parse_raw_object(&mut self) -> Node {
        let mut text = String::new();
        let mut depth = 0i32;
        loop {
            match self.peek().clone() {
                TokenKind::Eof => break,
                TokenKind::Punct('{') => {
                    depth += 1;
                    text.push('{');
                    self.advance();
                }
                TokenKind::Punct('}') => {
                    depth -= 1;
                    text.push('}');
                    self.advance();
                    if depth == 0 {
                        break;
                    }
                }
                other => {
                    text.push_str(&token_text(&other));
                    text.push(' ');
                    self.advance();
                }
            }
        }
        self.arena.alloc(JsNode::Raw { text })
    }

    fn parse_raw_run(&mut self) -> Node {
        let mut text = String::new();
        loop {
            match self.peek().clone() {
                TokenKind::Eof
                | TokenKind::EnhancedSelector(_) => break,
                TokenKind::Keyword(k) if k == "animate" || k == "vir" => break,
                other => {
                    text.push_str(&token_text(&other));
                    text.push(' ');
                    self.advance();
                }
            }
        }
        self.arena.alloc(JsNode::Raw { text })
    }

    fn expect_punct(&mut self, c: char) -> bool {
        if matches!(self.peek(), TokenKind::Punct(p) if *p == c) {
            self.advance();
            true
        } else {
            self.error(format!("expected '{c}'"));
            false
        }
    }

    fn consume_trailing_semicolon(&mut self) {
        if matches!(self.peek(), TokenKind::Punct(';')) {
            self.advance();
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(DiagnosticCategory::Syntax, message, self.position()));
    }
}

fn token_text(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Identifier(s) | TokenKind::Keyword(s) | TokenKind::Number(s) | TokenKind::JsChunk(s) => s.clone(),
        TokenKind::StringLiteral(s) => format!("\"{s}\""),
        TokenKind::Punct(c) => c.to_string(),
        TokenKind::Arrow => "->".to_string(),
        TokenKind::AmpArrow => "&->".to_string(),
        TokenKind::EnhancedSelector(s) => format!("{{{{{s}}}}}"),
        TokenKind::Eof => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chtljs::lexer::tokenize;

    #[test]
    fn parses_listen_on_selector() {
        let mut bag = DiagnosticBag::default();
        let tokens = tokenize("{{.box}}->listen{ click: handleClick };", &mut bag);
        let mut parser = Parser::new(tokens, &mut bag);
        let items = parser.parse_program();
        assert!(matches!(parser.arena.get(items[0]), JsNode::Listen { .. }));
        assert!(!bag.has_errors());
    }

    #[test]
    fn parses_delegate_with_target_array() {
        let mut bag = DiagnosticBag::default();
        let tokens = tokenize(
            "{{.list}}->delegate{ target: [{{.item}}], click: onItem };",
            &mut bag,
        );
        let mut parser = Parser::new(tokens, &mut bag);
        let items = parser.parse_program();
        if let JsNode::Delegate { targets, .. } = parser.arena.get(items[0]) {
            assert_eq!(targets, &vec![".item".to_string()]);
        } else {
            panic!("expected delegate node");
        }
    }

    #[test]
    fn parses_vir_decl() {
        let mut bag = DiagnosticBag::default();
        let tokens = tokenize("vir box = bind({ show: fn });", &mut bag);
        let mut parser = Parser::new(tokens, &mut bag);
        let items = parser.parse_program();
        assert!(matches!(parser.arena.get(items[0]), JsNode::VirDecl { .. }));
    }
}
