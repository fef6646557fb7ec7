//! CHTL Parser (component C2): top-down recursive-descent parser building
//! the CHTL AST, per spec.md §4.C2 production list. Every production
//! returns `Option<Node>` instead of throwing (spec.md §9): on `None` the
//! caller synchronizes at the next top-level boundary (a closing `}` at
//! depth 0, or a semicolon) and continues, matching the teacher's pattern of
//! `Option`-returning helpers (`get_attribute_name`, `get_static_attribute_value`
//! in `template.rs`) that callers check rather than unwrap.

use indexmap::IndexMap;

use crate::arena::Arena;
use crate::catalogue;
use crate::chtl::ast::{
    ChtlNode, ConstraintScope, DefKind, ImportKind, Node, OriginLang, SelectorKind,
    SpecializationOp,
};
use crate::chtl::lexer::{Token, TokenKind};
use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCategory, Position};

pub struct Parser<'d> {
    tokens: Vec<Token>,
    pos: usize,
    pub arena: Arena<ChtlNode>,
    diagnostics: &'d mut DiagnosticBag,
}

impl<'d> Parser<'d> {
    pub fn new(tokens: Vec<Token>, diagnostics: &'d mut DiagnosticBag) -> Self {
        Self {
            tokens,
            pos: 0,
            arena: Arena::new(),
            diagnostics,
        }
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

    fn skip_trivia(&mut self) {
        while matches!(
            self.peek(),
            TokenKind::LineComment(_) | TokenKind::BlockComment(_)
        ) {
            self.advance();
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(
            DiagnosticCategory::Syntax,
            message,
            self.position(),
        ));
    }

    fn expect_punct(&mut self, c: char) -> bool {
        self.skip_trivia();
        if matches!(self.peek(), TokenKind::Punct(p) if *p == c) {
            self.advance();
            true
        } else {
            self.error(format!("expected '{c}'"));
            false
        }
    }

    /// Synchronize to the next top-level boundary: a `}` that returns us to
    /// depth 0, or a `;`.
    fn synchronize(&mut self) {
        let mut depth = 0i32;
        loop {
            match self.peek() {
                TokenKind::Eof => return,
                TokenKind::Punct('{') => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::Punct('}') => {
                    self.advance();
                    if depth <= 0 {
                        return;
                    }
                    depth -= 1;
                }
                TokenKind::Punct(';') if depth == 0 => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// *program* = { top-level } EOF
    pub fn parse_program(&mut self) -> Vec<Node> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            if self.is_eof() {
                break;
            }
            match self.parse_top_level() {
                Some(node) => items.push(node),
                None => self.synchronize(),
            }
        }
        items
    }

    /// *top-level* = use-stmt | import | namespace | configuration |
    /// template-def | custom-def | origin-def | element
    fn parse_top_level(&mut self) -> Option<Node> {
        self.skip_trivia();
        match self.peek().clone() {
            TokenKind::Keyword(k) if k == "use" => self.parse_use_stmt(),
            TokenKind::BlockOpener(name) => match name.as_str() {
                "Import" => self.parse_import(),
                "Namespace" => self.parse_namespace(),
                "Configuration" => self.parse_configuration(),
                "Template" => self.parse_def(false),
                "Custom" => self.parse_def(true),
                "Origin" => self.parse_origin(),
                _ => {
                    self.error(format!("unexpected block opener [{name}]"));
                    None
                }
            },
            TokenKind::GeneratorComment(text) => {
                self.advance();
                Some(self.arena.alloc(ChtlNode::GeneratorComment { text }))
            }
            TokenKind::Keyword(k) if k == "except" => self.parse_constraint(),
            TokenKind::Identifier(_) => self.parse_element(),
            other => {
                self.error(format!("unexpected token at top level: {other:?}"));
                None
            }
        }
    }

    fn parse_use_stmt(&mut self) -> Option<Node> {
        self.advance(); // `use`
        // `use html5;` — recorded informationally, not a distinct AST node.
        while !matches!(self.peek(), TokenKind::Punct(';') | TokenKind::Eof) {
            self.advance();
        }
        if matches!(self.peek(), TokenKind::Punct(';')) {
            self.advance();
        }
        Some(self.arena.alloc(ChtlNode::GeneratorComment { text: String::new() }))
    }

    /// *element* = tag-name `{` { attribute | child } `}`
    fn parse_element(&mut self) -> Option<Node> {
        let tag = match self.advance() {
            TokenKind::Identifier(name) => name,
            other => {
                self.error(format!("expected element tag name, found {other:?}"));
                return None;
            }
        };
        if !self.expect_punct('{') {
            return None;
        }

        let mut attributes: IndexMap<String, String> = IndexMap::new();
        let mut children = Vec::new();
        let is_void = catalogue::is_void(&tag);

        loop {
            self.skip_trivia();
            if matches!(self.peek(), TokenKind::Punct('}') | TokenKind::Eof) {
                break;
            }
            if self.looks_like_attribute() {
                if let Some((name, value)) = self.parse_attribute() {
                    if attributes.contains_key(&name) {
                        self.error(format!("duplicate attribute `{name}`"));
                    } else {
                        attributes.insert(name, value);
                    }
                }
            } else if let Some(child) = self.parse_child() {
                if is_void {
                    self.error(format!("void element `<{tag}>` cannot have children"));
                } else {
                    children.push(child);
                }
            } else {
                self.synchronize();
            }
        }
        self.expect_punct('}');

        Some(self.arena.alloc(ChtlNode::Element { tag, attributes, children }))
    }

    /// An attribute is `identifier (':'|'=') value ';'`; lookahead for the
    /// identifier-then-colon-or-equals shape distinguishes it from a child
    /// element/keyword.
    fn looks_like_attribute(&self) -> bool {
        matches!(self.peek(), TokenKind::Identifier(_))
            && matches!(self.peek_at(1), TokenKind::Punct(':') | TokenKind::Punct('='))
    }

    fn parse_attribute(&mut self) -> Option<(String, String)> {
        let name = match self.advance() {
            TokenKind::Identifier(n) => n,
            _ => return None,
        };
        self.advance(); // ':' or '=' — CE-equivalence rule, both mean the same relation
        let value = self.parse_value_text();
        self.expect_punct(';');
        Some((name, value))
    }

    /// Reads an attribute/property value as either a quoted string or a run
    /// of unquoted-literal/identifier/number tokens until `;`.
    fn parse_value_text(&mut self) -> String {
        match self.peek().clone() {
            TokenKind::StringLiteral(s) => {
                self.advance();
                s
            }
            _ => {
                let mut parts = Vec::new();
                while !matches!(self.peek(), TokenKind::Punct(';') | TokenKind::Punct('}') | TokenKind::Eof) {
                    match self.advance() {
                        TokenKind::Identifier(s)
                        | TokenKind::UnquotedLiteral(s)
                        | TokenKind::Number(s)
                        | TokenKind::StringLiteral(s) => parts.push(s),
                        TokenKind::Punct(c) => parts.push(c.to_string()),
                        _ => {}
                    }
                }
                parts.join(" ")
            }
        }
    }

    fn parse_child(&mut self) -> Option<Node> {
        self.skip_trivia();
        match self.peek().clone() {
            TokenKind::Keyword(k) if k == "text" => self.parse_text_block(),
            TokenKind::Keyword(k) if k == "style" => self.parse_style_block(),
            TokenKind::Keyword(k) if k == "script" => self.parse_script_block(),
            TokenKind::Keyword(k) if k == "except" => self.parse_constraint(),
            TokenKind::TypeSigil(sigil) => self.parse_invoke(sigil),
            TokenKind::BlockOpener(name) if name == "Origin" => self.parse_origin(),
            TokenKind::GeneratorComment(text) => {
                self.advance();
                Some(self.arena.alloc(ChtlNode::GeneratorComment { text }))
            }
            TokenKind::Identifier(_) => self.parse_element(),
            other => {
                self.error(format!("unexpected token in element body: {other:?}"));
                None
            }
        }
    }

    fn parse_text_block(&mut self) -> Option<Node> {
        self.advance(); // `text`
        if !self.expect_punct('{') {
            return None;
        }
        let content = match self.peek().clone() {
            TokenKind::StringLiteral(s) => {
                self.advance();
                s
            }
            _ => {
                let mut parts = Vec::new();
                while !matches!(self.peek(), TokenKind::Punct('}') | TokenKind::Eof) {
                    match self.advance() {
                        TokenKind::Identifier(s) | TokenKind::UnquotedLiteral(s) | TokenKind::Number(s) => {
                            parts.push(s)
                        }
                        _ => {}
                    }
                }
                parts.join(" ")
            }
        };
        self.expect_punct('}');
        Some(self.arena.alloc(ChtlNode::Text { content }))
    }

    /// *style* block: selector kind derived from a leading `.`/`#` selector
    /// token, a bare element tag, or `&` (contextual); an inline block with
    /// no selector holds direct properties.
    fn parse_style_block(&mut self) -> Option<Node> {
        self.advance(); // `style`
        if !self.expect_punct('{') {
            return None;
        }
        let (selector, properties, style_invocations) = self.parse_style_body();
        self.expect_punct('}');
        Some(self.arena.alloc(ChtlNode::StyleBlock {
            selector,
            properties,
            style_invocations,
        }))
    }

    fn parse_style_body(&mut self) -> (SelectorKind, IndexMap<String, String>, Vec<String>) {
        let mut properties = IndexMap::new();
        let mut style_invocations = Vec::new();
        let mut selector = SelectorKind::Inline;

        loop {
            self.skip_trivia();
            match self.peek().clone() {
                TokenKind::Punct('}') | TokenKind::Eof => break,
                TokenKind::Selector(sel) => {
                    self.advance();
                    selector = if let Some(name) = sel.strip_prefix('.') {
                        SelectorKind::Class(name.to_string())
                    } else {
                        SelectorKind::Id(sel.trim_start_matches('#').to_string())
                    };
                    // Nested `{ … }` for a class/id rule inside the style block.
                    if self.expect_punct('{') {
                        let (_, nested_props, nested_invokes) = self.parse_style_body();
                        self.expect_punct('}');
                        properties.extend(nested_props);
                        style_invocations.extend(nested_invokes);
                    }
                }
                TokenKind::Punct('&') => {
                    self.advance();
                    selector = SelectorKind::Contextual;
                    if self.expect_punct('{') {
                        let (_, nested_props, nested_invokes) = self.parse_style_body();
                        self.expect_punct('}');
                        properties.extend(nested_props);
                        style_invocations.extend(nested_invokes);
                    }
                }
                TokenKind::TypeSigil(sigil) if sigil == "Style" => {
                    self.advance();
                    if let TokenKind::Identifier(name) = self.advance() {
                        style_invocations.push(name);
                    }
                    if matches!(self.peek(), TokenKind::Punct(';')) {
                        self.advance();
                    }
                }
                TokenKind::Identifier(prop) => {
                    self.advance();
                    if matches!(self.peek(), TokenKind::Punct(':') | TokenKind::Punct('=')) {
                        self.advance();
                        let value = self.parse_value_text();
                        if matches!(self.peek(), TokenKind::Punct(';')) {
                            self.advance();
                        }
                        properties.insert(catalogue::canonicalize_property(&prop), value);
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
        (selector, properties, style_invocations)
    }

    fn parse_script_block(&mut self) -> Option<Node> {
        self.advance(); // `script`
        if !self.expect_punct('{') {
            return None;
        }
        // Raw CHTL-JS source is captured verbatim until the matching `}`,
        // tracking brace depth so nested object literals (`listen { … }`)
        // don't terminate the block early.
        let mut depth = 1i32;
        let mut raw = String::new();
        loop {
            match self.peek().clone() {
                TokenKind::Eof => break,
                TokenKind::Punct('{') => {
                    depth += 1;
                    raw.push('{');
                    self.advance();
                }
                TokenKind::Punct('}') => {
                    depth -= 1;
                    self.advance();
                    if depth == 0 {
                        break;
                    }
                    raw.push('}');
                }
                other => {
                    raw.push_str(&token_text(&other));
                    raw.push(' ');
                    self.advance();
                }
            }
        }
        Some(self.arena.alloc(ChtlNode::ScriptBlock { raw_source: raw }))
    }

    /// *custom-invoke* = `@Element` name `;` (or with block for inline specialization)
    fn parse_invoke(&mut self, sigil: String) -> Option<Node> {
        self.advance(); // the sigil token
        let kind = match sigil.as_str() {
            "Style" => DefKind::Style,
            "Element" => DefKind::Element,
            "Var" => DefKind::Var,
            other => {
                self.error(format!("unknown type sigil @{other} in invoke position"));
                return None;
            }
        };
        let name = match self.advance() {
            TokenKind::Identifier(n) => n,
            other => {
                self.error(format!("expected name after @{sigil}, found {other:?}"));
                return None;
            }
        };
        let mut inline_specializations = Vec::new();
        if matches!(self.peek(), TokenKind::Punct('{')) {
            self.advance();
            inline_specializations = self.parse_specialization_ops();
            self.expect_punct('}');
        } else {
            self.expect_punct(';');
        }
        Some(self.arena.alloc(ChtlNode::Invoke {
            kind,
            is_custom: !inline_specializations.is_empty(),
            name,
            inline_specializations,
        }))
    }

    fn parse_def(&mut self, is_custom: bool) -> Option<Node> {
        self.advance(); // `[Template]`/`[Custom]`
        let sigil = match self.advance() {
            TokenKind::TypeSigil(s) => s,
            other => {
                self.error(format!("expected type sigil after block opener, found {other:?}"));
                return None;
            }
        };
        let resolved_kind = match sigil.as_str() {
            "Style" => DefKind::Style,
            "Element" => DefKind::Element,
            "Var" => DefKind::Var,
            _ => DefKind::Element,
        };
        let name = match self.advance() {
            TokenKind::Identifier(n) => n,
            other => {
                self.error(format!("expected definition name, found {other:?}"));
                return None;
            }
        };

        let mut inherits = None;
        if matches!(self.peek(), TokenKind::Keyword(k) if k == "inherit") {
            self.advance();
            if let TokenKind::Identifier(parent) = self.advance() {
                inherits = Some(parent);
            }
        }

        if !self.expect_punct('{') {
            return None;
        }

        if is_custom {
            let (body, specializations) = self.parse_custom_body(resolved_kind);
            self.expect_punct('}');
            Some(self.arena.alloc(ChtlNode::Custom {
                kind: resolved_kind,
                name,
                inherits,
                body,
                specializations,
            }))
        } else {
            let body = self.parse_template_body(resolved_kind);
            self.expect_punct('}');
            Some(self.arena.alloc(ChtlNode::Template {
                kind: resolved_kind,
                name,
                inherits,
                body,
            }))
        }
    }

    fn parse_template_body(&mut self, kind: DefKind) -> Vec<Node> {
        match kind {
            DefKind::Element => {
                let mut children = Vec::new();
                loop {
                    self.skip_trivia();
                    if matches!(self.peek(), TokenKind::Punct('}') | TokenKind::Eof) {
                        break;
                    }
                    match self.parse_child() {
                        Some(n) => children.push(n),
                        None => self.synchronize(),
                    }
                }
                children
            }
            DefKind::Style | DefKind::Var => {
                let (_, properties, _) = self.parse_style_body();
                properties
                    .into_iter()
                    .map(|(name, value)| self.arena.alloc(ChtlNode::Invoke {
                        kind,
                        is_custom: false,
                        name: format!("{name}={value}"),
                        inline_specializations: Vec::new(),
                    }))
                    .collect()
            }
        }
    }

    /// `[Custom]` bodies mix bare definitions (same shape as a template
    /// body) with specialization operations; productions are told apart by
    /// leading keyword (`delete`, `insert`, `replace`, `at`).
    fn parse_custom_body(&mut self, kind: DefKind) -> (Vec<Node>, Vec<SpecializationOp>) {
        let mut body = Vec::new();
        let mut specializations = Vec::new();
        loop {
            self.skip_trivia();
            if matches!(self.peek(), TokenKind::Punct('}') | TokenKind::Eof) {
                break;
            }
            if let Some(op) = self.try_parse_specialization_keyword() {
                specializations.push(op);
                continue;
            }
            match kind {
                DefKind::Style | DefKind::Var => {
                    if let TokenKind::Identifier(prop) = self.peek().clone() {
                        if matches!(self.peek_at(1), TokenKind::Punct(':') | TokenKind::Punct('=')) {
                            self.advance();
                            self.advance();
                            let value = self.parse_value_text();
                            if matches!(self.peek(), TokenKind::Punct(';')) {
                                self.advance();
                            }
                            body.push(self.arena.alloc(ChtlNode::Invoke {
                                kind,
                                is_custom: false,
                                name: format!("{}={value}", catalogue::canonicalize_property(&prop)),
                                inline_specializations: Vec::new(),
                            }));
                            continue;
                        }
                    }
                    self.advance();
                }
                DefKind::Element => match self.parse_child() {
                    Some(n) => body.push(n),
                    None => self.synchronize(),
                },
            }
        }
        (body, specializations)
    }

    /// Parses one `delete`/`replace`/`insert`/`at top|bottom` production, or
    /// returns `None` if the current token doesn't start one (a bare
    /// property assignment in that case, handled by the caller).
    fn try_parse_specialization_keyword(&mut self) -> Option<SpecializationOp> {
        match self.peek().clone() {
            TokenKind::Keyword(k) if k == "delete" => {
                self.advance();
                let target = self.read_dotted_name();
                self.expect_punct(';');
                Some(SpecializationOp::Delete { target })
            }
            TokenKind::Keyword(k) if k == "replace" => {
                self.advance();
                let target = self.read_dotted_name();
                if self.expect_punct('{') {
                    let body = self.parse_generic_body();
                    self.expect_punct('}');
                    Some(SpecializationOp::Replace { target, body })
                } else {
                    None
                }
            }
            TokenKind::Keyword(k) if k == "insert" => {
                self.advance();
                let after = matches!(self.peek(), TokenKind::Keyword(k) if k == "after");
                self.advance(); // `after`/`before`
                let target = self.read_dotted_name();
                if self.expect_punct('{') {
                    let body = self.parse_generic_body();
                    self.expect_punct('}');
                    Some(if after {
                        SpecializationOp::InsertAfter { target, body }
                    } else {
                        SpecializationOp::InsertBefore { target, body }
                    })
                } else {
                    None
                }
            }
            TokenKind::Keyword(k) if k == "at" => {
                self.advance();
                let top = matches!(self.peek(), TokenKind::Keyword(k) if k == "top");
                self.advance(); // `top`/`bottom`
                if self.expect_punct('{') {
                    let body = self.parse_generic_body();
                    self.expect_punct('}');
                    Some(if top {
                        SpecializationOp::AtTop { body }
                    } else {
                        SpecializationOp::AtBottom { body }
                    })
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn parse_specialization_ops(&mut self) -> Vec<SpecializationOp> {
        let mut ops = Vec::new();
        loop {
            self.skip_trivia();
            if matches!(self.peek(), TokenKind::Punct('}') | TokenKind::Eof) {
                break;
            }
            if let Some(op) = self.try_parse_specialization_keyword() {
                ops.push(op);
                continue;
            }
            match self.peek().clone() {
                TokenKind::Identifier(prop) => {
                    self.advance();
                    if matches!(self.peek(), TokenKind::Punct(':') | TokenKind::Punct('=')) {
                        self.advance();
                        let value = self.parse_value_text();
                        if matches!(self.peek(), TokenKind::Punct(';')) {
                            self.advance();
                        }
                        ops.push(SpecializationOp::Property { name: prop, value });
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
        ops
    }

    fn parse_generic_body(&mut self) -> Vec<Node> {
        let mut body = Vec::new();
        loop {
            self.skip_trivia();
            if matches!(self.peek(), TokenKind::Punct('}') | TokenKind::Eof) {
                break;
            }
            match self.parse_child() {
                Some(n) => body.push(n),
                None => self.synchronize(),
            }
        }
        body
    }

    fn read_dotted_name(&mut self) -> String {
        let mut parts = Vec::new();
        loop {
            match self.peek().clone() {
                TokenKind::Identifier(s) | TokenKind::Keyword(s) => {
                    self.advance();
                    parts.push(s);
                    if matches!(self.peek(), TokenKind::Punct('.')) {
                        self.advance();
                        continue;
                    }
                    break;
                }
                TokenKind::Selector(s) => {
                    self.advance();
                    parts.push(s);
                    break;
                }
                _ => break,
            }
        }
        parts.join(".")
    }

    fn parse_origin(&mut self) -> Option<Node> {
        self.advance(); // `[Origin]`
        let lang = match self.advance() {
            TokenKind::TypeSigil(s) => match s.as_str() {
                "Html" => OriginLang::Html,
                "Style" => OriginLang::Style,
                "JavaScript" => OriginLang::JavaScript,
                other => OriginLang::Custom(other.to_string()),
            },
            TokenKind::Identifier(s) => OriginLang::Custom(s),
            other => {
                self.error(format!("expected origin language tag, found {other:?}"));
                return None;
            }
        };
        let alias = if let TokenKind::Identifier(name) = self.peek().clone() {
            self.advance();
            Some(name)
        } else {
            None
        };
        if !self.expect_punct('{') {
            return None;
        }
        let mut depth = 1i32;
        let mut raw = String::new();
        loop {
            match self.peek().clone() {
                TokenKind::Eof => break,
                TokenKind::Punct('{') => {
                    depth += 1;
                    raw.push('{');
                    self.advance();
                }
                TokenKind::Punct('}') => {
                    depth -= 1;
                    self.advance();
                    if depth == 0 {
                        break;
                    }
                    raw.push('}');
                }
                other => {
                    raw.push_str(&token_text(&other));
                    raw.push(' ');
                    self.advance();
                }
            }
        }
        Some(self.arena.alloc(ChtlNode::Origin {
            lang,
            alias,
            raw_content: raw,
        }))
    }

    fn parse_import(&mut self) -> Option<Node> {
        self.advance(); // `[Import]`
        let kind = match self.advance() {
            TokenKind::TypeSigil(s) => match s.as_str() {
                "Html" => ImportKind::Html,
                "Style" => ImportKind::Style,
                "JavaScript" => ImportKind::JavaScript,
                "Chtl" => ImportKind::Chtl,
                "CJmod" => ImportKind::CJmod,
                "Config" => ImportKind::Config,
                _ => ImportKind::Chtl,
            },
            TokenKind::BlockOpener(name) => {
                let def_kind = match self.advance() {
                    TokenKind::TypeSigil(s) if s == "Style" => DefKind::Style,
                    TokenKind::TypeSigil(s) if s == "Var" => DefKind::Var,
                    _ => DefKind::Element,
                };
                ImportKind::Targeted {
                    def_kind,
                    is_custom: name == "Custom",
                }
            }
            other => {
                self.error(format!("expected import type, found {other:?}"));
                return None;
            }
        };

        let target = if let TokenKind::Identifier(name) = self.peek().clone() {
            self.advance();
            Some(name)
        } else {
            None
        };

        if !matches!(self.peek(), TokenKind::Keyword(k) if k == "from") {
            self.error("expected `from` in import statement");
        } else {
            self.advance();
        }

        let source_path = self.read_import_path();

        let alias = if matches!(self.peek(), TokenKind::Keyword(k) if k == "as") {
            self.advance();
            if let TokenKind::Identifier(name) = self.advance() {
                Some(name)
            } else {
                None
            }
        } else {
            None
        };

        if matches!(kind, ImportKind::Html | ImportKind::Style | ImportKind::JavaScript) && alias.is_none() {
            self.diagnostics.push(Diagnostic::warning(
                DiagnosticCategory::Import,
                "raw-file import requires an `as ALIAS` clause; skipping",
                self.position(),
            ));
        }

        if matches!(self.peek(), TokenKind::Punct(';')) {
            self.advance();
        }

        Some(self.arena.alloc(ChtlNode::Import {
            kind,
            target,
            source_path,
            alias,
            resolved_path: None,
        }))
    }

    fn read_import_path(&mut self) -> String {
        let mut parts = Vec::new();
        loop {
            match self.peek().clone() {
                TokenKind::Identifier(s) | TokenKind::UnquotedLiteral(s) | TokenKind::StringLiteral(s) => {
                    self.advance();
                    parts.push(s);
                }
                TokenKind::Punct(c) if c == '.' || c == '/' => {
                    self.advance();
                    parts.push(c.to_string());
                }
                _ => break,
            }
        }
        parts.join("")
    }

    fn parse_namespace(&mut self) -> Option<Node> {
        self.advance(); // `[Namespace]`
        let mut path = Vec::new();
        loop {
            match self.advance() {
                TokenKind::Identifier(s) => path.push(s),
                other => {
                    self.error(format!("expected namespace path segment, found {other:?}"));
                    return None;
                }
            }
            if matches!(self.peek(), TokenKind::Punct('.')) {
                self.advance();
                continue;
            }
            break;
        }
        if !self.expect_punct('{') {
            return None;
        }
        let mut body = Vec::new();
        loop {
            self.skip_trivia();
            if matches!(self.peek(), TokenKind::Punct('}') | TokenKind::Eof) {
                break;
            }
            match self.parse_top_level() {
                Some(n) => body.push(n),
                None => self.synchronize(),
            }
        }
        self.expect_punct('}');
        Some(self.arena.alloc(ChtlNode::Namespace { path, body }))
    }

    fn parse_configuration(&mut self) -> Option<Node> {
        self.advance(); // `[Configuration]`
        if !self.expect_punct('{') {
            return None;
        }
        let mut options = IndexMap::new();
        let mut name_groups = IndexMap::new();
        let origin_types = IndexMap::new();
        loop {
            self.skip_trivia();
            match self.peek().clone() {
                TokenKind::Punct('}') | TokenKind::Eof => break,
                TokenKind::Identifier(key) => {
                    self.advance();
                    if matches!(self.peek(), TokenKind::Punct(':') | TokenKind::Punct('=')) {
                        self.advance();
                        let value = self.parse_value_text();
                        if matches!(self.peek(), TokenKind::Punct(';')) {
                            self.advance();
                        }
                        if key.starts_with("KEYWORD_")
                            || key.starts_with("CUSTOM_")
                            || key.starts_with("TEMPLATE_")
                            || key.starts_with("ORIGIN_")
                            || key.starts_with("IMPORT_")
                            || key == "CONFIGURATION_CONFIG"
                        {
                            name_groups.insert(key, value);
                        } else {
                            options.insert(key, value);
                        }
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
        self.expect_punct('}');
        Some(self.arena.alloc(ChtlNode::Configuration {
            options,
            name_groups,
            origin_types,
        }))
    }

    /// *constraint* = `except` name {`,` name} `;`
    fn parse_constraint(&mut self) -> Option<Node> {
        self.advance(); // `except`
        let mut prohibited = Vec::new();
        loop {
            match self.advance() {
                TokenKind::Identifier(name) | TokenKind::TypeSigil(name) => prohibited.push(name),
                _ => break,
            }
            if matches!(self.peek(), TokenKind::Punct(',')) {
                self.advance();
                continue;
            }
            break;
        }
        if matches!(self.peek(), TokenKind::Punct(';')) {
            self.advance();
        }
        Some(self.arena.alloc(ChtlNode::Constraint {
            prohibited,
            scope: ConstraintScope::Local,
        }))
    }
}

fn token_text(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Identifier(s)
        | TokenKind::UnquotedLiteral(s)
        | TokenKind::Number(s)
        | TokenKind::StringLiteral(s) => s.clone(),
        TokenKind::Punct(c) => c.to_string(),
        TokenKind::Selector(s) => s.clone(),
        TokenKind::Keyword(s) => s.clone(),
        TokenKind::TypeSigil(s) => format!("@{s}"),
        TokenKind::BlockOpener(s) => format!("[{s}]"),
        TokenKind::GeneratorComment(s) => format!("--{s}"),
        TokenKind::LineComment(s) | TokenKind::BlockComment(s) => s.clone(),
        TokenKind::Eof => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chtl::lexer::tokenize;

    #[test]
    fn parses_minimal_element_tree() {
        let mut bag = DiagnosticBag::default();
        let tokens = tokenize("html { body { h1 { text { Hello } } } }", &mut bag);
        let mut parser = Parser::new(tokens, &mut bag);
        let items = parser.parse_program();
        assert_eq!(items.len(), 1);
        let (tag, _, children) = parser.arena.get(items[0]).as_element().unwrap();
        assert_eq!(tag, "html");
        assert_eq!(children.len(), 1);
        assert!(!bag.has_errors());
    }

    #[test]
    fn parses_attributes_and_rejects_duplicates() {
        let mut bag = DiagnosticBag::default();
        let tokens = tokenize("div { id: a; id: b; }", &mut bag);
        let mut parser = Parser::new(tokens, &mut bag);
        let items = parser.parse_program();
        let (_, attrs, _) = parser.arena.get(items[0]).as_element().unwrap();
        assert_eq!(attrs.get("id").unwrap(), "a");
        assert!(bag.has_errors());
    }

    #[test]
    fn parses_template_and_custom_definitions() {
        let source = "[Template] @Style Btn { background: blue; color: white; }\n\
                       button { style { @Style Btn; } text { Go } }";
        let mut bag = DiagnosticBag::default();
        let tokens = tokenize(source, &mut bag);
        let mut parser = Parser::new(tokens, &mut bag);
        let items = parser.parse_program();
        assert_eq!(items.len(), 2);
        assert!(matches!(parser.arena.get(items[0]), ChtlNode::Template { .. }));
        assert!(!bag.has_errors());
    }
}
