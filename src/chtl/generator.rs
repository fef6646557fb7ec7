//! Code Generator (component C5): walks the resolved CHTL tree and emits
//! `(html, css, js)` strings, per spec.md §4.C5.
//!
//! Grounded on the teacher's `transform/mod.rs` walk-and-emit pass: one
//! recursive function per node shape, a mutable output buffer threaded down
//! instead of a visitor trait, and the same "collect side-output as you
//! descend, flush once at the end" pattern the teacher uses for its
//! generated-import list (here: the CSS and raw-JS buffers).

use indexmap::IndexMap;

use crate::arena::Arena;
use crate::catalogue;
use crate::chtl::ast::{ChtlNode, DefKind, Node, OriginLang, SelectorKind};
use crate::chtl::template_engine::TemplateEngine;
use crate::config::CompilerConfig;
use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCategory, Position};

/// Accumulated output of one generation pass.
#[derive(Debug, Default)]
pub struct GeneratedOutput {
    pub html: String,
    pub css: String,
    /// Raw CHTL-JS source fragments in document order; the CHTL-JS pipeline
    /// (J1-J4) compiles these separately and the dispatcher (D) splices the
    /// resulting JS back in.
    pub script_fragments: Vec<String>,
}

pub struct Generator<'s, 'c> {
    engine: &'s TemplateEngine<'s>,
    config: &'c CompilerConfig,
}

impl<'s, 'c> Generator<'s, 'c> {
    pub fn new(engine: &'s TemplateEngine<'s>, config: &'c CompilerConfig) -> Self {
        Self { engine, config }
    }

    /// Emit the whole program. Top-level `html`/`head`/`body` elements are
    /// passed through verbatim (spec.md §6); anything else is wrapped in a
    /// synthetic document shell is left to the dispatcher, not this function.
    pub fn generate(
        &mut self,
        arena: &mut Arena<ChtlNode>,
        program: &[Node],
        diagnostics: &mut DiagnosticBag,
    ) -> GeneratedOutput {
        let mut out = GeneratedOutput::default();
        for &node in program {
            self.emit_top_level(arena, node, &mut out, diagnostics);
        }
        out
    }

    fn emit_top_level(
        &mut self,
        arena: &mut Arena<ChtlNode>,
        node: Node,
        out: &mut GeneratedOutput,
        diagnostics: &mut DiagnosticBag,
    ) {
        match arena.get(node).clone() {
            ChtlNode::Template { .. } | ChtlNode::Custom { .. } => {
                // Definitions produce no direct output; they're consulted
                // through the symbol table at invocation sites.
            }
            ChtlNode::Namespace { body, .. } => {
                for child in body {
                    self.emit_top_level(arena, child, out, diagnostics);
                }
            }
            ChtlNode::Configuration { .. } | ChtlNode::Constraint { .. } => {}
            ChtlNode::Import { .. } => {
                // Resolution is the Import Resolver's job (C4); nothing to
                // emit here once a use-site references the imported symbol.
            }
            ChtlNode::Origin { lang, raw_content, .. } => match lang {
                OriginLang::Html => out.html.push_str(&raw_content),
                OriginLang::Style => out.css.push_str(&raw_content),
                OriginLang::JavaScript => out.script_fragments.push(raw_content),
                OriginLang::Custom(_) => out.html.push_str(&raw_content),
            },
            _ => {
                self.emit_element_like(arena, node, out, diagnostics);
                out.html.push('\n');
            }
        }
    }

    /// Emit one element-like node (`Element`, `Text`, `GeneratorComment`,
    /// `Invoke`) into `out.html`.
    fn emit_element_like(
        &mut self,
        arena: &mut Arena<ChtlNode>,
        node: Node,
        out: &mut GeneratedOutput,
        diagnostics: &mut DiagnosticBag,
    ) {
        match arena.get(node).clone() {
            ChtlNode::Text { content } => {
                out.html.push_str(&escape_text(&content));
            }
            ChtlNode::GeneratorComment { text } => {
                out.html.push_str("<!-- ");
                out.html.push_str(&text);
                out.html.push_str(" -->");
            }
            ChtlNode::Element { tag, attributes, children } => {
                self.emit_element(arena, &tag, attributes, &children, out, diagnostics);
            }
            ChtlNode::Invoke { kind, is_custom: _, name, inline_specializations } => {
                if kind == DefKind::Element {
                    let resolved = self.engine.resolve_element(arena, kind, &name, &inline_specializations, diagnostics);
                    for child in resolved {
                        self.emit_element_like(arena, child, out, diagnostics);
                    }
                }
            }
            ChtlNode::ScriptBlock { raw_source } => {
                out.script_fragments.push(raw_source);
            }
            _ => {}
        }
    }

    fn emit_element(
        &mut self,
        arena: &mut Arena<ChtlNode>,
        tag: &str,
        mut attributes: IndexMap<String, String>,
        children: &[Node],
        out: &mut GeneratedOutput,
        diagnostics: &mut DiagnosticBag,
    ) {
        // First pass: collect local style blocks so auto class/id injection
        // (spec.md invariant 5 / Open Question 2) can union with whatever
        // the author already wrote on the element.
        let mut inline_style_props: IndexMap<String, String> = IndexMap::new();
        let mut hoisted_rules: Vec<(String, IndexMap<String, String>)> = Vec::new();
        let auto_add_class = !self.config.configuration.option("DISABLE_STYLE_AUTO_ADD_CLASS");
        let auto_add_id = !self.config.configuration.option("DISABLE_STYLE_AUTO_ADD_ID");

        for &child in children {
            if let ChtlNode::StyleBlock { selector, properties, style_invocations } = arena.get(child).clone() {
                let mut resolved_props = properties.clone();
                for invoked in &style_invocations {
                    let extra = self.engine.resolve_style(arena, DefKind::Style, invoked, &[], diagnostics);
                    for (k, v) in extra {
                        resolved_props.entry(k).or_insert(v);
                    }
                }
                match selector {
                    SelectorKind::Inline => inline_style_props.extend(resolved_props),
                    SelectorKind::Class(name) => {
                        // Auto class injection (spec.md invariant 5, Open
                        // Question 2): a local `.name { … }` style rule
                        // implicitly adds `class="name"` to the enclosing
                        // element, unioned with any class already present.
                        if auto_add_class {
                            union_attribute(&mut attributes, "class", &name);
                        }
                        hoisted_rules.push((format!(".{name}"), resolved_props));
                    }
                    SelectorKind::Id(name) => {
                        if auto_add_id {
                            union_attribute(&mut attributes, "id", &name);
                        }
                        hoisted_rules.push((format!("#{name}"), resolved_props));
                    }
                    SelectorKind::Element(name) => hoisted_rules.push((name, resolved_props)),
                    SelectorKind::Contextual => {
                        let selector_text = contextual_selector(tag, &attributes);
                        hoisted_rules.push((selector_text, resolved_props));
                    }
                }
            }
        }

        for (selector, props) in hoisted_rules {
            out.css.push_str(&selector);
            out.css.push_str(" { ");
            for (k, v) in &props {
                out.css.push_str(k);
                out.css.push_str(": ");
                out.css.push_str(v);
                out.css.push_str("; ");
            }
            out.css.push_str("}\n");
        }

        if !inline_style_props.is_empty() {
            let mut style_attr = String::new();
            for (k, v) in &inline_style_props {
                style_attr.push_str(k);
                style_attr.push_str(": ");
                style_attr.push_str(v);
                style_attr.push_str("; ");
            }
            union_attribute_overwrite(&mut attributes, "style", style_attr.trim_end());
        }

        out.html.push('<');
        out.html.push_str(tag);
        for (key, value) in &attributes {
            out.html.push(' ');
            out.html.push_str(key);
            out.html.push_str("=\"");
            out.html.push_str(&escape_attribute(value));
            out.html.push('"');
        }

        if catalogue::is_void(tag) {
            if !children.is_empty() {
                diagnostics.push(Diagnostic::warning(
                    DiagnosticCategory::Constraint,
                    format!("void element `<{tag}>` cannot have children; children ignored"),
                    Position::default(),
                ));
            }
            out.html.push_str(" />");
            return;
        }

        out.html.push('>');
        for &child in children {
            match arena.get(child) {
                ChtlNode::StyleBlock { .. } => {} // already consumed above
                _ => self.emit_element_like(arena, child, out, diagnostics),
            }
        }
        out.html.push_str("</");
        out.html.push_str(tag);
        out.html.push('>');
    }
}

/// `&` resolves to the enclosing element's class if present, else its id,
/// else its tag name (spec.md invariant 5 / §4.C5).
fn contextual_selector(tag: &str, attributes: &IndexMap<String, String>) -> String {
    if let Some(class) = attributes.get("class") {
        let first = class.split_whitespace().next().unwrap_or(tag);
        format!(".{first}")
    } else if let Some(id) = attributes.get("id") {
        format!("#{id}")
    } else {
        tag.to_string()
    }
}

fn union_attribute(attributes: &mut IndexMap<String, String>, key: &str, value: &str) {
    match attributes.get_mut(key) {
        Some(existing) => {
            if !existing.split_whitespace().any(|t| t == value) {
                existing.push(' ');
                existing.push_str(value);
            }
        }
        None => {
            attributes.insert(key.to_string(), value.to_string());
        }
    }
}

fn union_attribute_overwrite(attributes: &mut IndexMap<String, String>, key: &str, value: &str) {
    attributes.insert(key.to_string(), value.to_string());
}

fn escape_text(input: &str) -> String {
    input.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attribute(input: &str) -> String {
    input.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chtl::lexer::tokenize;
    use crate::chtl::parser::Parser;
    use crate::chtl::template_engine::SymbolTable;

    fn generate(source: &str) -> GeneratedOutput {
        let mut bag = DiagnosticBag::default();
        let tokens = tokenize(source, &mut bag);
        let mut parser = Parser::new(tokens, &mut bag);
        let program = parser.parse_program();
        let mut arena = parser.arena;
        let symbols = SymbolTable::build(&arena, &program, &mut bag);
        let engine = TemplateEngine::new(&symbols);
        let config = CompilerConfig::default();
        let mut generator = Generator::new(&engine, &config);
        generator.generate(&mut arena, &program, &mut bag)
    }

    #[test]
    fn emits_minimal_element() {
        let out = generate("div { text { Hello } }");
        assert!(out.html.contains("<div>Hello</div>"));
    }

    #[test]
    fn void_element_self_closes() {
        let out = generate("img { src: \"a.png\"; }");
        assert!(out.html.contains("<img") && out.html.contains("/>"));
    }

    #[test]
    fn local_style_block_without_class_gets_auto_class_and_css_rule() {
        let out = generate("div { style { .card { color: red; } } }");
        assert!(out.html.contains("class=\"card"), "html was: {}", out.html);
        assert!(out.css.contains(".card"));
    }

    #[test]
    fn inline_style_block_serializes_to_style_attribute() {
        let out = generate("div { style { color: red; } }");
        assert!(out.html.contains("style=\"color: red"), "html was: {}", out.html);
    }
}
