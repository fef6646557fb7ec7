//! CHTL-JS Generator (component J4): lowers the CHTL-JS AST to plain
//! JavaScript, per spec.md §4.J4. Selector nodes compile to DOM lookups;
//! `listen` emits `addEventListener` directly on a single-element target
//! (id, indexed class/tag) or `.forEach`s over a collection target
//! (unindexed class/tag); `delegate` registrations accumulate in the
//! [`EventDelegateRegistry`] and are flushed once at the end; `vir` member
//! references are mangled to free functions via the [`ViewRegistry`]. Same
//! recursive emit-into-buffer shape as `chtl::generator`.

use crate::arena::Arena;
use crate::chtljs::ast::{AccessKind, JsNode, MemberType, Node};
use crate::chtljs::registries::{EventDelegateRegistry, ViewRegistry};
use crate::diagnostics::DiagnosticBag;

pub struct Generator<'r> {
    delegates: &'r mut EventDelegateRegistry,
    views: &'r ViewRegistry,
}

impl<'r> Generator<'r> {
    pub fn new(delegates: &'r mut EventDelegateRegistry, views: &'r ViewRegistry) -> Self {
        Self { delegates, views }
    }

    /// Emit one fragment's worth of CHTL-JS as JavaScript. Delegate
    /// registrations are accumulated, not emitted inline; the caller flushes
    /// `self.delegates.emit()` once after every fragment has been processed
    /// (spec.md §4.J3 — one listener per parent/event across the whole unit).
    pub fn generate(&mut self, arena: &Arena<JsNode>, program: &[Node], _diagnostics: &mut DiagnosticBag) -> String {
        let mut out = String::new();
        for &node in program {
            self.emit(arena, node, &mut out);
        }
        rewrite_vir_references(&out, self.views)
    }

    fn emit(&mut self, arena: &Arena<JsNode>, node: Node, out: &mut String) {
        match arena.get(node) {
            JsNode::Raw { text } => {
                out.push_str(text);
                out.push(' ');
            }
            JsNode::Selector { css_text, index } => {
                out.push_str(&selector_expr(css_text, *index));
            }
            JsNode::MemberAccess { object, property, access } => {
                self.emit(arena, *object, out);
                match access {
                    AccessKind::Dot | AccessKind::Arrow => out.push('.'),
                    AccessKind::Bracket => out.push('['),
                }
                out.push_str(property);
                if matches!(access, AccessKind::Bracket) {
                    out.push(']');
                }
            }
            JsNode::Call { callee, args } => {
                self.emit(arena, *callee, out);
                out.push('(');
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.emit(arena, arg, out);
                }
                out.push(')');
            }
            JsNode::Listen { target, events } => {
                let mut target_text = String::new();
                self.emit(arena, *target, &mut target_text);
                let is_collection = matches!(arena.get(*target), JsNode::Selector { css_text, index } if selector_is_collection(css_text, *index));
                for (event, handler) in events {
                    let mut handler_text = String::new();
                    self.emit(arena, *handler, &mut handler_text);
                    if is_collection {
                        out.push_str(&format!(
                            "{target_text}.forEach(function(__chtl_el) {{ __chtl_el.addEventListener({event:?}, {handler_text}); }});\n"
                        ));
                    } else {
                        out.push_str(&format!("{target_text}.addEventListener({event:?}, {handler_text});\n"));
                    }
                }
            }
            JsNode::Delegate { parent, targets, events } => {
                let mut parent_css = String::new();
                // Delegate's parent is always a direct `{{css}}` selector node.
                if let JsNode::Selector { css_text, .. } = arena.get(*parent) {
                    parent_css = css_text.clone();
                }
                for (event, handler) in events {
                    let mut handler_text = String::new();
                    self.emit(arena, *handler, &mut handler_text);
                    self.delegates.register(&parent_css, targets, event, handler_text.trim());
                }
            }
            JsNode::Animate {
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
            } => {
                let mut target_text = String::new();
                self.emit(arena, *target, &mut target_text);
                out.push_str(&format!("chtlAnimate({target_text}, {{\n"));
                self.emit_kw_opt(arena, "duration", duration, out);
                self.emit_kw_opt(arena, "easing", easing, out);
                self.emit_kw_opt(arena, "begin", begin, out);
                self.emit_kw_opt(arena, "end", end, out);
                self.emit_kw_opt(arena, "loop", loop_count, out);
                self.emit_kw_opt(arena, "direction", direction, out);
                self.emit_kw_opt(arena, "delay", delay, out);
                self.emit_kw_opt(arena, "callback", callback, out);
                if !when.is_empty() {
                    out.push_str("  when: [");
                    for (i, &w) in when.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        self.emit(arena, w, out);
                    }
                    out.push_str("],\n");
                }
                out.push_str("});\n");
            }
            JsNode::VirDecl { name, members } => {
                // Each callable member becomes a standalone mangled
                // function declared at the point of the original `vir`
                // binding (spec.md §4.J4): `vir box = bind({ show: fn })`
                // lowers to `function __vir_box_show() { return (fn)(); }`
                // style wrappers, one per member.
                for (member, kind) in members {
                    if let MemberType::Function(inner) = kind {
                        let mangled = ViewRegistry::mangled_name(name, member);
                        let mut inner_text = String::new();
                        self.emit(arena, *inner, &mut inner_text);
                        out.push_str(&format!(
                            "function {mangled}() {{ return ({inner_text}).apply(this, arguments); }}\n"
                        ));
                    }
                }
            }
            JsNode::VirMemberRef { vir_name, member } => {
                out.push_str(&ViewRegistry::mangled_name(vir_name, member));
            }
        }
    }

    fn emit_kw_opt(&mut self, arena: &Arena<JsNode>, key: &str, value: &Option<Node>, out: &mut String) {
        if let Some(node) = value {
            out.push_str("  ");
            out.push_str(key);
            out.push_str(": ");
            self.emit(arena, *node, out);
            out.push_str(",\n");
        }
    }
}

/// Whether [`selector_expr`] lowers `(css_text, index)` to an array (so a
/// consumer must `.forEach` over it) rather than a single element. Mirrors
/// `selector_expr`'s own branching exactly — unindexed class/tag lookups
/// return a live `NodeList`-turned-array, everything else (an index, an id,
/// or the id-then-class probe) resolves to at most one element.
fn selector_is_collection(css_text: &str, index: Option<i64>) -> bool {
    if css_text.starts_with('.') {
        index.is_none()
    } else if css_text.starts_with('#') {
        false
    } else if !css_text.contains(['.', '#', ' ', '[']) {
        index.is_none()
    } else {
        false
    }
}

/// Lowers an enhanced selector's CSS text to a DOM lookup expression
/// (spec.md §4.J4): `.x` (unindexed) to an array of all matches via
/// `getElementsByClassName`, `.x[i]`/`#x`/a bare tag name to a single-element
/// lookup, and anything else to an id-then-class probe.
fn selector_expr(css_text: &str, index: Option<i64>) -> String {
    if let Some(name) = css_text.strip_prefix('.') {
        match index {
            Some(i) => format!("document.getElementsByClassName({name:?})[{i}]"),
            None => format!("Array.from(document.getElementsByClassName({name:?}))"),
        }
    } else if let Some(name) = css_text.strip_prefix('#') {
        format!("document.getElementById({name:?})")
    } else if !css_text.contains(['.', '#', ' ', '[']) {
        match index {
            Some(i) => format!("document.getElementsByTagName({css_text:?})[{i}]"),
            None => format!("Array.from(document.getElementsByTagName({css_text:?}))"),
        }
    } else {
        format!(
            "(document.getElementById({css_text:?}) || document.getElementsByClassName({css_text:?})[0])",
        )
    }
}

/// Rewrites bare `name.member`/`name->member` occurrences that reference a
/// known `vir` view's callable member to the mangled free-function name.
/// A small forward scanner over identifier runs, grounded on the same
/// dual-pointer scan style `cjmod`'s pattern matcher uses: no general JS
/// parsing, just identifier-dot-identifier recognition.
fn rewrite_vir_references(text: &str, views: &ViewRegistry) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if is_ident_start(chars[i]) {
            let start = i;
            while i < chars.len() && is_ident_continue(chars[i]) {
                i += 1;
            }
            let name: String = chars[start..i].iter().collect();
            let mut j = i;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            let (sep_len, member_start) = if j < chars.len() && chars[j] == '.' {
                (1, j + 1)
            } else if j + 1 < chars.len() && chars[j] == '-' && chars[j + 1] == '>' {
                (2, j + 2)
            } else {
                (0, 0)
            };
            if sep_len > 0 {
                let mut k = member_start;
                while k < chars.len() && k < member_start + 64 && is_ident_continue(chars[k]) {
                    k += 1;
                }
                let member: String = chars[member_start..k].iter().collect();
                if !member.is_empty() && views.lookup(&name, &member).is_some() {
                    out.push_str(&ViewRegistry::mangled_name(&name, &member));
                    i = k;
                    continue;
                }
            }
            out.push_str(&name);
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chtljs::lexer::tokenize;
    use crate::chtljs::parser::Parser;

    fn generate(source: &str) -> (String, EventDelegateRegistry) {
        let mut bag = DiagnosticBag::default();
        let tokens = tokenize(source, &mut bag);
        let mut parser = Parser::new(tokens, &mut bag);
        let program = parser.parse_program();
        let arena = parser.arena;
        let mut views = ViewRegistry::new();
        views.collect_from(&arena, &program);
        let mut delegates = EventDelegateRegistry::new();
        let js = {
            let mut generator = Generator::new(&mut delegates, &views);
            generator.generate(&arena, &program, &mut bag)
        };
        (js, delegates)
    }

    #[test]
    fn class_selector_lowers_to_array_lookup() {
        let (js, _) = generate("{{.box}}->listen{ click: handleClick };");
        assert!(js.contains("getElementsByClassName"));
        assert!(js.contains(".forEach("));
        assert!(js.contains("addEventListener"));
    }

    #[test]
    fn id_selector_lowers_to_get_element_by_id() {
        let (js, _) = generate("{{#panel}}->listen{ click: onClick };");
        assert!(js.contains("getElementById"));
        assert!(!js.contains(".forEach("));
        assert!(js.contains("addEventListener"));
    }

    #[test]
    fn delegate_accumulates_in_registry_not_inline() {
        let (js, delegates) = generate("{{.list}}->delegate{ target: [{{.item}}], click: onItem };");
        assert!(!js.contains("addEventListener"));
        assert!(!delegates.is_empty());
    }
}
