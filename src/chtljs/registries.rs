//! CHTL-JS Registries (component J3): per-compilation-unit instances (never
//! process-global singletons, per spec.md §9) tracking event delegation
//! merges and `vir` view member tables.

use indexmap::IndexMap;

use crate::arena::Arena;
use crate::chtljs::ast::{JsNode, MemberType, Node};

/// One parent selector's merged delegated listeners: CHTL-JS requires a
/// single `addEventListener` per (parent, event) pair even when several
/// `delegate{...}` calls target the same parent across the source file
/// (spec.md §4.J3) — child-selector/handler pairs for the same event append
/// to one registration.
#[derive(Debug, Default)]
pub struct EventDelegateRegistry {
    /// Keyed by parent selector text; value is event name -> ordered list of
    /// (child target selectors, handler source).
    entries: IndexMap<String, IndexMap<String, Vec<(Vec<String>, String)>>>,
}

impl EventDelegateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, parent_selector: &str, targets: &[String], event: &str, handler_source: &str) {
        let per_event = self.entries.entry(parent_selector.to_string()).or_default();
        per_event
            .entry(event.to_string())
            .or_default()
            .push((targets.to_vec(), handler_source.to_string()));
    }

    /// Emits one dispatcher function body per (parent, event) pair: a single
    /// `addEventListener` that checks `event.target.closest(...)` against
    /// each registered child target in registration order and invokes the
    /// first match's handler.
    pub fn emit(&self) -> String {
        let mut out = String::new();
        for (parent, per_event) in &self.entries {
            for (event, registrations) in per_event {
                out.push_str(&format!(
                    "document.querySelectorAll({parent:?}).forEach(function(__chtl_parent) {{\n"
                ));
                out.push_str(&format!(
                    "  __chtl_parent.addEventListener({event:?}, function(__chtl_evt) {{\n"
                ));
                for (targets, handler) in registrations {
                    for target in targets {
                        out.push_str(&format!(
                            "    if (__chtl_evt.target.closest({target:?})) {{ ({handler})(__chtl_evt); return; }}\n"
                        ));
                    }
                }
                out.push_str("  });\n});\n");
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Name -> member table for every `vir NAME = ...` declaration seen in one
/// compilation unit, per spec.md §4.J3.
#[derive(Debug, Default)]
pub struct ViewRegistry {
    views: IndexMap<String, IndexMap<String, MemberType>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: &str, members: IndexMap<String, MemberType>) {
        self.views.insert(name.to_string(), members);
    }

    pub fn lookup(&self, name: &str, member: &str) -> Option<&MemberType> {
        self.views.get(name)?.get(member)
    }

    /// The free-function name a `vir` member is mangled to when it's a
    /// callable (spec.md §4.J4): `__vir_<name>_<member>`.
    pub fn mangled_name(name: &str, member: &str) -> String {
        format!("__vir_{name}_{member}")
    }

    pub fn collect_from(&mut self, arena: &Arena<JsNode>, program: &[Node]) {
        for &node in program {
            if let JsNode::VirDecl { name, members } = arena.get(node) {
                self.declare(name, members.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_multiple_delegate_calls_on_same_parent_event() {
        let mut registry = EventDelegateRegistry::new();
        registry.register(".list", &[".item".to_string()], "click", "onItem");
        registry.register(".list", &[".btn".to_string()], "click", "onBtn");
        let emitted = registry.emit();
        assert!(emitted.contains("onItem"));
        assert!(emitted.contains("onBtn"));
        assert_eq!(emitted.matches("addEventListener").count(), 1);
    }

    #[test]
    fn view_registry_roundtrips_member_lookup() {
        let mut registry = ViewRegistry::new();
        let mut members = IndexMap::new();
        let mut arena: Arena<JsNode> = Arena::new();
        let node = arena.alloc(JsNode::Raw { text: "fn".to_string() });
        members.insert("show".to_string(), MemberType::Function(node));
        registry.declare("box", members);
        assert!(registry.lookup("box", "show").is_some());
        assert!(registry.lookup("box", "missing").is_none());
        assert_eq!(ViewRegistry::mangled_name("box", "show"), "__vir_box_show");
    }
}
