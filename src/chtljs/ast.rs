//! CHTL-JS AST node variants (spec.md §3, CHTL-JS dialect). Mirrors
//! `chtl::ast`'s tagged-sum-of-variants design: one [`Arena`]-addressed
//! enum instead of a per-shape class hierarchy.

use indexmap::IndexMap;

use crate::arena::NodeId;

pub type Node = NodeId<JsNode>;

/// How a member was accessed, preserved so the generator can reproduce
/// `.prop`, `->method()` and `[index]` call shapes faithfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Dot,
    Arrow,
    Bracket,
}

/// The kind of value stored in a `vir` view's member table, per spec.md §9's
/// "dynamic lookup replaces deep hierarchy" design note: one flat enum
/// standing in for a polymorphic member-value hierarchy.
#[derive(Debug, Clone)]
pub enum MemberType {
    Function(Node),
    Object(IndexMap<String, Node>),
    Array(Vec<Node>),
    Literal(String),
}

#[derive(Debug, Clone)]
pub enum JsNode {
    /// Raw JavaScript token run, reproduced verbatim (anything CHTL-JS
    /// doesn't specifically recognize).
    Raw {
        text: String,
    },
    /// An enhanced selector `{{ css-text }}` with an optional `[index]`.
    Selector {
        css_text: String,
        index: Option<i64>,
    },
    MemberAccess {
        object: Node,
        property: String,
        access: AccessKind,
    },
    Call {
        callee: Node,
        args: Vec<Node>,
    },
    /// `target->listen{ click: handler, ... }` / `{{sel}} &-> listen{...}`.
    Listen {
        target: Node,
        events: IndexMap<String, Node>,
    },
    /// `{{parent}}->delegate{ target: [...], click: handler, ... }`.
    Delegate {
        parent: Node,
        targets: Vec<String>,
        events: IndexMap<String, Node>,
    },
    /// `animate({ target, duration, easing, begin, end, when, loop, direction, delay, callback })`.
    Animate {
        target: Node,
        duration: Option<Node>,
        easing: Option<Node>,
        begin: Option<Node>,
        end: Option<Node>,
        when: Vec<Node>,
        loop_count: Option<Node>,
        direction: Option<Node>,
        delay: Option<Node>,
        callback: Option<Node>,
    },
    /// `vir NAME = CALL(...)`; captures the call result's shape for later
    /// member-access rewriting.
    VirDecl {
        name: String,
        members: IndexMap<String, MemberType>,
    },
    /// A reference to a `vir` member (`NAME.member` / `NAME->member`),
    /// resolved at generation time via the [`crate::chtljs::registries::ViewRegistry`].
    VirMemberRef {
        vir_name: String,
        member: String,
    },
}
