//! CHTL AST node variants (spec.md §3). A tagged sum of node kinds replaces
//! the deep `CHTLType -> TextType/HTMLElementType/...` class hierarchy the
//! source used (spec.md §9): one variant per shape, with a single top-level
//! match standing in for virtual `toHTML`/`toCSS` dispatch. Nodes live in a
//! per-compilation-unit [`crate::arena::Arena`] and are addressed by
//! [`NodeId`]; parent links are implicit (owning child lists), never
//! pointers.

use indexmap::IndexMap;

use crate::arena::NodeId;

pub type Node = NodeId<ChtlNode>;

/// Selector kind for a style-block rule, per spec.md §3 `StyleBlock`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorKind {
    Inline,
    Class(String),
    Id(String),
    Element(String),
    /// The contextual `&` selector, resolved against the enclosing element
    /// at generation time (spec.md invariant 5).
    Contextual,
}

/// `kind` discriminant shared by [`ChtlNode::Template`] and [`ChtlNode::Custom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefKind {
    Style,
    Element,
    Var,
}

/// One specialization operation applied over an inherited base, in source
/// order (spec.md §4.C3).
#[derive(Debug, Clone)]
pub enum SpecializationOp {
    Delete { target: String },
    Replace { target: String, body: Vec<Node> },
    InsertAfter { target: String, body: Vec<Node> },
    InsertBefore { target: String, body: Vec<Node> },
    AtTop { body: Vec<Node> },
    AtBottom { body: Vec<Node> },
    /// A bare property definition inside a custom body overrides or adds a
    /// property (style custom) or a child/attribute (element custom).
    Property { name: String, value: String },
}

/// Origin block language tag, per spec.md §3 `Origin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginLang {
    Html,
    Style,
    JavaScript,
    Custom(String),
}

/// Import type, per spec.md §4.C4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportKind {
    Html,
    Style,
    JavaScript,
    Chtl,
    CJmod,
    /// `[Template]`/`[Custom]`/`[Origin]` targeted imports pulling specific
    /// named entities.
    Targeted { def_kind: DefKind, is_custom: bool },
    Config,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintScope {
    /// Applies only within the enclosing element.
    Local,
    /// Applies to the whole file from this point forward.
    Global,
}

/// A CHTL AST node. One variant per spec.md §3 shape.
#[derive(Debug, Clone)]
pub enum ChtlNode {
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
        children: Vec<Node>,
    },
    Text {
        content: String,
    },
    StyleBlock {
        selector: SelectorKind,
        properties: IndexMap<String, String>,
        /// `@Style NAME;` invocations inside the block.
        style_invocations: Vec<String>,
    },
    ScriptBlock {
        raw_source: String,
    },
    Template {
        kind: DefKind,
        name: String,
        inherits: Option<String>,
        body: Vec<Node>,
    },
    Custom {
        kind: DefKind,
        name: String,
        inherits: Option<String>,
        body: Vec<Node>,
        specializations: Vec<SpecializationOp>,
    },
    /// Use-site of a template or custom (`@Element Name;` / `@Style Name;`
    /// inside a style block / `@Var Name.Key`).
    Invoke {
        kind: DefKind,
        is_custom: bool,
        name: String,
        /// Inline specialization body for a custom-invoke-with-block.
        inline_specializations: Vec<SpecializationOp>,
    },
    Origin {
        lang: OriginLang,
        alias: Option<String>,
        raw_content: String,
    },
    Import {
        kind: ImportKind,
        target: Option<String>,
        source_path: String,
        alias: Option<String>,
        resolved_path: Option<String>,
    },
    Namespace {
        path: Vec<String>,
        body: Vec<Node>,
    },
    Configuration {
        options: IndexMap<String, String>,
        name_groups: IndexMap<String, String>,
        origin_types: IndexMap<String, String>,
    },
    Constraint {
        prohibited: Vec<String>,
        scope: ConstraintScope,
    },
    /// A `--…` generator comment, preserved verbatim into HTML output as
    /// `<!-- … -->` (spec.md glossary).
    GeneratorComment {
        text: String,
    },
}

impl ChtlNode {
    pub fn as_element(&self) -> Option<(&str, &IndexMap<String, String>, &[Node])> {
        match self {
            ChtlNode::Element { tag, attributes, children } => Some((tag, attributes, children)),
            _ => None,
        }
    }
}
