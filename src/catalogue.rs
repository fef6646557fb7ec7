//! Static tables of HTML tag kinds and CSS property name canonicalization
//! (component L). Data, not design — generalized from the teacher's small
//! `is_void_element`/`is_html_element` helpers in `utils.rs` into the full
//! catalogue the generator and parser need.

/// How a tag nests with respect to children and closing tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// No children permitted, self-closing (e.g. `img`, `br`).
    Void,
    /// Block-level element that participates in normal flow layout.
    Block,
    /// Inline element.
    Inline,
}

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "cite", "code", "data", "dfn", "em", "i", "kbd", "mark",
    "q", "rp", "rt", "ruby", "s", "samp", "small", "span", "strong", "sub", "sup", "time", "u",
    "var",
];

/// Classify a tag name (case-insensitively) into its nesting kind.
///
/// Unknown tags (custom elements, anything not in the static table) default
/// to `Block`, matching typical browser treatment of unrecognized elements.
pub fn tag_kind(name: &str) -> TagKind {
    let lower = name.to_ascii_lowercase();
    if VOID_TAGS.contains(&lower.as_str()) {
        TagKind::Void
    } else if INLINE_TAGS.contains(&lower.as_str()) {
        TagKind::Inline
    } else {
        TagKind::Block
    }
}

/// Whether a tag is void (no children, no closing tag), per spec.md invariant 4.
pub fn is_void(name: &str) -> bool {
    matches!(tag_kind(name), TagKind::Void)
}

/// Whether `name` is a recognized HTML tag at all (used by the lexer/parser's
/// "nearest valid tag name" suggestion in spec.md §7).
pub fn is_known_tag(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    VOID_TAGS.contains(&lower.as_str())
        || INLINE_TAGS.contains(&lower.as_str())
        || KNOWN_BLOCK_TAGS.contains(&lower.as_str())
}

const KNOWN_BLOCK_TAGS: &[&str] = &[
    "html", "head", "body", "div", "span", "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol",
    "li", "table", "tr", "td", "th", "thead", "tbody", "tfoot", "form", "label", "select",
    "option", "textarea", "button", "header", "footer", "nav", "main", "section", "article",
    "aside", "figure", "figcaption", "video", "audio", "canvas", "pre", "blockquote", "address",
    "fieldset", "legend", "details", "summary", "dialog", "template", "style", "script", "title",
    "head",
];

/// Nearest known tag name to `name` by a simple prefix/edit-distance heuristic,
/// used to populate `Diagnostic::suggestion` (spec.md §7).
pub fn suggest_tag(name: &str) -> Option<&'static str> {
    let lower = name.to_ascii_lowercase();
    let all = VOID_TAGS.iter().chain(INLINE_TAGS.iter()).chain(KNOWN_BLOCK_TAGS.iter());
    all.min_by_key(|candidate| edit_distance(&lower, candidate))
        .filter(|candidate| edit_distance(&lower, candidate) <= 2)
        .copied()
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for i in 1..=a.len() {
        let mut prev = row[0];
        row[0] = i;
        for j in 1..=b.len() {
            let cur = row[j];
            row[j] = if a[i - 1] == b[j - 1] {
                prev
            } else {
                1 + prev.min(row[j]).min(row[j - 1])
            };
            prev = cur;
        }
    }
    row[b.len()]
}

/// Canonicalize a CSS property name: lowercase, trim whitespace. CHTL does
/// not validate property values, only normalizes the property key so that
/// `Color: red` and `color : red` hoist into the same declaration.
pub fn canonicalize_property(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_void_tags() {
        assert_eq!(tag_kind("img"), TagKind::Void);
        assert_eq!(tag_kind("IMG"), TagKind::Void);
        assert!(is_void("br"));
        assert!(!is_void("div"));
    }

    #[test]
    fn classifies_inline_vs_block() {
        assert_eq!(tag_kind("span"), TagKind::Inline);
        assert_eq!(tag_kind("div"), TagKind::Block);
        assert_eq!(tag_kind("my-widget"), TagKind::Block);
    }

    #[test]
    fn suggests_nearest_tag() {
        assert_eq!(suggest_tag("dvi"), Some("div"));
        assert_eq!(suggest_tag("xyzzy12345"), None);
    }

    #[test]
    fn canonicalizes_property_names() {
        assert_eq!(canonicalize_property(" Color "), "color");
    }
}
