//! CJMOD pattern-extension runtime (component M): registers
//! `(trigger_keyword, pattern, replacement template)` triples and rewrites
//! matching occurrences in a CHTL-JS source fragment before it reaches J1,
//! per spec.md §4.M and §8 property 8 ("replacement preserves everything
//! outside a match byte-for-byte").
//!
//! Grounded on `scanner.rs`'s windowed dual-pointer scan: a front pointer
//! searches token-by-token for the trigger keyword, a back pointer anchors
//! the match start (extended backward for a prefix capture), matches are
//! collected left-to-right and then spliced right-to-left so earlier byte
//! offsets stay valid while later ones are rewritten (spec.md §4.M).

use indexmap::IndexMap;

/// One token in a parsed pattern string.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternToken {
    Placeholder { name: String, optional: bool },
    Variadic { name: String },
    Literal(String),
}

/// A compiled CJMOD pattern: an optional prefix capture before the trigger
/// keyword (Open Question 3 — attempted only when the pattern's first token
/// is a placeholder preceding the trigger), the trigger keyword itself, and
/// the tokens expected after it.
#[derive(Debug, Clone)]
pub struct CjmodPattern {
    pub trigger: String,
    prefix: Option<String>,
    tail: Vec<PatternToken>,
    template: String,
}

impl CjmodPattern {
    /// Parses a pattern source string like `"printMe($msg)"`,
    /// `"$base ** $exponent"`, or `"sum($args...)"` into a [`CjmodPattern`].
    /// `template` uses `{{name}}` placeholders substituted from captures.
    pub fn parse(pattern_source: &str, template: impl Into<String>) -> Self {
        let words = split_pattern_words(pattern_source);
        let mut idx = 0;
        let mut prefix = None;

        // Prefix capture only applies when an explicit `$name` placeholder
        // precedes the trigger keyword (Open Question 3's resolution — a
        // pattern starting with the trigger itself never attempts a prefix).
        if words.len() >= 2 && is_placeholder_word(&words[0]) && !is_placeholder_word(&words[1]) {
            prefix = Some(placeholder_name(&words[0]));
            idx = 1;
        }

        let trigger = words.get(idx).cloned().unwrap_or_default();
        idx += 1;

        let mut tail = Vec::new();
        while idx < words.len() {
            let word = &words[idx];
            if word == "..." || word.ends_with("...") {
                let name = if word == "..." {
                    "rest".to_string()
                } else {
                    placeholder_name(&word[..word.len() - 3])
                };
                tail.push(PatternToken::Variadic { name });
            } else if is_placeholder_word(word) {
                let optional = word.ends_with('?');
                let raw = if optional { &word[..word.len() - 1] } else { word.as_str() };
                tail.push(PatternToken::Placeholder { name: placeholder_name(raw), optional });
            } else {
                tail.push(PatternToken::Literal(word.clone()));
            }
            idx += 1;
        }

        Self { trigger, prefix, tail, template: template.into() }
    }

    fn render(&self, captures: &IndexMap<String, String>) -> String {
        let mut out = self.template.clone();
        for (name, value) in captures {
            out = out.replace(&format!("{{{{{name}}}}}"), value);
        }
        out
    }
}

fn is_placeholder_word(word: &str) -> bool {
    word.starts_with('$')
}

fn placeholder_name(word: &str) -> String {
    word.trim_start_matches('$').to_string()
}

/// Splits a pattern source string into words: `(`, `)`, `,` are always their
/// own word; `...` is one word; everything else is a maximal run of
/// non-whitespace, non-punctuation characters (covers `$name`, `$name?`,
/// bare identifiers, and operator tokens like `**`).
fn split_pattern_words(source: &str) -> Vec<String> {
    tokenize_words(source).into_iter().map(|t| t.text).collect()
}

#[derive(Debug, Clone)]
struct ScannedWord {
    text: String,
    start: usize,
    end: usize,
}

/// Same word-splitting rule as [`split_pattern_words`], but tracking byte
/// offsets into `source` so matches can be spliced back in without
/// disturbing the bytes outside them.
fn tokenize_words(source: &str) -> Vec<ScannedWord> {
    let bytes: Vec<char> = source.chars().collect();
    let mut words = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '(' || c == ')' || c == ',' {
            words.push(ScannedWord { text: c.to_string(), start: i, end: i + 1 });
            i += 1;
            continue;
        }
        if c == '.' && bytes.get(i + 1) == Some(&'.') && bytes.get(i + 2) == Some(&'.') {
            words.push(ScannedWord { text: "...".to_string(), start: i, end: i + 3 });
            i += 3;
            continue;
        }
        let start = i;
        while i < bytes.len()
            && !bytes[i].is_whitespace()
            && !matches!(bytes[i], '(' | ')' | ',')
            && !(bytes[i] == '.' && bytes.get(i + 1) == Some(&'.') && bytes.get(i + 2) == Some(&'.'))
        {
            i += 1;
        }
        words.push(ScannedWord { text: bytes[start..i].iter().collect(), start, end: i });
    }
    words
}

struct MatchSpan {
    start: usize,
    end: usize,
    captures: IndexMap<String, String>,
}

/// Attempts to match `pattern` starting at the trigger word `words[trigger_idx]`.
/// Returns the overall byte span (including any backward prefix extension)
/// and captured values on success.
fn try_match(source: &str, words: &[ScannedWord], trigger_idx: usize, pattern: &CjmodPattern) -> Option<MatchSpan> {
    if words[trigger_idx].text != pattern.trigger {
        return None;
    }

    let mut captures = IndexMap::new();
    let mut span_start = words[trigger_idx].start;

    if let Some(prefix_name) = &pattern.prefix {
        if trigger_idx == 0 {
            return None;
        }
        let prev = &words[trigger_idx - 1];
        captures.insert(prefix_name.clone(), prev.text.clone());
        span_start = prev.start;
    }

    let mut pos = trigger_idx + 1;
    let mut tail_iter = pattern.tail.iter().peekable();

    while let Some(token) = tail_iter.next() {
        match token {
            PatternToken::Literal(lit) => {
                if pos >= words.len() || words[pos].text != *lit {
                    return None;
                }
                pos += 1;
            }
            PatternToken::Placeholder { name, optional } => {
                // Capture up to (but not including) the next literal
                // delimiter in the pattern. With no trailing literal to
                // anchor against, a non-variadic placeholder captures
                // exactly the one following word — only `...` is greedy to
                // end-of-input.
                let stop_literal = tail_iter.peek().and_then(|next| match next {
                    PatternToken::Literal(lit) => Some(lit.clone()),
                    _ => None,
                });
                let capture_start = pos;
                let mut capture_end = pos;
                match &stop_literal {
                    Some(stop) => {
                        while capture_end < words.len() && words[capture_end].text != *stop {
                            capture_end += 1;
                        }
                    }
                    None => {
                        capture_end = (capture_start + 1).min(words.len());
                    }
                }
                if capture_start == capture_end {
                    if !*optional {
                        return None;
                    }
                } else {
                    let text = source[words[capture_start].start..words[capture_end - 1].end].to_string();
                    captures.insert(name.clone(), text);
                }
                pos = capture_end;
            }
            PatternToken::Variadic { name } => {
                let stop_literal = tail_iter.peek().and_then(|next| match next {
                    PatternToken::Literal(lit) => Some(lit.clone()),
                    _ => None,
                });
                let capture_start = pos;
                let mut capture_end = pos;
                while capture_end < words.len() {
                    if let Some(stop) = &stop_literal {
                        if words[capture_end].text == *stop {
                            break;
                        }
                    }
                    capture_end += 1;
                }
                if capture_end > capture_start {
                    let text = source[words[capture_start].start..words[capture_end - 1].end].to_string();
                    let items: Vec<String> = split_top_level_commas(&words[capture_start..capture_end])
                        .into_iter()
                        .map(|slice| {
                            source[slice.first().unwrap().start..slice.last().unwrap().end].trim().to_string()
                        })
                        .collect();
                    captures.insert(name.clone(), text);
                    captures.insert(format!("{name}.joined"), items.join(", "));
                }
                pos = capture_end;
            }
        }
    }

    let span_end = if pos > trigger_idx + 1 || pattern.tail.is_empty() {
        words.get(pos.saturating_sub(1)).map(|w| w.end).unwrap_or(words[trigger_idx].end)
    } else {
        words[trigger_idx].end
    };

    Some(MatchSpan { start: span_start, end: span_end.max(words[trigger_idx].end), captures })
}

fn split_top_level_commas(words: &[ScannedWord]) -> Vec<&[ScannedWord]> {
    let mut groups = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, w) in words.iter().enumerate() {
        match w.text.as_str() {
            "(" => depth += 1,
            ")" => depth -= 1,
            "," if depth == 0 => {
                groups.push(&words[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < words.len() {
        groups.push(&words[start..]);
    }
    groups
}

/// Registry of active CJMOD patterns for one compilation unit (spec.md §9:
/// instance-per-compilation-unit, never a process-global registry).
#[derive(Debug, Default)]
pub struct CjmodRegistry {
    patterns: Vec<CjmodPattern>,
}

impl CjmodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, pattern: CjmodPattern) {
        self.patterns.push(pattern);
    }

    /// Rewrites every match of every registered pattern in `source`,
    /// left-to-right scan to find matches, right-to-left splice to apply
    /// them, so unmatched text is preserved byte-for-byte (spec.md §8
    /// property 8) and already-applied replacements never shift
    /// not-yet-applied match offsets.
    pub fn apply_all(&self, source: &str) -> (String, usize) {
        let words = tokenize_words(source);
        let mut matches: Vec<MatchSpan> = Vec::new();
        let mut i = 0;
        'outer: while i < words.len() {
            for pattern in &self.patterns {
                if let Some(m) = try_match(source, &words, i, pattern) {
                    let rendered = pattern.render(&m.captures);
                    matches.push(MatchSpan { start: m.start, end: m.end, captures: IndexMap::from([("__rendered".to_string(), rendered)]) });
                    i += 1;
                    continue 'outer;
                }
            }
            i += 1;
        }

        matches.sort_by_key(|m| m.start);
        let count = matches.len();
        let mut result = source.to_string();
        for m in matches.into_iter().rev() {
            let rendered = m.captures.get("__rendered").cloned().unwrap_or_default();
            result.replace_range(m.start..m.end, &rendered);
        }
        (result, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_simple_function_style_pattern() {
        let mut registry = CjmodRegistry::new();
        registry.register(CjmodPattern::parse("printMe($msg)", "console.log({{msg}})"));
        let (out, count) = registry.apply_all("printMe(Hello)");
        assert_eq!(count, 1);
        assert_eq!(out, "console.log(Hello)");
    }

    #[test]
    fn prefix_capture_binds_the_token_before_the_trigger() {
        let mut registry = CjmodRegistry::new();
        registry.register(CjmodPattern::parse("$base ** $exponent", "Math.pow({{base}}, {{exponent}})"));
        let (out, count) = registry.apply_all("let result = base ** exponent ;");
        assert_eq!(count, 1);
        assert!(out.contains("Math.pow(base, exponent)"));
    }

    #[test]
    fn optional_placeholder_may_be_absent() {
        let mut registry = CjmodRegistry::new();
        registry.register(CjmodPattern::parse("greet($name, $title?)", "sayHello({{name}})"));
        let (out, count) = registry.apply_all("greet(Ada)");
        assert_eq!(count, 1);
        assert_eq!(out, "sayHello(Ada)");
    }

    #[test]
    fn replacement_preserves_surrounding_text_byte_for_byte() {
        let mut registry = CjmodRegistry::new();
        registry.register(CjmodPattern::parse("printMe($msg)", "console.log({{msg}})"));
        let (out, _) = registry.apply_all("before printMe(Hi) after");
        assert!(out.starts_with("before "));
        assert!(out.ends_with(" after"));
    }

    #[test]
    fn no_match_leaves_source_untouched() {
        let mut registry = CjmodRegistry::new();
        registry.register(CjmodPattern::parse("printMe($msg)", "console.log({{msg}})"));
        let (out, count) = registry.apply_all("doSomethingElse(1, 2)");
        assert_eq!(count, 0);
        assert_eq!(out, "doSomethingElse(1, 2)");
    }
}
