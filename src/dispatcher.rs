//! Compiler dispatcher (component D): orchestrates the whole pipeline from
//! raw source to a finished `CompileResult`, per spec.md §4.D.
//!
//! Runs the Unified Scanner first to validate the source partitions cleanly
//! (spec.md §8 property 1), then parses the reconstructed source once with
//! the CHTL pipeline (C1–C5), lowers each embedded `script { }` block's raw
//! text through the CHTL-JS pipeline (J1–J4, with the CJMOD runtime M
//! rewriting pattern extensions first), and finally merges the CSS/JS
//! buffers and assembles the HTML document, per spec.md §6.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chtl;
use crate::chtl::ast::{ChtlNode, ImportKind};
use crate::chtl::ImportResolver;
use crate::chtljs;
use crate::chtljs::registries::{EventDelegateRegistry, ViewRegistry};
use crate::cjmod::CjmodRegistry;
use crate::config::CompilerConfig;
use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCategory, Position};
use crate::error::CompileError;
use crate::scanner;

/// Result of a successful (or partially successful, error-recovered)
/// compilation, per spec.md §6. `success` is false whenever any `Error`- or
/// `Fatal`-level diagnostic was recorded, even though `html`/`css`/`js` are
/// still populated with whatever the pipeline managed to emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileResult {
    pub success: bool,
    pub html: String,
    pub css: String,
    pub js: String,
    pub errors: Vec<Diagnostic>,
}

/// Compiles CHTL source text into HTML/CSS/JS.
pub fn compile(source: &str, options: &CompilerConfig) -> Result<CompileResult, CompileError> {
    compile_with_patterns(source, options, &[])
}

/// Same as [`compile`], but with a set of CJMOD patterns pre-registered
/// against the CJMOD runtime (M) before any CHTL-JS fragment is lowered.
/// Loading actual `.cjmod` archives is the Module Manager's job (N); this
/// entry point is what a caller that already resolved those archives'
/// native pattern handlers into [`CjmodPattern`]s would use.
pub fn compile_with_patterns(
    source: &str,
    options: &CompilerConfig,
    cjmod_patterns: &[crate::cjmod::CjmodPattern],
) -> Result<CompileResult, CompileError> {
    let mut diagnostics = DiagnosticBag::new(options.max_errors);

    log::debug!("scanning source ({} bytes)", source.len());
    let fragments = scanner::scan(source, &mut diagnostics);
    let reconstructed: String = fragments.iter().map(|f| f.content.as_str()).collect();
    if reconstructed != source {
        diagnostics.push(Diagnostic::new(
            crate::diagnostics::Severity::Fatal,
            DiagnosticCategory::Internal,
            "scanner fragments did not reconstruct the original source",
            Position::default(),
        ));
        return Err(CompileError::Scan("fragment reconstruction mismatch".to_string()));
    }

    log::debug!("parsing CHTL source");
    let tokens = chtl::lexer::tokenize(source, &mut diagnostics);
    let mut parser = chtl::Parser::new(tokens, &mut diagnostics);
    let program = parser.parse_program();
    let mut arena = parser.arena;

    let mut config = options.clone();
    apply_source_configuration(&arena, &program, &mut config);

    log::debug!("resolving [Import] statements");
    resolve_imports(&mut arena, &program, &config, &mut diagnostics);

    let symbols = chtl::SymbolTable::build(&arena, &program, &mut diagnostics);
    let engine = chtl::TemplateEngine::new(&symbols);

    log::debug!("generating HTML/CSS from CHTL AST");
    let mut generator = chtl::Generator::new(&engine, &config);
    let output = generator.generate(&mut arena, &program, &mut diagnostics);

    let mut cjmod_registry = CjmodRegistry::new();
    for pattern in cjmod_patterns {
        cjmod_registry.register(pattern.clone());
    }
    let mut delegates = EventDelegateRegistry::new();
    let mut views = ViewRegistry::new();

    log::debug!("lowering {} embedded script fragment(s)", output.script_fragments.len());
    let mut js_buffer = String::new();
    for raw in &output.script_fragments {
        let (rewritten, applied) = cjmod_registry.apply_all(raw);
        if applied > 0 {
            log::debug!("cjmod runtime rewrote {applied} pattern occurrence(s)");
        }

        let js_tokens = chtljs::lexer::tokenize(&rewritten, &mut diagnostics);
        let mut js_parser = chtljs::Parser::new(js_tokens, &mut diagnostics);
        let js_program = js_parser.parse_program();
        let js_arena = js_parser.arena;

        views.collect_from(&js_arena, &js_program);
        let mut js_generator = chtljs::Generator::new(&mut delegates, &views);
        let fragment_js = js_generator.generate(&js_arena, &js_program, &mut diagnostics);
        js_buffer.push_str(&fragment_js);
        js_buffer.push('\n');
    }

    if !delegates.is_empty() {
        js_buffer.push_str(&delegates.emit());
    }

    let css_buffer = validate_and_normalize(&output.css, &mut diagnostics, DiagnosticCategory::Syntax, "CSS");
    let js_buffer = validate_and_normalize(&js_buffer, &mut diagnostics, DiagnosticCategory::Syntax, "JS");

    let html = assemble_html(&output.html, &css_buffer, &js_buffer);

    let success = !diagnostics.has_errors();
    Ok(CompileResult { success, html, css: css_buffer, js: js_buffer, errors: diagnostics.into_vec() })
}

/// Compiles the file at `path`, per spec.md §6's `compile_file` entry point.
pub fn compile_file(path: &Path, options: &CompilerConfig) -> Result<CompileResult, CompileError> {
    let source = std::fs::read_to_string(path)
        .map_err(|source| CompileError::Io { path: path.to_string_lossy().to_string(), source })?;
    compile(&source, options)
}

/// A single top-level `[Configuration] { ... }` block, if present, overrides
/// the baseline options before generation (spec.md §6 / Open Question 4).
fn apply_source_configuration(arena: &crate::arena::Arena<ChtlNode>, program: &[chtl::ast::Node], config: &mut CompilerConfig) {
    use crate::config::Configuration;
    for &node in program {
        if let ChtlNode::Configuration { options, name_groups, origin_types } = arena.get(node) {
            let mut block = Configuration::default();
            for (k, v) in options {
                block.options.insert(k.clone(), v == "true" || v == "1");
            }
            block.name_groups = name_groups.clone();
            block.origin_types = origin_types.clone();
            config.merge_source_block(&block);
        }
    }
}

/// Resolves every `[Import]` statement in the program against the Import
/// Resolver (C4), recursing into `[Namespace]` bodies, and records each
/// import's canonical path back onto its AST node. Raw-file imports with no
/// `as ALIAS` clause are skipped here too — C2 already recorded the
/// required-alias warning at parse time (spec.md §4.C4 / §7).
fn resolve_imports(
    arena: &mut crate::arena::Arena<ChtlNode>,
    program: &[chtl::ast::Node],
    config: &CompilerConfig,
    diagnostics: &mut DiagnosticBag,
) {
    let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let extra_roots: Vec<PathBuf> = config.include_paths.iter().map(PathBuf::from).collect();
    let mut resolver = ImportResolver::new(current_dir, extra_roots);
    resolve_imports_in(arena, program, &mut resolver, diagnostics);
}

fn resolve_imports_in(
    arena: &mut crate::arena::Arena<ChtlNode>,
    nodes: &[chtl::ast::Node],
    resolver: &mut ImportResolver,
    diagnostics: &mut DiagnosticBag,
) {
    for &node in nodes {
        match arena.get(node).clone() {
            ChtlNode::Import { kind, source_path, alias, .. } => {
                if matches!(kind, ImportKind::Html | ImportKind::Style | ImportKind::JavaScript) && alias.is_none() {
                    continue;
                }
                let resolved = resolver.resolve(&kind, &source_path, diagnostics);
                if let ChtlNode::Import { resolved_path, .. } = arena.get_mut(node) {
                    *resolved_path = resolved.into_iter().next();
                }
            }
            ChtlNode::Namespace { body, .. } => {
                resolve_imports_in(arena, &body, resolver, diagnostics);
            }
            _ => {}
        }
    }
}

/// Light pass-through validation for a merged CSS or JS buffer (spec.md
/// §4.D step 4): checks brace/paren/bracket balance and trims redundant
/// blank lines. Not a real parser — CHTL's own C1–C5/J1–J4 pipelines have
/// already validated their own syntax; this only catches damage introduced
/// by naive text concatenation across fragments.
fn validate_and_normalize(buffer: &str, diagnostics: &mut DiagnosticBag, category: DiagnosticCategory, label: &str) -> String {
    let mut depth = 0i64;
    for c in buffer.chars() {
        match c {
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => depth -= 1,
            _ => {}
        }
    }
    if depth != 0 {
        diagnostics.push(Diagnostic::warning(
            category,
            format!("{label} buffer has unbalanced brackets after merging (net depth {depth})"),
            Position::default(),
        ));
    }

    let mut normalized = String::with_capacity(buffer.len());
    let mut blank_run = 0;
    for line in buffer.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        normalized.push_str(line);
        normalized.push('\n');
    }
    normalized
}

/// Emits the final HTML document per spec.md §6: if the generated body
/// already carries its own top-level `<html>`/`<head>`/`<body>` structure
/// (the source wrote `html { head {...} body {...} }` itself), `<style>` and
/// `<script>` are injected into those locations; otherwise a full default
/// document shape is constructed around the generated element tree.
fn assemble_html(body_html: &str, css: &str, js: &str) -> String {
    let style_tag = if css.trim().is_empty() { String::new() } else { format!("<style>{css}</style>") };
    let script_tag = if js.trim().is_empty() { String::new() } else { format!("<script>{js}</script>") };

    if let Some(head_pos) = body_html.find("<head>") {
        let mut out = body_html.to_string();
        let insert_at = head_pos + "<head>".len();
        out.insert_str(insert_at, &style_tag);
        if let Some(body_close) = out.rfind("</body>") {
            out.insert_str(body_close, &script_tag);
        } else {
            out.push_str(&script_tag);
        }
        return out;
    }

    if let Some(html_pos) = body_html.find("<html") {
        let tag_end = body_html[html_pos..].find('>').map(|i| html_pos + i + 1).unwrap_or(html_pos);
        let mut out = body_html.to_string();
        out.insert_str(tag_end, &format!("<head><meta charset=\"utf-8\">{style_tag}</head>"));
        if let Some(body_close) = out.rfind("</body>") {
            out.insert_str(body_close, &script_tag);
        } else if let Some(html_close) = out.rfind("</html>") {
            out.insert_str(html_close, &script_tag);
        } else {
            out.push_str(&script_tag);
        }
        return out;
    }

    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">{style_tag}</head><body>{body_html}{script_tag}</body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_minimal_element() {
        let result = compile("html { body { h1 { text { Hello } } } }", &CompilerConfig::default()).unwrap();
        assert!(result.success, "{:?}", result.errors);
        assert!(result.html.contains("<body>"));
        assert!(result.html.contains("<h1>Hello</h1>"));
    }

    #[test]
    fn s2_style_with_auto_class() {
        let source = "div { style { .card { color: red; } } text { X } }";
        let result = compile(source, &CompilerConfig::default()).unwrap();
        assert!(result.success, "{:?}", result.errors);
        assert!(result.html.contains("class=\"card\""));
        assert!(result.css.contains(".card"));
        assert!(result.css.contains("color: red"));
    }

    #[test]
    fn s5_listen_and_delegate_merge_through_full_pipeline() {
        let source = "div { script { \
            {{#root}} -> delegate { target: .a, click: fn1 }; \
            {{#root}} -> delegate { target: .b, click: fn2 }; \
            {{#go}} -> listen { click: fnGo }; \
        } }";
        let result = compile(source, &CompilerConfig::default()).unwrap();
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.js.matches("addEventListener").count(), 2);
        assert!(result.js.contains("fn1"));
        assert!(result.js.contains("fn2"));
        assert!(result.js.contains("fnGo"));
    }

    #[test]
    fn default_document_shape_wraps_bare_element() {
        let result = compile("div { text { Hi } }", &CompilerConfig::default()).unwrap();
        assert!(result.html.starts_with("<!DOCTYPE html>"));
        assert!(result.html.contains("<head>"));
    }

    #[test]
    fn s3_template_invocation() {
        let source = "[Template] @Style Btn { background: blue; color: white; } \
            button { style { @Style Btn; } text { Go } }";
        let result = compile(source, &CompilerConfig::default()).unwrap();
        assert!(result.success, "{:?}", result.errors);
        assert!(result.css.contains("background: blue") || result.html.contains("background: blue"));
        assert!(result.css.contains("color: white") || result.html.contains("color: white"));
    }

    #[test]
    fn s4_custom_with_specialization() {
        let source = "[Template] @Element Card { div { text { Base } } } \
            [Custom] @Element RedCard inherit Card { replace text { text { RED } } } \
            body { @Element RedCard; }";
        let result = compile(source, &CompilerConfig::default()).unwrap();
        assert!(result.success, "{:?}", result.errors);
        assert!(result.html.contains("<div>RED</div>"));
    }

    #[test]
    fn missing_chtl_import_is_reported_by_the_wired_resolver() {
        let source = "[Import] @Chtl from DoesNotExistAnywhere;";
        let result = compile(source, &CompilerConfig::default()).unwrap();
        assert!(!result.success);
        assert!(result.errors.iter().any(|e| e.category == DiagnosticCategory::Import));
    }

    #[test]
    fn s6_cjmod_pattern_with_prefix() {
        let pattern =
            crate::cjmod::CjmodPattern::parse("$base ** $exponent", "Math.pow({{base}}, {{exponent}})");
        let source = "div { script { let y = x ** 3 ; } }";
        let result = compile_with_patterns(source, &CompilerConfig::default(), &[pattern]).unwrap();
        assert!(result.success, "{:?}", result.errors);
        assert!(result.js.contains("Math.pow(x, 3)"));
    }
}
