//! Import Resolver (component C4): path classification and resolution
//! across the official-module / local-module / current-directory search
//! roots, per spec.md §4.C4.
//!
//! The canonical-path dedup cache is grounded on the teacher's
//! `template_map: HashMap<String, String>` deduplication cache in
//! `transform/mod.rs` — same shape (a map from a normalized key to a
//! canonical value), generalized from template HTML strings to filesystem
//! paths.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::chtl::ast::ImportKind;
use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCategory, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathClass {
    NameOnly,
    SpecificName,
    SpecificPath,
    Directory,
    Wildcard,
}

fn classify(path: &str) -> PathClass {
    if path.ends_with(".*") || path.ends_with("/*") {
        return PathClass::Wildcard;
    }
    if path.ends_with('/') {
        return PathClass::Directory;
    }
    let has_separator = path.contains('/');
    let has_extension = Path::new(path)
        .extension()
        .map(|ext| !ext.is_empty())
        .unwrap_or(false);
    match (has_separator, has_extension) {
        (true, _) => PathClass::SpecificPath,
        (false, true) => PathClass::SpecificName,
        (false, false) => PathClass::NameOnly,
    }
}

const CANDIDATE_EXTENSIONS: &[&str] = &["chtl", "cmod", "cjmod", "html", "css", "js"];

/// Resolves import paths against a fixed multi-root search strategy and
/// caches canonicalized results for the lifetime of one compilation unit
/// (spec.md §3 lifecycles — "a new run starts fresh").
pub struct ImportResolver {
    /// `./module` by default — exclusively searched for `chtl::` prefixed paths.
    official_root: PathBuf,
    /// `./module` subfolder of the current directory.
    local_module_root: PathBuf,
    /// The current directory itself.
    current_dir: PathBuf,
    /// Extra roots supplied via `CompilerConfig::include_paths`.
    extra_roots: Vec<PathBuf>,
    cache: HashMap<String, String>,
    seen_canonical: HashMap<String, String>,
}

impl ImportResolver {
    pub fn new(current_dir: impl Into<PathBuf>, extra_roots: Vec<PathBuf>) -> Self {
        let current_dir = current_dir.into();
        Self {
            official_root: current_dir.join("module"),
            local_module_root: current_dir.join("module"),
            current_dir: current_dir.clone(),
            extra_roots,
            cache: HashMap::new(),
            seen_canonical: HashMap::new(),
        }
    }

    fn search_roots(&self) -> Vec<&Path> {
        let mut roots = vec![self.official_root.as_path(), self.local_module_root.as_path(), self.current_dir.as_path()];
        roots.extend(self.extra_roots.iter().map(PathBuf::as_path));
        roots
    }

    /// Resolve one import statement's source path to a canonical, existing
    /// path (or paths, for wildcard imports). Missing-file severity depends
    /// on whether the import kind requires an alias (spec.md §4.C4 / §7):
    /// raw-file imports without an alias are a caller-side warning handled
    /// before this call (C2 already records it); here a genuinely missing
    /// file is always an `Import` error except for optional-looking
    /// name-only lookups, which degrade to a warning.
    pub fn resolve(
        &mut self,
        kind: &ImportKind,
        raw_path: &str,
        diagnostics: &mut DiagnosticBag,
    ) -> Vec<String> {
        if let Some(cached) = self.cache.get(raw_path) {
            return vec![cached.clone()];
        }

        if let Some(name) = raw_path.strip_prefix("chtl::") {
            return self.resolve_official(name, diagnostics);
        }

        let (module_name, submodule) = split_submodule(raw_path);

        match classify(raw_path) {
            PathClass::Directory => {
                diagnostics.push(Diagnostic::error(
                    DiagnosticCategory::Import,
                    format!("`{raw_path}` is a directory; file imports cannot target a directory"),
                    Position::default(),
                ));
                Vec::new()
            }
            PathClass::Wildcard => self.resolve_wildcard(raw_path, diagnostics),
            PathClass::SpecificPath => {
                let candidate = self.current_dir.join(raw_path);
                self.finish_single(raw_path, candidate, kind, diagnostics)
            }
            PathClass::SpecificName | PathClass::NameOnly => {
                if let Some(sub) = submodule {
                    self.resolve_submodule(&module_name, &sub, diagnostics)
                } else {
                    self.resolve_across_roots(raw_path, kind, diagnostics)
                }
            }
        }
    }

    fn resolve_official(&mut self, name: &str, diagnostics: &mut DiagnosticBag) -> Vec<String> {
        for ext in CANDIDATE_EXTENSIONS {
            let candidate = self.official_root.join(format!("{name}.{ext}"));
            if candidate.exists() {
                let resolved = candidate.to_string_lossy().to_string();
                self.record(name, &resolved, diagnostics);
                return vec![resolved];
            }
        }
        diagnostics.push(Diagnostic::error(
            DiagnosticCategory::Import,
            format!("official module `chtl::{name}` not found under the official module directory"),
            Position::default(),
        ));
        Vec::new()
    }

    /// `Mod.Sub` (or `Mod/Sub`) resolves to `Mod/src/Sub` once `Mod` is located.
    fn resolve_submodule(&mut self, module: &str, sub: &str, diagnostics: &mut DiagnosticBag) -> Vec<String> {
        for root in self.search_roots() {
            let module_dir = root.join(module);
            if module_dir.is_dir() {
                for ext in CANDIDATE_EXTENSIONS {
                    let candidate = module_dir.join("src").join(format!("{sub}.{ext}"));
                    if candidate.exists() {
                        let resolved = candidate.to_string_lossy().to_string();
                        self.record(&format!("{module}.{sub}"), &resolved, diagnostics);
                        return vec![resolved];
                    }
                }
            }
        }
        diagnostics.push(Diagnostic::error(
            DiagnosticCategory::Import,
            format!("submodule `{module}.{sub}` not found in any search root"),
            Position::default(),
        ));
        Vec::new()
    }

    fn resolve_across_roots(
        &mut self,
        raw_path: &str,
        kind: &ImportKind,
        diagnostics: &mut DiagnosticBag,
    ) -> Vec<String> {
        let has_extension = Path::new(raw_path).extension().is_some();
        for root in self.search_roots() {
            if has_extension {
                let candidate = root.join(raw_path);
                if candidate.exists() {
                    let resolved = candidate.to_string_lossy().to_string();
                    self.record(raw_path, &resolved, diagnostics);
                    return vec![resolved];
                }
            } else {
                for ext in CANDIDATE_EXTENSIONS {
                    let candidate = root.join(format!("{raw_path}.{ext}"));
                    if candidate.exists() {
                        let resolved = candidate.to_string_lossy().to_string();
                        self.record(raw_path, &resolved, diagnostics);
                        return vec![resolved];
                    }
                }
            }
        }
        let required = matches!(
            kind,
            ImportKind::Chtl | ImportKind::CJmod | ImportKind::Targeted { .. } | ImportKind::Config
        );
        let severity_message = format!("import `{raw_path}` not found in any search root");
        if required {
            diagnostics.push(Diagnostic::error(DiagnosticCategory::Import, severity_message, Position::default()));
        } else {
            diagnostics.push(Diagnostic::warning(DiagnosticCategory::Import, severity_message, Position::default()));
        }
        Vec::new()
    }

    fn resolve_wildcard(&mut self, raw_path: &str, diagnostics: &mut DiagnosticBag) -> Vec<String> {
        let dir_part = raw_path.trim_end_matches(".*").trim_end_matches("/*");
        let mut matches = Vec::new();
        for root in self.search_roots() {
            let dir = root.join(dir_part);
            if let Ok(entries) = std::fs::read_dir(&dir) {
                for entry in entries.flatten() {
                    if entry.path().is_file() {
                        matches.push(entry.path().to_string_lossy().to_string());
                    }
                }
            }
        }
        if matches.is_empty() {
            diagnostics.push(Diagnostic::warning(
                DiagnosticCategory::Import,
                format!("wildcard import `{raw_path}` matched no files"),
                Position::default(),
            ));
        }
        matches.sort();
        matches
    }

    fn finish_single(
        &mut self,
        raw_path: &str,
        candidate: PathBuf,
        kind: &ImportKind,
        diagnostics: &mut DiagnosticBag,
    ) -> Vec<String> {
        if candidate.exists() {
            let resolved = candidate.to_string_lossy().to_string();
            self.record(raw_path, &resolved, diagnostics);
            vec![resolved]
        } else {
            let required = !matches!(kind, ImportKind::Html | ImportKind::Style | ImportKind::JavaScript);
            let message = format!("import `{raw_path}` not found at `{}`", candidate.display());
            if required {
                diagnostics.push(Diagnostic::error(DiagnosticCategory::Import, message, Position::default()));
            } else {
                diagnostics.push(Diagnostic::warning(DiagnosticCategory::Import, message, Position::default()));
            }
            Vec::new()
        }
    }

    /// Record a resolved canonical path; two imports expressed differently
    /// that canonicalize to the same path produce a duplicate-import warning
    /// (spec.md §4.C4), while the same raw path seen twice is silently
    /// deduplicated via `self.cache`.
    fn record(&mut self, raw_key: &str, canonical: &str, diagnostics: &mut DiagnosticBag) {
        self.cache.insert(raw_key.to_string(), canonical.to_string());
        if let Some(previous_key) = self.seen_canonical.get(canonical) {
            if previous_key != raw_key {
                diagnostics.push(Diagnostic::warning(
                    DiagnosticCategory::Import,
                    format!(
                        "import `{raw_key}` canonicalizes to the same path as a previous import `{previous_key}`"
                    ),
                    Position::default(),
                ));
            }
        } else {
            self.seen_canonical.insert(canonical.to_string(), raw_key.to_string());
        }
    }
}

fn split_submodule(path: &str) -> (String, Option<String>) {
    if let Some((module, sub)) = path.split_once('.') {
        if !sub.contains('.') && !module.is_empty() {
            return (module.to_string(), Some(sub.to_string()));
        }
    }
    if let Some((module, sub)) = path.rsplit_once('/') {
        if !module.is_empty() && !sub.is_empty() && Path::new(sub).extension().is_none() {
            return (module.to_string(), Some(sub.to_string()));
        }
    }
    (path.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_path_kinds() {
        assert_eq!(classify("Foo"), PathClass::NameOnly);
        assert_eq!(classify("Foo.chtl"), PathClass::SpecificName);
        assert_eq!(classify("./Foo.chtl"), PathClass::SpecificPath);
        assert_eq!(classify("Foo/"), PathClass::Directory);
        assert_eq!(classify("Foo.*"), PathClass::Wildcard);
    }

    #[test]
    fn splits_submodule_dotted_path() {
        assert_eq!(split_submodule("Mod.Sub"), ("Mod".to_string(), Some("Sub".to_string())));
        assert_eq!(split_submodule("Mod/Sub"), ("Mod".to_string(), Some("Sub".to_string())));
        assert_eq!(split_submodule("Plain"), ("Plain".to_string(), None));
    }

    #[test]
    fn missing_file_is_an_error_for_chtl_kind() {
        let mut resolver = ImportResolver::new(std::env::temp_dir().join("chtl_test_nonexistent"), Vec::new());
        let mut diag = DiagnosticBag::default();
        let result = resolver.resolve(&ImportKind::Chtl, "DoesNotExist", &mut diag);
        assert!(result.is_empty());
        assert!(diag.has_errors());
    }

    #[test]
    fn missing_raw_file_import_is_a_warning() {
        let mut resolver = ImportResolver::new(std::env::temp_dir().join("chtl_test_nonexistent2"), Vec::new());
        let mut diag = DiagnosticBag::default();
        let result = resolver.resolve(&ImportKind::Html, "missing.html", &mut diag);
        assert!(result.is_empty());
        assert!(!diag.has_errors());
    }
}
