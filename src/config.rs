//! Compiler configuration: the `compile(source, options)` surface plus the
//! `[Configuration]` block's option map, name-group overrides and origin-type
//! sub-map (spec.md §6). Shaped after the teacher's `options.rs`
//! (`DomExpressionsOptions`): a plain `Default`-able struct with builder
//! methods, `serde(default)` so partial JSON/manifest input still works.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Options accepted by [`crate::compile`] / [`crate::compile_file`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerConfig {
    /// Re-indent and insert newlines in generated HTML/CSS/JS.
    pub pretty_print: bool,
    /// Include extra diagnostic detail (emits `Info`-level position traces).
    pub debug_mode: bool,
    /// Escalate certain warnings (e.g. canonicalization mismatches) to errors.
    pub strict_mode: bool,
    /// Extra search roots for the Import Resolver (component C4), appended
    /// after the three built-in roots.
    pub include_paths: Vec<String>,
    /// Maximum number of `Error`/`Fatal` diagnostics before the pipeline
    /// halts (spec.md §7).
    pub max_errors: usize,
    /// The `[Configuration]` block's option/name-group surface.
    pub configuration: Configuration,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            pretty_print: false,
            debug_mode: false,
            strict_mode: false,
            include_paths: Vec::new(),
            max_errors: 100,
            configuration: Configuration::default(),
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn with_include_path(mut self, path: impl Into<String>) -> Self {
        self.include_paths.push(path.into());
        self
    }

    /// Merge a source-level `[Configuration] { … }` block on top of this
    /// baseline, source settings winning (spec.md §12 / Open Question 4).
    pub fn merge_source_block(&mut self, block: &Configuration) {
        for (k, v) in &block.options {
            self.configuration.options.insert(k.clone(), v.clone());
        }
        for (k, v) in &block.name_groups {
            self.configuration.name_groups.insert(k.clone(), v.clone());
        }
        for (k, v) in &block.origin_types {
            self.configuration.origin_types.insert(k.clone(), v.clone());
        }
        if let Some(v) = block.index_initial_count {
            self.configuration.index_initial_count = Some(v);
        }
    }
}

/// The recognized `[Configuration]` surface: option map, name-group
/// sub-map, and origin-type sub-map, per spec.md §6.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    /// `INDEX_INITIAL_COUNT`: advisory starting value for generator
    /// auto-numbering counters (Open Question 4; see DESIGN.md).
    pub index_initial_count: Option<u32>,
    /// Boolean switches: `DISABLE_NAME_GROUP`, `DISABLE_CUSTOM_ORIGIN_TYPE`,
    /// `DEBUG_MODE`, `DISABLE_STYLE_AUTO_ADD_CLASS`,
    /// `DISABLE_STYLE_AUTO_ADD_ID`, `DISABLE_SCRIPT_AUTO_ADD_CLASS`,
    /// `DISABLE_SCRIPT_AUTO_ADD_ID`, `DISABLE_DEFAULT_NAMESPACE`.
    pub options: IndexMap<String, bool>,
    /// Renamed spellings of built-in block openers/keywords: `CUSTOM_STYLE`,
    /// `CUSTOM_ELEMENT`, `CUSTOM_VAR`, `TEMPLATE_STYLE`, `TEMPLATE_ELEMENT`,
    /// `TEMPLATE_VAR`, `ORIGIN_HTML`, `ORIGIN_STYLE`, `ORIGIN_JAVASCRIPT`,
    /// `IMPORT_*`, `CONFIGURATION_CONFIG`, `KEYWORD_*`.
    pub name_groups: IndexMap<String, String>,
    /// Custom origin type tag overrides/extensions.
    pub origin_types: IndexMap<String, String>,
}

impl Configuration {
    pub fn option(&self, key: &str) -> bool {
        self.options.get(key).copied().unwrap_or(false)
    }

    pub fn name_for(&self, default_spelling: &str) -> &str {
        self.name_groups
            .get(default_spelling)
            .map(String::as_str)
            .unwrap_or(default_spelling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_config_overrides_baseline() {
        let mut base = CompilerConfig::default();
        let mut block = Configuration::default();
        block.options.insert("DISABLE_STYLE_AUTO_ADD_ID".to_string(), true);
        block.index_initial_count = Some(5);
        base.merge_source_block(&block);
        assert!(base.configuration.option("DISABLE_STYLE_AUTO_ADD_ID"));
        assert_eq!(base.configuration.index_initial_count, Some(5));
    }

    #[test]
    fn name_group_falls_back_to_default_spelling() {
        let config = Configuration::default();
        assert_eq!(config.name_for("TEMPLATE_ELEMENT"), "TEMPLATE_ELEMENT");
    }
}
