//! Module manager (component N): loads a packaged `.cmod`/`.cjmod` archive
//! (a zip file per spec.md §4.N), validates its manifest, and exposes a
//! read-only, `Arc`-shareable index of what it exports and where its
//! submodules live on disk after extraction.
//!
//! Grounded on the teacher's archive-reading style in its asset pipeline:
//! read the whole archive up front into an in-memory index rather than
//! re-opening the zip file per lookup.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("failed to open module archive {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a valid zip archive: {source}")]
    Zip {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("module archive {path} has no [Info] block")]
    MissingInfo { path: String },

    #[error("module archive {path} declares name `{declared}`, which does not match its directory name `{expected}`")]
    NameMismatch { path: String, declared: String, expected: String },

    #[error("module archive {path} has no top-level `src/` directory")]
    MissingSrc { path: String },

    #[error("failed to read entry {entry} from {path}: {source}")]
    Entry {
        path: String,
        entry: String,
        #[source]
        source: std::io::Error,
    },
}

/// A `[Export]` entry: the name a consumer writes in an `Import` statement,
/// mapped to the file (relative to the module root) that satisfies it.
#[derive(Debug, Clone)]
pub struct ExportEntry {
    pub name: String,
    pub relative_path: String,
}

/// Manifest metadata parsed from a module's `[Info]` block.
#[derive(Debug, Clone, Default)]
pub struct ModuleInfo {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub extra: IndexMap<String, String>,
}

/// A loaded module's read-only index: its manifest, its declared exports,
/// and the `src/Sub/` submodule tree discovered inside the archive. Wrapped
/// in `Arc` by [`ModuleManager`] so a module loaded once can be shared
/// across every compilation unit that imports it.
#[derive(Debug, Clone)]
pub struct ModuleHandle {
    pub info: ModuleInfo,
    pub exports: Vec<ExportEntry>,
    /// Submodule name (`Mod.Sub` / `Mod/Sub`) -> path to its `src/Sub`
    /// directory inside the extracted module, per spec.md §4.C4.
    pub submodules: IndexMap<String, PathBuf>,
    /// All file entries found under `src/`, relative path -> decoded text.
    pub sources: HashMap<String, String>,
    pub root: PathBuf,
}

impl ModuleHandle {
    pub fn export(&self, name: &str) -> Option<&ExportEntry> {
        self.exports.iter().find(|e| e.name == name)
    }
}

/// Loads and caches module archives for one compilation run.
#[derive(Debug, Default)]
pub struct ModuleManager {
    cache: HashMap<String, Arc<ModuleHandle>>,
}

impl ModuleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the module at `path` (a `.cmod` or `.cjmod` zip archive),
    /// reusing a previously loaded handle for the same canonical path.
    pub fn load(&mut self, path: &Path) -> Result<Arc<ModuleHandle>, ModuleError> {
        let key = path.to_string_lossy().to_string();
        if let Some(handle) = self.cache.get(&key) {
            return Ok(Arc::clone(handle));
        }

        let handle = Arc::new(load_archive(path)?);
        self.cache.insert(key, Arc::clone(&handle));
        Ok(handle)
    }
}

fn load_archive(path: &Path) -> Result<ModuleHandle, ModuleError> {
    let path_str = path.to_string_lossy().to_string();
    let file = std::fs::File::open(path).map_err(|source| ModuleError::Open { path: path_str.clone(), source })?;
    let mut archive =
        ZipArchive::new(file).map_err(|source| ModuleError::Zip { path: path_str.clone(), source })?;

    let mut sources = HashMap::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|source| ModuleError::Zip { path: path_str.clone(), source })?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut contents = String::new();
        entry
            .read_to_string(&mut contents)
            .map_err(|source| ModuleError::Entry { path: path_str.clone(), entry: name.clone(), source })?;
        sources.insert(name, contents);
    }

    let info_text = sources
        .iter()
        .find(|(name, _)| name.ends_with("info.chtl") || name.ends_with("module.info"))
        .map(|(_, text)| text.clone())
        .ok_or_else(|| ModuleError::MissingInfo { path: path_str.clone() })?;

    let info = parse_info_block(&info_text);

    let expected_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    if !info.name.is_empty() && info.name != expected_name {
        return Err(ModuleError::NameMismatch {
            path: path_str.clone(),
            declared: info.name.clone(),
            expected: expected_name,
        });
    }

    if !sources.keys().any(|name| name.starts_with("src/")) {
        return Err(ModuleError::MissingSrc { path: path_str });
    }

    let exports = parse_export_block(&info_text);

    let mut submodules = IndexMap::new();
    for name in sources.keys() {
        if let Some(rest) = name.strip_prefix("src/") {
            if let Some((sub, _)) = rest.split_once('/') {
                submodules
                    .entry(sub.to_string())
                    .or_insert_with(|| PathBuf::from(format!("src/{sub}")));
            }
        }
    }

    Ok(ModuleHandle { info, exports, submodules, sources, root: path.to_path_buf() })
}

/// Parses the simple `[Info] { key: "value"; ... }` manifest block shape
/// (spec.md §4.N). Not a full CHTL parse — modules ship a small, flat
/// key/value manifest, not arbitrary CHTL syntax.
fn parse_info_block(text: &str) -> ModuleInfo {
    let mut info = ModuleInfo::default();
    let Some(body) = extract_block(text, "[Info]") else {
        return info;
    };
    for (key, value) in iter_key_values(&body) {
        match key.as_str() {
            "name" => info.name = value,
            "version" => info.version = Some(value),
            "description" => info.description = Some(value),
            "author" => info.author = Some(value),
            other => {
                info.extra.insert(other.to_string(), value);
            }
        }
    }
    info
}

fn parse_export_block(text: &str) -> Vec<ExportEntry> {
    let Some(body) = extract_block(text, "[Export]") else {
        return Vec::new();
    };
    iter_key_values(&body)
        .map(|(name, relative_path)| ExportEntry { name, relative_path })
        .collect()
}

fn extract_block(text: &str, header: &str) -> Option<String> {
    let start = text.find(header)? + header.len();
    let open = text[start..].find('{')? + start + 1;
    let mut depth = 1;
    let mut end = open;
    for (i, c) in text[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = open + i;
                    break;
                }
            }
            _ => {}
        }
    }
    Some(text[open..end].to_string())
}

fn iter_key_values(body: &str) -> impl Iterator<Item = (String, String)> + '_ {
    body.split(';').filter_map(|entry| {
        let (key, value) = entry.split_once(':')?;
        let key = key.trim().to_string();
        let value = value.trim().trim_matches('"').to_string();
        if key.is_empty() {
            None
        } else {
            Some((key, value))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_info_block_key_values() {
        let text = r#"[Info] { name: "Shapes"; version: "1.0.0"; author: "team"; }"#;
        let info = parse_info_block(text);
        assert_eq!(info.name, "Shapes");
        assert_eq!(info.version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn parses_export_block_name_to_path_map() {
        let text = r#"[Export] { Button: "src/Button.chtl"; Card: "src/Card.chtl"; }"#;
        let exports = parse_export_block(text);
        assert_eq!(exports.len(), 2);
        assert_eq!(exports[0].name, "Button");
        assert_eq!(exports[0].relative_path, "src/Button.chtl");
    }

    #[test]
    fn nested_braces_in_block_do_not_truncate_extraction() {
        let text = r#"[Info] { name: "X"; description: "has a { brace } inside"; }"#;
        let info = parse_info_block(text);
        assert_eq!(info.name, "X");
    }
}
