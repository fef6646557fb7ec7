//! Top-level error type returned by [`crate::compile`] and [`crate::compile_file`].

use thiserror::Error;

use crate::diagnostics::Diagnostic;
use crate::module_manager::ModuleError;

/// Errors that can abort a compilation before a [`crate::CompileResult`] can
/// be produced at all. Recoverable problems (undefined symbol, missing
/// optional import, malformed element) are reported as [`Diagnostic`]s
/// inside a successful `CompileResult` instead — this enum is reserved for
/// conditions the pipeline cannot route around.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to read source file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("module error: {0}")]
    Module(#[from] ModuleError),

    #[error("scanner could not partition source: {0}")]
    Scan(String),

    #[error("compilation aborted after {} diagnostics (max-errors cap reached)", diagnostics.len())]
    Aborted { diagnostics: Vec<Diagnostic> },
}
