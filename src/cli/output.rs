//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::GenerationError;

/// Map domain errors to a string for CLI output, prefixed by category.
pub fn map_error(e: &GenerationError) -> String {
    let notice = e.notice();
    format!("{}: {}", notice.title, notice.message)
}
