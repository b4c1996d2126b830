//! Helpers for working with the resource paths a pilet declares.

use super::{FRAMEWORK_MARKER, MODULE_EXTENSION, SYMBOL_EXTENSION};

/// Whether the path points at a binary module.
pub fn is_module_reference(url: &str) -> bool {
    url.ends_with(MODULE_EXTENSION)
}

/// Derive the debug-symbol path paired with a module path.
pub fn to_symbol_path(url: &str) -> String {
    let front = url.strip_suffix(MODULE_EXTENSION).unwrap_or(url);
    format!("{}{}", front, SYMBOL_EXTENSION)
}

/// The last path segment of a resource url.
pub fn file_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// The symbol path for `url`, but only when the pilet actually ships it.
pub fn declared_symbol_path(url: &str, references: &[String]) -> Option<String> {
    let symbol = to_symbol_path(url);
    references.iter().any(|r| *r == symbol).then_some(symbol)
}

/// Base url of a pilet derived from its primary module url.
///
/// Drops the trailing segment and the `_framework` folder the host keeps its
/// assemblies in.
pub fn derive_base_url(module_url: &str) -> String {
    let parent = match module_url.rfind('/') {
        Some(idx) => &module_url[..idx],
        None => "",
    };
    let marker = format!("/{}/", FRAMEWORK_MARKER);
    let base = parent.replacen(&marker, "/", 1);
    let trailing = format!("/{}", FRAMEWORK_MARKER);

    match base.strip_suffix(&trailing) {
        Some(stripped) => stripped.to_string(),
        None => base,
    }
}

/// Split the module references into auxiliary dependencies and the primary
/// module (the last one declared).
pub fn partition_modules(references: &[String]) -> Option<(Vec<String>, String)> {
    let mut modules: Vec<String> = references
        .iter()
        .filter(|r| is_module_reference(r))
        .cloned()
        .collect();
    let primary = modules.pop()?;
    Some((modules, primary))
}
