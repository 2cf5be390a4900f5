//! Purpose: Slash normalization and leaf-name helpers for handle paths.
//! Exports: `normalize_slashes`, `join`, `leaf_name`, `sibling`, `split_name`, `validate_leaf`.
//! Role: Single source of path-string semantics for handles, paste, and the CLI.
//! Invariants: Every path handed to the OS has had `\` rewritten to `/`.
//! Invariants: A leaf name never contains a separator and is never `.` or `..`.

use crate::core::error::{Error, ErrorKind};

pub fn normalize_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// Appends a relative path below `base`, collapsing the separator between them.
pub fn join(base: &str, relative: &str) -> String {
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() {
        return base.to_string();
    }
    if base.is_empty() {
        return relative.to_string();
    }
    let trimmed = base.trim_end_matches('/');
    if trimmed.is_empty() {
        // base was the filesystem root
        return format!("/{relative}");
    }
    format!("{trimmed}/{relative}")
}

/// Final path segment, ignoring trailing separators. The root is its own name.
pub fn leaf_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.starts_with('/') { "/" } else { "" };
    }
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Path of `name` inside the same parent directory as `path`.
pub fn sibling(path: &str, name: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => format!("/{name}"),
        Some(idx) => format!("{}/{name}", &trimmed[..idx]),
        None => name.to_string(),
    }
}

/// Splits a leaf name into `(prefix, suffix)`.
///
/// The suffix runs from the last `.` to the end. A dot at position 0 marks a
/// hidden file, not an extension, so `.env` yields (`.env`, ``). When the
/// prefix would be empty the whole name is used instead.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && name != ".." => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

pub fn validate_leaf(name: &str) -> Result<(), Error> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("invalid name {name:?}"))
            .with_hint("Provide a plain file name such as `report.txt`."));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("rename takes a leaf name, not a path")
            .with_hint("Use move to relocate into another directory."));
    }
    Ok(())
}
