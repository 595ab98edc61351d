//! Cross-process object name derivation.
//!
//! Every cache file is guarded by one system-visible named primitive. The
//! name is a pure function of the canonical absolute path, so any process
//! that resolves the same file derives the same name without coordination.
//!
//! # Naming Convention
//!
//! `<namespace-prefix>_<type-tag>_<sanitized path>`, e.g. the cache file
//! `/tmp/cache.bin` is guarded by `Global_mutex__tmp_cache.bin`.
//!
//! Sanitization replaces directory separators (`/`, `\`) and the volume
//! separator (`:`) with `_`, producing an identifier that is valid both as
//! a kernel object name and as a file name for the lock-file backend.
//!
//! # Visibility Scope
//!
//! The `Global` prefix marks the primitive as machine-wide: visible to all
//! users and sessions. On Windows the backend maps it onto the kernel's
//! global object namespace; on Unix the lock file lives in the system temp
//! directory, the closest machine-wide equivalent.

use std::path::Path;

/// Namespace prefix scoping the primitive machine-wide.
pub const NAMESPACE_PREFIX: &str = "Global";

/// Type tag for the exclusive mutex guarding a cache file.
pub const MUTEX_TAG: &str = "mutex";

/// Derive the system-visible object name for a primitive of the given type
/// guarding `path`.
///
/// The derivation is deterministic: equal canonical paths always produce
/// equal names, and two paths that differ in anything other than separator
/// characters never merge.
pub fn object_name(path: &Path, type_tag: &str) -> String {
    let sanitized: String = path
        .to_string_lossy()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect();

    format!("{}_{}_{}", NAMESPACE_PREFIX, type_tag, sanitized)
}

/// Derive the mutex name guarding `path`.
pub fn mutex_name(path: &Path) -> String {
    object_name(path, MUTEX_TAG)
}
