//! Object-key normalization and prefix arithmetic.
//!
//! Keys are slash-delimited and stored without a leading slash; a trailing
//! slash denotes a directory. Directory keys used for containment tests must
//! go through [`as_dir`] first so prefix comparisons are well-defined on
//! flat namespaces.

/// Strip any leading slashes from a path.
pub fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Normalized key without a trailing slash (file form).
pub fn as_file(path: &str) -> String {
    normalize(path).trim_end_matches('/').to_string()
}

/// Normalized key with a trailing slash (directory form).
///
/// The root is the empty string and stays empty.
pub fn as_dir(path: &str) -> String {
    let path = as_file(path);
    if path.is_empty() {
        path
    } else {
        format!("{path}/")
    }
}

/// Last path segment, ignoring any trailing slash.
pub fn file_name(path: &str) -> &str {
    let trimmed = normalize(path).trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Everything before the last segment, without a trailing slash.
///
/// Returns the empty string for top-level keys.
pub fn parent(path: &str) -> &str {
    let trimmed = normalize(path).trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[..idx],
        None => "",
    }
}

/// Join a prefix and a relative segment, avoiding duplicate separators.
pub fn join(prefix: &str, name: &str) -> String {
    let prefix = as_file(prefix);
    let name = normalize(name);
    if prefix.is_empty() {
        name.to_string()
    } else if name.is_empty() {
        prefix
    } else {
        format!("{prefix}/{name}")
    }
}

/// The part of `key` below the directory `base`.
///
/// With an empty `base` the whole key is relative.
pub fn relative_to<'a>(key: &'a str, base: &str) -> &'a str {
    let key = normalize(key);
    let base = as_dir(base);
    key.strip_prefix(base.as_str()).unwrap_or(key)
}

/// Translate `key` from under the `src` prefix to under the `dest` prefix.
pub fn rebase(key: &str, src: &str, dest: &str) -> String {
    let src_file = as_file(src);
    let key_file = as_file(key);
    if key_file == src_file {
        return as_file(dest);
    }
    join(dest, relative_to(&key_file, &src_file))
}
