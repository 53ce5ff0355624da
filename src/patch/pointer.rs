//! Slash-delimited document paths.
//!
//! The root is written `/`. Segments use RFC 6901 escaping (`~0` for `~`,
//! `~1` for `/`), so a raw path string can be split on `/` without looking
//! inside keys.

use crate::PatchError;

pub const ROOT: &str = "/";

/// Splits `path` into unescaped segments. `/` yields no segments.
pub fn parse_path(path: &str) -> Result<Vec<String>, PatchError> {
    if !path.starts_with('/') {
        return Err(PatchError::invalid(format!("Path must begin with a \"/\": {path:?}")));
    }
    if path == ROOT {
        return Ok(Vec::new());
    }
    Ok(path[1..].split('/').map(unescape).collect())
}

/// Appends one (unescaped) key to `parent`.
pub fn child_path(
    parent: &str,
    key: &str,
) -> String {
    let key = escape(key);
    if parent == ROOT {
        format!("/{key}")
    } else {
        format!("{parent}/{key}")
    }
}

/// Segment-aware prefix test: `/a` covers `/a` and `/a/b` but not `/ab`.
/// A prefix of `/` (or empty) covers every path. A trailing slash on the
/// prefix is ignored.
pub fn path_starts_with(
    path: &str,
    prefix: &str,
) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// `path` itself followed by each of its ancestors, ending with the root.
pub(crate) fn self_and_ancestors(path: &str) -> impl Iterator<Item = &str> {
    let cuts = path
        .char_indices()
        .filter(|(i, c)| *c == '/' && *i > 0)
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    let own = if path == ROOT { None } else { Some(path) };
    own.into_iter()
        .chain(cuts.into_iter().rev().map(move |i| &path[..i]))
        .chain(std::iter::once(ROOT))
}

fn escape(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}
