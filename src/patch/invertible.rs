//! Rewriting caller patches into loggable, invertible patches.
//!
//! A logged patch never contains `copy`, records the pre-image of every
//! `remove`/`replace` as a preceding `test`, and only carries scalar or empty
//! container values.

use serde_json::Map;
use serde_json::Value;

use super::apply_operation;
use super::child_path;
use super::get_value;
use super::parse_path;
use super::ApplyMode;
use super::Operation;
use super::ROOT;
use crate::PatchError;

/// Result of running a caller patch through [`apply_invertible`].
#[derive(Debug, Clone, PartialEq)]
pub struct InvertiblePatch {
    /// Operations to append to the log.
    pub ops: Vec<Operation>,
    /// The document after the caller patch.
    pub document: Value,
}

/// Returns the invertible, simplified form of `patch` against `document`.
pub fn make_invertible(
    patch: &[Operation],
    document: &Value,
) -> Result<Vec<Operation>, PatchError> {
    apply_invertible(patch, document).map(|p| p.ops)
}

/// Applies `patch` to a copy of `document` with strict semantics and builds
/// the invertible patch along the way.
///
/// Pre-images and copy sources are read from the document as it stands just
/// before each operation, so later operations in one patch may refer to paths
/// created by earlier ones. `document` itself is never modified.
pub fn apply_invertible(
    patch: &[Operation],
    document: &Value,
) -> Result<InvertiblePatch, PatchError> {
    let mut working = document.clone();
    let mut ops = Vec::with_capacity(patch.len());

    for op in patch {
        parse_path(op.path())?;
        match op {
            Operation::Copy { path, from } => {
                let value = get_value(&working, from)?.clone();
                check_root_keys(path, &value)?;
                let add = Operation::Add {
                    path: resolve_append(&working, path)?,
                    value,
                };
                apply_operation(&mut working, &add, ApplyMode::Strict)?;
                ops.extend(simplify(add));
            }
            Operation::Remove { path } | Operation::Replace { path, .. } => {
                if let Some(value) = op.value() {
                    check_root_keys(path, value)?;
                }
                let pre_image = get_value(&working, path)?.clone();
                apply_operation(&mut working, op, ApplyMode::Strict)?;
                ops.extend(simplify(Operation::test(path.clone(), pre_image)));
                ops.extend(simplify(op.clone()));
            }
            Operation::Add { path, value } => {
                check_root_keys(path, value)?;
                let add = Operation::Add {
                    path: resolve_append(&working, path)?,
                    value: value.clone(),
                };
                apply_operation(&mut working, &add, ApplyMode::Strict)?;
                ops.extend(simplify(add));
            }
            Operation::Test { path, value } => {
                check_root_keys(path, value)?;
                apply_operation(&mut working, op, ApplyMode::Strict)?;
                ops.extend(simplify(op.clone()));
            }
        }
    }

    Ok(InvertiblePatch { ops, document: working })
}

/// A `""` key directly under the root has no path of its own (`/` is the
/// root), so its simplified entries would overwrite the whole document.
fn check_root_keys(
    path: &str,
    value: &Value,
) -> Result<(), PatchError> {
    match value {
        Value::Object(map) if path == ROOT && map.contains_key("") => Err(PatchError::invalid(
            "Empty key under the root can not be addressed",
        )),
        _ => Ok(()),
    }
}

/// Decomposes a composite-valued operation into an empty-container shell
/// followed by one operation per child, recursively.
///
/// The shell keeps the operation's kind. Children of an `add`/`replace` shell
/// are `add`s (the shell just created the container); children of a `test`
/// stay `test`s.
pub fn simplify(op: Operation) -> Vec<Operation> {
    let mut out = Vec::new();
    simplify_into(op, &mut out);
    out
}

fn simplify_into(
    mut op: Operation,
    out: &mut Vec<Operation>,
) {
    let empty = match op.value() {
        Some(Value::Array(items)) if !items.is_empty() => Value::Array(Vec::new()),
        Some(Value::Object(map)) if !map.is_empty() => Value::Object(Map::new()),
        _ => {
            out.push(op);
            return;
        }
    };
    // Swap the composite out; what is left in `op` is the shell.
    let value = match &mut op {
        Operation::Add { value, .. } | Operation::Replace { value, .. } | Operation::Test { value, .. } => {
            std::mem::replace(value, empty)
        }
        Operation::Remove { .. } | Operation::Copy { .. } => Value::Null,
    };
    let is_test = op.is_test();
    let path = op.path().to_string();
    out.push(op);

    let children: Vec<(String, Value)> = match value {
        Value::Array(items) => items.into_iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect(),
        Value::Object(map) => map.into_iter().collect(),
        _ => Vec::new(),
    };
    for (key, child) in children {
        let child_path = child_path(&path, &key);
        let child_op = if is_test {
            Operation::test(child_path, child)
        } else {
            Operation::add(child_path, child)
        };
        simplify_into(child_op, out);
    }
}

/// Replaces a trailing `-` (array append) with the concrete index it will
/// occupy, so child paths produced by [`simplify`] address the new element.
fn resolve_append(
    doc: &Value,
    path: &str,
) -> Result<String, PatchError> {
    let Some(parent) = path.strip_suffix("/-") else {
        return Ok(path.to_string());
    };
    let parent = if parent.is_empty() { "/" } else { parent };
    match get_value(doc, parent)? {
        Value::Array(items) => Ok(child_path(parent, &items.len().to_string())),
        _ => Ok(path.to_string()),
    }
}
