//! JSON Patch apply logic over `serde_json::Value`.

use serde_json::Value;

use super::parse_path;
use super::Operation;
use crate::PatchError;

/// How `test` operations are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Caller-supplied patches: every `test` is checked.
    Strict,
    /// Log replay: logged tests passed when they were written, so they are skipped.
    Replay,
}

/// Applies `patch` to `doc` in order.
///
/// On error `doc` may hold a prefix of the patch; callers that need
/// all-or-nothing semantics apply to a copy.
pub fn apply_patch(
    doc: &mut Value,
    patch: &[Operation],
    mode: ApplyMode,
) -> Result<(), PatchError> {
    for op in patch {
        apply_operation(doc, op, mode)?;
    }
    Ok(())
}

pub fn apply_operation(
    doc: &mut Value,
    op: &Operation,
    mode: ApplyMode,
) -> Result<(), PatchError> {
    match op {
        Operation::Add { path, value } => apply_add(doc, path, value.clone()),
        Operation::Remove { path } => apply_remove(doc, path).map(|_| ()),
        Operation::Replace { path, value } => apply_replace(doc, path, value.clone()),
        Operation::Test { path, value } => match mode {
            ApplyMode::Replay => {
                parse_path(path)?;
                Ok(())
            }
            ApplyMode::Strict => {
                if get_value(doc, path)? == value {
                    Ok(())
                } else {
                    Err(PatchError::TestFailed { path: path.clone() })
                }
            }
        },
        Operation::Copy { path, from } => {
            let value = get_value(doc, from)?.clone();
            apply_add(doc, path, value)
        }
    }
}

/// Resolves `path` against `doc`. Objects are walked by key and arrays by
/// index; any missing segment, or a segment under a scalar, is `NotFound`.
pub fn get_value<'a>(
    doc: &'a Value,
    path: &str,
) -> Result<&'a Value, PatchError> {
    let segments = parse_path(path)?;
    segments.iter().try_fold(doc, |node, key| child(node, key).ok_or_else(|| PatchError::not_found(path, key)))
}

fn child<'a>(
    node: &'a Value,
    key: &str,
) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(key),
        Value::Array(arr) => parse_index(key).and_then(|i| arr.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(
    node: &'a mut Value,
    key: &str,
) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(key),
        Value::Array(arr) => parse_index(key).and_then(move |i| arr.get_mut(i)),
        _ => None,
    }
}

/// Array indices are plain decimal without leading zeros (except `0` itself).
fn parse_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/// Returns the parent container of `path` and the final key, or `None` for the root.
fn parent_mut<'a>(
    doc: &'a mut Value,
    path: &str,
) -> Result<Option<(&'a mut Value, String)>, PatchError> {
    let mut segments = parse_path(path)?;
    let Some(last) = segments.pop() else {
        return Ok(None);
    };
    let mut node = doc;
    for key in &segments {
        node = child_mut(node, key).ok_or_else(|| PatchError::not_found(path, key))?;
    }
    Ok(Some((node, last)))
}

fn apply_add(
    doc: &mut Value,
    path: &str,
    value: Value,
) -> Result<(), PatchError> {
    let Some((parent, key)) = parent_mut(doc, path)? else {
        *doc = value;
        return Ok(());
    };
    match parent {
        Value::Object(map) => {
            map.insert(key, value);
            Ok(())
        }
        Value::Array(arr) => {
            if key == "-" {
                arr.push(value);
                return Ok(());
            }
            let idx = parse_index(&key)
                .filter(|i| *i <= arr.len())
                .ok_or_else(|| PatchError::invalid(format!("Array index '{key}' out of bounds in '{path}'")))?;
            arr.insert(idx, value);
            Ok(())
        }
        _ => Err(PatchError::not_found(path, &key)),
    }
}

fn apply_remove(
    doc: &mut Value,
    path: &str,
) -> Result<Value, PatchError> {
    let Some((parent, key)) = parent_mut(doc, path)? else {
        return Err(PatchError::invalid("Cannot remove the document root"));
    };
    match parent {
        Value::Object(map) => map.shift_remove(&key).ok_or_else(|| PatchError::not_found(path, &key)),
        Value::Array(arr) => match parse_index(&key).filter(|i| *i < arr.len()) {
            Some(idx) => Ok(arr.remove(idx)),
            None => Err(PatchError::not_found(path, &key)),
        },
        _ => Err(PatchError::not_found(path, &key)),
    }
}

fn apply_replace(
    doc: &mut Value,
    path: &str,
    value: Value,
) -> Result<(), PatchError> {
    let Some((parent, key)) = parent_mut(doc, path)? else {
        *doc = value;
        return Ok(());
    };
    let slot = child_mut(parent, &key).ok_or_else(|| PatchError::not_found(path, &key))?;
    *slot = value;
    Ok(())
}
