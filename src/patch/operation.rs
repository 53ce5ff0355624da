use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// A single JSON-Patch style edit.
///
/// Serialized form is the log line format, e.g.
/// `{"op":"add","path":"/a/b","value":1}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Test { path: String, value: Value },
    Copy { path: String, from: String },
}

impl Operation {
    pub fn add(
        path: impl Into<String>,
        value: Value,
    ) -> Self {
        Operation::Add {
            path: path.into(),
            value,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Operation::Remove { path: path.into() }
    }

    pub fn replace(
        path: impl Into<String>,
        value: Value,
    ) -> Self {
        Operation::Replace {
            path: path.into(),
            value,
        }
    }

    pub fn test(
        path: impl Into<String>,
        value: Value,
    ) -> Self {
        Operation::Test {
            path: path.into(),
            value,
        }
    }

    pub fn copy(
        from: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Operation::Copy {
            path: path.into(),
            from: from.into(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Operation::Add { path, .. }
            | Operation::Remove { path }
            | Operation::Replace { path, .. }
            | Operation::Test { path, .. }
            | Operation::Copy { path, .. } => path,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Operation::Add { value, .. } | Operation::Replace { value, .. } | Operation::Test { value, .. } => {
                Some(value)
            }
            Operation::Remove { .. } | Operation::Copy { .. } => None,
        }
    }

    /// The `op` tag as written to the log.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Add { .. } => "add",
            Operation::Remove { .. } => "remove",
            Operation::Replace { .. } => "replace",
            Operation::Test { .. } => "test",
            Operation::Copy { .. } => "copy",
        }
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Operation::Test { .. })
    }

    /// One log line, without the trailing newline.
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
