//! Core types for weld-ui.
//!
//! [`Value`] is the dynamic value that flows through the whole crate:
//! descriptor configuration entries, component state slots, and event
//! payloads all carry it. Keeping it a small closed enum means configs
//! stay plain data that can be cloned, compared, and serialized into
//! attributes without any runtime reflection.

use std::fmt;

// =============================================================================
// Value
// =============================================================================

/// A dynamic configuration/payload value.
///
/// Configuration received by a component, declared state slots, and event
/// payload arguments are all `Value`s. `Null` is the absence marker: it
/// serializes to *no* attribute and is falsy.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent / cleared value.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Borrow the string payload, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Check for the `Null` variant.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render the value as display text (for text-node interpolation).
    ///
    /// `Null` renders as the empty string, matching how missing template
    /// data displays as nothing rather than as a placeholder word.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
        }
    }

    /// Serialize for a DOM attribute. `None` means "do not set the
    /// attribute at all" (the `Null` case).
    pub fn to_attribute(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_text()),
        }
    }

    /// Loose truthiness, used for boolean-ish attribute probes.
    ///
    /// Empty strings, `"false"`, `"0"`, zero numbers, `false` and `Null`
    /// are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty() && s != "false" && s != "0",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
