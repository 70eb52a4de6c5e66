// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Tagged scalar values exchanged with a device.
//!
//! Device payloads are loosely typed on the wire; this module pins them to an
//! explicit tagged union with named conversion functions instead of relying
//! on implicit runtime coercion.
//!
//! # Examples
//!
//! ```
//! use sigrig_core::value::Value;
//!
//! let flow = Value::Float64(2.5);
//! assert_eq!(flow.as_f64(), Some(2.5));
//!
//! let valve = Value::Bool(true);
//! assert_eq!(valve.as_bool(), Some(true));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Value
// =============================================================================

/// A scalar value read from or written to a device signal.
///
/// Narrower machine types widen on conversion (`i8`/`i16`/`i32` into
/// [`Value::Int64`], `u8`/`u16`/`u32` into [`Value::UInt64`], `f32` into
/// [`Value::Float64`]), so one variant per value family is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// Boolean value.
    Bool(bool),

    /// Signed 64-bit integer.
    Int64(i64),

    /// Unsigned 64-bit integer.
    UInt64(u64),

    /// 64-bit IEEE 754 float.
    Float64(f64),

    /// UTF-8 string.
    String(String),

    /// Absent or unset value.
    Null,
}

impl Value {
    /// Returns the value type name for diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int64(_) => "int64",
            Value::UInt64(_) => "uint64",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
            Value::Null => "null",
        }
    }

    /// Returns `true` if this value is null.
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Attempts to convert this value to a bool.
    ///
    /// Integers convert as zero/non-zero; other types do not convert.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int64(v) => Some(*v != 0),
            Value::UInt64(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Attempts to convert this value to an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(v) => Some(if *v { 1 } else { 0 }),
            Value::Int64(v) => Some(*v),
            Value::UInt64(v) if *v <= i64::MAX as u64 => Some(*v as i64),
            Value::Float64(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Attempts to convert this value to a u64.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Bool(v) => Some(if *v { 1 } else { 0 }),
            Value::Int64(v) if *v >= 0 => Some(*v as u64),
            Value::UInt64(v) => Some(*v),
            Value::Float64(v) if *v >= 0.0 => Some(*v as u64),
            _ => None,
        }
    }

    /// Attempts to convert this value to an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Value::Int64(v) => Some(*v as f64),
            Value::UInt64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to get this value as a string reference.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Null => write!(f, "null"),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

// =============================================================================
// From Conversions
// =============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Int64(v as i64)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int64(v as i64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::UInt64(v as u64)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::UInt64(v as u64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt64(v as u64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float64(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Bool(true).type_name(), "bool");
        assert_eq!(Value::Int64(-3).type_name(), "int64");
        assert_eq!(Value::UInt64(3).type_name(), "uint64");
        assert_eq!(Value::Float64(0.5).type_name(), "float64");
        assert_eq!(Value::String("x".into()).type_name(), "string");
        assert_eq!(Value::Null.type_name(), "null");
    }

    #[test]
    fn test_as_bool() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int64(0).as_bool(), Some(false));
        assert_eq!(Value::UInt64(7).as_bool(), Some(true));
        assert_eq!(Value::String("true".into()).as_bool(), None);
        assert_eq!(Value::Null.as_bool(), None);
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(Value::Int64(-42).as_i64(), Some(-42));
        assert_eq!(Value::UInt64(42).as_i64(), Some(42));
        assert_eq!(Value::UInt64(u64::MAX).as_i64(), None);
        assert_eq!(Value::Float64(3.9).as_i64(), Some(3));
        assert_eq!(Value::Bool(true).as_i64(), Some(1));
    }

    #[test]
    fn test_as_u64_rejects_negative() {
        assert_eq!(Value::Int64(-1).as_u64(), None);
        assert_eq!(Value::Float64(-0.5).as_u64(), None);
        assert_eq!(Value::Int64(5).as_u64(), Some(5));
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(Value::Float64(2.5).as_f64(), Some(2.5));
        assert_eq!(Value::Int64(2).as_f64(), Some(2.0));
        assert_eq!(Value::String("2.5".into()).as_f64(), None);
    }

    #[test]
    fn test_widening_from() {
        assert_eq!(Value::from(3i16), Value::Int64(3));
        assert_eq!(Value::from(3u32), Value::UInt64(3));
        assert_eq!(Value::from(1.5f32), Value::Float64(1.5));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(7u8)), Value::UInt64(7));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Float64(1.5).to_string(), "1.5");
        assert_eq!(Value::String("Idle".into()).to_string(), "Idle");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn test_serde_tagged_form() {
        let json = serde_json::to_string(&Value::Int64(42)).unwrap();
        assert_eq!(json, r#"{"type":"Int64","value":42}"#);

        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::Int64(42));
    }
}
