use std::sync::Arc;

use crate::error::{PlateError, Result};
use crate::value::{Value, ValueKind};

/// Typed column vector. `None` represents a missing value.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Str(Vec<Option<Arc<str>>>),
}

impl Column {
    /// Create an empty column of the given kind. `Undefined` maps to Float
    /// so that null-only columns participate in numeric operations.
    pub fn empty(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Integer => Column::Integer(Vec::new()),
            ValueKind::Float | ValueKind::Undefined => Column::Float(Vec::new()),
            ValueKind::Str => Column::Str(Vec::new()),
        }
    }

    /// A column of `len` copies of a constant value.
    pub fn constant(value: &Value, len: usize) -> Self {
        let mut col = Column::empty(value.kind());
        for _ in 0..len {
            // push of a value into a column of its own kind cannot fail
            let _ = col.push(value);
        }
        col
    }

    /// A Float column of `len` missing values.
    pub fn nulls(len: usize) -> Self {
        Column::Float(vec![None; len])
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Integer(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Column::Integer(_) => ValueKind::Integer,
            Column::Float(_) => ValueKind::Float,
            Column::Str(_) => ValueKind::Str,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.kind().is_numeric()
    }

    /// Push a scalar. Integers are accepted into Float columns (widened);
    /// any other kind mismatch is a type error.
    pub fn push(&mut self, value: &Value) -> Result<()> {
        match (self, value) {
            (Column::Integer(v), Value::Integer(i)) => v.push(Some(*i)),
            (Column::Integer(v), Value::Undefined) => v.push(None),
            (Column::Float(v), Value::Float(f)) => v.push(Some(*f)),
            (Column::Float(v), Value::Integer(i)) => v.push(Some(*i as f64)),
            (Column::Float(v), Value::Undefined) => v.push(None),
            (Column::Str(v), Value::Str(s)) => v.push(Some(s.clone())),
            (Column::Str(v), Value::Undefined) => v.push(None),
            (col, val) => {
                return Err(PlateError::Type(format!(
                    "cannot push {} value into {} column",
                    val.kind(),
                    col.kind()
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Value {
        match self {
            Column::Integer(v) => match v[index] {
                Some(i) => Value::Integer(i),
                None => Value::Undefined,
            },
            Column::Float(v) => match v[index] {
                Some(f) => Value::Float(f),
                None => Value::Undefined,
            },
            Column::Str(v) => match &v[index] {
                Some(s) => Value::Str(s.clone()),
                None => Value::Undefined,
            },
        }
    }

    /// Extend with another column of the same kind.
    pub fn extend(&mut self, other: &Column) -> Result<()> {
        match (self, other) {
            (Column::Integer(a), Column::Integer(b)) => a.extend_from_slice(b),
            (Column::Float(a), Column::Float(b)) => a.extend_from_slice(b),
            (Column::Float(a), Column::Integer(b)) => {
                a.extend(b.iter().map(|v| v.map(|i| i as f64)))
            }
            (Column::Str(a), Column::Str(b)) => a.extend_from_slice(b),
            (a, b) => {
                return Err(PlateError::Type(format!(
                    "cannot extend {} column with {} column",
                    a.kind(),
                    b.kind()
                )));
            }
        }
        Ok(())
    }

    /// Count of missing entries.
    pub fn null_count(&self) -> usize {
        match self {
            Column::Integer(v) => v.iter().filter(|x| x.is_none()).count(),
            Column::Float(v) => v.iter().filter(|x| x.is_none()).count(),
            Column::Str(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Whether every entry is missing.
    pub fn all_null(&self) -> bool {
        self.null_count() == self.len()
    }

    /// Convert to a Float column; integers widen, strings become missing.
    pub fn cast_float(&self) -> Column {
        match self {
            Column::Integer(v) => Column::Float(v.iter().map(|x| x.map(|i| i as f64)).collect()),
            Column::Float(v) => Column::Float(v.clone()),
            Column::Str(v) => Column::Float(vec![None; v.len()]),
        }
    }

    /// Narrow 64-bit numerics to 32-bit width. Floats round-trip through
    /// f32; integers outside the i32 range are left as-is.
    pub fn narrow(&self) -> Column {
        match self {
            Column::Float(v) => {
                Column::Float(v.iter().map(|x| x.map(|f| f as f32 as f64)).collect())
            }
            Column::Integer(v) => Column::Integer(
                v.iter()
                    .map(|x| {
                        x.map(|i| {
                            if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
                                i as i32 as i64
                            } else {
                                i
                            }
                        })
                    })
                    .collect(),
            ),
            Column::Str(v) => Column::Str(v.clone()),
        }
    }

    /// Non-missing values as f64 (numeric columns only; strings yield none).
    pub fn numeric_values(&self) -> Vec<f64> {
        match self {
            Column::Integer(v) => v.iter().filter_map(|x| x.map(|i| i as f64)).collect(),
            Column::Float(v) => v.iter().filter_map(|x| *x).collect(),
            Column::Str(_) => Vec::new(),
        }
    }
}
