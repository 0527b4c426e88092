//! Fallback items invoked when a cell is empty or cannot be converted.

use std::fmt;

use crate::{error::CellError, value::Value};

/// Everything a fallback knows about the cell it substitutes for.
#[derive(Debug, Clone)]
pub struct FallbackContext<'a> {
    pub target: &'a str,
    pub column: Option<usize>,
    pub text: Option<&'a str>,
    /// Why conversion failed; `None` for empty cells.
    pub reason: Option<&'a str>,
}

pub trait FallbackItem: fmt::Debug + Send + Sync {
    fn perform(&self, context: &FallbackContext<'_>) -> Result<Value, CellError>;
}

/// Substitutes a fixed value.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedValue(pub Value);

impl FixedValue {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }
}

impl FallbackItem for FixedValue {
    fn perform(&self, _context: &FallbackContext<'_>) -> Result<Value, CellError> {
        Ok(self.0.clone())
    }
}

/// Produces `Null`, which optional targets read as `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullValue;

impl FallbackItem for NullValue {
    fn perform(&self, _context: &FallbackContext<'_>) -> Result<Value, CellError> {
        Ok(Value::Null)
    }
}

/// Fails the cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThrowFallback;

impl FallbackItem for ThrowFallback {
    fn perform(&self, context: &FallbackContext<'_>) -> Result<Value, CellError> {
        Err(match context.reason {
            Some(reason) => CellError::Conversion {
                value: context.text.unwrap_or_default().to_string(),
                target: context.target.to_string(),
                reason: reason.to_string(),
            },
            None => CellError::EmptyValue {
                target: context.target.to_string(),
            },
        })
    }
}

/// What auto-mapped scalars do with empty cells when nothing else is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyValueStrategy {
    /// Fail when the target type cannot represent an empty cell.
    #[default]
    ThrowIfPrimitive,
    /// Use the target type's default value.
    SetToDefaultValue,
}
