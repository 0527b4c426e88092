//! Per-cell conversion: transform, empty check, mapper chain, invalid check.

use std::sync::Arc;

use itertools::Itertools;
use log::debug;

use crate::{
    error::{CellError, ConfigError},
    fallback::{FallbackContext, FallbackItem},
    mappers::{CellInput, CellMapper, MapOutcome, ScalarMapper},
    shape::ScalarKind,
    source::Cell,
    transform::CellTransformer,
    value::Value,
};

/// Converts one logical cell into a typed [`Value`].
///
/// The type-specific converter, if any, runs first in the mapper chain;
/// explicitly added mappers follow it so that lookups can override or
/// rescue its result.
#[derive(Debug, Clone)]
pub struct ValuePipeline {
    target: String,
    kind: Option<ScalarKind>,
    transformers: Vec<Arc<dyn CellTransformer>>,
    converter: Option<Arc<dyn CellMapper>>,
    mappers: Vec<Arc<dyn CellMapper>>,
    empty_fallback: Option<Arc<dyn FallbackItem>>,
    invalid_fallback: Option<Arc<dyn FallbackItem>>,
}

impl ValuePipeline {
    /// Pipeline without a converter; at least one mapper must be added before
    /// it can be attached to a class map.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            kind: None,
            transformers: Vec::new(),
            converter: None,
            mappers: Vec::new(),
            empty_fallback: None,
            invalid_fallback: None,
        }
    }

    pub fn for_kind(kind: ScalarKind) -> Self {
        let mut pipeline = Self::new(kind.name());
        pipeline.kind = Some(kind);
        pipeline.converter = Some(Arc::new(ScalarMapper::new(kind)));
        pipeline
    }

    pub fn with_converter(target: impl Into<String>, converter: Arc<dyn CellMapper>) -> Self {
        let mut pipeline = Self::new(target);
        pipeline.converter = Some(converter);
        pipeline
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn kind(&self) -> Option<ScalarKind> {
        self.kind
    }

    pub fn add_transformer(&mut self, transformer: Arc<dyn CellTransformer>) -> &mut Self {
        self.transformers.push(transformer);
        self
    }

    pub fn add_mapper(&mut self, mapper: Arc<dyn CellMapper>) -> &mut Self {
        self.mappers.push(mapper);
        self
    }

    pub fn set_converter(&mut self, converter: Option<Arc<dyn CellMapper>>) -> &mut Self {
        self.converter = converter;
        self
    }

    pub fn set_empty_fallback(&mut self, item: Option<Arc<dyn FallbackItem>>) -> &mut Self {
        self.empty_fallback = item;
        self
    }

    pub fn set_invalid_fallback(&mut self, item: Option<Arc<dyn FallbackItem>>) -> &mut Self {
        self.invalid_fallback = item;
        self
    }

    /// Replaces the converter's format list. Only temporal kinds take formats.
    pub fn set_formats(&mut self, formats: Vec<String>) -> Result<&mut Self, ConfigError> {
        let kind = self.kind.ok_or_else(|| ConfigError::Unsupported {
            operation: "apply format strings".to_string(),
            target: self.target.clone(),
        })?;
        self.converter = Some(Arc::new(ScalarMapper::with_formats(kind, formats)?));
        Ok(self)
    }

    /// Fails unless the pipeline can produce a value on its own.
    pub fn ensure_final(&self) -> Result<(), ConfigError> {
        if self.converter.is_none() && self.mappers.is_empty() {
            return Err(ConfigError::MissingMapper {
                target: self.target.clone(),
            });
        }
        Ok(())
    }

    /// Runs every stage for one cell. `text` is the cell text the caller
    /// chose to read (raw or display-formatted).
    pub fn execute(
        &self,
        column: Option<usize>,
        raw: &Cell,
        text: Option<String>,
    ) -> Result<Value, CellError> {
        let text = self
            .transformers
            .iter()
            .fold(text, |current, transformer| transformer.transform(current));

        let is_empty = text.as_deref().is_none_or(str::is_empty);
        if is_empty && let Some(fallback) = &self.empty_fallback {
            debug!("Empty cell for {} at column {column:?}; using {fallback:?}", self.target);
            return fallback.perform(&FallbackContext {
                target: &self.target,
                column,
                text: None,
                reason: None,
            });
        }

        let text = text.unwrap_or_default();
        let input = CellInput {
            column,
            raw,
            text: &text,
        };
        let mut candidate: Option<Result<Value, String>> = None;
        for mapper in self.converter.iter().chain(self.mappers.iter()) {
            match mapper.map(&input) {
                MapOutcome::Success(value) => candidate = Some(Ok(value)),
                MapOutcome::SuccessAndStop(value) => {
                    candidate = Some(Ok(value));
                    break;
                }
                MapOutcome::Ignore => {}
                MapOutcome::Invalid(reason) => candidate = Some(Err(reason)),
                MapOutcome::InvalidAndStop(reason) => {
                    candidate = Some(Err(reason));
                    break;
                }
            }
        }

        let reason = match candidate {
            Some(Ok(value)) => return Ok(value),
            Some(Err(reason)) => reason,
            None => "no mapper accepted the value".to_string(),
        };
        if let Some(fallback) = &self.invalid_fallback {
            debug!(
                "Invalid value '{text}' for {} at column {column:?}: {reason}; using {fallback:?}",
                self.target
            );
            return fallback.perform(&FallbackContext {
                target: &self.target,
                column,
                text: Some(&text),
                reason: Some(&reason),
            });
        }
        if is_empty {
            return Err(CellError::EmptyValue {
                target: self.target.clone(),
            });
        }
        Err(CellError::Conversion {
            value: text,
            target: self.target.clone(),
            reason,
        })
    }

    /// Convenience for callers holding plain text.
    pub fn execute_text(&self, text: &str) -> Result<Value, CellError> {
        let raw = Cell::from(text);
        self.execute(None, &raw, raw.to_text())
    }

    /// One-line summary: transformers, mappers and fallbacks.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.transformers.is_empty() {
            parts.push(format!(
                "transform {}",
                self.transformers.iter().map(|t| format!("{t:?}")).join(" > ")
            ));
        }
        let mappers = self
            .converter
            .iter()
            .chain(self.mappers.iter())
            .map(|mapper| mapper.describe())
            .join(" > ");
        parts.push(if mappers.is_empty() {
            "no mappers".to_string()
        } else {
            mappers
        });
        if let Some(item) = &self.empty_fallback {
            parts.push(format!("empty {item:?}"));
        }
        if let Some(item) = &self.invalid_fallback {
            parts.push(format!("invalid {item:?}"));
        }
        parts.join("; ")
    }
}
