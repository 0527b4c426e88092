//! Builds map trees from type shapes when the caller gave no explicit rules.
//!
//! Classification follows a fixed order: scalar-like shapes (built-in
//! scalars, enums and `FromStr` types) first, then dictionaries, then
//! sequences, and finally objects, whose fields are mapped recursively.

use std::sync::Arc;

use log::debug;

use crate::{
    column::ColumnSpec,
    convert::FromValue,
    error::ConfigError,
    fallback::{EmptyValueStrategy, FallbackItem, FixedValue, NullValue, ThrowFallback},
    map::{
        ArrayIndexerMap, DEFAULT_SEPARATORS, DictionaryIndexerMap, DictionaryMap, ElementSource,
        EnumerableMap, Map, ObjectMap, ScalarMap,
    },
    mappers::{EnumMapper, ParsableMapper},
    materialize::MaterializerRegistry,
    pipeline::ValuePipeline,
    shape::{FieldConfig, FieldShape, ObjectShape, SequenceShape, Shape},
};

#[derive(Debug, Clone, Default)]
pub struct AutoMapper {
    empty_strategy: EmptyValueStrategy,
    materializers: MaterializerRegistry,
}

impl AutoMapper {
    pub fn new(empty_strategy: EmptyValueStrategy) -> Self {
        Self {
            empty_strategy,
            materializers: MaterializerRegistry::default(),
        }
    }

    pub fn with_materializers(mut self, materializers: MaterializerRegistry) -> Self {
        self.materializers = materializers;
        self
    }

    pub fn empty_strategy(&self) -> EmptyValueStrategy {
        self.empty_strategy
    }

    pub fn materializers(&self) -> &MaterializerRegistry {
        &self.materializers
    }

    pub fn materializers_mut(&mut self) -> &mut MaterializerRegistry {
        &mut self.materializers
    }

    pub fn map_type<T: FromValue>(&self) -> Result<Map, ConfigError> {
        self.map_root(&T::shape())
    }

    /// Map for a type read as a whole row. Bare collections and dictionaries
    /// take every column; a bare scalar reads the first column.
    pub fn map_root(&self, shape: &Shape) -> Result<Map, ConfigError> {
        let label = shape.type_name();
        let config = FieldConfig {
            column: match shape.required() {
                Shape::Object(_) => None,
                Shape::Sequence(_) | Shape::Dictionary(_) => Some(ColumnSpec::AllColumns),
                _ => Some(ColumnSpec::Index(0)),
            },
            ..FieldConfig::default()
        };
        self.map_shape(&label, shape, &config, &mut Vec::new())
    }

    /// Map for one field of `owner`, honouring its declared configuration.
    pub fn map_field(&self, owner: &ObjectShape, field: &FieldShape) -> Result<Map, ConfigError> {
        self.map_field_in(owner, field, &mut vec![owner.type_name.clone()])
    }

    /// Map for an element addressed by index or key, reading `column`.
    pub fn map_element(
        &self,
        label: &str,
        shape: &Shape,
        column: ColumnSpec,
    ) -> Result<Map, ConfigError> {
        let config = FieldConfig {
            column: Some(column),
            ..FieldConfig::default()
        };
        self.map_shape(label, shape, &config, &mut Vec::new())
    }

    fn map_object(
        &self,
        shape: &ObjectShape,
        stack: &mut Vec<String>,
    ) -> Result<ObjectMap, ConfigError> {
        debug!(
            "Auto-mapping type '{}' with {} field(s)",
            shape.type_name,
            shape.fields.len()
        );
        stack.push(shape.type_name.clone());
        let mut map = ObjectMap::new(shape.clone());
        for field in &shape.fields {
            if field.config.ignore {
                continue;
            }
            let child = self.map_field_in(shape, field, stack)?;
            map.upsert(&field.name, child);
        }
        stack.pop();
        Ok(map)
    }

    fn map_field_in(
        &self,
        owner: &ObjectShape,
        field: &FieldShape,
        stack: &mut Vec<String>,
    ) -> Result<Map, ConfigError> {
        let shape = field.shape();
        if let Some(target) = nested_object_name(&shape)
            && stack.iter().any(|ancestor| ancestor == target)
        {
            return Err(ConfigError::RecursiveType {
                type_name: owner.type_name.clone(),
                field: field.name.clone(),
            });
        }
        self.map_shape(&field.name, &shape, &field.config, stack)
    }

    fn map_shape(
        &self,
        label: &str,
        shape: &Shape,
        config: &FieldConfig,
        stack: &mut Vec<String>,
    ) -> Result<Map, ConfigError> {
        let column = || {
            config
                .column
                .clone()
                .unwrap_or_else(|| ColumnSpec::Name(label.to_string()))
        };
        let mut map = match shape.required() {
            required if required.is_scalar_like() => {
                Map::Scalar(ScalarMap::new(column(), self.pipeline_for(shape, config)?))
            }
            Shape::Dictionary(dictionary) => match dictionary.value.required() {
                value if value.is_scalar_like() => Map::Dictionary(DictionaryMap::new(
                    dictionary.type_name.clone(),
                    config.column.clone().unwrap_or(ColumnSpec::AllColumns),
                    self.pipeline_for(&dictionary.value, config)?,
                )),
                Shape::Object(_) => Map::DictionaryIndexer(DictionaryIndexerMap::new(
                    dictionary.type_name.clone(),
                    dictionary.value.as_ref().clone(),
                )),
                _ => return Err(nested_collection(&dictionary.type_name)),
            },
            Shape::Sequence(sequence) => self.map_sequence(label, sequence, config)?,
            Shape::Object(object) => Map::Object(self.map_object(object, stack)?),
            other => {
                return Err(ConfigError::UnsupportedType {
                    type_name: other.type_name(),
                    reason: "no mapping rule applies".to_string(),
                });
            }
        };
        if config.optional {
            map.set_optional(true)?;
        }
        if config.preserve_formatting {
            map.set_preserve_formatting(true)?;
        }
        Ok(map)
    }

    fn map_sequence(
        &self,
        label: &str,
        sequence: &SequenceShape,
        config: &FieldConfig,
    ) -> Result<Map, ConfigError> {
        let materializer = self.materializers.select(sequence)?;
        let element = sequence.element.as_ref();
        if element.is_scalar_like() {
            let column = config
                .column
                .clone()
                .unwrap_or_else(|| ColumnSpec::Name(label.to_string()));
            let source = match &config.separators {
                Some(separators) if separators.is_empty() => {
                    return Err(ConfigError::EmptySeparators);
                }
                Some(separators) => ElementSource::Split {
                    column,
                    separators: separators.clone(),
                },
                None if column.is_multiple() => ElementSource::Columns(column),
                None => ElementSource::Split {
                    column,
                    separators: DEFAULT_SEPARATORS.to_vec(),
                },
            };
            return Ok(Map::Enumerable(EnumerableMap::new(
                sequence.type_name.clone(),
                source,
                self.pipeline_for(element, config)?,
                materializer,
            )));
        }
        match element.required() {
            Shape::Object(_) => Ok(Map::ArrayIndexer(ArrayIndexerMap::new(
                sequence.type_name.clone(),
                element.clone(),
                materializer,
            ))),
            _ => Err(nested_collection(&sequence.type_name)),
        }
    }

    /// Pipeline for a scalar-like shape, applying the field configuration.
    pub fn pipeline_for(
        &self,
        shape: &Shape,
        config: &FieldConfig,
    ) -> Result<ValuePipeline, ConfigError> {
        let required = shape.required();
        let mut pipeline = match required {
            Shape::Scalar(kind) => ValuePipeline::for_kind(*kind),
            Shape::Enum(enumeration) => ValuePipeline::with_converter(
                enumeration.type_name.clone(),
                Arc::new(EnumMapper::new(enumeration.clone())),
            ),
            Shape::Parsable(parsable) => ValuePipeline::with_converter(
                parsable.type_name.clone(),
                Arc::new(ParsableMapper::new(parsable.clone())),
            ),
            other => {
                return Err(ConfigError::UnsupportedType {
                    type_name: other.type_name(),
                    reason: "not convertible from a single cell".to_string(),
                });
            }
        };
        if let Some(formats) = &config.formats {
            pipeline.set_formats(formats.clone())?;
        }
        for transformer in &config.transformers {
            pipeline.add_transformer(Arc::clone(transformer));
        }
        for mapper in &config.mappers {
            pipeline.add_mapper(Arc::clone(mapper));
        }
        pipeline.set_empty_fallback(self.empty_fallback(shape, config));
        pipeline.set_invalid_fallback(config.invalid_fallback.clone());
        Ok(pipeline)
    }

    fn empty_fallback(&self, shape: &Shape, config: &FieldConfig) -> Option<Arc<dyn FallbackItem>> {
        if let Some(item) = &config.empty_fallback {
            return Some(Arc::clone(item));
        }
        if let Some(value) = &config.default_value {
            return Some(Arc::new(FixedValue(value.clone())));
        }
        if matches!(shape, Shape::Optional(_)) {
            return Some(Arc::new(NullValue));
        }
        let required = shape.required();
        if let Shape::Scalar(kind) = required
            && kind.accepts_empty()
        {
            return None;
        }
        match (self.empty_strategy, required.default_value()) {
            (EmptyValueStrategy::SetToDefaultValue, Some(value)) => Some(Arc::new(FixedValue(value))),
            _ => Some(Arc::new(ThrowFallback)),
        }
    }
}

fn nested_object_name(shape: &Shape) -> Option<&str> {
    match shape.required() {
        Shape::Object(object) => Some(&object.type_name),
        Shape::Sequence(sequence) => nested_object_name(&sequence.element),
        Shape::Dictionary(dictionary) => nested_object_name(&dictionary.value),
        _ => None,
    }
}

fn nested_collection(type_name: &str) -> ConfigError {
    ConfigError::UnsupportedType {
        type_name: type_name.to_string(),
        reason: "collections of collections cannot be mapped from cells".to_string(),
    }
}
