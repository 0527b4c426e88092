//! YAML mapping schemas: record layouts described in files instead of code.
//!
//! A [`MappingSchema`] names a record, its fields with their type tokens and
//! per-field options, and a list of path overrides applied after
//! auto-mapping. Loading produces the record's [`ObjectShape`] and a ready
//! [`Map`] tree that reads rows into dynamic [`Value`](crate::value::Value)s.
//!
//! ```yaml
//! name: Order
//! empty_values: default
//! fields:
//!   - name: id
//!     type: integer
//!     column: Order Id
//!   - name: tags
//!     type: list<string>
//!     separators: "|"
//!   - name: status
//!     type: enum
//!     variants: [Open, Closed]
//!     lookup: { o: Open, c: Closed }
//! overrides:
//!   - path: status
//!     on_invalid: "null"
//! ```

use std::{collections::BTreeMap, fmt, fs::File, io::BufReader, path::Path, str::FromStr, sync::Arc};

use anyhow::{Context, Result, anyhow, bail, ensure};
use heck::ToUpperCamelCase;
use regex::Regex;
use serde::Deserialize;

use crate::{
    auto::AutoMapper,
    column::{ColumnPredicate, ColumnSpec},
    error::ConfigError,
    fallback::{EmptyValueStrategy, FallbackItem, FixedValue, NullValue, ThrowFallback},
    map::Map,
    mappers::{CellMapper, DictionaryMapper},
    path::{MapPath, locate_or_create},
    pipeline::ValuePipeline,
    shape::{
        ContainerKind, DictionaryShape, EnumShape, FieldConfig, FieldShape, ObjectShape,
        ScalarKind, SequenceShape, Shape,
    },
    sheet::{DEFAULT_MAX_COLUMNS, SheetOptions},
    transform::{Case, CellTransformer, ConvertCase, RegexReplace, ReplaceValues, Trim, ValueReplacement},
    value::Value,
};

#[derive(Debug, Clone, Deserialize)]
pub struct MappingSchema {
    pub name: String,
    #[serde(default = "default_true")]
    pub has_header: bool,
    #[serde(default)]
    pub header_row: usize,
    #[serde(default = "default_true")]
    pub skip_blank_lines: bool,
    #[serde(default)]
    pub max_columns: Option<usize>,
    #[serde(default)]
    pub empty_values: EmptyValuePolicy,
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub overrides: Vec<OverrideSpec>,
}

fn default_true() -> bool {
    true
}

fn default_type() -> String {
    "string".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyValuePolicy {
    #[default]
    Throw,
    Default,
}

impl From<EmptyValuePolicy> for EmptyValueStrategy {
    fn from(policy: EmptyValuePolicy) -> Self {
        match policy {
            EmptyValuePolicy::Throw => EmptyValueStrategy::ThrowIfPrimitive,
            EmptyValuePolicy::Default => EmptyValueStrategy::SetToDefaultValue,
        }
    }
}

/// What to substitute for an empty or unconvertible cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    Throw,
    Null,
    Default,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub type_token: String,
    #[serde(default)]
    pub ignore: bool,
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(flatten)]
    pub options: NodeOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverrideSpec {
    pub path: String,
    #[serde(flatten)]
    pub options: NodeOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegexRule {
    pub pattern: String,
    #[serde(default)]
    pub replacement: String,
}

/// Options shared by field declarations and path overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeOptions {
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub indices: Option<Vec<usize>>,
    /// Regular expression matched against header names.
    #[serde(default)]
    pub matching: Option<String>,
    #[serde(default)]
    pub all_columns: bool,
    /// Every character is a separator.
    #[serde(default)]
    pub separators: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub preserve_formatting: bool,
    #[serde(default)]
    pub formats: Option<Vec<String>>,
    #[serde(default)]
    pub transform: Vec<String>,
    #[serde(default)]
    pub regex: Vec<RegexRule>,
    #[serde(default)]
    pub replace: Vec<ValueReplacement>,
    #[serde(default)]
    pub lookup: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub lookup_ignore_case: bool,
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,
    #[serde(default)]
    pub on_empty: Option<FallbackPolicy>,
    #[serde(default)]
    pub invalid_value: Option<serde_yaml::Value>,
    #[serde(default)]
    pub on_invalid: Option<FallbackPolicy>,
}

impl NodeOptions {
    /// Column settings in a fixed order; several settings form a composite
    /// in which the first that binds wins.
    pub fn column_spec(&self) -> Result<Option<ColumnSpec>> {
        let mut specs = Vec::new();
        if let Some(name) = &self.column {
            specs.push(ColumnSpec::Name(name.clone()));
        }
        if let Some(index) = self.index {
            specs.push(ColumnSpec::Index(index));
        }
        if let Some(names) = &self.columns {
            ensure!(!names.is_empty(), "'columns' must list at least one column");
            specs.push(ColumnSpec::names(names.iter().cloned()));
        }
        if let Some(indices) = &self.indices {
            ensure!(!indices.is_empty(), "'indices' must list at least one column");
            specs.push(ColumnSpec::Indices(indices.clone()));
        }
        if let Some(pattern) = &self.matching {
            let regex = Regex::new(pattern)
                .with_context(|| format!("Compiling column pattern '{pattern}'"))?;
            specs.push(ColumnSpec::Predicate(ColumnPredicate::regex(regex)));
        }
        if self.all_columns {
            specs.push(ColumnSpec::AllColumns);
        }
        Ok(match specs.len() {
            0 => None,
            1 => specs.pop(),
            _ => Some(ColumnSpec::Composite(specs)),
        })
    }

    fn separator_chars(&self) -> Result<Option<Vec<char>>> {
        match &self.separators {
            Some(text) if text.is_empty() => Err(ConfigError::EmptySeparators.into()),
            Some(text) => Ok(Some(text.chars().collect())),
            None => Ok(None),
        }
    }

    fn transformers(&self) -> Result<Vec<Arc<dyn CellTransformer>>> {
        let mut transformers: Vec<Arc<dyn CellTransformer>> = Vec::new();
        for token in &self.transform {
            if token.trim().eq_ignore_ascii_case("trim") {
                transformers.push(Arc::new(Trim));
                continue;
            }
            let case = Case::from_token(token).ok_or_else(|| {
                anyhow!(
                    "Unknown transform '{token}'. Supported transforms: trim, lower, upper, snake, camel, pascal"
                )
            })?;
            transformers.push(Arc::new(ConvertCase(case)));
        }
        for rule in &self.regex {
            let regex = Regex::new(&rule.pattern)
                .with_context(|| format!("Compiling replacement pattern '{}'", rule.pattern))?;
            transformers.push(Arc::new(RegexReplace::new(regex, rule.replacement.clone())));
        }
        if !self.replace.is_empty() {
            transformers.push(Arc::new(ReplaceValues::new(self.replace.clone())));
        }
        Ok(transformers)
    }

    /// Resolves lookups and fallbacks, converting fixed texts with `convert`.
    fn pipeline_options<C>(&self, convert: C, default_of: Option<Value>) -> Result<PipelineOptions>
    where
        C: Fn(&str) -> std::result::Result<Value, ConfigError>,
    {
        let mut mappers: Vec<Arc<dyn CellMapper>> = Vec::new();
        if !self.lookup.is_empty() {
            let entries = self
                .lookup
                .iter()
                .map(|(key, value)| -> Result<(String, Value)> {
                    let text = yaml_text(value)?;
                    let converted = convert(&text)
                        .with_context(|| format!("Converting lookup value for '{key}'"))?;
                    Ok((key.clone(), converted))
                })
                .collect::<Result<Vec<_>>>()?;
            let mapper = DictionaryMapper::new(entries);
            mappers.push(Arc::new(if self.lookup_ignore_case {
                mapper.ignore_case()
            } else {
                mapper
            }));
        }

        ensure!(
            self.default.is_none() || self.on_empty.is_none(),
            "'default' and 'on_empty' cannot be combined"
        );
        ensure!(
            self.invalid_value.is_none() || self.on_invalid.is_none(),
            "'invalid_value' and 'on_invalid' cannot be combined"
        );
        let fixed = |value: &serde_yaml::Value| -> Result<Arc<dyn FallbackItem>> {
            let text = yaml_text(value)?;
            Ok(Arc::new(FixedValue(convert(&text)?)))
        };
        let policy = |choice: FallbackPolicy| -> Result<Arc<dyn FallbackItem>> {
            let item: Arc<dyn FallbackItem> = match choice {
                FallbackPolicy::Throw => Arc::new(ThrowFallback),
                FallbackPolicy::Null => Arc::new(NullValue),
                FallbackPolicy::Default => Arc::new(FixedValue(
                    default_of
                        .clone()
                        .ok_or_else(|| anyhow!("Type has no default value to fall back to"))?,
                )),
            };
            Ok(item)
        };
        let empty = match (&self.default, self.on_empty) {
            (Some(value), _) => Some(fixed(value).context("Converting 'default'")?),
            (None, Some(choice)) => Some(policy(choice)?),
            (None, None) => None,
        };
        let invalid = match (&self.invalid_value, self.on_invalid) {
            (Some(value), _) => Some(fixed(value).context("Converting 'invalid_value'")?),
            (None, Some(choice)) => Some(policy(choice)?),
            (None, None) => None,
        };
        Ok(PipelineOptions {
            mappers,
            empty,
            invalid,
        })
    }
}

struct PipelineOptions {
    mappers: Vec<Arc<dyn CellMapper>>,
    empty: Option<Arc<dyn FallbackItem>>,
    invalid: Option<Arc<dyn FallbackItem>>,
}

fn yaml_text(value: &serde_yaml::Value) -> Result<String> {
    match value {
        serde_yaml::Value::Null => Ok(String::new()),
        serde_yaml::Value::Bool(flag) => Ok(flag.to_string()),
        serde_yaml::Value::Number(number) => Ok(number.to_string()),
        serde_yaml::Value::String(text) => Ok(text.clone()),
        other => bail!("Expected a scalar value, found {other:?}"),
    }
}

/// Type tokens accepted in `type:` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeToken {
    Scalar(ScalarKind),
    Enum,
    Object,
    List(Box<TypeToken>),
    Set(Box<TypeToken>),
    Array(Box<TypeToken>),
    Map(Box<TypeToken>),
    Optional(Box<TypeToken>),
}

impl TypeToken {
    pub fn variants() -> &'static [&'static str] {
        &[
            "string",
            "integer",
            "unsigned",
            "float",
            "boolean",
            "decimal",
            "char",
            "date",
            "datetime",
            "time",
            "duration",
            "guid",
            "uri",
            "version",
            "enum",
            "object",
            "list<T>",
            "set<T>",
            "array<T>",
            "map<T>",
            "optional<T>",
        ]
    }
}

impl FromStr for TypeToken {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        if let Some(inner) = normalized.strip_suffix('?') {
            return Ok(TypeToken::Optional(Box::new(inner.parse()?)));
        }
        if let Some((head, rest)) = normalized.split_once('<') {
            let inner = rest
                .strip_suffix('>')
                .ok_or_else(|| anyhow!("Unbalanced '<' in type '{value}'"))?;
            let inner = Box::new(inner.parse::<TypeToken>()?);
            return match head.trim() {
                "list" | "vec" => Ok(TypeToken::List(inner)),
                "set" => Ok(TypeToken::Set(inner)),
                "array" => Ok(TypeToken::Array(inner)),
                "map" | "dictionary" => Ok(TypeToken::Map(inner)),
                "optional" | "option" => Ok(TypeToken::Optional(inner)),
                other => Err(anyhow!("Unknown collection type '{other}' in '{value}'")),
            };
        }
        let kind = match normalized.as_str() {
            "string" | "text" => ScalarKind::String,
            "integer" | "int" | "long" | "i64" => ScalarKind::I64,
            "i8" => ScalarKind::I8,
            "i16" => ScalarKind::I16,
            "i32" => ScalarKind::I32,
            "unsigned" | "u64" => ScalarKind::U64,
            "u8" => ScalarKind::U8,
            "u16" => ScalarKind::U16,
            "u32" => ScalarKind::U32,
            "float" | "double" | "f64" => ScalarKind::F64,
            "f32" => ScalarKind::F32,
            "boolean" | "bool" => ScalarKind::Boolean,
            "decimal" => ScalarKind::Decimal,
            "char" => ScalarKind::Char,
            "date" => ScalarKind::Date,
            "datetime" | "date-time" | "timestamp" => ScalarKind::DateTime,
            "time" => ScalarKind::Time,
            "duration" | "timespan" => ScalarKind::Duration,
            "guid" | "uuid" => ScalarKind::Guid,
            "uri" | "url" => ScalarKind::Uri,
            "version" | "semver" => ScalarKind::Version,
            "enum" => return Ok(TypeToken::Enum),
            "object" | "record" => return Ok(TypeToken::Object),
            _ => {
                return Err(anyhow!(
                    "Unknown type '{value}'. Supported types: {}",
                    TypeToken::variants().join(", ")
                ));
            }
        };
        Ok(TypeToken::Scalar(kind))
    }
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeToken::Scalar(kind) => f.write_str(kind.name()),
            TypeToken::Enum => f.write_str("enum"),
            TypeToken::Object => f.write_str("object"),
            TypeToken::List(inner) => write!(f, "list<{inner}>"),
            TypeToken::Set(inner) => write!(f, "set<{inner}>"),
            TypeToken::Array(inner) => write!(f, "array<{inner}>"),
            TypeToken::Map(inner) => write!(f, "map<{inner}>"),
            TypeToken::Optional(inner) => write!(f, "optional<{inner}>"),
        }
    }
}

impl MappingSchema {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        let schema: MappingSchema =
            serde_yaml::from_reader(reader).context("Parsing mapping schema YAML")?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let schema: MappingSchema =
            serde_yaml::from_str(text).context("Parsing mapping schema YAML")?;
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.fields.is_empty(), "Schema '{}' declares no fields", self.name);
        validate_unique(&self.name, &self.fields)
    }

    pub fn sheet_options(&self) -> SheetOptions {
        SheetOptions {
            has_header: self.has_header,
            header_row: self.header_row,
            skip_blank_lines: self.skip_blank_lines,
            max_columns: self.max_columns.unwrap_or(DEFAULT_MAX_COLUMNS),
        }
    }

    pub fn auto_mapper(&self) -> AutoMapper {
        AutoMapper::new(self.empty_values.into())
    }

    /// Shape of the record, with every field's options resolved.
    pub fn shape(&self) -> Result<ObjectShape> {
        object_shape(&self.name, &self.fields, &self.auto_mapper())
    }

    /// Auto-maps the record and applies the overrides in order.
    pub fn build_map(&self) -> Result<Map> {
        let auto = self.auto_mapper();
        let shape = object_shape(&self.name, &self.fields, &auto)?;
        let mut root = auto
            .map_root(&Shape::Object(shape))
            .with_context(|| format!("Mapping record '{}'", self.name))?;
        for spec in &self.overrides {
            let path = MapPath::parse(&spec.path)?;
            let node = locate_or_create(&mut root, &path, &auto)?;
            apply_override(node, &spec.options)
                .with_context(|| format!("Applying override for '{}'", spec.path))?;
        }
        root.validate()?;
        Ok(root)
    }
}

fn validate_unique(owner: &str, fields: &[FieldSpec]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for field in fields {
        ensure!(
            seen.insert(field.name.as_str()),
            "Field '{}' is declared more than once in '{owner}'",
            field.name
        );
        validate_unique(&field.name, &field.fields)?;
    }
    Ok(())
}

fn object_shape(name: &str, fields: &[FieldSpec], auto: &AutoMapper) -> Result<ObjectShape> {
    let fields = fields
        .iter()
        .map(|spec| field_shape(spec, name, auto).with_context(|| format!("Field '{}'", spec.name)))
        .collect::<Result<Vec<_>>>()?;
    Ok(ObjectShape::new(name, fields))
}

fn field_shape(spec: &FieldSpec, owner: &str, auto: &AutoMapper) -> Result<FieldShape> {
    let token = spec.type_token.parse::<TypeToken>()?;
    let shape = shape_for(&token, spec, owner, auto)?;
    let options = &spec.options;
    let mut config = FieldConfig {
        column: options.column_spec()?,
        optional: options.optional,
        ignore: spec.ignore,
        preserve_formatting: options.preserve_formatting,
        separators: options.separator_chars()?,
        formats: options.formats.clone(),
        transformers: options.transformers()?,
        ..FieldConfig::default()
    };
    if has_pipeline_options(options) {
        let core = convertible_core(&shape);
        let converter = auto.pipeline_for(
            core,
            &FieldConfig {
                formats: options.formats.clone(),
                ..FieldConfig::default()
            },
        )?;
        let resolved = options.pipeline_options(
            |text| convert_fixed(&converter, text),
            core.required().default_value(),
        )?;
        config.mappers = resolved.mappers;
        config.empty_fallback = resolved.empty;
        config.invalid_fallback = resolved.invalid;
    }
    let mut field = FieldShape::with_shape(spec.name.clone(), shape);
    field.config = config;
    Ok(field)
}

fn has_pipeline_options(options: &NodeOptions) -> bool {
    !options.lookup.is_empty()
        || options.default.is_some()
        || options.on_empty.is_some()
        || options.invalid_value.is_some()
        || options.on_invalid.is_some()
}

/// The shape whose pipeline converts cells: collection elements and
/// dictionary values rather than the containers themselves.
fn convertible_core(shape: &Shape) -> &Shape {
    match shape.required() {
        Shape::Sequence(sequence) => convertible_core(&sequence.element),
        Shape::Dictionary(dictionary) => convertible_core(&dictionary.value),
        _ => shape,
    }
}

fn convert_fixed(pipeline: &ValuePipeline, text: &str) -> std::result::Result<Value, ConfigError> {
    pipeline
        .execute_text(text)
        .map_err(|err| ConfigError::InvalidValue {
            value: text.to_string(),
            target: pipeline.target().to_string(),
            reason: err.to_string(),
        })
}

/// Nested object types are named `Owner.Field` so they never collide with an
/// enclosing record of the same name.
fn shape_for(token: &TypeToken, spec: &FieldSpec, owner: &str, auto: &AutoMapper) -> Result<Shape> {
    let type_name = spec.name.to_upper_camel_case();
    Ok(match token {
        TypeToken::Scalar(kind) => Shape::Scalar(*kind),
        TypeToken::Enum => {
            ensure!(
                !spec.variants.is_empty(),
                "Enum field '{}' must list its variants",
                spec.name
            );
            Shape::Enum(EnumShape {
                type_name,
                variants: spec.variants.clone(),
            })
        }
        TypeToken::Object => {
            ensure!(
                !spec.fields.is_empty(),
                "Object field '{}' must declare nested fields",
                spec.name
            );
            Shape::Object(object_shape(&format!("{owner}.{type_name}"), &spec.fields, auto)?)
        }
        TypeToken::List(inner) => sequence(inner, spec, owner, auto, ContainerKind::List, "list")?,
        TypeToken::Set(inner) => sequence(inner, spec, owner, auto, ContainerKind::Set, "set")?,
        TypeToken::Array(inner) => {
            sequence(inner, spec, owner, auto, ContainerKind::Array(None), "array")?
        }
        TypeToken::Map(inner) => {
            let value = shape_for(inner, spec, owner, auto)?;
            Shape::Dictionary(DictionaryShape {
                type_name: format!("map<{}>", value.type_name()),
                value: Box::new(value),
            })
        }
        TypeToken::Optional(inner) => {
            Shape::Optional(Box::new(shape_for(inner, spec, owner, auto)?))
        }
    })
}

fn sequence(
    inner: &TypeToken,
    spec: &FieldSpec,
    owner: &str,
    auto: &AutoMapper,
    container: ContainerKind,
    label: &str,
) -> Result<Shape> {
    let element = shape_for(inner, spec, owner, auto)?;
    Ok(Shape::Sequence(SequenceShape {
        type_name: format!("{label}<{}>", element.type_name()),
        element: Box::new(element),
        container,
    }))
}

fn apply_override(node: &mut Map, options: &NodeOptions) -> Result<()> {
    if let Some(spec) = options.column_spec()? {
        node.set_column(spec)?;
    }
    if let Some(separators) = options.separator_chars()? {
        node.set_separators(&separators)?;
    }
    if options.optional {
        node.set_optional(true)?;
    }
    if options.preserve_formatting {
        node.set_preserve_formatting(true)?;
    }
    if let Some(formats) = &options.formats {
        let formats = formats.iter().map(String::as_str).collect::<Vec<_>>();
        node.set_formats(&formats)?;
    }
    let transformers = options.transformers()?;
    let resolved = if has_pipeline_options(options) {
        let converter = node.pipeline_mut()?.clone();
        let default_of = converter.kind().and_then(|kind| kind.default_value());
        Some(options.pipeline_options(|text| convert_fixed(&converter, text), default_of)?)
    } else {
        None
    };
    if transformers.is_empty() && resolved.is_none() {
        return Ok(());
    }
    let pipeline = node.pipeline_mut()?;
    for transformer in transformers {
        pipeline.add_transformer(transformer);
    }
    if let Some(resolved) = resolved {
        for mapper in resolved.mappers {
            pipeline.add_mapper(mapper);
        }
        if resolved.empty.is_some() {
            pipeline.set_empty_fallback(resolved.empty);
        }
        if resolved.invalid.is_some() {
            pipeline.set_invalid_fallback(resolved.invalid);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER_SCHEMA: &str = r#"
name: Order
empty_values: default
fields:
  - name: id
    type: integer
    column: Order Id
  - name: tags
    type: list<string>
    separators: "|"
  - name: status
    type: enum
    variants: [Open, Closed]
    lookup: { o: Open, c: Closed }
    lookup_ignore_case: true
  - name: customer
    type: object
    fields:
      - name: name
      - name: email
        type: string?
overrides:
  - path: customer.name
    column: Customer
    transform: [trim, upper]
"#;

    #[test]
    fn parses_type_tokens() {
        assert_eq!(
            "list<int>".parse::<TypeToken>().unwrap(),
            TypeToken::List(Box::new(TypeToken::Scalar(ScalarKind::I64)))
        );
        assert_eq!(
            "map<decimal?>".parse::<TypeToken>().unwrap(),
            TypeToken::Map(Box::new(TypeToken::Optional(Box::new(TypeToken::Scalar(
                ScalarKind::Decimal
            )))))
        );
        assert_eq!(
            "Optional<Date>".parse::<TypeToken>().unwrap().to_string(),
            "optional<date>"
        );
        let err = "money".parse::<TypeToken>().unwrap_err();
        assert!(err.to_string().contains("Supported types"));
        assert!("list<int".parse::<TypeToken>().is_err());
    }

    #[test]
    fn loads_schema_with_defaults() {
        let schema = MappingSchema::from_yaml(ORDER_SCHEMA).expect("schema");
        assert!(schema.has_header);
        assert_eq!(schema.header_row, 0);
        assert_eq!(schema.empty_values, EmptyValuePolicy::Default);
        assert_eq!(schema.fields[1].options.separators.as_deref(), Some("|"));
        let options = schema.sheet_options();
        assert_eq!(options.max_columns, DEFAULT_MAX_COLUMNS);
    }

    #[test]
    fn builds_map_with_overrides() {
        let schema = MappingSchema::from_yaml(ORDER_SCHEMA).expect("schema");
        let map = schema.build_map().expect("map");
        let lines = map.describe();
        assert!(lines[0].starts_with("Order"));
        assert!(
            lines
                .iter()
                .any(|line| line.contains("id: i64 <- 'Order Id'"))
        );
        assert!(
            lines
                .iter()
                .any(|line| line.contains("name: string <- 'Customer'"))
        );
        assert!(lines.contains(&"  customer: Order.Customer (object)".to_string()));
    }

    #[test]
    fn nested_objects_are_named_after_their_owner() {
        let yaml = r#"
name: Order
fields:
  - name: order
    type: object
    fields:
      - name: number
        type: integer
      - name: line
        type: list<string>
"#;
        let schema = MappingSchema::from_yaml(yaml).expect("schema");
        let map = schema.build_map().expect("map");
        let lines = map.describe();
        assert_eq!(lines[1], "  order: Order.Order (object)");
        assert!(lines[2].starts_with("    number: i64 <- 'number'"));
    }

    #[test]
    fn rejects_conflicting_fallback_settings() {
        let yaml = r#"
name: Row
fields:
  - name: qty
    type: integer
    default: 0
    on_empty: "null"
"#;
        let schema = MappingSchema::from_yaml(yaml).expect("schema");
        let err = schema.build_map().unwrap_err();
        assert!(format!("{err:#}").contains("cannot be combined"));
    }

    #[test]
    fn fixed_values_must_convert_to_the_field_type() {
        let yaml = r#"
name: Row
fields:
  - name: qty
    type: integer
    default: lots
"#;
        let schema = MappingSchema::from_yaml(yaml).expect("schema");
        let err = schema.build_map().unwrap_err();
        assert!(format!("{err:#}").contains("'lots' is not a valid i64"));
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        let yaml = r#"
name: Row
fields:
  - name: a
  - name: a
"#;
        let err = MappingSchema::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("declared more than once"));
    }

    #[test]
    fn several_column_settings_form_a_composite() {
        let options = NodeOptions {
            column: Some("Code".to_string()),
            index: Some(2),
            ..NodeOptions::default()
        };
        let spec = options.column_spec().unwrap().expect("spec");
        assert_eq!(spec.to_string(), "'Code' or #2");
    }
}
