//! Static descriptions of target types.
//!
//! A [`Shape`] is what the auto-mapper inspects instead of runtime
//! reflection: every mappable type reports one through
//! [`FromValue::shape`](crate::convert::FromValue::shape). Per-field
//! declarative settings travel alongside in [`FieldConfig`].

use std::{fmt, str::FromStr, sync::Arc};

use crate::{
    column::ColumnSpec, convert::FromValue, fallback::FallbackItem, mappers::CellMapper,
    transform::CellTransformer, value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Boolean,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Decimal,
    Char,
    String,
    Date,
    DateTime,
    Time,
    Duration,
    Guid,
    Uri,
    Version,
}

impl ScalarKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Boolean => "bool",
            ScalarKind::I8 => "i8",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
            ScalarKind::U8 => "u8",
            ScalarKind::U16 => "u16",
            ScalarKind::U32 => "u32",
            ScalarKind::U64 => "u64",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
            ScalarKind::Decimal => "decimal",
            ScalarKind::Char => "char",
            ScalarKind::String => "string",
            ScalarKind::Date => "date",
            ScalarKind::DateTime => "datetime",
            ScalarKind::Time => "time",
            ScalarKind::Duration => "duration",
            ScalarKind::Guid => "guid",
            ScalarKind::Uri => "uri",
            ScalarKind::Version => "version",
        }
    }

    /// Value a field of this kind holds when the record is default-constructed.
    /// URIs have no meaningful default.
    pub fn default_value(&self) -> Option<Value> {
        use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

        let value = match self {
            ScalarKind::Boolean => Value::Boolean(false),
            ScalarKind::I8 | ScalarKind::I16 | ScalarKind::I32 | ScalarKind::I64 => {
                Value::Integer(0)
            }
            ScalarKind::U8 | ScalarKind::U16 | ScalarKind::U32 | ScalarKind::U64 => {
                Value::Unsigned(0)
            }
            ScalarKind::F32 | ScalarKind::F64 => Value::Float(0.0),
            ScalarKind::Decimal => Value::Decimal(rust_decimal::Decimal::ZERO),
            ScalarKind::Char => Value::Char('\0'),
            ScalarKind::String => Value::String(String::new()),
            ScalarKind::Date => Value::Date(NaiveDate::default()),
            ScalarKind::DateTime => Value::DateTime(NaiveDateTime::default()),
            ScalarKind::Time => Value::Time(NaiveTime::default()),
            ScalarKind::Duration => Value::Duration(TimeDelta::zero()),
            ScalarKind::Guid => Value::Guid(uuid::Uuid::nil()),
            ScalarKind::Version => Value::Version(semver::Version::new(0, 0, 0)),
            ScalarKind::Uri => return None,
        };
        Some(value)
    }

    /// Kinds for which an empty cell is a legitimate value rather than a gap.
    pub fn accepts_empty(&self) -> bool {
        matches!(self, ScalarKind::String)
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A type that is not one of the built-in scalars but parses from text.
#[derive(Clone)]
pub struct ParsableShape {
    pub type_name: String,
    pub check: fn(&str) -> Result<(), String>,
}

impl fmt::Debug for ParsableShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsableShape")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumShape {
    pub type_name: String,
    pub variants: Vec<String>,
}

impl EnumShape {
    /// Canonical variant name for `token`, compared case-insensitively.
    pub fn variant(&self, token: &str) -> Option<&str> {
        let token = token.trim();
        self.variants
            .iter()
            .find(|variant| variant.eq_ignore_ascii_case(token))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerKind {
    /// Fixed-size array; `Some(n)` requires exactly `n` elements.
    Array(Option<usize>),
    /// Shared or boxed slices built once from the whole sequence.
    Immutable,
    /// Growable list types.
    List,
    /// Set types; duplicate elements collapse.
    Set,
    /// Any other container, built by a strategy registered under this name.
    Custom(String),
}

#[derive(Debug, Clone)]
pub struct SequenceShape {
    pub type_name: String,
    pub element: Box<Shape>,
    pub container: ContainerKind,
}

#[derive(Debug, Clone)]
pub struct DictionaryShape {
    pub type_name: String,
    pub value: Box<Shape>,
}

#[derive(Debug, Clone)]
pub struct ObjectShape {
    pub type_name: String,
    pub fields: Vec<FieldShape>,
}

impl ObjectShape {
    pub fn new(type_name: impl Into<String>, fields: Vec<FieldShape>) -> Self {
        Self {
            type_name: type_name.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldShape> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Debug, Clone)]
pub enum Shape {
    Scalar(ScalarKind),
    Parsable(ParsableShape),
    Enum(EnumShape),
    Optional(Box<Shape>),
    Dictionary(DictionaryShape),
    Sequence(SequenceShape),
    Object(ObjectShape),
}

impl Shape {
    pub fn object<T: ?Sized>(fields: Vec<FieldShape>) -> Self {
        Shape::Object(ObjectShape::new(short_type_name::<T>(), fields))
    }

    pub fn enumeration<T: ?Sized>(variants: &[&str]) -> Self {
        Shape::Enum(EnumShape {
            type_name: short_type_name::<T>(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
        })
    }

    /// Shape for any `FromStr` type; values travel as text until converted.
    pub fn parsable<T>() -> Self
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        Shape::Parsable(ParsableShape {
            type_name: short_type_name::<T>(),
            check: check_parse::<T>,
        })
    }

    pub fn sequence<C: ?Sized>(element: Shape, container: ContainerKind) -> Self {
        Shape::Sequence(SequenceShape {
            type_name: short_type_name::<C>(),
            element: Box::new(element),
            container,
        })
    }

    pub fn dictionary<C: ?Sized>(value: Shape) -> Self {
        Shape::Dictionary(DictionaryShape {
            type_name: short_type_name::<C>(),
            value: Box::new(value),
        })
    }

    pub fn type_name(&self) -> String {
        match self {
            Shape::Scalar(kind) => kind.name().to_string(),
            Shape::Parsable(shape) => shape.type_name.clone(),
            Shape::Enum(shape) => shape.type_name.clone(),
            Shape::Optional(inner) => format!("Option<{}>", inner.type_name()),
            Shape::Dictionary(shape) => shape.type_name.clone(),
            Shape::Sequence(shape) => shape.type_name.clone(),
            Shape::Object(shape) => shape.type_name.clone(),
        }
    }

    /// Strips any `Option` wrappers.
    pub fn required(&self) -> &Shape {
        match self {
            Shape::Optional(inner) => inner.required(),
            other => other,
        }
    }

    /// Whether values of this shape come from a single cell conversion.
    pub fn is_scalar_like(&self) -> bool {
        matches!(
            self.required(),
            Shape::Scalar(_) | Shape::Parsable(_) | Shape::Enum(_)
        )
    }

    /// Value used to fill positions no map produced.
    pub fn default_value(&self) -> Option<Value> {
        match self {
            Shape::Scalar(kind) => kind.default_value(),
            Shape::Parsable(_) => None,
            Shape::Enum(shape) => shape.variants.first().cloned().map(Value::Enum),
            Shape::Optional(_) => Some(Value::Null),
            Shape::Dictionary(_) => Some(Value::Map(Default::default())),
            Shape::Sequence(shape) => match shape.container {
                ContainerKind::Array(Some(length)) => {
                    let element = shape.element.default_value()?;
                    Some(Value::List(vec![element; length]))
                }
                _ => Some(Value::List(Vec::new())),
            },
            Shape::Object(_) => Some(Value::Record(Default::default())),
        }
    }
}

fn check_parse<T>(text: &str) -> Result<(), String>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    T::from_str(text).map(|_| ()).map_err(|err| err.to_string())
}

/// How a field's type is obtained. Static record types defer the lookup so
/// that self-referential types can be described without infinite recursion.
#[derive(Clone)]
enum FieldType {
    Deferred(fn() -> Shape),
    Inline(Box<Shape>),
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Deferred(_) => f.write_str("Deferred"),
            FieldType::Inline(shape) => f.debug_tuple("Inline").field(shape).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldShape {
    pub name: String,
    ty: FieldType,
    pub config: FieldConfig,
}

impl FieldShape {
    pub fn of<T: FromValue>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: FieldType::Deferred(T::shape),
            config: FieldConfig::default(),
        }
    }

    pub fn with_shape(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            ty: FieldType::Inline(Box::new(shape)),
            config: FieldConfig::default(),
        }
    }

    pub fn shape(&self) -> Shape {
        match &self.ty {
            FieldType::Deferred(shape) => shape(),
            FieldType::Inline(shape) => shape.as_ref().clone(),
        }
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.config.column = Some(ColumnSpec::Name(name.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.config.column = Some(ColumnSpec::Index(index));
        self
    }

    pub fn columns(mut self, spec: ColumnSpec) -> Self {
        self.config.column = Some(spec);
        self
    }

    pub fn optional(mut self) -> Self {
        self.config.optional = true;
        self
    }

    pub fn ignore(mut self) -> Self {
        self.config.ignore = true;
        self
    }

    pub fn preserve_formatting(mut self) -> Self {
        self.config.preserve_formatting = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.config.default_value = Some(value.into());
        self
    }

    pub fn empty_fallback(mut self, item: impl FallbackItem + 'static) -> Self {
        self.config.empty_fallback = Some(Arc::new(item));
        self
    }

    pub fn invalid_fallback(mut self, item: impl FallbackItem + 'static) -> Self {
        self.config.invalid_fallback = Some(Arc::new(item));
        self
    }

    pub fn mapper(mut self, mapper: impl CellMapper + 'static) -> Self {
        self.config.mappers.push(Arc::new(mapper));
        self
    }

    pub fn transformer(mut self, transformer: impl CellTransformer + 'static) -> Self {
        self.config.transformers.push(Arc::new(transformer));
        self
    }

    pub fn separators(mut self, separators: &[char]) -> Self {
        self.config.separators = Some(separators.to_vec());
        self
    }

    pub fn formats(mut self, formats: &[&str]) -> Self {
        self.config.formats = Some(formats.iter().map(|f| f.to_string()).collect());
        self
    }
}

/// Declarative per-field settings consumed by the auto-mapper.
#[derive(Debug, Clone, Default)]
pub struct FieldConfig {
    pub column: Option<ColumnSpec>,
    pub optional: bool,
    pub ignore: bool,
    pub preserve_formatting: bool,
    pub default_value: Option<Value>,
    pub empty_fallback: Option<Arc<dyn FallbackItem>>,
    pub invalid_fallback: Option<Arc<dyn FallbackItem>>,
    pub mappers: Vec<Arc<dyn CellMapper>>,
    pub transformers: Vec<Arc<dyn CellTransformer>>,
    pub separators: Option<Vec<char>>,
    pub formats: Option<Vec<String>>,
}

/// `std::any::type_name` without module paths, e.g. `Vec<i32>`.
pub fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let mut rendered = String::with_capacity(full.len());
    let mut segment = String::new();
    let mut chars = full.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == ':' && chars.peek() == Some(&':') {
            chars.next();
            segment.clear();
            continue;
        }
        if ch.is_alphanumeric() || ch == '_' {
            segment.push(ch);
        } else {
            rendered.push_str(&segment);
            segment.clear();
            rendered.push(ch);
        }
    }
    rendered.push_str(&segment);
    rendered
}
