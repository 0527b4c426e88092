//! Dynamic values produced while resolving a map tree against a row.
//!
//! Scalar variants mirror the well-known types the auto-mapper understands;
//! `List`, `Map` and `Record` carry collections, dictionaries and nested
//! objects until [`FromValue`](crate::convert::FromValue) turns them into the
//! caller's concrete types.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use indexmap::IndexMap;
use itertools::Itertools;
use rust_decimal::Decimal;
use semver::Version;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Decimal(Decimal),
    Char(char),
    String(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Duration(TimeDelta),
    Guid(Uuid),
    Uri(Url),
    Version(Version),
    Enum(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Record(IndexMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short label used in conversion diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Unsigned(_) => "unsigned integer",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Time(_) => "time",
            Value::Duration(_) => "duration",
            Value::Guid(_) => "guid",
            Value::Uri(_) => "uri",
            Value::Version(_) => "version",
            Value::Enum(_) => "enum variant",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
        }
    }

    /// Kind plus a rendering of the value, e.g. `string 'abc'`.
    pub fn describe(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::List(items) => format!("list of {} element(s)", items.len()),
            Value::Map(entries) | Value::Record(entries) => {
                format!("{} with {} entry(ies)", self.kind_name(), entries.len())
            }
            other => format!("{} '{}'", other.kind_name(), other.as_display()),
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Unsigned(u) => u.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Decimal(d) => d.normalize().to_string(),
            Value::Char(c) => c.to_string(),
            Value::String(s) | Value::Enum(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::Time(t) => t.format("%H:%M:%S").to_string(),
            Value::Duration(d) => format_duration(*d),
            Value::Guid(g) => g.to_string(),
            Value::Uri(u) => u.to_string(),
            Value::Version(v) => v.to_string(),
            Value::List(items) => format!("[{}]", items.iter().map(Value::as_display).join(", ")),
            Value::Map(entries) | Value::Record(entries) => format!(
                "{{{}}}",
                entries
                    .iter()
                    .map(|(key, value)| format!("{key}: {}", value.as_display()))
                    .join(", ")
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Boolean(b) => Json::Bool(*b),
            Value::Integer(i) => Json::from(*i),
            Value::Unsigned(u) => Json::from(*u),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(entries) | Value::Record(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            other => Json::String(other.as_display()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Renders a duration as `[-][d.]hh:mm:ss[.fffffffff]`.
pub fn format_duration(duration: TimeDelta) -> String {
    let negative = duration < TimeDelta::zero();
    let magnitude = duration.abs();
    let days = magnitude.num_days();
    let hours = magnitude.num_hours() % 24;
    let minutes = magnitude.num_minutes() % 60;
    let seconds = magnitude.num_seconds() % 60;
    let nanos = magnitude.subsec_nanos();

    let mut rendered = String::new();
    if negative {
        rendered.push('-');
    }
    if days > 0 {
        rendered.push_str(&format!("{days}."));
    }
    rendered.push_str(&format!("{hours:02}:{minutes:02}:{seconds:02}"));
    if nanos > 0 {
        let fraction = format!("{nanos:09}");
        rendered.push('.');
        rendered.push_str(fraction.trim_end_matches('0'));
    }
    rendered
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

value_from!(
    bool => Boolean,
    i8 => Integer,
    i16 => Integer,
    i32 => Integer,
    i64 => Integer,
    u8 => Unsigned,
    u16 => Unsigned,
    u32 => Unsigned,
    u64 => Unsigned,
    f32 => Float,
    f64 => Float,
    Decimal => Decimal,
    char => Char,
    String => String,
    &str => String,
    NaiveDate => Date,
    NaiveDateTime => DateTime,
    NaiveTime => Time,
    TimeDelta => Duration,
    Uuid => Guid,
    Url => Uri,
    Version => Version,
);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}
