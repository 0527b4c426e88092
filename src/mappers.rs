//! Typed mappers: the conversion stage of a value pipeline.
//!
//! A pipeline hands every mapper the same cell input in turn. The outcome of
//! each step decides what happens to the candidate result: `Success` replaces
//! it, `Ignore` keeps whatever an earlier mapper produced, `Invalid` marks it
//! failed, and the `*AndStop` variants end the chain immediately.

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use rust_decimal::Decimal;
use semver::Version;
use url::Url;
use uuid::Uuid;

use crate::{
    error::ConfigError,
    shape::{EnumShape, ParsableShape, ScalarKind},
    source::Cell,
    value::Value,
};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];

/// What a mapper sees for one cell.
#[derive(Debug, Clone, Copy)]
pub struct CellInput<'a> {
    pub column: Option<usize>,
    pub raw: &'a Cell,
    /// Cell text after transformers ran; empty when the cell is empty.
    pub text: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapOutcome {
    Success(Value),
    SuccessAndStop(Value),
    Ignore,
    Invalid(String),
    InvalidAndStop(String),
}

pub trait CellMapper: fmt::Debug + Send + Sync {
    fn map(&self, input: &CellInput<'_>) -> MapOutcome;

    /// Short label used by `plan` output.
    fn describe(&self) -> String;
}

/// Converts text into one of the built-in scalar kinds.
#[derive(Debug, Clone)]
pub struct ScalarMapper {
    kind: ScalarKind,
    formats: Option<Vec<String>>,
}

impl ScalarMapper {
    pub fn new(kind: ScalarKind) -> Self {
        Self {
            kind,
            formats: None,
        }
    }

    /// Replaces the default format list of a date, datetime or time mapper.
    pub fn with_formats(kind: ScalarKind, formats: Vec<String>) -> Result<Self, ConfigError> {
        if formats.is_empty() {
            return Err(ConfigError::EmptyFormats);
        }
        if !matches!(
            kind,
            ScalarKind::Date | ScalarKind::DateTime | ScalarKind::Time
        ) {
            return Err(ConfigError::Unsupported {
                operation: "apply format strings".to_string(),
                target: kind.name().to_string(),
            });
        }
        Ok(Self {
            kind,
            formats: Some(formats),
        })
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }
}

impl CellMapper for ScalarMapper {
    fn map(&self, input: &CellInput<'_>) -> MapOutcome {
        match parse_scalar(self.kind, input.text, self.formats.as_deref()) {
            Ok(value) => MapOutcome::Success(value),
            Err(reason) => MapOutcome::Invalid(reason),
        }
    }

    fn describe(&self) -> String {
        match &self.formats {
            Some(formats) => format!("{} [{}]", self.kind, formats.join(", ")),
            None => self.kind.to_string(),
        }
    }
}

/// Parses `text` as `kind`. `formats` overrides the temporal format lists.
pub fn parse_scalar(
    kind: ScalarKind,
    text: &str,
    formats: Option<&[String]>,
) -> Result<Value, String> {
    match kind {
        ScalarKind::String => return Ok(Value::String(text.to_string())),
        ScalarKind::Char => return parse_char(text).map(Value::Char),
        _ => {}
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(format!("empty text is not a valid {kind}"));
    }
    match kind {
        ScalarKind::Boolean => parse_bool(trimmed).map(Value::Boolean),
        ScalarKind::I8 => parse_signed(trimmed, i8::MIN.into(), i8::MAX.into()),
        ScalarKind::I16 => parse_signed(trimmed, i16::MIN.into(), i16::MAX.into()),
        ScalarKind::I32 => parse_signed(trimmed, i32::MIN.into(), i32::MAX.into()),
        ScalarKind::I64 => parse_signed(trimmed, i64::MIN, i64::MAX),
        ScalarKind::U8 => parse_unsigned(trimmed, u8::MAX.into()),
        ScalarKind::U16 => parse_unsigned(trimmed, u16::MAX.into()),
        ScalarKind::U32 => parse_unsigned(trimmed, u32::MAX.into()),
        ScalarKind::U64 => parse_unsigned(trimmed, u64::MAX),
        ScalarKind::F32 | ScalarKind::F64 => trimmed
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|err| err.to_string()),
        ScalarKind::Decimal => Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map(Value::Decimal)
            .map_err(|err| err.to_string()),
        ScalarKind::Char => parse_char(text).map(Value::Char),
        ScalarKind::Date => parse_date(trimmed, formats).map(Value::Date),
        ScalarKind::DateTime => parse_datetime(trimmed, formats).map(Value::DateTime),
        ScalarKind::Time => parse_time(trimmed, formats).map(Value::Time),
        ScalarKind::Duration => parse_duration(trimmed).map(Value::Duration),
        ScalarKind::Guid => {
            let inner = trimmed.trim_matches(|c| matches!(c, '{' | '}'));
            Uuid::parse_str(inner)
                .map(Value::Guid)
                .map_err(|err| err.to_string())
        }
        ScalarKind::Uri => Url::parse(trimmed)
            .map(Value::Uri)
            .map_err(|err| err.to_string()),
        ScalarKind::Version => parse_version(trimmed).map(Value::Version),
        ScalarKind::String => Ok(Value::String(text.to_string())),
    }
}

/// Whitespace is a valid character; only empty text is rejected.
fn parse_char(text: &str) -> Result<char, String> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Ok(ch),
        (None, _) => Err("empty text is not a valid char".to_string()),
        _ => Err("expected exactly one character".to_string()),
    }
}

pub fn parse_bool(text: &str) -> Result<bool, String> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => Err("not a recognised boolean token".to_string()),
    }
}

fn parse_signed(text: &str, min: i64, max: i64) -> Result<Value, String> {
    let parsed = text.parse::<i64>().map_err(|err| err.to_string())?;
    if parsed < min || parsed > max {
        return Err(format!("{parsed} is outside the range {min}..={max}"));
    }
    Ok(Value::Integer(parsed))
}

fn parse_unsigned(text: &str, max: u64) -> Result<Value, String> {
    let parsed = text
        .strip_prefix('+')
        .unwrap_or(text)
        .parse::<u64>()
        .map_err(|err| err.to_string())?;
    if parsed > max {
        return Err(format!("{parsed} is outside the range 0..={max}"));
    }
    Ok(Value::Unsigned(parsed))
}

fn with_formats<'a>(custom: Option<&'a [String]>, defaults: &'a [&'a str]) -> Vec<&'a str> {
    match custom {
        Some(formats) => formats.iter().map(String::as_str).collect(),
        None => defaults.to_vec(),
    }
}

pub fn parse_date(text: &str, formats: Option<&[String]>) -> Result<NaiveDate, String> {
    for fmt in with_formats(formats, DATE_FORMATS) {
        if let Ok(parsed) = NaiveDate::parse_from_str(text, fmt) {
            return Ok(parsed);
        }
    }
    if formats.is_none()
        && let Ok(stamp) = parse_datetime(text, None)
    {
        return Ok(stamp.date());
    }
    Err(format!("'{text}' does not match any date format"))
}

pub fn parse_datetime(text: &str, formats: Option<&[String]>) -> Result<NaiveDateTime, String> {
    for fmt in with_formats(formats, DATETIME_FORMATS) {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(parsed);
        }
    }
    if formats.is_none() {
        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
                return Ok(date.and_time(NaiveTime::MIN));
            }
        }
    }
    Err(format!("'{text}' does not match any datetime format"))
}

pub fn parse_time(text: &str, formats: Option<&[String]>) -> Result<NaiveTime, String> {
    for fmt in with_formats(formats, TIME_FORMATS) {
        if let Ok(parsed) = NaiveTime::parse_from_str(text, fmt) {
            return Ok(parsed);
        }
    }
    Err(format!("'{text}' does not match any time format"))
}

/// Parses `[-][d.]hh:mm[:ss[.fraction]]`.
pub fn parse_duration(text: &str) -> Result<TimeDelta, String> {
    let invalid = || format!("'{text}' is not a duration of the form [d.]hh:mm[:ss[.fff]]");
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let mut parts = body.split(':');
    let (first, minutes, seconds) = match (parts.next(), parts.next(), parts.next(), parts.next())
    {
        (Some(first), Some(minutes), seconds, None) => (first, minutes, seconds),
        _ => return Err(invalid()),
    };
    let (days, hours) = match first.split_once('.') {
        Some((days, hours)) => (days, hours),
        None => ("0", first),
    };
    let days = days.parse::<i64>().map_err(|_| invalid())?;
    let hours = hours.parse::<i64>().map_err(|_| invalid())?;
    let minutes = minutes.parse::<i64>().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    let (whole, nanos) = match seconds {
        None => (0, 0),
        Some(seconds) => {
            let (whole, fraction) = seconds.split_once('.').unwrap_or((seconds, ""));
            let whole = whole.parse::<i64>().map_err(|_| invalid())?;
            if whole > 59 || fraction.len() > 9 || !fraction.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            let nanos = if fraction.is_empty() {
                0
            } else {
                format!("{fraction:0<9}").parse::<i64>().map_err(|_| invalid())?
            };
            (whole, nanos)
        }
    };
    let magnitude = TimeDelta::try_days(days)
        .and_then(|d| d.checked_add(&TimeDelta::try_hours(hours)?))
        .and_then(|d| d.checked_add(&TimeDelta::try_minutes(minutes)?))
        .and_then(|d| d.checked_add(&TimeDelta::try_seconds(whole)?))
        .and_then(|d| d.checked_add(&TimeDelta::nanoseconds(nanos)))
        .ok_or_else(invalid)?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Semantic versions, padding missing minor/patch components and accepting a
/// leading `v`.
pub fn parse_version(text: &str) -> Result<Version, String> {
    let body = text.strip_prefix(['v', 'V']).unwrap_or(text);
    if let Ok(version) = Version::parse(body) {
        return Ok(version);
    }
    let core_end = body.find(['-', '+']).unwrap_or(body.len());
    let (core, suffix) = body.split_at(core_end);
    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0{suffix}"),
        2 => format!("{core}.0{suffix}"),
        _ => core.to_string() + suffix,
    };
    Version::parse(&padded).map_err(|err| err.to_string())
}

/// Case-insensitive variant lookup.
#[derive(Debug, Clone)]
pub struct EnumMapper {
    shape: EnumShape,
}

impl EnumMapper {
    pub fn new(shape: EnumShape) -> Self {
        Self { shape }
    }
}

impl CellMapper for EnumMapper {
    fn map(&self, input: &CellInput<'_>) -> MapOutcome {
        match self.shape.variant(input.text) {
            Some(variant) => MapOutcome::Success(Value::Enum(variant.to_string())),
            None => MapOutcome::Invalid(format!(
                "expected one of {}",
                self.shape.variants.join(", ")
            )),
        }
    }

    fn describe(&self) -> String {
        format!("enum {}", self.shape.type_name)
    }
}

/// Validates text with the type's `FromStr`; the text itself travels on.
#[derive(Debug, Clone)]
pub struct ParsableMapper {
    shape: ParsableShape,
}

impl ParsableMapper {
    pub fn new(shape: ParsableShape) -> Self {
        Self { shape }
    }
}

impl CellMapper for ParsableMapper {
    fn map(&self, input: &CellInput<'_>) -> MapOutcome {
        let text = input.text.trim();
        match (self.shape.check)(text) {
            Ok(()) => MapOutcome::Success(Value::String(text.to_string())),
            Err(reason) => MapOutcome::Invalid(reason),
        }
    }

    fn describe(&self) -> String {
        format!("parse {}", self.shape.type_name)
    }
}

/// Fixed text-to-value lookup. A hit ends the chain; a miss defers to the
/// other mappers.
#[derive(Debug, Clone, Default)]
pub struct DictionaryMapper {
    entries: HashMap<String, Value>,
    ignore_case: bool,
}

impl DictionaryMapper {
    pub fn new<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ignore_case: false,
        }
    }

    pub fn ignore_case(mut self) -> Self {
        self.entries = self
            .entries
            .into_iter()
            .map(|(key, value)| (key.to_lowercase(), value))
            .collect();
        self.ignore_case = true;
        self
    }
}

impl CellMapper for DictionaryMapper {
    fn map(&self, input: &CellInput<'_>) -> MapOutcome {
        let hit = if self.ignore_case {
            self.entries.get(&input.text.to_lowercase())
        } else {
            self.entries.get(input.text)
        };
        match hit {
            Some(value) => MapOutcome::SuccessAndStop(value.clone()),
            None => MapOutcome::Ignore,
        }
    }

    fn describe(&self) -> String {
        format!("lookup ({} entries)", self.entries.len())
    }
}

/// Adapts a closure into a mapper.
#[derive(Clone)]
pub struct FnMapper {
    name: String,
    func: Arc<dyn Fn(&CellInput<'_>) -> MapOutcome + Send + Sync>,
}

impl FnMapper {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&CellInput<'_>) -> MapOutcome + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for FnMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnMapper").field(&self.name).finish()
    }
}

impl CellMapper for FnMapper {
    fn map(&self, input: &CellInput<'_>) -> MapOutcome {
        (self.func)(input)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
