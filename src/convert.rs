//! Conversion from dynamic [`Value`]s into caller types.
//!
//! [`FromValue`] is the seam between the engine and user types: it reports a
//! type's [`Shape`] for the auto-mapper and converts the value tree a map
//! produced. Records additionally implement [`SheetRecord`] so that fields
//! are assigned onto a default instance one at a time, leaving unmapped
//! fields at their defaults.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    fmt,
    hash::Hash,
    str::FromStr,
    sync::Arc,
};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use semver::Version;
use url::Url;
use uuid::Uuid;

use crate::{
    error::ValueError,
    shape::{ContainerKind, FieldShape, ScalarKind, Shape, short_type_name},
    value::Value,
};

pub trait FromValue: Sized {
    fn shape() -> Shape;

    fn from_value(value: Value) -> Result<Self, ValueError>;
}

/// A record type populated field by field.
pub trait SheetRecord: FromValue + Default {
    fn assign(&mut self, field: &str, value: Value) -> Result<(), ValueError>;
}

/// Builds a record from a [`Value::Record`], starting from `T::default()`.
pub fn from_record<T: SheetRecord>(value: Value) -> Result<T, ValueError> {
    match value {
        Value::Record(fields) => {
            let mut record = T::default();
            for (name, field_value) in fields {
                record
                    .assign(&name, field_value)
                    .map_err(|err| err.within(name.clone()))?;
            }
            Ok(record)
        }
        other => Err(ValueError::new(short_type_name::<T>(), other.describe())),
    }
}

/// Parses text-carrying values with `FromStr`, for types described by
/// [`Shape::parsable`].
pub fn parse_from_value<T>(value: Value) -> Result<T, ValueError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match value {
        Value::String(text) | Value::Enum(text) => T::from_str(&text).map_err(|err| {
            ValueError::new(short_type_name::<T>(), format!("'{text}' ({err})"))
        }),
        other => Err(ValueError::new(short_type_name::<T>(), other.describe())),
    }
}

#[doc(hidden)]
pub fn configure_field<F>(field: FieldShape, configure: F) -> FieldShape
where
    F: FnOnce(FieldShape) -> FieldShape,
{
    configure(field)
}

/// Canonical variant name carried by an enum value.
pub fn enum_variant<T>(value: Value) -> Result<String, ValueError> {
    match value {
        Value::Enum(variant) | Value::String(variant) => Ok(variant),
        other => Err(ValueError::new(short_type_name::<T>(), other.describe())),
    }
}

fn mismatch<T>(value: &Value) -> ValueError {
    ValueError::new(short_type_name::<T>(), value.describe())
}

macro_rules! integer_from_value {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn shape() -> Shape {
                    Shape::Scalar(ScalarKind::$kind)
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    let converted = match &value {
                        Value::Integer(number) => <$ty>::try_from(*number).ok(),
                        Value::Unsigned(number) => <$ty>::try_from(*number).ok(),
                        _ => None,
                    };
                    converted.ok_or_else(|| mismatch::<$ty>(&value))
                }
            }
        )*
    };
}

integer_from_value!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
);

macro_rules! float_from_value {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn shape() -> Shape {
                    Shape::Scalar(ScalarKind::$kind)
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    match value {
                        Value::Float(number) => Ok(number as $ty),
                        Value::Integer(number) => Ok(number as $ty),
                        Value::Unsigned(number) => Ok(number as $ty),
                        other => Err(mismatch::<$ty>(&other)),
                    }
                }
            }
        )*
    };
}

float_from_value!(f32 => F32, f64 => F64);

macro_rules! variant_from_value {
    ($($ty:ty => $kind:ident, $variant:ident);* $(;)?) => {
        $(
            impl FromValue for $ty {
                fn shape() -> Shape {
                    Shape::Scalar(ScalarKind::$kind)
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    match value {
                        Value::$variant(inner) => Ok(inner),
                        other => Err(mismatch::<$ty>(&other)),
                    }
                }
            }
        )*
    };
}

variant_from_value!(
    bool => Boolean, Boolean;
    NaiveDate => Date, Date;
    NaiveDateTime => DateTime, DateTime;
    NaiveTime => Time, Time;
    TimeDelta => Duration, Duration;
    Uuid => Guid, Guid;
    Url => Uri, Uri;
    Version => Version, Version;
);

impl FromValue for String {
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::String)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::String(text) | Value::Enum(text) => Ok(text),
            Value::Null => Ok(String::new()),
            other => Err(mismatch::<String>(&other)),
        }
    }
}

impl FromValue for char {
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::Char)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Char(ch) => Ok(ch),
            other => Err(mismatch::<char>(&other)),
        }
    }
}

impl FromValue for Decimal {
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::Decimal)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Decimal(number) => Ok(number),
            Value::Integer(number) => Ok(Decimal::from(number)),
            Value::Unsigned(number) => Ok(Decimal::from(number)),
            Value::Float(number) => Decimal::try_from(number)
                .map_err(|_| mismatch::<Decimal>(&Value::Float(number))),
            other => Err(mismatch::<Decimal>(&other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn shape() -> Shape {
        Shape::Optional(Box::new(T::shape()))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

fn elements<T: FromValue, C>(value: Value) -> Result<Vec<T>, ValueError> {
    match value {
        Value::List(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| T::from_value(item).map_err(|err| err.within(format!("[{idx}]"))))
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(mismatch::<C>(&other)),
    }
}

macro_rules! sequence_from_value {
    ($($container:ident<T $(: $($bound:path),+)?> => $kind:expr),* $(,)?) => {
        $(
            impl<T: FromValue $($(+ $bound)+)?> FromValue for $container<T> {
                fn shape() -> Shape {
                    Shape::sequence::<Self>(T::shape(), $kind)
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    Ok(elements::<T, Self>(value)?.into_iter().collect())
                }
            }
        )*
    };
}

sequence_from_value!(
    Vec<T> => ContainerKind::List,
    VecDeque<T> => ContainerKind::List,
    BTreeSet<T: Ord> => ContainerKind::Set,
    HashSet<T: Eq, Hash> => ContainerKind::Set,
);

impl<T: FromValue> FromValue for Box<[T]> {
    fn shape() -> Shape {
        Shape::sequence::<Self>(T::shape(), ContainerKind::Immutable)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(elements::<T, Self>(value)?.into_boxed_slice())
    }
}

impl<T: FromValue> FromValue for Arc<[T]> {
    fn shape() -> Shape {
        Shape::sequence::<Self>(T::shape(), ContainerKind::Immutable)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(elements::<T, Self>(value)?.into())
    }
}

impl<T: FromValue, const N: usize> FromValue for [T; N] {
    fn shape() -> Shape {
        Shape::sequence::<Self>(T::shape(), ContainerKind::Array(Some(N)))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        let items = elements::<T, Self>(value)?;
        let found = items.len();
        items.try_into().map_err(|_| {
            ValueError::new(
                short_type_name::<Self>(),
                format!("list of {found} element(s)"),
            )
        })
    }
}

fn entries<V: FromValue, C>(value: Value) -> Result<Vec<(String, V)>, ValueError> {
    match value {
        Value::Map(entries) => entries
            .into_iter()
            .map(|(key, item)| match V::from_value(item) {
                Ok(converted) => Ok((key, converted)),
                Err(err) => Err(err.within(format!("[\"{key}\"]"))),
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(mismatch::<C>(&other)),
    }
}

macro_rules! dictionary_from_value {
    ($($container:ident),* $(,)?) => {
        $(
            impl<V: FromValue> FromValue for $container<String, V> {
                fn shape() -> Shape {
                    Shape::dictionary::<Self>(V::shape())
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    Ok(entries::<V, Self>(value)?.into_iter().collect())
                }
            }
        )*
    };
}

dictionary_from_value!(HashMap, BTreeMap, IndexMap);

/// Implements [`FromValue`] and [`SheetRecord`] for a struct with named
/// fields. Each field may carry a closure that customises its
/// [`FieldShape`](crate::shape::FieldShape):
///
/// ```
/// use sheet_mapper::impl_sheet_record;
///
/// #[derive(Debug, Default)]
/// struct Person {
///     id: i32,
///     name: String,
/// }
///
/// impl_sheet_record!(Person {
///     id: i32 => |field| field.column("Identifier"),
///     name: String,
/// });
/// ```
#[macro_export]
macro_rules! impl_sheet_record {
    ($ty:ident { $($field:ident : $fty:ty $(=> $configure:expr)?),* $(,)? }) => {
        impl $crate::convert::FromValue for $ty {
            fn shape() -> $crate::shape::Shape {
                $crate::shape::Shape::object::<$ty>(vec![
                    $({
                        let field = $crate::shape::FieldShape::of::<$fty>(stringify!($field));
                        $(let field = $crate::convert::configure_field(field, $configure);)?
                        field
                    }),*
                ])
            }

            fn from_value(
                value: $crate::value::Value,
            ) -> ::std::result::Result<Self, $crate::error::ValueError> {
                $crate::convert::from_record(value)
            }
        }

        impl $crate::convert::SheetRecord for $ty {
            fn assign(
                &mut self,
                field: &str,
                value: $crate::value::Value,
            ) -> ::std::result::Result<(), $crate::error::ValueError> {
                match field {
                    $(stringify!($field) => {
                        self.$field = <$fty as $crate::convert::FromValue>::from_value(value)?;
                        Ok(())
                    })*
                    other => Err($crate::error::ValueError::new(
                        concat!("a field of ", stringify!($ty)),
                        format!("unknown field '{other}'"),
                    )),
                }
            }
        }
    };
}

/// Implements [`FromValue`] for a fieldless enum, matching variant names
/// case-insensitively.
#[macro_export]
macro_rules! impl_sheet_enum {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::convert::FromValue for $ty {
            fn shape() -> $crate::shape::Shape {
                $crate::shape::Shape::enumeration::<$ty>(&[$(stringify!($variant)),+])
            }

            fn from_value(
                value: $crate::value::Value,
            ) -> ::std::result::Result<Self, $crate::error::ValueError> {
                let variant = $crate::convert::enum_variant::<$ty>(value)?;
                $(if variant.eq_ignore_ascii_case(stringify!($variant)) {
                    return Ok($ty::$variant);
                })+
                Err($crate::error::ValueError::new(
                    stringify!($ty),
                    format!("unknown variant '{variant}'"),
                ))
            }
        }
    };
}
