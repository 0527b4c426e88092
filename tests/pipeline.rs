use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, TimeDelta};
use proptest::prelude::*;
use rust_decimal::Decimal;
use semver::Version;
use sheet_mapper::{
    error::CellError,
    fallback::{FixedValue, NullValue},
    mappers::{CellInput, DictionaryMapper, FnMapper, MapOutcome},
    pipeline::ValuePipeline,
    shape::ScalarKind,
    transform::{Case, ConvertCase, FnTransformer, ReplaceValues},
    value::{Value, format_duration},
};
use url::Url;
use uuid::Uuid;

fn pipeline(kind: ScalarKind) -> ValuePipeline {
    ValuePipeline::for_kind(kind)
}

#[test]
fn empty_fallback_result_is_final() {
    let mut lookup = pipeline(ScalarKind::String);
    lookup
        .add_mapper(Arc::new(DictionaryMapper::new([("", Value::from("blank"))])))
        .set_empty_fallback(Some(Arc::new(NullValue)));
    assert_eq!(lookup.execute_text(""), Ok(Value::Null));
}

#[test]
fn dictionary_hits_override_the_converter_and_misses_defer_to_it() {
    let mut status = pipeline(ScalarKind::I32);
    status.add_mapper(Arc::new(
        DictionaryMapper::new([("none", Value::Integer(0)), ("all", Value::Integer(100))])
            .ignore_case(),
    ));
    assert_eq!(status.execute_text("ALL"), Ok(Value::Integer(100)));
    assert_eq!(status.execute_text("7"), Ok(Value::Integer(7)));
    assert!(matches!(
        status.execute_text("some"),
        Err(CellError::Conversion { .. })
    ));
}

#[test]
fn later_mappers_can_rescue_an_invalid_result() {
    let mut percent = pipeline(ScalarKind::F64);
    percent.add_mapper(Arc::new(FnMapper::new("percent", |input: &CellInput<'_>| {
        match input.text.strip_suffix('%').map(str::parse::<f64>) {
            Some(Ok(value)) => MapOutcome::Success(Value::Float(value / 100.0)),
            _ => MapOutcome::Ignore,
        }
    })));
    assert_eq!(percent.execute_text("25%"), Ok(Value::Float(0.25)));
    assert_eq!(percent.execute_text("0.5"), Ok(Value::Float(0.5)));
}

#[test]
fn invalid_fallback_receives_failed_cells_only() {
    let mut count = pipeline(ScalarKind::U8);
    count.set_invalid_fallback(Some(Arc::new(FixedValue::new(0u8))));
    assert_eq!(count.execute_text("300"), Ok(Value::Unsigned(0)));
    assert_eq!(count.execute_text("12"), Ok(Value::Unsigned(12)));
}

#[test]
fn conversion_errors_name_the_value_and_target() {
    let err = pipeline(ScalarKind::Date).execute_text("soon").unwrap_err();
    match err {
        CellError::Conversion { value, target, .. } => {
            assert_eq!(value, "soon");
            assert_eq!(target, "date");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn replacements_and_case_conversion_chain_in_order() {
    let mut code = pipeline(ScalarKind::String);
    code.add_transformer(Arc::new(ReplaceValues::default().with("n/a", "unknown")))
        .add_transformer(Arc::new(ConvertCase(Case::Upper)));
    assert_eq!(code.execute_text("n/a"), Ok(Value::from("UNKNOWN")));
    assert_eq!(code.execute_text("abc"), Ok(Value::from("ABC")));
}

#[test]
fn custom_formats_replace_the_defaults() {
    let mut date = pipeline(ScalarKind::Date);
    date.set_formats(vec!["%d.%m.%Y".to_string()]).expect("formats");
    assert_eq!(
        date.execute_text("24.12.2024"),
        Ok(Value::Date(NaiveDate::from_ymd_opt(2024, 12, 24).expect("date")))
    );
    assert!(date.execute_text("2024-12-24").is_err());
    assert!(pipeline(ScalarKind::I32).set_formats(vec!["%d".to_string()]).is_err());
}

/// Reads the display form of `value` back through a `kind` pipeline.
fn round_trip(kind: ScalarKind, value: &Value) -> Result<Value, CellError> {
    pipeline(kind).execute_text(&value.as_display())
}

#[test]
fn whitespace_is_a_valid_char() {
    let letter = pipeline(ScalarKind::Char);
    assert_eq!(letter.execute_text(" "), Ok(Value::Char(' ')));
    assert_eq!(letter.execute_text("\t"), Ok(Value::Char('\t')));
    assert!(letter.execute_text("ab").is_err());
    assert!(letter.execute_text("").is_err());
}

#[test]
fn narrow_integers_reject_values_outside_their_range() {
    assert!(pipeline(ScalarKind::I8).execute_text("128").is_err());
    assert!(pipeline(ScalarKind::I16).execute_text("-32769").is_err());
    assert!(pipeline(ScalarKind::U16).execute_text("65536").is_err());
    assert!(pipeline(ScalarKind::U32).execute_text("-1").is_err());
}

#[test]
fn replaced_converter_decides_alone() {
    let mut flag = pipeline(ScalarKind::Boolean);
    flag.set_converter(Some(Arc::new(FnMapper::new("ja/nein", |input: &CellInput<'_>| {
        match input.text {
            "ja" => MapOutcome::Success(Value::Boolean(true)),
            "nein" => MapOutcome::Success(Value::Boolean(false)),
            other => MapOutcome::Invalid(format!("'{other}' is not ja/nein")),
        }
    }))));
    assert_eq!(flag.execute_text("ja"), Ok(Value::Boolean(true)));
    assert!(flag.execute_text("true").is_err());
    assert!(flag.describe().starts_with("ja/nein"));
}

#[test]
fn closure_transformers_run_before_conversion() {
    let mut amount = pipeline(ScalarKind::I32);
    amount.add_transformer(Arc::new(FnTransformer::new("strip thousands", |text| {
        text.map(|text| text.replace(',', ""))
    })));
    assert_eq!(amount.execute_text("12,345"), Ok(Value::Integer(12_345)));
}

proptest! {
    #[test]
    fn integers_round_trip_through_text(value in any::<i64>()) {
        prop_assert_eq!(
            pipeline(ScalarKind::I64).execute_text(&value.to_string()),
            Ok(Value::Integer(value))
        );
    }

    #[test]
    fn floats_round_trip_through_text(value in proptest::num::f64::NORMAL) {
        prop_assert_eq!(
            pipeline(ScalarKind::F64).execute_text(&value.to_string()),
            Ok(Value::Float(value))
        );
    }

    #[test]
    fn booleans_round_trip_through_text(value in any::<bool>()) {
        prop_assert_eq!(
            pipeline(ScalarKind::Boolean).execute_text(&value.to_string()),
            Ok(Value::Boolean(value))
        );
    }

    #[test]
    fn dates_round_trip_through_iso_text(days in 0i64..200_000) {
        let date = NaiveDate::from_ymd_opt(1900, 1, 1).expect("epoch") + TimeDelta::days(days);
        prop_assert_eq!(
            pipeline(ScalarKind::Date).execute_text(&date.format("%Y-%m-%d").to_string()),
            Ok(Value::Date(date))
        );
    }

    #[test]
    fn signed_integers_round_trip_at_every_width(
        a in any::<i8>(),
        b in any::<i16>(),
        c in any::<i32>(),
    ) {
        for (kind, value) in [
            (ScalarKind::I8, i64::from(a)),
            (ScalarKind::I16, i64::from(b)),
            (ScalarKind::I32, i64::from(c)),
            (ScalarKind::I8, i64::from(i8::MIN)),
            (ScalarKind::I32, i64::from(i32::MAX)),
        ] {
            let value = Value::Integer(value);
            prop_assert_eq!(round_trip(kind, &value), Ok(value));
        }
    }

    #[test]
    fn unsigned_integers_round_trip_at_every_width(
        a in any::<u8>(),
        b in any::<u16>(),
        c in any::<u32>(),
        d in any::<u64>(),
    ) {
        for (kind, value) in [
            (ScalarKind::U8, u64::from(a)),
            (ScalarKind::U16, u64::from(b)),
            (ScalarKind::U32, u64::from(c)),
            (ScalarKind::U64, d),
            (ScalarKind::U8, u64::from(u8::MAX)),
            (ScalarKind::U64, u64::MAX),
        ] {
            let value = Value::Unsigned(value);
            prop_assert_eq!(round_trip(kind, &value), Ok(value));
        }
    }

    #[test]
    fn single_precision_floats_round_trip(value in proptest::num::f32::NORMAL) {
        let value = Value::Float(f64::from(value));
        prop_assert_eq!(round_trip(ScalarKind::F32, &value), Ok(value));
    }

    #[test]
    fn decimals_round_trip(mantissa in any::<i64>(), scale in 0u32..=10) {
        let value = Value::Decimal(Decimal::new(mantissa, scale));
        prop_assert_eq!(round_trip(ScalarKind::Decimal, &value), Ok(value));
    }

    #[test]
    fn chars_round_trip(value in any::<char>()) {
        let value = Value::Char(value);
        prop_assert_eq!(round_trip(ScalarKind::Char, &value), Ok(value));
    }

    #[test]
    fn datetimes_round_trip(seconds in 0i64..6_000_000_000) {
        let epoch = NaiveDate::from_ymd_opt(1900, 1, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .expect("epoch");
        let value = Value::DateTime(epoch + TimeDelta::seconds(seconds));
        prop_assert_eq!(round_trip(ScalarKind::DateTime, &value), Ok(value));
    }

    #[test]
    fn times_round_trip(seconds in 0u32..86_400) {
        let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0).expect("time");
        let value = Value::Time(time);
        prop_assert_eq!(round_trip(ScalarKind::Time, &value), Ok(value));
    }

    #[test]
    fn guids_round_trip(bits in any::<u128>()) {
        let value = Value::Guid(Uuid::from_u128(bits));
        prop_assert_eq!(round_trip(ScalarKind::Guid, &value), Ok(value));
    }

    #[test]
    fn uris_round_trip(host in "[a-z]{1,12}", path in "[a-z0-9]{0,8}", port in 1u16..=u16::MAX) {
        let url = Url::parse(&format!("https://{host}.example:{port}/{path}")).expect("url");
        let value = Value::Uri(url);
        prop_assert_eq!(round_trip(ScalarKind::Uri, &value), Ok(value));
    }

    #[test]
    fn versions_round_trip(major in any::<u16>(), minor in any::<u16>(), patch in any::<u16>()) {
        let value = Value::Version(Version::new(major.into(), minor.into(), patch.into()));
        prop_assert_eq!(round_trip(ScalarKind::Version, &value), Ok(value));
    }

    #[test]
    fn durations_round_trip_through_their_display_form(
        seconds in -10_000_000i64..10_000_000,
        millis in 0i64..1000,
    ) {
        let duration = TimeDelta::seconds(seconds) + TimeDelta::milliseconds(millis);
        prop_assert_eq!(
            pipeline(ScalarKind::Duration).execute_text(&format_duration(duration)),
            Ok(Value::Duration(duration))
        );
    }
}
