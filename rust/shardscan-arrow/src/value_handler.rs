//! Per-column value handlers: typed Arrow builders fed with JSON values.
//!
//! Every handler accepts a missing value or JSON `null` as a null cell. Any
//! other value is coerced to the column type; a value that cannot be coerced
//! fails with [`ErrorKind::Coercion`](shardscan_common::error::ErrorKind::Coercion)
//! naming the column, the expected type and the raw JSON text.

use std::sync::Arc;

use arrow_array::{
    ArrayRef, ArrowPrimitiveType,
    builder::{
        ArrayBuilder, BooleanBuilder, PrimitiveBuilder, StringBuilder, TimestampNanosecondBuilder,
    },
    types::{Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use shardscan_common::{Result, error::Error};

use crate::schema::{Column, ColumnType};

/// Appends JSON values of one column to an Arrow array under construction.
pub trait ValueHandler: Send {
    /// Appends one cell. `None` and `Some(Value::Null)` append a null.
    fn append(&mut self, value: Option<&Value>) -> Result<()>;

    /// Number of cells appended since the last [`finish`](Self::finish).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds the array and resets the handler.
    fn finish(&mut self) -> ArrayRef;
}

/// Creates the handler for `column`, pre-sized for `capacity` cells.
pub fn create_value_handler(column: &Column, capacity: usize) -> Box<dyn ValueHandler> {
    let name = column.name.clone();
    let expected = column.column_type.to_string();
    match &column.column_type {
        ColumnType::Bool => Box::new(BoolHandler {
            column: name,
            builder: BooleanBuilder::with_capacity(capacity),
        }),
        ColumnType::Int8 => Box::new(PrimitiveHandler::<Int8Type>::new(
            name,
            expected,
            capacity,
            |v| coerce_i64(v).and_then(|n| i8::try_from(n).ok()),
        )),
        ColumnType::Int16 => Box::new(PrimitiveHandler::<Int16Type>::new(
            name,
            expected,
            capacity,
            |v| coerce_i64(v).and_then(|n| i16::try_from(n).ok()),
        )),
        ColumnType::Int32 => Box::new(PrimitiveHandler::<Int32Type>::new(
            name,
            expected,
            capacity,
            |v| coerce_i64(v).and_then(|n| i32::try_from(n).ok()),
        )),
        ColumnType::Int64 => Box::new(PrimitiveHandler::<Int64Type>::new(
            name, expected, capacity, coerce_i64,
        )),
        ColumnType::Float32 => Box::new(PrimitiveHandler::<Float32Type>::new(
            name,
            expected,
            capacity,
            |v| coerce_f64(v).map(|n| n as f32),
        )),
        ColumnType::Float64 => Box::new(PrimitiveHandler::<Float64Type>::new(
            name, expected, capacity, coerce_f64,
        )),
        ColumnType::String { max_len } => Box::new(StringHandler {
            column: name,
            expected,
            max_len: Some(*max_len),
            builder: StringBuilder::with_capacity(capacity, capacity * 16),
        }),
        ColumnType::VarString => Box::new(StringHandler {
            column: name,
            expected,
            max_len: None,
            builder: StringBuilder::with_capacity(capacity, capacity * 16),
        }),
        ColumnType::Time { format } => Box::new(TimeHandler {
            column: name,
            expected,
            format: format.clone(),
            builder: TimestampNanosecondBuilder::with_capacity(capacity),
        }),
    }
}

struct PrimitiveHandler<T: ArrowPrimitiveType> {
    column: String,
    expected: String,
    coerce: fn(&Value) -> Option<T::Native>,
    builder: PrimitiveBuilder<T>,
}

impl<T: ArrowPrimitiveType> PrimitiveHandler<T> {
    fn new(
        column: String,
        expected: String,
        capacity: usize,
        coerce: fn(&Value) -> Option<T::Native>,
    ) -> Self {
        PrimitiveHandler {
            column,
            expected,
            coerce,
            builder: PrimitiveBuilder::with_capacity(capacity),
        }
    }
}

impl<T: ArrowPrimitiveType> ValueHandler for PrimitiveHandler<T> {
    fn append(&mut self, value: Option<&Value>) -> Result<()> {
        match value {
            None | Some(Value::Null) => self.builder.append_null(),
            Some(value) => match (self.coerce)(value) {
                Some(v) => self.builder.append_value(v),
                None => return Err(Error::coercion(&self.column, &self.expected, value.to_string())),
            },
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.builder.len()
    }

    fn finish(&mut self) -> ArrayRef {
        Arc::new(self.builder.finish())
    }
}

struct BoolHandler {
    column: String,
    builder: BooleanBuilder,
}

impl ValueHandler for BoolHandler {
    fn append(&mut self, value: Option<&Value>) -> Result<()> {
        match value {
            None | Some(Value::Null) => self.builder.append_null(),
            Some(value) => match coerce_bool(value) {
                Some(v) => self.builder.append_value(v),
                None => return Err(Error::coercion(&self.column, "bool", value.to_string())),
            },
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.builder.len()
    }

    fn finish(&mut self) -> ArrayRef {
        Arc::new(self.builder.finish())
    }
}

struct StringHandler {
    column: String,
    expected: String,
    max_len: Option<usize>,
    builder: StringBuilder,
}

impl ValueHandler for StringHandler {
    fn append(&mut self, value: Option<&Value>) -> Result<()> {
        match value {
            None | Some(Value::Null) => self.builder.append_null(),
            Some(Value::String(s)) => {
                self.check_len(s, value)?;
                self.builder.append_value(s);
            }
            Some(other) => {
                let text = other.to_string();
                self.check_len(&text, value)?;
                self.builder.append_value(text);
            }
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.builder.len()
    }

    fn finish(&mut self) -> ArrayRef {
        Arc::new(self.builder.finish())
    }
}

impl StringHandler {
    fn check_len(&self, text: &str, raw: Option<&Value>) -> Result<()> {
        match self.max_len {
            Some(max_len) if text.chars().count() > max_len => Err(Error::coercion(
                &self.column,
                &self.expected,
                raw.map(Value::to_string).unwrap_or_default(),
            )),
            _ => Ok(()),
        }
    }
}

struct TimeHandler {
    column: String,
    expected: String,
    format: String,
    builder: TimestampNanosecondBuilder,
}

impl ValueHandler for TimeHandler {
    fn append(&mut self, value: Option<&Value>) -> Result<()> {
        match value {
            None | Some(Value::Null) => self.builder.append_null(),
            Some(value) => match value.as_str().and_then(|s| parse_time(s, &self.format)) {
                Some(nanos) => self.builder.append_value(nanos),
                None => return Err(Error::coercion(&self.column, &self.expected, value.to_string())),
            },
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.builder.len()
    }

    fn finish(&mut self) -> ArrayRef {
        Arc::new(self.builder.finish())
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        _ => None,
    }
}

/// Integral numbers, numeric strings and floats with a zero fraction.
fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral_f64_to_i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral_f64_to_i64))
        }
        _ => None,
    }
}

fn integral_f64_to_i64(n: f64) -> Option<i64> {
    // i64::MAX is not representable as f64; 2^63 itself is already out of range.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if n.is_finite() && n.fract() == 0.0 && n >= -LIMIT && n < LIMIT {
        Some(n as i64)
    } else {
        None
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Parses `text` with `format` into nanoseconds since the Unix epoch.
///
/// Offset-aware formats are converted to UTC; naive date-times are taken as
/// UTC; date-only formats resolve to midnight.
fn parse_time(text: &str, format: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_str(text, format) {
        return dt.timestamp_nanos_opt();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
        return dt.and_utc().timestamp_nanos_opt();
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, format) {
        return date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_nanos_opt();
    }
    None
}
