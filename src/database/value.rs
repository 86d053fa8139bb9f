//! Field values of records and their coercion into column storage types.

use crate::database::column::StorageType;
use crate::spreadsheet::format::excel_to_datetime;
use crate::spreadsheet::format::format_general;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::Timelike;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;

const DATE_FORMATS: [&str; 6] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m/%d/%y", "%m-%d-%y", "%d-%b-%y"];
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%y %H:%M",
    "%m/%d/%y %I:%M %p",
];
const TIME_FORMATS: [&str; 4] = ["%H:%M:%S%.f", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];

/// A date, a date-time or a time of day.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Temporal {
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl Display for Temporal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Temporal::DateTime(value) if value.nanosecond() == 0 => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S")),
            Temporal::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S%.6f")),
            Temporal::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            Temporal::Time(value) if value.nanosecond() == 0 => write!(f, "{}", value.format("%H:%M:%S")),
            Temporal::Time(value) => write!(f, "{}", value.format("%H:%M:%S%.6f")),
        }
    }
}

/// One value of a record.
///
/// JSON strings deserialize as `Text`; temporals are only produced by coercion.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Temporal(Temporal),
}

/// An ordered property-to-value map.
pub type Record = IndexMap<String, FieldValue>;

/// One item of a query result.
#[derive(Clone, Debug, PartialEq)]
pub enum ResultRow {
    Record(Record),
    Value(FieldValue),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Converts the value to a column storage type, `None` when it does not fit.
    /// Null always stays null.
    pub fn coerce(&self, storage_type: StorageType) -> Option<FieldValue> {
        if self.is_null() {
            return Some(FieldValue::Null);
        }
        match storage_type {
            StorageType::String | StorageType::Text => Some(FieldValue::Text(self.to_string())),
            StorageType::Integer | StorageType::BigInteger => self.to_integer().map(FieldValue::Integer),
            StorageType::Float | StorageType::Decimal => self.to_float().map(FieldValue::Float),
            StorageType::Boolean => self.to_boolean().map(FieldValue::Boolean),
            StorageType::Date => self.to_datetime().map(|value| FieldValue::Temporal(Temporal::Date(value.date()))),
            StorageType::DateTime | StorageType::Timestamp => {
                self.to_datetime().map(|value| FieldValue::Temporal(Temporal::DateTime(value)))
            }
            StorageType::Time => self.to_time().map(|value| FieldValue::Temporal(Temporal::Time(value))),
        }
    }

    /// Text bound as a query parameter; DuckDB casts it to the column type.
    pub(crate) fn to_sql_text(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Float(value) if value.is_nan() => Some("NaN".to_owned()),
            FieldValue::Float(value) => Some(value.to_string()),
            other => Some(other.to_string()),
        }
    }

    fn to_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(value) => Some(*value),
            FieldValue::Boolean(value) => Some(*value as i64),
            FieldValue::Float(_) | FieldValue::Text(_) => {
                let value = self.to_float()?;
                (value.fract() == 0.0 && value.abs() < 9.2e18).then_some(value as i64)
            }
            _ => None,
        }
    }

    fn to_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(value) => Some(*value),
            FieldValue::Integer(value) => Some(*value as f64),
            FieldValue::Boolean(value) => Some(if *value { 1.0 } else { 0.0 }),
            FieldValue::Text(text) => parse_number(text),
            _ => None,
        }
    }

    fn to_boolean(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(value) => Some(*value),
            FieldValue::Integer(value) => Some(*value != 0),
            FieldValue::Float(value) => Some(*value != 0.0),
            FieldValue::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "on" => Some(true),
                "false" | "no" | "n" | "off" => Some(false),
                other => parse_number(other).map(|number| number != 0.0),
            },
            _ => None,
        }
    }

    fn to_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::Temporal(Temporal::DateTime(value)) => Some(*value),
            FieldValue::Temporal(Temporal::Date(value)) => value.and_hms_opt(0, 0, 0),
            FieldValue::Integer(_) | FieldValue::Float(_) => excel_to_datetime(self.to_float()?, false),
            FieldValue::Text(text) => parse_datetime(text.trim()),
            _ => None,
        }
    }

    fn to_time(&self) -> Option<NaiveTime> {
        match self {
            FieldValue::Temporal(Temporal::Time(value)) => Some(*value),
            FieldValue::Temporal(Temporal::DateTime(value)) => Some(value.time()),
            FieldValue::Float(value) if (0.0..1.0).contains(value) => excel_to_datetime(*value, false).map(|it| it.time()),
            FieldValue::Text(text) => {
                let text = text.trim();
                TIME_FORMATS
                    .iter()
                    .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
                    .or_else(|| parse_datetime(text).map(|value| value.time()))
            }
            _ => None,
        }
    }
}

/// Parses plain numbers plus grouped (`1,234.5`) and percent (`25%`) forms.
fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let (text, scale) = match text.strip_suffix('%') {
        Some(stripped) => (stripped.trim_end(), 100.0),
        None => (text, 1.0),
    };
    text.replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|number| !text.is_empty() && number.is_finite())
        .map(|number| number / scale)
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Boolean(value) => write!(f, "{value}"),
            FieldValue::Integer(value) => write!(f, "{value}"),
            FieldValue::Float(value) => write!(f, "{}", format_general(*value)),
            FieldValue::Text(value) => f.write_str(value),
            FieldValue::Temporal(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Temporal(Temporal::Date(value))
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        FieldValue::Temporal(Temporal::DateTime(value))
    }
}

impl From<NaiveTime> for FieldValue {
    fn from(value: NaiveTime) -> Self {
        FieldValue::Temporal(Temporal::Time(value))
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("NaiveDate Literal")
    }

    #[test]
    fn coerce_text_into_numbers() {
        let text = FieldValue::from("1,234");
        assert_eq!(text.coerce(StorageType::Integer), Some(FieldValue::Integer(1234)));
        assert_eq!(FieldValue::from("25%").coerce(StorageType::Float), Some(FieldValue::Float(0.25)));
        assert_eq!(FieldValue::from("1.5").coerce(StorageType::Integer), None);
        assert_eq!(FieldValue::from("abc").coerce(StorageType::Float), None);
        assert_eq!(FieldValue::from("").coerce(StorageType::Float), None);
    }

    #[test]
    fn coerce_into_text_and_boolean() {
        assert_eq!(FieldValue::Float(1.0).coerce(StorageType::String), Some(FieldValue::from("1")));
        assert_eq!(FieldValue::from("TRUE").coerce(StorageType::Boolean), Some(FieldValue::Boolean(true)));
        assert_eq!(FieldValue::from("0").coerce(StorageType::Boolean), Some(FieldValue::Boolean(false)));
        assert_eq!(FieldValue::Null.coerce(StorageType::Boolean), Some(FieldValue::Null));
    }

    #[test]
    fn coerce_temporals() {
        let new_year = date(2017, 1, 1);
        assert_eq!(FieldValue::from("2017-01-01").coerce(StorageType::Date), Some(new_year.into()));
        assert_eq!(FieldValue::Float(42736.0).coerce(StorageType::Date), Some(new_year.into()));

        let evening = new_year.and_hms_opt(18, 0, 0).expect("NaiveDate Literal");
        assert_eq!(FieldValue::from("1/1/17 6:00 PM").coerce(StorageType::DateTime), Some(evening.into()));
        assert_eq!(FieldValue::from("2017-01-01 18:00:00").coerce(StorageType::Timestamp), Some(evening.into()));
        assert_eq!(FieldValue::from("18:00").coerce(StorageType::Time), Some(evening.time().into()));
        assert_eq!(FieldValue::Float(0.75).coerce(StorageType::Time), Some(evening.time().into()));
        assert_eq!(FieldValue::from("someday").coerce(StorageType::Date), None);
        assert_eq!(FieldValue::Float(1e20).coerce(StorageType::Date), None);
        assert_eq!(FieldValue::Integer(i64::MAX).coerce(StorageType::DateTime), None);
    }

    #[test]
    fn display_and_sql_text() {
        let moment = date(2017, 1, 1).and_hms_opt(1, 2, 3).expect("NaiveDate Literal");
        assert_eq!(FieldValue::from(moment).to_string(), "2017-01-01 01:02:03");
        assert_eq!(FieldValue::from(date(2017, 1, 1)).to_sql_text(), Some("2017-01-01".to_owned()));
        assert_eq!(FieldValue::Float(0.1).to_sql_text(), Some("0.1".to_owned()));
        assert_eq!(FieldValue::Null.to_sql_text(), None);
    }

    #[test]
    fn record_from_json_keeps_order() -> Result<(), serde_json::Error> {
        let record: Record = serde_json::from_str(r#"{"b": 1, "a": "x", "c": null, "d": 1.5, "e": true}"#)?;
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a", "c", "d", "e"]);
        assert_eq!(record["b"], FieldValue::Integer(1));
        assert_eq!(record["c"], FieldValue::Null);
        assert_eq!(record["d"], FieldValue::Float(1.5));
        assert_eq!(record["e"], FieldValue::Boolean(true));
        Ok(())
    }
}
