//! Value types and conversions for rowmap

pub use turso::Value;

use crate::error::Error;
use crate::error::Result;

/// Logical column types an entity field can declare
///
/// The logical type decides the SQL type emitted in `CREATE TABLE` and
/// whether the field is stored at all: the `OneToMany` and `ManyToMany`
/// markers describe the inverse side of a relationship and own no column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogicalType {
    /// 64-bit signed integer
    Integer,
    /// 64-bit floating point number
    Float,
    /// Sized character data, `VARCHAR(length)`
    String,
    /// Unsized text
    Text,
    /// Unsized text, medium variant
    MediumText,
    /// Unsized text, long variant
    LongText,
    /// Boolean stored as 0/1
    Boolean,
    /// Date and time of day
    DateTime,
    /// Calendar date
    Date,
    /// JSON document stored as sized text
    Json,
    /// Owning side of a relationship; stores the referenced key
    ManyToOne,
    /// Inverse side of a relationship; no column
    OneToMany,
    /// Join-table relationship; no column
    ManyToMany,
}

impl LogicalType {
    /// Whether values of this type occupy a column in the entity's table
    pub fn has_column(&self) -> bool {
        !matches!(self, LogicalType::OneToMany | LogicalType::ManyToMany)
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self, LogicalType::ManyToOne | LogicalType::OneToMany | LogicalType::ManyToMany)
    }
}

/// Trait for converting Rust types into database values
///
/// Implemented for the common scalar types so they can be passed as query
/// parameters and written by the entity manager.
///
/// # Example
///
/// ```ignore
/// use rowmap::IntoValue;
///
/// let value: Value = 42i64.into_value();
/// let text: Value = "hello".into_value();
/// ```
pub trait IntoValue {
    /// Convert this value into a database [`Value`]
    fn into_value(self) -> Value;
}

/// Trait for converting database values into Rust types
///
/// Used by the generated `FromRow` implementations to decode each projected
/// column into its field.
pub trait FromValue: Sized {
    /// Convert a database [`Value`] into this type
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be converted to this type,
    /// or if the value is null and this type is not nullable.
    fn from_value(value: Value) -> Result<Self>;
}

macro_rules! integer_values {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::Integer(self as i64)
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self> {
                    let wide = i64::from_value(value)?;
                    <$ty>::try_from(wide).map_err(|_| Error::TypeConversion {
                        expected: stringify!($ty),
                        actual:   wide.to_string(),
                    })
                }
            }
        )*
    };
}

integer_values!(i32, i16, i8, u32, u16, u8);

impl IntoValue for i64 {
    fn into_value(self) -> Value {
        Value::Integer(self)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Integer(v) => Ok(v),
            Value::Real(v) => Ok(v as i64),
            Value::Null => Err(Error::UnexpectedNull),
            other => Err(Error::TypeConversion { expected: "Integer", actual: format!("{:?}", other) }),
        }
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Real(self)
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Real(self as f64)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Real(v) => Ok(v),
            Value::Integer(v) => Ok(v as f64),
            Value::Null => Err(Error::UnexpectedNull),
            other => Err(Error::TypeConversion { expected: "Real", actual: format!("{:?}", other) }),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoValue for &String {
    fn into_value(self) -> Value {
        Value::Text(self.clone())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v),
            Value::Integer(v) => Ok(v.to_string()),
            Value::Real(v) => Ok(v.to_string()),
            Value::Null => Err(Error::UnexpectedNull),
            other => Err(Error::TypeConversion { expected: "Text", actual: format!("{:?}", other) }),
        }
    }
}

impl IntoValue for Vec<u8> {
    fn into_value(self) -> Value {
        Value::Blob(self)
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(v) => Ok(v),
            Value::Null => Err(Error::UnexpectedNull),
            other => Err(Error::TypeConversion { expected: "Blob", actual: format!("{:?}", other) }),
        }
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Integer(i64::from(self))
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Integer(v) => Ok(v != 0),
            Value::Null => Err(Error::UnexpectedNull),
            other => Err(Error::TypeConversion { expected: "Integer (boolean)", actual: format!("{:?}", other) }),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Null, IntoValue::into_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

#[cfg(feature = "with-chrono")]
mod chrono_impl {
    use chrono::DateTime;
    use chrono::NaiveDate;
    use chrono::NaiveDateTime;
    use chrono::NaiveTime;
    use chrono::Utc;

    use super::*;

    const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
    const DATE_FORMAT: &str = "%Y-%m-%d";
    const TIME_FORMAT: &str = "%H:%M:%S";

    fn text(value: Value, expected: &'static str) -> Result<String> {
        match value {
            Value::Text(s) => Ok(s),
            Value::Null => Err(Error::UnexpectedNull),
            other => Err(Error::TypeConversion { expected, actual: format!("{:?}", other) }),
        }
    }

    impl IntoValue for NaiveDateTime {
        fn into_value(self) -> Value {
            Value::Text(self.format(DATETIME_FORMAT).to_string())
        }
    }

    impl FromValue for NaiveDateTime {
        fn from_value(value: Value) -> Result<Self> {
            let s = text(value, "Text (datetime)")?;
            NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f"))
                .map_err(|_| Error::TypeConversion { expected: "NaiveDateTime", actual: s })
        }
    }

    impl IntoValue for DateTime<Utc> {
        fn into_value(self) -> Value {
            self.naive_utc().into_value()
        }
    }

    impl FromValue for DateTime<Utc> {
        fn from_value(value: Value) -> Result<Self> {
            NaiveDateTime::from_value(value).map(|ndt| DateTime::from_naive_utc_and_offset(ndt, Utc))
        }
    }

    impl IntoValue for NaiveDate {
        fn into_value(self) -> Value {
            Value::Text(self.format(DATE_FORMAT).to_string())
        }
    }

    impl FromValue for NaiveDate {
        fn from_value(value: Value) -> Result<Self> {
            let s = text(value, "Text (date)")?;
            NaiveDate::parse_from_str(&s, DATE_FORMAT)
                .map_err(|_| Error::TypeConversion { expected: "NaiveDate", actual: s })
        }
    }

    impl IntoValue for NaiveTime {
        fn into_value(self) -> Value {
            Value::Text(self.format(TIME_FORMAT).to_string())
        }
    }

    impl FromValue for NaiveTime {
        fn from_value(value: Value) -> Result<Self> {
            let s = text(value, "Text (time)")?;
            NaiveTime::parse_from_str(&s, TIME_FORMAT)
                .map_err(|_| Error::TypeConversion { expected: "NaiveTime", actual: s })
        }
    }
}

#[cfg(feature = "with-uuid")]
mod uuid_impl {
    use uuid::Uuid;

    use super::*;

    impl IntoValue for Uuid {
        fn into_value(self) -> Value {
            Value::Text(self.to_string())
        }
    }

    impl FromValue for Uuid {
        fn from_value(value: Value) -> Result<Self> {
            match value {
                Value::Text(s) => {
                    Uuid::parse_str(&s).map_err(|_| Error::TypeConversion { expected: "UUID", actual: s })
                }
                Value::Blob(b) => Uuid::from_slice(&b)
                    .map_err(|_| Error::TypeConversion { expected: "UUID", actual: format!("{:?}", b) }),
                Value::Null => Err(Error::UnexpectedNull),
                other => Err(Error::TypeConversion { expected: "Text or Blob (UUID)", actual: format!("{:?}", other) }),
            }
        }
    }
}

#[cfg(feature = "with-json")]
pub use json_impl::Json;

#[cfg(feature = "with-json")]
mod json_impl {
    use serde::Serialize;
    use serde::de::DeserializeOwned;
    use serde_json::Value as JsonValue;

    use super::*;

    /// Wrapper for fields persisted as a JSON document
    #[derive(Clone, Debug, Default, PartialEq)]
    pub struct Json<T>(pub T);

    impl<T: Serialize> IntoValue for Json<T> {
        fn into_value(self) -> Value {
            serde_json::to_string(&self.0).map_or(Value::Null, Value::Text)
        }
    }

    impl<T: DeserializeOwned> FromValue for Json<T> {
        fn from_value(value: Value) -> Result<Self> {
            match value {
                Value::Text(s) => Ok(Json(serde_json::from_str(&s)?)),
                Value::Null => Err(Error::UnexpectedNull),
                other => Err(Error::TypeConversion { expected: "Text (JSON)", actual: format!("{:?}", other) }),
            }
        }
    }

    impl IntoValue for JsonValue {
        fn into_value(self) -> Value {
            Value::Text(self.to_string())
        }
    }

    impl FromValue for JsonValue {
        fn from_value(value: Value) -> Result<Self> {
            match value {
                Value::Text(s) => Ok(serde_json::from_str(&s)?),
                Value::Null => Ok(JsonValue::Null),
                other => Err(Error::TypeConversion { expected: "Text (JSON)", actual: format!("{:?}", other) }),
            }
        }
    }
}
