use std::collections::HashSet;
use std::str::FromStr;

use crate::error::Error;
use crate::error::Result;
use crate::value::IntoValue;
use crate::value::Value;

/// Shape of a filter value; decides which predicate is generated
#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Scalar(Value),
    List(Vec<Value>),
}

macro_rules! scalar_filters {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for FilterValue {
                fn from(value: $ty) -> Self {
                    FilterValue::Scalar(value.into_value())
                }
            }
        )*
    };
}

scalar_filters!(i64, i32, i16, i8, u32, u16, u8, f64, f32, String, &str, &String);

#[cfg(feature = "with-chrono")]
scalar_filters!(chrono::NaiveDate, chrono::NaiveDateTime);

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<Value> for FilterValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FilterValue::Null,
            other => FilterValue::Scalar(other),
        }
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FilterValue::Null, Into::into)
    }
}

impl<T: IntoValue> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        FilterValue::List(values.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: IntoValue, const N: usize> From<[T; N]> for FilterValue {
    fn from(values: [T; N]) -> Self {
        FilterValue::List(values.into_iter().map(IntoValue::into_value).collect())
    }
}

/// A predicate fragment and the named parameters it binds
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub(crate) sql:    String,
    pub(crate) params: Vec<(String, Value)>,
}

impl Condition {
    /// A predicate with hand-written SQL
    pub fn raw(sql: impl Into<String>, params: Vec<(String, Value)>) -> Self {
        Self { sql: sql.into(), params }
    }

    pub fn and(self, other: Condition) -> Self {
        let mut params = self.params;
        params.extend(other.params);
        Self { sql: format!("({}) AND ({})", self.sql, other.sql), params }
    }

    pub fn or(self, other: Condition) -> Self {
        let mut params = self.params;
        params.extend(other.params);
        Self { sql: format!("({}) OR ({})", self.sql, other.sql), params }
    }

    pub fn not(self) -> Self {
        Self { sql: format!("NOT ({})", self.sql), params: self.params }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[(String, Value)] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<(String, Value)>) {
        (self.sql, self.params)
    }
}

/// Turns `(column, value)` pairs into predicates with unique parameter names
///
/// A builder tracks every name it hands out, so all conditions built by the
/// same instance can be bound into one statement without collisions. The
/// first use of a column binds `:column`; later uses and IN-list elements get
/// the column name plus a running counter.
#[derive(Clone, Debug, Default)]
pub struct ConditionBuilder {
    names:   HashSet<String>,
    counter: usize,
}

impl ConditionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the predicate for one filter entry
    ///
    /// | value             | predicate                       |
    /// |-------------------|---------------------------------|
    /// | `Null`            | `column IS NULL`                |
    /// | `Bool`            | `column IS TRUE` / `IS FALSE`   |
    /// | `List`            | `column IN (:column_1, ...)`    |
    /// | `Scalar`          | `column = :column`              |
    ///
    /// # Errors
    ///
    /// [`Error::TypeNotSupported`] for blob scalars, empty lists and lists
    /// holding null or blob elements.
    pub fn make_condition(&mut self, column: &str, value: impl Into<FilterValue>) -> Result<Condition> {
        match value.into() {
            FilterValue::Null => Ok(Condition::raw(format!("{} IS NULL", column), Vec::new())),
            FilterValue::Bool(true) => Ok(Condition::raw(format!("{} IS TRUE", column), Vec::new())),
            FilterValue::Bool(false) => Ok(Condition::raw(format!("{} IS FALSE", column), Vec::new())),
            FilterValue::Scalar(value) => {
                check_scalar(column, &value)?;
                let name = self.parameter_name(column);
                Ok(Condition::raw(format!("{} = :{}", column, name), vec![(name, value)]))
            }
            FilterValue::List(values) => {
                if values.is_empty() {
                    return Err(Error::TypeNotSupported(format!("empty list for column {}", column)));
                }

                let mut placeholders = Vec::with_capacity(values.len());
                let mut params = Vec::with_capacity(values.len());
                for value in values {
                    if matches!(value, Value::Null) {
                        return Err(Error::TypeNotSupported(format!("null list element for column {}", column)));
                    }
                    check_scalar(column, &value)?;

                    let name = self.element_name(column);
                    placeholders.push(format!(":{}", name));
                    params.push((name, value));
                }

                Ok(Condition::raw(format!("{} IN ({})", column, placeholders.join(", ")), params))
            }
        }
    }

    /// `column LIKE :column` matching `term` anywhere in the value
    ///
    /// Wildcards in `term` match literally.
    pub fn like(&mut self, column: &str, term: &str) -> Condition {
        let name = self.parameter_name(column);
        let pattern = format!("%{}%", escape_like(term));
        Condition::raw(format!("{} LIKE :{} ESCAPE '\\'", column, name), vec![(name, Value::Text(pattern))])
    }

    /// `column BETWEEN :column_start AND :column_end`, bounds included
    pub fn between(&mut self, column: &str, start: impl IntoValue, end: impl IntoValue) -> Condition {
        let start_name = self.parameter_name(&format!("{}_start", column));
        let end_name = self.parameter_name(&format!("{}_end", column));
        Condition::raw(format!("{} BETWEEN :{} AND :{}", column, start_name, end_name), vec![
            (start_name, start.into_value()),
            (end_name, end.into_value()),
        ])
    }

    /// Mark a name as taken, e.g. one bound by hand through `set_parameter`
    pub fn reserve(&mut self, name: &str) {
        self.names.insert(name.to_string());
    }

    fn parameter_name(&mut self, column: &str) -> String {
        let base = sanitize(column);
        if self.names.insert(base.clone()) {
            return base;
        }
        self.element_name(column)
    }

    fn element_name(&mut self, column: &str) -> String {
        let base = sanitize(column);
        loop {
            self.counter += 1;
            let candidate = format!("{}_{}", base, self.counter);
            if self.names.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

fn check_scalar(column: &str, value: &Value) -> Result<()> {
    match value {
        Value::Blob(_) => Err(Error::TypeNotSupported(format!("blob value for column {}", column))),
        _ => Ok(()),
    }
}

/// Parameter names may only hold `[A-Za-z0-9_]`; a qualified `t.col` binds as `t_col`
fn sanitize(column: &str) -> String {
    column.chars().map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }).collect()
}

/// Sort direction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    Asc,

    Desc,
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Order::Asc => write!(f, "ASC"),
            Order::Desc => write!(f, "DESC"),
        }
    }
}

impl FromStr for Order {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(Order::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(Order::Desc)
        } else {
            Err(Error::OrderByFormat(s.to_string()))
        }
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
