//! Hand-written entities shared by the unit tests

use crate::error::Error;
use crate::error::Result;
use crate::metadata::ColumnDef;
use crate::metadata::EntityTrait;
use crate::metadata::FromRow;
use crate::metadata::ReferenceDef;
use crate::value::FromValue;
use crate::value::IntoValue;
use crate::value::LogicalType;
use crate::value::Value;

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Teacher {
    pub id:         Option<i64>,
    pub first_name: Option<String>,
    pub last_name:  String,
    pub active:     bool,
    pub courses:    Vec<i64>,
}

impl FromRow for Teacher {
    fn from_row(row: &turso::Row) -> Result<Self> {
        Ok(Self {
            id:         FromValue::from_value(row.get_value(0)?)?,
            first_name: FromValue::from_value(row.get_value(1)?)?,
            last_name:  FromValue::from_value(row.get_value(2)?)?,
            active:     FromValue::from_value(row.get_value(3)?)?,
            courses:    Default::default(),
        })
    }
}

impl EntityTrait for Teacher {
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::new("id", LogicalType::Integer).primary_key().auto_generated().nullable(),
        ColumnDef::new("first_name", LogicalType::String).length(50).nullable(),
        ColumnDef::new("last_name", LogicalType::String).length(50).named("surname"),
        ColumnDef::new("active", LogicalType::Boolean),
        ColumnDef::new("courses", LogicalType::OneToMany),
    ];
    const TYPE_NAME: &'static str = "Teacher";

    fn primary_key_value(&self) -> Option<Value> {
        self.id.map(IntoValue::into_value)
    }

    fn set_primary_key_value(&mut self, value: Value) -> Result<()> {
        self.id = FromValue::from_value(value)?;
        Ok(())
    }

    fn column_values(&self) -> Vec<(&'static str, Value)> {
        let mut values = Vec::with_capacity(4);
        if let Some(id) = self.id {
            values.push(("id", id.into_value()));
        }
        values.push(("first_name", self.first_name.clone().into_value()));
        values.push(("last_name", self.last_name.clone().into_value()));
        values.push(("active", self.active.into_value()));
        values
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct EmployeeList {
    pub id:         Option<i64>,
    pub teacher:    i64,
    pub start_date: String,
    pub end_date:   Option<String>,
}

impl FromRow for EmployeeList {
    fn from_row(row: &turso::Row) -> Result<Self> {
        Ok(Self {
            id:         FromValue::from_value(row.get_value(0)?)?,
            teacher:    FromValue::from_value(row.get_value(1)?)?,
            start_date: FromValue::from_value(row.get_value(2)?)?,
            end_date:   FromValue::from_value(row.get_value(3)?)?,
        })
    }
}

impl EntityTrait for EmployeeList {
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::new("id", LogicalType::Integer).primary_key().auto_generated().nullable(),
        ColumnDef::new("teacher", LogicalType::ManyToOne).references(ReferenceDef {
            type_name:  <Teacher as EntityTrait>::TYPE_NAME,
            table_name: <Teacher as EntityTrait>::TABLE_NAME,
            column:     "id",
        }),
        ColumnDef::new("start_date", LogicalType::Date),
        ColumnDef::new("end_date", LogicalType::Date).nullable(),
    ];
    const TYPE_NAME: &'static str = "EmployeeList";

    fn primary_key_value(&self) -> Option<Value> {
        self.id.map(IntoValue::into_value)
    }

    fn set_primary_key_value(&mut self, value: Value) -> Result<()> {
        self.id = FromValue::from_value(value)?;
        Ok(())
    }

    fn column_values(&self) -> Vec<(&'static str, Value)> {
        let mut values = Vec::with_capacity(4);
        if let Some(id) = self.id {
            values.push(("id", id.into_value()));
        }
        values.push(("teacher", self.teacher.into_value()));
        values.push(("start_date", self.start_date.clone().into_value()));
        values.push(("end_date", self.end_date.clone().into_value()));
        values
    }
}

/// Keyless audit record
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct AuditLog {
    pub message: String,
}

impl FromRow for AuditLog {
    fn from_row(row: &turso::Row) -> Result<Self> {
        Ok(Self { message: FromValue::from_value(row.get_value(0)?)? })
    }
}

impl EntityTrait for AuditLog {
    const COLUMNS: &'static [ColumnDef] = &[ColumnDef::new("message", LogicalType::Text)];
    const TABLE_NAME: Option<&'static str> = Some("audit_entries");
    const TYPE_NAME: &'static str = "AuditLog";

    fn primary_key_value(&self) -> Option<Value> {
        None
    }

    fn set_primary_key_value(&mut self, _value: Value) -> Result<()> {
        Err(Error::PrimaryKeyNotDeclared(Self::TYPE_NAME.to_string()))
    }

    fn column_values(&self) -> Vec<(&'static str, Value)> {
        vec![("message", self.message.clone().into_value())]
    }
}
