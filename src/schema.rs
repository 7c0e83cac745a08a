//! DDL generation from entity metadata

use crate::connection::Connection;
use crate::error::Result;
use crate::metadata::ColumnMetadata;
use crate::metadata::EntityMetadata;
use crate::value::LogicalType;
use crate::value::Value;

/// Charset and collation clause used on MySQL servers
pub const MYSQL_TABLE_OPTIONS: &str = "DEFAULT CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci";

/// Options applied to every generated `CREATE TABLE`
///
/// Column definitions are always emitted in SQLite syntax: an
/// auto-generated key becomes `INTEGER PRIMARY KEY AUTOINCREMENT`. Table
/// options only extend the trailing clause.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchemaOptions {
    /// Appended after the closing parenthesis, e.g. a charset/collation clause
    pub table_options: Option<String>,
}

impl SchemaOptions {
    pub fn with_table_options(mut self, options: impl Into<String>) -> Self {
        self.table_options = Some(options.into());
        self
    }

    /// Appends the MySQL charset and collation clause
    ///
    /// Only the table options change; columns keep the SQLite dialect, so
    /// tables with an auto-generated key are not valid MySQL DDL.
    pub fn mysql() -> Self {
        Self::default().with_table_options(MYSQL_TABLE_OPTIONS)
    }
}

/// Generates and runs `CREATE TABLE` / `DROP TABLE` statements
///
/// # Example
///
/// ```ignore
/// let generator = SchemaGenerator::new(SchemaOptions::default());
/// let sql = generator.create_table_sql(&Teacher::metadata()?);
/// // CREATE TABLE IF NOT EXISTS teacher (id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT, ...)
/// ```
#[derive(Clone, Debug, Default)]
pub struct SchemaGenerator {
    options: SchemaOptions,
}

impl SchemaGenerator {
    pub fn new(options: SchemaOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn create_table_sql(&self, metadata: &EntityMetadata) -> String {
        let mut definitions = Vec::new();
        let mut inline_key = false;

        for column in metadata.stored_columns() {
            let Some(sql_type) = sql_type(column) else {
                continue;
            };

            let mut def =
                format!("{} {} {}", column.name, sql_type, if column.nullable && !column.primary_key { "NULL" } else { "NOT NULL" });

            if column.primary_key && column.auto_generated {
                def.push_str(" PRIMARY KEY AUTOINCREMENT");
                inline_key = true;
            } else if column.unique {
                def.push_str(" UNIQUE");
            }

            definitions.push(def);
        }

        if let Some(primary_key) = metadata.primary_key().filter(|_| !inline_key) {
            definitions.push(format!("PRIMARY KEY({})", primary_key));
        }

        for foreign_key in metadata.foreign_keys() {
            definitions.push(format!(
                "FOREIGN KEY ({}) REFERENCES {}({})",
                foreign_key.column, foreign_key.referenced_table, foreign_key.referenced_column
            ));
        }

        let mut sql = format!("CREATE TABLE IF NOT EXISTS {} ({})", metadata.table_name(), definitions.join(", "));
        if let Some(options) = self.options.table_options.as_deref().filter(|o| !o.is_empty()) {
            sql.push(' ');
            sql.push_str(options);
        }
        sql
    }

    pub fn drop_table_sql(&self, metadata: &EntityMetadata) -> String {
        format!("DROP TABLE IF EXISTS {}", metadata.table_name())
    }

    pub async fn create_table(&self, conn: &Connection, metadata: &EntityMetadata) -> Result<()> {
        let sql = self.create_table_sql(metadata);
        tracing::debug!("Create table SQL: {}", sql);
        conn.execute(&sql, ()).await?;
        Ok(())
    }

    pub async fn drop_table(&self, conn: &Connection, metadata: &EntityMetadata) -> Result<()> {
        let sql = self.drop_table_sql(metadata);
        tracing::debug!("Drop table SQL: {}", sql);
        conn.execute(&sql, ()).await?;
        Ok(())
    }

    /// Check whether `table` exists
    pub async fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?";

        let mut rows = conn.query(sql, vec![Value::Text(table.to_string())]).await?;

        if let Some(row) = rows.next().await? {
            match row.get_value(0)? {
                Value::Integer(count) => Ok(count > 0),
                _ => Ok(false),
            }
        } else {
            Ok(false)
        }
    }
}

/// SQL type of a column, `None` for fields that own no column
pub fn sql_type(column: &ColumnMetadata) -> Option<String> {
    let sql = match column.logical_type {
        LogicalType::Integer | LogicalType::ManyToOne => "INTEGER".to_string(),
        LogicalType::Float => "REAL".to_string(),
        LogicalType::String | LogicalType::Json => format!("VARCHAR({})", column.length),
        LogicalType::Text => "TEXT".to_string(),
        LogicalType::MediumText => "MEDIUMTEXT".to_string(),
        LogicalType::LongText => "LONGTEXT".to_string(),
        LogicalType::Boolean => "BOOLEAN".to_string(),
        LogicalType::DateTime => "DATETIME".to_string(),
        LogicalType::Date => "DATE".to_string(),
        LogicalType::OneToMany | LogicalType::ManyToMany => return None,
    };
    Some(sql)
}
