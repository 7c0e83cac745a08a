//! # rowmap
//!
//! A metadata-driven ORM for [Turso](https://turso.tech).
//!
//! Record types declare their storage with `#[derive(Entity)]`; rowmap
//! derives the table schema, the insert/update/delete statements and typed
//! finders from that declaration.
//!
//! ## Features
//!
//! - Derive macro producing entity metadata and row decoding
//! - `CREATE TABLE` / `DROP TABLE` generation with primary and foreign keys
//! - An entity manager that inserts or updates based on the primary key, inside a lazy transaction
//! - Repositories with filter, pattern and range finders
//! - A SELECT builder with joins, grouping, named parameters and pagination
//! - Optional support for chrono, uuid, and JSON types
//!
//! ## Quick Start
//!
//! ```ignore
//! use rowmap::prelude::*;
//!
//! #[derive(Clone, Debug, Default, Entity)]
//! pub struct Teacher {
//!     #[rowmap(primary_key, auto_generated)]
//!     pub id: Option<i64>,
//!     #[rowmap(length = 50)]
//!     pub first_name: String,
//!     #[rowmap(length = 50)]
//!     pub last_name: String,
//!     pub age: i64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let db = Builder::new_local(":memory:").build().await?;
//!     let conn = db.connect()?;
//!
//!     let mut em = EntityManager::new(conn.clone());
//!     em.create_table::<Teacher>().await?;
//!
//!     let mut teacher = Teacher { first_name: "Ada".into(), last_name: "Byron".into(), age: 36, ..Default::default() };
//!     em.persist(&mut teacher).await?;
//!     em.flush().await?;
//!
//!     let repository = Repository::<Teacher>::new(conn)?;
//!     let adults = repository.find_by_range("age", 18, 65, &FindOptions::new().order_by("last_name", "asc")).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Entity Attributes
//!
//! On the struct:
//!
//! - `table_name = "..."` - Set the table name (default: struct name in snake_case)
//!
//! On fields:
//!
//! - `primary_key` - Mark a field as the primary key
//! - `auto_generated` - The database assigns the key on insert
//! - `column_name = "..."` - Set a custom column name
//! - `column_type = "..."` - Override the inferred logical type (`text`, `date`, `one_to_many`, ...)
//! - `length = N` - Length of sized string columns (default 255)
//! - `nullable` / `unique` - Column constraints; `Option<T>` fields are nullable
//! - `references = "Type"` - Foreign key to another entity, `references_column` defaults to `id`
//! - `skip` - Not mapped; filled with `Default::default()` when loading
//!
//! ## Query Builder
//!
//! ```ignore
//! let (sql, params) = QueryBuilder::<EmployeeList>::new(Some("e"))?
//!     .select("t.last_name, COUNT(*)")
//!     .join("teacher", "t", "t.id = e.teacher")
//!     .and_where("e.start_date >= :since")
//!     .set_parameter("since", "2020-01-01")
//!     .group_by("t.last_name")
//!     .and_having("COUNT(*) > 1")
//!     .build()?;
//! ```

extern crate self as rowmap;

pub mod connection;
pub mod error;
pub mod manager;
pub mod metadata;
pub mod naming;
pub mod prelude;
pub mod query;
pub mod repository;
pub mod schema;
pub mod value;

#[cfg(test)]
mod fixtures;

// Re-export main types at crate root
pub use connection::Connection;
pub use connection::prelude::Builder;
pub use connection::prelude::Database;
pub use error::Error;
pub use error::Result;
pub use manager::EntityManager;
pub use manager::Persisted;
pub use manager::TransactionState;
pub use metadata::ColumnDef;
pub use metadata::ColumnMetadata;
pub use metadata::EntityMetadata;
pub use metadata::EntityTrait;
pub use metadata::ForeignKeyMetadata;
pub use metadata::FromRow;
pub use metadata::ReferenceDef;
pub use metadata::Registry;
pub use query::Condition;
pub use query::ConditionBuilder;
pub use query::FilterValue;
pub use query::Order;
pub use query::Query;
pub use query::QueryBuilder;
pub use repository::Filter;
pub use repository::FindOptions;
pub use repository::Repository;
pub use repository::RepositoryTrait;
pub use rowmap_macros::Entity;
pub use schema::SchemaGenerator;
pub use schema::SchemaOptions;
pub use turso::Row;
pub use turso::Rows;
pub use value::FromValue;
pub use value::IntoValue;
#[cfg(feature = "with-json")]
pub use value::Json;
pub use value::LogicalType;
pub use value::Value;
