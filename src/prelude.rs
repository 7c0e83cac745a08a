//! Prelude module for rowmap
//!
//! ```ignore
//! use rowmap::prelude::*;
//! ```

pub use rowmap_macros::Entity;

pub use crate::connection::Connection;
pub use crate::connection::prelude::Builder;
pub use crate::error::Error;
pub use crate::error::Result;
pub use crate::manager::EntityManager;
pub use crate::manager::Persisted;
pub use crate::metadata::EntityMetadata;
pub use crate::metadata::EntityTrait;
pub use crate::metadata::FromRow;
pub use crate::metadata::Registry;
pub use crate::query::prelude::*;
pub use crate::repository::Filter;
pub use crate::repository::FindOptions;
pub use crate::repository::Repository;
pub use crate::repository::RepositoryTrait;
pub use crate::schema::SchemaGenerator;
pub use crate::schema::SchemaOptions;
pub use crate::value::FromValue;
pub use crate::value::IntoValue;
#[cfg(feature = "with-json")]
pub use crate::value::Json;
pub use crate::value::LogicalType;
pub use crate::value::Value;
