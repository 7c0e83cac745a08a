use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] turso::Error),

    /// The entity type could not be resolved to usable metadata.
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// A filter value has a shape no predicate can be built from.
    #[error("Type not supported: {0}")]
    TypeNotSupported(String),

    /// A sort direction other than ascending or descending.
    #[error("Invalid order by direction: {0}")]
    OrderByFormat(String),

    #[error("Type conversion error: expected {expected}, got {actual}")]
    TypeConversion { expected: &'static str, actual: String },

    #[error("Unexpected null value for non-nullable field")]
    UnexpectedNull,

    #[error("Missing value for parameter :{0}")]
    MissingParameter(String),

    #[error("Entity {0} declares no primary key")]
    PrimaryKeyNotDeclared(String),

    #[error("Primary key must be set for this operation")]
    PrimaryKeyNotSet,

    #[error("Query error: {0}")]
    Query(String),

    #[cfg(feature = "with-json")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
