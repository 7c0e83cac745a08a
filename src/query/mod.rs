//! Query construction: predicates, parameter binding and the SELECT builder

pub(crate) mod builder;
pub(crate) mod condition;
pub mod params;

pub use builder::Query;
pub use builder::QueryBuilder;
pub use condition::Condition;
pub use condition::ConditionBuilder;
pub use condition::FilterValue;
pub use condition::Order;

pub mod prelude {
    pub use super::builder::Query;
    pub use super::builder::QueryBuilder;
    pub use super::condition::Condition;
    pub use super::condition::ConditionBuilder;
    pub use super::condition::FilterValue;
    pub use super::condition::Order;
}
