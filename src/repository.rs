//! Generic finders over one entity type

use std::marker::PhantomData;
use std::sync::Arc;

use crate::connection::Connection;
use crate::error::Error;
use crate::error::Result;
use crate::metadata::EntityMetadata;
use crate::metadata::EntityTrait;
use crate::metadata::Registry;
use crate::query::ConditionBuilder;
use crate::query::FilterValue;
use crate::query::Order;
use crate::query::QueryBuilder;
use crate::value::IntoValue;
use crate::value::LogicalType;
use crate::value::Value;

/// Field → value pairs compiled into an AND-ed predicate list
///
/// Keys are property names (or column names); each value's shape picks the
/// predicate, see [`ConditionBuilder::make_condition`]. Setting the same
/// field twice replaces the earlier value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    entries: Vec<(String, FilterValue)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new().and(field, value)
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries.iter().map(|(f, v)| (f.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<FilterValue>> FromIterator<(K, V)> for Filter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter().fold(Filter::new(), |filter, (field, value)| filter.and(field, value))
    }
}

/// Ordering and pagination for the multi-row finders
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// `(field, direction)` pairs; directions are checked before any query runs
    pub order_by: Vec<(String, String)>,
    pub limit:    Option<u64>,
    pub offset:   Option<u64>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: impl Into<String>) -> Self {
        self.order_by.push((field.into(), direction.into()));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Finder surface shared by [`Repository`] and custom repositories wrapping it
#[async_trait::async_trait(?Send)]
pub trait RepositoryTrait<E: EntityTrait> {
    async fn find(&self, id: Value) -> Result<Option<E>>;

    async fn find_one_by(&self, filter: &Filter) -> Result<Option<E>>;

    async fn find_by(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<E>>;

    async fn find_all(&self, options: &FindOptions) -> Result<Vec<E>>;
}

/// Finders for `E` backed by the query builder
///
/// ```ignore
/// let repository = Repository::<Teacher>::new(conn.clone())?;
///
/// let smiths = repository
///     .find_by(&Filter::by("last_name", "Smith"), &FindOptions::new().order_by("first_name", "asc"))
///     .await?;
/// let adults = repository.find_by_range("age", 18, 30, &FindOptions::new()).await?;
/// ```
#[derive(Clone, Debug)]
pub struct Repository<E: EntityTrait> {
    conn:     Connection,
    metadata: Arc<EntityMetadata>,
    _entity:  PhantomData<fn() -> E>,
}

impl<E: EntityTrait> Repository<E> {
    /// # Errors
    ///
    /// [`Error::EntityNotFound`] when `E` yields no usable metadata.
    pub fn new(conn: Connection) -> Result<Self> {
        Ok(Self::with_metadata(conn, Arc::new(EntityMetadata::of::<E>()?)))
    }

    /// Build the repository from metadata cached in `registry`
    pub fn from_registry(conn: Connection, registry: &mut Registry) -> Result<Self> {
        Ok(Self::with_metadata(conn, registry.register::<E>()?))
    }

    fn with_metadata(conn: Connection, metadata: Arc<EntityMetadata>) -> Self {
        Self { conn, metadata, _entity: PhantomData }
    }

    pub fn metadata(&self) -> &EntityMetadata {
        &self.metadata
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// A query builder over this entity's table
    pub fn query_builder(&self, alias: Option<&str>) -> QueryBuilder<E> {
        QueryBuilder::with_metadata(Arc::clone(&self.metadata), alias)
    }

    /// Resolve fields to columns and check every direction
    ///
    /// # Errors
    ///
    /// [`Error::OrderByFormat`] for any direction other than `asc`/`desc`
    /// (case-insensitive), [`Error::Query`] for a field that names no stored
    /// column.
    pub fn validate_order_by(&self, order_by: &[(String, String)]) -> Result<Vec<(String, Order)>> {
        order_by
            .iter()
            .map(|(field, direction)| {
                let order = direction.parse::<Order>()?;
                Ok((self.metadata.column_name(field)?.to_string(), order))
            })
            .collect()
    }

    #[tracing::instrument(level = "debug", skip_all, fields(entity = E::TYPE_NAME))]
    pub async fn find(&self, id: impl IntoValue) -> Result<Option<E>> {
        let primary_key =
            self.metadata.primary_key().ok_or_else(|| Error::PrimaryKeyNotDeclared(E::TYPE_NAME.to_string()))?;

        self.query_builder(None)
            .select_orm()
            .and_where(format!("{} = :{}", primary_key, primary_key))
            .set_parameter(primary_key, id)
            .get_query(&self.conn)
            .await?
            .get_one_or_null_result()
            .await
    }

    #[tracing::instrument(level = "debug", skip_all, fields(entity = E::TYPE_NAME))]
    pub async fn find_one_by(&self, filter: &Filter) -> Result<Option<E>> {
        self.filtered(self.query_builder(None).select_orm(), filter)?
            .set_max_results(1)
            .get_query(&self.conn)
            .await?
            .get_one_or_null_result()
            .await
    }

    #[tracing::instrument(level = "debug", skip_all, fields(entity = E::TYPE_NAME))]
    pub async fn find_by(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<E>> {
        let order_by = self.validate_order_by(&options.order_by)?;
        let builder = self.filtered(self.query_builder(None).select_orm(), filter)?;
        self.paginate(builder, order_by, options).get_query(&self.conn).await?.get_result().await
    }

    #[tracing::instrument(level = "debug", skip_all, fields(entity = E::TYPE_NAME))]
    pub async fn find_all(&self, options: &FindOptions) -> Result<Vec<E>> {
        self.find_by(&Filter::new(), options).await
    }

    /// First record whose fields contain every given term
    #[tracing::instrument(level = "debug", skip_all, fields(entity = E::TYPE_NAME))]
    pub async fn find_one_by_like<I, K, T>(&self, terms: I) -> Result<Option<E>>
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
        T: AsRef<str>, {
        self.like(terms)?.set_max_results(1).get_query(&self.conn).await?.get_one_or_null_result().await
    }

    /// Records whose fields contain every given term, wildcards in a term included literally
    #[tracing::instrument(level = "debug", skip_all, fields(entity = E::TYPE_NAME))]
    pub async fn find_by_like<I, K, T>(&self, terms: I, options: &FindOptions) -> Result<Vec<E>>
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
        T: AsRef<str>, {
        let order_by = self.validate_order_by(&options.order_by)?;
        let builder = self.like(terms)?;
        self.paginate(builder, order_by, options).get_query(&self.conn).await?.get_result().await
    }

    /// First record with `field` between `start` and `end`, both included
    #[tracing::instrument(level = "debug", skip_all, fields(entity = E::TYPE_NAME))]
    pub async fn find_one_by_range(
        &self,
        field: &str,
        start: impl IntoValue,
        end: impl IntoValue,
    ) -> Result<Option<E>> {
        self.range(field, start, end)?.set_max_results(1).get_query(&self.conn).await?.get_one_or_null_result().await
    }

    /// Records with `field` between `start` and `end`, both included
    #[tracing::instrument(level = "debug", skip_all, fields(entity = E::TYPE_NAME))]
    pub async fn find_by_range(
        &self,
        field: &str,
        start: impl IntoValue,
        end: impl IntoValue,
        options: &FindOptions,
    ) -> Result<Vec<E>> {
        let order_by = self.validate_order_by(&options.order_by)?;
        let builder = self.range(field, start, end)?;
        self.paginate(builder, order_by, options).get_query(&self.conn).await?.get_result().await
    }

    /// Number of records matching `filter`
    #[tracing::instrument(level = "debug", skip_all, fields(entity = E::TYPE_NAME))]
    pub async fn count_by(&self, filter: &Filter) -> Result<u64> {
        let count: Option<i64> = self
            .filtered(self.query_builder(None).select("COUNT(*)"), filter)?
            .get_query(&self.conn)
            .await?
            .get_single_scalar_result()
            .await?;
        Ok(count.map_or(0, |c| c.max(0) as u64))
    }

    /// Load the record a many-to-one field of `record` points to
    ///
    /// `Ok(None)` when the field holds no reference or the referenced row is
    /// gone.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = E::TYPE_NAME))]
    pub async fn find_reference<R: EntityTrait>(&self, record: &E, property: &str) -> Result<Option<R>> {
        let column = self
            .metadata
            .column(property)
            .filter(|c| c.logical_type == LogicalType::ManyToOne)
            .ok_or_else(|| Error::Query(format!("{} has no many-to-one field {}", E::TYPE_NAME, property)))?;
        let foreign_key = self
            .metadata
            .foreign_keys()
            .iter()
            .find(|fk| fk.column == column.name)
            .ok_or_else(|| Error::Query(format!("{}.{} declares no reference", E::TYPE_NAME, property)))?;

        let target = Repository::<R>::new(self.conn.clone())?;
        if target.metadata().table_name() != foreign_key.referenced_table {
            return Err(Error::Query(format!(
                "{}.{} references {}, not {}",
                E::TYPE_NAME,
                property,
                foreign_key.referenced_table,
                target.metadata().table_name()
            )));
        }

        let value = record
            .column_values()
            .into_iter()
            .find(|(p, _)| *p == column.property)
            .map(|(_, v)| v)
            .unwrap_or(Value::Null);
        if matches!(value, Value::Null) {
            return Ok(None);
        }

        target.find_one_by(&Filter::by(foreign_key.referenced_column.as_str(), value)).await
    }

    fn filtered(&self, mut builder: QueryBuilder<E>, filter: &Filter) -> Result<QueryBuilder<E>> {
        let mut conditions = ConditionBuilder::new();

        for (field, value) in filter.iter() {
            let column = self.metadata.column_name(field)?;
            builder = builder.and_where_condition(conditions.make_condition(column, value.clone())?);
        }

        Ok(builder)
    }

    fn like<I, K, T>(&self, terms: I) -> Result<QueryBuilder<E>>
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
        T: AsRef<str>, {
        let mut conditions = ConditionBuilder::new();
        let mut builder = self.query_builder(None).select_orm();

        for (field, term) in terms {
            let column = self.metadata.column_name(field.as_ref())?;
            builder = builder.and_where_condition(conditions.like(column, term.as_ref()));
        }

        Ok(builder)
    }

    fn range(&self, field: &str, start: impl IntoValue, end: impl IntoValue) -> Result<QueryBuilder<E>> {
        let column = self.metadata.column_name(field)?;
        let condition = ConditionBuilder::new().between(column, start, end);
        Ok(self.query_builder(None).select_orm().and_where_condition(condition))
    }

    fn paginate(
        &self,
        builder: QueryBuilder<E>,
        order_by: Vec<(String, Order)>,
        options: &FindOptions,
    ) -> QueryBuilder<E> {
        let mut builder = order_by
            .into_iter()
            .fold(builder, |builder, (column, order)| builder.order_by(&column, &order.to_string()));

        if let Some(limit) = options.limit {
            builder = builder.set_max_results(limit);
        }
        if let Some(offset) = options.offset {
            builder = builder.set_first_result(offset);
        }
        builder
    }
}

#[async_trait::async_trait(?Send)]
impl<E: EntityTrait> RepositoryTrait<E> for Repository<E> {
    async fn find(&self, id: Value) -> Result<Option<E>> {
        Repository::find(self, id).await
    }

    async fn find_one_by(&self, filter: &Filter) -> Result<Option<E>> {
        Repository::find_one_by(self, filter).await
    }

    async fn find_by(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<E>> {
        Repository::find_by(self, filter, options).await
    }

    async fn find_all(&self, options: &FindOptions) -> Result<Vec<E>> {
        Repository::find_all(self, options).await
    }
}
