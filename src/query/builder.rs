use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::connection::Connection;
use crate::error::Error;
use crate::error::Result;
use crate::metadata::EntityMetadata;
use crate::metadata::EntityTrait;
use crate::query::condition::Condition;
use crate::query::params::bind_named;
use crate::value::FromValue;
use crate::value::IntoValue;
use crate::value::Value;

/// Fluent SELECT builder for one entity type
///
/// Fragments accumulate in call order. When no projection is set the
/// statement selects every stored column aliased to its property name, which
/// is the layout the entity's `FromRow` decodes.
///
/// ```ignore
/// let teachers: Vec<Teacher> = QueryBuilder::<Teacher>::new(Some("t"))?
///     .select_orm()
///     .and_where("t.last_name = :last_name")
///     .set_parameter("last_name", "Smith")
///     .order_by("t.first_name", "asc")
///     .set_max_results(10)
///     .get_query(&conn)
///     .await?
///     .get_result()
///     .await?;
/// ```
#[derive(Clone, Debug)]
pub struct QueryBuilder<E: EntityTrait> {
    metadata:   Arc<EntityMetadata>,
    alias:      Option<String>,
    projection: Vec<String>,
    joins:      Vec<String>,
    conditions: Vec<String>,
    having:     Vec<String>,
    group_by:   Vec<String>,
    order_by:   Vec<(String, String)>,
    limit:      Option<u64>,
    offset:     Option<u64>,
    params:     BTreeMap<String, Value>,
    _entity:    PhantomData<fn() -> E>,
}

impl<E: EntityTrait> QueryBuilder<E> {
    pub fn new(alias: Option<&str>) -> Result<Self> {
        Ok(Self::with_metadata(Arc::new(EntityMetadata::of::<E>()?), alias))
    }

    pub fn with_metadata(metadata: Arc<EntityMetadata>, alias: Option<&str>) -> Self {
        Self {
            metadata,
            alias: alias.map(str::to_string),
            projection: Vec::new(),
            joins: Vec::new(),
            conditions: Vec::new(),
            having: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            params: BTreeMap::new(),
            _entity: PhantomData,
        }
    }

    pub fn metadata(&self) -> &EntityMetadata {
        &self.metadata
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn select(mut self, fields: impl Into<String>) -> Self {
        self.projection.push(fields.into());
        self
    }

    /// Project every stored column aliased to its property name
    pub fn select_orm(mut self) -> Self {
        let columns = self.metadata.projection(self.alias.as_deref());
        self.projection.push(columns.join(", "));
        self
    }

    pub fn select_distinct(mut self, fields: impl Into<String>) -> Self {
        self.projection.push(format!("DISTINCT {}", fields.into()));
        self
    }

    pub fn join(mut self, table: &str, alias: &str, condition: &str) -> Self {
        self.joins.push(format!("INNER JOIN {} {} ON ({})", table, alias, condition));
        self
    }

    pub fn left_join(mut self, table: &str, alias: &str, condition: &str) -> Self {
        self.joins.push(format!("LEFT JOIN {} {} ON ({})", table, alias, condition));
        self
    }

    pub fn and_where(mut self, condition: impl Into<String>) -> Self {
        push_predicate(&mut self.conditions, "AND", condition.into());
        self
    }

    pub fn or_where(mut self, condition: impl Into<String>) -> Self {
        push_predicate(&mut self.conditions, "OR", condition.into());
        self
    }

    /// Append a built condition together with the parameters it binds
    pub fn and_where_condition(self, condition: Condition) -> Self {
        let (sql, params) = condition.into_parts();
        self.and_where(sql).set_parameters(params)
    }

    pub fn or_where_condition(self, condition: Condition) -> Self {
        let (sql, params) = condition.into_parts();
        self.or_where(sql).set_parameters(params)
    }

    pub fn set_parameter(mut self, name: &str, value: impl IntoValue) -> Self {
        self.params.insert(name.trim_start_matches(':').to_string(), value.into_value());
        self
    }

    fn set_parameters(mut self, params: Vec<(String, Value)>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn set_first_result(mut self, row: u64) -> Self {
        self.offset = Some(row);
        self
    }

    pub fn set_max_results(mut self, amount: u64) -> Self {
        self.limit = Some(amount);
        self
    }

    /// Sort by `field`; ordering the same field again replaces its direction
    pub fn order_by(mut self, field: &str, direction: &str) -> Self {
        let direction = direction.to_uppercase();
        match self.order_by.iter_mut().find(|(f, _)| f == field) {
            Some(entry) => entry.1 = direction,
            None => self.order_by.push((field.to_string(), direction)),
        }
        self
    }

    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group_by.push(field.into());
        self
    }

    pub fn and_having(mut self, condition: impl Into<String>) -> Self {
        push_predicate(&mut self.having, "AND", condition.into());
        self
    }

    pub fn or_having(mut self, condition: impl Into<String>) -> Self {
        push_predicate(&mut self.having, "OR", condition.into());
        self
    }

    /// The assembled statement with its named placeholders
    pub fn to_sql(&self) -> String {
        let mut parts = Vec::new();

        if self.projection.is_empty() {
            parts.push(format!("SELECT {}", self.metadata.projection(self.alias.as_deref()).join(", ")));
        } else {
            parts.push(format!("SELECT {}", self.projection.join(", ")));
        }

        match &self.alias {
            Some(alias) => parts.push(format!("FROM {} {}", self.metadata.table_name(), alias)),
            None => parts.push(format!("FROM {}", self.metadata.table_name())),
        }

        parts.extend(self.joins.iter().cloned());

        if !self.conditions.is_empty() {
            parts.push(format!("WHERE {}", self.conditions.join(" ")));
        }

        if !self.group_by.is_empty() {
            parts.push(format!("GROUP BY {}", self.group_by.join(", ")));
        }

        if !self.having.is_empty() {
            parts.push(format!("HAVING {}", self.having.join(" ")));
        }

        if !self.order_by.is_empty() {
            let order: Vec<String> = self.order_by.iter().map(|(f, d)| format!("{} {}", f, d)).collect();
            parts.push(format!("ORDER BY {}", order.join(", ")));
        }

        // OFFSET is only valid after a LIMIT; -1 lifts the limit
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => parts.push(format!("LIMIT {} OFFSET {}", limit, offset)),
            (Some(limit), None) => parts.push(format!("LIMIT {}", limit)),
            (None, Some(offset)) => parts.push(format!("LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }

        parts.join(" ")
    }

    /// The statement with positional placeholders and its bound values
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        bind_named(&self.to_sql(), &self.params)
    }

    /// Prepare the statement and bind every recorded parameter
    pub async fn get_query(self, conn: &Connection) -> Result<Query<E>> {
        let (sql, params) = self.build()?;
        tracing::debug!("Select SQL: {}", sql);
        tracing::trace!("Params: {:?}", params);

        let statement = conn.prepare(&sql).await?;
        Ok(Query { statement, sql, params, _entity: PhantomData })
    }
}

fn push_predicate(predicates: &mut Vec<String>, connective: &str, condition: String) {
    if predicates.is_empty() {
        predicates.push(condition);
    } else {
        predicates.push(format!("{} {}", connective, condition));
    }
}

/// A prepared statement ready for one terminal call
pub struct Query<E: EntityTrait> {
    statement: turso::Statement,
    sql:       String,
    params:    Vec<Value>,
    _entity:   PhantomData<fn() -> E>,
}

impl<E: EntityTrait> Query<E> {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    async fn rows(mut self) -> Result<turso::Rows> {
        Ok(self.statement.query(self.params).await?)
    }

    /// Every matching row decoded into the entity
    pub async fn get_result(self) -> Result<Vec<E>> {
        let mut rows = self.rows().await?;
        let mut results = Vec::new();

        while let Some(row) = rows.next().await? {
            match E::from_row(&row) {
                Ok(record) => results.push(record),
                Err(e) => {
                    tracing::warn!("Failed to decode {} row {:?}: {}", E::TYPE_NAME, raw_row(&row), e);
                    return Err(e);
                }
            }
        }

        tracing::trace!("Fetched {} {} rows", results.len(), E::TYPE_NAME);
        Ok(results)
    }

    /// The first matching row, if any
    pub async fn get_one_or_null_result(self) -> Result<Option<E>> {
        let mut rows = self.rows().await?;
        let row = rows.next().await?;
        row.map(|r| E::from_row(&r)).transpose()
    }

    /// First column of the only matching row
    ///
    /// `None` when zero rows or more than one row matched.
    pub async fn get_single_scalar_result<T: FromValue>(self) -> Result<Option<T>> {
        let mut rows = self.rows().await?;

        let Some(first) = rows.next().await? else {
            return Ok(None);
        };
        if rows.next().await?.is_some() {
            return Ok(None);
        }

        T::from_value(first.get_value(0)?).map(Some)
    }

    /// Number of matched rows
    pub async fn get_count_result(self) -> Result<u64> {
        let mut rows = self.rows().await?;
        let mut count = 0;
        while rows.next().await?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Matching rows as raw values, for projections that are not the entity
    pub async fn get_rows(self) -> Result<Vec<Vec<Value>>> {
        let mut rows = self.rows().await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(raw_row(&row)?);
        }
        Ok(results)
    }
}

fn raw_row(row: &turso::Row) -> Result<Vec<Value>> {
    (0..row.column_count()).map(|i| row.get_value(i).map_err(Error::from)).collect()
}
