//! Persistence: table lifecycle, insert/update dispatch and transactions

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use crate::connection::Connection;
use crate::error::Error;
use crate::error::Result;
use crate::metadata::EntityMetadata;
use crate::metadata::EntityTrait;
use crate::query::params::bind_named;
use crate::schema::SchemaGenerator;
use crate::schema::SchemaOptions;
use crate::value::Value;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Transaction lifecycle of an [`EntityManager`]
///
/// ```text
/// Idle ──begin──> Active ──flush────> Committed ──begin──> Active ...
///                   │
///                   └──rollback──> RolledBack ──begin──> Active ...
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Active,
    Committed,
    RolledBack,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }
}

/// Outcome of [`EntityManager::persist`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Persisted {
    Inserted { rows: u64 },
    Updated { rows: u64 },
}

impl Persisted {
    pub fn rows_affected(&self) -> u64 {
        match self {
            Persisted::Inserted { rows } | Persisted::Updated { rows } => *rows,
        }
    }
}

/// Writes entities and manages the surrounding transaction
///
/// A transaction is opened on demand before the first write and stays open
/// until [`flush`](Self::flush) commits it or [`rollback`](Self::rollback)
/// aborts it; the next write opens a new one. Every `persist` in between
/// shares the same transaction.
///
/// ```ignore
/// let mut em = EntityManager::new(conn.clone());
/// em.create_table::<Teacher>().await?;
///
/// let mut teacher = Teacher { id: None, first_name: Some("Ada".into()), last_name: "Byron".into() };
/// em.persist(&mut teacher).await?; // INSERT, id written back
/// teacher.last_name = "Lovelace".into();
/// em.persist(&mut teacher).await?; // UPDATE ... WHERE id = :id
/// em.flush().await?;
/// ```
pub struct EntityManager {
    conn:   Connection,
    schema: SchemaGenerator,
    state:  TransactionState,
}

impl EntityManager {
    pub fn new(conn: Connection) -> Self {
        Self::with_options(conn, SchemaOptions::default())
    }

    pub fn with_options(conn: Connection, options: SchemaOptions) -> Self {
        Self { conn, schema: SchemaGenerator::new(options), state: TransactionState::Idle }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.state
    }

    /// Open a transaction unless one is already active
    pub async fn begin(&mut self) -> Result<()> {
        if !self.state.is_active() {
            self.conn.begin().await?;
            self.state = TransactionState::Active;
        }
        Ok(())
    }

    /// Commit the open transaction; a no-op when none is open
    pub async fn flush(&mut self) -> Result<()> {
        if self.state.is_active() {
            self.conn.commit().await?;
            self.state = TransactionState::Committed;
        }
        Ok(())
    }

    /// Abort the open transaction; a no-op when none is open
    pub async fn rollback(&mut self) -> Result<()> {
        if self.state.is_active() {
            self.conn.rollback().await?;
            self.state = TransactionState::RolledBack;
        }
        Ok(())
    }

    pub async fn create_table<E: EntityTrait>(&mut self) -> Result<()> {
        let metadata = EntityMetadata::of::<E>()?;
        self.create_table_for(&metadata).await
    }

    /// Create the table of an entity resolved at runtime, e.g. through a [`crate::Registry`]
    pub async fn create_table_for(&mut self, metadata: &EntityMetadata) -> Result<()> {
        self.schema.create_table(&self.conn, metadata).await
    }

    pub async fn drop_table<E: EntityTrait>(&mut self) -> Result<()> {
        let metadata = EntityMetadata::of::<E>()?;
        self.drop_table_for(&metadata).await
    }

    pub async fn drop_table_for(&mut self, metadata: &EntityMetadata) -> Result<()> {
        self.schema.drop_table(&self.conn, metadata).await
    }

    /// Insert or update `entity` depending on whether its primary key is assigned
    ///
    /// An unassigned key always inserts; when the key is database-generated the
    /// new key is written back into `entity`, so persisting it again updates
    /// the same row. An assigned key always updates the row with that key.
    /// Entities without a primary key are always inserted.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = E::TYPE_NAME))]
    pub async fn persist<E: EntityTrait>(&mut self, entity: &mut E) -> Result<Persisted> {
        let metadata = EntityMetadata::of::<E>()?;
        let values = entity.column_values();
        self.begin().await?;

        match entity.primary_key_value() {
            Some(key) if metadata.primary_key().is_some() => {
                let (sql, params) = update_statement(&metadata, &values, key)?;
                let rows = self.execute(&sql, &params).await?;
                Ok(Persisted::Updated { rows })
            }
            _ => {
                let (sql, params) = insert_statement(&metadata, &values);
                let rows = self.execute(&sql, &params).await?;

                if metadata.primary_key_column().is_some_and(|c| c.auto_generated) {
                    entity.set_primary_key_value(Value::Integer(self.conn.last_insert_rowid()))?;
                }
                Ok(Persisted::Inserted { rows })
            }
        }
    }

    /// Delete the row identified by the entity's primary key
    #[tracing::instrument(level = "debug", skip_all, fields(entity = E::TYPE_NAME))]
    pub async fn remove<E: EntityTrait>(&mut self, entity: &E) -> Result<u64> {
        let metadata = EntityMetadata::of::<E>()?;
        let primary_key = metadata.primary_key().ok_or_else(|| Error::PrimaryKeyNotDeclared(E::TYPE_NAME.to_string()))?;
        let key = entity.primary_key_value().ok_or(Error::PrimaryKeyNotSet)?;
        self.begin().await?;

        let sql = format!("DELETE FROM {} WHERE {}=:{}", metadata.table_name(), primary_key, primary_key);
        let params = BTreeMap::from([(primary_key.to_string(), key)]);
        self.execute(&sql, &params).await
    }

    /// Run `f` in a transaction that commits on `Ok` and rolls back on `Err`
    ///
    /// ```ignore
    /// let teacher = EntityManager::transactional(conn.clone(), move |em| {
    ///     Box::pin(async move {
    ///         em.persist(&mut teacher).await?;
    ///         Ok(teacher)
    ///     })
    /// })
    /// .await?;
    /// ```
    pub async fn transactional<T, F>(conn: Connection, f: F) -> Result<T>
    where F: for<'a> FnOnce(&'a mut EntityManager) -> BoxFuture<'a, Result<T>> {
        let mut em = EntityManager::new(conn);
        em.begin().await?;

        match f(&mut em).await {
            Ok(value) => {
                em.flush().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = em.rollback().await {
                    tracing::warn!("Rollback after failed transaction also failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, sql: &str, params: &BTreeMap<String, Value>) -> Result<u64> {
        let (sql, values) = bind_named(sql, params)?;
        tracing::debug!("Persist SQL: {}", sql);
        tracing::trace!("Params: {:?}", values);
        Ok(self.conn.execute(&sql, values).await?)
    }
}

impl Drop for EntityManager {
    fn drop(&mut self) {
        if self.state.is_active() {
            tracing::warn!("EntityManager dropped with an open transaction; call flush or rollback first");
        }
    }
}

/// Columns written by insert and update, paired with their values
fn writable_values(
    metadata: &EntityMetadata,
    values: &[(&'static str, Value)],
    include_primary_key: bool,
) -> Vec<(String, Value)> {
    metadata
        .stored_columns()
        .filter(|c| c.is_writable() && (include_primary_key || !c.primary_key))
        .filter_map(|c| values.iter().find(|(p, _)| *p == c.property).map(|(_, v)| (c.name.clone(), v.clone())))
        .collect()
}

fn insert_statement(metadata: &EntityMetadata, values: &[(&'static str, Value)]) -> (String, BTreeMap<String, Value>) {
    let columns = writable_values(metadata, values, true);

    if columns.is_empty() {
        return (format!("INSERT INTO {} DEFAULT VALUES", metadata.table_name()), BTreeMap::new());
    }

    let names: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
    let placeholders: Vec<String> = names.iter().map(|name| format!(":{}", name)).collect();
    let sql =
        format!("INSERT INTO {} ({}) VALUES ({})", metadata.table_name(), names.join(", "), placeholders.join(", "));

    (sql, columns.into_iter().collect())
}

fn update_statement(
    metadata: &EntityMetadata,
    values: &[(&'static str, Value)],
    key: Value,
) -> Result<(String, BTreeMap<String, Value>)> {
    let primary_key =
        metadata.primary_key().ok_or_else(|| Error::PrimaryKeyNotDeclared(metadata.type_name().to_string()))?;
    let columns = writable_values(metadata, values, false);

    if columns.is_empty() {
        return Err(Error::Query("No columns to update".to_string()));
    }

    let assignments: Vec<String> = columns.iter().map(|(name, _)| format!("{}=:{}", name, name)).collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {}=:{}",
        metadata.table_name(),
        assignments.join(", "),
        primary_key,
        primary_key
    );

    let mut params: BTreeMap<String, Value> = columns.into_iter().collect();
    params.insert(primary_key.to_string(), key);
    Ok((sql, params))
}
