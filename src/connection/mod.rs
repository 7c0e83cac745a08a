//! Database handle wrapping a turso connection

pub(crate) mod builder;
pub(crate) mod database;
pub(crate) mod opts;

pub mod prelude {
    pub use super::Connection;
    pub use super::builder::Builder;
    pub use super::database::Database;
}

pub(self) type ConnectionResult<T> = std::result::Result<T, turso::Error>;

/// A connection shared by the entity manager, repositories and query builders
///
/// Transactions are driven with plain `BEGIN`/`COMMIT`/`ROLLBACK` statements;
/// the [`crate::EntityManager`] tracks whether one is open.
#[derive(Debug, Clone)]
pub struct Connection {
    inner: turso::Connection,
    opts:  opts::DatabaseOpts,
}

impl Connection {
    fn new(inner: turso::Connection, opts: opts::DatabaseOpts) -> Self {
        Self { inner, opts }
    }

    pub fn is_mvcc_enabled(&self) -> bool {
        self.opts.enable_mvcc
    }

    pub fn path(&self) -> &str {
        self.opts.path.as_str()
    }

    pub async fn query(&self, sql: &str, params: impl turso::IntoParams) -> turso::Result<turso::Rows> {
        self.inner.query(sql, params).await
    }

    pub async fn execute(&self, sql: &str, params: impl turso::IntoParams) -> turso::Result<u64> {
        self.inner.execute(sql, params).await
    }

    pub async fn prepare(&self, sql: &str) -> turso::Result<turso::Statement> {
        self.inner.prepare(sql).await
    }

    pub async fn begin(&self) -> turso::Result<()> {
        tracing::debug!("BEGIN");
        self.inner.execute("BEGIN", ()).await.map(|_| ())
    }

    pub async fn commit(&self) -> turso::Result<()> {
        tracing::debug!("COMMIT");
        self.inner.execute("COMMIT", ()).await.map(|_| ())
    }

    pub async fn rollback(&self) -> turso::Result<()> {
        tracing::debug!("ROLLBACK");
        self.inner.execute("ROLLBACK", ()).await.map(|_| ())
    }

    pub fn last_insert_rowid(&self) -> i64 {
        self.inner.last_insert_rowid()
    }

    pub fn is_autocommit(&self) -> turso::Result<bool> {
        self.inner.is_autocommit()
    }
}
