/// Opens a local database
///
/// ```ignore
/// let db = Builder::new_local(":memory:").build().await?;
/// let conn = db.connect()?;
/// ```
pub struct Builder {
    pub(super) path:        String,
    pub(super) enable_mvcc: bool,
}

impl Builder {
    pub fn new_local(path: &str) -> Self {
        Self { path: path.to_string(), enable_mvcc: false }
    }

    pub fn with_mvcc(mut self, mvcc: bool) -> Self {
        self.enable_mvcc = mvcc;
        self
    }

    pub async fn build(self) -> super::ConnectionResult<super::database::Database> {
        let opts = super::opts::DatabaseOpts::from(&self);

        let db = turso::Builder::new_local(&self.path).with_mvcc(self.enable_mvcc).build().await?;
        tracing::debug!(path = %opts.path, mvcc = opts.enable_mvcc, "opened database");

        Ok(super::database::Database::new(db, opts))
    }
}
