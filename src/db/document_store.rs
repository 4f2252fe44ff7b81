use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Pool, Postgres};
use tracing::debug;

/// Path layout inside the store. Collections are prefixes; a trailing slash
/// keeps `jobs/1` from matching a hypothetical `jobsarchive/` collection.
pub mod paths {
    pub const JOBS_PREFIX: &str = "jobs/";
    pub const USERS_PREFIX: &str = "users/";

    pub fn job(job_id: &str) -> String {
        format!("{JOBS_PREFIX}{job_id}")
    }

    pub fn user(uid: &str) -> String {
        format!("{USERS_PREFIX}{uid}")
    }

    pub fn apply_log_prefix(uid: &str) -> String {
        format!("applyLog/{uid}/")
    }

    pub fn apply_log(uid: &str, job_id: &str) -> String {
        format!("applyLog/{uid}/{job_id}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Keyed document storage. The service treats persistence purely as
/// path -> json; the Postgres implementation below is one possible backend.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Shallow-merge `partial` into the document, creating it if absent.
    async fn update(&self, path: &str, partial: Value) -> Result<(), StoreError>;

    /// Insert only if the path is vacant. Returns whether the insert won;
    /// losing means another writer already holds the path. This is the
    /// atomic check-and-set the apply ledger relies on.
    async fn create(&self, path: &str, value: Value) -> Result<bool, StoreError>;

    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// All documents under a prefix, ordered by path.
    async fn list(&self, prefix: &str) -> Result<Vec<(String, Value)>, StoreError>;
}

/// Document store backed by a single Postgres jsonb table.
pub struct PgDocumentStore {
    pool: Pool<Postgres>,
}

impl PgDocumentStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let value = sqlx::query_scalar::<_, Value>("SELECT value FROM documents WHERE path = $1")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (path, value)
            VALUES ($1, $2)
            ON CONFLICT (path)
            DO UPDATE SET value = EXCLUDED.value, updated_at = now()
            "#,
        )
        .bind(path)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, path: &str, partial: Value) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (path, value)
            VALUES ($1, $2)
            ON CONFLICT (path)
            DO UPDATE SET value = documents.value || EXCLUDED.value, updated_at = now()
            "#,
        )
        .bind(path)
        .bind(partial)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create(&self, path: &str, value: Value) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO documents (path, value)
            VALUES ($1, $2)
            ON CONFLICT (path) DO NOTHING
            "#,
        )
        .bind(path)
        .bind(value)
        .execute(&self.pool)
        .await?;
        let inserted = result.rows_affected() == 1;
        if !inserted {
            debug!("create skipped, path already present: {}", path);
        }
        Ok(inserted)
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE path = $1")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let rows = sqlx::query_as::<_, (String, Value)>(
            r"SELECT path, value FROM documents WHERE path LIKE $1 || '%' ESCAPE '\' ORDER BY path",
        )
        .bind(escape_like(prefix))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// Neutralize LIKE metacharacters so a prefix is matched literally. Paths
/// embed caller-supplied ids, and a uid like `u_1` must not scan `uX1/`.
fn escape_like(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
