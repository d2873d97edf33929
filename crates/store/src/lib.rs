use std::future::Future;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use twolane_auth::AuthError;

mod cars;
mod drives;
mod posts;
pub mod update;
mod users;

pub use update::{
    CAR_FIELDS, Column, ColumnKind, CompiledUpdate, DRIVE_FIELDS, FieldMap, POST_FIELDS,
    USER_FIELDS, UpdateError, compile, compile_known,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const MIGRATE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum StoreError {
    Timeout,
    NotFound(&'static str),
    Conflict(&'static str),
    InvalidCredentials,
    InvalidUpdate(UpdateError),
    Password(AuthError),
    Sqlx(sqlx::Error),
}

impl StoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Timeout => "timeout",
            StoreError::NotFound(_) => "not_found",
            StoreError::Conflict(_) => "conflict",
            StoreError::InvalidCredentials => "invalid_credentials",
            StoreError::InvalidUpdate(_) => "invalid_update",
            StoreError::Password(_) => "password",
            StoreError::Sqlx(_) => "sqlx",
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Timeout => write!(f, "store operation timed out"),
            StoreError::NotFound(what) => write!(f, "{} not found", what),
            StoreError::Conflict(what) => write!(f, "{}", what),
            StoreError::InvalidCredentials => write!(f, "invalid username or password"),
            StoreError::InvalidUpdate(err) => write!(f, "{}", err),
            StoreError::Password(err) => write!(f, "password hashing failed: {}", err),
            StoreError::Sqlx(err) => write!(f, "store sql error: {}", err),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &value
            && db.is_unique_violation()
        {
            return StoreError::Conflict(match db.constraint() {
                Some("users_username_key") => "username already taken",
                Some("drives_title_key") => "a drive with this title already exists",
                Some("drives_route_link_key") => "a drive with this route link already exists",
                Some("users_drives_pkey") => "already joined this drive",
                _ => "duplicate value",
            });
        }
        StoreError::Sqlx(value)
    }
}

impl From<UpdateError> for StoreError {
    fn from(value: UpdateError) -> Self {
        StoreError::InvalidUpdate(value)
    }
}

impl From<AuthError> for StoreError {
    fn from(value: AuthError) -> Self {
        StoreError::Password(value)
    }
}

#[derive(Clone)]
pub struct Store {
    pool: sqlx::PgPool,
    op_timeout: Duration,
}

impl Store {
    pub async fn connect(
        db_url: &str,
        max_connections: u32,
        op_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = tokio::time::timeout(
            CONNECT_TIMEOUT,
            PgPoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(op_timeout)
                .connect(db_url),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        Ok(Self::from_pool(pool, op_timeout))
    }

    pub fn connect_lazy(
        db_url: &str,
        max_connections: u32,
        op_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(op_timeout)
            .connect_lazy(db_url)?;
        Ok(Self::from_pool(pool, op_timeout))
    }

    pub fn from_pool(pool: sqlx::PgPool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }

    pub async fn connect_and_migrate(
        db_url: &str,
        max_connections: u32,
        op_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let store = Self::connect(db_url, max_connections, op_timeout).await?;
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        tokio::time::timeout(MIGRATE_TIMEOUT, migrate(&self.pool))
            .await
            .map_err(|_| StoreError::Timeout)??;
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.timed(sqlx::query("SELECT 1").execute(&self.pool))
            .await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn timed<T, E, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, E>>,
        StoreError: From<E>,
    {
        Ok(tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout)??)
    }
}

pub async fn migrate(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(value: sqlx::migrate::MigrateError) -> Self {
        StoreError::Sqlx(sqlx::Error::Migrate(Box::new(value)))
    }
}

fn encode(err: sqlx::error::BoxDynError) -> StoreError {
    StoreError::Sqlx(sqlx::Error::Encode(err))
}

/// `%`, `_` and `\` match literally after escaping.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
