mod mock;
pub mod query;
mod remote;

pub use mock::MockBackend;
pub use remote::RemoteBackend;

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::query::Query;
use crate::model::user::{Session, UserCredentials};
use crate::repo::{KeyValueRepository, Row, StoreError, TableStore};
use crate::session::SessionManager;
use crate::utils::env_reader::BackendConfig;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Request error: `{0}`")]
    Request(#[from] reqwest::Error),
    #[error("Serialization error: `{0}`")]
    Serialization(#[from] serde_json::Error),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("Insert into `{0}` returned no rows")]
    NothingInserted(String),
}

impl From<sqlx::Error> for BackendError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(StoreError::Database(err))
    }
}

/// What a resolved query carries; operations without a natural payload
/// resolve to [`QueryOutput::Empty`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Rows(Vec<Row>),
    Single(Option<Row>),
    Empty,
}

impl QueryOutput {
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            QueryOutput::Rows(rows) => rows,
            QueryOutput::Single(row) => row.into_iter().collect(),
            QueryOutput::Empty => Vec::new(),
        }
    }
}

/// Data, file storage and authentication service.
pub trait Backend {
    fn sessions(&self) -> &SessionManager;

    async fn execute(&self, query: &Query) -> Result<QueryOutput, BackendError>;

    /// Stores `content` under `path` inside `bucket`, returning the path.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<String, BackendError>;

    async fn public_url(&self, bucket: &str, path: &str) -> Result<String, BackendError>;

    async fn sign_up(&self, credentials: &UserCredentials) -> Result<Session, BackendError>;

    async fn sign_in_with_password(
        &self,
        credentials: &UserCredentials,
    ) -> Result<Session, BackendError>;

    async fn sign_out(&self) -> Result<(), BackendError>;
}

/// The backend picked once at startup.
pub enum AnyBackend {
    Mock(MockBackend),
    Remote(RemoteBackend),
}

impl AnyBackend {
    pub async fn from_config(
        config: &BackendConfig,
        pool: SqlitePool,
        sessions: SessionManager,
    ) -> Result<Self, BackendError> {
        match config {
            BackendConfig::Mock => {
                warn!("Running in mock mode, data is stored in the local database");
                let tables = TableStore::new(KeyValueRepository::new(pool));
                Ok(Self::Mock(MockBackend::new(tables, sessions).await?))
            }
            BackendConfig::Remote { url, anon_key } => {
                info!("Using remote backend at {url}");
                let kv = KeyValueRepository::new(pool);
                Ok(Self::Remote(
                    RemoteBackend::new(url.clone(), anon_key.clone(), kv, sessions).await?,
                ))
            }
        }
    }
}

impl Backend for AnyBackend {
    fn sessions(&self) -> &SessionManager {
        match self {
            AnyBackend::Mock(backend) => backend.sessions(),
            AnyBackend::Remote(backend) => backend.sessions(),
        }
    }

    async fn execute(&self, query: &Query) -> Result<QueryOutput, BackendError> {
        match self {
            AnyBackend::Mock(backend) => backend.execute(query).await,
            AnyBackend::Remote(backend) => backend.execute(query).await,
        }
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<String, BackendError> {
        match self {
            AnyBackend::Mock(backend) => backend.upload(bucket, path, content, content_type).await,
            AnyBackend::Remote(backend) => backend.upload(bucket, path, content, content_type).await,
        }
    }

    async fn public_url(&self, bucket: &str, path: &str) -> Result<String, BackendError> {
        match self {
            AnyBackend::Mock(backend) => backend.public_url(bucket, path).await,
            AnyBackend::Remote(backend) => backend.public_url(bucket, path).await,
        }
    }

    async fn sign_up(&self, credentials: &UserCredentials) -> Result<Session, BackendError> {
        match self {
            AnyBackend::Mock(backend) => backend.sign_up(credentials).await,
            AnyBackend::Remote(backend) => backend.sign_up(credentials).await,
        }
    }

    async fn sign_in_with_password(
        &self,
        credentials: &UserCredentials,
    ) -> Result<Session, BackendError> {
        match self {
            AnyBackend::Mock(backend) => backend.sign_in_with_password(credentials).await,
            AnyBackend::Remote(backend) => backend.sign_in_with_password(credentials).await,
        }
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        match self {
            AnyBackend::Mock(backend) => backend.sign_out().await,
            AnyBackend::Remote(backend) => backend.sign_out().await,
        }
    }
}
