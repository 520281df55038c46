use std::cmp::Ordering;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::query::{Filter, Operation, Query, parse_columns};
use crate::backend::{Backend, BackendError, QueryOutput};
use crate::model::user::{Session, User, UserCredentials};
use crate::repo::{Row, TableStore};
use crate::session::SessionManager;
use crate::utils::format_timestamp;

const SESSION_KEY: &str = "mock:currentUser";

/// Simulates the remote service over the local table store. Row-level security
/// is emulated by scoping every operation to the signed-in user.
pub struct MockBackend {
    tables: TableStore,
    sessions: SessionManager,
}

impl MockBackend {
    /// Restores the persisted session, if any, into `sessions`.
    pub async fn new(tables: TableStore, sessions: SessionManager) -> Result<Self, BackendError> {
        let saved_user = match tables.kv().get_item(SESSION_KEY).await? {
            Some(raw) => serde_json::from_str::<User>(&raw)
                .inspect_err(|e| warn!("Ignoring unreadable saved session: {e}"))
                .ok(),
            None => None,
        };

        if let Some(user) = &saved_user {
            debug!("Restored session for `{}`", user.email);
        }
        sessions.restore(saved_user.map(|user| Session {
            user,
            access_token: None,
        }));

        Ok(Self { tables, sessions })
    }

    fn storage_key(bucket: &str, path: &str) -> String {
        format!("storage:{bucket}:{path}")
    }

    /// No credential check in simulation: every sign-up or sign-in mints a
    /// fresh user.
    async fn start_session(&self, email: &str) -> Result<Session, BackendError> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.trim().to_string(),
            created_at: OffsetDateTime::now_utc(),
        };

        self.tables
            .kv()
            .set_item(SESSION_KEY, &serde_json::to_string(&user)?)
            .await?;

        let session = Session {
            user,
            access_token: None,
        };
        self.sessions.sign_in(session.clone());

        Ok(session)
    }

    async fn select(
        &self,
        query: &Query,
        columns: &str,
        owner: Option<&str>,
    ) -> Result<QueryOutput, BackendError> {
        let mut rows: Vec<Row> = self
            .tables
            .load_rows(query.table())
            .await?
            .into_iter()
            .filter(|row| owner.is_none_or(|owner| row_owner(row) == Some(owner)))
            .filter(|row| matches_filters(row, query.filters()))
            .collect();

        if let Some(order) = query.order_by() {
            // `sort_by` is stable, so ties keep their stored order
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        if let Some(columns) = parse_columns(columns) {
            rows = rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .filter(|(key, _)| columns.contains(&key.as_str()))
                        .collect()
                })
                .collect();
        }

        Ok(if query.is_single() {
            QueryOutput::Single(rows.into_iter().next())
        } else {
            QueryOutput::Rows(rows)
        })
    }

    async fn insert(
        &self,
        query: &Query,
        records: &[Row],
        owner: Option<&str>,
    ) -> Result<QueryOutput, BackendError> {
        let mut all_rows = self.tables.load_rows(query.table()).await?;
        let created_at = format_timestamp(OffsetDateTime::now_utc());

        let inserted: Vec<Row> = records
            .iter()
            .map(|record| {
                let mut row = Row::new();
                row.insert("id".into(), Uuid::new_v4().to_string().into());
                if let Some(owner) = owner {
                    row.insert("user_id".into(), owner.into());
                }
                row.insert("created_at".into(), created_at.clone().into());
                // Caller-supplied values win over generated ones
                row.extend(record.clone());
                row
            })
            .collect();

        all_rows.extend(inserted.iter().cloned());
        self.tables.save_rows(query.table(), &all_rows).await?;

        debug!("Inserted {} rows into `{}`", inserted.len(), query.table());

        Ok(QueryOutput::Rows(inserted))
    }

    async fn update(
        &self,
        query: &Query,
        patch: &Row,
        owner: Option<&str>,
    ) -> Result<QueryOutput, BackendError> {
        let mut all_rows = self.tables.load_rows(query.table()).await?;
        let mut updated = 0usize;

        for row in all_rows
            .iter_mut()
            .filter(|row| row_owner(row) == owner && matches_filters(row, query.filters()))
        {
            row.extend(patch.clone());
            updated += 1;
        }

        if updated > 0 {
            self.tables.save_rows(query.table(), &all_rows).await?;
        }
        debug!("Updated {updated} rows in `{}`", query.table());

        Ok(QueryOutput::Empty)
    }

    async fn delete(&self, query: &Query, owner: Option<&str>) -> Result<QueryOutput, BackendError> {
        let mut all_rows = self.tables.load_rows(query.table()).await?;
        let before = all_rows.len();

        all_rows.retain(|row| !(row_owner(row) == owner && matches_filters(row, query.filters())));
        self.tables.save_rows(query.table(), &all_rows).await?;

        debug!(
            "Deleted {} rows from `{}`",
            before - all_rows.len(),
            query.table()
        );

        Ok(QueryOutput::Empty)
    }
}

impl Backend for MockBackend {
    fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    async fn execute(&self, query: &Query) -> Result<QueryOutput, BackendError> {
        let owner = self.sessions.current_user_id();
        let owner = owner.as_deref();

        match query.operation() {
            Operation::Select { columns } => self.select(query, columns, owner).await,
            Operation::Insert(records) => self.insert(query, records, owner).await,
            Operation::Update(patch) => self.update(query, patch, owner).await,
            Operation::Delete => self.delete(query, owner).await,
        }
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<String, BackendError> {
        let content_type = if content_type.is_empty() {
            "application/octet-stream"
        } else {
            content_type
        };
        let data_url = format!("data:{content_type};base64,{}", STANDARD.encode(content));

        self.tables
            .kv()
            .set_item(&Self::storage_key(bucket, path), &data_url)
            .await?;

        Ok(path.to_string())
    }

    /// The stored data URL itself; empty when nothing was uploaded there.
    async fn public_url(&self, bucket: &str, path: &str) -> Result<String, BackendError> {
        Ok(self
            .tables
            .kv()
            .get_item(&Self::storage_key(bucket, path))
            .await?
            .unwrap_or_default())
    }

    async fn sign_up(&self, credentials: &UserCredentials) -> Result<Session, BackendError> {
        self.start_session(&credentials.email).await
    }

    async fn sign_in_with_password(
        &self,
        credentials: &UserCredentials,
    ) -> Result<Session, BackendError> {
        self.start_session(&credentials.email).await
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.tables.kv().remove_item(SESSION_KEY).await?;
        self.sessions.sign_out();
        Ok(())
    }
}

fn row_owner(row: &Row) -> Option<&str> {
    row.get("user_id").and_then(Value::as_str)
}

fn matches_filters(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        row.get(&filter.column)
            .is_some_and(|value| values_equal(value, &filter.value))
    })
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => a == b,
    }
}

/// Numbers numerically, strings lexicographically, `false < true`; anything
/// else, including missing values, compares equal.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}
