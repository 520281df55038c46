use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::backend::query::{Operation, Query};
use crate::backend::{Backend, BackendError, QueryOutput};
use crate::model::user::{Session, User, UserCredentials};
use crate::repo::{KeyValueRepository, Row};
use crate::session::SessionManager;

const SESSION_KEY: &str = "remote:session";

/// Talks to a Supabase-compatible service: PostgREST for tables, the storage
/// API for files and GoTrue for auth. Row-level security is enforced by the
/// server from the session's access token.
pub struct RemoteBackend {
    client: Client,
    url: String,
    anon_key: String,
    kv: KeyValueRepository,
    sessions: SessionManager,
}

impl RemoteBackend {
    /// Restores the session, access token included, saved by an earlier run.
    pub async fn new(
        url: String,
        anon_key: String,
        kv: KeyValueRepository,
        sessions: SessionManager,
    ) -> Result<Self, BackendError> {
        let saved = match kv.get_item(SESSION_KEY).await? {
            Some(raw) => serde_json::from_str::<Session>(&raw)
                .inspect_err(|e| warn!("Ignoring unreadable saved session: {e}"))
                .ok(),
            None => None,
        };

        if let Some(session) = &saved {
            debug!("Restored session for `{}`", session.user.email);
        }
        sessions.restore(saved);

        Ok(Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            anon_key,
            kv,
            sessions,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let token = self
            .sessions
            .current()
            .and_then(|session| session.access_token)
            .unwrap_or_else(|| self.anon_key.clone());

        self.client
            .request(method, format!("{}{path}", self.url))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    async fn authenticate(
        &self,
        path: &str,
        credentials: &UserCredentials,
    ) -> Result<Session, BackendError> {
        let body = serde_json::json!({
            "email": credentials.email.trim(),
            "password": credentials.password,
        });

        let response = check(self.request(Method::POST, path).json(&body).send().await?).await?;
        let session = parse_auth_response(response.json().await?)?;

        if session.access_token.is_some() {
            self.kv
                .set_item(SESSION_KEY, &serde_json::to_string(&session)?)
                .await?;
            self.sessions.sign_in(session.clone());
        } else {
            info!("Account `{}` awaits email confirmation", session.user.email);
        }

        Ok(session)
    }

    async fn revoke_token(&self) -> Result<(), BackendError> {
        check(self.request(Method::POST, "/auth/v1/logout").send().await?).await?;
        Ok(())
    }
}

impl Backend for RemoteBackend {
    fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    async fn execute(&self, query: &Query) -> Result<QueryOutput, BackendError> {
        let path = format!("/rest/v1/{}", query.table());
        let params = rest_params(query);
        debug!("{} {path} {params:?}", rest_method(query.operation()));

        let request = self
            .request(rest_method(query.operation()), &path)
            .query(&params);

        match query.operation() {
            Operation::Select { .. } => {
                let rows: Vec<Row> = check(request.send().await?).await?.json().await?;
                Ok(if query.is_single() {
                    QueryOutput::Single(rows.into_iter().next())
                } else {
                    QueryOutput::Rows(rows)
                })
            }
            Operation::Insert(records) => {
                let response = request
                    .header("Prefer", "return=representation")
                    .json(records)
                    .send()
                    .await?;
                Ok(QueryOutput::Rows(check(response).await?.json().await?))
            }
            Operation::Update(patch) => {
                let response = request
                    .header("Prefer", "return=minimal")
                    .json(patch)
                    .send()
                    .await?;
                check(response).await?;
                Ok(QueryOutput::Empty)
            }
            Operation::Delete => {
                check(request.send().await?).await?;
                Ok(QueryOutput::Empty)
            }
        }
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<String, BackendError> {
        let content_type = HeaderValue::from_str(content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream"));

        let response = self
            .request(Method::POST, &format!("/storage/v1/object/{bucket}/{path}"))
            .header(CONTENT_TYPE, content_type)
            .body(content.to_vec())
            .send()
            .await?;
        check(response).await?;

        Ok(path.to_string())
    }

    async fn public_url(&self, bucket: &str, path: &str) -> Result<String, BackendError> {
        Ok(format!("{}/storage/v1/object/public/{bucket}/{path}", self.url))
    }

    async fn sign_up(&self, credentials: &UserCredentials) -> Result<Session, BackendError> {
        self.authenticate("/auth/v1/signup", credentials).await
    }

    async fn sign_in_with_password(
        &self,
        credentials: &UserCredentials,
    ) -> Result<Session, BackendError> {
        self.authenticate("/auth/v1/token?grant_type=password", credentials)
            .await
    }

    /// The local session is cleared even when the server refuses to revoke
    /// the token, e.g. because it already expired.
    async fn sign_out(&self) -> Result<(), BackendError> {
        if self.sessions.current().is_some()
            && let Err(e) = self.revoke_token().await
        {
            warn!("Remote sign out failed, clearing the local session anyway: {e}");
        }

        self.kv.remove_item(SESSION_KEY).await?;
        self.sessions.sign_out();
        Ok(())
    }
}

fn rest_method(operation: &Operation) -> Method {
    match operation {
        Operation::Select { .. } => Method::GET,
        Operation::Insert(_) => Method::POST,
        Operation::Update(_) => Method::PATCH,
        Operation::Delete => Method::DELETE,
    }
}

/// PostgREST query string for `query`.
fn rest_params(query: &Query) -> Vec<(String, String)> {
    let mut params = Vec::new();

    if let Operation::Select { columns } = query.operation() {
        let columns: String = columns.chars().filter(|c| !c.is_whitespace()).collect();
        params.push((
            "select".to_string(),
            if columns.is_empty() { "*".to_string() } else { columns },
        ));
    }

    for filter in query.filters() {
        let condition = match &filter.value {
            Value::Null => "is.null".to_string(),
            Value::String(value) => format!("eq.{value}"),
            other => format!("eq.{other}"),
        };
        params.push((filter.column.clone(), condition));
    }

    if let Some(order) = query.order_by() {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{direction}", order.column)));
    }

    if query.is_single() {
        params.push(("limit".to_string(), "1".to_string()));
    }

    params
}

async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Api {
        status: status.as_u16(),
        message: error_message(&body).unwrap_or_else(|| format!("Request failed with {status}")),
    })
}

fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

#[derive(Deserialize)]
struct RemoteUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    created_at: Option<OffsetDateTime>,
}

/// Token responses nest the user under `user`; a sign-up awaiting email
/// confirmation returns the bare user.
fn parse_auth_response(mut body: Value) -> Result<Session, BackendError> {
    let access_token = body
        .get("access_token")
        .and_then(Value::as_str)
        .map(str::to_string);
    let user = match body.get_mut("user") {
        Some(user) => user.take(),
        None => body,
    };
    let user: RemoteUser = serde_json::from_value(user)?;

    Ok(Session {
        user: User {
            id: user.id,
            email: user.email.unwrap_or_default(),
            created_at: user.created_at.unwrap_or_else(OffsetDateTime::now_utc),
        },
        access_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::connect_in_memory;
    use crate::session::AuthEvent;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    /// Auth service that issues tokens but refuses to revoke them.
    async fn auth_server() -> String {
        let app = Router::new()
            .route(
                "/auth/v1/token",
                post(|| async {
                    Json(json!({
                        "access_token": "jwt",
                        "user": {"id": "u1", "email": "a@x.com"}
                    }))
                }),
            )
            .route(
                "/auth/v1/logout",
                post(|| async { (StatusCode::UNAUTHORIZED, Json(json!({"msg": "JWT expired"}))) }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        format!("http://{addr}")
    }

    async fn remote(url: &str, kv: &KeyValueRepository) -> RemoteBackend {
        RemoteBackend::new(url.to_string(), "anon".into(), kv.clone(), SessionManager::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn session_is_restored_by_the_next_process() {
        let url = auth_server().await;
        let kv = KeyValueRepository::new(connect_in_memory().await.unwrap());

        remote(&url, &kv)
            .await
            .sign_in_with_password(&UserCredentials::new("a@x.com", "pw"))
            .await
            .unwrap();

        let session = remote(&url, &kv).await.sessions().current().unwrap();
        assert_eq!(session.user.id, "u1");
        assert_eq!(session.access_token.as_deref(), Some("jwt"));
    }

    #[tokio::test]
    async fn sign_out_clears_the_session_when_revoking_fails() {
        let url = auth_server().await;
        let kv = KeyValueRepository::new(connect_in_memory().await.unwrap());
        let backend = remote(&url, &kv).await;
        backend
            .sign_in_with_password(&UserCredentials::new("a@x.com", "pw"))
            .await
            .unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let recorded = events.clone();
        let _subscription = backend
            .sessions()
            .subscribe(move |event, _| recorded.lock().unwrap().push(event));

        backend.sign_out().await.unwrap();

        assert_eq!(backend.sessions().current(), None);
        assert_eq!(
            *events.lock().unwrap(),
            vec![AuthEvent::SignedIn, AuthEvent::SignedOut]
        );
        assert_eq!(kv.get_item(SESSION_KEY).await.unwrap(), None);
        assert!(remote(&url, &kv).await.sessions().current().is_none());
    }

    fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
        expected
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn listing_query_translates_to_postgrest() {
        let query = Query::from("photos")
            .select("*")
            .eq("user_id", "u1")
            .order("created_at", false);

        assert_eq!(rest_method(query.operation()), Method::GET);
        assert_eq!(
            rest_params(&query),
            pairs(&[
                ("select", "*"),
                ("user_id", "eq.u1"),
                ("order", "created_at.desc"),
            ])
        );
    }

    #[test]
    fn single_limits_and_non_string_filters_are_rendered() {
        let query = Query::from("t")
            .select("id, name")
            .eq("n", 3)
            .eq("flag", true)
            .eq("gone", Value::Null)
            .single();

        assert_eq!(
            rest_params(&query),
            pairs(&[
                ("select", "id,name"),
                ("n", "eq.3"),
                ("flag", "eq.true"),
                ("gone", "is.null"),
                ("limit", "1"),
            ])
        );
    }

    #[test]
    fn mutations_carry_only_filters() {
        let query = Query::from("t").delete().eq("id", "1");

        assert_eq!(rest_method(query.operation()), Method::DELETE);
        assert_eq!(rest_params(&query), pairs(&[("id", "eq.1")]));
    }

    #[test]
    fn parses_token_response() {
        let session = parse_auth_response(json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "user": {
                "id": "u1",
                "email": "a@x.com",
                "created_at": "2024-01-01T00:00:00Z"
            }
        }))
        .unwrap();

        assert_eq!(session.access_token.as_deref(), Some("jwt"));
        assert_eq!(session.user.id, "u1");
        assert_eq!(session.user.email, "a@x.com");
    }

    #[test]
    fn parses_unconfirmed_sign_up() {
        let session = parse_auth_response(json!({"id": "u2", "email": "b@x.com"})).unwrap();

        assert_eq!(session.access_token, None);
        assert_eq!(session.user.id, "u2");
    }

    #[test]
    fn extracts_error_messages() {
        assert_eq!(
            error_message(r#"{"msg": "Invalid login credentials"}"#).as_deref(),
            Some("Invalid login credentials")
        );
        assert_eq!(error_message("<html>"), None);
    }
}
