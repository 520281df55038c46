use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::http::AppStateRef;
use crate::http::error::{HttpError, HttpResult};
use crate::model::user::UserCredentials;

pub fn router(app_state: AppStateRef) -> Router {
    Router::new()
        .route("/session", get(session))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .with_state(app_state)
}

#[derive(Deserialize)]
struct SignUpForm {
    #[serde(flatten)]
    credentials: UserCredentials,
    confirm_password: Option<String>,
}

async fn session(State(state): State<AppStateRef>) -> HttpResult<impl IntoResponse> {
    let session = state
        .backend
        .sessions()
        .current()
        .ok_or(HttpError::Unauthorized)?;

    Ok(Json(session.user))
}

async fn signup(
    State(state): State<AppStateRef>,
    Json(form): Json<SignUpForm>,
) -> HttpResult<impl IntoResponse> {
    form.credentials
        .validate_sign_up(form.confirm_password.as_deref())?;

    let session = state.backend.sign_up(&form.credentials).await?;

    // Accounts awaiting email confirmation are created without a session
    let signed_in = state.backend.sessions().current_user_id().as_deref()
        == Some(session.user.id.as_str());
    let status = if signed_in {
        StatusCode::CREATED
    } else {
        StatusCode::ACCEPTED
    };

    Ok((status, Json(session.user)))
}

async fn login(
    State(state): State<AppStateRef>,
    Json(credentials): Json<UserCredentials>,
) -> HttpResult<impl IntoResponse> {
    credentials.validate_email()?;

    let session = state
        .backend
        .sign_in_with_password(&credentials)
        .await
        .inspect_err(|e| warn!("Failed to sign in `{}`: {e}", credentials.email))?;

    Ok(Json(session.user))
}

async fn logout(State(state): State<AppStateRef>) -> HttpResult<impl IntoResponse> {
    if let Some(user_id) = state.backend.sessions().current_user_id() {
        debug!("Logging out user: {user_id}");
    }
    state.backend.sign_out().await?;

    Ok(StatusCode::NO_CONTENT)
}
