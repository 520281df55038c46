use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tracing::{debug, info};

use crate::http::AppStateRef;
use crate::http::error::{HttpError, HttpResult};
use crate::http::utils::{read_first_field, require_user};
use crate::model::photo::Photo;
use crate::repo::PhotosRepository;
use crate::upload::UploadWorkflow;
use crate::views::{GridView, MapView};

pub fn router(app_state: AppStateRef) -> Router {
    Router::new()
        .route("/", get(photos_list))
        .route("/grid", get(photos_grid))
        .route("/map", get(photos_map))
        .route("/upload", post(upload_photo))
        .route("/{photo_id}", delete(delete_photo))
        .with_state(app_state)
}

async fn user_photos(state: AppStateRef) -> HttpResult<Vec<Photo>> {
    let user_id = require_user(state)?;

    Ok(PhotosRepository::new(&state.backend)
        .get_photos_by_user(&user_id)
        .await?)
}

async fn photos_list(State(state): State<AppStateRef>) -> HttpResult<impl IntoResponse> {
    Ok(Json(user_photos(state).await?))
}

async fn photos_grid(State(state): State<AppStateRef>) -> HttpResult<impl IntoResponse> {
    Ok(Json(GridView::new(&user_photos(state).await?)))
}

async fn photos_map(State(state): State<AppStateRef>) -> HttpResult<impl IntoResponse> {
    Ok(Json(MapView::new(&user_photos(state).await?)))
}

async fn upload_photo(
    State(state): State<AppStateRef>,
    payload: Multipart,
) -> HttpResult<impl IntoResponse> {
    require_user(state)?;
    let file = read_first_field(payload).await?;
    info!("Uploading `{}`", file.name);

    let mut workflow = UploadWorkflow::new(&state.backend, state.gps_policy);
    workflow.select(file)?;
    let outcome = workflow
        .upload(|| debug!("Photo listing changed"))
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn delete_photo(
    State(state): State<AppStateRef>,
    Path(photo_id): Path<String>,
) -> HttpResult<impl IntoResponse> {
    require_user(state)?;
    let repo = PhotosRepository::new(&state.backend);

    if repo.get_photo(&photo_id).await?.is_none() {
        return Err(HttpError::NotFound);
    }
    repo.delete_photo(&photo_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
