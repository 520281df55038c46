use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_http::{cors, trace};
use tracing::{Level, warn};

use crate::backend::AnyBackend;
use crate::upload::GpsPolicy;

mod auth_api;
pub mod error;
mod photos_api;
mod utils;

pub fn router(app_state: AppStateRef) -> Router {
    Router::new()
        .route("/", get(|| async { "GeoPhoto" }))
        .nest("/auth", auth_api::router(app_state))
        .nest("/photos", photos_api::router(app_state))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::new().allow_origin(cors::Any))
        .layer(DefaultBodyLimit::max(64 * 1024 * 1024)) // 64MB
}

pub struct AppState {
    pub backend: AnyBackend,
    pub gps_policy: GpsPolicy,
}

impl AppState {
    pub fn new(backend: AnyBackend, gps_policy: GpsPolicy) -> Self {
        Self {
            backend,
            gps_policy,
        }
    }
}

pub type AppStateRef = &'static AppState;

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}")
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
