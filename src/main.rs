use clap::Parser;
use geophoto::backend::{AnyBackend, Backend};
use geophoto::cli::{self, Cli};
use geophoto::http::{self, AppState, AppStateRef};
use geophoto::repo;
use geophoto::session::SessionManager;
use geophoto::utils::env_reader::EnvVariables;
use mimalloc::MiMalloc;
use std::net::SocketAddr;
use std::process::ExitCode;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    // Logging
    tracing_subscriber::registry()
        .with(EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(
            |_| "info,sqlx=warn,tower_http=info".into(),
        )))
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    let vars = EnvVariables::get_all();

    let pool = repo::connect(&vars.database_url)
        .await
        .expect("Failed to create DB Pool");

    let backend = AnyBackend::from_config(&vars.backend, pool, SessionManager::new())
        .await
        .expect("Failed to initialize the backend");

    let app_state = AppState::new(backend, vars.gps_policy);
    let app_state: AppStateRef = Box::leak(Box::new(app_state));
    let sessions = app_state.backend.sessions().clone();

    let _auth_log = sessions.subscribe(|event, session| match session {
        Some(session) => info!("Auth state {event}: {}", session.user.email),
        None => info!("Auth state {event}"),
    });

    // Run the CLI
    match cli::run_cli(args.command, app_state).await {
        Ok(true) => return ExitCode::SUCCESS,
        Ok(false) => {}
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    }

    info!("Server listening on port {}", vars.server_port);

    let http_service = http::router(app_state).into_make_service();
    let addr = SocketAddr::from(([0, 0, 0, 0], vars.server_port));
    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind to port");

    axum::serve(listener, http_service)
        .with_graceful_shutdown(http::shutdown_signal())
        .await
        .expect("Failed to start server");

    sessions.shutdown();
    ExitCode::SUCCESS
}
