use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{Backend, BackendError};
use crate::http::AppStateRef;
use crate::model::user::{CredentialsError, UserCredentials};
use crate::repo::PhotosRepository;
use crate::upload::{SelectedFile, UploadError, UploadWorkflow};
use crate::views::{GridView, MapView, PhotoView, ViewMode};

/// Geotagged photo library
#[derive(Parser)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create an account and sign in
    Signup {
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: Option<String>,
    },
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    /// Upload a photo for the signed in user
    Upload { file: PathBuf },
    /// List the signed in user's photos, newest first
    List {
        #[arg(long, value_enum, default_value_t = ViewMode::Grid)]
        view: ViewMode,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("Not signed in, run `geophoto login` first")]
    NotSignedIn,
}

/// Runs a one-off command. Returns `false` when the server should start
/// instead.
pub async fn run_cli(command: Option<Command>, app_state: AppStateRef) -> Result<bool, CliError> {
    let backend = &app_state.backend;

    match command {
        None | Some(Command::Serve) => return Ok(false),
        Some(Command::Signup {
            email,
            password,
            confirm_password,
        }) => {
            let credentials = UserCredentials::new(email, password);
            credentials.validate_sign_up(confirm_password.as_deref())?;

            let session = backend.sign_up(&credentials).await?;
            if backend.sessions().current().is_some() {
                println!("Signed up and signed in as {}", session.user.email);
            } else {
                println!("Check {} for a confirmation email", session.user.email);
            }
        }
        Some(Command::Login { email, password }) => {
            let credentials = UserCredentials::new(email, password);
            credentials.validate_email()?;

            let session = backend.sign_in_with_password(&credentials).await?;
            println!("Signed in as {}", session.user.email);
        }
        Some(Command::Logout) => {
            backend.sign_out().await?;
            println!("Signed out");
        }
        Some(Command::Upload { file }) => {
            let content = tokio::fs::read(&file).await.map_err(|source| CliError::Io {
                path: file.clone(),
                source,
            })?;
            let name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.to_string_lossy().into_owned());

            let mut workflow = UploadWorkflow::new(backend, app_state.gps_policy);
            workflow.select(SelectedFile::new(name, None, content))?;
            let outcome = workflow
                .upload(|| info!("Upload of {} complete", file.display()))
                .await?;

            if let Some(warning) = &outcome.warning {
                warn!("{warning}");
            }
            println!("Uploaded photo {}", outcome.photo.id);
        }
        Some(Command::List { view }) => {
            let user_id = backend
                .sessions()
                .current_user_id()
                .ok_or(CliError::NotSignedIn)?;
            let photos = PhotosRepository::new(backend)
                .get_photos_by_user(&user_id)
                .await?;

            match PhotoView::new(view, &photos) {
                PhotoView::Grid(grid) => print_grid(&grid),
                PhotoView::Map(map) => print_map(&map),
            }
        }
    }

    Ok(true)
}

fn print_grid(grid: &GridView) {
    if let Some(message) = grid.empty_message {
        println!("{message}");
    }

    for card in &grid.cards {
        let mut line = format!("{}  {}", card.id, card.location);
        if let Some(taken_on) = &card.taken_on {
            line.push_str(&format!("  {taken_on}"));
        }
        if let Some(camera) = &card.camera {
            line.push_str(&format!("  {camera}"));
        }
        println!("{line}");
    }
}

fn print_map(map: &MapView) {
    let (latitude, longitude) = map.center;
    println!("Center {latitude:.4}, {longitude:.4} at zoom {}", map.zoom);
    if let Some(overlay) = map.overlay {
        println!("{overlay}");
    }

    for marker in &map.markers {
        println!("{}  {}", marker.photo_id, marker.label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["geophoto"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_list_view() {
        let cli = Cli::try_parse_from(["geophoto", "list", "--view", "map"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::List {
                view: ViewMode::Map
            })
        ));

        let cli = Cli::try_parse_from(["geophoto", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::List {
                view: ViewMode::Grid
            })
        ));
    }

    #[test]
    fn signup_takes_password_flags() {
        let cli = Cli::try_parse_from([
            "geophoto",
            "signup",
            "a@x.com",
            "--password",
            "secret1",
            "--confirm-password",
            "secret1",
        ])
        .unwrap();

        let Some(Command::Signup {
            email,
            password,
            confirm_password,
        }) = cli.command
        else {
            panic!("expected signup");
        };
        assert_eq!(email, "a@x.com");
        assert_eq!(password, "secret1");
        assert_eq!(confirm_password.as_deref(), Some("secret1"));
    }
}
