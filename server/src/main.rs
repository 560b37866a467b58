use std::{net::SocketAddr, path::PathBuf, process::ExitCode, sync::Arc};

use auth::SessionKeys;
use clap::Parser;
use thiserror::Error;
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod apps;
mod auth;
mod config;
mod content;
mod error;
mod oembed;
mod server;
mod stats;
mod store;
mod videos;

#[derive(Debug, clap::Parser)]
struct ServerOptions {
    #[clap(long, short, default_value = "config.json")]
    config_file: PathBuf,

    /// Password that unlocks the admin panel.
    #[clap(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: String,

    /// Key used to sign admin session tokens.
    #[clap(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,
}

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Init(#[from] server::ServerError),
    #[error("{0} must not be empty")]
    EmptySecret(&'static str),
    #[error("server error: {0}")]
    Serve(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[tokio::main]
async fn main() -> ExitCode {
    let options = ServerOptions::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(options: ServerOptions) -> Result<(), StartupError> {
    debug!(config_file = %options.config_file.display(), "Parsed CLI options");

    if options.admin_password.is_empty() {
        return Err(StartupError::EmptySecret("ADMIN_PASSWORD"));
    }
    if options.jwt_secret.is_empty() {
        return Err(StartupError::EmptySecret("JWT_SECRET"));
    }

    let config = config::ServerConfig::load(&options.config_file)?;
    debug!(?config, "Loaded config file");

    let addr = SocketAddr::new(config.host, config.port);
    let sessions = SessionKeys::new(options.admin_password, &options.jwt_secret);
    let server = Arc::new(server::Server::new(config, sessions)?);
    let app = server::router(server);

    let listener = axum::Server::try_bind(&addr).map_err(|e| StartupError::Serve(e.into()))?;
    info!("Listening on http://{}", addr);
    listener
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StartupError::Serve(e.into()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(%err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig_term) => {
                sig_term.recv().await;
            }
            Err(err) => {
                error!(%err, "Failed to listen for terminate signal");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        ServerOptions::command().debug_assert();
    }

    #[test]
    fn secrets_can_come_from_flags() {
        let options = ServerOptions::try_parse_from([
            "vidshelf-server",
            "--config-file",
            "site.json",
            "--admin-password",
            "pw",
            "--jwt-secret",
            "key",
        ])
        .unwrap();
        assert_eq!(options.config_file, PathBuf::from("site.json"));
        assert_eq!(options.admin_password, "pw");
        assert_eq!(options.jwt_secret, "key");
    }
}
