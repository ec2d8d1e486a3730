// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use site_admin::app::{create_router, AppState, VERSION};
use site_admin::config::AppConfig;
use site_admin::models::auth::UserRole;
use site_admin::services::auth::{validate_password, validate_username, AuthConfig, AuthService};
use site_admin::services::auth_db::AuthDbClient;
use site_admin::services::db::SqliteClient;
use site_admin::services::email::{EmailConfig, EmailService};
use site_admin::services::logging::init_tracing;
use site_admin::services::rate_limit::RateLimitConfig;
use site_admin::services::storage::{StorageClient, StorageConfig};
use site_admin::services::telegram::{TelegramClient, TelegramConfig};
use site_admin::services::validation::is_valid_site_key;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{error, info, warn};

/// How often expired sessions are purged from the database.
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Parser)]
#[command(name = "site-admin", version = VERSION, about = "Multi-site admin panel API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create a staff account
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// admin or accountant
        #[arg(long, default_value = "admin", value_parser = parse_role)]
        role: UserRole,
        /// Bind the account to one site; omit for access to all sites
        #[arg(long)]
        site: Option<String>,
    },
}

fn parse_role(value: &str) -> Result<UserRole, String> {
    UserRole::parse(value).ok_or_else(|| format!("unknown role '{value}', expected admin or accountant"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; real deployments set the environment directly
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let auth_config = AuthConfig::from_env()?;

    let db = SqliteClient::connect(&config.database_url, &config.default_site)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(db, config, auth_config).await,
        Command::CreateUser {
            username,
            password,
            role,
            site,
        } => {
            let auth = AuthService::new(AuthDbClient::new(db.pool().clone()), auth_config);
            create_user(&auth, &username, &password, role, site.as_deref()).await
        }
    }
}

async fn create_user(
    auth: &AuthService,
    username: &str,
    password: &str,
    role: UserRole,
    site: Option<&str>,
) -> Result<()> {
    validate_username(username).map_err(|e| anyhow!(e))?;
    validate_password(password).map_err(|e| anyhow!(e))?;
    if let Some(site) = site {
        if !is_valid_site_key(site) {
            return Err(anyhow!("Invalid site key '{site}'"));
        }
    }

    if auth.db().get_user_by_username(username).await?.is_some() {
        return Err(anyhow!("Username '{username}' is already taken"));
    }

    let user_id = auth.create_user(username, password, role, site).await?;
    println!("Created {} '{username}' ({user_id})", role.as_str());
    Ok(())
}

async fn serve(db: SqliteClient, config: AppConfig, auth_config: AuthConfig) -> Result<()> {
    let rate_limits = RateLimitConfig::from_env()?;
    let storage = StorageClient::new(StorageConfig::from_env()?);
    let bind_addr = config.bind_addr;

    let mut state = AppState::new(db, config, auth_config, &rate_limits, storage);

    match TelegramConfig::from_env()? {
        Some(telegram) => {
            state = state.with_telegram(TelegramClient::new(telegram)?);
            info!("Telegram notifications enabled");
        }
        None => warn!("TELEGRAM_BOT_TOKEN not set, lead forwarding disabled"),
    }

    match EmailConfig::from_env()? {
        Some(email) => {
            state = state.with_email(EmailService::new(email)?);
            info!("SMTP newsletter delivery enabled");
        }
        None => warn!("SMTP_HOST not set, newsletters cannot be sent"),
    }

    state.auth.bootstrap_admin().await?;

    state
        .lead_limiter
        .clone()
        .spawn_sweeper(rate_limits.sweep_interval);
    state
        .login_limiter
        .clone()
        .spawn_sweeper(rate_limits.sweep_interval);
    spawn_session_cleanup(&state);

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;

    info!(version = VERSION, addr = %bind_addr, "site-admin listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

fn spawn_session_cleanup(state: &AppState) {
    let auth = state.auth.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            match auth.db().delete_expired_sessions().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Purged expired sessions"),
                Err(e) => error!(error = %e, "Failed to purge expired sessions"),
            }
        }
    });
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_serve() {
        let cli = Cli::try_parse_from(["site-admin"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_create_user() {
        let cli = Cli::try_parse_from([
            "site-admin",
            "create-user",
            "--username",
            "anna",
            "--password",
            "long-enough",
            "--role",
            "accountant",
            "--site",
            "bakery",
        ])
        .unwrap();

        match cli.command {
            Some(Command::CreateUser { username, role, site, .. }) => {
                assert_eq!(username, "anna");
                assert_eq!(role, UserRole::Accountant);
                assert_eq!(site.as_deref(), Some("bakery"));
            }
            _ => panic!("expected create-user"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_role() {
        assert!(Cli::try_parse_from([
            "site-admin",
            "create-user",
            "--username",
            "anna",
            "--password",
            "long-enough",
            "--role",
            "owner",
        ])
        .is_err());
    }
}
