//! shopdesk - ShopDesk admin dashboard session CLI
//!
//! Signs an administrator in with OAuth 2.0 Authorization Code + PKCE, keeps
//! the session in the configured store and makes authenticated API calls.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shopdesk_infra::config::{self, AppConfig};
use shopdesk_infra::observability::init_tracing;
use tracing::{debug, warn};

mod commands;
mod context;

use commands::api::HttpMethod;
use context::AppContext;

/// shopdesk - ShopDesk admin dashboard session CLI
#[derive(Parser, Debug)]
#[command(name = "shopdesk")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML or JSON configuration file (default: `SHOPDESK_*`
    /// environment, then the standard file locations)
    #[arg(short, long, env = "SHOPDESK_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level regardless of the configured level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    // === Sign-in ===
    /// Start a sign-in and print the authorization URL
    Login {
        /// Serve the redirect URI locally and finish the sign-in automatically
        #[arg(short, long)]
        listen: bool,

        /// Seconds to wait for the redirect with --listen
        #[arg(short, long, default_value = "300")]
        timeout: u64,
    },

    /// Finish a sign-in from the URL the browser was redirected to
    Callback {
        /// Full redirect URL including its query string
        redirect_url: String,
    },

    // === Session ===
    /// Show the session state
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the signed-in user's profile as JSON
    Whoami,

    /// Exchange the refresh token for a new access token
    Refresh,

    /// Clear the session
    Logout,

    // === Dashboard API ===
    /// Call the dashboard API with the session's access token
    Api {
        /// Path relative to the API base URL
        path: String,

        /// HTTP method
        #[arg(short = 'X', long, value_enum, default_value = "get")]
        method: HttpMethod,

        /// JSON request body for POST
        #[arg(short, long)]
        data: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing, so .env can supply SHOPDESK_CONFIG. A missing .env is
    // normal.
    let dotenv = dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut app_config = load_config(cli.config.clone())?;
    if cli.verbose {
        app_config.logging.level = "debug".to_string();
    }
    init_tracing(&app_config.logging);
    if let Some(path) = dotenv {
        debug!(path = %path.display(), "loaded .env");
    }

    let ctx = AppContext::new(app_config)?;
    if let Err(e) = ctx.restore() {
        // Logout resets an unreadable store; everything else needs a session.
        if !matches!(cli.command, Commands::Logout) {
            return Err(e.context("run `shopdesk logout` to reset the stored session"));
        }
        warn!(error = %format!("{e:#}"), "stored session is unreadable; resetting it");
    }

    run(&ctx, cli.command).await
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig> {
    match path {
        Some(path) => config::load_from_file(Some(path.clone()))
            .with_context(|| format!("failed to load {}", path.display())),
        None => config::load().context(
            "no configuration found; set SHOPDESK_CLIENT_ID or create shopdesk.toml",
        ),
    }
}

async fn run(ctx: &AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::Login { listen, timeout } => {
            commands::session::login(ctx, listen, Duration::from_secs(timeout)).await
        }
        Commands::Callback { redirect_url } => commands::session::callback(ctx, &redirect_url).await,
        Commands::Status { json } => commands::session::status(ctx, json),
        Commands::Whoami => commands::session::whoami(ctx),
        Commands::Refresh => commands::session::refresh(ctx).await,
        Commands::Logout => {
            commands::session::logout(ctx);
            Ok(())
        }
        Commands::Api { path, method, data } => {
            commands::api::call(ctx, method, &path, data.as_deref()).await
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_login_with_listener() {
        let cli = Cli::try_parse_from(["shopdesk", "-v", "login", "--listen", "--timeout", "30"])
            .expect("parse");
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Login { listen: true, timeout: 30 }));
    }

    #[test]
    fn test_parse_api_call() {
        let cli = Cli::try_parse_from([
            "shopdesk", "api", "products", "-X", "post", "--data", r#"{"name":"Mug"}"#,
        ])
        .expect("parse");
        match cli.command {
            Commands::Api { path, method, data } => {
                assert_eq!(path, "products");
                assert_eq!(method, HttpMethod::Post);
                assert_eq!(data.as_deref(), Some(r#"{"name":"Mug"}"#));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_callback_requires_url() {
        assert!(Cli::try_parse_from(["shopdesk", "callback"]).is_err());
    }
}
