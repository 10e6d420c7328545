use crate::cli::{commands::Commands, handlers};
use crate::error::Result;
use clap::Parser;
use clap_verbosity_flag::{OffLevel, Verbosity};
use std::path::PathBuf;

/// profile-auth - sign in to the profile application from the terminal
#[derive(Parser, Debug)]
#[command(
    name = "profile-auth",
    author = "Profile Team",
    version,
    about = "Sign in to the profile application from the terminal",
    long_about = "Command-line front end for the profile authentication service.

EXAMPLES:
  profile-auth --provider mock sign-in test@example.com
  profile-auth sign-up alice@example.com
  profile-auth whoami --json
  profile-auth token --force-refresh
  profile-auth config example > profile-auth.toml"
)]
pub struct Args {
    /// Configuration file path (defaults to ./profile-auth.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Provider tag, overriding the configured one (remote or mock)
    #[arg(long, global = true)]
    pub provider: Option<String>,

    #[command(flatten)]
    pub verbosity: Verbosity<OffLevel>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Args {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let target = handlers::ServiceTarget {
            config_path: self.config,
            provider: self.provider,
        };

        match self.command {
            Commands::SignUp { email, password } => {
                handlers::auth::handle_sign_up(&target, email, password).await
            }
            Commands::SignIn { email, password } => {
                handlers::auth::handle_sign_in(&target, email, password).await
            }
            Commands::SignOut => handlers::auth::handle_sign_out(&target).await,
            Commands::Whoami { json } => handlers::auth::handle_whoami(&target, json).await,
            Commands::Token { force_refresh } => {
                handlers::auth::handle_token(&target, force_refresh).await
            }
            Commands::Provider => handlers::auth::handle_provider(&target).await,
            Commands::Config { action } => handlers::config::handle_config(action),
        }
    }
}
