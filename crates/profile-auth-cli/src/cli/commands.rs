use clap::Subcommand;

/// Main CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a new account and sign in
    SignUp {
        /// Email address
        email: String,

        /// Password (prompted when omitted)
        #[arg(long, env = "PROFILE_AUTH_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign in with an existing account
    SignIn {
        /// Email address
        email: String,

        /// Password (prompted when omitted)
        #[arg(long, env = "PROFILE_AUTH_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out of the current session
    SignOut,

    /// Show the signed-in user
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a bearer token for the current session
    Token {
        /// Bypass the cached token
        #[arg(long)]
        force_refresh: bool,
    },

    /// Show which provider is active
    Provider,

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print an example configuration file
    Example,
}
