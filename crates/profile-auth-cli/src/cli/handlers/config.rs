//! Configuration command handlers

use crate::cli::commands::ConfigAction;
use crate::error::Result;
use profile_auth::AuthConfig;

pub fn handle_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Example => {
            print!("{}", AuthConfig::generate_example()?);
            Ok(())
        }
    }
}
