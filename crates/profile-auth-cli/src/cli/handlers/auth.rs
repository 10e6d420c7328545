//! Authentication command handlers

use super::ServiceTarget;
use crate::error::{CliError, Result};
use crate::output::{json_output, print_info, print_success, print_user};
use dialoguer::Password;
use profile_auth::AuthOutcome;
use tracing::debug;

fn prompt_password(confirm: bool) -> Result<String> {
    let prompt = Password::new().with_prompt("Password");
    let prompt = if confirm {
        prompt.with_confirmation("Confirm password", "Passwords do not match")
    } else {
        prompt
    };
    Ok(prompt.interact()?)
}

fn report_outcome(outcome: AuthOutcome, action: &str) -> Result<()> {
    match (outcome.user, outcome.error) {
        (Some(user), None) => {
            print_success(&format!("{} as {}", action, user.email));
            print_user(&user);
            Ok(())
        }
        (_, Some(message)) => Err(CliError::Rejected(message)),
        (None, None) => Err(CliError::internal("Provider returned neither a user nor an error")),
    }
}

/// Handle sign-up command
pub async fn handle_sign_up(
    target: &ServiceTarget,
    email: String,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt_password(true)?,
    };

    let service = target.connect().await?;
    let outcome = service.sign_up(&email, &password).await?;
    report_outcome(outcome, "Registered and signed in")
}

/// Handle sign-in command
pub async fn handle_sign_in(
    target: &ServiceTarget,
    email: String,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt_password(false)?,
    };

    let service = target.connect().await?;
    let outcome = service.sign_in(&email, &password).await?;
    report_outcome(outcome, "Signed in")
}

/// Handle sign-out command
pub async fn handle_sign_out(target: &ServiceTarget) -> Result<()> {
    let service = target.connect().await?;
    let was_signed_in = service.is_authenticated();

    let outcome = service.sign_out().await?;
    if let Some(message) = outcome.error {
        return Err(CliError::Rejected(message));
    }

    if was_signed_in {
        print_success("Signed out");
    } else {
        print_info("No active session");
    }
    Ok(())
}

/// Handle whoami command
pub async fn handle_whoami(target: &ServiceTarget, json: bool) -> Result<()> {
    let service = target.connect().await?;
    let user = service.current_user();

    if json {
        return json_output(&user);
    }

    match user {
        Some(user) => {
            print_success(&format!("Signed in as {}", user.email));
            print_user(&user);
        }
        None => print_info("Not signed in"),
    }
    Ok(())
}

/// Handle token command
pub async fn handle_token(target: &ServiceTarget, force_refresh: bool) -> Result<()> {
    let service = target.connect().await?;
    debug!("Requesting token (force refresh: {})", force_refresh);

    match service.auth_token(force_refresh).await? {
        Some(token) => {
            println!("{token}");
            Ok(())
        }
        None => Err(CliError::Rejected(
            "Not signed in. Run 'profile-auth sign-in <email>' first".to_string(),
        )),
    }
}

/// Handle provider command
pub async fn handle_provider(target: &ServiceTarget) -> Result<()> {
    let service = target.connect().await?;

    let kind = service
        .provider_kind()
        .map(|kind| kind.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    print_info(&format!(
        "Provider: {} ({})",
        kind,
        service.provider_name().unwrap_or_default()
    ));
    Ok(())
}
