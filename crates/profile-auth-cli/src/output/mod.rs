//! Output formatting utilities

use crate::error::Result;
use console::style;
use profile_auth::AuthUser;
use serde::Serialize;

/// Output data as JSON
pub fn json_output<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    println!("{json}");
    Ok(())
}

/// Print a success message with green checkmark
pub fn print_success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Print an informational message with blue info icon
pub fn print_info(message: &str) {
    println!("{} {}", style("ℹ").blue(), message);
}

/// Print the fields of a principal, one per line
pub fn print_user(user: &AuthUser) {
    print_field("uid", &user.uid);
    print_field("email", &user.email);
    print_field("verified", &user.email_verified.to_string());
    if let Some(name) = &user.display_name {
        print_field("display name", name);
    }
    if let Some(created) = user.metadata.created_at {
        print_field("created", &created.to_rfc3339());
    }
    if let Some(last_login) = user.metadata.last_login_at {
        print_field("last sign-in", &last_login.to_rfc3339());
    }
}

fn print_field(label: &str, value: &str) {
    println!("  {} {}", style(format!("{label:<14}")).dim(), value);
}
