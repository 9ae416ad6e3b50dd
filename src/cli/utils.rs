use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::client::ClientError;
use crate::types::{PermissionFlags, Permissions, UserView};

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(data_value) = data {
                response["data"] = data_value;
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(
    output_format: &OutputFormat,
    message: &str,
    error_code: Option<&str>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

pub fn output_client_error(output_format: &OutputFormat, err: &ClientError) -> anyhow::Result<()> {
    output_error(output_format, &err.to_string(), err.code())
}

/// "add, edit" style summary; "none" when nothing is granted.
pub fn describe_flags(flags: PermissionFlags) -> String {
    let granted: Vec<&str> = [("add", flags.add), ("edit", flags.edit), ("delete", flags.delete)]
        .iter()
        .filter(|(_, on)| *on)
        .map(|(name, _)| *name)
        .collect();
    if granted.is_empty() {
        "none".to_string()
    } else {
        granted.join(", ")
    }
}

pub fn describe_permissions(user: &UserView) -> String {
    match user.permissions {
        Permissions::FullAccess => "full access".to_string(),
        Permissions::Granted(flags) => describe_flags(flags),
    }
}

/// Prints the user list as a table or a JSON array.
pub fn output_users(output_format: &OutputFormat, users: &[UserView]) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "users": users }))?);
        }
        OutputFormat::Text => {
            if users.is_empty() {
                println!("No users found");
                return Ok(());
            }
            println!("{:<36}  {:<28}  {:<6}  {}", "ID", "EMAIL", "ROLE", "PERMISSIONS");
            for user in users {
                let marker = if user.is_seed { " (seed)" } else { "" };
                println!(
                    "{:<36}  {:<28}  {:<6}  {}{}",
                    user.id,
                    user.email,
                    user.role,
                    describe_permissions(user),
                    marker
                );
            }
        }
    }
    Ok(())
}
