use std::io::{self, BufRead, Write};

use clap::Subcommand;
use serde_json::json;

use crate::cli::config::{load_session, save_session};
use crate::cli::utils::{describe_permissions, output_client_error, output_success};
use crate::cli::OutputFormat;
use crate::client::AdminApi;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to server")]
    Login {
        #[arg(help = "Email address")]
        email: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
        #[arg(long, help = "Server URL to remember for later commands")]
        server: Option<String>,
    },

    #[command(about = "Forget the saved token")]
    Logout,

    #[command(about = "Show current user information")]
    Whoami,

    #[command(about = "Create an account and log in")]
    Signup {
        #[arg(help = "Display name")]
        name: String,
        #[arg(help = "Email address")]
        email: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
        #[arg(long, help = "Server URL to remember for later commands")]
        server: Option<String>,
    },

    #[command(about = "Request a password reset")]
    Forgot {
        #[arg(help = "Email address")]
        email: String,
    },

    #[command(about = "Set a new password using a reset token")]
    Reset {
        #[arg(help = "Reset token")]
        token: String,
        #[arg(long, help = "New password (will prompt if not provided)")]
        password: Option<String>,
    },
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut session = load_session()?;

    match cmd {
        AuthCommands::Login { email, password, server } => {
            if server.is_some() {
                session.server_url = server;
            }
            let password = password_or_prompt(password)?;
            let mut client = session.client()?;
            match client.login(&email, &password).await {
                Ok(auth) => {
                    session.store_login(&auth.user.email, &auth.token);
                    save_session(&session)?;
                    output_success(
                        &output_format,
                        &format!("Logged in as {} ({})", auth.user.email, auth.user.role),
                        Some(json!({ "user": auth.user, "expires_in": auth.expires_in })),
                    )
                }
                Err(e) => output_client_error(&output_format, &e),
            }
        }
        AuthCommands::Logout => {
            session.clear_login();
            save_session(&session)?;
            output_success(&output_format, "Logged out", None)
        }
        AuthCommands::Whoami => {
            let client = session.client()?;
            match client.current_user().await {
                Ok(user) => {
                    let message = format!(
                        "{} <{}> role={} permissions={}{}",
                        user.name,
                        user.email,
                        user.role,
                        describe_permissions(&user),
                        if user.is_seed { " (seed admin)" } else { "" }
                    );
                    output_success(&output_format, &message, Some(json!({ "user": user })))
                }
                Err(e) => output_client_error(&output_format, &e),
            }
        }
        AuthCommands::Signup { name, email, password, server } => {
            if server.is_some() {
                session.server_url = server;
            }
            let password = password_or_prompt(password)?;
            let mut client = session.client()?;
            match client.signup(&name, &email, &password).await {
                Ok(auth) => {
                    session.store_login(&auth.user.email, &auth.token);
                    save_session(&session)?;
                    output_success(
                        &output_format,
                        &format!("Account created for {}", auth.user.email),
                        Some(json!({ "user": auth.user })),
                    )
                }
                Err(e) => output_client_error(&output_format, &e),
            }
        }
        AuthCommands::Forgot { email } => {
            let client = session.client()?;
            match client.forgot_password(&email).await {
                Ok(outcome) => {
                    let data = outcome.reset_token.as_ref().map(|t| json!({ "reset_token": t }));
                    if let (OutputFormat::Text, Some(token)) = (&output_format, &outcome.reset_token) {
                        println!("Reset token: {}", token);
                    }
                    output_success(&output_format, &outcome.message, data)
                }
                Err(e) => output_client_error(&output_format, &e),
            }
        }
        AuthCommands::Reset { token, password } => {
            let password = password_or_prompt(password)?;
            let client = session.client()?;
            match client.reset_password(&token, &password).await {
                Ok(()) => output_success(&output_format, "Password updated, log in again", None),
                Err(e) => output_client_error(&output_format, &e),
            }
        }
    }
}

fn password_or_prompt(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }
    Ok(password)
}
