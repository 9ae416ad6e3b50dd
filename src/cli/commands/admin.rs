use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::config::load_session;
use crate::cli::utils::{describe_flags, output_client_error, output_success, output_users};
use crate::cli::OutputFormat;
use crate::client::{AdminApi, ClientError, LockerClient};
use crate::types::{Action, PermissionFlags, UserView};

#[derive(Subcommand)]
pub enum AdminCommands {
    #[command(about = "List all users")]
    Users {
        #[arg(long, help = "Sort order, e.g. createdAt or role,name")]
        order_by: Option<String>,
    },

    #[command(about = "Promote a user to admin (seed admin only)")]
    Promote {
        #[arg(help = "User id or email")]
        user: String,
        #[arg(long, value_delimiter = ',', help = "Permissions to grant right away: add,edit,delete")]
        grant: Option<Vec<Action>>,
    },

    #[command(about = "Revoke admin rights (seed admin only)")]
    Demote {
        #[arg(help = "User id or email")]
        user: String,
    },

    #[command(about = "Replace an admin's permissions (seed admin only)")]
    Permissions {
        #[arg(help = "User id or email")]
        user: String,
        #[arg(long, value_delimiter = ',', help = "Permissions to keep; anything omitted is removed")]
        grant: Vec<Action>,
    },
}

pub async fn handle(cmd: AdminCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = load_session()?.client()?;

    let result = match cmd {
        AdminCommands::Users { order_by } => match client.list_users(order_by.as_deref()).await {
            Ok(users) => return output_users(&output_format, &users),
            Err(e) => Err(e),
        },
        AdminCommands::Promote { user, grant } => {
            let flags = grant.map(|actions| flags_from(&actions));
            match resolve_user(&client, &user).await {
                Ok(id) => client.make_admin(id, flags).await.map(|u| ("promoted to admin", u)),
                Err(e) => Err(e),
            }
        }
        AdminCommands::Demote { user } => match resolve_user(&client, &user).await {
            Ok(id) => client.revoke_admin(id).await.map(|u| ("is no longer an admin", u)),
            Err(e) => Err(e),
        },
        AdminCommands::Permissions { user, grant } => match resolve_user(&client, &user).await {
            Ok(id) => client
                .update_permissions(id, flags_from(&grant))
                .await
                .map(|u| ("permissions updated", u)),
            Err(e) => Err(e),
        },
    };

    match result {
        Ok((what, user)) => output_success(
            &output_format,
            &format!("{} {} ({})", user.email, what, describe_flags(user.permissions.effective())),
            Some(json!({ "user": user })),
        ),
        Err(e) => output_client_error(&output_format, &e),
    }
}

pub(crate) fn flags_from(actions: &[Action]) -> PermissionFlags {
    actions
        .iter()
        .fold(PermissionFlags::NONE, |flags, action| flags.with(*action, true))
}

/// Accepts a user id as is; anything else is looked up by email.
async fn resolve_user(client: &LockerClient, needle: &str) -> Result<Uuid, ClientError> {
    if let Ok(id) = Uuid::parse_str(needle) {
        return Ok(id);
    }
    let users = client.list_users(None).await?;
    find_by_email(&users, needle).ok_or_else(|| ClientError::Api {
        status: 404,
        code: "NOT_FOUND".to_string(),
        message: format!("No user with email {}", needle),
    })
}

pub(crate) fn find_by_email(users: &[UserView], email: &str) -> Option<Uuid> {
    users
        .iter()
        .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
        .map(|u| u.id)
}
