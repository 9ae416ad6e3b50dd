use std::io::Write;

use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use uuid::Uuid;

use crate::cli::config::load_session;
use crate::cli::OutputFormat;
use crate::client::{AdminApi, AdminDirectory};
use crate::types::{Action, Role};
use crate::workflow::{AccessManager, Effect, Event, HighlightTone, Phase, RosterRow};

#[derive(Args)]
pub struct ManageArgs {
    #[arg(long, help = "Sort order for the user list, e.g. role,name")]
    pub order_by: Option<String>,
}

const HELP: &str = "\
commands:
  list                       show the user table
  promote <user>             ask to make <user> an admin
  demote <user>              ask to make <user> a regular user
  confirm | cancel           answer a pending role change
  grant <user> <perm>        tick add, edit or delete for an admin
  revoke <user> <perm>       untick a permission
  save <user>                save one admin's edited permissions
  close                      leave the manager
  save-all | discard | back  answer the unsaved-changes prompt
  dismiss                    clear the error message
<user> is a row number, an email or an id.";

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Input {
    List,
    Help,
    Promote(String),
    Demote(String),
    Confirm,
    Cancel,
    Toggle { user: String, action: Action, value: bool },
    Save(String),
    Close,
    SaveAll,
    Discard,
    Back,
    Dismiss,
}

pub(crate) fn parse_input(line: &str) -> Result<Input, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let input = match words.as_slice() {
        ["list"] | ["ls"] => Input::List,
        ["help"] | ["?"] => Input::Help,
        ["promote", user] => Input::Promote(user.to_string()),
        ["demote", user] => Input::Demote(user.to_string()),
        ["confirm"] | ["yes"] => Input::Confirm,
        ["cancel"] | ["no"] => Input::Cancel,
        [verb @ ("grant" | "revoke"), user, action] => Input::Toggle {
            user: user.to_string(),
            action: action.parse()?,
            value: *verb == "grant",
        },
        ["save", user] => Input::Save(user.to_string()),
        ["close"] | ["quit"] | ["exit"] => Input::Close,
        ["save-all"] => Input::SaveAll,
        ["discard"] => Input::Discard,
        ["back"] => Input::Back,
        ["dismiss"] => Input::Dismiss,
        [] => return Err(String::new()),
        _ => return Err(format!("unrecognised command '{}', try 'help'", line.trim())),
    };
    Ok(input)
}

/// Resolves a row number (1-based), email or id against the table.
pub(crate) fn resolve_row(rows: &[RosterRow], needle: &str) -> Option<Uuid> {
    if let Ok(index) = needle.parse::<usize>() {
        return index.checked_sub(1).and_then(|i| rows.get(i)).map(|r| r.user_id);
    }
    if let Ok(id) = Uuid::parse_str(needle) {
        return rows.iter().find(|r| r.user_id == id).map(|r| r.user_id);
    }
    rows.iter()
        .find(|r| r.email.eq_ignore_ascii_case(needle))
        .map(|r| r.user_id)
}

pub(crate) fn render_row(index: usize, row: &RosterRow) -> String {
    let mark = |on: bool, letter: char| if on { letter } else { '-' };
    let flags = format!(
        "{}{}{}",
        mark(row.flags.add, 'A'),
        mark(row.flags.edit, 'E'),
        mark(row.flags.delete, 'D')
    );
    let mut tags = Vec::new();
    if row.is_seed {
        tags.push("seed");
    }
    if row.is_self {
        tags.push("you");
    }
    if row.dirty {
        tags.push("unsaved");
    }
    if row.new_admin {
        tags.push("new admin");
    }
    if !row.role_selector_enabled {
        tags.push("locked");
    }
    let pointer = match row.highlight {
        Some(HighlightTone::Error) => "!!",
        Some(HighlightTone::Info) => "->",
        None => "  ",
    };
    let perms = if row.role == Role::Admin { flags } else { "   ".to_string() };
    format!(
        "{} {:>2}. {:<24} {:<28} {:<5} {}  {}",
        pointer,
        index + 1,
        row.name,
        row.email,
        row.role,
        perms,
        tags.join(", ")
    )
}

pub async fn handle(args: ManageArgs, _output_format: OutputFormat) -> anyhow::Result<()> {
    let client = load_session()?.client()?;
    let mut directory = AdminDirectory::new(client);
    if let Some(order) = args.order_by {
        directory = directory.with_order(order);
    }
    let mut manager = AccessManager::with_directory(directory).await?;

    let Some(viewer) = manager.viewer() else {
        anyhow::bail!("Could not determine the logged-in user");
    };
    if !viewer.is_admin() {
        anyhow::bail!("Admin access required");
    }
    println!("Managing admin access as {}. Type 'help' for commands.", viewer.email);
    print_table(&manager);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut timers: Vec<(u64, Instant)> = Vec::new();

    loop {
        print_prompt(&manager);

        let next_deadline = timers.iter().map(|(_, at)| *at).min();
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = sleep_until(next_deadline) => {
                let now = Instant::now();
                let (due, pending): (Vec<_>, Vec<_>) = timers.into_iter().partition(|(_, at)| *at <= now);
                timers = pending;
                for (highlight_id, _) in due {
                    manager.dispatch(Event::HighlightExpired { highlight_id }).await;
                }
                println!();
                continue;
            }
        };

        let Some(line) = line else {
            println!();
            if let Some(warning) = manager.abandon_warning() {
                println!("Input closed. {}.", warning);
            }
            return Ok(());
        };

        let input = match parse_input(&line) {
            Ok(input) => input,
            Err(message) => {
                if !message.is_empty() {
                    println!("{}", message);
                }
                continue;
            }
        };

        let event = match input {
            Input::List => {
                print_table(&manager);
                continue;
            }
            Input::Help => {
                println!("{}", HELP);
                continue;
            }
            Input::Promote(user) => match lookup(&manager, &user) {
                Some(user_id) => Event::RequestRoleChange { user_id, new_role: Role::Admin },
                None => continue,
            },
            Input::Demote(user) => match lookup(&manager, &user) {
                Some(user_id) => Event::RequestRoleChange { user_id, new_role: Role::User },
                None => continue,
            },
            Input::Confirm => Event::ConfirmRoleChange,
            Input::Cancel => Event::CancelRoleChange,
            Input::Toggle { user, action, value } => match lookup(&manager, &user) {
                Some(user_id) => Event::TogglePermission { user_id, action, value },
                None => continue,
            },
            Input::Save(user) => match lookup(&manager, &user) {
                Some(user_id) => Event::SavePermissions { user_id },
                None => continue,
            },
            Input::Close => Event::RequestClose,
            Input::SaveAll => Event::SaveAllAndClose,
            Input::Discard => Event::DiscardDrafts,
            Input::Back => Event::CancelClose,
            Input::Dismiss => Event::DismissError,
        };

        let effects = manager.dispatch(event).await;
        let mut closing = false;
        for effect in effects {
            match effect {
                Effect::ScrollIntoView { user_id } => {
                    if let Some(row) = manager.roster().iter().find(|r| r.user_id == user_id) {
                        println!("-> {} <{}>", row.name, row.email);
                    }
                }
                Effect::ClearHighlightAfter { highlight_id, after } => {
                    timers.push((highlight_id, Instant::now() + after));
                }
                Effect::Close => closing = true,
            }
        }
        if closing {
            println!("Closed.");
            return Ok(());
        }
        print_table(&manager);
    }
}

fn lookup<A: AdminApi>(manager: &AccessManager<A>, needle: &str) -> Option<Uuid> {
    let found = resolve_row(&manager.roster(), needle);
    if found.is_none() {
        println!("No user matches '{}'", needle);
    }
    found
}

fn print_table<A: AdminApi>(manager: &AccessManager<A>) {
    for (index, row) in manager.roster().iter().enumerate() {
        println!("{}", render_row(index, row));
    }
    if let Some(error) = &manager.state().error {
        println!("error: {}", error);
    }
}

fn print_prompt<A: AdminApi>(manager: &AccessManager<A>) {
    let state = manager.state();
    match state.phase {
        Phase::AwaitingRoleConfirmation => {
            if let Some(pending) = &state.pending_change {
                println!("Change {} to {}? (confirm/cancel)", pending.user_name, pending.new_role);
            }
        }
        Phase::ConfirmDiscardOrSave => {
            println!("You have unsaved permission changes. (save-all/discard/back)");
        }
        _ => {}
    }
    if let Some(reminder) = &state.reminder {
        println!("Remember to give {} at least one permission.", reminder.user_name);
    }
    print!("locker> ");
    let _ = std::io::stdout().flush();
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PermissionFlags;

    fn row(name: &str) -> RosterRow {
        RosterRow {
            user_id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            role: Role::Admin,
            is_seed: false,
            is_self: false,
            role_selector_enabled: true,
            permissions_editable: true,
            flags: PermissionFlags::new(true, false, false),
            dirty: false,
            new_admin: false,
            highlight: None,
        }
    }

    #[test]
    fn parses_toggle_commands() {
        assert_eq!(
            parse_input("grant 2 delete").unwrap(),
            Input::Toggle { user: "2".to_string(), action: Action::Delete, value: true }
        );
        assert_eq!(
            parse_input("revoke ann@example.com add").unwrap(),
            Input::Toggle { user: "ann@example.com".to_string(), action: Action::Add, value: false }
        );
        assert!(parse_input("grant 2 publish").is_err());
        assert_eq!(parse_input("   ").unwrap_err(), "");
    }

    #[test]
    fn resolves_rows_by_number_email_or_id() {
        let rows = vec![row("Seed"), row("Ann")];
        assert_eq!(resolve_row(&rows, "2"), Some(rows[1].user_id));
        assert_eq!(resolve_row(&rows, "ANN@example.com"), Some(rows[1].user_id));
        assert_eq!(resolve_row(&rows, &rows[0].user_id.to_string()), Some(rows[0].user_id));
        assert_eq!(resolve_row(&rows, "0"), None);
        assert_eq!(resolve_row(&rows, "3"), None);
    }

    #[test]
    fn renders_flags_and_tags() {
        let mut r = row("Ann");
        r.dirty = true;
        r.highlight = Some(HighlightTone::Error);
        let line = render_row(0, &r);
        assert!(line.starts_with("!!  1. Ann"));
        assert!(line.contains("A--"));
        assert!(line.contains("unsaved"));
    }
}
