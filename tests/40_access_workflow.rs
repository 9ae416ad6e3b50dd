mod common;

use ai_locker::client::{AdminApi, AdminDirectory, LockerClient};
use ai_locker::types::{Action, PermissionFlags, Permissions, Role};
use ai_locker::workflow::{AccessManager, CloseDecision, Effect, Event, Phase};
use anyhow::Result;
use common::{spawn_server, PASSWORD, SEED_EMAIL};

async fn client_for(base_url: &str, name: &str, email: &str) -> Result<LockerClient> {
    let mut client = LockerClient::new(base_url)?;
    client.signup(name, email, PASSWORD).await?;
    Ok(client)
}

#[tokio::test]
async fn promoted_admin_must_be_configured_before_closing() -> Result<()> {
    let server = spawn_server().await?;
    let seed = client_for(&server.base_url, "Seed", SEED_EMAIL).await?;
    let member = client_for(&server.base_url, "User", "user@example.com").await?;
    let member_id = member.current_user().await?.id;

    let mut manager = AccessManager::open(seed.clone()).await?;
    assert!(manager.viewer().unwrap().is_seed);

    manager
        .dispatch(Event::RequestRoleChange { user_id: member_id, new_role: Role::Admin })
        .await;
    assert_eq!(manager.state().phase, Phase::AwaitingRoleConfirmation);
    let effects = manager.dispatch(Event::ConfirmRoleChange).await;
    assert!(effects.contains(&Effect::ScrollIntoView { user_id: member_id }));

    let row = manager.roster().into_iter().find(|r| r.user_id == member_id).unwrap();
    assert!(row.new_admin && row.permissions_editable);
    assert_eq!(row.flags, PermissionFlags::NONE);

    let effects = manager.dispatch(Event::RequestClose).await;
    assert!(!effects.contains(&Effect::Close));
    assert_eq!(manager.state().phase, Phase::BlockedClose);
    assert!(manager.state().error.as_deref().unwrap().contains("User"));

    manager
        .dispatch(Event::TogglePermission { user_id: member_id, action: Action::Add, value: true })
        .await;
    assert!(manager.state().error.is_none());
    assert_eq!(manager.close_decision(), CloseDecision::PromptSave);

    manager.dispatch(Event::RequestClose).await;
    assert_eq!(manager.state().phase, Phase::ConfirmDiscardOrSave);
    let effects = manager.dispatch(Event::SaveAllAndClose).await;
    assert_eq!(effects, vec![Effect::Close]);

    let stored = member.current_user().await?;
    assert_eq!(stored.role, Role::Admin);
    assert_eq!(stored.permissions, Permissions::Granted(PermissionFlags::new(true, false, false)));
    Ok(())
}

#[tokio::test]
async fn non_seed_admin_sees_a_read_only_table() -> Result<()> {
    let server = spawn_server().await?;
    let seed = client_for(&server.base_url, "Seed", SEED_EMAIL).await?;
    let admin = client_for(&server.base_url, "Ann", "ann@example.com").await?;
    let admin_id = admin.current_user().await?.id;
    seed.make_admin(admin_id, Some(PermissionFlags::ALL)).await?;

    let mut manager = AccessManager::open(admin).await?;
    let rows = manager.roster();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| !r.role_selector_enabled && !r.permissions_editable));

    let own = rows.iter().find(|r| r.is_self).unwrap();
    manager
        .dispatch(Event::RequestRoleChange { user_id: own.user_id, new_role: Role::User })
        .await;
    assert!(manager.state().pending_change.is_none());
    assert!(manager.state().error.is_some());
    Ok(())
}

#[tokio::test]
async fn demoted_admin_loses_access_immediately() -> Result<()> {
    let server = spawn_server().await?;
    let seed = client_for(&server.base_url, "Seed", SEED_EMAIL).await?;
    let admin = client_for(&server.base_url, "Ann", "ann@example.com").await?;
    let admin_id = admin.current_user().await?.id;
    seed.make_admin(admin_id, Some(PermissionFlags::new(false, true, false))).await?;
    assert!(admin.list_users(None).await.is_ok());

    let mut manager = AccessManager::open(seed).await?;
    manager
        .dispatch(Event::RequestRoleChange { user_id: admin_id, new_role: Role::User })
        .await;
    manager.dispatch(Event::ConfirmRoleChange).await;

    let err = admin.list_users(None).await.unwrap_err();
    assert_eq!(err.code(), Some("ADMIN_REQUIRED"));
    assert_eq!(manager.dispatch(Event::RequestClose).await, vec![Effect::Close]);
    Ok(())
}

#[tokio::test]
async fn directory_follows_requested_order() -> Result<()> {
    let server = spawn_server().await?;
    let seed = client_for(&server.base_url, "Seed", SEED_EMAIL).await?;
    client_for(&server.base_url, "Abe", "abe@example.com").await?;

    let mut directory = AdminDirectory::new(seed).with_order("-name");
    directory.refresh().await?;
    let names: Vec<&str> = directory.users().iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["Seed", "Abe"]);
    Ok(())
}

#[tokio::test]
async fn calls_without_a_token_fail_locally() -> Result<()> {
    let server = spawn_server().await?;
    let client = LockerClient::new(&server.base_url)?;
    let err = client.current_user().await.unwrap_err();
    assert!(matches!(err, ai_locker::client::ClientError::NotAuthenticated));
    Ok(())
}
