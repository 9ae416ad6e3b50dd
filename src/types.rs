/// Shared types used by the server, the client and the access workflow

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role. New accounts start as `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// The three granular admin permissions. Missing flags deserialize as false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionFlags {
    #[serde(default)]
    pub add: bool,
    #[serde(default)]
    pub edit: bool,
    #[serde(default)]
    pub delete: bool,
}

impl PermissionFlags {
    pub const NONE: PermissionFlags = PermissionFlags { add: false, edit: false, delete: false };
    pub const ALL: PermissionFlags = PermissionFlags { add: true, edit: true, delete: true };

    pub fn new(add: bool, edit: bool, delete: bool) -> Self {
        Self { add, edit, delete }
    }

    pub fn any(&self) -> bool {
        self.add || self.edit || self.delete
    }

    pub fn get(&self, action: Action) -> bool {
        match action {
            Action::Add => self.add,
            Action::Edit => self.edit,
            Action::Delete => self.delete,
        }
    }

    /// Returns a complete copy with one flag replaced.
    pub fn with(mut self, action: Action, value: bool) -> Self {
        match action {
            Action::Add => self.add = value,
            Action::Edit => self.edit = value,
            Action::Delete => self.delete = value,
        }
        self
    }
}

/// Stored permissions of an account. `FullAccess` is `null` on the wire and
/// in storage; it is what admins created before granular permissions carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<PermissionFlags>", into = "Option<PermissionFlags>")]
pub enum Permissions {
    #[default]
    FullAccess,
    Granted(PermissionFlags),
}

impl Permissions {
    /// Flags as an operator sees them: full access reads as every flag set.
    pub fn effective(&self) -> PermissionFlags {
        match self {
            Permissions::FullAccess => PermissionFlags::ALL,
            Permissions::Granted(flags) => *flags,
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        self.effective().get(action)
    }

    pub fn granted(&self) -> Option<PermissionFlags> {
        match self {
            Permissions::FullAccess => None,
            Permissions::Granted(flags) => Some(*flags),
        }
    }
}

impl From<Option<PermissionFlags>> for Permissions {
    fn from(value: Option<PermissionFlags>) -> Self {
        match value {
            Some(flags) => Permissions::Granted(flags),
            None => Permissions::FullAccess,
        }
    }
}

impl From<Permissions> for Option<PermissionFlags> {
    fn from(value: Permissions) -> Self {
        value.granted()
    }
}

/// Admin-scoped action on a catalog resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Add,
    Edit,
    Delete,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Add, Action::Edit, Action::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(Action::Add),
            "edit" => Ok(Action::Edit),
            "delete" => Ok(Action::Delete),
            other => Err(format!("unknown permission '{}'", other)),
        }
    }
}

/// Catalog resources guarded by the authorization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resource {
    Topics,
    Materials,
    Tools,
    Categories,
    SourceCode,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Topics => "topics",
            Resource::Materials => "materials",
            Resource::Tools => "tools",
            Resource::Categories => "categories",
            Resource::SourceCode => "source-code",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topics" => Ok(Resource::Topics),
            "materials" => Ok(Resource::Materials),
            "tools" => Ok(Resource::Tools),
            "categories" => Ok(Resource::Categories),
            "source-code" => Ok(Resource::SourceCode),
            other => Err(format!("unknown resource '{}'", other)),
        }
    }
}

/// Public view of an account, as returned by `/api/auth/me` and the admin
/// user list. `is_seed` is derived from configuration, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub is_seed: bool,
    pub created_at: DateTime<Utc>,
}

impl UserView {
    pub fn is_admin(&self) -> bool {
        self.is_seed || self.role == Role::Admin
    }
}
