pub mod admin_service;
pub mod auth_service;
pub mod catalog_service;

pub use admin_service::{AdminError, AdminService};
pub use auth_service::{AuthError, AuthService, AuthSession, ForgotPasswordOutcome};
pub use catalog_service::{CatalogError, CatalogInput, CatalogService};
