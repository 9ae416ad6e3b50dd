use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, SecurityConfig};
use crate::database::Stores;
use crate::handlers::{elevated, protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::services::{AdminService, AuthService, CatalogService};

/// Shared by every handler. Configuration is passed in rather than read from
/// the global so tests can run several differently-configured apps.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub stores: Stores,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, stores: Stores) -> Self {
        Self { config, stores }
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(self.stores.users.clone(), self.config.clone())
    }

    pub fn admin_service(&self) -> AdminService {
        AdminService::new(self.stores.users.clone(), self.config.clone())
    }

    pub fn catalog_service(&self) -> CatalogService {
        CatalogService::new(self.stores.catalog.clone())
    }
}

pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .merge(auth_routes())
        .merge(catalog_routes())
        .merge(admin_routes())
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    let mut router = Router::new()
        // Public
        .route("/", get(public::system::root))
        .route("/health", get(public::system::health))
        .merge(auth_public_routes())
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes));

    if state.config.security.enable_cors {
        router = router.layer(cors_layer(&state.config.security));
    }
    if state.config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/api/auth/login", post(auth::login_post))
        .route("/api/auth/signup", post(auth::signup_post))
        .route("/api/auth/forgot-password", post(auth::forgot_password_post))
        .route("/api/auth/reset-password", post(auth::reset_password_post))
}

fn auth_routes() -> Router<AppState> {
    Router::new().route("/api/auth/me", get(protected::auth::me_get))
}

fn catalog_routes() -> Router<AppState> {
    use protected::catalog;

    Router::new()
        .route(
            "/api/catalog/:resource",
            get(catalog::list_get).post(catalog::create_post),
        )
        .route(
            "/api/catalog/:resource/:id",
            get(catalog::item_get)
                .put(catalog::item_put)
                .delete(catalog::item_delete),
        )
}

fn admin_routes() -> Router<AppState> {
    use elevated::admin;

    Router::new()
        .route("/api/admin/users", get(admin::users_get))
        .route("/api/admin/make-admin/:id", put(admin::make_admin_put))
        .route("/api/admin/revoke-admin/:id", put(admin::revoke_admin_put))
        .route("/api/admin/permissions/:id", put(admin::permissions_put))
}

/// `*` in the origin list allows any origin.
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origin = if security.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = security
            .cors_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
