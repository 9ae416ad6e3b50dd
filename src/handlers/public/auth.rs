// handlers/public/auth.rs - token acquisition and password recovery

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{AuthSession, ForgotPasswordOutcome};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /api/auth/login
pub async fn login_post(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<AuthSession> {
    let Json(body) = payload?;
    let session = state.auth_service().login(&body.email, &body.password).await?;
    Ok(ApiResponse::success(session))
}

/// POST /api/auth/signup
pub async fn signup_post(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<AuthSession> {
    let Json(body) = payload?;
    let session = state
        .auth_service()
        .signup(&body.name, &body.email, &body.password)
        .await?;
    Ok(ApiResponse::created(session))
}

/// POST /api/auth/forgot-password. Same answer whether or not the account exists.
pub async fn forgot_password_post(
    State(state): State<AppState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> ApiResult<ForgotPasswordOutcome> {
    let Json(body) = payload?;
    let outcome = state.auth_service().forgot_password(&body.email).await?;
    Ok(ApiResponse::success(outcome))
}

/// POST /api/auth/reset-password
pub async fn reset_password_post(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    let Json(body) = payload?;
    state
        .auth_service()
        .reset_password(&body.token, &body.password)
        .await?;
    Ok(ApiResponse::success(MessageResponse {
        message: "Password has been reset".to_string(),
    }))
}
