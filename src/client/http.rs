use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::client::{AdminApi, ClientError};
use crate::services::{AuthSession, ForgotPasswordOutcome};
use crate::types::{PermissionFlags, UserView};

/// reqwest-based client for the AI Locker API.
#[derive(Clone)]
pub struct LockerClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl LockerClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ClientError::Network(format!("Failed to create client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            http,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Logs in and keeps the returned token for later calls.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<AuthSession, ClientError> {
        let body = json!({ "email": email, "password": password });
        let session: AuthSession = self.send(self.request(Method::POST, "/api/auth/login").json(&body)).await?;
        self.token = Some(session.token.clone());
        Ok(session)
    }

    pub async fn signup(&mut self, name: &str, email: &str, password: &str) -> Result<AuthSession, ClientError> {
        let body = json!({ "name": name, "email": email, "password": password });
        let session: AuthSession = self.send(self.request(Method::POST, "/api/auth/signup").json(&body)).await?;
        self.token = Some(session.token.clone());
        Ok(session)
    }

    pub fn logout(&mut self) {
        self.token = None;
    }

    pub async fn forgot_password(&self, email: &str) -> Result<ForgotPasswordOutcome, ClientError> {
        let body = json!({ "email": email });
        self.send(self.request(Method::POST, "/api/auth/forgot-password").json(&body))
            .await
    }

    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), ClientError> {
        let body = json!({ "token": token, "password": password });
        let _: Value = self
            .send(self.request(Method::POST, "/api/auth/reset-password").json(&body))
            .await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        if self.token.is_none() {
            return Err(ClientError::NotAuthenticated);
        }
        Ok(self.request(method, path))
    }

    /// Sends a request and unwraps the `{success, data}` envelope.
    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;
        decode_envelope(status.as_u16(), &text)
    }
}

fn decode_envelope<T: DeserializeOwned>(status: u16, text: &str) -> Result<T, ClientError> {
    let body: Value = serde_json::from_str(text).map_err(|_| {
        if (200..300).contains(&status) {
            ClientError::Decode(format!("non-JSON body: {}", text))
        } else {
            ClientError::Api {
                status,
                code: "HTTP_ERROR".to_string(),
                message: text.trim().to_string(),
            }
        }
    })?;

    if body.get("success").and_then(Value::as_bool) == Some(true) {
        let data = body.get("data").cloned().unwrap_or(Value::Null);
        return serde_json::from_value(data).map_err(|e| ClientError::Decode(e.to_string()));
    }

    let message = body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("Request failed")
        .to_string();
    let code = body
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or("HTTP_ERROR")
        .to_string();
    Err(ClientError::Api { status, code, message })
}

#[async_trait]
impl AdminApi for LockerClient {
    async fn current_user(&self) -> Result<UserView, ClientError> {
        self.send(self.authed(Method::GET, "/api/auth/me")?).await
    }

    async fn list_users(&self, order_by: Option<&str>) -> Result<Vec<UserView>, ClientError> {
        let mut req = self.authed(Method::GET, "/api/admin/users")?;
        if let Some(order) = order_by {
            req = req.query(&[("orderBy", order)]);
        }
        self.send(req).await
    }

    async fn make_admin(
        &self,
        user_id: Uuid,
        permissions: Option<PermissionFlags>,
    ) -> Result<UserView, ClientError> {
        let mut req = self.authed(Method::PUT, &format!("/api/admin/make-admin/{}", user_id))?;
        if let Some(flags) = permissions {
            req = req.json(&json!({ "permissions": flags }));
        }
        self.send(req).await
    }

    async fn revoke_admin(&self, user_id: Uuid) -> Result<UserView, ClientError> {
        self.send(self.authed(Method::PUT, &format!("/api/admin/revoke-admin/{}", user_id))?)
            .await
    }

    async fn update_permissions(
        &self,
        user_id: Uuid,
        permissions: PermissionFlags,
    ) -> Result<UserView, ClientError> {
        let req = self
            .authed(Method::PUT, &format!("/api/admin/permissions/{}", user_id))?
            .json(&json!({ "permissions": permissions }));
        self.send(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_success_envelope() {
        let flags: PermissionFlags =
            decode_envelope(200, r#"{"success":true,"data":{"add":true,"edit":false,"delete":false}}"#).unwrap();
        assert_eq!(flags, PermissionFlags::new(true, false, false));
    }

    #[test]
    fn surfaces_server_error_message_and_code() {
        let err = decode_envelope::<Value>(
            403,
            r#"{"success":false,"error":"The seed admin cannot be modified","code":"FORBIDDEN"}"#,
        )
        .unwrap_err();
        match err {
            ClientError::Api { status, code, message } => {
                assert_eq!(status, 403);
                assert_eq!(code, "FORBIDDEN");
                assert_eq!(message, "The seed admin cannot be modified");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn plain_text_errors_are_kept() {
        let err = decode_envelope::<Value>(502, "Bad Gateway").unwrap_err();
        assert_eq!(err.to_string(), "Bad Gateway");
    }

    #[tokio::test]
    async fn admin_calls_need_a_token() {
        let client = LockerClient::new("http://127.0.0.1:9").unwrap();
        assert!(matches!(client.current_user().await, Err(ClientError::NotAuthenticated)));
    }
}
