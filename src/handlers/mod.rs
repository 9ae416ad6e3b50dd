// handlers/mod.rs - 3-Tier Handler Architecture
//
// Public (no auth) → Protected (JWT auth) → Elevated (admin / seed admin)
pub mod elevated; // Tier 3: admin user list and seed-only role/permission changes (/api/admin/*)
pub mod protected; // Tier 2: JWT authentication required (/api/auth/me, /api/catalog/*)
pub mod public; // Tier 1: No authentication required (/, /health, /api/auth/*)

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Parses an optional JSON body; an empty body yields `None`.
pub(crate) fn optional_json<T: DeserializeOwned>(body: &Bytes) -> Result<Option<T>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ApiError::InvalidJson(format!("Failed to parse the request body as JSON: {}", e)))
}
