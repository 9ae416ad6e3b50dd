// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition, password recovery and service metadata.
//
// Security Level: None
// Route Prefix: /api/auth/* plus / and /health
// Middleware: None

pub mod auth;
pub mod system;
