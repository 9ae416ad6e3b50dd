// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Security Level: JWT Authentication Required
// Route Prefix: /api/auth/me, /api/catalog/*
// Middleware: jwt_auth_middleware injects AuthUser, reloaded from the store

pub mod auth; // Current user
pub mod catalog; // Topics, materials, tools, categories, source code
