// handlers/elevated/mod.rs - Elevated handlers (admin JWT required)
//
// Security Level: JWT plus admin role; mutations additionally seed admin only
// Route Prefix: /api/admin/*
// Middleware: jwt_auth_middleware; role checks live in the admin service so
// the same policy functions decide both here and in the CLI workflow

pub mod admin;
