// handlers/elevated/mod.rs - Elevated handlers (admin JWT required)
//
// Route Prefix: /api/admin/*
// Middleware: jwt_auth_middleware, then require_admin
pub mod admin;
