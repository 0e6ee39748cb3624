// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Route Prefix: /api/*
// Middleware: jwt_auth_middleware inserts the AuthUser extension
pub mod assistant;
pub mod auth;
pub mod chats;
pub mod projects;
pub mod users;
