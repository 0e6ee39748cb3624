// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Service info, health probe and token acquisition.
pub mod auth;
pub mod health;
