pub mod ai;
pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod governor;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod storage;
pub mod validators;

pub use app::{router, AppState};
