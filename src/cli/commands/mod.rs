pub mod contexts;
pub mod server;
pub mod system;
