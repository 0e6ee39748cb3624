pub mod contexts;
pub mod projects;
pub mod system;
pub mod users;
