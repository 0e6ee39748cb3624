pub mod chats;
pub mod messages;
pub mod projects;
pub mod system_config;
pub mod users;

pub use chats::ChatRepository;
pub use messages::MessageRepository;
pub use projects::ProjectRepository;
pub use system_config::PgConfigStore;
pub use users::UserRepository;
