pub mod chat;
pub mod message;
pub mod project;
pub mod user;

pub use chat::{AssistantKind, Chat, ChatDetail, ChatSummary};
pub use message::{Message, NewMessage};
pub use project::{NewProject, Project, ProjectDetail, ProjectMember};
pub use user::{NewUser, User, UserRow, UserUpdate};
