// Medical appointment scheduling backend: identities, appointments,
// directory reads and the assistant chat, exposed over actix-web.

pub mod config;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod logger;
pub mod middleware;
pub mod models;
pub mod schema;
pub mod services;
pub mod store;

// Re-export common types
pub use crate::config::{AppConfig, DbPool};
pub use crate::errors::ApiError;
pub use crate::gateway::{AssistantGateway, HuggingFaceGateway};
pub use crate::store::{MemoryStore, PgStore, SharedStore, Store};
