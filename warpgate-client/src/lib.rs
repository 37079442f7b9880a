//! Warpgate admin API client - session login, entity CRUD, role relations.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod wire;

pub use config::WarpgateConfig;
pub use error::{parse_identifier, ClientError};
pub use services::gateway::{Attach, Detach, WarpgateGateway};
pub use services::relations::RoleRelations;
pub use wire::DecodeError;
