pub mod actor;
pub mod config;
pub mod error;
pub mod types;

pub use actor::Actor;
pub use config::ServiceConfig;
pub use error::ServiceError;
pub use types::{ListParams, ListResult, merge_patch, new_id, now_rfc3339};
