pub mod config;
pub mod error;
pub mod types;

pub use config::ServiceConfig;
pub use error::{error_code, ServiceError};
pub use types::{new_id, now_rfc3339, Page};
