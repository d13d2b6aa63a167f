pub mod config;
pub mod domain;
pub mod error;
pub mod ids;
pub mod time;

pub use config::AppConfig;
pub use error::{AppError, ErrorCode};
