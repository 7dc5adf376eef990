pub mod config;
pub mod error;
pub mod text;
pub mod types;

pub use config::{ImportLimits, ServiceConfig};
pub use error::ImportError;
pub use types::*;
