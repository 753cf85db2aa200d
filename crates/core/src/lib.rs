// CFM-ID Wrapper Core - Domain Logic & Ports
// NO process/filesystem/HTTP adapters

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
