pub mod cli;
pub mod config;
pub mod error;
pub mod scripts;
pub mod tmux;

pub use error::{Error, Result};

/// Version of tss
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
