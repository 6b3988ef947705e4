pub mod config;
pub mod cron;
pub mod deploy;
pub mod envfile;
pub mod error;
pub mod io;
pub mod models;
pub mod paths;
pub mod restart;
pub mod state;
pub mod template;

pub use error::{McpError, Result};
