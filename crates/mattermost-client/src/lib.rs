//! Async client for the Mattermost REST API (v4).

pub mod client;
pub mod error;

pub use client::{normalize_base_url, MattermostClient};
pub use error::MattermostError;

pub type Result<T> = std::result::Result<T, MattermostError>;
