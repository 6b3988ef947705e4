//! `claude-client`: a small async client for the Anthropic Messages API.
//!
//! Only what the topic monitor needs: one user prompt in, text out.
//!
//! ```rust,ignore
//! let client = ClaudeClient::new(api_key)?;
//! let text = client.complete("claude-sonnet-4-20250514", 1000, "Hello").await?;
//! ```

pub mod client;
pub mod error;
pub mod types;

#[cfg(test)]
mod tests;

pub use client::{ClaudeClient, ANTHROPIC_VERSION, DEFAULT_BASE_URL};
pub use error::ClaudeError;
pub use types::{ContentBlock, InputMessage, MessagesRequest, MessagesResponse, Role, Usage};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ClaudeError>;
