//! Model Context Protocol surface: JSON-RPC framing plus the tool registry.

pub mod protocol;
pub mod tools;

pub const SERVER_NAME: &str = "mattermost-mcp";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const INSTRUCTIONS: &str = "Mattermost MCP Server - Interact with Mattermost workspaces.

Available operations:
- List and browse channels
- Read channel message history
- Post messages and reply to threads
- Add emoji reactions
- List users and view profiles
- Monitor channels for specific topics

All channel and user IDs are Mattermost internal IDs.
";
