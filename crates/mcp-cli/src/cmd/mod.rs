pub mod deploy;
pub mod mcp;
pub mod serve;
pub mod task;
