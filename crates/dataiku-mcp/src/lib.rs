//! MCP (Model Context Protocol) server for Dataiku DSS
//!
//! Exposes project management on a DSS instance (datasets, recipes,
//! scenarios, jobs and project configuration) as MCP tools, plus two
//! read-only resources describing projects.
//!
//! # Architecture
//!
//! - `server`: shared state holding the lazily connected DSS client
//! - `tools`: tool implementations, one submodule per object family
//! - `handler`: rmcp routing of tools and resources
//! - `resources`: `projects://` and `project://{project_key}`
//! - `error`: the error envelope every tool answers with on failure
//! - `flow`, `matcher`, `patch`, `syntax`: helpers shared by several tools
//!
//! # Transport
//!
//! The binary speaks MCP over stdio by default, or streamable HTTP. All
//! logging goes to stderr so stdout stays reserved for the protocol.

pub mod error;
pub mod flow;
pub mod handler;
pub mod logging;
pub mod matcher;
pub mod patch;
pub mod resources;
pub mod server;
pub mod syntax;
pub mod tools;
pub mod types;

pub use error::{Error, Result};
pub use handler::DataikuMcpServer;
pub use server::McpServerState;
