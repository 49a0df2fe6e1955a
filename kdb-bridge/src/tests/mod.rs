//! Engine tests driven by an in-memory MCP server and a scripted model.
//!
//! Nothing here touches the network.

mod discovery;
mod support;
