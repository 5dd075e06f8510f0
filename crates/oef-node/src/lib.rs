//! # oef-node
//!
//! An Open Economic Framework node: a TCP server autonomous agents connect
//! to in order to advertise themselves and their services, search the
//! connected population with typed constraint queries, and exchange
//! point-to-point dialogue messages (including FIPA negotiation
//! payloads), with the node acting as a blind relay.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │                 Server                    │  owns runtime + acceptor
//! ├───────────────────────────────────────────┤
//! │              AgentSession                 │  handshake + dispatch loop
//! ├─────────────────────┬─────────────────────┤
//! │   AgentDirectory    │  ServiceDirectory   │  searchable state
//! ├─────────────────────┴─────────────────────┤
//! │         protocol (prost + framing)        │  length-prefixed frames
//! └───────────────────────────────────────────┘
//! ```
//!
//! The schema and query engine the directories search with lives in
//! [`oef_core`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod directory;
pub mod protocol;
pub mod server;
pub mod session;

pub use config::NodeConfig;
pub use directory::AgentDirectory;
pub use server::Server;
pub use session::AgentSession;
