//! # gridwire-server
//!
//! TCP gateway for gridwire.
//!
//! This crate provides:
//! - TCP accept loop with protocol selection and connection limits
//! - Version and mechanism negotiation followed by PLAIN authentication
//! - Per-connection request loop with idle timeouts and frame limits
//! - Operation registry and dispatch for the region operations
//! - Authorization and post-processing through the security service
//! - YAML configuration with environment overrides

pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod handshake;
pub mod operations;
pub mod registry;
pub mod server;

pub use config::{Config, ConfigError, NetworkConfig, RegionConfig, SecurityConfig};
pub use connection::{Connection, ConnectionConfig, ConnectionState};
pub use context::ExecutionContext;
pub use error::ServerError;
pub use handshake::{
    perform_handshake, AuthStep, Handshake, HandshakeState, MechanismAuthenticator,
    PlainAuthenticator, PlainCredentials,
};
pub use registry::{Dispatcher, OperationContext, OperationContextRegistry, OperationHandler};
pub use server::{Server, ServerConfig, ServerStats};
