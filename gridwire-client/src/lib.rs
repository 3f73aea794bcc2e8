//! # gridwire-client
//!
//! Client library for the gridwire gateway.
//!
//! This crate provides:
//! - Async TCP connection with protocol selection and frame I/O
//! - Handshake and PLAIN authentication
//! - Typed API for every region operation

pub mod client;
pub mod connection;
pub mod error;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
