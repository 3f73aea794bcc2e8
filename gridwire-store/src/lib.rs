//! # gridwire-store
//!
//! Backing store capability for the gridwire gateway.
//!
//! The gateway consumes regions through the [`Cache`] and [`Region`] traits
//! and never creates them. [`MemoryCache`] is the in-process implementation
//! used by the server binary and tests.

pub mod error;
pub mod memory;
pub mod region;

pub use error::StoreError;
pub use memory::{MemoryCache, MemoryRegion};
pub use region::{Cache, Region, RegionAttributes};
