//! Backing store capability consumed by the gateway.

use crate::error::StoreError;
use gridwire_protocol::{EncodingType, Value};
use std::sync::Arc;

/// Optional type constraints on a region's keys and values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionAttributes {
    pub key_type: Option<EncodingType>,
    pub value_type: Option<EncodingType>,
}

impl RegionAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_type(mut self, key_type: EncodingType) -> Self {
        self.key_type = Some(key_type);
        self
    }

    pub fn with_value_type(mut self, value_type: EncodingType) -> Self {
        self.value_type = Some(value_type);
        self
    }
}

/// A named key/value namespace.
pub trait Region: Send + Sync {
    fn name(&self) -> &str;

    fn get(&self, key: &Value) -> Result<Option<Value>, StoreError>;

    fn put(&self, key: Value, value: Value) -> Result<(), StoreError>;

    /// Returns the pairs found for `keys`. Absent keys are omitted and a key
    /// requested twice is returned once.
    fn get_all(&self, keys: &[Value]) -> Result<Vec<(Value, Value)>, StoreError>;

    /// Removes `key`, returning the previous value if there was one.
    fn remove(&self, key: &Value) -> Result<Option<Value>, StoreError>;
}

/// Process-wide view of the regions.
pub trait Cache: Send + Sync {
    fn get_region(&self, name: &str) -> Option<Arc<dyn Region>>;

    /// Snapshot of the region names. No ordering guarantee.
    fn list_region_names(&self) -> Vec<String>;
}
