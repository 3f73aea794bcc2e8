//! In-memory cache backing the gateway in single-process deployments.

use crate::error::StoreError;
use crate::region::{Cache, Region, RegionAttributes};
use dashmap::DashMap;
use gridwire_protocol::{EncodingType, Value};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A region held in a locked hash map.
pub struct MemoryRegion {
    name: String,
    attributes: RegionAttributes,
    entries: RwLock<HashMap<Value, Value>>,
}

impl MemoryRegion {
    pub fn new(name: impl Into<String>, attributes: RegionAttributes) -> Self {
        Self {
            name: name.into(),
            attributes,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn attributes(&self) -> RegionAttributes {
        self.attributes
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn check(
        &self,
        role: &'static str,
        constraint: Option<EncodingType>,
        value: &Value,
    ) -> Result<(), StoreError> {
        match constraint {
            Some(expected) if value.encoding_type() != expected => {
                Err(StoreError::ConstraintViolation {
                    region: self.name.clone(),
                    role,
                    expected,
                    actual: value.encoding_type(),
                })
            }
            _ => Ok(()),
        }
    }

    fn check_key(&self, key: &Value) -> Result<(), StoreError> {
        self.check("key", self.attributes.key_type, key)
    }
}

impl Region for MemoryRegion {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &Value) -> Result<Option<Value>, StoreError> {
        self.check_key(key)?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: Value, value: Value) -> Result<(), StoreError> {
        self.check_key(&key)?;
        self.check("value", self.attributes.value_type, &value)?;
        self.entries.write().insert(key, value);
        Ok(())
    }

    fn get_all(&self, keys: &[Value]) -> Result<Vec<(Value, Value)>, StoreError> {
        for key in keys {
            self.check_key(key)?;
        }
        let entries = self.entries.read();
        let mut seen = HashSet::with_capacity(keys.len());
        Ok(keys
            .iter()
            .filter(|k| seen.insert(*k))
            .filter_map(|k| entries.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    fn remove(&self, key: &Value) -> Result<Option<Value>, StoreError> {
        self.check_key(key)?;
        Ok(self.entries.write().remove(key))
    }
}

/// Cache of named in-memory regions.
#[derive(Default)]
pub struct MemoryCache {
    regions: DashMap<String, Arc<MemoryRegion>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a region. Fails if the name is taken.
    pub fn create_region(
        &self,
        name: impl Into<String>,
        attributes: RegionAttributes,
    ) -> Result<Arc<MemoryRegion>, StoreError> {
        let name = name.into();
        match self.regions.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::RegionExists(name)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let region = Arc::new(MemoryRegion::new(name.clone(), attributes));
                slot.insert(region.clone());
                tracing::debug!("Created region '{}' ({:?})", name, attributes);
                Ok(region)
            }
        }
    }

    /// Adds a region with default attributes. A region that already exists
    /// is kept as it is.
    pub fn with_region(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.regions
            .entry(name.clone())
            .or_insert_with(|| Arc::new(MemoryRegion::new(name, RegionAttributes::default())));
        self
    }

    pub fn region(&self, name: &str) -> Option<Arc<MemoryRegion>> {
        self.regions.get(name).map(|r| r.value().clone())
    }
}

impl Cache for MemoryCache {
    fn get_region(&self, name: &str) -> Option<Arc<dyn Region>> {
        self.regions
            .get(name)
            .map(|r| r.value().clone() as Arc<dyn Region>)
    }

    fn list_region_names(&self) -> Vec<String> {
        self.regions.iter().map(|r| r.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_put_get_remove() {
        let region = MemoryRegion::new("r", RegionAttributes::default());
        region.put("k".into(), "v".into()).unwrap();
        assert_eq!(region.get(&"k".into()).unwrap(), Some("v".into()));
        assert_eq!(region.get(&"missing".into()).unwrap(), None);

        assert_eq!(region.remove(&"k".into()).unwrap(), Some("v".into()));
        // Removing an absent key is not an error.
        assert_eq!(region.remove(&"k".into()).unwrap(), None);
        assert!(region.is_empty());
    }

    #[test]
    fn test_value_constraint() {
        let attrs = RegionAttributes::new().with_value_type(EncodingType::String);
        let region = MemoryRegion::new("strings", attrs);

        region.put(Value::Int(1), "ok".into()).unwrap();
        let err = region.put(Value::Int(2), Value::Int(5)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::ConstraintViolation {
                role: "value",
                expected: EncodingType::String,
                actual: EncodingType::Int,
                ..
            }
        ));
        assert_eq!(region.len(), 1);
    }

    #[test]
    fn test_key_constraint_applies_to_reads() {
        let attrs = RegionAttributes::new().with_key_type(EncodingType::Long);
        let region = MemoryRegion::new("longs", attrs);

        assert!(region.get(&Value::Int(1)).is_err());
        assert!(region.get_all(&[Value::Long(1), Value::Int(2)]).is_err());
        assert!(region.get(&Value::Long(1)).unwrap().is_none());
    }

    #[test]
    fn test_get_all_omits_absent_keys() {
        let region = MemoryRegion::new("r", RegionAttributes::default());
        region.put("a".into(), Value::Int(1)).unwrap();
        region.put("b".into(), Value::Int(2)).unwrap();

        let found = region
            .get_all(&["b".into(), "zz".into(), "a".into()])
            .unwrap();
        assert_eq!(
            found,
            vec![("b".into(), Value::Int(2)), ("a".into(), Value::Int(1))]
        );
    }

    #[test]
    fn test_get_all_returns_each_key_once() {
        let region = MemoryRegion::new("r", RegionAttributes::default());
        region.put("a".into(), Value::Int(1)).unwrap();
        region.put("b".into(), Value::Int(2)).unwrap();

        let found = region
            .get_all(&["a".into(), "b".into(), "a".into(), "a".into()])
            .unwrap();
        assert_eq!(
            found,
            vec![("a".into(), Value::Int(1)), ("b".into(), Value::Int(2))]
        );
    }

    #[test]
    fn test_with_region_keeps_existing() {
        let cache = MemoryCache::new().with_region("a");
        cache
            .region("a")
            .unwrap()
            .put("k".into(), "v".into())
            .unwrap();

        let cache = cache.with_region("a");
        assert_eq!(cache.list_region_names(), vec!["a"]);
        assert_eq!(cache.region("a").unwrap().len(), 1);
    }

    #[test]
    fn test_cache_regions() {
        let cache = MemoryCache::new().with_region("one").with_region("two");
        cache
            .create_region("three", RegionAttributes::default())
            .unwrap();
        assert_eq!(
            cache.create_region("one", RegionAttributes::default()).err(),
            Some(StoreError::RegionExists("one".into()))
        );

        let mut names = cache.list_region_names();
        names.sort();
        assert_eq!(names, vec!["one", "three", "two"]);

        assert!(cache.get_region("two").is_some());
        assert!(cache.get_region("nope").is_none());
    }

    proptest! {
        #[test]
        fn prop_last_put_wins(key in ".{0,16}", values in proptest::collection::vec(any::<i64>(), 1..8)) {
            let region = MemoryRegion::new("r", RegionAttributes::default());
            for v in &values {
                region.put(Value::String(key.clone()), Value::Long(*v)).unwrap();
            }
            let last = *values.last().unwrap();
            prop_assert_eq!(region.get(&Value::String(key)).unwrap(), Some(Value::Long(last)));
        }
    }
}
