//! Resource permissions of the form `RESOURCE:OPERATION[:REGION[:KEY]]`.
//!
//! `*` is a wildcard in every position and `ALL` is accepted for the resource
//! and operation. Omitted trailing parts match everything, so `DATA:READ`
//! grants reads on every region and `DATA:READ:orders` grants reads on every
//! key of `orders`.

use crate::error::SecurityError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    All,
    Cluster,
    Data,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::All => "*",
            Resource::Cluster => "CLUSTER",
            Resource::Data => "DATA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    All,
    Manage,
    Write,
    Read,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::All => "*",
            Operation::Manage => "MANAGE",
            Operation::Write => "WRITE",
            Operation::Read => "READ",
        }
    }
}

/// A permission required by an operation or granted to a principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourcePermission {
    pub resource: Resource,
    pub operation: Operation,
    /// `None` matches every region.
    pub region: Option<String>,
    /// `None` matches every key.
    pub key: Option<String>,
}

impl ResourcePermission {
    pub fn new(resource: Resource, operation: Operation) -> Self {
        Self {
            resource,
            operation,
            region: None,
            key: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn data_read() -> Self {
        Self::new(Resource::Data, Operation::Read)
    }

    pub fn data_write() -> Self {
        Self::new(Resource::Data, Operation::Write)
    }

    pub fn cluster_manage() -> Self {
        Self::new(Resource::Cluster, Operation::Manage)
    }

    /// Read access to a region, optionally narrowed to one key.
    pub fn region_read(region: &str, key: Option<&str>) -> Self {
        let permission = Self::data_read().with_region(region);
        match key {
            Some(k) => permission.with_key(k),
            None => permission,
        }
    }

    /// Write access to a region, optionally narrowed to one key.
    pub fn region_write(region: &str, key: Option<&str>) -> Self {
        let permission = Self::data_write().with_region(region);
        match key {
            Some(k) => permission.with_key(k),
            None => permission,
        }
    }

    /// Returns whether holding `self` grants `required`.
    pub fn implies(&self, required: &ResourcePermission) -> bool {
        let resource = self.resource == Resource::All || self.resource == required.resource;
        let operation = self.operation == Operation::All || self.operation == required.operation;
        resource
            && operation
            && part_implies(&self.region, &required.region)
            && part_implies(&self.key, &required.key)
    }
}

fn part_implies(granted: &Option<String>, required: &Option<String>) -> bool {
    match granted {
        None => true,
        Some(g) => required.as_ref() == Some(g),
    }
}

fn wildcard(part: &str) -> Option<String> {
    if part == "*" {
        None
    } else {
        Some(part.to_string())
    }
}

impl FromStr for ResourcePermission {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SecurityError::Config(format!("invalid permission '{}'", s));
        let parts: Vec<&str> = s.trim().split(':').map(str::trim).collect();
        if parts.is_empty() || parts.len() > 4 || parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }

        let resource = match parts[0].to_ascii_uppercase().as_str() {
            "*" | "ALL" => Resource::All,
            "CLUSTER" => Resource::Cluster,
            "DATA" => Resource::Data,
            _ => return Err(invalid()),
        };
        let operation = match parts.get(1).map(|p| p.to_ascii_uppercase()) {
            None => Operation::All,
            Some(op) => match op.as_str() {
                "*" | "ALL" => Operation::All,
                "MANAGE" => Operation::Manage,
                "WRITE" => Operation::Write,
                "READ" => Operation::Read,
                _ => return Err(invalid()),
            },
        };

        Ok(Self {
            resource,
            operation,
            region: parts.get(2).and_then(|p| wildcard(p)),
            key: parts.get(3).and_then(|p| wildcard(p)),
        })
    }
}

impl fmt::Display for ResourcePermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource.as_str(), self.operation.as_str())?;
        match (&self.region, &self.key) {
            (None, None) => Ok(()),
            (Some(r), None) => write!(f, ":{}", r),
            (r, Some(k)) => write!(f, ":{}:{}", r.as_deref().unwrap_or("*"), k),
        }
    }
}

/// Parses a comma separated list of permissions.
pub fn parse_permissions(list: &str) -> Result<Vec<ResourcePermission>, SecurityError> {
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::parse)
        .collect()
}
