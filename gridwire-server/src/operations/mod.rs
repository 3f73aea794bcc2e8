//! Operation handlers, one per request kind.
//!
//! Handlers decode values only through the execution context's codec
//! registry and check authorization before touching the store.

mod get;
mod get_all;
mod put;
mod put_all;
mod region_names;
mod remove;

pub use get::GetOperation;
pub use get_all::GetAllOperation;
pub use put::PutOperation;
pub use put_all::PutAllOperation;
pub use region_names::GetRegionNamesOperation;
pub use remove::RemoveOperation;

use crate::context::ExecutionContext;
use crate::error::ServerError;
use gridwire_protocol::{EncodedValue, Value};
use gridwire_store::Region;
use std::sync::Arc;

fn lookup_region(ctx: &ExecutionContext, name: &str) -> Result<Arc<dyn Region>, ServerError> {
    ctx.cache()
        .get_region(name)
        .ok_or_else(|| ServerError::RegionNotFound(name.to_string()))
}

fn decode(ctx: &ExecutionContext, encoded: &EncodedValue) -> Result<Value, ServerError> {
    Ok(ctx.codecs().decode_value(encoded)?)
}

fn encode(ctx: &ExecutionContext, value: &Value) -> Result<EncodedValue, ServerError> {
    Ok(ctx.codecs().encode_value(value)?)
}

/// Runs the configured post-processor over a value about to be returned.
fn post_process(
    ctx: &ExecutionContext,
    region: &str,
    key: &Value,
    value: Value,
) -> Result<Value, ServerError> {
    let security = ctx.security();
    if !security.need_post_process() {
        return Ok(value);
    }
    Ok(security.post_process(ctx.principal(), region, key, value, false)?)
}
