use super::{decode, encode, lookup_region};
use crate::context::ExecutionContext;
use crate::error::ServerError;
use crate::registry::OperationHandler;
use gridwire_protocol::{EncodedValue, PutAllRequest, PutAllResponse};

/// Writes a batch of entries.
///
/// Every entry is decoded and authorized before the first write, so a bad
/// entry fails the whole request with nothing written. Writes are then
/// applied one by one and a rejected write only marks its key invalid.
#[derive(Debug, Default, Clone, Copy)]
pub struct PutAllOperation;

impl OperationHandler for PutAllOperation {
    type Request = PutAllRequest;

    fn handle(
        &self,
        request: PutAllRequest,
        ctx: &ExecutionContext,
    ) -> Result<PutAllResponse, ServerError> {
        let mut decoded = Vec::with_capacity(request.entries.len());
        for entry in &request.entries {
            let key = decode(ctx, &entry.key)?;
            let value = decode(ctx, &entry.value)?;
            decoded.push((key, value, &entry.key));
        }

        for (key, _, _) in &decoded {
            ctx.security().authorize_region_write(
                ctx.principal(),
                &request.region_name,
                Some(&key.to_string()),
            )?;
        }

        let region = lookup_region(ctx, &request.region_name)?;

        let mut invalid_keys = Vec::new();
        for (key, value, original) in decoded {
            if let Err(e) = region.put(key.clone(), value) {
                tracing::debug!(
                    "[{}] putAll {}[{}] rejected: {}",
                    ctx.label(),
                    request.region_name,
                    key,
                    e
                );
                invalid_keys.push(reencode_key(ctx, &key, original));
            }
        }

        tracing::debug!(
            "[{}] putAll {} entries={} invalid={}",
            ctx.label(),
            request.region_name,
            request.entries.len(),
            invalid_keys.len()
        );
        Ok(PutAllResponse { invalid_keys })
    }
}

/// Encodes a rejected key for the response, falling back to the bytes the
/// client sent.
fn reencode_key(ctx: &ExecutionContext, key: &gridwire_protocol::Value, original: &EncodedValue) -> EncodedValue {
    match encode(ctx, key) {
        Ok(encoded) => encoded,
        Err(e) => {
            tracing::error!(
                "[{}] Failed to re-encode decoded key {}: {}",
                ctx.label(),
                key,
                e
            );
            original.clone()
        }
    }
}
