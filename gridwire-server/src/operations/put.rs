use super::{decode, lookup_region};
use crate::context::ExecutionContext;
use crate::error::ServerError;
use crate::registry::OperationHandler;
use gridwire_protocol::{PutRequest, PutResponse};

#[derive(Debug, Default, Clone, Copy)]
pub struct PutOperation;

impl OperationHandler for PutOperation {
    type Request = PutRequest;

    fn handle(&self, request: PutRequest, ctx: &ExecutionContext) -> Result<PutResponse, ServerError> {
        let key = decode(ctx, &request.entry.key)?;
        let value = decode(ctx, &request.entry.value)?;
        ctx.security().authorize_region_write(
            ctx.principal(),
            &request.region_name,
            Some(&key.to_string()),
        )?;

        let region = lookup_region(ctx, &request.region_name)?;
        tracing::debug!("[{}] put {}[{}]", ctx.label(), request.region_name, key);
        region.put(key, value)?;
        Ok(PutResponse {})
    }
}
