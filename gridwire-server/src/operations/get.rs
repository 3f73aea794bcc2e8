use super::{decode, encode, lookup_region, post_process};
use crate::context::ExecutionContext;
use crate::error::ServerError;
use crate::registry::OperationHandler;
use gridwire_protocol::{GetRequest, GetResponse};

/// Reads one key. A missing key is an empty result, not an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct GetOperation;

impl OperationHandler for GetOperation {
    type Request = GetRequest;

    fn handle(&self, request: GetRequest, ctx: &ExecutionContext) -> Result<GetResponse, ServerError> {
        let key = decode(ctx, &request.key)?;
        ctx.security().authorize_region_read(
            ctx.principal(),
            &request.region_name,
            Some(&key.to_string()),
        )?;

        let region = lookup_region(ctx, &request.region_name)?;
        let result = match region.get(&key)? {
            Some(value) => {
                let value = post_process(ctx, &request.region_name, &key, value)?;
                Some(encode(ctx, &value)?)
            }
            None => None,
        };

        tracing::debug!(
            "[{}] get {}[{}] hit={}",
            ctx.label(),
            request.region_name,
            key,
            result.is_some()
        );
        Ok(GetResponse { result })
    }
}
