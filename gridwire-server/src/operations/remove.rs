use super::{decode, lookup_region};
use crate::context::ExecutionContext;
use crate::error::ServerError;
use crate::registry::OperationHandler;
use gridwire_protocol::{RemoveRequest, RemoveResponse};

/// Removes one key. Removing an absent key succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoveOperation;

impl OperationHandler for RemoveOperation {
    type Request = RemoveRequest;

    fn handle(
        &self,
        request: RemoveRequest,
        ctx: &ExecutionContext,
    ) -> Result<RemoveResponse, ServerError> {
        let key = decode(ctx, &request.key)?;
        ctx.security().authorize_region_write(
            ctx.principal(),
            &request.region_name,
            Some(&key.to_string()),
        )?;

        let region = lookup_region(ctx, &request.region_name)?;
        let previous = region.remove(&key)?;
        tracing::debug!(
            "[{}] remove {}[{}] existed={}",
            ctx.label(),
            request.region_name,
            key,
            previous.is_some()
        );
        Ok(RemoveResponse {})
    }
}
