use crate::context::ExecutionContext;
use crate::error::ServerError;
use crate::registry::OperationHandler;
use gridwire_protocol::{GetRegionNamesRequest, GetRegionNamesResponse};

#[derive(Debug, Default, Clone, Copy)]
pub struct GetRegionNamesOperation;

impl OperationHandler for GetRegionNamesOperation {
    type Request = GetRegionNamesRequest;

    fn handle(
        &self,
        _request: GetRegionNamesRequest,
        ctx: &ExecutionContext,
    ) -> Result<GetRegionNamesResponse, ServerError> {
        ctx.security().authorize_data_read(ctx.principal())?;
        Ok(GetRegionNamesResponse {
            regions: ctx.cache().list_region_names(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::test_support::*;
    use gridwire_protocol::ErrorCode;

    #[test]
    fn test_region_names_snapshot() {
        let ctx = context(cache());
        let mut regions = run(&GetRegionNamesOperation, GetRegionNamesRequest {}, &ctx)
            .unwrap()
            .regions;
        regions.sort();
        assert_eq!(regions, vec!["r", "strings"]);
    }

    #[test]
    fn test_region_names_requires_read() {
        let anonymous = context_with(cache(), secured_service(None));
        let err = run(&GetRegionNamesOperation, GetRegionNamesRequest {}, &anonymous).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::NotAuthorized);

        let reader = secured(cache(), "reader", None);
        assert!(run(&GetRegionNamesOperation, GetRegionNamesRequest {}, &reader).is_ok());
    }
}
