use super::{decode, encode, lookup_region, post_process};
use crate::context::ExecutionContext;
use crate::error::ServerError;
use crate::registry::OperationHandler;
use gridwire_protocol::{Entry, GetAllRequest, GetAllResponse};

/// Reads a batch of keys. Absent keys are omitted from the result; any key
/// that fails to decode fails the request.
#[derive(Debug, Default, Clone, Copy)]
pub struct GetAllOperation;

impl OperationHandler for GetAllOperation {
    type Request = GetAllRequest;

    fn handle(
        &self,
        request: GetAllRequest,
        ctx: &ExecutionContext,
    ) -> Result<GetAllResponse, ServerError> {
        let keys = request
            .keys
            .iter()
            .map(|k| decode(ctx, k))
            .collect::<Result<Vec<_>, _>>()?;

        for key in &keys {
            ctx.security().authorize_region_read(
                ctx.principal(),
                &request.region_name,
                Some(&key.to_string()),
            )?;
        }

        let region = lookup_region(ctx, &request.region_name)?;
        let mut entries = Vec::new();
        for (key, value) in region.get_all(&keys)? {
            let value = post_process(ctx, &request.region_name, &key, value)?;
            entries.push(Entry::new(encode(ctx, &key)?, encode(ctx, &value)?));
        }

        tracing::debug!(
            "[{}] getAll {} requested={} found={}",
            ctx.label(),
            request.region_name,
            keys.len(),
            entries.len()
        );
        Ok(GetAllResponse { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::test_support::*;
    use gridwire_protocol::{EncodedValue, ErrorCode, Value};

    fn get_all(region: &str, keys: Vec<EncodedValue>) -> GetAllRequest {
        GetAllRequest {
            region_name: region.into(),
            keys,
        }
    }

    #[test]
    fn test_get_all_returns_found_pairs() {
        let cache = cache();
        let region = cache.region("r").unwrap();
        for (k, v) in [("a", 1i32), ("b", 2), ("c", 3)] {
            region.put(Value::from(k), Value::from(v)).unwrap();
        }
        let ctx = context(cache);

        let response = run(
            &GetAllOperation,
            get_all("r", vec![enc("c"), enc("missing"), enc("a"), enc("b")]),
            &ctx,
        )
        .unwrap();

        let mut entries = response.entries;
        entries.sort_by(|x, y| x.key.value.cmp(&y.key.value));
        assert_eq!(
            entries,
            vec![
                Entry::new(enc("a"), enc(1i32)),
                Entry::new(enc("b"), enc(2i32)),
                Entry::new(enc("c"), enc(3i32)),
            ]
        );
    }

    #[test]
    fn test_get_all_invalid_key_fails_request() {
        let ctx = context(cache());
        let bad = EncodedValue {
            encoding_type: 99,
            value: vec![],
        };
        let err = run(&GetAllOperation, get_all("r", vec![enc("a"), bad]), &ctx).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::UnsupportedEncoding);
    }

    #[test]
    fn test_get_all_missing_region() {
        let ctx = context(cache());
        let err = run(&GetAllOperation, get_all("nope", vec![enc("a")]), &ctx).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::RegionNotFound);
    }

    #[test]
    fn test_get_all_empty() {
        let ctx = context(cache());
        let response = run(&GetAllOperation, get_all("r", vec![]), &ctx).unwrap();
        assert!(response.entries.is_empty());
    }
}
