//! Operation registry and dispatcher.
//!
//! The registry is built once before the first connection is accepted and is
//! read-only afterwards, so lookups need no locking.

use crate::context::ExecutionContext;
use crate::error::ServerError;
use crate::operations;
use gridwire_protocol::{Message, MessageKind, RequestKind, RequestMessage};
use std::collections::HashMap;
use std::sync::Arc;

/// Business logic bound to one request kind.
pub trait OperationHandler: Send + Sync + 'static {
    type Request: RequestMessage;

    fn handle(
        &self,
        request: Self::Request,
        ctx: &ExecutionContext,
    ) -> Result<<Self::Request as RequestMessage>::Response, ServerError>;
}

type ErasedHandler = Box<dyn Fn(&Message, &ExecutionContext) -> Result<Message, ServerError> + Send + Sync>;

/// A type-erased handler together with its request decoder and response
/// encoder.
pub struct OperationContext {
    kind: RequestKind,
    execute: ErasedHandler,
}

impl OperationContext {
    pub fn new<H: OperationHandler>(handler: H) -> Self {
        let kind = H::Request::KIND;
        let execute: ErasedHandler = Box::new(move |message, ctx| {
            let request: H::Request = message
                .parse_payload()
                .map_err(|e| ServerError::InvalidRequest(format!("{} payload: {}", kind, e)))?;
            let response = handler.handle(request, ctx)?;
            Ok(Message::response(message.correlation_id(), kind, &response)?)
        });
        Self { kind, execute }
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Decodes the request, runs the handler and encodes its result.
    pub fn execute(&self, message: &Message, ctx: &ExecutionContext) -> Result<Message, ServerError> {
        (self.execute)(message, ctx)
    }
}

impl std::fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationContext")
            .field("kind", &self.kind)
            .finish()
    }
}

/// Maps request kinds to their operation contexts.
#[derive(Debug, Default)]
pub struct OperationContextRegistry {
    contexts: HashMap<RequestKind, OperationContext>,
}

impl OperationContextRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in operation.
    pub fn with_default_operations() -> Self {
        let mut registry = Self::new();
        registry.register(operations::GetOperation);
        registry.register(operations::PutOperation);
        registry.register(operations::PutAllOperation);
        registry.register(operations::GetAllOperation);
        registry.register(operations::RemoveOperation);
        registry.register(operations::GetRegionNamesOperation);
        registry
    }

    /// Registers a handler, replacing any previous handler for its kind.
    pub fn register<H: OperationHandler>(&mut self, handler: H) {
        let context = OperationContext::new(handler);
        self.contexts.insert(context.kind(), context);
    }

    pub fn get(&self, kind: RequestKind) -> Option<&OperationContext> {
        self.contexts.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// Routes request messages to their operation contexts.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<OperationContextRegistry>,
}

impl Dispatcher {
    pub fn new(registry: OperationContextRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &OperationContextRegistry {
        &self.registry
    }

    /// Routes one request to its handler.
    pub fn dispatch(&self, message: &Message, ctx: &ExecutionContext) -> Result<Message, ServerError> {
        let kind = match message.kind() {
            MessageKind::Request(kind) => kind,
            other => {
                return Err(ServerError::InvalidRequest(format!(
                    "expected a request, got message kind {:#06x}",
                    other.code()
                )))
            }
        };

        let context = self
            .registry
            .get(kind)
            .ok_or(ServerError::HandlerNotRegistered(kind))?;
        context.execute(message, ctx)
    }

    /// Dispatches a request and turns any failure into an error response
    /// carrying the request's correlation id.
    pub fn process(&self, message: &Message, ctx: &ExecutionContext) -> Message {
        let correlation_id = message.correlation_id();
        match self.dispatch(message, ctx) {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    ServerError::HandlerNotRegistered(kind) => {
                        tracing::error!("[{}] No handler registered for {}", ctx.label(), kind);
                    }
                    ServerError::Security(_) => {
                        tracing::debug!("[{}] Request {} denied: {}", ctx.label(), correlation_id, e);
                    }
                    _ => {
                        tracing::warn!("[{}] Request {} failed: {}", ctx.label(), correlation_id, e);
                    }
                }
                Message::error(correlation_id, e.error_code(), e.to_string())
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(OperationContextRegistry::with_default_operations())
    }
}
