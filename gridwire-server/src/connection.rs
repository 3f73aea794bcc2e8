//! Per-connection handler.
//!
//! A connection moves `Accepted -> Handshaking -> Serving -> Closed`; the
//! handshake step only runs when the security service requires client
//! authentication. Requests on one connection are processed strictly one at
//! a time.

use crate::context::ExecutionContext;
use crate::error::ServerError;
use crate::handshake::{perform_handshake, Handshake};
use crate::registry::Dispatcher;
use crate::server::ServerStats;
use gridwire_protocol::{
    decode_envelope, read_frame, write_frame, Encoder, ErrorCode, Message, ProtocolError,
    MAX_FRAME_SIZE,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    Handshaking,
    Serving,
    Closed,
}

/// Limits applied to every connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub max_frame_bytes: usize,
    /// `None` disables the idle timeout.
    pub idle_timeout: Option<Duration>,
    pub handshake_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: MAX_FRAME_SIZE,
            idle_timeout: Some(Duration::from_secs(300)),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// One client connection.
pub struct Connection<S> {
    stream: S,
    ctx: ExecutionContext,
    dispatcher: Dispatcher,
    config: ConnectionConfig,
    stats: Arc<ServerStats>,
    state: ConnectionState,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        ctx: ExecutionContext,
        dispatcher: Dispatcher,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            stream,
            ctx,
            dispatcher,
            config,
            stats: Arc::new(ServerStats::default()),
            state: ConnectionState::Accepted,
        }
    }

    pub fn with_stats(mut self, stats: Arc<ServerStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Runs the connection until the peer closes, a fatal error occurs or
    /// shutdown is signalled. The stream is closed on every exit path.
    pub async fn run(mut self, shutdown: &mut broadcast::Receiver<()>) -> Result<(), ServerError> {
        let label = self.ctx.label();
        let result = self.drive(shutdown).await;
        self.state = ConnectionState::Closed;
        let _ = self.stream.shutdown().await;

        match &result {
            Ok(()) => tracing::debug!("[{}] Connection closed", label),
            Err(e) => tracing::debug!("[{}] Connection closed: {}", label, e),
        }
        result
    }

    async fn drive(&mut self, shutdown: &mut broadcast::Receiver<()>) -> Result<(), ServerError> {
        if self.ctx.security().is_client_security_required() {
            self.state = ConnectionState::Handshaking;
            tokio::select! {
                result = self.handshake() => result?,
                _ = shutdown.recv() => return Err(ServerError::ShuttingDown),
            }
        }

        self.state = ConnectionState::Serving;
        self.serve(shutdown).await
    }

    async fn handshake(&mut self) -> Result<(), ServerError> {
        let label = self.ctx.label();
        let mut handshake = Handshake::new(self.ctx.security_handle());
        let exchange = perform_handshake(&mut self.stream, &mut handshake, self.config.max_frame_bytes);

        match tokio::time::timeout(self.config.handshake_timeout, exchange).await {
            Ok(Ok(principal)) => {
                tracing::info!("[{}] Authenticated as {}", label, principal);
                self.ctx.set_principal(principal);
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::warn!("[{}] Handshake failed: {}", label, e);
                self.stats.auth_failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
            Err(_) => {
                tracing::warn!("[{}] Handshake timed out", label);
                self.stats.auth_failures.fetch_add(1, Ordering::Relaxed);
                Err(ServerError::HandshakeTimeout)
            }
        }
    }

    async fn serve(&mut self, shutdown: &mut broadcast::Receiver<()>) -> Result<(), ServerError> {
        let label = self.ctx.label();
        let max = self.config.max_frame_bytes;

        loop {
            let frame = tokio::select! {
                result = read_frame(&mut self.stream, max) => result,
                _ = idle(self.config.idle_timeout) => {
                    tracing::debug!("[{}] Idle timeout", label);
                    return Ok(());
                }
                _ = shutdown.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", label);
                    return Err(ServerError::ShuttingDown);
                }
            };

            let body = match frame {
                Ok(Some(body)) => body,
                Ok(None) => {
                    tracing::debug!("[{}] Connection closed by client", label);
                    return Ok(());
                }
                Err(e) => {
                    self.fail(0, &e).await;
                    return Err(e.into());
                }
            };

            let message = match decode_envelope(&body) {
                Ok(message) => message,
                Err(ProtocolError::UnknownMessageKind {
                    correlation_id,
                    kind,
                }) => {
                    tracing::warn!(
                        "[{}] Unknown message kind {:#06x} (id={})",
                        label,
                        kind,
                        correlation_id
                    );
                    self.stats.errors_total.fetch_add(1, Ordering::Relaxed);
                    let reply = Message::error(
                        correlation_id,
                        ErrorCode::BadRequest,
                        format!("unknown message kind {:#06x}", kind),
                    );
                    self.send(&reply).await?;
                    continue;
                }
                Err(e) => {
                    self.fail(0, &e).await;
                    return Err(e.into());
                }
            };

            self.stats.requests_total.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                "[{}] Request: {:?} (id={})",
                label,
                message.kind(),
                message.correlation_id()
            );

            let response = self.dispatcher.process(&message, &self.ctx);
            if response.is_error() {
                self.stats.errors_total.fetch_add(1, Ordering::Relaxed);
            }
            self.send(&response).await?;
        }
    }

    /// Writes a response. A response over the frame limit is replaced by an
    /// error carrying the same correlation id.
    async fn send(&mut self, message: &Message) -> Result<(), ServerError> {
        let max = self.config.max_frame_bytes;
        let body = Encoder::encode_message(message);
        match write_frame(&mut self.stream, &body, max).await {
            Err(ProtocolError::FrameTooLarge { size, .. }) => {
                tracing::warn!(
                    "[{}] Response of {} bytes exceeds frame limit (id={})",
                    self.ctx.label(),
                    size,
                    message.correlation_id()
                );
                let reply = Message::error(
                    message.correlation_id(),
                    ErrorCode::FrameTooLarge,
                    format!("response of {} bytes exceeds frame limit {}", size, max),
                );
                write_frame(&mut self.stream, &Encoder::encode_message(&reply), max).await?;
                Ok(())
            }
            other => other.map_err(Into::into),
        }
    }

    /// Best-effort error response before a fatal close.
    async fn fail(&mut self, correlation_id: i32, error: &ProtocolError) {
        tracing::warn!("[{}] Closing connection: {}", self.ctx.label(), error);
        self.stats.errors_total.fetch_add(1, Ordering::Relaxed);
        if matches!(error, ProtocolError::Io(_) | ProtocolError::TruncatedFrame { .. }) {
            return;
        }
        let reply = Message::error(correlation_id, error.error_code(), error.to_string());
        let _ = write_frame(
            &mut self.stream,
            &Encoder::encode_message(&reply),
            self.config.max_frame_bytes,
        )
        .await;
    }
}

async fn idle(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;
    use gridwire_protocol::{
        CodecRegistry, ErrorResponse, GetRequest, GetResponse, MessageKind, PutRequest,
        RequestKind, Value,
    };
    use gridwire_security::SecurityService;
    use gridwire_store::MemoryCache;
    use tokio::io::DuplexStream;
    use tokio::task::JoinHandle;

    fn codecs() -> CodecRegistry {
        CodecRegistry::with_defaults()
    }

    type Spawned = (
        DuplexStream,
        broadcast::Sender<()>,
        JoinHandle<Result<(), ServerError>>,
    );

    fn spawn(config: ConnectionConfig) -> Spawned {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let ctx = ExecutionContext::new(
            Arc::new(MemoryCache::new().with_region("r")),
            Arc::new(SecurityService::Disabled),
            Arc::new(codecs()),
        );
        let (tx, mut rx) = broadcast::channel(1);
        let connection = Connection::new(server, ctx, Dispatcher::default(), config);
        let task = tokio::spawn(async move { connection.run(&mut rx).await });
        (client, tx, task)
    }

    async fn call(client: &mut DuplexStream, message: &Message) -> Message {
        write_frame(client, &Encoder::encode_message(message), MAX_FRAME_SIZE)
            .await
            .unwrap();
        let body = read_frame(client, MAX_FRAME_SIZE).await.unwrap().unwrap();
        decode_envelope(&body).unwrap()
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (mut client, _tx, task) = spawn(ConnectionConfig::default());
        let key = codecs().encode_value(&Value::from("k")).unwrap();
        let value = codecs().encode_value(&Value::from("v")).unwrap();

        let put = PutRequest {
            region_name: "r".into(),
            entry: gridwire_protocol::Entry::new(key.clone(), value.clone()),
        };
        let response = call(&mut client, &Message::request(1, &put).unwrap()).await;
        assert_eq!(response.correlation_id(), 1);
        assert_eq!(response.kind(), MessageKind::Response(RequestKind::Put));

        let get = GetRequest {
            region_name: "r".into(),
            key,
        };
        let response = call(&mut client, &Message::request(2, &get).unwrap()).await;
        assert_eq!(response.correlation_id(), 2);
        let body: GetResponse = response.parse_payload().unwrap();
        assert_eq!(body.result, Some(value));

        drop(client);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_unknown_kind_keeps_connection() {
        let (mut client, _tx, task) = spawn(ConnectionConfig::default());

        let mut body = bytes::BytesMut::new();
        body.put_i32(41);
        body.put_u16(0x0042);
        write_frame(&mut client, &body, MAX_FRAME_SIZE).await.unwrap();
        let reply = read_frame(&mut client, MAX_FRAME_SIZE).await.unwrap().unwrap();
        let reply = decode_envelope(&reply).unwrap();
        assert!(reply.is_error());
        assert_eq!(reply.correlation_id(), 41);
        let err: ErrorResponse = reply.parse_payload().unwrap();
        assert_eq!(err.code, ErrorCode::BadRequest);

        // Still serving.
        let get = GetRequest {
            region_name: "missing".into(),
            key: codecs().encode_value(&Value::from("k")).unwrap(),
        };
        let response = call(&mut client, &Message::request(42, &get).unwrap()).await;
        let err: ErrorResponse = response.parse_payload().unwrap();
        assert_eq!(err.code, ErrorCode::RegionNotFound);
        assert_eq!(response.correlation_id(), 42);

        drop(client);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_short_envelope_is_fatal() {
        let (mut client, _tx, task) = spawn(ConnectionConfig::default());

        write_frame(&mut client, &[0, 0, 1], MAX_FRAME_SIZE).await.unwrap();
        let reply = read_frame(&mut client, MAX_FRAME_SIZE).await.unwrap().unwrap();
        let err: ErrorResponse = decode_envelope(&reply).unwrap().parse_payload().unwrap();
        assert_eq!(err.code, ErrorCode::MalformedMessage);

        // Server closed its side after the best-effort reply.
        assert!(read_frame(&mut client, MAX_FRAME_SIZE).await.unwrap().is_none());
        assert!(task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_oversized_frame_is_fatal() {
        let config = ConnectionConfig {
            max_frame_bytes: 64,
            ..Default::default()
        };
        let (mut client, _tx, task) = spawn(config);

        write_frame(&mut client, &[0u8; 128], MAX_FRAME_SIZE).await.unwrap();
        let result = task.await.unwrap();
        assert!(matches!(
            result,
            Err(ServerError::Protocol(ProtocolError::FrameTooLarge { .. }))
        ));
    }

    #[tokio::test]
    async fn test_idle_timeout_closes() {
        let config = ConnectionConfig {
            idle_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let (mut client, _tx, task) = spawn(config);

        assert!(task.await.unwrap().is_ok());
        assert!(read_frame(&mut client, MAX_FRAME_SIZE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_signal() {
        let (_client, tx, task) = spawn(ConnectionConfig::default());
        tokio::task::yield_now().await;
        tx.send(()).unwrap();
        assert!(matches!(
            task.await.unwrap(),
            Err(ServerError::ShuttingDown)
        ));
    }
}
