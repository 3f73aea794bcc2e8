//! TCP server implementation.

use crate::config::NetworkConfig;
use crate::connection::{Connection, ConnectionConfig};
use crate::context::ExecutionContext;
use crate::error::ServerError;
use crate::registry::{Dispatcher, OperationContextRegistry};
use gridwire_protocol::{CodecRegistry, ProtocolSelector, DEFAULT_PORT, MAX_FRAME_SIZE};
use gridwire_security::SecurityService;
use gridwire_store::Cache;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Idle connection timeout (`None` disables).
    pub idle_timeout: Option<Duration>,
    /// Time allowed for the selector byte and the handshake.
    pub handshake_timeout: Duration,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Largest accepted frame body.
    pub max_frame_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            idle_timeout: Some(Duration::from_secs(300)),
            handshake_timeout: Duration::from_secs(10),
            max_connections: 1000,
            max_frame_bytes: MAX_FRAME_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            max_frame_bytes: self.max_frame_bytes,
            idle_timeout: self.idle_timeout,
            handshake_timeout: self.handshake_timeout,
        }
    }
}

impl From<&NetworkConfig> for ServerConfig {
    fn from(network: &NetworkConfig) -> Self {
        Self {
            bind_addr: network.bind_addr,
            idle_timeout: network.idle_timeout(),
            handshake_timeout: network.handshake_timeout(),
            max_connections: network.max_connections,
            max_frame_bytes: network.max_frame_bytes,
        }
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub connections_rejected: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
    pub auth_failures: AtomicU64,
}

/// TCP gateway server.
pub struct Server {
    config: ServerConfig,
    cache: Arc<dyn Cache>,
    codecs: Arc<CodecRegistry>,
    dispatcher: Dispatcher,
    security: RwLock<Arc<SecurityService>>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server with the built-in operations and codecs.
    pub fn new(config: ServerConfig, cache: Arc<dyn Cache>, security: SecurityService) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            cache,
            codecs: Arc::new(CodecRegistry::with_defaults()),
            dispatcher: Dispatcher::default(),
            security: RwLock::new(Arc::new(security)),
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Replaces the codec registry. Must be called before serving.
    pub fn with_codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = Arc::new(codecs);
        self
    }

    /// Replaces the operation registry. Must be called before serving.
    pub fn with_registry(mut self, registry: OperationContextRegistry) -> Self {
        self.dispatcher = Dispatcher::new(registry);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the security service new connections start with.
    pub fn security(&self) -> Arc<SecurityService> {
        self.security.read().clone()
    }

    /// Installs a new security service for connections accepted from now
    /// on. Established connections keep the service they started with.
    /// Returns the previous service so the caller can close it.
    pub fn reconfigure_security(&self, service: SecurityService) -> Arc<SecurityService> {
        let mode = service.service_type();
        let previous = std::mem::replace(&mut *self.security.write(), Arc::new(service));
        tracing::info!(
            target: "gridwire::security",
            "Security reconfigured: {} -> {}",
            previous.service_type(),
            mode
        );
        previous
    }

    /// Binds the configured address and runs the server.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Runs the accept loop on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            "Server listening on {} (security {})",
            listener.local_addr()?,
            self.security().service_type()
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((tcp_stream, addr)) => self.accept(tcp_stream, addr),
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn accept(&self, tcp_stream: TcpStream, addr: SocketAddr) {
        if self.stats.connections_active.load(Ordering::Relaxed)
            >= self.config.max_connections as u64
        {
            tracing::warn!("Connection limit reached, rejecting {}", addr);
            self.stats.connections_rejected.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
        self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

        let ctx = ExecutionContext::new(self.cache.clone(), self.security(), self.codecs.clone())
            .with_remote_addr(addr);
        let dispatcher = self.dispatcher.clone();
        let stats = self.stats.clone();
        let config = self.config.clone();
        let mut conn_shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            tracing::info!("Client connected: {}", addr);

            let result = Self::handle_connection(
                tcp_stream,
                addr,
                ctx,
                dispatcher,
                stats.clone(),
                &config,
                &mut conn_shutdown,
            )
            .await;

            if let Err(e) = result {
                tracing::debug!("Connection {} error: {}", addr, e);
                stats.errors_total.fetch_add(1, Ordering::Relaxed);
            }

            stats.connections_active.fetch_sub(1, Ordering::Relaxed);
            tracing::info!("Client disconnected: {}", addr);
        });
    }

    /// Reads the protocol selector and serves gateway connections.
    async fn handle_connection(
        mut stream: TcpStream,
        addr: SocketAddr,
        ctx: ExecutionContext,
        dispatcher: Dispatcher,
        stats: Arc<ServerStats>,
        config: &ServerConfig,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let _ = stream.set_nodelay(true);

        let selector = tokio::time::timeout(config.handshake_timeout, stream.read_u8())
            .await
            .map_err(|_| ServerError::HandshakeTimeout)??;

        match ProtocolSelector::try_from(selector) {
            Ok(ProtocolSelector::Gateway) => {
                Connection::new(stream, ctx, dispatcher, config.connection_config())
                    .with_stats(stats)
                    .run(shutdown)
                    .await
            }
            Ok(ProtocolSelector::Legacy) => {
                tracing::warn!("[{}] Legacy client protocol is not served here", addr);
                Ok(())
            }
            Err(byte) => {
                tracing::warn!("[{}] Unknown protocol selector {}", addr, byte);
                Err(ServerError::InvalidRequest(format!(
                    "unknown protocol selector {}",
                    byte
                )))
            }
        }
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}
