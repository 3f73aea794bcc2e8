//! Connection management.

use crate::error::ClientError;
use gridwire_protocol::{
    decode_envelope, read_frame, write_frame, AuthReply, Encoder, HandshakeReply,
    HandshakeRequest, HandshakeResponse, Message, ProtocolSelector, MAX_FRAME_SIZE,
    PLAIN_MECHANISM, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout.
    pub request_timeout: Duration,
    /// Client id sent in the handshake.
    pub client_id: String,
    /// Credentials for PLAIN authentication (optional).
    pub credentials: Option<(String, String)>,
    /// Largest frame sent or accepted.
    pub max_frame_bytes: usize,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            client_id: uuid::Uuid::new_v4().to_string(),
            credentials: None,
            max_frame_bytes: MAX_FRAME_SIZE,
        }
    }

    pub fn with_client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Authenticate with PLAIN right after connecting.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    pub fn with_max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame_bytes = max;
        self
    }
}

/// A connection to a gridwire gateway.
///
/// The gateway answers one request at a time per connection, so a request
/// holds the stream until its response has been read.
pub struct Connection {
    config: ConnectionConfig,
    stream: Mutex<Option<TcpStream>>,
    next_id: AtomicI32,
    connected: AtomicBool,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            stream: Mutex::new(None),
            next_id: AtomicI32::new(1),
            connected: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connects and selects the gateway protocol. Authenticates when
    /// credentials are configured.
    pub async fn connect(&self) -> Result<(), ClientError> {
        tracing::debug!("Connecting to {}...", self.config.addr);

        let mut stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(self.config.addr),
        )
        .await
        .map_err(|_| ClientError::Timeout)??;
        stream.set_nodelay(true)?;
        stream.write_u8(ProtocolSelector::Gateway as u8).await?;

        *self.stream.lock().await = Some(stream);
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!("Connected to {}", self.config.addr);

        if let Some((username, password)) = self.config.credentials.clone() {
            self.authenticate(&username, &password).await?;
        }
        Ok(())
    }

    /// Sends a handshake offering `mechanisms` and returns the server's
    /// choice.
    pub async fn handshake(&self, mechanisms: &[&str]) -> Result<HandshakeResponse, ClientError> {
        let request = HandshakeRequest::new(
            PROTOCOL_VERSION,
            self.next_id.fetch_add(1, Ordering::SeqCst).to_string(),
            self.config.client_id.clone(),
            mechanisms.iter().map(|m| m.to_string()).collect(),
        );
        let body = self.exchange(&request.encode()).await?;

        match HandshakeReply::decode(&body)? {
            HandshakeReply::Accepted(response) => Ok(response),
            HandshakeReply::Rejected { message } => {
                self.mark_closed();
                Err(ClientError::HandshakeRejected(message))
            }
        }
    }

    /// Runs the PLAIN handshake and credential exchange.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let response = self.handshake(&[PLAIN_MECHANISM]).await?;
        tracing::debug!("Handshake accepted, mechanism {}", response.mechanism);

        let mut blob = Vec::with_capacity(username.len() + password.len() + 2);
        blob.push(0);
        blob.extend_from_slice(username.as_bytes());
        blob.push(0);
        blob.extend_from_slice(password.as_bytes());

        match AuthReply::decode(&self.exchange(&blob).await?)? {
            AuthReply::Complete { .. } => Ok(()),
            AuthReply::Failed { message } => {
                self.mark_closed();
                Err(ClientError::AuthenticationFailed(message))
            }
            AuthReply::Continue { .. } => Err(ClientError::UnexpectedResponse(
                "PLAIN does not take a second step".to_string(),
            )),
        }
    }

    /// Allocates the next correlation id.
    pub fn next_correlation_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Sends an envelope and waits for the envelope answering it.
    pub async fn request(&self, message: &Message) -> Result<Message, ClientError> {
        let body = self.exchange(&Encoder::encode_message(message)).await?;
        let response = decode_envelope(&body)?;
        if response.correlation_id() != message.correlation_id() {
            return Err(ClientError::UnexpectedResponse(format!(
                "correlation id {} does not match request {}",
                response.correlation_id(),
                message.correlation_id()
            )));
        }
        Ok(response)
    }

    /// Writes one raw frame and reads one raw frame back.
    pub async fn exchange(&self, body: &[u8]) -> Result<bytes::Bytes, ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let max = self.config.max_frame_bytes;
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(ClientError::NotConnected)?;

        let round_trip = async {
            write_frame(stream, body, max).await?;
            read_frame(stream, max).await
        };
        let frame = tokio::time::timeout(self.config.request_timeout, round_trip)
            .await
            .map_err(|_| ClientError::Timeout)?;

        match frame {
            Ok(Some(body)) => Ok(body),
            Ok(None) => {
                *guard = None;
                self.connected.store(false, Ordering::SeqCst);
                Err(ClientError::ConnectionClosed)
            }
            Err(e) => {
                *guard = None;
                self.connected.store(false, Ordering::SeqCst);
                Err(e.into())
            }
        }
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn mark_closed(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut stream) = self.stream.lock().await.take() {
            let _ = stream.shutdown().await;
        }
        tracing::debug!("Connection closed");
        Ok(())
    }
}
