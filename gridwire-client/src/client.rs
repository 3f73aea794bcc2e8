//! High-level client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use gridwire_protocol::{
    CodecRegistry, Entry, ErrorResponse, GetAllRequest, GetRegionNamesRequest, GetRequest,
    HandshakeResponse, Message, MessageKind, PutAllRequest, PutRequest, RemoveRequest,
    RequestMessage, Value,
};
use std::sync::Arc;

/// High-level client for the gridwire gateway.
pub struct Client {
    conn: Arc<Connection>,
    codecs: CodecRegistry,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            conn: Arc::new(Connection::new(config)),
            codecs: CodecRegistry::with_defaults(),
        }
    }

    /// Replaces the codec registry used to encode keys and values.
    pub fn with_codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = codecs;
        self
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.conn.connect().await
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> Arc<Connection> {
        self.conn.clone()
    }

    /// Sends a handshake offering `mechanisms`.
    pub async fn handshake(&self, mechanisms: &[&str]) -> Result<HandshakeResponse, ClientError> {
        self.conn.handshake(mechanisms).await
    }

    /// Authenticates with the PLAIN mechanism.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<(), ClientError> {
        self.conn.authenticate(username, password).await
    }

    // =========================================================================
    // Helper methods
    // =========================================================================

    /// Sends a typed request and decodes its typed response.
    pub async fn call<R: RequestMessage>(&self, request: &R) -> Result<R::Response, ClientError> {
        let message = Message::request(self.conn.next_correlation_id(), request)?;
        let response = self.conn.request(&message).await?;

        match response.kind() {
            MessageKind::Error => {
                let err: ErrorResponse = response.parse_payload()?;
                Err(ClientError::ServerError {
                    code: err.code,
                    message: err.message,
                })
            }
            MessageKind::Response(kind) if kind == R::KIND => Ok(response.parse_payload()?),
            other => Err(ClientError::UnexpectedResponse(format!(
                "expected response to {}, got kind {:#06x}",
                R::KIND,
                other.code()
            ))),
        }
    }

    fn encode(&self, value: &Value) -> Result<gridwire_protocol::EncodedValue, ClientError> {
        Ok(self.codecs.encode_value(value)?)
    }

    fn decode(&self, encoded: &gridwire_protocol::EncodedValue) -> Result<Value, ClientError> {
        Ok(self.codecs.decode_value(encoded)?)
    }

    // =========================================================================
    // Region operations
    // =========================================================================

    /// Reads a key. `None` when the key has no value.
    pub async fn get(
        &self,
        region: &str,
        key: impl Into<Value>,
    ) -> Result<Option<Value>, ClientError> {
        let request = GetRequest {
            region_name: region.to_string(),
            key: self.encode(&key.into())?,
        };
        let response = self.call(&request).await?;
        response.result.as_ref().map(|v| self.decode(v)).transpose()
    }

    /// Writes a key.
    pub async fn put(
        &self,
        region: &str,
        key: impl Into<Value>,
        value: impl Into<Value>,
    ) -> Result<(), ClientError> {
        let request = PutRequest {
            region_name: region.to_string(),
            entry: Entry::new(self.encode(&key.into())?, self.encode(&value.into())?),
        };
        self.call(&request).await?;
        Ok(())
    }

    /// Writes a batch. Returns the keys the server rejected.
    pub async fn put_all(
        &self,
        region: &str,
        entries: Vec<(Value, Value)>,
    ) -> Result<Vec<Value>, ClientError> {
        let entries = entries
            .iter()
            .map(|(k, v)| Ok(Entry::new(self.encode(k)?, self.encode(v)?)))
            .collect::<Result<Vec<_>, ClientError>>()?;
        let request = PutAllRequest {
            region_name: region.to_string(),
            entries,
        };
        let response = self.call(&request).await?;
        response.invalid_keys.iter().map(|k| self.decode(k)).collect()
    }

    /// Reads a batch. Absent keys are omitted.
    pub async fn get_all(
        &self,
        region: &str,
        keys: Vec<Value>,
    ) -> Result<Vec<(Value, Value)>, ClientError> {
        let keys = keys
            .iter()
            .map(|k| self.encode(k))
            .collect::<Result<Vec<_>, _>>()?;
        let request = GetAllRequest {
            region_name: region.to_string(),
            keys,
        };
        let response = self.call(&request).await?;
        response
            .entries
            .iter()
            .map(|e| Ok((self.decode(&e.key)?, self.decode(&e.value)?)))
            .collect()
    }

    /// Removes a key. Succeeds when the key is absent.
    pub async fn remove(&self, region: &str, key: impl Into<Value>) -> Result<(), ClientError> {
        let request = RemoveRequest {
            region_name: region.to_string(),
            key: self.encode(&key.into())?,
        };
        self.call(&request).await?;
        Ok(())
    }

    /// Lists the region names known to the server.
    pub async fn region_names(&self) -> Result<Vec<String>, ClientError> {
        Ok(self.call(&GetRegionNamesRequest {}).await?.regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    #[tokio::test]
    async fn test_operations_require_connection() {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let client = Client::new(ConnectionConfig::new(addr));
        assert!(!client.is_connected());
        assert!(matches!(
            client.get("r", "k").await,
            Err(ClientError::NotConnected)
        ));
        assert!(matches!(
            client.region_names().await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_unregistered_codec_fails_locally() {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let client = Client::new(ConnectionConfig::new(addr)).with_codecs(CodecRegistry::new());
        assert!(matches!(
            client.put("r", "k", "v").await,
            Err(ClientError::Codec(_))
        ));
    }
}
