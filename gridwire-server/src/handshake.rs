//! Handshake state machine and authentication mechanisms.
//!
//! The first frame on a secured connection is a [`HandshakeRequest`]. Once a
//! mechanism is agreed the chosen authenticator consumes raw frames until it
//! completes or fails.

use crate::error::ServerError;
use bytes::Bytes;
use gridwire_protocol::{
    read_frame, write_frame, AuthReply, HandshakeReply, HandshakeRequest, HandshakeResponse,
    ProtocolError, PLAIN_MECHANISM, PROTOCOL_VERSION,
};
use gridwire_security::{
    Principal, Properties, SecurityError, SecurityService, SECURITY_AUTHORIZATION_ID,
    SECURITY_PASSWORD, SECURITY_USERNAME,
};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    NotStarted,
    /// Mechanism agreed, authentication running.
    InProgress,
    Complete,
    Failed,
}

impl HandshakeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, HandshakeState::Complete | HandshakeState::Failed)
    }
}

/// Result of one authentication step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStep {
    Complete(Principal),
    /// Send the challenge and wait for another client response.
    Continue(Bytes),
}

/// Server side of one authentication mechanism.
pub trait MechanismAuthenticator: Send {
    fn mechanism(&self) -> &'static str;

    fn evaluate(&mut self, response: &[u8]) -> Result<AuthStep, SecurityError>;
}

/// Credentials carried by the PLAIN mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainCredentials {
    pub authorization_id: String,
    pub username: String,
    pub password: String,
}

impl PlainCredentials {
    /// Parses `authzid NUL username NUL password`.
    pub fn parse(blob: &[u8]) -> Result<Self, SecurityError> {
        let mut fields = blob.splitn(3, |b| *b == 0).map(std::str::from_utf8);
        match (fields.next(), fields.next(), fields.next()) {
            (Some(Ok(authz)), Some(Ok(user)), Some(Ok(pass))) => Ok(Self {
                authorization_id: authz.to_string(),
                username: user.to_string(),
                password: pass.to_string(),
            }),
            _ => Err(SecurityError::MalformedCredentials),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(
            self.authorization_id.len() + self.username.len() + self.password.len() + 2,
        );
        blob.extend_from_slice(self.authorization_id.as_bytes());
        blob.push(0);
        blob.extend_from_slice(self.username.as_bytes());
        blob.push(0);
        blob.extend_from_slice(self.password.as_bytes());
        blob
    }

    fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.insert(
            SECURITY_AUTHORIZATION_ID.to_string(),
            self.authorization_id.clone(),
        );
        props.insert(SECURITY_USERNAME.to_string(), self.username.clone());
        props.insert(SECURITY_PASSWORD.to_string(), self.password.clone());
        props
    }
}

/// Single-step username/password mechanism.
pub struct PlainAuthenticator {
    security: Arc<SecurityService>,
}

impl PlainAuthenticator {
    pub fn new(security: Arc<SecurityService>) -> Self {
        Self { security }
    }
}

impl MechanismAuthenticator for PlainAuthenticator {
    fn mechanism(&self) -> &'static str {
        PLAIN_MECHANISM
    }

    fn evaluate(&mut self, response: &[u8]) -> Result<AuthStep, SecurityError> {
        let credentials = PlainCredentials::parse(response)?;
        let principal = self.security.authenticate(&credentials.to_properties())?;
        Ok(AuthStep::Complete(principal))
    }
}

/// Per-connection handshake state machine.
pub struct Handshake {
    state: HandshakeState,
    security: Arc<SecurityService>,
    supported: Vec<&'static str>,
    authenticator: Option<Box<dyn MechanismAuthenticator>>,
    client_id: Option<String>,
}

impl Handshake {
    pub fn new(security: Arc<SecurityService>) -> Self {
        Self {
            state: HandshakeState::NotStarted,
            security,
            supported: vec![PLAIN_MECHANISM],
            authenticator: None,
            client_id: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Validates the handshake request and selects a mechanism.
    ///
    /// The version is checked before the field count, so a foreign version
    /// is reported as such even when the rest of the request is malformed.
    pub fn process_request(&mut self, body: &[u8]) -> Result<HandshakeResponse, ProtocolError> {
        if self.state != HandshakeState::NotStarted {
            self.state = HandshakeState::Failed;
            return Err(ProtocolError::MalformedHandshake(
                "handshake already processed".to_string(),
            ));
        }

        let result = self.negotiate(body);
        if result.is_err() {
            self.state = HandshakeState::Failed;
        }
        result
    }

    fn negotiate(&mut self, body: &[u8]) -> Result<HandshakeResponse, ProtocolError> {
        if let Some(version) = HandshakeRequest::peek_version(body) {
            if version != PROTOCOL_VERSION {
                return Err(ProtocolError::UnsupportedVersion {
                    expected: PROTOCOL_VERSION.to_string(),
                    actual: version,
                });
            }
        }

        let request = HandshakeRequest::decode(body)?;
        let mechanism = request
            .mechanisms
            .iter()
            .find_map(|offered| {
                self.supported
                    .iter()
                    .copied()
                    .find(|s| s.eq_ignore_ascii_case(offered))
            })
            .ok_or(ProtocolError::NoAgreedMechanism)?;

        self.authenticator = Some(self.create_authenticator());
        self.client_id = Some(request.client_id);
        self.state = HandshakeState::InProgress;

        Ok(HandshakeResponse {
            correlation_id: request.correlation_id,
            mechanism: mechanism.to_string(),
        })
    }

    // PLAIN is the only supported mechanism.
    fn create_authenticator(&self) -> Box<dyn MechanismAuthenticator> {
        Box::new(PlainAuthenticator::new(self.security.clone()))
    }

    /// Feeds one client response to the agreed mechanism.
    pub fn evaluate(&mut self, response: &[u8]) -> Result<AuthStep, ServerError> {
        let Some(authenticator) = self.authenticator.as_mut() else {
            self.state = HandshakeState::Failed;
            return Err(ProtocolError::MalformedHandshake(
                "authentication before mechanism negotiation".to_string(),
            )
            .into());
        };

        match authenticator.evaluate(response) {
            Ok(AuthStep::Complete(principal)) => {
                self.state = HandshakeState::Complete;
                self.authenticator = None;
                Ok(AuthStep::Complete(principal))
            }
            Ok(step) => Ok(step),
            Err(e) => {
                self.state = HandshakeState::Failed;
                self.authenticator = None;
                Err(e.into())
            }
        }
    }
}

/// Runs the handshake and authentication exchange over `stream`.
///
/// On failure a rejection is written best-effort before the error is
/// returned; the caller closes the connection.
pub async fn perform_handshake<S>(
    stream: &mut S,
    handshake: &mut Handshake,
    max_frame_bytes: usize,
) -> Result<Principal, ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let body = read_frame(stream, max_frame_bytes)
        .await?
        .ok_or_else(|| closed("handshake"))?;

    let response = match handshake.process_request(&body) {
        Ok(response) => response,
        Err(e) => {
            let reply = HandshakeReply::Rejected {
                message: e.to_string(),
            };
            let _ = write_frame(stream, &reply.encode(), max_frame_bytes).await;
            return Err(e.into());
        }
    };

    tracing::debug!(
        "Handshake accepted: client={:?} mechanism={}",
        handshake.client_id(),
        response.mechanism
    );
    let reply = HandshakeReply::Accepted(response);
    write_frame(stream, &reply.encode(), max_frame_bytes).await?;

    loop {
        let body = read_frame(stream, max_frame_bytes)
            .await?
            .ok_or_else(|| closed("authentication"))?;

        match handshake.evaluate(&body) {
            Ok(AuthStep::Complete(principal)) => {
                let reply = AuthReply::Complete {
                    challenge: Bytes::new(),
                };
                write_frame(stream, &reply.encode(), max_frame_bytes).await?;
                return Ok(principal);
            }
            Ok(AuthStep::Continue(challenge)) => {
                let reply = AuthReply::Continue { challenge };
                write_frame(stream, &reply.encode(), max_frame_bytes).await?;
            }
            Err(e) => {
                let reply = AuthReply::Failed {
                    message: e.to_string(),
                };
                let _ = write_frame(stream, &reply.encode(), max_frame_bytes).await;
                return Err(e);
            }
        }
    }
}

fn closed(stage: &str) -> ServerError {
    ServerError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("connection closed during {}", stage),
    ))
}
