//! Message envelope and typed request/response payloads.

use crate::error::{ErrorCode, ProtocolError};
use crate::value::{EncodedValue, Entry};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bit set on the kind of every success response.
pub const RESPONSE_FLAG: u16 = 0x8000;

/// Kind value of an error response.
pub const ERROR_KIND: u16 = 0xFFFF;

/// Request kinds understood by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u16)]
pub enum RequestKind {
    /// Sentinel for an unset kind. Never carried on the wire.
    Unset = 0,
    Get = 1,
    Put = 2,
    PutAll = 3,
    GetAll = 4,
    Remove = 5,
    GetRegionNames = 6,
}

impl RequestKind {
    /// Every request kind, including the unset sentinel.
    pub const ALL: [RequestKind; 7] = [
        RequestKind::Unset,
        RequestKind::Get,
        RequestKind::Put,
        RequestKind::PutAll,
        RequestKind::GetAll,
        RequestKind::Remove,
        RequestKind::GetRegionNames,
    ];

    pub fn code(self) -> u16 {
        self as u16
    }

    /// Resolves a wire value. The unset sentinel is never resolved.
    pub fn from_code(code: u16) -> Option<Self> {
        RequestKind::ALL
            .iter()
            .copied()
            .find(|k| *k != RequestKind::Unset && k.code() == code)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Unset => "UNSET",
            RequestKind::Get => "GET",
            RequestKind::Put => "PUT",
            RequestKind::PutAll => "PUT_ALL",
            RequestKind::GetAll => "GET_ALL",
            RequestKind::Remove => "REMOVE",
            RequestKind::GetRegionNames => "GET_REGION_NAMES",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind carried in a message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Request(RequestKind),
    Response(RequestKind),
    Error,
}

impl MessageKind {
    pub fn code(self) -> u16 {
        match self {
            MessageKind::Request(kind) => kind.code(),
            MessageKind::Response(kind) => RESPONSE_FLAG | kind.code(),
            MessageKind::Error => ERROR_KIND,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        if code == ERROR_KIND {
            return Some(MessageKind::Error);
        }
        if code & RESPONSE_FLAG != 0 {
            return RequestKind::from_code(code & !RESPONSE_FLAG).map(MessageKind::Response);
        }
        RequestKind::from_code(code).map(MessageKind::Request)
    }
}

/// Envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Caller-assigned id echoed in the paired response.
    pub correlation_id: i32,
    pub kind: MessageKind,
}

/// A decoded envelope: header plus an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub payload: Bytes,
}

impl Message {
    pub fn new(correlation_id: i32, kind: MessageKind, payload: Bytes) -> Self {
        Self {
            header: MessageHeader {
                correlation_id,
                kind,
            },
            payload,
        }
    }

    /// Builds a request message from a typed request.
    pub fn request<R: RequestMessage>(correlation_id: i32, request: &R) -> Result<Self, ProtocolError> {
        let payload = serde_json::to_vec(request)?;
        Ok(Self::new(
            correlation_id,
            MessageKind::Request(R::KIND),
            Bytes::from(payload),
        ))
    }

    /// Builds a success response for `kind` from a typed payload.
    pub fn response<T: Serialize>(
        correlation_id: i32,
        kind: RequestKind,
        response: &T,
    ) -> Result<Self, ProtocolError> {
        let payload = serde_json::to_vec(response)?;
        Ok(Self::new(
            correlation_id,
            MessageKind::Response(kind),
            Bytes::from(payload),
        ))
    }

    /// Builds an error response.
    pub fn error(correlation_id: i32, code: ErrorCode, message: impl Into<String>) -> Self {
        let body = ErrorResponse::new(code, message);
        let payload = serde_json::to_vec(&body).unwrap_or_default();
        Self::new(correlation_id, MessageKind::Error, Bytes::from(payload))
    }

    pub fn correlation_id(&self) -> i32 {
        self.header.correlation_id
    }

    pub fn kind(&self) -> MessageKind {
        self.header.kind
    }

    pub fn is_error(&self) -> bool {
        self.header.kind == MessageKind::Error
    }

    /// Parses the payload as JSON.
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Associates a typed request with its kind and response type.
pub trait RequestMessage: Serialize + DeserializeOwned + Send + 'static {
    const KIND: RequestKind;
    type Response: Serialize + DeserializeOwned + Send + 'static;
}

/// Error response payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

// ============================================================================
// Operation payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRequest {
    pub region_name: String,
    pub key: EncodedValue,
}

/// `result` is absent when the key has no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<EncodedValue>,
}

impl RequestMessage for GetRequest {
    const KIND: RequestKind = RequestKind::Get;
    type Response = GetResponse;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutRequest {
    pub region_name: String,
    pub entry: Entry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutResponse {}

impl RequestMessage for PutRequest {
    const KIND: RequestKind = RequestKind::Put;
    type Response = PutResponse;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutAllRequest {
    pub region_name: String,
    pub entries: Vec<Entry>,
}

/// Keys whose write was rejected by the store. Every other entry was written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutAllResponse {
    #[serde(default)]
    pub invalid_keys: Vec<EncodedValue>,
}

impl RequestMessage for PutAllRequest {
    const KIND: RequestKind = RequestKind::PutAll;
    type Response = PutAllResponse;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAllRequest {
    pub region_name: String,
    pub keys: Vec<EncodedValue>,
}

/// Entries found. Absent keys are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAllResponse {
    #[serde(default)]
    pub entries: Vec<Entry>,
}

impl RequestMessage for GetAllRequest {
    const KIND: RequestKind = RequestKind::GetAll;
    type Response = GetAllResponse;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveRequest {
    pub region_name: String,
    pub key: EncodedValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveResponse {}

impl RequestMessage for RemoveRequest {
    const KIND: RequestKind = RequestKind::Remove;
    type Response = RemoveResponse;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRegionNamesRequest {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRegionNamesResponse {
    pub regions: Vec<String>,
}

impl RequestMessage for GetRegionNamesRequest {
    const KIND: RequestKind = RequestKind::GetRegionNames;
    type Response = GetRegionNamesResponse;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::EncodingType;

    #[test]
    fn test_message_kind_codes() {
        assert_eq!(MessageKind::Request(RequestKind::Get).code(), 1);
        assert_eq!(MessageKind::Response(RequestKind::Get).code(), 0x8001);
        assert_eq!(MessageKind::Error.code(), 0xFFFF);

        assert_eq!(
            MessageKind::from_code(0x8006),
            Some(MessageKind::Response(RequestKind::GetRegionNames))
        );
        assert_eq!(MessageKind::from_code(0xFFFF), Some(MessageKind::Error));
        assert_eq!(MessageKind::from_code(42), None);
    }

    #[test]
    fn test_unset_kind_never_resolves() {
        assert_eq!(RequestKind::from_code(0), None);
        assert_eq!(MessageKind::from_code(0), None);
        assert_eq!(MessageKind::from_code(RESPONSE_FLAG), None);
    }

    #[test]
    fn test_request_message_roundtrip() {
        let request = GetRequest {
            region_name: "r".into(),
            key: EncodedValue::new(EncodingType::String, b"k".to_vec()),
        };
        let message = Message::request(9, &request).unwrap();
        assert_eq!(message.correlation_id(), 9);
        assert_eq!(message.kind(), MessageKind::Request(RequestKind::Get));

        let parsed: GetRequest = message.parse_payload().unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_empty_get_response_omits_result() {
        let json = serde_json::to_string(&GetResponse { result: None }).unwrap();
        assert_eq!(json, "{}");

        let parsed: GetResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.result.is_none());
    }

    #[test]
    fn test_error_message() {
        let message = Message::error(3, ErrorCode::RegionNotFound, "no region 'x'");
        assert!(message.is_error());
        let body: ErrorResponse = message.parse_payload().unwrap();
        assert_eq!(body.code, ErrorCode::RegionNotFound);
        assert_eq!(body.message, "no region 'x'");

        let json = std::str::from_utf8(&message.payload).unwrap();
        assert!(json.contains(r#""code":"REGION_NOT_FOUND""#));
    }
}
