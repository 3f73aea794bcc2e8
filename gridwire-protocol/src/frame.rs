//! Length-delimited frames.
//!
//! Frame layout:
//!
//! ```text
//! +-------------+------------------+
//! |   length    |       body       |
//! |   4 bytes   |   length bytes   |
//! +-------------+------------------+
//! ```
//!
//! The length is big-endian and counts body bytes only. Zero-length bodies are
//! valid. Bodies are opaque at this layer.

use crate::error::ProtocolError;
use crate::MAX_FRAME_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the length prefix in bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

/// A single frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub body: Bytes,
}

impl Frame {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { body: body.into() }
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        self.encode_with_limit(MAX_FRAME_SIZE)
    }

    pub fn encode_with_limit(&self, max: usize) -> Result<BytesMut, ProtocolError> {
        check_size(self.body.len(), max)?;

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.body.len());
        buf.put_u32(self.body.len() as u32);
        buf.put_slice(&self.body);
        Ok(buf)
    }

    /// Decodes a frame from bytes.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        Self::decode_with_limit(buf, MAX_FRAME_SIZE)
    }

    pub fn decode_with_limit(buf: &mut BytesMut, max: usize) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        check_size(len, max)?;

        if buf.len() < FRAME_HEADER_SIZE + len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let body = buf.split_to(len).freeze();
        Ok(Some(Self { body }))
    }
}

fn check_size(size: usize, max: usize) -> Result<(), ProtocolError> {
    if size > max || size > u32::MAX as usize {
        return Err(ProtocolError::FrameTooLarge { size, max });
    }
    Ok(())
}

/// Fills `buf` from `reader`, returning how many bytes were read before EOF.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Reads one frame body from `reader`.
///
/// Returns `Ok(None)` if the stream ends cleanly before the first length byte.
/// A stream that ends anywhere after that is a [`ProtocolError::TruncatedFrame`].
pub async fn read_frame<R>(reader: &mut R, max: usize) -> Result<Option<Bytes>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let got = read_full(reader, &mut header).await?;
    if got == 0 {
        return Ok(None);
    }
    if got < FRAME_HEADER_SIZE {
        return Err(ProtocolError::TruncatedFrame {
            expected: FRAME_HEADER_SIZE,
            received: got,
        });
    }

    let len = u32::from_be_bytes(header) as usize;
    check_size(len, max)?;

    let mut body = vec![0u8; len];
    let got = read_full(reader, &mut body).await?;
    if got < len {
        return Err(ProtocolError::TruncatedFrame {
            expected: len,
            received: got,
        });
    }

    Ok(Some(Bytes::from(body)))
}

/// Writes one frame and flushes the writer.
pub async fn write_frame<W>(writer: &mut W, body: &[u8], max: usize) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    check_size(body.len(), max)?;

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + body.len());
    buf.put_u32(body.len() as u32);
    buf.put_slice(body);

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let frame = Frame::new(Bytes::from_static(b"hello"));
        let mut buf = frame.encode().unwrap();
        assert_eq!(&buf[..4], &[0, 0, 0, 5]);

        let decoded = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_incomplete_frame() {
        let mut buf = BytesMut::from(&b"\x00\x00"[..]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());

        let mut buf = BytesMut::from(&b"\x00\x00\x00\x05abc"[..]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 7);
    }

    #[test]
    fn test_decode_rejects_oversized_length() {
        let mut buf = BytesMut::from(&b"\x00\x00\x01\x00"[..]);
        let result = Frame::decode_with_limit(&mut buf, 16);
        assert!(matches!(
            result,
            Err(ProtocolError::FrameTooLarge { size: 256, max: 16 })
        ));
    }

    #[test]
    fn test_encode_rejects_oversized_body() {
        let frame = Frame::new(vec![0u8; 17]);
        assert!(matches!(
            frame.encode_with_limit(16),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_multiple_frames_in_buffer() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&Frame::new(&b"one"[..]).encode().unwrap());
        buf.extend_from_slice(&Frame::new(&b""[..]).encode().unwrap());
        buf.extend_from_slice(&Frame::new(&b"three"[..]).encode().unwrap());

        let f1 = Frame::decode(&mut buf).unwrap().unwrap();
        let f2 = Frame::decode(&mut buf).unwrap().unwrap();
        let f3 = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(f1.body.as_ref(), b"one");
        assert!(f2.body.is_empty());
        assert_eq!(f3.body.as_ref(), b"three");
        assert!(Frame::decode(&mut buf).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stream_roundtrip_sizes() {
        let large: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
        let bodies: Vec<Vec<u8>> = vec![Vec::new(), vec![7], large];

        for body in bodies {
            let (mut client, mut server) = tokio::io::duplex(8 * 1024);
            let to_send = body.clone();
            let writer = tokio::spawn(async move {
                write_frame(&mut client, &to_send, MAX_FRAME_SIZE)
                    .await
                    .unwrap();
            });

            let received = read_frame(&mut server, MAX_FRAME_SIZE)
                .await
                .unwrap()
                .unwrap();
            writer.await.unwrap();
            assert_eq!(received.as_ref(), body.as_slice());
        }
    }

    #[tokio::test]
    async fn test_clean_eof_is_none() {
        let mut empty: &[u8] = &[];
        assert!(read_frame(&mut empty, MAX_FRAME_SIZE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eof_inside_length_is_truncated() {
        let mut partial: &[u8] = &[0, 0];
        let result = read_frame(&mut partial, MAX_FRAME_SIZE).await;
        assert!(matches!(
            result,
            Err(ProtocolError::TruncatedFrame {
                expected: 4,
                received: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_eof_inside_body_is_truncated() {
        let mut partial: &[u8] = b"\x00\x00\x00\x0ahello";
        let result = read_frame(&mut partial, MAX_FRAME_SIZE).await;
        assert!(matches!(
            result,
            Err(ProtocolError::TruncatedFrame {
                expected: 10,
                received: 5
            })
        ));
    }

    #[tokio::test]
    async fn test_read_rejects_oversized_frame() {
        let mut data: &[u8] = b"\x00\x10\x00\x00";
        let result = read_frame(&mut data, 1024).await;
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }
}
