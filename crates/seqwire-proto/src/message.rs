//! Frame types and their codecs.
//!
//! Every frame kind has `encode` (infallible, allocates one buffer) and
//! `decode` (reads and checks the discriminator, then the body). The
//! [`Message`] enum covers the read-side of callers that cannot know the kind
//! in advance: it reads the discriminator exactly once and dispatches.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::errors::{ProtocolError, Result};

/// Upper bound on any length-prefixed field.
///
/// Client ids and digests are tiny in practice; anything near this limit is a
/// corrupt or hostile stream.
pub const MAX_FIELD_LEN: u32 = 1024 * 1024;

/// The four 3-byte frame discriminators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// `"CON"` — connect handshake.
    Connect,
    /// `"NUM"` — one series element.
    Number,
    /// `"ACK"` — receipt confirmation.
    Acknowledge,
    /// `"CHK"` — final series digest.
    Checksum,
}

impl Tag {
    /// Width of the discriminator on the wire.
    pub const LEN: usize = 3;

    /// Wire bytes for this tag.
    pub const fn bytes(self) -> [u8; 3] {
        match self {
            Self::Connect => *b"CON",
            Self::Number => *b"NUM",
            Self::Acknowledge => *b"ACK",
            Self::Checksum => *b"CHK",
        }
    }

    /// Match raw discriminator bytes to a known tag.
    pub fn from_bytes(raw: [u8; 3]) -> Option<Self> {
        match &raw {
            b"CON" => Some(Self::Connect),
            b"NUM" => Some(Self::Number),
            b"ACK" => Some(Self::Acknowledge),
            b"CHK" => Some(Self::Checksum),
            _ => None,
        }
    }

    /// Read one discriminator from the stream.
    pub async fn read<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut raw = [0u8; Self::LEN];
        reader
            .read_exact(&mut raw)
            .await
            .map_err(ProtocolError::from_read)?;
        Self::from_bytes(raw).ok_or(ProtocolError::UnknownTag(raw))
    }

    /// Read one discriminator and require it to be `self`.
    async fn expect<R>(self, reader: &mut R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut raw = [0u8; Self::LEN];
        reader
            .read_exact(&mut raw)
            .await
            .map_err(ProtocolError::from_read)?;
        if raw == self.bytes() {
            Ok(())
        } else {
            Err(ProtocolError::TagMismatch { expected: self, found: raw })
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.bytes();
        // Tags are ASCII by construction.
        f.write_str(std::str::from_utf8(&bytes).unwrap_or("???"))
    }
}

async fn read_u32<R>(reader: &mut R) -> Result<u32>
where
    R: AsyncRead + Unpin,
{
    let mut raw = [0u8; 4];
    reader
        .read_exact(&mut raw)
        .await
        .map_err(ProtocolError::from_read)?;
    Ok(u32::from_be_bytes(raw))
}

/// Read a length prefix and the field it describes.
async fn read_prefixed<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let len = read_u32(reader).await?;
    if len > MAX_FIELD_LEN {
        return Err(ProtocolError::Oversize(len));
    }
    let mut field = vec![0u8; len as usize];
    reader
        .read_exact(&mut field)
        .await
        .map_err(ProtocolError::from_read)?;
    Ok(field)
}

/// Handshake frame: declares the series length and the client's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    /// Requested series length.
    pub n: u32,
    /// Stable identity enabling resume across reconnects.
    pub client_id: String,
}

impl Connect {
    /// Serialize to wire bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Tag::LEN + 8 + self.client_id.len());
        buf.put_slice(&Tag::Connect.bytes());
        buf.put_u32(self.n);
        buf.put_u32(self.client_id.len() as u32);
        buf.put_slice(self.client_id.as_bytes());
        buf.freeze()
    }

    /// Decode a full frame, discriminator included.
    pub async fn decode<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        Tag::Connect.expect(reader).await?;
        Self::decode_body(reader).await
    }

    /// Decode the fixed fields after the discriminator.
    pub async fn decode_body<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let n = read_u32(reader).await?;
        let raw_id = read_prefixed(reader).await?;
        let client_id = String::from_utf8(raw_id).map_err(ProtocolError::ClientId)?;
        Ok(Self { n, client_id })
    }
}

/// One series element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Number {
    /// Index of the element within the series.
    pub sequence: u32,
    /// The element itself.
    pub value: u32,
}

impl Number {
    /// Serialize to wire bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Tag::LEN + 8);
        buf.put_slice(&Tag::Number.bytes());
        buf.put_u32(self.sequence);
        buf.put_u32(self.value);
        buf.freeze()
    }

    /// Decode a full frame, discriminator included.
    pub async fn decode<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        Tag::Number.expect(reader).await?;
        Self::decode_body(reader).await
    }

    /// Decode the fixed fields after the discriminator.
    pub async fn decode_body<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let sequence = read_u32(reader).await?;
        let value = read_u32(reader).await?;
        Ok(Self { sequence, value })
    }
}

/// Receipt confirmation for one sequence index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledge {
    /// Index being confirmed. Index `n` confirms the checksum frame.
    pub sequence: u32,
}

impl Acknowledge {
    /// Serialize to wire bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Tag::LEN + 4);
        buf.put_slice(&Tag::Acknowledge.bytes());
        buf.put_u32(self.sequence);
        buf.freeze()
    }

    /// Decode a full frame, discriminator included.
    pub async fn decode<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        Tag::Acknowledge.expect(reader).await?;
        Self::decode_body(reader).await
    }

    /// Decode the fixed fields after the discriminator.
    pub async fn decode_body<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let sequence = read_u32(reader).await?;
        Ok(Self { sequence })
    }
}

/// Final digest frame, sent at `sequence == n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    /// Always the series length `n` — the slot after the last element.
    pub sequence: u32,
    /// SHA-1 digest over the big-endian concatenation of the series.
    pub digest: Vec<u8>,
}

impl Checksum {
    /// Serialize to wire bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Tag::LEN + 8 + self.digest.len());
        buf.put_slice(&Tag::Checksum.bytes());
        buf.put_u32(self.sequence);
        buf.put_u32(self.digest.len() as u32);
        buf.put_slice(&self.digest);
        buf.freeze()
    }

    /// Decode a full frame, discriminator included.
    pub async fn decode<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        Tag::Checksum.expect(reader).await?;
        Self::decode_body(reader).await
    }

    /// Decode the fixed fields after the discriminator.
    pub async fn decode_body<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let sequence = read_u32(reader).await?;
        let digest = read_prefixed(reader).await?;
        Ok(Self { sequence, digest })
    }
}

/// Any frame, for readers that dispatch on the discriminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// `"CON"` handshake frame.
    Connect(Connect),
    /// `"NUM"` series element frame.
    Number(Number),
    /// `"ACK"` receipt frame.
    Acknowledge(Acknowledge),
    /// `"CHK"` digest frame.
    Checksum(Checksum),
}

impl Message {
    /// Read one discriminator and decode the matching frame body.
    pub async fn decode<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        match Tag::read(reader).await? {
            Tag::Connect => Ok(Self::Connect(Connect::decode_body(reader).await?)),
            Tag::Number => Ok(Self::Number(Number::decode_body(reader).await?)),
            Tag::Acknowledge => {
                Ok(Self::Acknowledge(Acknowledge::decode_body(reader).await?))
            },
            Tag::Checksum => Ok(Self::Checksum(Checksum::decode_body(reader).await?)),
        }
    }

    /// Serialize to wire bytes.
    pub fn encode(&self) -> Bytes {
        match self {
            Self::Connect(m) => m.encode(),
            Self::Number(m) => m.encode(),
            Self::Acknowledge(m) => m.encode(),
            Self::Checksum(m) => m.encode(),
        }
    }

    /// Discriminator of this frame.
    pub fn tag(&self) -> Tag {
        match self {
            Self::Connect(_) => Tag::Connect,
            Self::Number(_) => Tag::Number,
            Self::Acknowledge(_) => Tag::Acknowledge,
            Self::Checksum(_) => Tag::Checksum,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn block_on<F: Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(fut)
    }

    #[tokio::test]
    async fn connect_round_trip() {
        let msg = Connect { n: 10, client_id: "alpha".into() };
        let wire = msg.encode();
        let mut reader = &wire[..];
        assert_eq!(Connect::decode(&mut reader).await.unwrap(), msg);
    }

    #[tokio::test]
    async fn connect_round_trip_empty_client_id() {
        let msg = Connect { n: 0, client_id: String::new() };
        let wire = msg.encode();
        assert_eq!(wire.len(), Tag::LEN + 8);
        let mut reader = &wire[..];
        assert_eq!(Connect::decode(&mut reader).await.unwrap(), msg);
    }

    #[tokio::test]
    async fn checksum_round_trip_empty_digest() {
        let msg = Checksum { sequence: 3, digest: vec![] };
        let wire = msg.encode();
        let mut reader = &wire[..];
        assert_eq!(Checksum::decode(&mut reader).await.unwrap(), msg);
    }

    #[tokio::test]
    async fn connect_wire_layout_is_byte_exact() {
        let msg = Connect { n: 3, client_id: "x".into() };
        let wire = msg.encode();
        assert_eq!(&wire[..], b"CON\x00\x00\x00\x03\x00\x00\x00\x01x");
    }

    #[tokio::test]
    async fn number_wire_layout_is_byte_exact() {
        let msg = Number { sequence: 1, value: 20 };
        assert_eq!(&msg.encode()[..], b"NUM\x00\x00\x00\x01\x00\x00\x00\x14");
    }

    #[tokio::test]
    async fn decode_rejects_wrong_tag() {
        let wire = Number { sequence: 0, value: 0 }.encode();
        let mut reader = &wire[..];
        let err = Acknowledge::decode(&mut reader).await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::TagMismatch { expected: Tag::Acknowledge, found } if &found == b"NUM"
        ));
    }

    #[tokio::test]
    async fn dispatch_rejects_unknown_tag() {
        let mut reader: &[u8] = b"XYZ\x00\x00\x00\x01";
        let err = Message::decode(&mut reader).await.unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag(found) if &found == b"XYZ"));
    }

    #[tokio::test]
    async fn truncated_frame_is_incomplete() {
        let wire = Connect { n: 7, client_id: "truncated".into() }.encode();
        let mut reader = &wire[..wire.len() - 3];
        let err = Connect::decode(&mut reader).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Incomplete));
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn empty_stream_is_incomplete() {
        let mut reader: &[u8] = &[];
        let err = Message::decode(&mut reader).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Incomplete));
    }

    #[tokio::test]
    async fn oversize_length_prefix_is_rejected() {
        let mut wire = BytesMut::new();
        wire.put_slice(b"CON");
        wire.put_u32(1);
        wire.put_u32(MAX_FIELD_LEN + 1);
        let mut reader = &wire[..];
        let err = Connect::decode(&mut reader).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Oversize(len) if len == MAX_FIELD_LEN + 1));
    }

    #[tokio::test]
    async fn non_utf8_client_id_is_rejected() {
        let mut wire = BytesMut::new();
        wire.put_slice(b"CON");
        wire.put_u32(1);
        wire.put_u32(2);
        wire.put_slice(&[0xff, 0xfe]);
        let mut reader = &wire[..];
        let err = Connect::decode(&mut reader).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ClientId(_)));
    }

    #[tokio::test]
    async fn dispatch_decodes_back_to_back_frames() {
        let mut wire = BytesMut::new();
        wire.put_slice(&Number { sequence: 0, value: 10 }.encode());
        wire.put_slice(&Checksum { sequence: 1, digest: vec![0xaa; 20] }.encode());
        let mut reader = &wire[..];

        let first = Message::decode(&mut reader).await.unwrap();
        assert_eq!(first.tag(), Tag::Number);
        let second = Message::decode(&mut reader).await.unwrap();
        assert_eq!(second.tag(), Tag::Checksum);
    }

    fn arb_message() -> impl Strategy<Value = Message> {
        prop_oneof![
            (any::<u32>(), ".{0,32}")
                .prop_map(|(n, client_id)| Message::Connect(Connect { n, client_id })),
            (any::<u32>(), any::<u32>())
                .prop_map(|(sequence, value)| Message::Number(Number { sequence, value })),
            any::<u32>().prop_map(|sequence| Message::Acknowledge(Acknowledge { sequence })),
            (any::<u32>(), proptest::collection::vec(any::<u8>(), 0..64))
                .prop_map(|(sequence, digest)| Message::Checksum(Checksum { sequence, digest })),
        ]
    }

    proptest! {
        #[test]
        fn any_message_round_trips(msg in arb_message()) {
            let wire = msg.encode();
            let decoded = block_on(async {
                let mut reader = &wire[..];
                Message::decode(&mut reader).await
            })
            .unwrap();
            prop_assert_eq!(decoded, msg);
        }
    }
}
