//! # Relay Frame Codec
//!
//! `tokio_util` codec turning a byte stream into [`Packet`]s and back.
//!
//! The decoder waits until a full header is buffered, validates it, then waits
//! for the declared payload before splitting the frame off the buffer. A bad
//! header is reported immediately so the relayer can drop the stream.

use crate::core::packet::{parse_header, Packet, HEADER_SIZE};
use crate::error::{ProtocolError, Result};
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, instrument};

#[derive(Debug, Default, Clone, Copy)]
pub struct PacketCodec;

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = ProtocolError;

    #[instrument(skip(self, src), fields(buffered = src.len()))]
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = parse_header(&src[..HEADER_SIZE])?;
        let frame_len = HEADER_SIZE + header.length;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(header.length);
        debug!(
            channel = header.channel_id,
            sequence = header.sequence,
            len = header.length,
            "decoded relay frame"
        );

        Ok(Some(Packet {
            version: header.version,
            channel_id: header.channel_id,
            package_type: header.package_type,
            sequence: header.sequence,
            payload: payload.to_vec(),
        }))
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<()> {
        if item.payload.len() > crate::config::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::OversizedPacket(item.payload.len()));
        }
        dst.reserve(HEADER_SIZE + item.payload.len());
        item.write_header(dst);
        dst.extend_from_slice(&item.payload);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_header_waits() {
        let mut codec = PacketCodec;
        let mut buf = BytesMut::from(&[0x4D, 0x42, 0x52][..]);
        assert!(codec.decode(&mut buf).expect("decode").is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_partial_payload_waits() {
        let mut codec = PacketCodec;
        let bytes = Packet::new(6, 1, 7, vec![1, 2, 3, 4]).to_bytes();
        let mut buf = BytesMut::from(&bytes[..bytes.len() - 1]);
        assert!(codec.decode(&mut buf).expect("decode").is_none());
        assert_eq!(buf.len(), bytes.len() - 1);
    }

    #[test]
    fn test_encode_then_decode() {
        let mut codec = PacketCodec;
        let packet = Packet::new(6, 2, 99, vec![0xAA; 64]);
        let mut buf = BytesMut::new();
        codec.encode(packet.clone(), &mut buf).expect("encode");
        assert_eq!(buf.len(), HEADER_SIZE + 64);

        let decoded = codec.decode(&mut buf).expect("decode").expect("frame");
        assert_eq!(decoded, packet);
        assert!(buf.is_empty());
    }
}
