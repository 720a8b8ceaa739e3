//! Wire messages of the sync protocol.
//!
//! Locator and inventory vectors are indexed by chain in canonical
//! row-major order `(from · G + to)`. All encodings are length-prefixed
//! through the shared codec, so a truncated or padded message fails to
//! decode instead of misparsing.

use flow_types::{Block, BlockHeader, Codec, CodecError, CodecResult, Hash, Reader};

/// Protocol version sent in handshakes.
pub const PROTOCOL_VERSION: u32 = 1;

const TAG_HANDSHAKE: u8 = 0;
const TAG_SYNC_REQUEST: u8 = 1;
const TAG_SYNC_RESPONSE: u8 = 2;
const TAG_BLOCK_REQUEST: u8 = 3;
const TAG_BLOCK_RESPONSE: u8 = 4;
const TAG_HEADER_REQUEST: u8 = 5;
const TAG_HEADER_RESPONSE: u8 = 6;

/// Messages exchanged between brokers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncMessage {
    /// Opening message of a session.
    Handshake {
        version: u32,
        groups: u32,
        broker_from: u32,
        broker_until: u32,
    },
    /// Per-chain skip-list locators.
    SyncRequest { locators: Vec<Vec<Hash>> },
    /// Per-chain hashes the peer should fetch, oldest first.
    SyncResponse { inventories: Vec<Vec<Hash>> },
    /// Fetch full blocks by hash.
    BlockRequest { hashes: Vec<Hash> },
    /// Bodies answering a `BlockRequest`, in request order.
    BlockResponse { blocks: Vec<Block> },
    /// Fetch headers by hash (non-related chains).
    HeaderRequest { hashes: Vec<Hash> },
    /// Headers answering a `HeaderRequest`, in request order.
    HeaderResponse { headers: Vec<BlockHeader> },
}

impl Codec for SyncMessage {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        match self {
            SyncMessage::Handshake {
                version,
                groups,
                broker_from,
                broker_until,
            } => {
                buf.push(TAG_HANDSHAKE);
                version.encode_to(buf);
                groups.encode_to(buf);
                broker_from.encode_to(buf);
                broker_until.encode_to(buf);
            }
            SyncMessage::SyncRequest { locators } => {
                buf.push(TAG_SYNC_REQUEST);
                locators.encode_to(buf);
            }
            SyncMessage::SyncResponse { inventories } => {
                buf.push(TAG_SYNC_RESPONSE);
                inventories.encode_to(buf);
            }
            SyncMessage::BlockRequest { hashes } => {
                buf.push(TAG_BLOCK_REQUEST);
                hashes.encode_to(buf);
            }
            SyncMessage::BlockResponse { blocks } => {
                buf.push(TAG_BLOCK_RESPONSE);
                blocks.encode_to(buf);
            }
            SyncMessage::HeaderRequest { hashes } => {
                buf.push(TAG_HEADER_REQUEST);
                hashes.encode_to(buf);
            }
            SyncMessage::HeaderResponse { headers } => {
                buf.push(TAG_HEADER_RESPONSE);
                headers.encode_to(buf);
            }
        }
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(match reader.take_u8()? {
            TAG_HANDSHAKE => SyncMessage::Handshake {
                version: u32::decode(reader)?,
                groups: u32::decode(reader)?,
                broker_from: u32::decode(reader)?,
                broker_until: u32::decode(reader)?,
            },
            TAG_SYNC_REQUEST => SyncMessage::SyncRequest {
                locators: Vec::decode(reader)?,
            },
            TAG_SYNC_RESPONSE => SyncMessage::SyncResponse {
                inventories: Vec::decode(reader)?,
            },
            TAG_BLOCK_REQUEST => SyncMessage::BlockRequest {
                hashes: Vec::decode(reader)?,
            },
            TAG_BLOCK_RESPONSE => SyncMessage::BlockResponse {
                blocks: Vec::decode(reader)?,
            },
            TAG_HEADER_REQUEST => SyncMessage::HeaderRequest {
                hashes: Vec::decode(reader)?,
            },
            TAG_HEADER_RESPONSE => SyncMessage::HeaderResponse {
                headers: Vec::decode(reader)?,
            },
            other => return Err(CodecError::InvalidTag(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let messages = vec![
            SyncMessage::Handshake {
                version: PROTOCOL_VERSION,
                groups: 2,
                broker_from: 0,
                broker_until: 2,
            },
            SyncMessage::SyncRequest {
                locators: vec![
                    vec![Hash::hash_blake2b(b"a"), Hash::hash_blake2b(b"b")],
                    vec![],
                ],
            },
            SyncMessage::SyncResponse {
                inventories: vec![vec![Hash::hash_blake2b(b"c")]],
            },
            SyncMessage::BlockRequest {
                hashes: vec![Hash::hash_blake2b(b"d")],
            },
            SyncMessage::HeaderResponse { headers: vec![] },
        ];
        for message in messages {
            let encoded = message.encode();
            assert_eq!(SyncMessage::decode_all(&encoded).unwrap(), message);
        }
    }

    #[test]
    fn test_truncated_rejected() {
        let encoded = SyncMessage::BlockRequest {
            hashes: vec![Hash::hash_blake2b(b"d")],
        }
        .encode();
        assert!(SyncMessage::decode_all(&encoded[..encoded.len() - 1]).is_err());
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert!(matches!(
            SyncMessage::decode_all(&[0xfe]),
            Err(CodecError::InvalidTag(0xfe))
        ));
    }
}
