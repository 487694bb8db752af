//! Storage document metadata decoding.
//!
//! A get-with-metadata response carries document metadata in its extras
//! section, big-endian:
//!
//! ```text
//! deleted:32/big, flags:32/big, expiry:32/big, rev_seqno:64/big
//! ```
//!
//! The CAS value travels in the response header, not the extras. The
//! revision id a peer cluster compares against is composed as
//! `cas:64/big, expiry:32/big, flags:32/big`.

use crate::error::{CodecError, CodecResult};
use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

/// Opcode of the get-with-metadata command on the data-store wire protocol.
pub const GET_WITH_META: u8 = 0x01;

/// Minimum extras length carrying full document metadata.
pub const METADATA_EXTRAS_LEN: usize = 20;

/// Metadata of one stored document, as the replication layer sees it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMetadata {
    pub deleted: u32,
    /// Item flags
    pub flags: u32,
    /// Item expiration time
    pub expiry: u32,
    /// CAS value of the item
    pub cas: u64,
    /// Revision sequence number of the mutation
    pub rev_seqno: u64,
}

impl DocMetadata {
    /// Decode metadata from a response's extras section and header CAS.
    pub fn from_extras(extras: &[u8], cas: u64) -> CodecResult<Self> {
        if extras.len() < METADATA_EXTRAS_LEN {
            return Err(CodecError::truncated(
                METADATA_EXTRAS_LEN,
                extras.len(),
                "metadata extras",
            ));
        }

        Ok(DocMetadata {
            deleted: BigEndian::read_u32(&extras[..4]),
            flags: BigEndian::read_u32(&extras[4..8]),
            expiry: BigEndian::read_u32(&extras[8..12]),
            rev_seqno: BigEndian::read_u64(&extras[12..20]),
            cas,
        })
    }

    /// Decode metadata from a full response, checking the opcode first.
    pub fn from_response(opcode: u8, extras: &[u8], cas: u64) -> CodecResult<Self> {
        if opcode != GET_WITH_META {
            return Err(CodecError::unexpected_opcode(GET_WITH_META, opcode));
        }
        Self::from_extras(extras, cas)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted != 0
    }

    /// Revision id as compared by peer clusters: `(rev_seqno, rev_id_bytes)`.
    pub fn rev_id(&self) -> [u8; 16] {
        let mut rev = [0u8; 16];
        BigEndian::write_u64(&mut rev[..8], self.cas);
        BigEndian::write_u32(&mut rev[8..12], self.expiry);
        BigEndian::write_u32(&mut rev[12..16], self.flags);
        rev
    }
}
