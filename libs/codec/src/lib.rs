//! # Cascade Wire Codec
//!
//! Decoding rules for the binary metadata that rides along with storage
//! documents on the data-store wire protocol. Replication pipelines consult
//! this metadata (CAS, revision seqno, expiry) when moving documents between
//! clusters; the bytes themselves come from get-with-metadata responses.
//!
//! Parsing is bounds-checked throughout: a truncated or misattributed
//! response produces a typed error, never a panic.

pub mod doc_metadata;
pub mod error;

pub use doc_metadata::{DocMetadata, GET_WITH_META, METADATA_EXTRAS_LEN};
pub use error::{CodecError, CodecResult};
