//! bridge codec
//!
//! packs a submission payload into the single opaque byte string carried as
//! the data argument of a cross-chain message. pure and stateless; decoding
//! is total-or-error and the round trip is exact.

use scale_codec::{DecodeAll, Encode};

use crate::error::{Error, Result};
use crate::transaction::TransactionPayload;

/// encode a payload for transport across the bridge
pub fn encode_for_bridge(payload: &TransactionPayload) -> Vec<u8> {
    payload.encode()
}

/// inverse of [`encode_for_bridge`]
///
/// any structural mismatch, including trailing bytes, is
/// [`Error::MalformedPayload`].
pub fn decode_from_bridge(bytes: &[u8]) -> Result<TransactionPayload> {
    TransactionPayload::decode_all(&mut &bytes[..])
        .map_err(|e| Error::MalformedPayload(e.to_string()))
}
