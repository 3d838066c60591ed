use sha2::{Digest, Sha256};

/// SHA-256 of a serialized service listing, hex encoded.
/// The listing is already sorted, so equal service sets hash identically.
pub fn content_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}
