//! Binary encoding for dense vectors stored as SQLite `BLOB` columns.

/// Encodes a dense `f32` vector as little-endian bytes.
#[must_use]
pub fn encode_vector(v: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() * 4);
    for x in v {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

/// Decodes a dense `f32` vector previously produced by [`encode_vector`].
/// Returns an empty vector for malformed input rather than panicking.
#[must_use]
pub fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    if bytes.len() % 4 != 0 {
        return Vec::new();
    }
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
        .collect()
}
