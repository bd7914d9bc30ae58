//! Content fingerprints for build reports.
//!
//! ```ignore
//! let fp = hash::fingerprint(b"body { color: red }"); // -> "4f1c0e7a9b2d3e61"
//! ```

/// Hex fingerprint of `data` (first 8 bytes of its blake3 digest).
///
/// Stable across runs, so identical outputs report identical fingerprints.
#[inline]
pub fn fingerprint<T: AsRef<[u8]> + ?Sized>(data: &T) -> String {
    let digest = blake3::hash(data.as_ref());
    hex::encode(&digest.as_bytes()[..8])
}
