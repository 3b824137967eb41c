//! SHA-1 helpers.
//!
//! The cache layout and migration fingerprints are keyed by SHA-1 hex
//! digests, so the digest algorithm is part of the on-disk contract.

use sha1::{Digest, Sha1};

/// Returns the lowercase hex SHA-1 of a byte slice.
pub fn sha1_bytes(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(40);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Returns the lowercase hex SHA-1 of a UTF-8 string.
pub fn sha1_hex(text: &str) -> String {
    sha1_bytes(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digests() {
        // Reference vectors from RFC 3174.
        assert_eq!(sha1_hex("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(sha1_hex(""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn bytes_and_str_agree() {
        assert_eq!(sha1_bytes(b"x = 1\n"), sha1_hex("x = 1\n"));
    }
}
