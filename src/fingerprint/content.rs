use sha2::{Digest, Sha256};

/// SHA-256 over the raw upload bytes, rendered as lowercase hex.
///
/// Byte-exact: the same bytes always produce the same digest, and any
/// re-encode of the same picture produces a different one. Empty input is
/// hashed like any other byte sequence.
pub fn hash_content(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        assert_eq!(
            hash_content(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            hash_content(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn deterministic() {
        let bytes = b"the same picture, twice";
        assert_eq!(hash_content(bytes), hash_content(bytes));
    }

    #[test]
    fn single_bit_change_alters_digest() {
        let a = vec![0u8; 64];
        let mut b = a.clone();
        b[40] ^= 0x01;
        assert_ne!(hash_content(&a), hash_content(&b));
    }

    #[test]
    fn digest_is_64_hex_chars() {
        let digest = hash_content(b"fixture");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
