use sha2::{Digest, Sha256};

/// SHA-256 of `bytes`, lowercase hex. Equal digests are treated as the same
/// clipboard content everywhere in the crate.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Text is hashed over its UTF-8 bytes, so it shares a digest space with images.
pub fn hash_text(text: &str) -> String {
    hash_bytes(text.as_bytes())
}
