use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a skill's markdown body.
///
/// Only the body is hashed: two folders whose front matter differs (slug,
/// description) but whose instructions are identical are the same skill.
pub fn fingerprint(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}
