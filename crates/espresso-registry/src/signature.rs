//! Content signature of a dependency coordinate
//!
//! The signature keys the artifact cache. It is computed from
//! `group:name:version` only, so the owning registry never affects it.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `group:name:version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Signature(String);

impl Signature {
    pub fn compute(group: &str, name: &str, version: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(group.as_bytes());
        hasher.update(b":");
        hasher.update(name.as_bytes());
        hasher.update(b":");
        hasher.update(version.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_signature_is_hash_of_joined_coordinates() {
        let sig = Signature::compute("org.example", "lib", "1.0.0");
        let expected = hex::encode(Sha256::digest(b"org.example:lib:1.0.0"));

        assert_eq!(sig.as_str(), expected);
        assert_eq!(sig.as_str().len(), 64);
        assert!(sig.as_str().chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_signature_is_deterministic() {
        assert_eq!(
            Signature::compute("org.example", "lib", "1.0.0"),
            Signature::compute("org.example", "lib", "1.0.0")
        );
    }

    #[test]
    fn test_signatures_are_pairwise_distinct() {
        let groups = ["org.example", "com.acme", "io.kerosene", "net.sample"];
        let names = ["lib", "core", "util"];
        let versions = ["1.0.0", "1.0.1", "2.0.0-rc1"];

        let mut seen = HashSet::new();
        let mut count = 0;
        for group in groups {
            for name in names {
                for version in versions {
                    seen.insert(Signature::compute(group, name, version));
                    count += 1;
                }
            }
        }

        assert!(count >= 20);
        assert_eq!(seen.len(), count);
    }
}
