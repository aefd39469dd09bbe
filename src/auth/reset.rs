use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// How long a freshly generated reset secret stays valid.
pub const RESET_TOKEN_TTL: std::time::Duration = std::time::Duration::from_secs(10 * 60);

/// Generates a reset secret and the digest stored in its place.
///
/// The secret leaves the process exactly once, in the reset email; only
/// the digest is persisted.
pub fn generate() -> (String, String) {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let secret = hex::encode(bytes);
    let digest = digest_of(&secret);
    (secret, digest)
}

pub fn digest_of(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

pub fn matches_digest(secret: &str, digest: &str) -> bool {
    digest_of(secret) == digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_matches_its_own_digest() {
        let (secret, digest) = generate();
        assert!(matches_digest(&secret, &digest));
    }

    #[test]
    fn digest_is_deterministic() {
        let (secret, digest) = generate();
        assert_eq!(digest_of(&secret), digest);
    }

    #[test]
    fn distinct_calls_produce_distinct_secrets() {
        let (a, _) = generate();
        let (b, _) = generate();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_secret_does_not_match() {
        let (_, digest) = generate();
        let (other, _) = generate();
        assert!(!matches_digest(&other, &digest));
    }

    #[test]
    fn secret_carries_32_bytes_of_entropy() {
        let (secret, _) = generate();
        assert_eq!(secret.len(), 64);
    }
}
