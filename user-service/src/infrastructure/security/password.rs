use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::domain::security::PasswordHasher;

/// 加盐 SHA-256 密码摘要，存储格式为 `{salt}${hex}`
#[derive(Debug, Default, Clone)]
pub struct Sha256PasswordHasher;

impl Sha256PasswordHasher {
    fn digest(salt: &str, password: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());
        hasher.finalize().into()
    }
}

impl PasswordHasher for Sha256PasswordHasher {
    fn hash(&self, password: &str) -> String {
        let salt = uuid::Uuid::new_v4().simple().to_string();
        format!("{}${}", salt, hex::encode(Self::digest(&salt, password)))
    }

    fn verify(&self, password: &str, stored: &str) -> bool {
        let Some((salt, expected)) = stored.split_once('$') else {
            return false;
        };
        let Ok(expected) = hex::decode(expected) else {
            return false;
        };
        Self::digest(salt, password)
            .as_slice()
            .ct_eq(expected.as_slice())
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verifies_and_is_salted() {
        let hasher = Sha256PasswordHasher;
        let first = hasher.hash("s3cret");
        let second = hasher.hash("s3cret");

        assert_ne!(first, second);
        assert!(hasher.verify("s3cret", &first));
        assert!(hasher.verify("s3cret", &second));
        assert!(!hasher.verify("wrong", &first));
        assert!(!hasher.verify("s3cret", "no-separator"));
    }

    #[test]
    fn test_malformed_digest_never_verifies() {
        let hasher = Sha256PasswordHasher;
        let stored = hasher.hash("s3cret");
        let (salt, digest) = stored.split_once('$').unwrap();

        assert!(!hasher.verify("s3cret", &format!("{salt}$not-hex")));
        assert!(!hasher.verify("s3cret", &format!("{salt}${}", &digest[..10])));
        assert!(!hasher.verify("s3cret", &format!("{salt}${digest}00")));
    }
}
