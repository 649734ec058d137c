use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::domain::security::ApiKeySigner;

type HmacSha256 = Hmac<Sha256>;

const API_KEY_PREFIX: &str = "vsk_";

/// `vsk_` + hex(HMAC-SHA256(secret, "{user_id}:{client_id}"))
#[derive(Clone)]
pub struct HmacApiKeySigner {
    mac: HmacSha256,
}

impl HmacApiKeySigner {
    pub fn new(secret: &str) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes()).context("invalid API key secret")?;
        Ok(Self { mac })
    }
}

impl ApiKeySigner for HmacApiKeySigner {
    fn sign(&self, user_id: &str, client_id: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(user_id.as_bytes());
        mac.update(b":");
        mac.update(client_id.as_bytes());
        format!("{}{}", API_KEY_PREFIX, hex::encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic_per_pair() {
        let signer = HmacApiKeySigner::new("secret").unwrap();
        let key = signer.sign("u1", "c1");

        assert!(key.starts_with("vsk_"));
        assert_eq!(key.len(), 4 + 64);
        assert_eq!(key, signer.sign("u1", "c1"));
        assert_ne!(key, signer.sign("u1", "c2"));
        assert_ne!(key, signer.sign("u2", "c1"));
    }

    #[test]
    fn test_key_depends_on_secret() {
        let a = HmacApiKeySigner::new("secret-a").unwrap();
        let b = HmacApiKeySigner::new("secret-b").unwrap();
        assert_ne!(a.sign("u1", "c1"), b.sign("u1", "c1"));
    }
}
