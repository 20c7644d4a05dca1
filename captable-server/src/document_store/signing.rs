//! Expiring download URLs
//!
//! A URL carries the object path, an expiry as unix seconds and a token
//! `hex(HMAC-SHA256(secret, path ‖ 0x00 ‖ expires))`. The server serving
//! `/files/{path}` recomputes the MAC to authorize the download.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use super::DocumentStoreError;

type HmacSha256 = Hmac<Sha256>;

/// A signed, expiring URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
    base_url: String,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>, base_url: impl Into<String>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn mac(&self, path: &str, expires: i64) -> Result<HmacSha256, DocumentStoreError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| DocumentStoreError::Unavailable(format!("url signing key rejected: {}", e)))?;
        mac.update(path.as_bytes());
        mac.update(&[0u8]);
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    /// Sign `path` for `ttl` starting at `now`.
    pub fn sign_at(&self, path: &str, ttl: Duration, now: DateTime<Utc>) -> Result<SignedUrl, DocumentStoreError> {
        let expires_at = now + ttl;
        let expires = expires_at.timestamp();
        let token = hex::encode(self.mac(path, expires)?.finalize().into_bytes());
        Ok(SignedUrl {
            url: format!("{}/files/{}?expires={}&token={}", self.base_url, path, expires, token),
            expires_at,
        })
    }

    pub fn sign(&self, path: &str, ttl: Duration) -> Result<SignedUrl, DocumentStoreError> {
        self.sign_at(path, ttl, Utc::now())
    }

    /// Whether `token` authorizes `path` until `expires` and has not lapsed at `now`.
    pub fn verify_at(&self, path: &str, expires: i64, token: &str, now: DateTime<Utc>) -> bool {
        if now.timestamp() > expires {
            return false;
        }
        let Ok(tag) = hex::decode(token) else {
            return false;
        };
        match self.mac(path, expires) {
            Ok(mac) => mac.verify_slice(&tag).is_ok(),
            Err(_) => false,
        }
    }

    pub fn verify(&self, path: &str, expires: i64, token: &str) -> bool {
        self.verify_at(path, expires, token, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn query_param<'a>(url: &'a str, key: &str) -> &'a str {
        url.split(['?', '&'])
            .find_map(|kv| kv.strip_prefix(&format!("{}=", key)))
            .unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = UrlSigner::new("secret", "http://localhost:8088/");
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let signed = signer.sign_at("c1/doc.pdf", Duration::seconds(3600), now).unwrap();

        assert!(signed.url.starts_with("http://localhost:8088/files/c1/doc.pdf?expires="));
        let expires: i64 = query_param(&signed.url, "expires").parse().unwrap();
        let token = query_param(&signed.url, "token");

        assert!(signer.verify_at("c1/doc.pdf", expires, token, now));
        assert!(!signer.verify_at("c1/other.pdf", expires, token, now));
        assert!(!signer.verify_at("c1/doc.pdf", expires + 1, token, now));
        assert!(!signer.verify_at("c1/doc.pdf", expires, token, now + Duration::seconds(3601)));
        assert!(!UrlSigner::new("other", "x").verify_at("c1/doc.pdf", expires, token, now));
    }

    #[test]
    fn test_token_is_hmac_sha256() {
        let signer = UrlSigner::new("key", "http://localhost");
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let signed = signer.sign_at("c1/doc.pdf", Duration::seconds(60), now).unwrap();
        let expires = query_param(&signed.url, "expires");
        let token = query_param(&signed.url, "token");

        let mut mac = HmacSha256::new_from_slice(b"key").unwrap();
        mac.update(format!("c1/doc.pdf\0{}", expires).as_bytes());
        assert_eq!(token, hex::encode(mac.finalize().into_bytes()));
        assert_eq!(token.len(), 64);
    }

    #[test]
    fn test_malformed_tokens_are_rejected() {
        let signer = UrlSigner::new("key", "http://localhost");
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let signed = signer.sign_at("c1/doc.pdf", Duration::seconds(60), now).unwrap();
        let expires: i64 = query_param(&signed.url, "expires").parse().unwrap();
        let token = query_param(&signed.url, "token");

        assert!(!signer.verify_at("c1/doc.pdf", expires, "not-hex", now));
        assert!(!signer.verify_at("c1/doc.pdf", expires, &token[..32], now));
        assert!(!signer.verify_at("c1/doc.pdf", expires, "", now));
    }
}
