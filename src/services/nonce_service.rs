//! Anti-forgery tokens bound to a user, an action and a time window.
//!
//! A token is valid for the tick it was issued in and the following one,
//! where one tick is half of [`DEFAULT_LIFETIME`].

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::{sync::Arc, time::Duration};

type HmacSha256 = Hmac<Sha256>;

/// How long an issued token stays valid at most.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone)]
pub struct NonceService {
    secret: Arc<str>,
    action: Arc<str>,
    lifetime: Duration,
}

impl NonceService {
    pub fn new(secret: impl Into<String>, action: impl Into<String>) -> Self {
        let secret: String = secret.into();
        let action: String = action.into();
        Self {
            secret: Arc::from(secret),
            action: Arc::from(action),
            lifetime: DEFAULT_LIFETIME,
        }
    }

    /// Action name every state-changing request is checked against.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Issue a token for the configured action.
    pub fn create(&self, user_id: i64) -> String {
        self.create_at(&self.action, user_id, Utc::now().timestamp())
    }

    /// Check a token against the configured action.
    pub fn verify(&self, nonce: &str, user_id: i64) -> bool {
        self.verify_at(nonce, &self.action, user_id, Utc::now().timestamp())
    }

    fn tick(&self, now: i64) -> i64 {
        let half = (self.lifetime.as_secs() / 2).max(1) as i64;
        (now + half - 1).div_euclid(half)
    }

    /// Ten hex chars taken from HMAC-SHA256(secret, "tick|action|user").
    fn token(&self, tick: i64, action: &str, user_id: i64) -> Option<String> {
        // HMAC accepts keys of any length, so this never fails
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(format!("{}|{}|{}", tick, action, user_id).as_bytes());
        let hex = hex::encode(mac.finalize().into_bytes());
        Some(hex[hex.len() - 12..hex.len() - 2].to_string())
    }

    pub fn create_at(&self, action: &str, user_id: i64, now: i64) -> String {
        self.token(self.tick(now), action, user_id)
            .unwrap_or_default()
    }

    pub fn verify_at(&self, nonce: &str, action: &str, user_id: i64, now: i64) -> bool {
        if nonce.is_empty() {
            return false;
        }
        let tick = self.tick(now);
        [tick, tick - 1].iter().any(|t| {
            self.token(*t, action, user_id)
                .is_some_and(|expected| constant_time_eq(expected.as_bytes(), nonce.as_bytes()))
        })
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const HALF: i64 = 12 * 60 * 60;

    fn service() -> NonceService {
        NonceService::new("test-secret", "dgvsecurity")
    }

    #[test]
    fn token_is_ten_hex_chars() {
        let nonce = service().create(1);
        assert_eq!(nonce.len(), 10);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn issued_token_verifies_for_same_user_and_action() {
        let svc = service();
        let now = 1_700_000_000;
        let nonce = svc.create_at("dgvsecurity", 5, now);
        assert!(svc.verify_at(&nonce, "dgvsecurity", 5, now));
        assert!(!svc.verify_at(&nonce, "dgvsecurity", 6, now));
        assert!(!svc.verify_at(&nonce, "other", 5, now));
    }

    #[test]
    fn token_survives_one_tick_but_not_two() {
        let svc = service();
        let now = 1_700_000_000;
        let nonce = svc.create_at("dgvsecurity", 5, now);
        assert!(svc.verify_at(&nonce, "dgvsecurity", 5, now + HALF));
        assert!(!svc.verify_at(&nonce, "dgvsecurity", 5, now + 2 * HALF + 1));
    }

    #[test]
    fn different_secret_rejects() {
        let now = 1_700_000_000;
        let nonce = service().create_at("dgvsecurity", 5, now);
        let other = NonceService::new("other-secret", "dgvsecurity");
        assert!(!other.verify_at(&nonce, "dgvsecurity", 5, now));
    }

    #[test]
    fn token_is_truncated_hmac_sha256() {
        // HMAC-SHA256("test-secret", "39352|dgvsecurity|5")
        //   = 4dad...8027a57a0a9b8c85
        assert_eq!(service().create_at("dgvsecurity", 5, 1_700_000_000), "a57a0a9b8c");
    }

    #[test]
    fn empty_token_never_verifies() {
        assert!(!service().verify("", 1));
    }
}
