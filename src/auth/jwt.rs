use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::config::JwtConfig;

/// Claim names owned by the token service; dropped from issued payloads.
const RESERVED_CLAIMS: [&str; 2] = ["sub", "exp"];

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),
    #[error("invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

/// Decoded contents of a verified token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// HS256 signing and verification keys derived from the configured secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Option<Duration>,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            ttl: cfg
                .ttl_minutes
                .map(|m| Duration::from_secs((m.max(0) as u64).saturating_mul(60))),
        }
    }

    pub fn issue(&self, subject: &str, mut payload: Map<String, Value>) -> Result<String, TokenError> {
        for key in RESERVED_CLAIMS {
            payload.remove(key);
        }
        let claims = Claims {
            sub: subject.to_owned(),
            exp: self.ttl.map(|ttl| now_unix().saturating_add(ttl.as_secs())),
            payload,
        };
        let token =
            encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(TokenError::Sign)?;
        debug!(subject = %subject, expires = ?claims.exp, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        if self.ttl.is_some() {
            validation.set_required_spec_claims(&["sub", "exp"]);
        } else {
            validation.set_required_spec_claims(&["sub"]);
        }
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(TokenError::Invalid)?;
        debug!(subject = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

fn now_unix() -> u64 {
    OffsetDateTime::now_utc().unix_timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_keys(secret: &str, ttl_minutes: Option<i64>) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: secret.into(),
            ttl_minutes,
        })
    }

    fn id_payload(id: i64) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("id".into(), json!(id));
        payload
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let keys = make_keys("dev-secret", None);
        let mut payload = id_payload(7);
        payload.insert("role".into(), json!("member"));

        let token = keys.issue("dunder", payload.clone()).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, "dunder");
        assert_eq!(claims.payload, payload);
        assert_eq!(claims.exp, None);
    }

    #[test]
    fn issue_is_deterministic_without_ttl() {
        let keys = make_keys("dev-secret", None);
        let a = keys.issue("dunder", id_payload(1)).unwrap();
        let b = keys.issue("dunder", id_payload(1)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn reserved_claims_are_dropped_from_payload() {
        let keys = make_keys("dev-secret", None);
        let mut payload = id_payload(1);
        payload.insert("sub".into(), json!("someone-else"));
        payload.insert("exp".into(), json!(1));

        let claims = keys.verify(&keys.issue("dunder", payload).unwrap()).unwrap();
        assert_eq!(claims.sub, "dunder");
        assert_eq!(claims.exp, None);
        assert_eq!(claims.payload, id_payload(1));
    }

    #[test]
    fn verify_rejects_other_secret() {
        let good = make_keys("secret-a", None);
        let bad = make_keys("secret-b", None);
        let token = good.issue("dunder", id_payload(1)).unwrap();
        assert!(matches!(bad.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn verify_rejects_corrupted_tokens() {
        let keys = make_keys("dev-secret", None);
        let token = keys.issue("dunder", id_payload(1)).unwrap();

        let mut flipped = token.clone().into_bytes();
        let last = flipped.len() - 2;
        flipped[last] = if flipped[last] == b'A' { b'B' } else { b'A' };
        let flipped = String::from_utf8(flipped).unwrap();

        for bad in ["", "not-a-token", "a.b.c", &token[..token.len() / 2], flipped.as_str()] {
            assert!(keys.verify(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn verify_rejects_other_algorithms() {
        let keys = make_keys("dev-secret", None);
        let token = encode(
            &Header::new(Algorithm::HS512),
            &json!({ "sub": "dunder", "id": 1 }),
            &EncodingKey::from_secret(b"dev-secret"),
        )
        .unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn ttl_adds_exp_and_expired_tokens_fail() {
        let keys = make_keys("dev-secret", Some(10));
        let claims = keys.verify(&keys.issue("dunder", id_payload(1)).unwrap()).unwrap();
        assert!(claims.exp.unwrap() > now_unix());

        let expired = encode(
            &Header::new(Algorithm::HS256),
            &json!({ "sub": "dunder", "id": 1, "exp": 1_000 }),
            &EncodingKey::from_secret(b"dev-secret"),
        )
        .unwrap();
        assert!(keys.verify(&expired).is_err());

        let no_exp = make_keys("dev-secret", None).issue("dunder", id_payload(1)).unwrap();
        assert!(keys.verify(&no_exp).is_err());
    }

    #[test]
    fn oversized_ttl_saturates_instead_of_wrapping() {
        let keys = make_keys("dev-secret", Some(i64::MAX));
        let claims = keys.verify(&keys.issue("dunder", id_payload(1)).unwrap()).unwrap();
        assert!(claims.exp.unwrap() > now_unix());
    }

    #[test]
    fn verify_does_not_consult_any_store() {
        let keys = make_keys("dev-secret", None);
        let token = keys.issue("nobody-by-this-name", id_payload(999)).unwrap();
        assert_eq!(keys.verify(&token).unwrap().sub, "nobody-by-this-name");
    }
}
