//! HS256 tokens for the Kling API.
//!
//! Kling authenticates with a short-lived JWT signed by the account's secret
//! key. The token is small and fixed-shape, so it is assembled directly.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

/// Token lifetime in seconds.
pub const TOKEN_TTL_SECS: i64 = 1800;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Kling access key and secret key are required")]
    MissingKey,

    #[error("Failed to encode token segment: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Invalid HMAC key length")]
    InvalidKey,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header<'a> {
    alg: &'a str,
    typ: &'a str,
}

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub exp: i64,
    pub nbf: i64,
}

/// Sign a token valid from `now` (unix seconds) for [`TOKEN_TTL_SECS`].
pub fn sign(access_key: &str, secret_key: &str, now: i64) -> Result<String, JwtError> {
    if access_key.is_empty() || secret_key.is_empty() {
        return Err(JwtError::MissingKey);
    }

    let header = Header {
        alg: "HS256",
        typ: "JWT",
    };
    let claims = Claims {
        iss: access_key.to_string(),
        exp: now + TOKEN_TTL_SECS,
        nbf: now,
    };

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
    );

    let signature = hmac_sha256(secret_key.as_bytes(), signing_input.as_bytes())?;
    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
}

/// Sign a token valid from the current time.
pub fn sign_now(access_key: &str, secret_key: &str) -> Result<String, JwtError> {
    sign(access_key, secret_key, chrono::Utc::now().timestamp())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, JwtError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|_| JwtError::InvalidKey)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn segments(token: &str) -> Vec<String> {
        token.split('.').map(str::to_string).collect()
    }

    #[test]
    fn test_three_base64url_segments() {
        let token = sign("ak-test", "sk-test", NOW).unwrap();
        let parts = segments(&token);
        assert_eq!(parts.len(), 3);
        for part in &parts {
            assert!(!part.is_empty());
            assert!(!part.contains('+'));
            assert!(!part.contains('/'));
            assert!(!part.contains('='));
            URL_SAFE_NO_PAD.decode(part).unwrap();
        }
    }

    #[test]
    fn test_header_and_claims() {
        let token = sign("ak-test", "sk-test", NOW).unwrap();
        let parts = segments(&token);

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(&parts[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["typ"], "JWT");

        let claims: Claims =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(&parts[1]).unwrap()).unwrap();
        assert_eq!(claims.iss, "ak-test");
        assert_eq!(claims.nbf, NOW);
        assert_eq!(claims.exp - claims.nbf, 1800);
    }

    #[test]
    fn test_signature_verifies() {
        let token = sign("ak-test", "sk-test", NOW).unwrap();
        let (signing_input, signature) = token.rsplit_once('.').unwrap();

        let mut mac = Hmac::<Sha256>::new_from_slice(b"sk-test").unwrap();
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&URL_SAFE_NO_PAD.decode(signature).unwrap())
            .unwrap();
    }

    #[test]
    fn test_deterministic_for_fixed_clock() {
        assert_eq!(
            sign("a", "b", NOW).unwrap(),
            sign("a", "b", NOW).unwrap()
        );
        assert_ne!(
            sign("a", "b", NOW).unwrap(),
            sign("a", "other", NOW).unwrap()
        );
    }

    #[test]
    fn test_missing_keys() {
        assert!(matches!(sign("", "sk", NOW), Err(JwtError::MissingKey)));
        assert!(matches!(sign("ak", "", NOW), Err(JwtError::MissingKey)));
    }
}
