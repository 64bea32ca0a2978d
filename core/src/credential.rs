use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

/// Why a stored token could not be read as a credential.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedToken {
    #[error("token is empty")]
    Empty,
    #[error("token does not have three dot-separated segments")]
    Shape,
    #[error("token payload is not valid base64url")]
    Encoding,
    #[error("token payload is not a JSON claims object: {0}")]
    Claims(String),
    #[error("token carries no usable `exp` claim")]
    MissingExpiry,
}

/// A backend-issued session token together with its decoded expiry.
///
/// The signature is never checked here; the backend stays authoritative and
/// the client only needs `exp` to decide whether a round trip is worthwhile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    raw: String,
    expires_at: i64,
}

#[derive(Deserialize)]
struct Claims {
    exp: Option<serde_json::Value>,
    sub: Option<String>,
}

impl Credential {
    pub fn decode(raw: &str) -> Result<Self, MalformedToken> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(MalformedToken::Empty);
        }
        let mut segments = raw.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(MalformedToken::Shape);
        };
        let claims = decode_claims(payload)?;
        let expires_at = claims
            .exp
            .as_ref()
            .and_then(expiry_seconds)
            .ok_or(MalformedToken::MissingExpiry)?;
        Ok(Self {
            raw: raw.to_string(),
            expires_at,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Expiration instant in epoch seconds.
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expires_at, 0).single()
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now.timestamp()
    }

    /// The `sub` claim, when the token carries one.
    pub fn subject(&self) -> Option<String> {
        let payload = self.raw.split('.').nth(1)?;
        decode_claims(payload).ok()?.sub
    }
}

fn decode_claims(payload: &str) -> Result<Claims, MalformedToken> {
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| MalformedToken::Encoding)?;
    serde_json::from_slice(&bytes).map_err(|err| MalformedToken::Claims(err.to_string()))
}

// `exp` is a NumericDate; some issuers emit it as a float.
fn expiry_seconds(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

/// Strip the framing some backends put around a token body.
pub fn normalize_token_body(body: &str) -> &str {
    let trimmed = body.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(trimmed)
}
