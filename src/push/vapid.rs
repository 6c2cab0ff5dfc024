use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Push services reject VAPID tokens valid for more than 24 hours.
const TOKEN_LIFETIME_HOURS: i64 = 12;

#[derive(Debug, Error)]
pub enum VapidError {
    #[error("invalid VAPID private key: {0}")]
    InvalidKey(String),

    #[error("invalid push endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("failed to sign VAPID token: {0}")]
    Signing(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VapidClaims {
    pub aud: String,
    pub exp: i64,
    pub sub: String,
}

/// Application-server identity used to authorize pushes (RFC 8292).
pub struct VapidSigner {
    key: EncodingKey,
    public_key: String,
    subject: String,
}

impl VapidSigner {
    /// `private_key_pem` is a PKCS#8 P-256 key; `public_key` is the matching
    /// uncompressed point, base64url encoded, as handed to browsers.
    pub fn new(
        private_key_pem: &str,
        public_key: impl Into<String>,
        admin_email: &str,
    ) -> Result<Self, VapidError> {
        let key = EncodingKey::from_ec_pem(private_key_pem.as_bytes())
            .map_err(|e| VapidError::InvalidKey(e.to_string()))?;

        let subject = if admin_email.starts_with("mailto:") || admin_email.starts_with("https://") {
            admin_email.to_string()
        } else {
            format!("mailto:{}", admin_email)
        };

        Ok(Self {
            key,
            public_key: public_key.into(),
            subject,
        })
    }

    /// Value for the `Authorization` header of a push to `endpoint`.
    pub fn authorization(&self, endpoint: &str) -> Result<String, VapidError> {
        let claims = VapidClaims {
            aud: audience(endpoint)?,
            exp: (Utc::now() + Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp(),
            sub: self.subject.clone(),
        };

        let token = encode(&Header::new(Algorithm::ES256), &claims, &self.key)
            .map_err(|e| VapidError::Signing(e.to_string()))?;

        Ok(format!("vapid t={}, k={}", token, self.public_key))
    }
}

/// The origin of the push service, which is the token audience.
fn audience(endpoint: &str) -> Result<String, VapidError> {
    let url = Url::parse(endpoint).map_err(|_| VapidError::InvalidEndpoint(endpoint.to_string()))?;

    if !matches!(url.scheme(), "https" | "http") || url.host_str().is_none() {
        return Err(VapidError::InvalidEndpoint(endpoint.to_string()));
    }

    Ok(url.origin().ascii_serialization())
}
