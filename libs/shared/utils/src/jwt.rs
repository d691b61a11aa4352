use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use shared_models::auth::{JwtClaims, JwtHeader, User};

use crate::identity::IdentityError;

type HmacSha256 = Hmac<Sha256>;

fn rejected(reason: &str) -> IdentityError {
    IdentityError::Unauthenticated(reason.to_string())
}

fn decode_json<T: serde::de::DeserializeOwned>(segment: &str, what: &str) -> Result<T, IdentityError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| rejected(&format!("Invalid {} encoding", what)))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        debug!("Failed to parse token {}: {}", what, e);
        rejected(&format!("Invalid {} format", what))
    })
}

/// Verifies an HS256 token and returns the identity it carries.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, IdentityError> {
    if jwt_secret.is_empty() {
        return Err(rejected("JWT secret is not set"));
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(rejected("Invalid token format"));
    }
    let (header_b64, claims_b64, signature_b64) = (parts[0], parts[1], parts[2]);

    let header: JwtHeader = decode_json(header_b64, "header")?;
    if header.alg != "HS256" {
        debug!("Rejecting token signed with {}", header.alg);
        return Err(rejected("Unsupported token algorithm"));
    }

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        debug!("Failed to decode signature: {}", e);
        rejected("Invalid signature encoding")
    })?;

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| rejected("Failed to create HMAC"))?;
    mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());
    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err(rejected("Invalid token signature"));
    }

    let claims: JwtClaims = decode_json(claims_b64, "claims")?;

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp().max(0) as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err(rejected("Token expired"));
        }
    }

    let created_at = claims
        .iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = User {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        created_at,
    };

    debug!("Token validated successfully for subject: {}", user.id);
    Ok(user)
}
