//! JWT claims and verification interface.
//!
//! The library consumes JWTs (the `authorization` bearer token is part of
//! the signed payload) but never mints or verifies them itself; verification
//! is delegated through the [`Verifier`] trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The claims of a JWT this library cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The verified email address of the token subject.
    #[serde(rename = "email")]
    pub verified_email: String,
}

/// Verifies a JWT and extracts its claims.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Verifies the given token.
    async fn verify(&self, token: &str) -> Result<Claims>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_serde() {
        let claims: Claims = serde_json::from_str(r#"{"email":"user@example.com"}"#).unwrap();
        assert_eq!(claims.verified_email, "user@example.com");

        let json = serde_json::to_string(&claims).unwrap();
        assert_eq!(json, r#"{"email":"user@example.com"}"#);
    }
}
