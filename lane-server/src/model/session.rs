//! Session tokens
//!
//! Sessions are stateless: the token handed to the client is the only record of the session.
//! Tokens are PASETO `v4.local` tokens - the claims are encrypted and authenticated with a
//! symmetric key derived from the configured secret, so any token that decodes correctly was
//! issued by this service (or by another process sharing the secret).
//!
//! There is no revocation. A token stays valid until it expires, even if the user logs out in
//! the meantime, and changing the secret invalidates every issued token.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, SubsecRound, TimeDelta, Utc};
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::version4::V4;
use pasetors::{Local, local};
use sha3::{Digest, Sha3_256};
use thiserror::Error;

use crate::model::users::UserId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Session signing secret is not configured")]
    MissingSecret,
    #[error("Cannot sign session token")]
    Signing(#[source] pasetors::errors::Error),
    #[error("Invalid or expired token")]
    InvalidToken,
}

/// PASETO implicit assertion for session tokens
const SESSION_IMPLICIT_ASSERTION: &[u8] = b"SecretlaneSessionToken";

/// How long session is valid after login
const SESSION_LIFETIME_HOURS: i64 = 24;

/// Custom claim carrying the user id
const USER_ID_CLAIM: &str = "uid";

/// Session token as handed to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Decoded session token payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: UserId,
    /// Also the token subject
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionClaims {
    /// Claims of a session starting at `now`
    ///
    /// Timestamps are kept with a second precision, as this is what ends up in the token.
    fn new(user_id: UserId, username: &str, now: DateTime<Utc>) -> Self {
        let issued_at = now.trunc_subsecs(0);
        Self {
            user_id,
            username: username.to_owned(),
            issued_at,
            expires_at: issued_at + TimeDelta::hours(SESSION_LIFETIME_HOURS),
        }
    }

    /// Builds PASETO claims
    fn to_claims(&self) -> Result<Claims, pasetors::errors::Error> {
        let issued_at = self.issued_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let expires_at = self.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut claims = Claims::new()?;
        claims.issued_at(&issued_at)?;
        claims.not_before(&issued_at)?;
        claims.expiration(&expires_at)?;
        claims.subject(&self.username)?;
        claims.add_additional(USER_ID_CLAIM, self.user_id.get())?;
        Ok(claims)
    }

    /// Reads session claims back, `None` if anything is missing or malformed
    fn from_claims(claims: &Claims) -> Option<Self> {
        let timestamp = |claim| {
            claims
                .get_claim(claim)?
                .as_str()?
                .parse::<DateTime<Utc>>()
                .ok()
        };

        let username = claims.get_claim("sub")?.as_str()?;
        if username.is_empty() {
            return None;
        }

        Some(Self {
            user_id: UserId::new(claims.get_claim(USER_ID_CLAIM)?.as_i64()?),
            username: username.to_owned(),
            issued_at: timestamp("iat")?,
            expires_at: timestamp("exp")?,
        })
    }
}

/// Issues and verifies session tokens
#[derive(Clone)]
pub struct TokenCodec {
    key: Arc<SymmetricKey<V4>>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Creates codec keyed by the secret
    ///
    /// An empty secret is refused - the service can't authenticate anyone without it.
    pub fn new(secret: &str) -> Result<Self, Error> {
        if secret.is_empty() {
            return Err(Error::MissingSecret);
        }

        let key: [u8; 32] = Sha3_256::digest(secret.as_bytes()).into();
        let key = SymmetricKey::<V4>::from(&key).map_err(Error::Signing)?;

        Ok(Self { key: Arc::new(key) })
    }

    /// Issues a token valid for 24 hours from now
    pub fn issue(&self, user_id: UserId, username: &str) -> Result<SessionToken, Error> {
        self.issue_at(user_id, username, Utc::now())
    }

    fn issue_at(
        &self,
        user_id: UserId,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionToken, Error> {
        let claims = SessionClaims::new(user_id, username, now)
            .to_claims()
            .map_err(Error::Signing)?;

        let token = local::encrypt(&self.key, &claims, None, Some(SESSION_IMPLICIT_ASSERTION))
            .map_err(Error::Signing)?;

        Ok(SessionToken(token))
    }

    /// Verifies the token returning its claims
    ///
    /// Malformed, tampered, foreign and expired tokens are all reported the same way. There is
    /// no leeway on expiration.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, Error> {
        let token =
            UntrustedToken::<Local, V4>::try_from(token).map_err(|_| Error::InvalidToken)?;

        let rules = ClaimsValidationRules::new();
        let token = local::decrypt(
            &self.key,
            &token,
            &rules,
            None,
            Some(SESSION_IMPLICIT_ASSERTION),
        )
        .map_err(|_| Error::InvalidToken)?;

        let claims = token.payload_claims().ok_or(Error::InvalidToken)?;
        SessionClaims::from_claims(claims).ok_or(Error::InvalidToken)
    }
}
