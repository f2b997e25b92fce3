//! Signed bearer claims.
//!
//! The claim collaborator issues and verifies compact Ed25519-signed tokens
//! of the form `base64url(json-claims) "." base64url(signature)`. Everything
//! downstream of [`TokenSigner::verify`] treats the decoded claim as an
//! opaque, pre-verified identity context; no other component touches
//! cryptography.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constants::{CHAT_CLAIM_TTL_SECS, SESSION_TTL_SECS};
use crate::error::ClaimError;
use crate::types::{ChatUserId, ChatUserKey};

/// Anything carried inside a signed token must expose its expiry so
/// [`TokenSigner::verify`] can reject stale tokens uniformly.
pub trait Expiring {
    fn expires_at(&self) -> DateTime<Utc>;
}

/// Identity context attached to every chat operation after authentication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectClaim {
    pub tenant_app_id: String,
    pub external_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ConnectClaim {
    /// Issue a fresh claim for the given identity, valid for the chat claim
    /// TTL starting now.
    pub fn issue(key: &ChatUserKey) -> Self {
        let now = Utc::now();
        Self {
            tenant_app_id: key.tenant_app_id.clone(),
            external_id: key.external_id.clone(),
            issued_at: now,
            expires_at: now + Duration::seconds(CHAT_CLAIM_TTL_SECS),
        }
    }

    pub fn key(&self) -> ChatUserKey {
        ChatUserKey::new(self.tenant_app_id.clone(), self.external_id.clone())
    }

    /// The opaque chat-user id this claim resolves to.
    pub fn user_id(&self) -> ChatUserId {
        self.key().derived_id()
    }
}

impl Expiring for ConnectClaim {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// Portal session claim for the management API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaim {
    pub user_id: i64,
    pub email: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionClaim {
    pub fn issue(user_id: i64, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            email: email.into(),
            issued_at: now,
            expires_at: now + Duration::seconds(SESSION_TTL_SECS),
        }
    }
}

impl Expiring for SessionClaim {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// Ed25519 token signer/verifier.
pub struct TokenSigner {
    signing_key: SigningKey,
}

impl TokenSigner {
    /// Build a signer from a 32-byte seed (e.g. loaded from configuration).
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Generate an ephemeral signer. Tokens issued by it become worthless on
    /// restart; intended for development only.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Serialize and sign a claim into a bearer token.
    pub fn issue<C: Serialize>(&self, claim: &C) -> Result<String, ClaimError> {
        let payload = serde_json::to_vec(claim)?;
        let signature = self.signing_key.sign(&payload);
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }

    /// Verify a bearer token back into its claim.
    ///
    /// The signature is checked before the payload is deserialized, and the
    /// claim's expiry is checked last.
    pub fn verify<C: DeserializeOwned + Expiring>(&self, token: &str) -> Result<C, ClaimError> {
        let (payload_b64, signature_b64) =
            token.split_once('.').ok_or(ClaimError::Malformed)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| ClaimError::Malformed)?;
        let signature_bytes = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| ClaimError::Malformed)?;
        let signature =
            Signature::from_slice(&signature_bytes).map_err(|_| ClaimError::Malformed)?;

        self.signing_key
            .verifying_key()
            .verify(&payload, &signature)
            .map_err(|_| ClaimError::BadSignature)?;

        let claim: C = serde_json::from_slice(&payload)?;
        if Utc::now() > claim.expires_at() {
            return Err(ClaimError::Expired);
        }
        Ok(claim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key() -> ChatUserKey {
        ChatUserKey::new("acme", "u-1")
    }

    #[test]
    fn connect_claim_round_trips() {
        let signer = TokenSigner::generate();
        let claim = ConnectClaim::issue(&sample_key());

        let token = signer.issue(&claim).unwrap();
        let decoded: ConnectClaim = signer.verify(&token).unwrap();

        assert_eq!(decoded, claim);
        assert_eq!(decoded.user_id(), sample_key().derived_id());
    }

    #[test]
    fn expired_claim_rejected() {
        let signer = TokenSigner::generate();
        let mut claim = ConnectClaim::issue(&sample_key());
        claim.issued_at = Utc::now() - Duration::hours(2);
        claim.expires_at = Utc::now() - Duration::hours(1);

        let token = signer.issue(&claim).unwrap();
        assert!(matches!(
            signer.verify::<ConnectClaim>(&token),
            Err(ClaimError::Expired)
        ));
    }

    #[test]
    fn wrong_key_rejected() {
        let signer = TokenSigner::generate();
        let other = TokenSigner::generate();
        let token = signer.issue(&ConnectClaim::issue(&sample_key())).unwrap();

        assert!(matches!(
            other.verify::<ConnectClaim>(&token),
            Err(ClaimError::BadSignature)
        ));
    }

    #[test]
    fn tampered_payload_rejected() {
        let signer = TokenSigner::generate();
        let token = signer.issue(&ConnectClaim::issue(&sample_key())).unwrap();

        let (payload_b64, signature_b64) = token.split_once('.').unwrap();
        let mut payload = URL_SAFE_NO_PAD.decode(payload_b64).unwrap();
        // Flip one byte inside the JSON payload.
        payload[10] ^= 0x01;
        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode(&payload), signature_b64);

        assert!(matches!(
            signer.verify::<ConnectClaim>(&forged),
            Err(ClaimError::BadSignature)
        ));
    }

    #[test]
    fn garbage_token_is_malformed() {
        let signer = TokenSigner::generate();
        assert!(matches!(
            signer.verify::<ConnectClaim>("not-a-token"),
            Err(ClaimError::Malformed)
        ));
    }

    #[test]
    fn session_claim_round_trips() {
        let signer = TokenSigner::from_seed(&[7u8; 32]);
        let claim = SessionClaim::issue(42, "ops@example.com");

        let token = signer.issue(&claim).unwrap();
        let decoded: SessionClaim = signer.verify(&token).unwrap();
        assert_eq!(decoded.user_id, 42);
        assert_eq!(decoded.email, "ops@example.com");
    }
}
