//! Ed25519 verification of inbound interaction requests.
//!
//! Discord signs `timestamp || body` with the application's key and sends the
//! signature and timestamp as hex/text headers. Unverified requests must be
//! rejected with `401`.

use crate::error::DiscordError;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Header carrying the hex-encoded signature
pub const SIGNATURE_HEADER: &str = "X-Signature-Ed25519";

/// Header carrying the signed timestamp
pub const TIMESTAMP_HEADER: &str = "X-Signature-Timestamp";

/// Verifies interaction signatures against the application public key.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    key: VerifyingKey,
}

impl SignatureVerifier {
    /// Build from the hex public key shown in the developer portal.
    ///
    /// # Errors
    ///
    /// Returns [`DiscordError::InvalidPublicKey`] if the key is not 32 bytes of
    /// hex or not a valid curve point.
    pub fn from_hex(public_key: &str) -> Result<Self, DiscordError> {
        let bytes = hex::decode(public_key.trim())
            .map_err(|e| DiscordError::InvalidPublicKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| DiscordError::InvalidPublicKey("expected 32 bytes".to_string()))?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| DiscordError::InvalidPublicKey(e.to_string()))?;
        Ok(Self { key })
    }

    /// Build from an already parsed key
    #[must_use]
    pub const fn new(key: VerifyingKey) -> Self {
        Self { key }
    }

    /// Check `signature_hex` over `timestamp || body`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscordError::InvalidSignature`] if the signature is malformed
    /// or does not match.
    pub fn verify(&self, timestamp: &str, body: &[u8], signature_hex: &str) -> Result<(), DiscordError> {
        let raw = hex::decode(signature_hex).map_err(|_| DiscordError::InvalidSignature)?;
        let raw: [u8; 64] = raw.try_into().map_err(|_| DiscordError::InvalidSignature)?;
        let signature = Signature::from_bytes(&raw);

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        self.key
            .verify(&message, &signature)
            .map_err(|_| DiscordError::InvalidSignature)
    }
}
