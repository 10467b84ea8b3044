//! Admin sign-in by wallet signature.
//!
//! A configured admin wallet signs an arbitrary message with its ed25519 key;
//! a valid signature buys a bearer session token that the admin gate accepts
//! alongside the static admin token.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::Digest as _;
use tracing::debug;

pub(crate) const SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Debug, thiserror::Error)]
pub(crate) enum WalletAuthError {
    #[error("wallet is not an admin")]
    NotAdmin,
    #[error("public key is not a base58 ed25519 key")]
    BadKey,
    #[error("signature must be 64 bytes")]
    BadSignature,
    #[error("signature does not verify")]
    Mismatch,
}

/// Check `signature` over `message` against a base58-encoded ed25519 public key.
pub(crate) fn verify_signature(
    public_key: &str,
    message: &[u8],
    signature: &[u8],
) -> Result<(), WalletAuthError> {
    let pk_bytes = bs58::decode(public_key.trim())
        .into_vec()
        .map_err(|_| WalletAuthError::BadKey)?;
    let pk_array: [u8; 32] = pk_bytes
        .as_slice()
        .try_into()
        .map_err(|_| WalletAuthError::BadKey)?;
    let verifying_key = VerifyingKey::from_bytes(&pk_array).map_err(|_| WalletAuthError::BadKey)?;
    let sig_array: [u8; 64] = signature
        .try_into()
        .map_err(|_| WalletAuthError::BadSignature)?;
    verifying_key
        .verify(message, &Signature::from_bytes(&sig_array))
        .map_err(|_| WalletAuthError::Mismatch)
}

fn token_key(token: &str) -> String {
    hex::encode(sha2::Sha256::digest(token.as_bytes()))
}

/// Live admin sessions. Only token digests are kept.
pub(crate) struct AdminSessions {
    ttl: Duration,
    tokens: Mutex<HashMap<String, (String, Instant)>>,
}

impl AdminSessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Verify an admin wallet's signature and open a session for it.
    pub fn sign_in(
        &self,
        admin_wallets: &[String],
        public_key: &str,
        message: &str,
        signature: &[u8],
    ) -> Result<String, WalletAuthError> {
        if !admin_wallets.iter().any(|w| w == public_key) {
            return Err(WalletAuthError::NotAdmin);
        }
        verify_signature(public_key, message.as_bytes(), signature)?;
        Ok(self.issue(public_key))
    }

    fn issue(&self, wallet: &str) -> String {
        let token = hex::encode(rand::random::<[u8; 32]>());
        let now = Instant::now();
        let mut tokens = self.tokens.lock().unwrap_or_else(|p| p.into_inner());
        tokens.retain(|_, (_, expires)| *expires > now);
        tokens.insert(token_key(&token), (wallet.to_string(), now + self.ttl));
        debug!(wallet, live = tokens.len(), "admin session issued");
        token
    }

    pub fn is_valid(&self, token: &str) -> bool {
        let tokens = self.tokens.lock().unwrap_or_else(|p| p.into_inner());
        tokens
            .get(&token_key(token))
            .is_some_and(|(_, expires)| *expires > Instant::now())
    }
}

impl Default for AdminSessions {
    fn default() -> Self {
        Self::new(SESSION_TTL)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    pub(crate) fn admin_key() -> (SigningKey, String) {
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let wallet = bs58::encode(key.verifying_key().to_bytes()).into_string();
        (key, wallet)
    }

    #[test]
    fn valid_signature_verifies() {
        let (key, wallet) = admin_key();
        let sig = key.sign(b"sign in").to_bytes();
        assert!(verify_signature(&wallet, b"sign in", &sig).is_ok());
        assert!(matches!(
            verify_signature(&wallet, b"other message", &sig),
            Err(WalletAuthError::Mismatch)
        ));
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        let (key, wallet) = admin_key();
        let sig = key.sign(b"m").to_bytes();
        assert!(matches!(
            verify_signature("not-base58-0OIl", b"m", &sig),
            Err(WalletAuthError::BadKey)
        ));
        assert!(matches!(
            verify_signature(&wallet, b"m", &sig[..10]),
            Err(WalletAuthError::BadSignature)
        ));
    }

    #[test]
    fn only_listed_wallets_get_sessions() {
        let (key, wallet) = admin_key();
        let sig = key.sign(b"hello").to_bytes();
        let sessions = AdminSessions::default();
        assert!(matches!(
            sessions.sign_in(&["someone-else".into()], &wallet, "hello", &sig),
            Err(WalletAuthError::NotAdmin)
        ));
        let token = sessions
            .sign_in(&[wallet.clone()], &wallet, "hello", &sig)
            .expect("session");
        assert_eq!(token.len(), 64);
        assert!(sessions.is_valid(&token));
        assert!(!sessions.is_valid("made-up"));
    }

    #[test]
    fn expired_sessions_are_refused() {
        let (key, wallet) = admin_key();
        let sig = key.sign(b"hello").to_bytes();
        let sessions = AdminSessions::new(Duration::ZERO);
        let token = sessions
            .sign_in(&[wallet.clone()], &wallet, "hello", &sig)
            .expect("session");
        assert!(!sessions.is_valid(&token));
    }
}
