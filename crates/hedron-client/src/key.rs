//! Ed25519 keys and the signing seam used by transactions.

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use hedron_common::{AccountId, HedronError, Result, SignaturePair};
use rand::rngs::OsRng;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Produces signatures over transaction body bytes.
pub trait Signer: Send + Sync {
    fn public_key(&self) -> PublicKey;
    fn sign(&self, message: &[u8]) -> Vec<u8>;
}

#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    pub fn generate() -> Self {
        Self(SigningKey::generate(&mut OsRng))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            HedronError::Signature(format!("private key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(SigningKey::from_bytes(&bytes)))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }
}

impl Signer for PrivateKey {
    fn public_key(&self) -> PublicKey {
        PrivateKey::public_key(self)
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.0.sign(message).to_bytes().to_vec()
    }
}

impl FromStr for PrivateKey {
    type Err = HedronError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| HedronError::Signature(format!("invalid private key hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrivateKey").field(&self.public_key().to_string()).finish()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            HedronError::Signature(format!("public key must be 32 bytes, got {}", bytes.len()))
        })?;
        VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|e| HedronError::Signature(format!("invalid public key: {}", e)))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let signature = Signature::from_slice(signature)
            .map_err(|e| HedronError::Signature(format!("malformed signature: {}", e)))?;
        self.0
            .verify(message, &signature)
            .map_err(|_| HedronError::Signature("signature does not match".to_string()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_bytes()))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

impl FromStr for PublicKey {
    type Err = HedronError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| HedronError::Signature(format!("invalid public key hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}

/// The account paying for requests and the key that signs for it.
#[derive(Clone)]
pub struct Operator {
    pub account_id: AccountId,
    pub signer: Arc<dyn Signer>,
}

impl Operator {
    pub fn new(account_id: AccountId, key: PrivateKey) -> Self {
        Self {
            account_id,
            signer: Arc::new(key),
        }
    }

    pub fn with_signer(account_id: AccountId, signer: Arc<dyn Signer>) -> Self {
        Self { account_id, signer }
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("account_id", &self.account_id)
            .field("public_key", &self.signer.public_key())
            .finish()
    }
}

pub(crate) fn signature_pair(signer: &dyn Signer, body_bytes: &[u8]) -> SignaturePair {
    SignaturePair {
        public_key_prefix: signer.public_key().to_bytes().to_vec(),
        signature: signer.sign(body_bytes),
    }
}
