use std::{fs, path::Path};

use anyhow::{Context, anyhow};
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::{
    error::{Error, Result},
    tx_format::{pubkey::PublicKey, signature::Signature},
};

pub const SECRET_KEY_LENGTH: usize = 32;
/// Secret seed followed by the public key, the layout of Solana keypair files.
pub const KEYPAIR_LENGTH: usize = 64;

/// Anything able to produce a detached Ed25519 signature for a public key.
pub trait Signer {
    fn public_key(&self) -> PublicKey;

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature>;
}

pub struct Keypair(SigningKey);

impl Keypair {
    pub fn new() -> Self {
        Self(SigningKey::generate(&mut OsRng))
    }

    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self(SigningKey::from_bytes(seed))
    }

    /// Accepts the 64-byte `seed || public key` form; the public half must
    /// match the seed.
    pub fn from_secret_key(bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; KEYPAIR_LENGTH] = bytes.try_into().map_err(|_| {
            Error::InvalidKeypair(format!(
                "expected {KEYPAIR_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        SigningKey::from_keypair_bytes(bytes)
            .map(Self)
            .map_err(|err| Error::InvalidKeypair(err.to_string()))
    }

    pub fn to_bytes(&self) -> [u8; KEYPAIR_LENGTH] {
        self.0.to_keypair_bytes()
    }

    pub fn secret(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.0.to_bytes()
    }
}

impl Default for Keypair {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Keypair({})", self.public_key())
    }
}

impl Signer for Keypair {
    fn public_key(&self) -> PublicKey {
        PublicKey::new_from_array(self.0.verifying_key().to_bytes())
    }

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature> {
        Ok(Signature::new_from_array(self.0.sign(message).to_bytes()))
    }
}

/// Strict Ed25519 check of a detached signature. Keys that are not valid
/// curve points simply fail verification.
pub fn verify_signature(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key.as_array()) else {
        return false;
    };
    let signature = ed25519_dalek::Signature::from_bytes(&signature.to_bytes());
    verifying_key.verify_strict(message, &signature).is_ok()
}

/// Parses the Solana CLI keypair format: a JSON array of 64 bytes.
pub fn parse_keypair_json(data: &str) -> anyhow::Result<Keypair> {
    let bytes: Vec<u8> = serde_json::from_str(data).context("invalid keypair JSON")?;
    Keypair::from_secret_key(&bytes).map_err(|err| anyhow!("Invalid keypair: {err}"))
}

pub fn read_keypair_file(path: impl AsRef<Path>) -> anyhow::Result<Keypair> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read keypair file {}", path.display()))?;
    parse_keypair_json(&data).with_context(|| format!("invalid keypair file {}", path.display()))
}
