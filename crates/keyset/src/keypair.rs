//! Application key-pair generation.

use num_bigint::BigUint;
use rsa::{
    RsaPrivateKey,
    traits::{PrivateKeyParts, PublicKeyParts},
};

use crate::{
    config::{DEFAULT_KEY_BITS, KeySetStoreConfig},
    error::{KeySetError, KeySetResult},
    signature::KeyPairHolder,
};

/// Produces fresh asymmetric key pairs for new key-set versions.
///
/// Called once per successful
/// [`create_signature_set`](crate::KeySetStore::create_signature_set), on a
/// blocking thread, so implementations may do CPU-heavy work.
pub trait KeyPairSource: Send + Sync {
    /// Generates a new key pair.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::KeyGeneration`] if no key pair can be produced.
    fn create_key_pair(&self) -> KeySetResult<KeyPairHolder>;

    /// Modulus size of the pairs this source generates, if it has a fixed one.
    ///
    /// [`KeySetStore::new`](crate::KeySetStore::new) rejects a source whose
    /// size differs from the configured `key_bits`.
    fn modulus_bits(&self) -> Option<usize> {
        None
    }
}

/// RSA key pairs from the operating system's CSPRNG.
#[derive(Debug, Clone, Copy)]
pub struct RsaKeyPairSource {
    bits: usize,
}

impl RsaKeyPairSource {
    /// Creates a source that generates `bits`-bit moduli.
    #[must_use]
    pub fn new(bits: usize) -> Self {
        Self { bits }
    }

    /// Creates a source for the configured `key_bits`.
    #[must_use]
    pub fn from_config(config: &KeySetStoreConfig) -> Self {
        Self::new(config.key_bits())
    }

    /// Returns the modulus size in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.bits
    }
}

impl Default for RsaKeyPairSource {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_BITS)
    }
}

impl KeyPairSource for RsaKeyPairSource {
    #[tracing::instrument(skip(self), fields(bits = self.bits))]
    fn create_key_pair(&self) -> KeySetResult<KeyPairHolder> {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, self.bits)
            .map_err(|e| KeySetError::key_generation_with_source("RSA key generation failed", e))?;

        let modulus = to_biguint(key.n());
        Ok(KeyPairHolder::new(modulus.clone(), to_biguint(key.d()), modulus, to_biguint(key.e())))
    }

    fn modulus_bits(&self) -> Option<usize> {
        Some(self.bits)
    }
}

// `rsa` carries its own big-integer type; convert through big-endian bytes.
fn to_biguint(value: &rsa::BigUint) -> BigUint {
    BigUint::from_bytes_be(&value.to_bytes_be())
}
