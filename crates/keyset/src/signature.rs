//! Key material value objects.

use std::fmt;

use num_bigint::BigUint;

/// An RSA public key as a (modulus, public exponent) pair.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    modulus: BigUint,
    exponent: BigUint,
}

impl Signature {
    /// Creates a signature from its modulus and public exponent.
    #[must_use]
    pub fn new(modulus: BigUint, exponent: BigUint) -> Self {
        Self { modulus, exponent }
    }

    /// Returns the modulus.
    #[must_use]
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Returns the public exponent.
    #[must_use]
    pub fn exponent(&self) -> &BigUint {
        &self.exponent
    }

    pub(crate) fn is_zero(&self) -> bool {
        self.modulus.bits() == 0 || self.exponent.bits() == 0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("modulus_bits", &self.modulus.bits())
            .field("exponent", &self.exponent.to_string())
            .finish()
    }
}

/// Everything stored for one tenant at one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSet {
    /// Version the key set was written under.
    pub version: String,
    /// Public half of the application key pair generated for this version.
    pub application_signature: Signature,
    /// Identity-manager public key supplied when the version was created.
    pub identity_manager_signature: Signature,
}

/// A freshly generated application key pair.
///
/// Debug output never includes the private exponent.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPairHolder {
    private_modulus: BigUint,
    private_exponent: BigUint,
    public_modulus: BigUint,
    public_exponent: BigUint,
}

impl KeyPairHolder {
    /// Creates a key pair from its private and public components.
    #[must_use]
    pub fn new(
        private_modulus: BigUint,
        private_exponent: BigUint,
        public_modulus: BigUint,
        public_exponent: BigUint,
    ) -> Self {
        Self { private_modulus, private_exponent, public_modulus, public_exponent }
    }

    /// Returns the private modulus.
    #[must_use]
    pub fn private_modulus(&self) -> &BigUint {
        &self.private_modulus
    }

    /// Returns the private exponent.
    #[must_use]
    pub fn private_exponent(&self) -> &BigUint {
        &self.private_exponent
    }

    /// Returns the public half as a [`Signature`].
    #[must_use]
    pub fn public_signature(&self) -> Signature {
        Signature::new(self.public_modulus.clone(), self.public_exponent.clone())
    }
}

impl fmt::Debug for KeyPairHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPairHolder")
            .field("modulus_bits", &self.public_modulus.bits())
            .field("public_exponent", &self.public_exponent.to_string())
            .finish_non_exhaustive()
    }
}
