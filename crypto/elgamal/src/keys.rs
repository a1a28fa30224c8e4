//! Member transport keys

use crate::generator;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, RngCore};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A committee member's long-term keypair.
///
/// The public half is what gets registered in the member tree; the secret
/// half decrypts round-2 shares addressed to this member.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MemberKeypair {
    secret: Scalar,
    #[zeroize(skip)]
    public: RistrettoPoint,
}

impl MemberKeypair {
    /// Generate a fresh keypair
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_secret(Scalar::random(rng))
    }

    /// Rebuild a keypair from a stored secret
    pub fn from_secret(secret: Scalar) -> Self {
        Self {
            public: generator() * secret,
            secret,
        }
    }

    pub fn secret(&self) -> &Scalar {
        &self.secret
    }

    pub fn public(&self) -> RistrettoPoint {
        self.public
    }
}

impl fmt::Debug for MemberKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberKeypair")
            .field("public", &hex::encode(self.public.compress().as_bytes()))
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
