//! Share transport encryption
//!
//! Round-2 shares travel as hybrid ElGamal ciphertexts `(U, c)` with
//! `U = r*g` and `c = share + H(r*PK_j, U)`, where `H` maps 64 bytes of
//! BLAKE3 output onto a scalar. Only the holder of `sk_j` recomputes the mask.

use crate::generator;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use quorum_hash::derive_wide;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

const SHARE_MASK_CONTEXT: &str = "quorum 2025-01 round2 share mask";

/// Encrypted secret share addressed to one member
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareCiphertext {
    pub u: RistrettoPoint,
    pub c: Scalar,
}

impl ShareCiphertext {
    /// Encrypt `share` to `recipient`
    pub fn encrypt<R: RngCore + CryptoRng>(
        share: &Scalar,
        recipient: &RistrettoPoint,
        rng: &mut R,
    ) -> Self {
        let r = Scalar::random(rng);
        let u = generator() * r;
        let shared = recipient * r;
        Self {
            u,
            c: share + mask(&shared, &u),
        }
    }

    /// Decrypt with the recipient's secret key
    pub fn decrypt(&self, secret: &Scalar) -> Scalar {
        let shared = self.u * secret;
        self.c - mask(&shared, &self.u)
    }

    /// Placeholder written into a dealer's own slot
    pub fn sentinel() -> Self {
        Self {
            u: RistrettoPoint::identity(),
            c: Scalar::ZERO,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::sentinel()
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(self.u.compress().as_bytes());
        out[32..].copy_from_slice(self.c.as_bytes());
        out
    }
}

fn mask(shared: &RistrettoPoint, u: &RistrettoPoint) -> Scalar {
    let wide: [u8; 64] = derive_wide(
        SHARE_MASK_CONTEXT,
        &[shared.compress().as_bytes(), u.compress().as_bytes()],
    );
    Scalar::from_bytes_mod_order_wide(&wide)
}
