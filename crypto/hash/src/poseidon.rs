//! Poseidon over the BN254 scalar field
//!
//! Every commitment in the protocol (tree nodes, leaf encodings, the action
//! cursor and the fold transcript) is a Poseidon digest. The sponge runs with
//! width 3 (rate 2, capacity 1), 8 full and 57 partial rounds and an x^5 S-box.

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::{PoseidonConfig, PoseidonSponge};
use ark_crypto_primitives::sponge::CryptographicSponge;
use ark_ff::{Field as _, PrimeField};
use once_cell::sync::Lazy;

/// Native field of every commitment in the protocol
pub type Field = Fr;

const RATE: usize = 2;
const CAPACITY: usize = 1;
const WIDTH: usize = RATE + CAPACITY;
const FULL_ROUNDS: usize = 8;
const PARTIAL_ROUNDS: usize = 57;
const SBOX_ALPHA: u64 = 5;

/// Domain for the round-constant stream
const CONSTANTS_CONTEXT: &str = "quorum poseidon round constants v1";

/// Bytes packed into one field element when absorbing raw data
const CHUNK_BYTES: usize = 31;

static SPONGE_CONFIG: Lazy<PoseidonConfig<Fr>> = Lazy::new(build_config);

fn build_config() -> PoseidonConfig<Fr> {
    let mut stream = blake3::Hasher::new_derive_key(CONSTANTS_CONTEXT).finalize_xof();
    let round_constants = (0..FULL_ROUNDS + PARTIAL_ROUNDS)
        .map(|_| {
            (0..WIDTH)
                .map(|_| {
                    let mut wide = [0u8; 64];
                    stream.fill(&mut wide);
                    Fr::from_le_bytes_mod_order(&wide)
                })
                .collect()
        })
        .collect();

    // Cauchy matrix 1 / (x_i + y_j) with x_i = i, y_j = WIDTH + j
    let mds = (0..WIDTH as u64)
        .map(|row| {
            (0..WIDTH as u64)
                .map(|col| {
                    Fr::from(row + WIDTH as u64 + col)
                        .inverse()
                        .unwrap_or(Fr::from(1u64))
                })
                .collect()
        })
        .collect();

    PoseidonConfig::new(
        FULL_ROUNDS,
        PARTIAL_ROUNDS,
        SBOX_ALPHA,
        mds,
        round_constants,
        RATE,
        CAPACITY,
    )
}

/// Incremental Poseidon sponge over the shared parameters
#[derive(Clone)]
pub struct FieldSponge {
    inner: PoseidonSponge<Fr>,
}

impl FieldSponge {
    pub fn new() -> Self {
        Self {
            inner: PoseidonSponge::new(&*SPONGE_CONFIG),
        }
    }

    pub fn absorb(&mut self, element: &Fr) -> &mut Self {
        self.inner.absorb(element);
        self
    }

    pub fn absorb_u64(&mut self, value: u64) -> &mut Self {
        self.absorb(&Fr::from(value))
    }

    /// Length-prefixed, then packed little-endian in 31-byte chunks
    pub fn absorb_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.absorb_u64(data.len() as u64);
        for chunk in data.chunks(CHUNK_BYTES) {
            self.inner.absorb(&Fr::from_le_bytes_mod_order(chunk));
        }
        self
    }

    pub fn squeeze(mut self) -> Fr {
        self.inner
            .squeeze_field_elements::<Fr>(1)
            .pop()
            .unwrap_or_default()
    }
}

impl Default for FieldSponge {
    fn default() -> Self {
        Self::new()
    }
}

/// Two-to-one compression for tree nodes
pub fn hash_two(left: &Fr, right: &Fr) -> Fr {
    let mut sponge = FieldSponge::new();
    sponge.absorb(left).absorb(right);
    sponge.squeeze()
}

pub fn hash_fields(elements: &[Fr]) -> Fr {
    let mut sponge = FieldSponge::new();
    for element in elements {
        sponge.absorb(element);
    }
    sponge.squeeze()
}

/// Map arbitrary bytes into the field
pub fn hash_bytes(data: &[u8]) -> Fr {
    let mut sponge = FieldSponge::new();
    sponge.absorb_bytes(data);
    sponge.squeeze()
}

/// Canonical little-endian encoding
pub fn field_to_bytes(element: &Fr) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (slot, limb) in out.chunks_exact_mut(8).zip(element.into_bigint().0) {
        slot.copy_from_slice(&limb.to_le_bytes());
    }
    out
}

/// Inverse of [`field_to_bytes`]; `None` when the bytes are not a reduced element
pub fn field_from_canonical_bytes(bytes: &[u8; 32]) -> Option<Fr> {
    let element = Fr::from_le_bytes_mod_order(bytes);
    (field_to_bytes(&element) == *bytes).then_some(element)
}
