//! QUORUM Hash Functions
//!
//! - Poseidon: field-native hash for tree nodes, leaves and the action chain
//! - BLAKE3: byte-level key derivation (share transport, domain tags)

pub mod poseidon;

pub use poseidon::{
    field_from_canonical_bytes, field_to_bytes, hash_bytes, hash_fields, hash_two, Field,
    FieldSponge,
};

/// Derive `N` bytes of key material under a BLAKE3 derivation context
pub fn derive_wide<const N: usize>(context: &str, inputs: &[&[u8]]) -> [u8; N] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for input in inputs {
        hasher.update(input);
    }
    let mut out = [0u8; N];
    hasher.finalize_xof().fill(&mut out);
    out
}

/// Field element rendered as lowercase hex (little-endian canonical bytes)
pub fn field_to_hex(element: &Field) -> String {
    hex::encode(field_to_bytes(element))
}

/// Serde adapter storing a [`Field`] as a hex string.
///
/// Deserialization rejects non-canonical encodings.
pub mod field_hex {
    use super::{field_from_canonical_bytes, field_to_hex, Field};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(element: &Field, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&field_to_hex(element))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Field, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(D::Error::custom)?;
        if bytes.len() != 32 {
            return Err(D::Error::custom(format!("expected 32 bytes, got {}", bytes.len())));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        field_from_canonical_bytes(&arr)
            .ok_or_else(|| D::Error::custom("non-canonical field element"))
    }
}

/// Serde adapter for `Vec<Field>`
pub mod field_hex_vec {
    use super::{field_from_canonical_bytes, field_to_hex, Field};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(elements: &[Field], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded: Vec<String> = elements.iter().map(field_to_hex).collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Field>, D::Error> {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|s| {
                let bytes = hex::decode(s).map_err(D::Error::custom)?;
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| D::Error::custom("expected 32 bytes"))?;
                field_from_canonical_bytes(&arr)
                    .ok_or_else(|| D::Error::custom("non-canonical field element"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Wrapped {
        #[serde(with = "field_hex")]
        value: Field,
    }

    #[test]
    fn test_derive_wide_absorbs_every_input() {
        let a: [u8; 32] = derive_wide("quorum test", &[b"ab", b"cd"]);
        let b: [u8; 32] = derive_wide("quorum test", &[b"ab", b"ce"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_wide_is_context_separated() {
        let a: [u8; 64] = derive_wide("quorum test a", &[b"input"]);
        let b: [u8; 64] = derive_wide("quorum test b", &[b"input"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_field_hex_serde() {
        let wrapped = Wrapped { value: Field::from(987_654_321u64) };
        let json = serde_json::to_string(&wrapped).unwrap();
        let back: Wrapped = serde_json::from_str(&json).unwrap();
        assert_eq!(wrapped, back);
    }

    #[test]
    fn test_field_hex_rejects_non_canonical() {
        let json = format!("{{\"value\":\"{}\"}}", "ff".repeat(32));
        assert!(serde_json::from_str::<Wrapped>(&json).is_err());
    }
}
