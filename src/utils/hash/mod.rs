use rabe_bn::Fr;
use sha3::{
    Digest,
    Sha3_256
};
use std::ops::Mul;

/// Hashes an attribute name onto the group generated by `g`
/// ([`rabe_bn::G1`] or [`rabe_bn::G2`]).
pub fn sha3_hash<T: Mul<Fr, Output = T>>(g: T, data: &str) -> T {
    g * sha3_hash_fr(data)
}

/// Hashes a string into [`rabe_bn::Fr`]; the 256-bit digest is reduced
/// modulo the group order.
pub fn sha3_hash_fr(data: &str) -> Fr {
    let digest = sha3_key(data.as_bytes());
    let mut acc = Fr::zero();
    for byte in digest.iter() {
        for bit in (0..8).rev() {
            acc = acc + acc;
            if (byte >> bit) & 1 == 1 {
                acc = acc + Fr::one();
            }
        }
    }
    acc
}

/// SHA3-256 digest as a 32-byte key.
pub fn sha3_key(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}
