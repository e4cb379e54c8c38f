//! Attribute-based encryption schemes.
//!
//! * BSW: threshold ciphertext-policy ABE over the BN254 pairing
//!
pub mod bsw;
