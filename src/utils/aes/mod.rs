use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
    Nonce
};
use rabe_bn::Gt;
use crate::error::AbacError;
use crate::utils::{hash::sha3_key, tools::random_bytes};

/// AES-256 key length in bytes.
pub const KEY_SIZE: usize = 32;
/// AES-GCM nonce length in bytes (96 bit).
pub const IV_SIZE: usize = 12;

/// A fresh random content key.
pub fn generate_key() -> Vec<u8> {
    random_bytes(KEY_SIZE)
}

/// A fresh random initialization vector.
pub fn generate_iv() -> Vec<u8> {
    random_bytes(IV_SIZE)
}

fn cipher(key: &[u8]) -> Result<Aes256Gcm, AbacError> {
    Aes256Gcm::new_from_slice(key)
        .map_err(|_| AbacError::Crypto(format!("AES-256 key must be {} bytes, got {}", KEY_SIZE, key.len())))
}

fn check_iv(iv: &[u8]) -> Result<(), AbacError> {
    if iv.len() != IV_SIZE {
        return Err(AbacError::Crypto(format!("IV must be {} bytes, got {}", IV_SIZE, iv.len())));
    }
    Ok(())
}

/// AES-256-GCM under an explicit key and IV.
pub fn encrypt_with_key(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, AbacError> {
    check_iv(iv)?;
    Ok(cipher(key)?.encrypt(Nonce::from_slice(iv), plaintext)?)
}

/// Inverse of [`encrypt_with_key`]; fails if the tag does not verify.
pub fn decrypt_with_key(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, AbacError> {
    check_iv(iv)?;
    Ok(cipher(key)?.decrypt(Nonce::from_slice(iv), ciphertext)?)
}

fn derive_key(msg: &Gt) -> Result<[u8; 32], AbacError> {
    Ok(sha3_key(&borsh::to_vec(msg)?))
}

/// Key Encapsulation Mechanism (Encryption Function): the AES key is the
/// SHA3-256 of the serialized group element, the nonce is prepended.
pub fn encrypt_symmetric(msg: &Gt, plaintext: &[u8]) -> Result<Vec<u8>, AbacError> {
    let key = derive_key(msg)?;
    let iv = generate_iv();
    let mut ct = encrypt_with_key(&key, &iv, plaintext)?;
    ct.splice(0..0, iv.iter().cloned());
    Ok(ct)
}

/// Key Encapsulation Mechanism (Decryption Function)
pub fn decrypt_symmetric(msg: &Gt, nonce_ct: &[u8]) -> Result<Vec<u8>, AbacError> {
    if nonce_ct.len() < IV_SIZE {
        return Err(AbacError::Crypto("ciphertext shorter than its nonce".into()));
    }
    let key = derive_key(msg)?;
    let (iv, ct) = nonce_ct.split_at(IV_SIZE);
    decrypt_with_key(&key, iv, ct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rabe_bn::{pairing, G1, G2};
    use rand::Rng;

    #[test]
    fn content_key_round_trip() {
        let key = generate_key();
        let iv = generate_iv();
        let plaintext = String::from("dance like no one's watching, encrypt like everyone is!").into_bytes();
        let ct = encrypt_with_key(&key, &iv, &plaintext).unwrap();
        assert_eq!(decrypt_with_key(&key, &iv, &ct).unwrap(), plaintext);
        assert!(decrypt_with_key(&generate_key(), &iv, &ct).is_err());
    }

    #[test]
    fn empty_payloads_are_fine() {
        let key = generate_key();
        let iv = generate_iv();
        let ct = encrypt_with_key(&key, &iv, &[]).unwrap();
        assert!(decrypt_with_key(&key, &iv, &ct).unwrap().is_empty());
    }

    #[test]
    fn wrong_sizes_are_errors() {
        assert!(encrypt_with_key(&[0u8; 16], &generate_iv(), b"x").is_err());
        assert!(encrypt_with_key(&generate_key(), &[0u8; 16], b"x").is_err());
    }

    #[test]
    fn kem_round_trip() {
        let mut rng = rand::thread_rng();
        let msg = pairing(rng.gen::<G1>(), rng.gen::<G2>());
        let other = pairing(rng.gen::<G1>(), rng.gen::<G2>());
        let ct = encrypt_symmetric(&msg, b"content key").unwrap();
        assert_eq!(decrypt_symmetric(&msg, &ct).unwrap(), b"content key");
        assert!(decrypt_symmetric(&other, &ct).is_err());
    }
}
