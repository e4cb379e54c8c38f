use crate::encoding::{tlv::Block, types};
use crate::error::AbacError;
use crate::ndn::name::Name;
use crate::utils::aes::{decrypt_with_key, encrypt_with_key, generate_iv, generate_key};
use super::keychain::{Certificate, KeyChain};

/// Encrypts `payload` for the holder of `certificate`:
/// `Content{ EncryptedContent, EncryptedContentKey, InitializationVector }`,
/// the AES key itself wrapped with RSA-OAEP.
pub fn encrypt_for_certificate(certificate: &Certificate, payload: &[u8]) -> Result<Block, AbacError> {
    let key = generate_key();
    let iv = generate_iv();
    let encrypted_content = encrypt_with_key(&key, &iv, payload)?;
    let encrypted_key = certificate.encrypt(&key)?;
    Ok(Block::nested(types::CONTENT, &[
        Block::new(types::ENCRYPTED_CONTENT, encrypted_content),
        Block::new(types::ENCRYPTED_CONTENT_KEY, encrypted_key),
        Block::new(types::INITIALIZATION_VECTOR, iv),
    ]))
}

/// Inverse of [`encrypt_for_certificate`] using the key of `identity`.
pub fn decrypt_with_keychain(keychain: &KeyChain, identity: &Name, block: &Block) -> Result<Vec<u8>, AbacError> {
    block.expect_type(types::CONTENT)?;
    let mut reader = block.reader()?;
    let encrypted_content = reader.expect(types::ENCRYPTED_CONTENT)?;
    let encrypted_key = reader.expect(types::ENCRYPTED_CONTENT_KEY)?;
    let iv = reader.expect(types::INITIALIZATION_VECTOR)?;
    reader.finish()?;
    let key = keychain.decrypt(identity, encrypted_key.value())?;
    decrypt_with_key(&key, iv.value(), encrypted_content.value())
}
