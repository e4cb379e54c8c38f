//! Content-key wrapping.
//!
//! A payload is encrypted once under a fresh AES-256-GCM content key (CK);
//! only the 32 byte CK goes through policy encryption. The policy itself is
//! not stored: a key whose attributes do not satisfy it simply fails to
//! recover the CK.
//!
//! # Examples
//!
//! ```
//! use nabac::content::{protect, unprotect};
//! use nabac::engine::{AttributeEngine, BswEngine};
//! use nabac::utils::policy::{AttributeSet, Policy};
//! let engine = BswEngine::new();
//! let (pp, msk) = engine.setup().unwrap();
//! let policy = Policy::parse("attr1 attr2 1of2 attr3 2of2").unwrap();
//! let protected = protect(&engine, &pp, &policy, b"HELLO").unwrap();
//! let sk = engine.keygen(&pp, &msk, &AttributeSet::from_iter(["attr2", "attr3"])).unwrap();
//! assert_eq!(unprotect(&engine, &protected, &sk).unwrap(), b"HELLO");
//! ```
use tracing::trace;
use crate::encoding::{tlv::Block, types};
use crate::engine::{AttributeEngine, PrivateKey, PublicParams};
use crate::error::AbacError;
use crate::utils::{
    aes::{decrypt_with_key, encrypt_with_key, generate_iv, generate_key},
    policy::Policy
};

/// Policy-encrypted CK, CK-encrypted payload and the IV used for it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ProtectedContent {
    pub encrypted_content_key: Vec<u8>,
    pub encrypted_content: Vec<u8>,
    pub iv: Vec<u8>,
    pub plaintext_size: u64,
}

/// A content key together with its policy-encrypted form.
///
/// One CK may seal many payloads; each seal draws a fresh IV.
#[derive(Clone)]
pub struct ContentKey {
    key: Vec<u8>,
    encrypted: Vec<u8>,
}

impl ContentKey {
    /// Draws a fresh CK and encrypts it under `policy`.
    pub fn generate<E: AttributeEngine + ?Sized>(
        engine: &E,
        pp: &PublicParams,
        policy: &Policy,
    ) -> Result<ContentKey, AbacError> {
        let key = generate_key();
        let encrypted = engine.encrypt(pp, policy, &key)?;
        Ok(ContentKey { key, encrypted })
    }

    pub fn encrypted(&self) -> &[u8] {
        &self.encrypted
    }

    pub fn seal(&self, payload: &[u8]) -> Result<ProtectedContent, AbacError> {
        let iv = generate_iv();
        let encrypted_content = encrypt_with_key(&self.key, &iv, payload)?;
        Ok(ProtectedContent {
            encrypted_content_key: self.encrypted.clone(),
            encrypted_content,
            iv,
            plaintext_size: payload.len() as u64,
        })
    }
}

/// Encrypts `payload` under a fresh content key and the key under `policy`.
pub fn protect<E: AttributeEngine + ?Sized>(
    engine: &E,
    pp: &PublicParams,
    policy: &Policy,
    payload: &[u8],
) -> Result<ProtectedContent, AbacError> {
    let protected = ContentKey::generate(engine, pp, policy)?.seal(payload)?;
    trace!(policy = %policy, size = payload.len(), "protected content");
    Ok(protected)
}

/// Recovers the content key with `sk`, then the payload.
///
/// Fails with [`AbacError::Entitlement`] when the key's attributes do not
/// satisfy the policy the content was protected under.
pub fn unprotect<E: AttributeEngine + ?Sized>(
    engine: &E,
    protected: &ProtectedContent,
    sk: &PrivateKey,
) -> Result<Vec<u8>, AbacError> {
    let ck = engine.decrypt(sk, &protected.encrypted_content_key)?;
    let payload = decrypt_with_key(&ck, &protected.iv, &protected.encrypted_content)?;
    if payload.len() as u64 != protected.plaintext_size {
        return Err(AbacError::Encoding(format!(
            "decrypted {} bytes, expected {}",
            payload.len(),
            protected.plaintext_size
        )));
    }
    Ok(payload)
}

impl ProtectedContent {
    /// `Content{ PlainTextSize, EncryptedContent, EncryptedContentKey, InitializationVector }`
    pub fn wire_encode(&self) -> Block {
        Block::nested(types::CONTENT, &[
            Block::from_u64(types::PLAINTEXT_SIZE, self.plaintext_size),
            Block::new(types::ENCRYPTED_CONTENT, self.encrypted_content.clone()),
            Block::new(types::ENCRYPTED_CONTENT_KEY, self.encrypted_content_key.clone()),
            Block::new(types::INITIALIZATION_VECTOR, self.iv.clone()),
        ])
    }

    pub fn wire_decode(block: &Block) -> Result<ProtectedContent, AbacError> {
        block.expect_type(types::CONTENT)?;
        let mut reader = block.reader()?;
        let plaintext_size = reader.expect(types::PLAINTEXT_SIZE)?.to_u64()?;
        let encrypted_content = reader.expect(types::ENCRYPTED_CONTENT)?.value().to_vec();
        let encrypted_content_key = reader.expect(types::ENCRYPTED_CONTENT_KEY)?.value().to_vec();
        let iv = reader.expect(types::INITIALIZATION_VECTOR)?.value().to_vec();
        reader.finish()?;
        Ok(ProtectedContent { encrypted_content_key, encrypted_content, iv, plaintext_size })
    }

    /// The half published under the content name:
    /// `Content{ PlainTextSize, EncryptedContent, InitializationVector }`.
    pub fn make_data_content(&self) -> Block {
        Block::nested(types::CONTENT, &[
            Block::from_u64(types::PLAINTEXT_SIZE, self.plaintext_size),
            Block::new(types::ENCRYPTED_CONTENT, self.encrypted_content.clone()),
            Block::new(types::INITIALIZATION_VECTOR, self.iv.clone()),
        ])
    }

    /// The half published under the CK name: `Content{ EncryptedContentKey }`.
    pub fn make_ck_content(&self) -> Block {
        Block::nested(types::CONTENT, &[
            Block::new(types::ENCRYPTED_CONTENT_KEY, self.encrypted_content_key.clone()),
        ])
    }

    /// Reassembles the two published halves.
    pub fn from_parts(data_content: &Block, ck_content: &Block) -> Result<ProtectedContent, AbacError> {
        data_content.expect_type(types::CONTENT)?;
        let mut reader = data_content.reader()?;
        let plaintext_size = reader.expect(types::PLAINTEXT_SIZE)?.to_u64()?;
        let encrypted_content = reader.expect(types::ENCRYPTED_CONTENT)?.value().to_vec();
        let iv = reader.expect(types::INITIALIZATION_VECTOR)?.value().to_vec();
        reader.finish()?;

        ck_content.expect_type(types::CONTENT)?;
        let mut reader = ck_content.reader()?;
        let encrypted_content_key = reader.expect(types::ENCRYPTED_CONTENT_KEY)?.value().to_vec();
        reader.finish()?;
        Ok(ProtectedContent { encrypted_content_key, encrypted_content, iv, plaintext_size })
    }
}
