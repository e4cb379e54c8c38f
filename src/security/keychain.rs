use std::{collections::HashMap, fmt, sync::Arc};
use bytes::Bytes;
use ed25519_dalek::{Signer, Verifier};
use parking_lot::RwLock;
use rsa::{traits::PublicKeyParts, Oaep, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use crate::error::AbacError;
use crate::ndn::{
    name::Name,
    packet::{Data, Interest, Signature, SignatureInfo, SignatureType},
};

/// Key algorithm for a new identity.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum KeyParams {
    Ed25519,
    /// RSA keys can also receive wrapped decryption keys.
    Rsa { bits: usize },
}

impl Default for KeyParams {
    fn default() -> Self {
        KeyParams::Ed25519
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum PublicKey {
    Ed25519(ed25519_dalek::VerifyingKey),
    Rsa(RsaPublicKey),
}

impl PublicKey {
    fn to_bytes(&self) -> Vec<u8> {
        match self {
            PublicKey::Ed25519(key) => key.to_bytes().to_vec(),
            PublicKey::Rsa(key) => {
                let mut bytes = key.n().to_bytes_be();
                bytes.extend(key.e().to_bytes_be());
                bytes
            }
        }
    }

    fn signature_type(&self) -> SignatureType {
        match self {
            PublicKey::Ed25519(_) => SignatureType::Ed25519,
            PublicKey::Rsa(_) => SignatureType::Sha256WithRsa,
        }
    }
}

/// Self-issued certificate binding an identity to a public key.
#[derive(Clone, PartialEq, Debug)]
pub struct Certificate {
    pub identity: Name,
    /// `<identity>/KEY/<key id>`, the name signatures point at.
    pub key_name: Name,
    pub public_key: PublicKey,
}

impl Certificate {
    fn new(identity: &Name, public_key: PublicKey) -> Certificate {
        let digest = Sha256::digest(public_key.to_bytes());
        let key_id: String = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();
        Certificate {
            identity: identity.clone(),
            key_name: identity.append("KEY").append(key_id),
            public_key,
        }
    }

    pub fn can_encrypt(&self) -> bool {
        matches!(self.public_key, PublicKey::Rsa(_))
    }

    /// Checks `signature` over `signed` with this certificate's key.
    pub fn verify(&self, signature_type: SignatureType, signed: &[u8], signature: &[u8]) -> Result<(), AbacError> {
        if signature_type != self.public_key.signature_type() {
            return Err(AbacError::Trust(format!(
                "{:?} signature does not match key {}",
                signature_type, self.key_name
            )));
        }
        let valid = match &self.public_key {
            PublicKey::Ed25519(key) => {
                let signature = ed25519_dalek::Signature::from_slice(signature)?;
                key.verify(signed, &signature).is_ok()
            }
            PublicKey::Rsa(key) => key
                .verify(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(signed), signature)
                .is_ok(),
        };
        if !valid {
            return Err(AbacError::Trust(format!("bad signature by {}", self.key_name)));
        }
        Ok(())
    }

    /// RSA-OAEP (SHA-256) encryption to the certificate holder.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, AbacError> {
        match &self.public_key {
            PublicKey::Rsa(key) => Ok(key.encrypt(&mut rand::thread_rng(), Oaep::new::<Sha256>(), plaintext)?),
            PublicKey::Ed25519(_) => Err(AbacError::Trust(format!(
                "certificate {} cannot receive encrypted keys",
                self.key_name
            ))),
        }
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.key_name)
    }
}

#[derive(Clone)]
enum SecretKey {
    Ed25519(ed25519_dalek::SigningKey),
    Rsa(RsaPrivateKey),
}

#[derive(Clone)]
struct KeyEntry {
    secret: SecretKey,
    certificate: Certificate,
}

/// Identities, their private keys and certificates. Cloning shares the
/// underlying store.
#[derive(Clone, Default)]
pub struct KeyChain {
    keys: Arc<RwLock<HashMap<Name, KeyEntry>>>,
}

impl KeyChain {
    pub fn new() -> KeyChain {
        KeyChain::default()
    }

    /// Creates (or replaces) the key of `identity` and returns its certificate.
    pub fn create_identity(&self, identity: &Name, params: KeyParams) -> Result<Certificate, AbacError> {
        let mut rng = rand::thread_rng();
        let (secret, public_key) = match params {
            KeyParams::Ed25519 => {
                let key = ed25519_dalek::SigningKey::generate(&mut rng);
                let public = key.verifying_key();
                (SecretKey::Ed25519(key), PublicKey::Ed25519(public))
            }
            KeyParams::Rsa { bits } => {
                let key = RsaPrivateKey::new(&mut rng, bits)?;
                let public = RsaPublicKey::from(&key);
                (SecretKey::Rsa(key), PublicKey::Rsa(public))
            }
        };
        let certificate = Certificate::new(identity, public_key);
        info!(key = %certificate.key_name, "created identity");
        self.keys.write().insert(identity.clone(), KeyEntry {
            secret,
            certificate: certificate.clone(),
        });
        Ok(certificate)
    }

    pub fn certificate(&self, identity: &Name) -> Option<Certificate> {
        self.keys.read().get(identity).map(|entry| entry.certificate.clone())
    }

    fn entry(&self, identity: &Name) -> Result<KeyEntry, AbacError> {
        self.keys
            .read()
            .get(identity)
            .cloned()
            .ok_or_else(|| AbacError::Trust(format!("no key for identity {}", identity)))
    }

    fn sign_bytes(secret: &SecretKey, signed: &[u8]) -> Result<Bytes, AbacError> {
        Ok(match secret {
            SecretKey::Ed25519(key) => Bytes::copy_from_slice(&key.sign(signed).to_bytes()),
            SecretKey::Rsa(key) => {
                Bytes::from(key.sign(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(signed))?)
            }
        })
    }

    /// Signs `data` with the key of `identity`.
    pub fn sign_data(&self, data: &mut Data, identity: &Name) -> Result<(), AbacError> {
        let entry = self.entry(identity)?;
        let info = SignatureInfo {
            signature_type: entry.certificate.public_key.signature_type(),
            key_locator: entry.certificate.key_name.clone(),
        };
        let value = Self::sign_bytes(&entry.secret, &data.signed_portion(&info))?;
        data.signature = Some(Signature { info, value });
        debug!(name = %data.name, key = %entry.certificate.key_name, "signed data");
        Ok(())
    }

    /// Signs `interest` with the key of `identity`.
    pub fn sign_interest(&self, interest: &mut Interest, identity: &Name) -> Result<(), AbacError> {
        let entry = self.entry(identity)?;
        let info = SignatureInfo {
            signature_type: entry.certificate.public_key.signature_type(),
            key_locator: entry.certificate.key_name.clone(),
        };
        let value = Self::sign_bytes(&entry.secret, &interest.signed_portion(&info))?;
        interest.signature = Some(Signature { info, value });
        Ok(())
    }

    /// RSA-OAEP decryption with the key of `identity`.
    pub fn decrypt(&self, identity: &Name, ciphertext: &[u8]) -> Result<Vec<u8>, AbacError> {
        match self.entry(identity)?.secret {
            SecretKey::Rsa(key) => Ok(key.decrypt(Oaep::new::<Sha256>(), ciphertext)?),
            SecretKey::Ed25519(_) => Err(AbacError::Crypto(format!(
                "identity {} holds no decryption key",
                identity
            ))),
        }
    }
}
