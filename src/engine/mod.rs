//! The attribute cryptography engine as a capability boundary.
//!
//! Roles never see pairing groups: they hold opaque, owned byte handles and
//! call an [`AttributeEngine`]. [`BswEngine`] is the implementation shipped
//! with this crate.
//!
//! # Examples
//!
//! ```
//! use nabac::engine::{AttributeEngine, BswEngine};
//! use nabac::utils::policy::{AttributeSet, Policy};
//! let engine = BswEngine::new();
//! let (pp, msk) = engine.setup().unwrap();
//! let sk = engine.keygen(&pp, &msk, &AttributeSet::from_iter(["attr1", "attr3"])).unwrap();
//! let policy = Policy::parse("attr1 attr2 1of2 attr3 2of2").unwrap();
//! let ct = engine.encrypt(&pp, &policy, b"content key").unwrap();
//! assert_eq!(engine.decrypt(&sk, &ct).unwrap(), b"content key");
//! ```
mod bsw;
mod signed_message;

use std::fmt;
use crate::error::AbacError;
use crate::utils::policy::{AttributeSet, Policy};

pub use self::bsw::BswEngine;
pub use self::signed_message::SignedMessage;

/// Serialized public parameters. Immutable and freely shareable.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicParams(Vec<u8>);

/// Serialized master key. Move-only; never leaves the authority.
#[derive(PartialEq, Eq)]
pub struct MasterKey(Vec<u8>);

/// Serialized private key bound to one attribute set. Move-only.
#[derive(PartialEq, Eq)]
pub struct PrivateKey(Vec<u8>);

macro_rules! opaque_handle {
    ($handle:ident) => {
        impl $handle {
            pub fn from_bytes(bytes: Vec<u8>) -> $handle {
                $handle(bytes)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn into_bytes(self) -> Vec<u8> {
                self.0
            }
        }

        impl fmt::Debug for $handle {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}({} bytes)", stringify!($handle), self.0.len())
            }
        }
    };
}

opaque_handle!(PublicParams);
opaque_handle!(MasterKey);
opaque_handle!(PrivateKey);

/// Setup, key issuance, policy encryption and attribute signatures.
///
/// Implementations must agree with [`Policy::is_satisfied`]: `decrypt` and
/// `sign` succeed exactly when the key's attribute set satisfies the policy.
pub trait AttributeEngine: Send + Sync {
    /// Draws fresh public parameters and the matching master key.
    fn setup(&self) -> Result<(PublicParams, MasterKey), AbacError>;

    /// Issues a key bound to `attributes`. An empty set is an entitlement
    /// error, never a key.
    fn keygen(
        &self,
        pp: &PublicParams,
        msk: &MasterKey,
        attributes: &AttributeSet,
    ) -> Result<PrivateKey, AbacError>;

    /// Encrypts `plaintext` so that only keys satisfying `policy` recover it.
    fn encrypt(&self, pp: &PublicParams, policy: &Policy, plaintext: &[u8]) -> Result<Vec<u8>, AbacError>;

    /// Recovers the plaintext, or an entitlement error.
    fn decrypt(&self, sk: &PrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>, AbacError>;

    /// Signs `message`, proving the key's attributes satisfy `policy`.
    fn sign(
        &self,
        pp: &PublicParams,
        sk: &PrivateKey,
        message: &[u8],
        policy: &Policy,
    ) -> Result<SignedMessage, AbacError>;

    /// Checks a signature produced by [`AttributeEngine::sign`].
    fn verify(
        &self,
        pp: &PublicParams,
        signed: &SignedMessage,
        message: &[u8],
        policy: &Policy,
    ) -> Result<(), AbacError>;
}
