//! Keys, certificates and trust anchors.
//!
//! Every role owns a [`KeyChain`] for signing and a [`TrustConfig`] listing
//! the certificates whose signatures it accepts.
pub mod keychain;
pub mod trust;
pub mod wrap;

pub use self::keychain::{Certificate, KeyChain, KeyParams};
pub use self::trust::TrustConfig;
