//! Building blocks below the protocol roles.
//!
//! Currently those are:
//! aes
//! hash
//! policy
//! secretsharing
//! tools
//!
pub mod aes;
pub mod hash;
pub mod policy;
pub mod secretsharing;
pub mod tools;
