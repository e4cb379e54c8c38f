//! # nabac
//!
//! nabac is a library for attribute-based access control over named-data
//! publish/subscribe networks.
//!
//! Producers encrypt content under postorder threshold policies such as
//! `"attr1 attr2 1of2 attr3 2of2"`; an attribute authority issues
//! attribute-bound decryption keys to identities holding a token from the
//! token issuer; consumers whose attributes satisfy the policy recover the
//! content, everybody else fails, even with full view of the wire.
//!
//! * [`utils::policy`]: the policy language and its satisfaction semantics
//! * [`engine`]: CP-ABE and attribute signatures behind opaque handles
//! * [`content`]: content-key wrapping
//! * [`roles`]: attribute authority, token issuer, producer, data owner, consumer
//! * [`ndn`], [`encoding`], [`security`]: names, TLV packets, an in-memory
//!   transport, keys and trust anchors
//!
//! # Examples
//!
//! ```
//! use nabac::utils::policy::{AttributeSet, Policy};
//! let policy = Policy::parse("attr1 attr2 1of2 attr3 2of2").unwrap();
//! assert!(policy.is_satisfied(&AttributeSet::from_iter(["attr1", "attr3"])));
//! assert!(!policy.is_satisfied(&AttributeSet::from_iter(["attr1"])));
//! ```
#[macro_use]
extern crate pest_derive;

pub mod config;
pub mod content;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod ndn;
pub mod roles;
pub mod schemes;
pub mod security;
pub mod utils;
