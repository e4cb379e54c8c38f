//! The four cooperating roles of the access-control protocol.
//!
//! Requests and their names:
//!
//! * `<aa>/PUBLIC_PARAMS`: public parameters, unauthenticated request
//! * `<issuer>/TOKEN/<identity>`: attribute token, signed request
//! * `<aa>/DKEY/<identity>`: decryption key, signed request carrying the token
//! * `<producer>/SET_POLICY/<prefix>/<policy>`: owner command, signed request
//! * `<producer>/<prefix>/...` and `<producer>/CK/...`: protected content
//!
//! Every answer is signed by the responder. Refusals are NACK Data carrying
//! a status code, so a requester can tell "denied" from "unreachable".
//!
//! Responders run on the transport's handler context and only take short
//! `parking_lot` locks; nothing is held across an `.await`.
pub mod attribute_authority;
pub mod consumer;
pub mod data_owner;
pub mod producer;
pub mod reply;
mod requester;
pub mod token_issuer;

pub use self::attribute_authority::AttributeAuthority;
pub use self::consumer::{ConsumeError, Consumer, Stage};
pub use self::data_owner::DataOwner;
pub use self::producer::Producer;
pub use self::token_issuer::{AttributeToken, TokenIssuer};
