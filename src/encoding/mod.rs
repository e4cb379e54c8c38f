//! Type-length-value wire format shared by every artifact of the protocol.
//!
//! Types and lengths are NDN VarNumbers (1, 3, 5 or 9 bytes). Nested
//! elements are decoded strictly through [`tlv::ElementReader`]: an
//! unexpected type, a field out of order or trailing bytes are all errors.
pub mod tlv;

/// TLV type numbers.
pub mod types {
    pub const INTEREST: u64 = 5;
    pub const DATA: u64 = 6;
    pub const NAME: u64 = 7;
    pub const NAME_COMPONENT: u64 = 8;
    pub const NONCE: u64 = 10;
    pub const INTEREST_LIFETIME: u64 = 12;
    pub const META_INFO: u64 = 20;
    pub const CONTENT: u64 = 21;
    pub const SIGNATURE_INFO: u64 = 22;
    pub const SIGNATURE_VALUE: u64 = 23;
    pub const CONTENT_TYPE: u64 = 24;
    pub const SIGNATURE_TYPE: u64 = 27;
    pub const KEY_LOCATOR: u64 = 28;
    pub const APPLICATION_PARAMETERS: u64 = 36;
    pub const INTEREST_SIGNATURE_INFO: u64 = 44;
    pub const INTEREST_SIGNATURE_VALUE: u64 = 46;

    // access-control fields
    pub const ENCRYPTED_CONTENT: u64 = 130;
    pub const ENCRYPTED_CONTENT_KEY: u64 = 131;
    pub const INITIALIZATION_VECTOR: u64 = 132;
    pub const PLAINTEXT_SIZE: u64 = 133;
    pub const SIGNATURE_BLOB: u64 = 134;
    pub const ATTRIBUTE: u64 = 135;
    pub const STATUS_CODE: u64 = 136;
    pub const STATUS_TEXT: u64 = 137;
    pub const NOT_AFTER: u64 = 138;
}
