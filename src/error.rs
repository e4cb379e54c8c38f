use std::{
    array::TryFromSliceError,
    cmp
};
use pest::error::{Error as PestError, LineColLocation};
use rabe_bn::FieldError;
use thiserror::Error;
use crate::utils::policy::pest::Rule as PolicyRule;

/// Every failure the access-control layer can surface.
///
/// The first five variants are the protocol-level taxonomy that travels
/// across the wire inside signed rejections (see [`AbacError::status_code`]);
/// the remaining ones are local failures of the codec, the ciphers and the
/// configuration loader.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum AbacError {
    /// Malformed policy text. Never retried.
    #[error("policy error: {0}")]
    Parse(String),
    /// A signature that does not belong to a trust anchor, or a mismatch
    /// between signer and claimed identity.
    #[error("trust error: {0}")]
    Trust(String),
    /// No attribute grant, or attributes that do not satisfy a policy.
    #[error("entitlement error: {0}")]
    Entitlement(String),
    /// NACK or timeout after the retry bound was exhausted.
    #[error("transport error: {0}")]
    Transport(String),
    /// Cached state (public parameters, a policy) is not available yet.
    #[error("state error: {0}")]
    State(String),
    /// First-writer-wins assignment hit an already assigned prefix.
    #[error("conflict: {0}")]
    Conflict(String),
    /// TLV or serialization structure violated.
    #[error("encoding error: {0}")]
    Encoding(String),
    /// A cipher or signature primitive failed.
    #[error("crypto error: {0}")]
    Crypto(String),
    /// Invalid configuration file.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AbacError {
    /// Status code carried by signed rejections on the wire.
    pub fn status_code(&self) -> u64 {
        match self {
            AbacError::Parse(_) => 400,
            AbacError::Trust(_) => 403,
            AbacError::Entitlement(_) => 404,
            AbacError::Conflict(_) => 409,
            AbacError::Encoding(_) => 422,
            AbacError::State(_) => 503,
            AbacError::Transport(_) => 504,
            AbacError::Crypto(_) | AbacError::Config(_) => 500,
        }
    }

    /// Rebuilds the error kind from a received rejection.
    pub fn from_status(code: u64, reason: String) -> AbacError {
        match code {
            400 => AbacError::Parse(reason),
            403 => AbacError::Trust(reason),
            404 => AbacError::Entitlement(reason),
            409 => AbacError::Conflict(reason),
            422 => AbacError::Encoding(reason),
            503 => AbacError::State(reason),
            504 => AbacError::Transport(reason),
            _ => AbacError::Crypto(reason),
        }
    }

    /// The reason text without the kind prefix.
    pub fn reason(&self) -> &str {
        match self {
            AbacError::Parse(reason)
            | AbacError::Trust(reason)
            | AbacError::Entitlement(reason)
            | AbacError::Transport(reason)
            | AbacError::State(reason)
            | AbacError::Conflict(reason)
            | AbacError::Encoding(reason)
            | AbacError::Crypto(reason)
            | AbacError::Config(reason) => reason,
        }
    }

    /// Only transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AbacError::Transport(_))
    }
}

impl From<PestError<PolicyRule>> for AbacError {
    fn from(error: PestError<PolicyRule>) -> Self {
        let column = match error.line_col.to_owned() {
            LineColLocation::Pos((_, col)) => col,
            LineColLocation::Span((_, start_col), (_, end_col)) => cmp::max(start_col, end_col),
        };
        AbacError::Parse(format!("unexpected input at column {}", column))
    }
}

impl From<FieldError> for AbacError {
    fn from(error: FieldError) -> Self {
        match error {
            FieldError::InvalidSliceLength => AbacError::Crypto("FieldError::InvalidSliceLength".into()),
            FieldError::InvalidU512Encoding => AbacError::Crypto("FieldError::InvalidU512Encoding".into()),
            FieldError::NotMember => AbacError::Crypto("FieldError::NotMember".into()),
        }
    }
}

impl From<aes_gcm::Error> for AbacError {
    fn from(_error: aes_gcm::Error) -> Self {
        // aead errors are opaque on purpose
        AbacError::Crypto("AEAD authentication failed".into())
    }
}

impl From<rsa::Error> for AbacError {
    fn from(error: rsa::Error) -> Self {
        AbacError::Crypto(error.to_string())
    }
}

impl From<ed25519_dalek::SignatureError> for AbacError {
    fn from(error: ed25519_dalek::SignatureError) -> Self {
        AbacError::Trust(error.to_string())
    }
}

impl From<std::io::Error> for AbacError {
    fn from(error: std::io::Error) -> Self {
        AbacError::Encoding(error.to_string())
    }
}

impl From<toml::de::Error> for AbacError {
    fn from(error: toml::de::Error) -> Self {
        AbacError::Config(error.to_string())
    }
}

impl From<TryFromSliceError> for AbacError {
    fn from(error: TryFromSliceError) -> Self {
        AbacError::Encoding(error.to_string())
    }
}

impl From<std::string::FromUtf8Error> for AbacError {
    fn from(error: std::string::FromUtf8Error) -> Self {
        AbacError::Encoding(error.to_string())
    }
}
