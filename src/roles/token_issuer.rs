use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};
use crate::config::NabacConfig;
use crate::encoding::{tlv::Block, types};
use crate::error::AbacError;
use crate::ndn::{face::sync_handler, Data, Face, Interest, Name, RegisteredPrefix};
use crate::security::{Certificate, KeyChain, TrustConfig};
use crate::utils::policy::AttributeSet;
use super::reply::answer;

/// Verb under which attribute tokens are requested.
pub const TOKEN: &str = "TOKEN";

/// Milliseconds since the UNIX epoch.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// The attribute grant of one identity, as carried by a token Data:
/// `Content{ Name(identity), NotAfter, Attribute* }`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AttributeToken {
    pub identity: Name,
    /// Expiry in milliseconds since the UNIX epoch.
    pub not_after: u64,
    pub attributes: AttributeSet,
}

impl AttributeToken {
    /// A token for `identity` valid for `lifetime` from now.
    pub fn issue(identity: Name, attributes: AttributeSet, lifetime: Duration) -> AttributeToken {
        let not_after = unix_millis().saturating_add(lifetime.as_millis() as u64);
        AttributeToken { identity, not_after, attributes }
    }

    pub fn is_expired(&self) -> bool {
        unix_millis() >= self.not_after
    }

    pub fn wire_encode(&self) -> Block {
        let mut elements = vec![
            self.identity.wire_encode(),
            Block::from_u64(types::NOT_AFTER, self.not_after),
        ];
        elements.extend(self.attributes.iter().map(|a| Block::from_text(types::ATTRIBUTE, a)));
        Block::nested(types::CONTENT, &elements)
    }

    pub fn wire_decode(block: &Block) -> Result<AttributeToken, AbacError> {
        block.expect_type(types::CONTENT)?;
        let mut reader = block.reader()?;
        let identity = Name::wire_decode(&reader.expect(types::NAME)?)?;
        let not_after = reader.expect(types::NOT_AFTER)?.to_u64()?;
        let attributes = reader
            .repeated(types::ATTRIBUTE)
            .iter()
            .map(Block::to_text)
            .collect::<Result<AttributeSet, AbacError>>()?;
        reader.finish()?;
        Ok(AttributeToken { identity, not_after, attributes })
    }
}

struct Inner {
    identity: Name,
    keychain: KeyChain,
    trust: RwLock<TrustConfig>,
    token_lifetime: Duration,
    tokens: RwLock<HashMap<Name, AttributeSet>>,
}

impl Inner {
    fn on_token(&self, interest: Interest) -> Option<Data> {
        let result = self.issue(&interest);
        answer(&self.keychain, &self.identity, &interest.name, result)
    }

    fn issue(&self, interest: &Interest) -> Result<Block, AbacError> {
        let signer = self.trust.read().verify_interest(interest)?;
        let requester = interest.name.get_name(self.identity.len() + 1)?;
        if signer.identity != requester {
            return Err(AbacError::Trust(format!(
                "{} cannot request the token of {}",
                signer.identity, requester
            )));
        }
        let attributes = self
            .tokens
            .read()
            .get(&requester)
            .cloned()
            .ok_or_else(|| AbacError::Entitlement(format!("{} not enrolled", requester)))?;
        let token = AttributeToken::issue(requester, attributes, self.token_lifetime);
        debug!(identity = %token.identity, attributes = %token.attributes, not_after = token.not_after, "issuing attribute token");
        Ok(token.wire_encode())
    }
}

/// Keeps the authoritative identity → attribute set mapping and answers
/// signed `<issuer>/TOKEN/<identity>` requests with a signed token that
/// expires after the configured lifetime.
pub struct TokenIssuer {
    inner: Arc<Inner>,
    registrations: Mutex<Vec<RegisteredPrefix>>,
}

impl TokenIssuer {
    pub fn new(identity: Name, face: Arc<dyn Face>, keychain: KeyChain, trust: TrustConfig) -> TokenIssuer {
        TokenIssuer::with_config(identity, face, keychain, trust, &NabacConfig::default())
    }

    pub fn with_config(
        identity: Name,
        face: Arc<dyn Face>,
        keychain: KeyChain,
        trust: TrustConfig,
        config: &NabacConfig,
    ) -> TokenIssuer {
        let inner = Arc::new(Inner {
            identity,
            keychain,
            trust: RwLock::new(trust),
            token_lifetime: config.issuer.token_lifetime(),
            tokens: RwLock::new(HashMap::new()),
        });
        let handler_inner = Arc::clone(&inner);
        let registration = face.set_interest_filter(
            inner.identity.append(TOKEN),
            sync_handler(move |interest| handler_inner.on_token(interest)),
        );
        info!(identity = %inner.identity, "token issuer ready");
        TokenIssuer { inner, registrations: Mutex::new(vec![registration]) }
    }

    pub fn identity(&self) -> &Name {
        &self.inner.identity
    }

    /// Grants `attributes` to `identity`, replacing any earlier grant.
    /// Returns the replaced set.
    pub fn grant(&self, identity: Name, attributes: AttributeSet) -> Option<AttributeSet> {
        info!(identity = %identity, %attributes, "granting attributes");
        self.inner.tokens.write().insert(identity, attributes)
    }

    pub fn attributes_of(&self, identity: &Name) -> Option<AttributeSet> {
        self.inner.tokens.read().get(identity).cloned()
    }

    pub fn add_trust_anchor(&self, certificate: Certificate) {
        self.inner.trust.write().add_anchor(certificate);
    }

    /// Unregisters the token responder.
    pub fn shutdown(&self) {
        self.registrations.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_decode_strictly() {
        let token = AttributeToken::issue(
            Name::from_uri("/consumer1").unwrap(),
            AttributeSet::from_iter(["attr1", "attr3"]),
            Duration::from_secs(60),
        );
        let block = Block::decode(&token.wire_encode().encode()).unwrap();
        assert_eq!(AttributeToken::wire_decode(&block).unwrap(), token);

        let without_identity = Block::nested(types::CONTENT, &[Block::from_text(types::ATTRIBUTE, "a")]);
        assert!(AttributeToken::wire_decode(&without_identity).is_err());
        let without_expiry = Block::nested(types::CONTENT, &[
            Name::from_uri("/consumer1").unwrap().wire_encode(),
            Block::from_text(types::ATTRIBUTE, "a"),
        ]);
        assert!(AttributeToken::wire_decode(&without_expiry).is_err());
    }

    #[test]
    fn tokens_expire() {
        let identity = Name::from_uri("/consumer1").unwrap();
        let attributes = AttributeSet::from_iter(["attr1"]);
        assert!(!AttributeToken::issue(identity.clone(), attributes.clone(), Duration::from_secs(60)).is_expired());
        assert!(AttributeToken::issue(identity.clone(), attributes.clone(), Duration::ZERO).is_expired());
        let stale = AttributeToken { identity, not_after: unix_millis() - 1, attributes };
        assert!(stale.is_expired());
    }

    #[test]
    fn grants_replace() {
        let forwarder = crate::ndn::Forwarder::new();
        let issuer = TokenIssuer::new(
            Name::from_uri("/issuer").unwrap(),
            forwarder.add_face(),
            KeyChain::new(),
            TrustConfig::new(),
        );
        let c1 = Name::from_uri("/consumer1").unwrap();
        assert_eq!(issuer.grant(c1.clone(), AttributeSet::from_iter(["attr1"])), None);
        let previous = issuer.grant(c1.clone(), AttributeSet::from_iter(["attr3"]));
        assert_eq!(previous, Some(AttributeSet::from_iter(["attr1"])));
        assert_eq!(issuer.attributes_of(&c1), Some(AttributeSet::from_iter(["attr3"])));

        assert_eq!(forwarder.route_count(), 1);
        issuer.shutdown();
        assert_eq!(forwarder.route_count(), 0);
    }
}
