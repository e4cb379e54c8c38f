use std::{collections::HashMap, sync::Arc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};
use crate::encoding::{tlv::Block, types};
use crate::engine::{AttributeEngine, BswEngine, MasterKey, PublicParams};
use crate::error::AbacError;
use crate::ndn::{face::sync_handler, Data, Face, Interest, Name, RegisteredPrefix};
use crate::security::{wrap::encrypt_for_certificate, Certificate, KeyChain, TrustConfig};
use crate::utils::policy::AttributeSet;
use super::{reply::answer, token_issuer::AttributeToken};

pub const PUBLIC_PARAMS: &str = "PUBLIC_PARAMS";
pub const DKEY: &str = "DKEY";

struct Inner {
    identity: Name,
    keychain: KeyChain,
    engine: Arc<dyn AttributeEngine>,
    public_params: PublicParams,
    master_key: MasterKey,
    // signers of DKEY requests
    trust: RwLock<TrustConfig>,
    // signers of attribute tokens
    token_issuers: RwLock<TrustConfig>,
    grants: RwLock<HashMap<Name, AttributeSet>>,
}

impl Inner {
    fn on_public_params(&self, interest: Interest) -> Option<Data> {
        debug!(name = %interest.name, "serving public params");
        let content = Block::new(types::CONTENT, self.public_params.as_bytes().to_vec());
        answer(&self.keychain, &self.identity, &interest.name, Ok(content))
    }

    fn on_decryption_key(&self, interest: Interest) -> Option<Data> {
        let result = self.issue_key(&interest);
        answer(&self.keychain, &self.identity, &interest.name, result)
    }

    fn issue_key(&self, interest: &Interest) -> Result<Block, AbacError> {
        let requester_certificate = self.trust.read().verify_interest(interest)?;
        let requester = interest.name.get_name(self.identity.len() + 1)?;
        if requester_certificate.identity != requester {
            return Err(AbacError::Trust(format!(
                "{} cannot request the key of {}",
                requester_certificate.identity, requester
            )));
        }
        if !requester_certificate.can_encrypt() {
            return Err(AbacError::Trust(format!(
                "{} cannot receive an encrypted key",
                requester_certificate.key_name
            )));
        }
        let attributes = match &interest.application_parameters {
            Some(token) => self.verify_token(token, &requester)?,
            None => self.mirrored_grant(&requester)?,
        };
        if attributes.is_empty() {
            return Err(AbacError::Entitlement(format!("no attributes granted to {}", requester)));
        }
        let key = self
            .engine
            .keygen(&self.public_params, &self.master_key, &attributes)?;
        info!(identity = %requester, %attributes, "issued decryption key");
        encrypt_for_certificate(&requester_certificate, key.as_bytes())
    }

    fn verify_token(&self, wire: &[u8], requester: &Name) -> Result<AttributeSet, AbacError> {
        let token = Data::from_wire(wire)?;
        self.token_issuers.read().verify_data(&token)?;
        let token = AttributeToken::wire_decode(&token.content_block())?;
        if &token.identity != requester {
            return Err(AbacError::Trust(format!(
                "token of {} presented by {}",
                token.identity, requester
            )));
        }
        if token.is_expired() {
            return Err(AbacError::Trust(format!("token of {} expired", requester)));
        }
        Ok(token.attributes)
    }

    fn mirrored_grant(&self, requester: &Name) -> Result<AttributeSet, AbacError> {
        self.grants
            .read()
            .get(requester)
            .cloned()
            .ok_or_else(|| AbacError::Entitlement(format!("no attributes granted to {}", requester)))
    }
}

/// Owns the master key. Serves `<aa>/PUBLIC_PARAMS` to anyone and issues
/// decryption keys on signed `<aa>/DKEY/<identity>` requests that carry a
/// valid attribute token (or match a mirrored grant).
pub struct AttributeAuthority {
    inner: Arc<Inner>,
    registrations: Mutex<Vec<RegisteredPrefix>>,
}

impl AttributeAuthority {
    /// Runs setup once and starts answering requests.
    pub fn new(
        identity: Name,
        face: Arc<dyn Face>,
        keychain: KeyChain,
        trust: TrustConfig,
    ) -> Result<AttributeAuthority, AbacError> {
        AttributeAuthority::with_engine(identity, face, keychain, trust, Arc::new(BswEngine::new()))
    }

    pub fn with_engine(
        identity: Name,
        face: Arc<dyn Face>,
        keychain: KeyChain,
        trust: TrustConfig,
        engine: Arc<dyn AttributeEngine>,
    ) -> Result<AttributeAuthority, AbacError> {
        let (public_params, master_key) = engine.setup()?;
        let inner = Arc::new(Inner {
            identity,
            keychain,
            engine,
            public_params,
            master_key,
            trust: RwLock::new(trust),
            token_issuers: RwLock::new(TrustConfig::new()),
            grants: RwLock::new(HashMap::new()),
        });

        let pp_inner = Arc::clone(&inner);
        let pp_registration = face.set_interest_filter(
            inner.identity.append(PUBLIC_PARAMS),
            sync_handler(move |interest| pp_inner.on_public_params(interest)),
        );
        let dkey_inner = Arc::clone(&inner);
        let dkey_registration = face.set_interest_filter(
            inner.identity.append(DKEY),
            sync_handler(move |interest| dkey_inner.on_decryption_key(interest)),
        );
        info!(identity = %inner.identity, "attribute authority ready");
        Ok(AttributeAuthority {
            inner,
            registrations: Mutex::new(vec![pp_registration, dkey_registration]),
        })
    }

    pub fn identity(&self) -> &Name {
        &self.inner.identity
    }

    pub fn public_params(&self) -> &PublicParams {
        &self.inner.public_params
    }

    /// Accepts DKEY requests signed by `certificate`.
    pub fn add_trust_anchor(&self, certificate: Certificate) {
        self.inner.trust.write().add_anchor(certificate);
    }

    /// Accepts attribute tokens signed by `certificate`.
    pub fn add_token_issuer(&self, certificate: Certificate) {
        self.inner.token_issuers.write().add_anchor(certificate);
    }

    /// Local copy of an issuer grant, used for requests without a token.
    pub fn mirror_grant(&self, identity: Name, attributes: AttributeSet) {
        self.inner.grants.write().insert(identity, attributes);
    }

    /// Unregisters both responders.
    pub fn shutdown(&self) {
        self.registrations.lock().clear();
    }
}
