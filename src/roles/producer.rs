use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use tracing::{debug, info, warn};
use crate::config::NabacConfig;
use crate::content::ContentKey;
use crate::encoding::{tlv::Block, types};
use crate::engine::{AttributeEngine, BswEngine, PublicParams, SignedMessage};
use crate::error::AbacError;
use crate::ndn::{face::sync_handler, Data, Face, Interest, Name, RegisteredPrefix};
use crate::security::{Certificate, KeyChain, TrustConfig};
use crate::utils::policy::Policy;
use super::{
    reply::{answer, status_block, SUCCESS},
    requester::Requester,
};

pub const SET_POLICY: &str = "SET_POLICY";
pub const CK: &str = "CK";
pub const ENC_BY: &str = "ENC-BY";

/// Bytes an owner signs to authorize assigning `policy` to `prefix`.
pub fn set_policy_message(prefix: &Name, policy: &Policy) -> Vec<u8> {
    let mut message = prefix.wire_encode().encode().to_vec();
    message.extend_from_slice(policy.as_str().as_bytes());
    message
}

/// The CK in use for one assigned prefix.
struct IssuedKey {
    policy: Policy,
    key: ContentKey,
    data: Data,
}

struct Inner {
    identity: Name,
    keychain: KeyChain,
    engine: Arc<dyn AttributeEngine>,
    trust: Arc<RwLock<TrustConfig>>,
    owners: RwLock<TrustConfig>,
    owner_policy: Option<Policy>,
    public_params: RwLock<Option<PublicParams>>,
    policies: RwLock<BTreeMap<Name, Policy>>,
    content_keys: RwLock<HashMap<Name, IssuedKey>>,
}

impl Inner {
    fn on_set_policy(&self, interest: Interest) -> Option<Data> {
        let result = self
            .set_policy(&interest)
            .map(|_| status_block(SUCCESS, "success"));
        answer(&self.keychain, &self.identity, &interest.name, result)
    }

    fn set_policy(&self, interest: &Interest) -> Result<(), AbacError> {
        let owner = self.owners.read().verify_interest(interest).map_err(|rejection| {
            warn!(name = %interest.name, "policy command from a non-owner");
            rejection
        })?;
        let base = self.identity.len() + 1;
        if interest.name.len() != base + 2 {
            return Err(AbacError::Encoding(format!("malformed command {}", interest.name)));
        }
        let prefix = interest.name.get_name(base)?;
        let policy = Policy::parse(&interest.name.get_text(base + 1)?)?;
        if let Some(owner_policy) = &self.owner_policy {
            self.verify_owner_signature(interest, &prefix, &policy, owner_policy)?;
        }
        let mut policies = self.policies.write();
        if policies.contains_key(&prefix) {
            return Err(AbacError::Conflict("exists".into()));
        }
        info!(owner = %owner.identity, prefix = %prefix, policy = %policy, "policy assigned");
        policies.insert(prefix, policy);
        Ok(())
    }

    fn verify_owner_signature(
        &self,
        interest: &Interest,
        prefix: &Name,
        policy: &Policy,
        owner_policy: &Policy,
    ) -> Result<(), AbacError> {
        let parameters = interest
            .application_parameters
            .as_ref()
            .ok_or_else(|| AbacError::Trust("command lacks an owner signature".into()))?;
        let signed = SignedMessage::wire_decode(&Block::decode(parameters)?)?;
        let public_params = self.public_params()?;
        self.engine.verify(
            &public_params,
            &signed,
            &set_policy_message(prefix, policy),
            owner_policy,
        )
    }

    fn public_params(&self) -> Result<PublicParams, AbacError> {
        self.public_params
            .read()
            .clone()
            .ok_or_else(|| AbacError::State("public key missing".into()))
    }

    /// Longest assigned prefix covering `name`, with its policy.
    fn assignment_for(&self, name: &Name) -> Option<(Name, Policy)> {
        self.policies
            .read()
            .iter()
            .filter(|(prefix, _)| prefix.is_prefix_of(name))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(prefix, policy)| (prefix.clone(), policy.clone()))
    }

    fn policy_for(&self, name: &Name) -> Option<Policy> {
        self.assignment_for(name).map(|(_, policy)| policy)
    }

    /// CK for `prefix`, minted on first use and again whenever its policy
    /// differs from the one the stored CK was encrypted under.
    fn content_key(
        &self,
        prefix: &Name,
        policy: &Policy,
        public_params: &PublicParams,
    ) -> Result<(ContentKey, Name), AbacError> {
        if let Some(issued) = self.content_keys.read().get(prefix) {
            if issued.policy.as_str() == policy.as_str() {
                return Ok((issued.key.clone(), issued.data.name.clone()));
            }
        }

        let key = ContentKey::generate(self.engine.as_ref(), public_params, policy)?;
        let ck_name = self
            .identity
            .append(CK)
            .append(rand::thread_rng().gen::<u32>().to_string())
            .append(ENC_BY)
            .append(policy.as_str());
        let mut ck_data = Data::new(ck_name.clone());
        ck_data.set_content_block(&Block::nested(types::CONTENT, &[
            Block::new(types::ENCRYPTED_CONTENT_KEY, key.encrypted().to_vec()),
        ]));
        self.keychain.sign_data(&mut ck_data, &self.identity)?;

        let mut content_keys = self.content_keys.write();
        // a concurrent request may have minted one first
        if let Some(issued) = content_keys.get(prefix) {
            if issued.policy.as_str() == policy.as_str() {
                return Ok((issued.key.clone(), issued.data.name.clone()));
            }
        }
        debug!(prefix = %prefix, ck = %ck_name, "minted content key");
        content_keys.insert(prefix.clone(), IssuedKey {
            policy: policy.clone(),
            key: key.clone(),
            data: ck_data,
        });
        Ok((key, ck_name))
    }

    fn produce(&self, name: &Name, payload: &[u8]) -> Result<Data, AbacError> {
        let (prefix, policy) = self
            .assignment_for(name)
            .ok_or_else(|| AbacError::State(format!("policy missing for {}", name)))?;
        let public_params = self.public_params()?;
        let (key, ck_name) = self.content_key(&prefix, &policy, &public_params)?;
        let protected = key.seal(payload)?;

        let mut data = Data::new(self.identity.join(name));
        data.set_content_block(&Block::nested(types::CONTENT, &[
            protected.make_data_content(),
            ck_name.wire_encode(),
        ]));
        self.keychain.sign_data(&mut data, &self.identity)?;
        info!(name = %data.name, ck = %ck_name, size = payload.len(), "produced content");
        Ok(data)
    }

    fn on_content(&self, interest: Interest, payload: &[u8]) -> Option<Data> {
        let name = interest.name.sub_name(self.identity.len(), usize::MAX);
        match self.produce(&name, payload) {
            Ok(data) => Some(data),
            Err(rejection) => answer(&self.keychain, &self.identity, &interest.name, Err(rejection)),
        }
    }

    fn on_content_key(&self, interest: Interest) -> Option<Data> {
        debug!(name = %interest.name, "content key requested");
        let stored = self
            .content_keys
            .read()
            .values()
            .find(|issued| issued.data.name == interest.name)
            .map(|issued| issued.data.clone());
        match stored {
            Some(data) => Some(data),
            None => answer(
                &self.keychain,
                &self.identity,
                &interest.name,
                Err(AbacError::State(format!("unknown content key {}", interest.name))),
            ),
        }
    }
}

/// Publishes content protected under owner-assigned policies.
///
/// Registers `<producer>/SET_POLICY` for owner commands and `<producer>/CK`
/// for content-key objects; [`Producer::serve`] adds content prefixes.
///
/// Only data owners added with [`Producer::add_data_owner`] may assign
/// policies. The shared trust config covers the authority and token issuer.
pub struct Producer {
    inner: Arc<Inner>,
    face: Arc<dyn Face>,
    requester: Requester,
    registrations: Mutex<Vec<RegisteredPrefix>>,
}

impl Producer {
    pub fn new(
        identity: Name,
        face: Arc<dyn Face>,
        keychain: KeyChain,
        trust: TrustConfig,
        config: &NabacConfig,
    ) -> Result<Producer, AbacError> {
        Producer::with_engine(identity, face, keychain, trust, config, Arc::new(BswEngine::new()))
    }

    pub fn with_engine(
        identity: Name,
        face: Arc<dyn Face>,
        keychain: KeyChain,
        trust: TrustConfig,
        config: &NabacConfig,
        engine: Arc<dyn AttributeEngine>,
    ) -> Result<Producer, AbacError> {
        let trust = Arc::new(RwLock::new(trust));
        let inner = Arc::new(Inner {
            identity: identity.clone(),
            keychain: keychain.clone(),
            engine,
            trust: Arc::clone(&trust),
            owners: RwLock::new(TrustConfig::new()),
            owner_policy: config.owner_policy()?,
            public_params: RwLock::new(None),
            policies: RwLock::new(BTreeMap::new()),
            content_keys: RwLock::new(HashMap::new()),
        });
        let requester = Requester {
            identity,
            face: Arc::clone(&face),
            keychain,
            trust,
            transport: config.transport.clone(),
        };

        let command_inner = Arc::clone(&inner);
        let command = face.set_interest_filter(
            inner.identity.append(SET_POLICY),
            sync_handler(move |interest| command_inner.on_set_policy(interest)),
        );
        let ck_inner = Arc::clone(&inner);
        let content_keys = face.set_interest_filter(
            inner.identity.append(CK),
            sync_handler(move |interest| ck_inner.on_content_key(interest)),
        );
        info!(identity = %inner.identity, "producer ready");
        Ok(Producer {
            inner,
            face,
            requester,
            registrations: Mutex::new(vec![command, content_keys]),
        })
    }

    pub fn identity(&self) -> &Name {
        &self.inner.identity
    }

    pub fn add_trust_anchor(&self, certificate: Certificate) {
        self.inner.trust.write().add_anchor(certificate);
    }

    /// Accepts SET_POLICY commands signed by `certificate`.
    pub fn add_data_owner(&self, certificate: Certificate) {
        info!(owner = %certificate.identity, "data owner added");
        self.inner.owners.write().add_anchor(certificate);
    }

    /// Fetches and caches the authority's public parameters, retrying up
    /// to the configured bound.
    pub async fn fetch_public_params(&self, authority: &Name) -> Result<(), AbacError> {
        let public_params = self.requester.fetch_public_params(authority).await?;
        *self.inner.public_params.write() = Some(public_params);
        info!(authority = %authority, "cached public params");
        Ok(())
    }

    pub fn has_public_params(&self) -> bool {
        self.inner.public_params.read().is_some()
    }

    pub fn policy_for(&self, name: &Name) -> Option<Policy> {
        self.inner.policy_for(name)
    }

    /// Administrative overwrite of the policy of `prefix`; returns the
    /// replaced policy. The prefix's CK is retired with it.
    pub fn reassign_policy(&self, prefix: Name, policy: Policy) -> Option<Policy> {
        info!(prefix = %prefix, policy = %policy, "policy reassigned");
        self.inner.content_keys.write().remove(&prefix);
        self.inner.policies.write().insert(prefix, policy)
    }

    /// Protects `payload` under the policy covering `name` (relative to the
    /// producer identity) and returns the signed content Data. Content under
    /// one assigned prefix shares a CK until the prefix's policy changes;
    /// the CK Data is kept for `<producer>/CK` requests.
    pub fn produce(&self, name: &Name, payload: &[u8]) -> Result<Data, AbacError> {
        self.inner.produce(name, payload)
    }

    /// Answers requests for `<producer>/<prefix>` with `payload`, sealed
    /// anew for every request.
    pub fn serve(&self, prefix: &Name, payload: Vec<u8>) {
        let inner = Arc::clone(&self.inner);
        let payload = Arc::new(payload);
        let registration = self.face.set_interest_filter(
            self.inner.identity.join(prefix),
            sync_handler(move |interest| inner.on_content(interest, &payload)),
        );
        self.registrations.lock().push(registration);
    }

    /// Unregisters every responder.
    pub fn shutdown(&self) {
        self.registrations.lock().clear();
    }
}
