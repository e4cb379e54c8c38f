use std::sync::Arc;
use parking_lot::{Mutex, RwLock};
use tracing::info;
use crate::config::TransportConfig;
use crate::engine::{AttributeEngine, BswEngine, PrivateKey, PublicParams};
use crate::error::AbacError;
use crate::ndn::{Face, Name};
use crate::security::{Certificate, KeyChain, TrustConfig};
use crate::utils::policy::Policy;
use super::{
    producer::{set_policy_message, SET_POLICY},
    requester::Requester,
};

struct SigningKey {
    public_params: PublicParams,
    key: PrivateKey,
    // the producer's owner policy the signatures must satisfy
    owner_policy: Policy,
}

/// Assigns policies to a producer's name prefixes with signed commands.
pub struct DataOwner {
    requester: Requester,
    engine: Arc<dyn AttributeEngine>,
    signing_key: Mutex<Option<SigningKey>>,
}

impl DataOwner {
    pub fn new(
        identity: Name,
        face: Arc<dyn Face>,
        keychain: KeyChain,
        trust: TrustConfig,
        transport: TransportConfig,
    ) -> DataOwner {
        DataOwner {
            requester: Requester {
                identity,
                face,
                keychain,
                trust: Arc::new(RwLock::new(trust)),
                transport,
            },
            engine: Arc::new(BswEngine::new()),
            signing_key: Mutex::new(None),
        }
    }

    pub fn identity(&self) -> &Name {
        &self.requester.identity
    }

    pub fn add_trust_anchor(&self, certificate: Certificate) {
        self.requester.trust.write().add_anchor(certificate);
    }

    /// Obtains an attribute key through the issuer → authority exchange.
    /// Later commands carry an attribute signature made with it, proving
    /// that the owner satisfies `owner_policy`.
    pub async fn obtain_signing_key(
        &self,
        issuer: &Name,
        authority: &Name,
        owner_policy: &str,
    ) -> Result<(), AbacError> {
        let owner_policy = Policy::parse(owner_policy)?;
        let public_params = self.requester.fetch_public_params(authority).await?;
        let (token, grant) = self.requester.fetch_token(issuer).await?;
        if !owner_policy.is_satisfied(&grant.attributes) {
            return Err(AbacError::Entitlement(format!(
                "{} does not satisfy {}",
                grant.attributes, owner_policy
            )));
        }
        let key = self.requester.fetch_decryption_key(authority, &token).await?;
        info!(owner = %self.identity(), attributes = %grant.attributes, "obtained signing key");
        *self.signing_key.lock() = Some(SigningKey { public_params, key, owner_policy });
        Ok(())
    }

    /// Sends `SET_POLICY` for `prefix` to `producer`. Malformed policy text
    /// fails here without any traffic; an assigned prefix yields
    /// [`AbacError::Conflict`].
    pub async fn command_producer_policy(
        &self,
        producer: &Name,
        prefix: &Name,
        policy: &str,
    ) -> Result<(), AbacError> {
        let policy = Policy::parse(policy)?;
        let name = producer
            .append(SET_POLICY)
            .append_name(prefix)
            .append(policy.as_str());
        let mut interest = self.requester.interest(name);
        if let Some(signing) = self.signing_key.lock().as_ref() {
            let signed = self.engine.sign(
                &signing.public_params,
                &signing.key,
                &set_policy_message(prefix, &policy),
                &signing.owner_policy,
            )?;
            interest = interest.with_application_parameters(signed.wire_encode().encode());
        }
        let interest = self.requester.signed_interest(interest)?;
        self.requester.fetch(interest).await?;
        info!(producer = %producer, prefix = %prefix, policy = %policy, "policy accepted");
        Ok(())
    }
}
