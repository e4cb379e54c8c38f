use std::{fmt, sync::Arc};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info};
use crate::config::TransportConfig;
use crate::content::{unprotect, ProtectedContent};
use crate::encoding::{tlv::Block, types};
use crate::engine::{AttributeEngine, BswEngine, PrivateKey, PublicParams};
use crate::error::AbacError;
use crate::ndn::{Face, Name};
use crate::security::{Certificate, KeyChain, TrustConfig};
use crate::utils::policy::AttributeSet;
use super::requester::Requester;

/// The step of [`Consumer::consume`] that failed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Stage {
    PublicParams,
    AttributeToken,
    DecryptionKey,
    Content,
    ContentKey,
    Decrypt,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let stage = match self {
            Stage::PublicParams => "public params",
            Stage::AttributeToken => "attribute token",
            Stage::DecryptionKey => "decryption key",
            Stage::Content => "content",
            Stage::ContentKey => "content key",
            Stage::Decrypt => "decrypt",
        };
        write!(f, "{}", stage)
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct ConsumeError {
    pub stage: Stage,
    pub source: AbacError,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, ConsumeError>;
}

impl<T> AtStage<T> for Result<T, AbacError> {
    fn at(self, stage: Stage) -> Result<T, ConsumeError> {
        self.map_err(|source| ConsumeError { stage, source })
    }
}

#[derive(Default)]
struct KeyCache {
    public_params: Option<PublicParams>,
    // key together with the grant it was issued for
    key: Option<(AttributeSet, PrivateKey)>,
}

/// Fetches protected content and decrypts it with an attribute key
/// obtained through the issuer → authority exchange.
pub struct Consumer {
    requester: Requester,
    engine: Arc<dyn AttributeEngine>,
    authority: Name,
    issuer: Name,
    cache: Mutex<KeyCache>,
}

impl Consumer {
    pub fn new(
        identity: Name,
        face: Arc<dyn Face>,
        keychain: KeyChain,
        trust: TrustConfig,
        authority: Name,
        issuer: Name,
        transport: TransportConfig,
    ) -> Consumer {
        Consumer {
            requester: Requester {
                identity,
                face,
                keychain,
                trust: Arc::new(RwLock::new(trust)),
                transport,
            },
            engine: Arc::new(BswEngine::new()),
            authority,
            issuer,
            cache: Mutex::new(KeyCache::default()),
        }
    }

    pub fn identity(&self) -> &Name {
        &self.requester.identity
    }

    pub fn add_trust_anchor(&self, certificate: Certificate) {
        self.requester.trust.write().add_anchor(certificate);
    }

    /// Fetches the authority's public parameters unless already cached.
    pub async fn fetch_public_params(&self) -> Result<PublicParams, AbacError> {
        if let Some(public_params) = self.cache.lock().public_params.clone() {
            return Ok(public_params);
        }
        let public_params = self.requester.fetch_public_params(&self.authority).await?;
        self.cache.lock().public_params = Some(public_params.clone());
        Ok(public_params)
    }

    /// Makes sure a key for the current grant is cached; returns that grant.
    pub async fn refresh_decryption_key(&self) -> Result<AttributeSet, ConsumeError> {
        let (token, grant) = self.requester.fetch_token(&self.issuer).await.at(Stage::AttributeToken)?;
        let cached = matches!(&self.cache.lock().key, Some((attributes, _)) if *attributes == grant.attributes);
        if cached {
            debug!(attributes = %grant.attributes, "reusing cached decryption key");
            return Ok(grant.attributes);
        }
        let key = self
            .requester
            .fetch_decryption_key(&self.authority, &token)
            .await
            .at(Stage::DecryptionKey)?;
        self.cache.lock().key = Some((grant.attributes.clone(), key));
        Ok(grant.attributes)
    }

    /// Runs the whole exchange for `name`: public params, token, key,
    /// content, content key, decryption. The error names the failed step;
    /// no partial result is ever returned.
    pub async fn consume(&self, name: &Name) -> Result<Vec<u8>, ConsumeError> {
        self.fetch_public_params().await.at(Stage::PublicParams)?;
        self.refresh_decryption_key().await?;

        let interest = self.requester.interest(name.clone());
        let data = self.requester.fetch(interest).await.at(Stage::Content)?;
        let (data_content, ck_name) = split_content(&data.content_block()).at(Stage::Content)?;

        let ck_interest = self.requester.interest(ck_name.clone());
        let ck_data = self.requester.fetch(ck_interest).await.at(Stage::ContentKey)?;
        let protected = ProtectedContent::from_parts(&data_content, &ck_data.content_block())
            .at(Stage::ContentKey)?;

        let cache = self.cache.lock();
        let (_, key) = cache.key.as_ref().ok_or_else(|| ConsumeError {
            stage: Stage::DecryptionKey,
            source: AbacError::State("decryption key missing".into()),
        })?;
        let payload = unprotect(self.engine.as_ref(), &protected, key).at(Stage::Decrypt)?;
        info!(name = %name, ck = %ck_name, size = payload.len(), "consumed content");
        Ok(payload)
    }
}

/// `Content{ Content{...}, Name(ck) }` into its two parts.
fn split_content(block: &Block) -> Result<(Block, Name), AbacError> {
    let mut reader = block.reader()?;
    let data_content = reader.expect(types::CONTENT)?;
    let ck_name = Name::wire_decode(&reader.expect(types::NAME)?)?;
    reader.finish()?;
    Ok((data_content, ck_name))
}
