use std::sync::Arc;
use parking_lot::RwLock;
use tracing::debug;
use crate::config::TransportConfig;
use crate::engine::{PrivateKey, PublicParams};
use crate::error::AbacError;
use crate::ndn::{express_with_retry, Data, Face, Interest, Name};
use crate::security::{wrap::decrypt_with_keychain, KeyChain, TrustConfig};
use super::{
    attribute_authority::{DKEY, PUBLIC_PARAMS},
    reply::into_result,
    token_issuer::{AttributeToken, TOKEN},
};

/// The outbound half shared by every role that asks others for something:
/// retry, response verification and the public params → token → key chain.
#[derive(Clone)]
pub(crate) struct Requester {
    pub identity: Name,
    pub face: Arc<dyn Face>,
    pub keychain: KeyChain,
    pub trust: Arc<RwLock<TrustConfig>>,
    pub transport: TransportConfig,
}

impl Requester {
    pub fn interest(&self, name: Name) -> Interest {
        Interest::new(name).with_lifetime(self.transport.interest_lifetime())
    }

    pub fn signed_interest(&self, interest: Interest) -> Result<Interest, AbacError> {
        let mut interest = interest;
        self.keychain.sign_interest(&mut interest, &self.identity)?;
        Ok(interest)
    }

    /// Expresses `interest` with retries and checks that the answer is
    /// signed by a trusted identity owning the answer's namespace. Signed
    /// rejections become their error kind.
    pub async fn fetch(&self, interest: Interest) -> Result<Data, AbacError> {
        let data = express_with_retry(self.face.as_ref(), &interest, self.transport.repeat_attempts).await?;
        let signer = self.trust.read().verify_data(&data)?;
        if !signer.identity.is_prefix_of(&data.name) {
            return Err(AbacError::Trust(format!(
                "{} signed by {} outside its namespace",
                data.name, signer.identity
            )));
        }
        into_result(data)
    }

    pub async fn fetch_public_params(&self, authority: &Name) -> Result<PublicParams, AbacError> {
        let interest = self.interest(authority.append(PUBLIC_PARAMS));
        let data = self.fetch(interest).await?;
        debug!(authority = %authority, size = data.content.len(), "fetched public params");
        Ok(PublicParams::from_bytes(data.content.to_vec()))
    }

    /// Fetches this identity's token; returns the signed token Data and
    /// its decoded grant.
    pub async fn fetch_token(&self, issuer: &Name) -> Result<(Data, AttributeToken), AbacError> {
        let name = issuer.append(TOKEN).append_name(&self.identity);
        let interest = self.signed_interest(self.interest(name))?;
        let data = self.fetch(interest).await?;
        let token = AttributeToken::wire_decode(&data.content_block())?;
        if token.identity != self.identity {
            return Err(AbacError::Trust(format!(
                "token issued for {} instead of {}",
                token.identity, self.identity
            )));
        }
        debug!(issuer = %issuer, attributes = %token.attributes, "fetched attribute token");
        Ok((data, token))
    }

    /// Presents `token` to the authority and unwraps the decryption key.
    pub async fn fetch_decryption_key(&self, authority: &Name, token: &Data) -> Result<PrivateKey, AbacError> {
        let name = authority.append(DKEY).append_name(&self.identity);
        let interest = self.interest(name).with_application_parameters(token.to_wire());
        let interest = self.signed_interest(interest)?;
        let data = self.fetch(interest).await?;
        let key = decrypt_with_keychain(&self.keychain, &self.identity, &data.content_block())?;
        debug!(authority = %authority, "obtained decryption key");
        Ok(PrivateKey::from_bytes(key))
    }
}
