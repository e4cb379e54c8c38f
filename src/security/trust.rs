use tracing::warn;
use crate::error::AbacError;
use crate::ndn::{name::Name, packet::{Data, Interest, Signature}};
use super::keychain::Certificate;

/// The certificates a role accepts signatures from.
#[derive(Clone, Default, Debug)]
pub struct TrustConfig {
    anchors: Vec<Certificate>,
}

impl TrustConfig {
    pub fn new() -> TrustConfig {
        TrustConfig::default()
    }

    /// Adds `certificate`, replacing an anchor with the same key name.
    pub fn add_anchor(&mut self, certificate: Certificate) {
        self.anchors.retain(|anchor| anchor.key_name != certificate.key_name);
        self.anchors.push(certificate);
    }

    pub fn find_anchor(&self, key_name: &Name) -> Option<&Certificate> {
        self.anchors.iter().find(|anchor| &anchor.key_name == key_name)
    }

    fn check(&self, what: &Name, signature: Option<&Signature>, signed: impl FnOnce(&Signature) -> Vec<u8>) -> Result<Certificate, AbacError> {
        let signature = signature
            .ok_or_else(|| AbacError::Trust(format!("{} is not signed", what)))?;
        let anchor = self.find_anchor(&signature.info.key_locator).ok_or_else(|| {
            warn!(name = %what, key = %signature.info.key_locator, "untrusted signer");
            AbacError::Trust(format!("{} is not a trust anchor", signature.info.key_locator))
        })?;
        anchor.verify(signature.info.signature_type, &signed(signature), &signature.value)?;
        Ok(anchor.clone())
    }

    /// Verifies a signed Data packet; returns the signer's certificate.
    pub fn verify_data(&self, data: &Data) -> Result<Certificate, AbacError> {
        self.check(&data.name, data.signature.as_ref(), |s| data.signed_portion(&s.info))
    }

    /// Verifies a signed Interest; returns the signer's certificate.
    pub fn verify_interest(&self, interest: &Interest) -> Result<Certificate, AbacError> {
        self.check(&interest.name, interest.signature.as_ref(), |s| interest.signed_portion(&s.info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::keychain::{KeyChain, KeyParams};

    fn signed(keychain: &KeyChain, identity: &Name) -> Data {
        let mut data = Data::with_content(identity.append("PUBLIC_PARAMS"), b"pp".to_vec());
        keychain.sign_data(&mut data, identity).unwrap();
        data
    }

    #[test]
    fn anchors_gate_acceptance() {
        let keychain = KeyChain::new();
        let aa = Name::from_uri("/aa").unwrap();
        let intruder = Name::from_uri("/intruder").unwrap();
        let certificate = keychain.create_identity(&aa, KeyParams::Ed25519).unwrap();
        keychain.create_identity(&intruder, KeyParams::Ed25519).unwrap();

        let mut trust = TrustConfig::new();
        trust.add_anchor(certificate.clone());
        assert_eq!(trust.verify_data(&signed(&keychain, &aa)).unwrap(), certificate);
        assert!(matches!(
            trust.verify_data(&signed(&keychain, &intruder)),
            Err(AbacError::Trust(_))
        ));
        let unsigned = Data::new(aa.append("PUBLIC_PARAMS"));
        assert!(matches!(trust.verify_data(&unsigned), Err(AbacError::Trust(_))));
        assert_eq!(trust.find_anchor(&certificate.key_name), Some(&certificate));
    }

    #[test]
    fn replaced_key_is_no_longer_trusted() {
        let keychain = KeyChain::new();
        let owner = Name::from_uri("/owner").unwrap();
        let old = keychain.create_identity(&owner, KeyParams::Ed25519).unwrap();
        let mut trust = TrustConfig::new();
        trust.add_anchor(old);
        keychain.create_identity(&owner, KeyParams::Ed25519).unwrap();

        let mut interest = Interest::new(owner.append("SET_POLICY"));
        keychain.sign_interest(&mut interest, &owner).unwrap();
        assert!(trust.verify_interest(&interest).is_err());
    }
}
