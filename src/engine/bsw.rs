use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use crate::error::AbacError;
use crate::schemes::bsw::{self, CpAbeCiphertext, CpAbeMasterKey, CpAbePublicKey, CpAbeSecretKey};
use crate::utils::policy::{AttributeSet, Policy};
use super::{AttributeEngine, MasterKey, PrivateKey, PublicParams, SignedMessage};

#[derive(BorshSerialize, BorshDeserialize)]
struct BswPublicParams {
    pk: CpAbePublicKey,
    // authority key endorsing (signer key, attribute set) pairs
    endorsement_key: [u8; 32],
}

#[derive(BorshSerialize, BorshDeserialize)]
struct BswMasterKey {
    msk: CpAbeMasterKey,
    endorsement_seed: [u8; 32],
}

#[derive(BorshSerialize, BorshDeserialize)]
struct BswPrivateKey {
    sk: CpAbeSecretKey,
    signer_seed: [u8; 32],
    endorsement: Vec<u8>,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct AttributeSignature {
    signer_key: [u8; 32],
    attributes: AttributeSet,
    endorsement: Vec<u8>,
    signature: Vec<u8>,
}

fn decode<T: BorshDeserialize>(bytes: &[u8], what: &str) -> Result<T, AbacError> {
    borsh::from_slice(bytes).map_err(|e| AbacError::Encoding(format!("{}: {}", what, e)))
}

fn endorsement_message(signer_key: &[u8; 32], attributes: &AttributeSet) -> Result<Vec<u8>, AbacError> {
    Ok(borsh::to_vec(&("nabac/endorsement", signer_key, attributes))?)
}

fn signing_message(policy: &Policy, message: &[u8]) -> Result<Vec<u8>, AbacError> {
    Ok(borsh::to_vec(&("nabac/signature", policy.as_str(), message))?)
}

/// Threshold BSW CP-ABE with endorsement-based attribute signatures.
///
/// At key issuance the authority endorses a fresh Ed25519 signer key
/// together with the key's attribute set. A signature carries the signer
/// key, the attribute set and that endorsement, so a verifier holding only
/// the public parameters can check that the signer's attributes satisfy
/// the stated policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct BswEngine;

impl BswEngine {
    pub fn new() -> BswEngine {
        BswEngine
    }
}

impl AttributeEngine for BswEngine {
    fn setup(&self) -> Result<(PublicParams, MasterKey), AbacError> {
        let (pk, msk) = bsw::setup()?;
        let endorser = SigningKey::generate(&mut rand::thread_rng());
        let pp = BswPublicParams { pk, endorsement_key: endorser.verifying_key().to_bytes() };
        let msk = BswMasterKey { msk, endorsement_seed: endorser.to_bytes() };
        Ok((
            PublicParams::from_bytes(borsh::to_vec(&pp)?),
            MasterKey::from_bytes(borsh::to_vec(&msk)?),
        ))
    }

    fn keygen(
        &self,
        pp: &PublicParams,
        msk: &MasterKey,
        attributes: &AttributeSet,
    ) -> Result<PrivateKey, AbacError> {
        let pp: BswPublicParams = decode(pp.as_bytes(), "public params")?;
        let msk: BswMasterKey = decode(msk.as_bytes(), "master key")?;
        let sk = bsw::keygen(&pp.pk, &msk.msk, attributes)?;
        let signer = SigningKey::generate(&mut rand::thread_rng());
        let endorser = SigningKey::from_bytes(&msk.endorsement_seed);
        let endorsement = endorser
            .sign(&endorsement_message(&signer.verifying_key().to_bytes(), attributes)?)
            .to_bytes()
            .to_vec();
        let key = BswPrivateKey { sk, signer_seed: signer.to_bytes(), endorsement };
        Ok(PrivateKey::from_bytes(borsh::to_vec(&key)?))
    }

    fn encrypt(&self, pp: &PublicParams, policy: &Policy, plaintext: &[u8]) -> Result<Vec<u8>, AbacError> {
        let pp: BswPublicParams = decode(pp.as_bytes(), "public params")?;
        let ct = bsw::encrypt(&pp.pk, policy, plaintext)?;
        Ok(borsh::to_vec(&ct)?)
    }

    fn decrypt(&self, sk: &PrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>, AbacError> {
        let sk: BswPrivateKey = decode(sk.as_bytes(), "private key")?;
        let ct: CpAbeCiphertext = decode(ciphertext, "ciphertext")?;
        bsw::decrypt(&sk.sk, &ct)
    }

    fn sign(
        &self,
        _pp: &PublicParams,
        sk: &PrivateKey,
        message: &[u8],
        policy: &Policy,
    ) -> Result<SignedMessage, AbacError> {
        let sk: BswPrivateKey = decode(sk.as_bytes(), "private key")?;
        if !policy.is_satisfied(&sk.sk.attr) {
            return Err(AbacError::Entitlement(format!(
                "signer attributes do not satisfy {}",
                policy
            )));
        }
        let signer = SigningKey::from_bytes(&sk.signer_seed);
        let signature = signer.sign(&signing_message(policy, message)?).to_bytes().to_vec();
        let blob = AttributeSignature {
            signer_key: signer.verifying_key().to_bytes(),
            attributes: sk.sk.attr,
            endorsement: sk.endorsement,
            signature,
        };
        Ok(SignedMessage {
            plaintext_size: message.len() as u64,
            signature: borsh::to_vec(&blob)?,
        })
    }

    fn verify(
        &self,
        pp: &PublicParams,
        signed: &SignedMessage,
        message: &[u8],
        policy: &Policy,
    ) -> Result<(), AbacError> {
        if signed.plaintext_size != message.len() as u64 {
            return Err(AbacError::Encoding(format!(
                "signed size {} does not match message size {}",
                signed.plaintext_size,
                message.len()
            )));
        }
        let pp: BswPublicParams = decode(pp.as_bytes(), "public params")?;
        let blob: AttributeSignature = decode(&signed.signature, "attribute signature")?;
        let endorser = VerifyingKey::from_bytes(&pp.endorsement_key)?;
        endorser
            .verify(
                &endorsement_message(&blob.signer_key, &blob.attributes)?,
                &Signature::from_slice(&blob.endorsement)?,
            )
            .map_err(|_| AbacError::Trust("attribute set not endorsed by this authority".into()))?;
        if !policy.is_satisfied(&blob.attributes) {
            return Err(AbacError::Entitlement(format!(
                "signer attributes do not satisfy {}",
                policy
            )));
        }
        VerifyingKey::from_bytes(&blob.signer_key)?
            .verify(&signing_message(policy, message)?, &Signature::from_slice(&blob.signature)?)
            .map_err(|_| AbacError::Trust("attribute signature does not verify".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes(list: &[&str]) -> AttributeSet {
        list.iter().copied().collect()
    }

    #[test]
    fn handles_round_trip_through_the_engine() {
        let engine = BswEngine::new();
        let (pp, msk) = engine.setup().unwrap();
        let policy = Policy::parse("attr1 attr2 1of2 attr3 2of2").unwrap();
        let ct = engine.encrypt(&pp, &policy, &[]).unwrap();
        let c1 = engine.keygen(&pp, &msk, &attributes(&["attr1", "attr3"])).unwrap();
        let c2 = engine.keygen(&pp, &msk, &attributes(&["attr1"])).unwrap();
        assert_eq!(engine.decrypt(&c1, &ct).unwrap(), Vec::<u8>::new());
        assert!(matches!(engine.decrypt(&c2, &ct), Err(AbacError::Entitlement(_))));
    }

    #[test]
    fn signatures_prove_policy_satisfaction() {
        let engine = BswEngine::new();
        let (pp, msk) = engine.setup().unwrap();
        let owner = engine.keygen(&pp, &msk, &attributes(&["data-owner", "staff"])).unwrap();
        let policy = Policy::parse("data-owner admin 1of2").unwrap();
        let message = b"/dataName attr1 attr2 1of2".to_vec();

        let signed = engine.sign(&pp, &owner, &message, &policy).unwrap();
        assert_eq!(signed.plaintext_size, message.len() as u64);
        assert!(engine.verify(&pp, &signed, &message, &policy).is_ok());

        // different message, different policy, different authority
        assert!(engine.verify(&pp, &signed, b"/dataName other 1of1xx", &policy).is_err());
        let mut tampered = message.clone();
        tampered[0] = b'!';
        assert!(matches!(
            engine.verify(&pp, &signed, &tampered, &policy),
            Err(AbacError::Trust(_))
        ));
        let stricter = Policy::parse("data-owner admin 2of2").unwrap();
        assert!(matches!(
            engine.verify(&pp, &signed, &message, &stricter),
            Err(AbacError::Entitlement(_))
        ));
        let (other_pp, _) = engine.setup().unwrap();
        assert!(matches!(
            engine.verify(&other_pp, &signed, &message, &policy),
            Err(AbacError::Trust(_))
        ));
    }

    #[test]
    fn unsatisfying_signer_cannot_sign() {
        let engine = BswEngine::new();
        let (pp, msk) = engine.setup().unwrap();
        let guest = engine.keygen(&pp, &msk, &attributes(&["guest"])).unwrap();
        let policy = Policy::parse("data-owner").unwrap();
        assert!(matches!(
            engine.sign(&pp, &guest, b"cmd", &policy),
            Err(AbacError::Entitlement(_))
        ));
    }

    #[test]
    fn garbage_handles_are_encoding_errors() {
        let engine = BswEngine::new();
        let bogus = PrivateKey::from_bytes(vec![1, 2, 3]);
        assert!(matches!(engine.decrypt(&bogus, &[0u8; 4]), Err(AbacError::Encoding(_))));
    }
}
