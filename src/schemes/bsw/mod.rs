//! `BSW` scheme by John Bethencourt, Amit Sahai, Brent Waters, generalized
//! to postorder `k`of`n` threshold policies.
//!
//! * Developped by John Bethencourt, Amit Sahai, Brent Waters, "Ciphertext-Policy Attribute-Based Encryption"
//! * Published in Security and Privacy, 2007. SP'07. IEEE Symposium on. IEEE
//! * Available from <https://doi.org/10.1109/SP.2007.11>
//! * Type: encryption (attribute-based)
//! * Setting: bilinear groups (asymmetric)
//!
//! Every gate shares its secret with a fresh Shamir polynomial, every leaf
//! gets its own ciphertext component indexed by its postorder position, and
//! the payload is hidden under a KEM keyed by a random GT element.
//!
//! # Examples
//!
//! ```
//! use nabac::schemes::bsw::*;
//! use nabac::utils::policy::{AttributeSet, Policy};
//! let (pk, msk) = setup().unwrap();
//! let plaintext = String::from("our plaintext!").into_bytes();
//! let policy = Policy::parse("A B 1of2 C 2of2").unwrap();
//! let ct: CpAbeCiphertext = encrypt(&pk, &policy, &plaintext).unwrap();
//! let sk: CpAbeSecretKey = keygen(&pk, &msk, &AttributeSet::from_iter(["B", "C"])).unwrap();
//! assert_eq!(decrypt(&sk, &ct).unwrap(), plaintext);
//! ```
use rabe_bn::{Fr, Gt, G1, G2, pairing};
use rand::Rng;
use borsh::{BorshDeserialize, BorshSerialize};
use crate::error::AbacError;
use crate::utils::{
    aes::{decrypt_symmetric, encrypt_symmetric},
    hash::sha3_hash,
    policy::{AttributeSet, Policy},
    secretsharing::{calc_pruned, gen_shares_policy}
};

/// A BSW Public Key (PK)
#[derive(Clone, PartialEq, Debug, BorshSerialize, BorshDeserialize)]
pub struct CpAbePublicKey {
    pub g1: G1,
    pub g2: G2,
    pub h: G1,
    pub f: G2,
    pub e_gg_alpha: Gt,
}

/// A BSW Master Key (MSK)
#[derive(PartialEq, Debug, BorshSerialize, BorshDeserialize)]
pub struct CpAbeMasterKey {
    pub beta: Fr,
    pub g2_alpha: G2,
}

/// A BSW Ciphertext (CT); `c_y` holds one component per policy leaf.
#[derive(Clone, PartialEq, Debug, BorshSerialize, BorshDeserialize)]
pub struct CpAbeCiphertext {
    pub policy: String,
    pub c: G1,
    pub c_p: Gt,
    pub c_y: Vec<(u32, String, G1, G2)>,
    pub ct: Vec<u8>,
}

/// A BSW Secret Key (SK) bound to an attribute set
#[derive(PartialEq, Debug, BorshSerialize, BorshDeserialize)]
pub struct CpAbeSecretKey {
    pub attr: AttributeSet,
    pub d: G2,
    pub d_j: Vec<(String, G1, G2)>,
}

/// The setup algorithm of BSW CP-ABE. Generates a new CpAbePublicKey and a new CpAbeMasterKey.
pub fn setup() -> Result<(CpAbePublicKey, CpAbeMasterKey), AbacError> {
    // random number generator
    let mut rng = rand::thread_rng();
    // generator of group G1: g1 and generator of group G2: g2
    let g1: G1 = rng.gen();
    let g2: G2 = rng.gen();
    // random
    let beta: Fr = rng.gen();
    let alpha: Fr = rng.gen();
    let beta_inverse = beta
        .inverse()
        .ok_or_else(|| AbacError::Crypto("setup drew a zero beta".into()))?;
    // calculate h and f
    let h = g1 * beta;
    let f = g2 * beta_inverse;
    // calculate the pairing between g1 and g2^alpha
    let e_gg_alpha = pairing(g1, g2 * alpha);
    Ok((
        CpAbePublicKey { g1, g2, h, f, e_gg_alpha },
        CpAbeMasterKey { beta, g2_alpha: g2 * alpha },
    ))
}

/// The key generation algorithm of BSW CP-ABE. Generates a CpAbeSecretKey
/// bound to `attributes`; an empty set is rejected.
pub fn keygen(
    pk: &CpAbePublicKey,
    msk: &CpAbeMasterKey,
    attributes: &AttributeSet,
) -> Result<CpAbeSecretKey, AbacError> {
    if attributes.is_empty() {
        return Err(AbacError::Entitlement("empty attributes!".into()));
    }
    // random number generator
    let mut rng = rand::thread_rng();
    let r: Fr = rng.gen();
    let g_r = pk.g2 * r;
    let beta_inverse = msk
        .beta
        .inverse()
        .ok_or_else(|| AbacError::Crypto("master key has a zero beta".into()))?;
    let d = (msk.g2_alpha + g_r) * beta_inverse;
    let mut d_j: Vec<(String, G1, G2)> = Vec::with_capacity(attributes.len());
    for j in attributes.iter() {
        let r_j: Fr = rng.gen();
        d_j.push((
            j.to_string(), // attribute name
            pk.g1 * r_j, // D_j Prime
            g_r + (sha3_hash(pk.g2, j) * r_j), // D_j
        ));
    }
    Ok(CpAbeSecretKey { attr: attributes.clone(), d, d_j })
}

/// The encrypt algorithm of BSW CP-ABE.
pub fn encrypt(
    pk: &CpAbePublicKey,
    policy: &Policy,
    plaintext: &[u8],
) -> Result<CpAbeCiphertext, AbacError> {
    let mut rng = rand::thread_rng();
    // the shared root secret
    let s: Fr = rng.gen();
    let msg: Gt = rng.gen();
    let shares = gen_shares_policy(s, policy.root())?;
    let c = pk.h * s;
    let c_p = pk.e_gg_alpha.pow(s) * msg;
    let mut c_y: Vec<(u32, String, G1, G2)> = Vec::with_capacity(shares.len());
    for (index, j, share) in shares {
        c_y.push((
            index as u32,
            j.clone(),
            pk.g1 * share,
            sha3_hash(pk.g2, &j) * share,
        ));
    }
    //Encrypt plaintext using derived key from secret
    Ok(CpAbeCiphertext {
        policy: policy.as_str().to_string(),
        c,
        c_p,
        c_y,
        ct: encrypt_symmetric(&msg, plaintext)?,
    })
}

/// The decrypt algorithm of BSW CP-ABE. Fails with an entitlement error
/// when the key's attributes do not satisfy the ciphertext policy.
pub fn decrypt(sk: &CpAbeSecretKey, ct: &CpAbeCiphertext) -> Result<Vec<u8>, AbacError> {
    let policy = Policy::parse(&ct.policy)?;
    let pruned = match calc_pruned(&sk.attr, policy.root())? {
        Some(pruned) => pruned,
        None => {
            return Err(AbacError::Entitlement(
                "attributes in key do not satisfy policy".into(),
            ))
        }
    };
    let mut a = Gt::one();
    for (index, z) in pruned {
        let c_j = ct
            .c_y
            .iter()
            .find(|c| c.0 as usize == index)
            .ok_or_else(|| AbacError::Crypto(format!("ciphertext lacks leaf {}", index)))?;
        let d_j = sk
            .d_j
            .iter()
            .find(|d| d.0 == c_j.1)
            .ok_or_else(|| AbacError::Crypto(format!("key lacks attribute {}", c_j.1)))?;
        a = a * (pairing(c_j.2, d_j.2) * pairing(d_j.1, c_j.3).inverse()).pow(z);
    }
    let msg = ct.c_p * ((pairing(ct.c, sk.d)) * a.inverse()).inverse();
    // Decrypt plaintext using derived secret from cp-abe scheme
    decrypt_symmetric(&msg, &ct.ct)
}
