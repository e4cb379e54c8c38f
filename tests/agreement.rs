//! Decryption and attribute signatures succeed exactly when the attribute
//! set satisfies the policy.
use std::sync::OnceLock;

use nabac::content::{protect, unprotect};
use nabac::engine::{AttributeEngine, BswEngine, MasterKey, PublicParams};
use nabac::error::AbacError;
use nabac::utils::policy::{AttributeSet, Policy};
use proptest::prelude::*;

const ATTRIBUTES: [&str; 4] = ["a", "b", "c", "d"];

fn authority() -> &'static (PublicParams, MasterKey) {
    static AUTHORITY: OnceLock<(PublicParams, MasterKey)> = OnceLock::new();
    AUTHORITY.get_or_init(|| BswEngine::new().setup().unwrap())
}

/// Postorder policy text over a..d, nested at most three gates deep.
fn arb_policy_text() -> impl Strategy<Value = String> {
    let leaf = prop::sample::select(ATTRIBUTES.to_vec()).prop_map(str::to_string);
    leaf.prop_recursive(3, 12, 3, |inner| {
        prop::collection::vec(inner, 1..=3).prop_flat_map(|children| {
            let n = children.len();
            (1..=n).prop_map(move |k| format!("{} {}of{}", children.join(" "), k, n))
        })
    })
}

fn arb_attributes() -> impl Strategy<Value = AttributeSet> {
    prop::sample::subsequence(ATTRIBUTES.to_vec(), 1..=4).prop_map(AttributeSet::from_iter)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn decryption_follows_satisfaction(
        text in arb_policy_text(),
        attributes in arb_attributes(),
        payload in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let engine = BswEngine::new();
        let (pp, msk) = authority();
        let policy = Policy::parse(&text).unwrap();
        let key = engine.keygen(pp, msk, &attributes).unwrap();
        let protected = protect(&engine, pp, &policy, &payload).unwrap();

        match unprotect(&engine, &protected, &key) {
            Ok(plaintext) => {
                prop_assert!(policy.is_satisfied(&attributes));
                prop_assert_eq!(plaintext, payload);
            }
            Err(AbacError::Entitlement(_)) => prop_assert!(!policy.is_satisfied(&attributes)),
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    #[test]
    fn signing_follows_satisfaction(
        text in arb_policy_text(),
        attributes in arb_attributes(),
    ) {
        let engine = BswEngine::new();
        let (pp, msk) = authority();
        let policy = Policy::parse(&text).unwrap();
        let key = engine.keygen(pp, msk, &attributes).unwrap();

        match engine.sign(pp, &key, b"command", &policy) {
            Ok(signed) => {
                prop_assert!(policy.is_satisfied(&attributes));
                prop_assert!(engine.verify(pp, &signed, b"command", &policy).is_ok());
            }
            Err(AbacError::Entitlement(_)) => prop_assert!(!policy.is_satisfied(&attributes)),
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }
}
