//! Shamir sharing over threshold trees.
//!
//! A `k`of`n` gate holding secret `s` draws a random polynomial of degree
//! `k-1` with constant term `s` and gives child `i` the share `q(i)`,
//! `i = 1..n`. Leaves are addressed by their postorder index.
use rabe_bn::Fr;
use rand::Rng;
use crate::error::AbacError;
use crate::utils::{
    policy::{AttributeSet, PolicyNode},
    tools::usize_to_fr
};

/// Evaluates the polynomial with coefficients `coeff` (lowest first) at `x`.
pub fn polynomial(coeff: &[Fr], x: Fr) -> Fr {
    coeff.iter().rev().fold(Fr::zero(), |acc, c| acc * x + *c)
}

/// Returns `[q(0), q(1), .., q(n)]` for a fresh degree `k-1` polynomial
/// with `q(0) = secret`.
pub fn gen_shares(secret: Fr, k: usize, n: usize) -> Result<Vec<Fr>, AbacError> {
    if k == 0 || k > n {
        return Err(AbacError::Crypto(format!("cannot share a {}of{} gate", k, n)));
    }
    // random number generator
    let mut rng = rand::thread_rng();
    let mut coeff: Vec<Fr> = Vec::with_capacity(k);
    coeff.push(secret);
    for _ in 1..k {
        coeff.push(rng.gen());
    }
    Ok((0..=n).map(|i| polynomial(&coeff, usize_to_fr(i))).collect())
}

// lagrange interpolation at zero
pub fn recover_coefficients(list: &[Fr]) -> Result<Vec<Fr>, AbacError> {
    let mut coeff: Vec<Fr> = Vec::with_capacity(list.len());
    for i in list {
        let mut result = Fr::one();
        for j in list {
            if i != j {
                let denominator = (*i - *j)
                    .inverse()
                    .ok_or_else(|| AbacError::Crypto("duplicate interpolation point".into()))?;
                result = result * ((Fr::zero() - *j) * denominator);
            }
        }
        coeff.push(result);
    }
    Ok(coeff)
}

/// Splits `secret` down the tree; one `(leaf index, attribute, share)` per leaf.
pub fn gen_shares_policy(secret: Fr, node: &PolicyNode) -> Result<Vec<(usize, String, Fr)>, AbacError> {
    match node {
        PolicyNode::Leaf { index, attribute } => Ok(vec![(*index, attribute.clone(), secret)]),
        PolicyNode::Threshold { k, children } => {
            let shares = gen_shares(secret, *k, children.len())?;
            let mut result = Vec::new();
            for (i, child) in children.iter().enumerate() {
                result.extend(gen_shares_policy(shares[i + 1], child)?);
            }
            Ok(result)
        }
    }
}

/// Picks a satisfying subtree (the first `k` satisfied children of every
/// gate) and returns, per used leaf, the product of Lagrange coefficients
/// along its path. `None` if `attributes` does not satisfy the tree.
pub fn calc_pruned(attributes: &AttributeSet, node: &PolicyNode) -> Result<Option<Vec<(usize, Fr)>>, AbacError> {
    match node {
        PolicyNode::Leaf { index, attribute } => {
            if attributes.contains(attribute) {
                Ok(Some(vec![(*index, Fr::one())]))
            } else {
                Ok(None)
            }
        }
        PolicyNode::Threshold { k, children } => {
            let mut points: Vec<Fr> = Vec::with_capacity(*k);
            let mut subtrees: Vec<Vec<(usize, Fr)>> = Vec::with_capacity(*k);
            for (i, child) in children.iter().enumerate() {
                if subtrees.len() == *k {
                    break;
                }
                if let Some(leaves) = calc_pruned(attributes, child)? {
                    points.push(usize_to_fr(i + 1));
                    subtrees.push(leaves);
                }
            }
            if subtrees.len() < *k {
                return Ok(None);
            }
            let coeff = recover_coefficients(&points)?;
            let mut result = Vec::new();
            for (leaves, lambda) in subtrees.into_iter().zip(coeff) {
                result.extend(leaves.into_iter().map(|(index, c)| (index, c * lambda)));
            }
            Ok(Some(result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::policy::Policy;

    #[test]
    fn any_k_shares_recover_the_secret() {
        let mut rng = rand::thread_rng();
        let secret: Fr = rng.gen();
        let shares = gen_shares(secret, 3, 5).unwrap();
        assert_eq!(shares[0], secret);
        for picked in [[1usize, 2, 3], [1, 3, 5], [2, 4, 5]] {
            let points: Vec<Fr> = picked.iter().map(|i| usize_to_fr(*i)).collect();
            let coeff = recover_coefficients(&points).unwrap();
            let recovered = picked
                .iter()
                .zip(coeff)
                .fold(Fr::zero(), |acc, (i, c)| acc + shares[*i] * c);
            assert_eq!(recovered, secret);
        }
    }

    #[test]
    fn invalid_gates_cannot_be_shared() {
        assert!(gen_shares(Fr::one(), 0, 2).is_err());
        assert!(gen_shares(Fr::one(), 3, 2).is_err());
    }

    #[test]
    fn pruned_tree_recovers_the_root() {
        let mut rng = rand::thread_rng();
        let secret: Fr = rng.gen();
        let policy = Policy::parse("a b 1of2 c d e 2of3 2of2").unwrap();
        let shares = gen_shares_policy(secret, policy.root()).unwrap();
        assert_eq!(shares.len(), 5);

        let attributes: AttributeSet = ["b", "c", "e"].iter().copied().collect();
        let pruned = calc_pruned(&attributes, policy.root()).unwrap().unwrap();
        let recovered = pruned.iter().fold(Fr::zero(), |acc, (index, c)| {
            let share = shares.iter().find(|s| s.0 == *index).unwrap().2;
            acc + share * *c
        });
        assert_eq!(recovered, secret);
    }

    #[test]
    fn unsatisfied_tree_prunes_to_none() {
        let policy = Policy::parse("a b 1of2 c 2of2").unwrap();
        let attributes: AttributeSet = ["a", "b"].iter().copied().collect();
        assert!(calc_pruned(&attributes, policy.root()).unwrap().is_none());
    }
}
