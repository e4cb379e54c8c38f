//! Postorder threshold policies and attribute sets.
//!
//! A policy such as `"attr1 attr2 1of2 attr3 2of2"` is read left to right
//! with a value stack: an attribute pushes one value, a `k`of`n` gate pops
//! the `n` most recent values and pushes one. A well-formed policy leaves
//! exactly one value behind.
//!
//! ```
//! use nabac::utils::policy::{AttributeSet, Policy};
//! let policy = Policy::parse("a b 1of2 c 2of2").unwrap();
//! assert!(policy.is_satisfied(&AttributeSet::from_iter(["b", "c"])));
//! assert!(!policy.is_satisfied(&AttributeSet::from_iter(["a", "b"])));
//! ```
pub mod pest;

use std::{
    collections::BTreeSet,
    fmt,
    str::FromStr
};
use borsh::{BorshDeserialize, BorshSerialize};
use crate::error::AbacError;
use self::pest::{tokenize, PolicyToken};

/// Unordered set of attribute names held by one identity.
#[derive(Clone, PartialEq, Eq, Debug, Default, BorshSerialize, BorshDeserialize)]
pub struct AttributeSet(BTreeSet<String>);

impl AttributeSet {
    pub fn new() -> AttributeSet {
        AttributeSet(BTreeSet::new())
    }

    pub fn insert(&mut self, attribute: impl Into<String>) -> bool {
        self.0.insert(attribute.into())
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.0.contains(attribute)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Attributes in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        AttributeSet(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{{}}}", self.iter().collect::<Vec<_>>().join(", "))
    }
}

/// Threshold tree built from a policy. Leaves are numbered in postorder so
/// that repeated attribute names stay distinguishable.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum PolicyNode {
    Leaf { index: usize, attribute: String },
    Threshold { k: usize, children: Vec<PolicyNode> },
}

/// A parsed, structurally valid policy.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Policy {
    text: String,
    tokens: Vec<PolicyToken>,
    root: PolicyNode,
    leaves: usize,
}

impl Policy {
    pub fn parse(text: &str) -> Result<Policy, AbacError> {
        let tokens = tokenize(text)?;
        let mut leaves = 0;
        let root = reduce(
            &tokens,
            |attribute| {
                let index = leaves;
                leaves += 1;
                PolicyNode::Leaf { index, attribute: attribute.to_string() }
            },
            |k, children| PolicyNode::Threshold { k, children },
        )?;
        let text = tokens.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ");
        Ok(Policy { text, tokens, root, leaves })
    }

    /// Evaluates the policy against `attributes` in a single stack pass.
    pub fn is_satisfied(&self, attributes: &AttributeSet) -> bool {
        reduce(
            &self.tokens,
            |attribute| attributes.contains(attribute),
            |k, children| children.iter().filter(|satisfied| **satisfied).count() >= k,
        )
        .unwrap_or(false)
    }

    /// Canonical text: tokens separated by one space.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn root(&self) -> &PolicyNode {
        &self.root
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl FromStr for Policy {
    type Err = AbacError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Policy::parse(text)
    }
}

/// Parses policy text.
pub fn parse(text: &str) -> Result<Policy, AbacError> {
    Policy::parse(text)
}

/// Whether `attributes` satisfies `policy`.
pub fn is_satisfied(policy: &Policy, attributes: &AttributeSet) -> bool {
    policy.is_satisfied(attributes)
}

// the one postorder reduction shared by parsing and evaluation
fn reduce<T, L, G>(tokens: &[PolicyToken], mut leaf: L, mut gate: G) -> Result<T, AbacError>
where
    L: FnMut(&str) -> T,
    G: FnMut(usize, Vec<T>) -> T,
{
    let mut stack: Vec<T> = Vec::new();
    for token in tokens {
        match token {
            PolicyToken::Attribute(name) => stack.push(leaf(name)),
            PolicyToken::Gate { k, n } => {
                if *k == 0 {
                    return Err(AbacError::Parse(format!("gate {} is trivially satisfied", token)));
                }
                if k > n {
                    return Err(AbacError::Parse(format!("gate {} can never be satisfied", token)));
                }
                if *n > stack.len() {
                    return Err(AbacError::Parse(format!(
                        "gate {} needs {} operands, {} available",
                        token, n, stack.len()
                    )));
                }
                let children = stack.split_off(stack.len() - n);
                stack.push(gate(*k, children));
            }
        }
    }
    match stack.len() {
        1 => stack.pop().ok_or_else(|| AbacError::Parse("empty policy".into())),
        0 => Err(AbacError::Parse("empty policy".into())),
        roots => Err(AbacError::Parse(format!("policy leaves {} unconnected roots", roots))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(attributes: &[&str]) -> AttributeSet {
        attributes.iter().copied().collect()
    }

    #[test]
    fn one_of_two() {
        let policy = Policy::parse("a b 1of2").unwrap();
        assert!(policy.is_satisfied(&set(&["a"])));
        assert!(policy.is_satisfied(&set(&["b"])));
        assert!(policy.is_satisfied(&set(&["a", "b"])));
        assert!(!policy.is_satisfied(&set(&[])));
        assert!(!policy.is_satisfied(&set(&["c"])));
    }

    #[test]
    fn two_of_two() {
        let policy = Policy::parse("a b 2of2").unwrap();
        assert!(policy.is_satisfied(&set(&["a", "b"])));
        assert!(policy.is_satisfied(&set(&["a", "b", "c"])));
        assert!(!policy.is_satisfied(&set(&["a"])));
        assert!(!policy.is_satisfied(&set(&["b", "c"])));
    }

    #[test]
    fn nested_gates() {
        let policy = Policy::parse("a b 1of2 c 2of2").unwrap();
        assert!(policy.is_satisfied(&set(&["a", "c"])));
        assert!(policy.is_satisfied(&set(&["b", "c"])));
        assert!(!policy.is_satisfied(&set(&["a", "b"])));
        assert!(!policy.is_satisfied(&set(&["c"])));
    }

    #[test]
    fn two_of_three() {
        let policy = Policy::parse("a b c 2of3").unwrap();
        assert!(policy.is_satisfied(&set(&["a", "c"])));
        assert!(!policy.is_satisfied(&set(&["b"])));
    }

    #[test]
    fn single_attribute_is_a_policy() {
        let policy = Policy::parse("data-owner").unwrap();
        assert!(policy.is_satisfied(&set(&["data-owner"])));
        assert_eq!(policy.leaf_count(), 1);
    }

    #[test]
    fn malformed_policies() {
        for text in ["", "   ", "a b", "a 1of2", "a b 3of2", "a b 0of2", "1of1", "a b 1of2 c"] {
            assert!(
                matches!(Policy::parse(text), Err(AbacError::Parse(_))),
                "{:?} should not parse",
                text
            );
        }
    }

    #[test]
    fn canonical_text_and_tree() {
        let policy: Policy = "  attr1  attr2 01of2 attr3 2of2 ".parse().unwrap();
        assert_eq!(policy.as_str(), "attr1 attr2 1of2 attr3 2of2");
        assert_eq!(policy.leaf_count(), 3);
        match policy.root() {
            PolicyNode::Threshold { k, children } => {
                assert_eq!(*k, 2);
                assert_eq!(children.len(), 2);
                assert_eq!(children[1], PolicyNode::Leaf { index: 2, attribute: "attr3".into() });
            }
            leaf => panic!("unexpected root {:?}", leaf),
        }
    }

    #[test]
    fn repeated_attributes_keep_separate_leaves() {
        let policy = Policy::parse("a a 2of2").unwrap();
        assert_eq!(policy.leaf_count(), 2);
        assert!(policy.is_satisfied(&set(&["a"])));
    }
}
