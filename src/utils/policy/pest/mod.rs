use std::fmt;
use pest::{iterators::Pair, Parser};
use crate::error::AbacError;

#[derive(Parser)]
#[grammar = "threshold.policy.pest"]
pub(crate) struct ThresholdPolicyParser;

/// One lexical element of a postorder policy.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum PolicyToken {
    Attribute(String),
    Gate { k: usize, n: usize },
}

impl fmt::Display for PolicyToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PolicyToken::Attribute(name) => write!(f, "{}", name),
            PolicyToken::Gate { k, n } => write!(f, "{}of{}", k, n),
        }
    }
}

/// Splits policy text into tokens; structure is checked by the caller.
pub fn tokenize(policy: &str) -> Result<Vec<PolicyToken>, AbacError> {
    let mut pairs = ThresholdPolicyParser::parse(Rule::policy, policy)?;
    let root = match pairs.next() {
        Some(root) => root,
        None => return Err(AbacError::Parse("empty policy".into())),
    };
    let mut tokens = Vec::new();
    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::attribute => tokens.push(PolicyToken::Attribute(pair.as_str().to_string())),
            Rule::gate => tokens.push(parse_gate(pair)?),
            _ => {}
        }
    }
    Ok(tokens)
}

fn parse_gate(pair: Pair<Rule>) -> Result<PolicyToken, AbacError> {
    let text = pair.as_str().to_string();
    let mut counts = pair.into_inner().map(|count| {
        count
            .as_str()
            .parse::<usize>()
            .map_err(|_| AbacError::Parse(format!("gate count out of range in {}", text)))
    });
    match (counts.next(), counts.next()) {
        (Some(k), Some(n)) => Ok(PolicyToken::Gate { k: k?, n: n? }),
        _ => Err(AbacError::Parse(format!("malformed gate {}", text))),
    }
}
