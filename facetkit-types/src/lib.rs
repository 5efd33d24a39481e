//! Shared types for facetkit
//!
//! This crate provides the value types that flow between the facet engine
//! and its collaborators: state values and snapshots, action-state tokens,
//! and references to facets for navigation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Short label describing one aspect of a facet's current state
///
/// Tokens are matched by exact string equality and carry no other meaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(pub String);

impl Token {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(token: &str) -> Self {
        Token(token.to_string())
    }
}

impl From<String> for Token {
    fn from(token: String) -> Self {
        Token(token)
    }
}

impl PartialEq<&str> for Token {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build a token list from anything string-like
pub fn tokens<I, S>(items: I) -> Vec<Token>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(|s| Token(s.into())).collect()
}

/// A single value stored in facet state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    /// Pagination and other numeric arguments
    Int(i64),
    /// Plain route argument
    Text(String),
    /// Multi-key fields such as `pkeys`
    List(Vec<String>),
}

impl StateValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            StateValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Integer view of the value; text is parsed leniently (leading digits)
    pub fn as_int(&self) -> Option<i64> {
        match self {
            StateValue::Int(i) => Some(*i),
            StateValue::Text(s) => parse_leading_int(s),
            StateValue::List(_) => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, StateValue::List(_))
    }

    /// Loose equality between two state values
    ///
    /// Lists compare element-wise in order. Text and integers compare by
    /// numeric value, so a route argument `"2"` equals the page number `2`.
    pub fn loosely_eq(&self, other: &StateValue) -> bool {
        match (self, other) {
            (StateValue::List(a), StateValue::List(b)) => a == b,
            (StateValue::List(_), _) | (_, StateValue::List(_)) => false,
            (StateValue::Text(a), StateValue::Text(b)) => a == b,
            (StateValue::Int(a), StateValue::Int(b)) => a == b,
            (StateValue::Text(s), StateValue::Int(i)) | (StateValue::Int(i), StateValue::Text(s)) => {
                text_to_number(s).is_some_and(|n| n == *i as f64)
            }
        }
    }
}

/// Numeric conversion of text: surrounding whitespace is ignored and empty text is zero
fn text_to_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_leading_int(s: &str) -> Option<i64> {
    let trimmed = s.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::Text(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        StateValue::Text(value)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        StateValue::Int(value)
    }
}

impl From<Vec<String>> for StateValue {
    fn from(value: Vec<String>) -> Self {
        StateValue::List(value)
    }
}

impl From<Vec<&str>> for StateValue {
    fn from(value: Vec<&str>) -> Self {
        StateValue::List(value.into_iter().map(str::to_string).collect())
    }
}

/// Plain snapshot of facet state: property name to value
///
/// Snapshots have no identity and no behavior; they only hold defined keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateSnapshot(pub BTreeMap<String, StateValue>);

impl StateSnapshot {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<StateValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<StateValue>) -> Option<StateValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<StateValue> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &StateValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<StateValue>> FromIterator<(K, V)> for StateSnapshot {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for StateSnapshot {
    type Item = (String, StateValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, StateValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Reference to a facet for navigation requests
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FacetRef {
    /// Owning entity name; `None` for top-level facets
    pub entity: Option<String>,
    /// Facet name
    pub facet: String,
}

impl FacetRef {
    pub fn new(entity: Option<impl Into<String>>, facet: impl Into<String>) -> Self {
        Self {
            entity: entity.map(Into::into),
            facet: facet.into(),
        }
    }
}

impl fmt::Display for FacetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entity {
            Some(entity) => write!(f, "{}/{}", entity, self.facet),
            None => f.write_str(&self.facet),
        }
    }
}
