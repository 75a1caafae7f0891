//! Compound structural selectors.
//!
//! The pipeline never needs full CSS; the host matchers are flat compounds of
//! the form `tag.class[attr="value"][flag]`. Combinators are intentionally
//! unsupported — scoping happens through the tree query APIs instead.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node::NodeData;

/// Selector parse errors.
#[derive(Debug, Error, PartialEq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unexpected character `{ch}` at byte {at}")]
    Unexpected { ch: char, at: usize },

    #[error("unterminated attribute predicate")]
    UnterminatedAttr,

    #[error("descendant combinators are not supported: `{0}`")]
    Combinator(String),
}

/// One attribute predicate inside a compound selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrPredicate {
    /// `[name]` — attribute present, any value.
    Present(String),
    /// `[name="value"]` — attribute equals value exactly.
    Equals(String, String),
}

impl AttrPredicate {
    fn matches(&self, node: &NodeData) -> bool {
        match self {
            AttrPredicate::Present(name) => node.attr(name).is_some(),
            AttrPredicate::Equals(name, value) => node.attr(name) == Some(value.as_str()),
        }
    }
}

/// A flat compound selector: optional tag, class tokens, attribute predicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrPredicate>,
}

impl Selector {
    /// Selector matching any node (`*`).
    pub fn any() -> Self {
        Self::default()
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Default::default()
        }
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>) -> Self {
        self.attrs.push(AttrPredicate::Present(name.into()));
        self
    }

    pub fn attr_eq(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs
            .push(AttrPredicate::Equals(name.into(), value.into()));
        self
    }

    /// Match against a single node. Pure, no tree access.
    pub fn matches(&self, node: &NodeData) -> bool {
        if let Some(tag) = &self.tag {
            if !node.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        self.classes.iter().all(|c| node.has_class(c)) && self.attrs.iter().all(|a| a.matches(node))
    }

    /// Parse a compound selector string.
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(SelectorError::Empty);
        }
        if input.contains(char::is_whitespace) || input.contains('>') {
            return Err(SelectorError::Combinator(input.to_string()));
        }

        let mut selector = Selector::default();
        let bytes: Vec<char> = input.chars().collect();
        let mut i = 0;

        let read_ident = |i: &mut usize| -> String {
            let start = *i;
            while *i < bytes.len()
                && (bytes[*i].is_alphanumeric() || bytes[*i] == '-' || bytes[*i] == '_')
            {
                *i += 1;
            }
            bytes[start..*i].iter().collect()
        };

        if bytes[0] == '*' {
            i = 1;
        } else if bytes[0].is_alphabetic() {
            selector.tag = Some(read_ident(&mut i).to_ascii_lowercase());
        }

        while i < bytes.len() {
            match bytes[i] {
                '.' => {
                    i += 1;
                    let class = read_ident(&mut i);
                    if class.is_empty() {
                        return Err(SelectorError::Unexpected { ch: '.', at: i - 1 });
                    }
                    selector.classes.push(class);
                }
                '[' => {
                    i += 1;
                    let name = read_ident(&mut i);
                    if name.is_empty() {
                        return Err(SelectorError::Unexpected { ch: '[', at: i - 1 });
                    }
                    if i >= bytes.len() {
                        return Err(SelectorError::UnterminatedAttr);
                    }
                    match bytes[i] {
                        ']' => {
                            i += 1;
                            selector.attrs.push(AttrPredicate::Present(name));
                        }
                        '=' => {
                            i += 1;
                            let quoted = i < bytes.len() && (bytes[i] == '"' || bytes[i] == '\'');
                            let quote = if quoted { bytes[i] } else { ']' };
                            if quoted {
                                i += 1;
                            }
                            let start = i;
                            while i < bytes.len() && bytes[i] != quote {
                                i += 1;
                            }
                            if i >= bytes.len() {
                                return Err(SelectorError::UnterminatedAttr);
                            }
                            let value: String = bytes[start..i].iter().collect();
                            if quoted {
                                i += 1; // closing quote
                                if i >= bytes.len() || bytes[i] != ']' {
                                    return Err(SelectorError::UnterminatedAttr);
                                }
                            }
                            i += 1; // closing bracket
                            selector.attrs.push(AttrPredicate::Equals(name, value));
                        }
                        other => return Err(SelectorError::Unexpected { ch: other, at: i }),
                    }
                }
                other => return Err(SelectorError::Unexpected { ch: other, at: i }),
            }
        }

        Ok(selector)
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

/// An ordered list of selectors; a node matches if any entry does.
///
/// Order is meaningful to callers (prioritized candidate lists), so the list
/// preserves it and exposes indexed iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectorList {
    selectors: Vec<Selector>,
}

impl SelectorList {
    pub fn new(selectors: Vec<Selector>) -> Self {
        Self { selectors }
    }

    /// Parse every entry; fails on the first bad one.
    pub fn parse_all(inputs: &[&str]) -> Result<Self, SelectorError> {
        let selectors = inputs
            .iter()
            .map(|s| Selector::parse(s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { selectors })
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Selector> {
        self.selectors.iter()
    }

    pub fn matches(&self, node: &NodeData) -> bool {
        self.selectors.iter().any(|s| s.matches(node))
    }

    /// Concatenation preserving both orders, `self` first.
    pub fn union(&self, other: &SelectorList) -> SelectorList {
        let mut selectors = self.selectors.clone();
        selectors.extend(other.selectors.iter().cloned());
        SelectorList { selectors }
    }
}

impl From<Vec<Selector>> for SelectorList {
    fn from(selectors: Vec<Selector>) -> Self {
        Self::new(selectors)
    }
}
