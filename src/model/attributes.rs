use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::model::element::Element;

/// A primitive attribute value: boolean, integer, float or text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Real(r) => write!(f, "{}", r),
            AttrValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Key/value attributes attached to managed elements.
///
/// Consumers use attributes to carry deployment knowledge the core does not
/// model structurally, e.g. per-VM migration durations or per-node boot
/// times picked up by the duration evaluators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    store: BTreeMap<Element, BTreeMap<String, AttrValue>>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute.
    ///
    /// # Returns
    /// `true` if a previous value was overridden.
    pub fn put(&mut self, e: Element, key: &str, value: AttrValue) -> bool {
        self.store.entry(e).or_default().insert(key.to_string(), value).is_some()
    }

    pub fn get(&self, e: Element, key: &str) -> Option<&AttrValue> {
        self.store.get(&e).and_then(|attrs| attrs.get(key))
    }

    pub fn get_bool(&self, e: Element, key: &str) -> Option<bool> {
        match self.get(e, key) {
            Some(AttrValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn get_int(&self, e: Element, key: &str) -> Option<i64> {
        match self.get(e, key) {
            Some(AttrValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn get_real(&self, e: Element, key: &str) -> Option<f64> {
        match self.get(e, key) {
            Some(AttrValue::Real(r)) => Some(*r),
            _ => None,
        }
    }

    pub fn get_text(&self, e: Element, key: &str) -> Option<&str> {
        match self.get(e, key) {
            Some(AttrValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_set(&self, e: Element, key: &str) -> bool {
        self.get(e, key).is_some()
    }

    /// Unset one attribute.
    ///
    /// # Returns
    /// `true` if a value was removed.
    pub fn unset(&mut self, e: Element, key: &str) -> bool {
        match self.store.get_mut(&e) {
            Some(attrs) => {
                let removed = attrs.remove(key).is_some();
                if attrs.is_empty() {
                    self.store.remove(&e);
                }
                removed
            }
            None => false,
        }
    }

    /// Parse `raw` into the narrowest fitting primitive (bool, then integer,
    /// then float, falling back to text) and store it.
    pub fn cast_and_put(&mut self, e: Element, key: &str, raw: &str) -> bool {
        let value = if let Ok(b) = raw.parse::<bool>() {
            AttrValue::Bool(b)
        } else if let Ok(i) = raw.parse::<i64>() {
            AttrValue::Int(i)
        } else if let Ok(r) = raw.parse::<f64>() {
            AttrValue::Real(r)
        } else {
            AttrValue::Text(raw.to_string())
        };
        self.put(e, key, value)
    }

    /// Elements that have at least one attribute set.
    pub fn elements(&self) -> BTreeSet<Element> {
        self.store.keys().copied().collect()
    }

    /// Attribute keys registered for one element.
    pub fn keys(&self, e: Element) -> BTreeSet<String> {
        self.store.get(&e).map(|attrs| attrs.keys().cloned().collect()).unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }
}
