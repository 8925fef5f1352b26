use std::{collections::BTreeMap, fmt};

use itertools::Itertools;
use serde::Serialize;

use crate::client::serialize_query;

/// Every filter and view setting that influences a response.
///
/// Keys are kept sorted and multi-valued filters are sorted and deduplicated,
/// so the insertion order of filters never changes the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FilterState(BTreeMap<String, String>);

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single-valued filter. An empty value unsets it.
    pub fn set(&mut self, name: impl Into<String>, value: impl ToString) -> &mut Self {
        let name = name.into();
        let value = value.to_string();
        if value.trim().is_empty() {
            self.0.remove(&name);
        } else {
            self.0.insert(name, value);
        }
        self
    }

    /// Set a multi-valued filter (e.g. a list of districts).
    pub fn set_many<I, V>(&mut self, name: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let joined = values
            .into_iter()
            .map(|v| v.to_string())
            .filter(|v| !v.trim().is_empty())
            .sorted()
            .dedup()
            .join(",");
        self.set(name, joined)
    }

    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.set(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> &mut Self {
        self.0.remove(name);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Url query string sent to the boundary.
    pub fn to_query(&self) -> Option<String> {
        serialize_query(&self.0)
    }

    pub fn key(&self) -> FilterKey {
        FilterKey(self.to_query().unwrap_or_default())
    }
}

/// Canonical serialization of a [`FilterState`]. Two keys are equal iff the
/// resulting query strings are byte-identical.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FilterKey(String);

impl FilterKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&FilterState> for FilterKey {
    fn from(state: &FilterState) -> Self {
        state.key()
    }
}
