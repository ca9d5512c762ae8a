use std::collections::{BTreeMap, btree_map};

use super::error::FormError;

/// Multi-valued form/query parameters. Keys iterate in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValuesMap(BTreeMap<String, Vec<String>>);

impl ValuesMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.first().map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), vec![value.into()]);
    }

    /// Returns the value list of `key`, creating an empty one if needed.
    pub fn entry(&mut self, key: impl Into<String>) -> &mut Vec<String> {
        self.0.entry(key.into()).or_default()
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.0.remove(key)
    }

    pub fn extend(&mut self, other: ValuesMap) {
        for (key, values) in other.0 {
            self.0.entry(key).or_default().extend(values);
        }
    }

    /// Drops every key whose value list is empty.
    pub fn prune_empty(&mut self) {
        self.0.retain(|_, values| !values.is_empty());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Vec<String>> {
        self.0.iter()
    }

    /// `application/x-www-form-urlencoded` rendering, keys sorted.
    pub fn to_query_string(&self) -> Result<String, FormError> {
        let pairs: Vec<(&str, &str)> = self
            .0
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |v| (key.as_str(), v.as_str())))
            .collect();
        serde_urlencoded::to_string(pairs).map_err(|source| FormError::Urlencoded { source })
    }

    pub fn parse_query(input: &str) -> Result<Self, FormError> {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(input).map_err(|source| FormError::UrlDecoded { source })?;
        Ok(pairs.into_iter().collect())
    }
}

impl FromIterator<(String, String)> for ValuesMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut values = ValuesMap::new();
        for (key, value) in iter {
            values.append(key, value);
        }
        values
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for ValuesMap {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

impl From<BTreeMap<String, Vec<String>>> for ValuesMap {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        ValuesMap(map)
    }
}

impl From<ValuesMap> for BTreeMap<String, Vec<String>> {
    fn from(values: ValuesMap) -> Self {
        values.0
    }
}

impl<'a> IntoIterator for &'a ValuesMap {
    type Item = (&'a String, &'a Vec<String>);
    type IntoIter = btree_map::Iter<'a, String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
