use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::AppError;

/// Key/value store whose valid keys are fixed at construction.
///
/// Every write is checked against the allowed keys before anything is
/// mutated, so a rejected write (single or bulk) leaves the store unchanged.
/// Iteration follows the allowed-key order rather than insertion order.
#[derive(Clone)]
pub struct RestrictedStore<V = serde_json::Value> {
    allowed: Arc<[String]>,
    entries: HashMap<String, V>,
}

impl<V> RestrictedStore<V> {
    /// Create an empty store restricted to `allowed`. Repeated keys are
    /// kept once, at their first position.
    pub fn new(allowed: impl Into<Arc<[String]>>) -> Self {
        Self {
            allowed: dedup_keys(allowed.into()),
            entries: HashMap::new(),
        }
    }

    /// Create a store and populate it, failing if any key is not allowed.
    pub fn with_entries<I, K>(allowed: impl Into<Arc<[String]>>, pairs: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
    {
        let mut store = Self::new(allowed);
        store.update(pairs)?;
        Ok(store)
    }

    pub fn allowed_keys(&self) -> &[String] {
        &self.allowed
    }

    pub fn is_allowed(&self, key: &str) -> bool {
        self.allowed.iter().any(|allowed| allowed == key)
    }

    /// Insert or overwrite `key`.
    pub fn set(&mut self, key: impl Into<String>, value: V) -> Result<(), AppError> {
        self.try_set(key.into(), value)
            .map_err(|(key, _)| AppError::KeyNotAllowed(key))
    }

    /// Like [`set`](Self::set), but hands a rejected pair back to the caller.
    pub fn try_set(&mut self, key: String, value: V) -> Result<(), (String, V)> {
        if !self.is_allowed(&key) {
            return Err((key, value));
        }
        self.entries.insert(key, value);
        Ok(())
    }

    /// Set several keys at once. Either every key is written or none is.
    pub fn update<I, K>(&mut self, pairs: I) -> Result<(), AppError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
    {
        let pairs: Vec<(String, V)> = pairs.into_iter().map(|(k, v)| (k.into(), v)).collect();
        if let Some((key, _)) = pairs.iter().find(|(key, _)| !self.is_allowed(key)) {
            return Err(AppError::KeyNotAllowed(key.clone()));
        }
        self.entries.extend(pairs);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key)
    }

    /// Number of populated keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Populated keys in allowed-key order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Populated pairs in allowed-key order. Each call starts a fresh pass.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> + '_ {
        self.allowed
            .iter()
            .filter_map(|key| self.entries.get_key_value(key.as_str()))
            .map(|(key, value)| (key.as_str(), value))
    }
}

fn dedup_keys(allowed: Arc<[String]>) -> Arc<[String]> {
    let unique = {
        let mut seen = HashSet::new();
        allowed.iter().all(|key| seen.insert(key.as_str()))
    };
    if unique {
        return allowed;
    }
    let mut seen = HashSet::new();
    allowed
        .iter()
        .filter(|key| seen.insert(key.as_str()))
        .cloned()
        .collect::<Vec<_>>()
        .into()
}

impl<'a, V> IntoIterator for &'a RestrictedStore<V> {
    type Item = (&'a str, &'a V);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a V)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl<V: PartialEq> PartialEq for RestrictedStore<V> {
    /// Equal when the allowed key sets match and the entries match,
    /// independent of insertion order.
    fn eq(&self, other: &Self) -> bool {
        let ours: HashSet<&str> = self.allowed.iter().map(String::as_str).collect();
        let theirs: HashSet<&str> = other.allowed.iter().map(String::as_str).collect();
        ours == theirs && self.entries == other.entries
    }
}

impl<V: Eq> Eq for RestrictedStore<V> {}

impl<V: fmt::Debug> fmt::Debug for RestrictedStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RestrictedStore({:?}, ", self.allowed)?;
        f.debug_map().entries(self.iter()).finish()?;
        write!(f, ")")
    }
}
