//! Canonical keys for cached list queries

use std::collections::BTreeMap;

/// Key of a cached list: a scope plus the full parameter tuple.
///
/// Parameters are kept sorted so insertion order never produces two keys
/// for the same query.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryKey {
    scope: String,
    params: BTreeMap<String, String>,
}

impl QueryKey {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    /// Add the parameter only when present
    pub fn opt_param(self, name: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.param(name, v),
            None => self,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.scope)?;
        let mut sep = '?';
        for (k, v) in &self.params {
            write!(f, "{}{}={}", sep, k, v)?;
            sep = '&';
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_order_is_irrelevant() {
        let a = QueryKey::new("clans").param("sort", "members").param("page", 1);
        let b = QueryKey::new("clans").param("page", 1).param("sort", "members");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "clans?page=1&sort=members");
    }

    #[test]
    fn test_distinct_params_are_distinct_keys() {
        let a = QueryKey::new("threads").param("categoryId", "general");
        let b = QueryKey::new("threads").param("categoryId", "lfg");
        assert_ne!(a, b);
        assert_eq!(
            QueryKey::new("feed").opt_param("userId", None::<String>).to_string(),
            "feed"
        );
    }
}
