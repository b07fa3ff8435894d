//! URL specifications exchanged between the paginator and the URL builder.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered parameter map; nested maps hold scoped values.
pub type UrlOptions = Map<String, Value>;

/// Structured URL before it is rendered to a string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrlSpec {
    /// Path or route template such as `/articles/{page}`.
    pub path: Option<String>,
    /// Values for route placeholders embedded in the path.
    #[serde(default)]
    pub params: UrlOptions,
    /// Query-string values.
    #[serde(default)]
    pub query: UrlOptions,
    pub fragment: Option<String>,
}

impl UrlSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_none()
            && self.params.is_empty()
            && self.query.is_empty()
            && self.fragment.is_none()
    }

    /// Recursively merge `other` into a copy of `self`; values from `other` win.
    pub fn merged(&self, other: &UrlSpec) -> UrlSpec {
        let mut out = self.clone();
        if other.path.is_some() {
            out.path = other.path.clone();
        }
        if other.fragment.is_some() {
            out.fragment = other.fragment.clone();
        }
        merge_into(&mut out.params, &other.params);
        merge_into(&mut out.query, &other.query);
        out
    }
}

/// Recursive merge where `overlay` wins, nested maps are merged key by key.
pub fn merge_into(base: &mut UrlOptions, overlay: &UrlOptions) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Insert entries of `defaults` whose keys are absent from `target`.
pub fn add_missing(target: &mut UrlOptions, defaults: &UrlOptions) {
    for (key, value) in defaults {
        if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Recursively drop null, `false`, empty strings and empty containers. Zero is kept.
pub fn filter(options: &UrlOptions) -> UrlOptions {
    let mut out = Map::new();
    for (key, value) in options {
        let kept = match value {
            Value::Object(inner) => {
                let inner = filter(inner);
                (!inner.is_empty()).then_some(Value::Object(inner))
            }
            Value::Array(items) => (!items.is_empty()).then(|| value.clone()),
            Value::Null | Value::Bool(false) => None,
            Value::String(s) if s.is_empty() => None,
            other => Some(other.clone()),
        };
        if let Some(value) = kept {
            out.insert(key.clone(), value);
        }
    }
    out
}

/// Render a scalar option value the way it appears in a URL.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> UrlOptions {
        match value {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn filter_drops_falsy_but_keeps_zero() {
        let filtered = filter(&map(json!({
            "page": null,
            "sort": "",
            "flag": false,
            "limit": 0,
            "q": "x",
            "scope": {"page": null},
        })));
        assert_eq!(Value::Object(filtered), json!({"limit": 0, "q": "x"}));
    }

    #[test]
    fn merge_is_recursive_and_overlay_wins() {
        let mut base = map(json!({"a": 1, "s": {"x": 1, "y": 2}}));
        merge_into(&mut base, &map(json!({"a": 2, "s": {"y": 3}})));
        assert_eq!(Value::Object(base), json!({"a": 2, "s": {"x": 1, "y": 3}}));
    }

    #[test]
    fn add_missing_keeps_existing_nulls() {
        let mut target = map(json!({"page": null}));
        add_missing(&mut target, &map(json!({"page": 4, "sort": "title"})));
        assert_eq!(Value::Object(target), json!({"page": null, "sort": "title"}));
    }

    #[test]
    fn merged_spec_prefers_override_path() {
        let base = UrlSpec::new("/articles").with_query("q", "cake");
        let over = UrlSpec::new("/posts").with_query("limit", 5);
        let merged = base.merged(&over);
        assert_eq!(merged.path.as_deref(), Some("/posts"));
        assert_eq!(Value::Object(merged.query), json!({"q": "cake", "limit": 5}));
    }
}
