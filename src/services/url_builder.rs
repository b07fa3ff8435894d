//! Renders `UrlSpec` values into link targets.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;
use url::form_urlencoded;

use crate::models::url::{value_to_string, UrlOptions, UrlSpec};
use crate::services::template::escape;

/// Rendering switches for a single URL.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// HTML-escape the rendered URL for use inside an attribute.
    pub escape: bool,
    /// Prefix the configured scheme and host.
    pub full_base: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            escape: true,
            full_base: false,
        }
    }
}

/// Turns structured URLs into strings.
pub trait UrlBuilder: Send + Sync {
    fn build(&self, url: &UrlSpec, options: BuildOptions) -> String;
}

/// Builder that fills `{placeholder}` path segments and encodes the rest as a query string.
#[derive(Debug, Clone)]
pub struct RouteUrlBuilder {
    here: String,
    full_base_url: String,
}

fn route_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{(\w+)\}").expect("route placeholder pattern is valid"))
}

impl RouteUrlBuilder {
    /// `here` is the path used when a `UrlSpec` carries none (the current request path).
    pub fn new(here: impl Into<String>, full_base_url: impl Into<String>) -> Self {
        Self {
            here: here.into(),
            full_base_url: full_base_url.into(),
        }
    }

    fn render_path(&self, template: &str, params: &UrlOptions) -> (String, UrlOptions) {
        let mut leftover = params.clone();
        let filled = route_placeholder().replace_all(template, |caps: &Captures| {
            let value = leftover.shift_remove(&caps[1]);
            value
                .as_ref()
                .and_then(value_to_string)
                .map(|v| form_urlencoded::byte_serialize(v.as_bytes()).collect::<String>())
                .unwrap_or_default()
        });

        let segments: Vec<&str> = filled.split('/').filter(|s| !s.is_empty()).collect();
        let path = format!("/{}", segments.join("/"));
        (path, leftover)
    }
}

impl UrlBuilder for RouteUrlBuilder {
    fn build(&self, url: &UrlSpec, options: BuildOptions) -> String {
        let template = url.path.as_deref().unwrap_or(&self.here);
        let (path, leftover) = self.render_path(template, &url.params);

        let mut query = leftover;
        for (key, value) in &url.query {
            query.insert(key.clone(), value.clone());
        }

        let mut out = String::new();
        if options.full_base {
            out.push_str(self.full_base_url.trim_end_matches('/'));
        }
        out.push_str(&path);

        let encoded = encode_query(&query);
        if !encoded.is_empty() {
            out.push('?');
            out.push_str(&encoded);
        }
        if let Some(fragment) = url.fragment.as_deref().filter(|f| !f.is_empty()) {
            out.push('#');
            out.push_str(fragment);
        }

        if options.escape {
            escape(&out)
        } else {
            out
        }
    }
}

/// Encode a query map, nesting scoped maps with bracket notation (`scope[page]=2`).
pub fn encode_query(query: &UrlOptions) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in query {
        append_pair(&mut serializer, key, value);
    }
    serializer.finish()
}

fn append_pair(serializer: &mut form_urlencoded::Serializer<'_, String>, key: &str, value: &Value) {
    match value {
        Value::Object(inner) => {
            for (sub, v) in inner {
                append_pair(serializer, &format!("{key}[{sub}]"), v);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                append_pair(serializer, &format!("{key}[{i}]"), v);
            }
        }
        scalar => {
            if let Some(v) = value_to_string(scalar) {
                serializer.append_pair(key, &v);
            }
        }
    }
}
