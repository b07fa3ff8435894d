//! Named string templates with `{{var}}` placeholders.
//!
//! Templates are looked up by name and formatted with a set of variables.
//! Variables missing from the call render as an empty string; an unknown
//! template name is an error.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::errors::AppError;

const PAGINATOR_TEMPLATES: &[(&str, &str)] = &[
    (
        "nextActive",
        r#"<li class="next"><a rel="next" href="{{url}}">{{text}}</a></li>"#,
    ),
    (
        "nextDisabled",
        r#"<li class="next disabled"><a href="" onclick="return false;">{{text}}</a></li>"#,
    ),
    (
        "prevActive",
        r#"<li class="prev"><a rel="prev" href="{{url}}">{{text}}</a></li>"#,
    ),
    (
        "prevDisabled",
        r#"<li class="prev disabled"><a href="" onclick="return false;">{{text}}</a></li>"#,
    ),
    ("counterRange", "{{start}} - {{end}} of {{count}}"),
    ("counterPages", "{{page}} of {{pages}}"),
    (
        "first",
        r#"<li class="first"><a href="{{url}}">{{text}}</a></li>"#,
    ),
    ("last", r#"<li class="last"><a href="{{url}}">{{text}}</a></li>"#),
    ("number", r#"<li><a href="{{url}}">{{text}}</a></li>"#),
    ("current", r#"<li class="active"><a href="">{{text}}</a></li>"#),
    ("ellipsis", r#"<li class="ellipsis">&hellip;</li>"#),
    ("sort", r#"<a href="{{url}}">{{text}}</a>"#),
    ("sortAsc", r#"<a class="asc" href="{{url}}">{{text}}</a>"#),
    ("sortDesc", r#"<a class="desc" href="{{url}}">{{text}}</a>"#),
    (
        "sortAscLocked",
        r#"<a class="asc locked" href="{{url}}">{{text}}</a>"#,
    ),
    (
        "sortDescLocked",
        r#"<a class="desc locked" href="{{url}}">{{text}}</a>"#,
    ),
    ("metaLink", r#"<link href="{{url}}" rel="{{rel}}"/>"#),
];

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([\w._-]+)\}\}").expect("placeholder pattern is valid"))
}

/// Collection of named templates.
#[derive(Debug, Clone, Default)]
pub struct StringTemplate {
    templates: HashMap<String, String>,
}

impl StringTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Templates used by the paginator.
    pub fn paginator_defaults() -> Self {
        let mut templater = Self::new();
        templater.add(PAGINATOR_TEMPLATES.iter().copied());
        templater
    }

    /// Add or replace templates.
    pub fn add<K, V>(&mut self, templates: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (name, template) in templates {
            self.templates.insert(name.into(), template.into());
        }
    }

    /// Copy of this set with `overrides` layered on top.
    pub fn with_overrides(&self, overrides: &HashMap<String, String>) -> Self {
        let mut layered = self.clone();
        layered.add(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        layered
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    pub fn format(&self, name: &str, vars: &[(&str, &str)]) -> Result<String, AppError> {
        let template = self
            .get(name)
            .ok_or_else(|| AppError::TemplateNotFound(name.to_string()))?;

        let rendered = placeholder().replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
                .unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }
}

/// HTML-escape text for safe inclusion in markup.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}
