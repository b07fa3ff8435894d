//! Per-model paging state consumed by the paginator during a render pass.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sort direction. Anything other than an explicit `desc` reads as ascending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    /// Lenient parse used for request input: `desc` in any case, otherwise `asc`.
    pub fn normalize(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("invalid sort direction: {other}")),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paging metadata for one model, produced upstream by the data layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PagingParams {
    pub page: i64,
    pub page_count: i64,
    /// Total number of records across all pages.
    pub count: i64,
    /// Records on the current page.
    pub current: i64,
    pub per_page: i64,
    pub sort: Option<String>,
    pub direction: Option<String>,
    pub limit: Option<i64>,
    pub scope: Option<String>,
    pub sort_default: Option<String>,
    pub direction_default: Option<String>,
    pub prev_page: bool,
    pub next_page: bool,
}

impl Default for PagingParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_count: 0,
            count: 0,
            current: 0,
            per_page: 0,
            sort: None,
            direction: None,
            limit: None,
            scope: None,
            sort_default: None,
            direction_default: None,
            prev_page: false,
            next_page: false,
        }
    }
}

impl PagingParams {
    /// Build params for `page` of `page_count`, deriving the prev/next flags.
    pub fn new(page: i64, page_count: i64) -> Self {
        let page = page.max(1);
        let page_count = page_count.max(0);
        Self {
            page,
            page_count,
            prev_page: page > 1,
            next_page: page < page_count,
            ..Self::default()
        }
    }

    pub fn with_sort(mut self, sort: impl Into<String>, direction: Direction) -> Self {
        self.sort = Some(sort.into());
        self.direction = Some(direction.as_str().to_string());
        self
    }

    pub fn with_default_sort(mut self, sort: impl Into<String>, direction: Direction) -> Self {
        self.sort_default = Some(sort.into());
        self.direction_default = Some(direction.as_str().to_string());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_counts(mut self, count: i64, current: i64, per_page: i64) -> Self {
        self.count = count;
        self.current = current;
        self.per_page = per_page;
        self
    }
}

/// Paging attribute bag keyed by model name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PagingStore {
    models: HashMap<String, PagingParams>,
    first_model: Option<String>,
}

impl PagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: impl Into<String>, params: PagingParams) {
        let model = model.into();
        if self.first_model.is_none() {
            self.first_model = Some(model.clone());
        }
        self.models.insert(model, params);
    }

    pub fn with(mut self, model: impl Into<String>, params: PagingParams) -> Self {
        self.insert(model, params);
        self
    }

    pub fn get(&self, model: &str) -> Option<&PagingParams> {
        self.models.get(model)
    }

    /// Model registered first, used when callers do not name one.
    pub fn first_model(&self) -> Option<&str> {
        self.first_model.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
