//! Pagination controls: paging-state accessors, canonical URL parameters and link rendering.
//!
//! The paginator reads per-model [`PagingParams`] produced upstream, merges
//! them with caller options and the configured base URL, hands the result to
//! a [`UrlBuilder`] and formats markup through [`StringTemplate`]. Missing
//! paging data never fails a render; it degrades to default values.

use std::borrow::Cow;
use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::config::PaginatorConfig;
use crate::errors::AppError;
use crate::models::paging::{Direction, PagingParams, PagingStore};
use crate::models::url::{add_missing, filter, UrlOptions, UrlSpec};
use crate::services::inflector;
use crate::services::template::{escape, StringTemplate};
use crate::services::url_builder::{BuildOptions, RouteUrlBuilder, UrlBuilder};

const DEFAULT_PREV_TITLE: &str = "<< Previous";
const DEFAULT_NEXT_TITLE: &str = "Next >>";

/// What a prev/next link shows when there is no page to go to.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DisabledTitle {
    #[default]
    SameAsTitle,
    Text(String),
    /// Render nothing at all.
    Hidden,
}

/// Options for `prev` and `next`.
#[derive(Debug, Clone)]
pub struct LinkOptions {
    pub model: Option<String>,
    pub url: UrlSpec,
    pub escape: bool,
    pub disabled_title: DisabledTitle,
    pub templates: HashMap<String, String>,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            model: None,
            url: UrlSpec::default(),
            escape: true,
            disabled_title: DisabledTitle::default(),
            templates: HashMap::new(),
        }
    }
}

/// Sort link text, optionally different per target direction.
#[derive(Debug, Clone, PartialEq)]
pub enum SortTitle {
    Text(String),
    ByDirection { asc: String, desc: String },
}

impl SortTitle {
    fn for_direction(&self, dir: Direction) -> &str {
        match self {
            Self::Text(text) => text,
            Self::ByDirection { asc, desc } => match dir {
                Direction::Asc => asc,
                Direction::Desc => desc,
            },
        }
    }
}

impl From<&str> for SortTitle {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Options for `sort`.
#[derive(Debug, Clone)]
pub struct SortOptions {
    pub model: Option<String>,
    pub url: UrlSpec,
    pub escape: bool,
    /// Direction targeted when the field is not the active sort.
    pub direction: Option<Direction>,
    /// Always issue `direction`, never toggle.
    pub lock: bool,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            model: None,
            url: UrlSpec::default(),
            escape: true,
            direction: None,
            lock: false,
        }
    }
}

/// First/last boundary: a text link or a run of numbered links.
#[derive(Debug, Clone, PartialEq)]
pub enum Boundary {
    Text(String),
    Count(i64),
}

impl Boundary {
    fn count(&self) -> i64 {
        match self {
            Self::Count(n) => *n,
            Self::Text(_) => 0,
        }
    }

    /// A zero or negative count means no boundary.
    fn present(boundary: Option<&Boundary>) -> Option<&Boundary> {
        boundary.filter(|b| !matches!(b, Self::Count(n) if *n <= 0))
    }

    fn label(&self) -> String {
        match self {
            Self::Count(n) => n.to_string(),
            Self::Text(text) => text.clone(),
        }
    }
}

/// Options for `first` and `last`.
#[derive(Debug, Clone)]
pub struct BoundaryOptions {
    pub model: Option<String>,
    pub url: UrlSpec,
    pub escape: bool,
}

impl Default for BoundaryOptions {
    fn default() -> Self {
        Self {
            model: None,
            url: UrlSpec::default(),
            escape: true,
        }
    }
}

/// Options for `numbers`.
#[derive(Debug, Clone)]
pub struct NumbersOptions {
    pub model: Option<String>,
    pub url: UrlSpec,
    pub before: Option<String>,
    pub after: Option<String>,
    /// Number of page links around the current page; `None` renders every page.
    pub modulus: Option<i64>,
    pub first: Option<Boundary>,
    pub last: Option<Boundary>,
    pub templates: HashMap<String, String>,
}

impl Default for NumbersOptions {
    fn default() -> Self {
        Self {
            model: None,
            url: UrlSpec::default(),
            before: None,
            after: None,
            modulus: Some(8),
            first: None,
            last: None,
            templates: HashMap::new(),
        }
    }
}

/// Options for `meta`.
#[derive(Debug, Clone)]
pub struct MetaOptions {
    pub model: Option<String>,
    pub prev: bool,
    pub next: bool,
    pub first: bool,
    pub last: bool,
}

impl Default for MetaOptions {
    fn default() -> Self {
        Self {
            model: None,
            prev: true,
            next: true,
            first: false,
            last: false,
        }
    }
}

/// Counter output format.
#[derive(Debug, Clone, PartialEq)]
pub enum CounterFormat {
    /// `3 of 10`
    Pages,
    /// `21 - 30 of 95`
    Range,
    /// Template with `{{page}}`, `{{pages}}`, `{{current}}`, `{{count}}`, `{{start}}`, `{{end}}`, `{{model}}`.
    Custom(String),
}

/// Renders pagination controls for one request.
pub struct Paginator<B: UrlBuilder = RouteUrlBuilder> {
    paging: PagingStore,
    config: PaginatorConfig,
    templater: StringTemplate,
    url_builder: B,
}

impl<B: UrlBuilder> Paginator<B> {
    pub fn new(paging: PagingStore, config: PaginatorConfig, url_builder: B) -> Self {
        let templater = StringTemplate::paginator_defaults().with_overrides(&config.templates);
        Self {
            paging,
            config,
            templater,
            url_builder,
        }
    }

    /// Replace the configuration, re-layering template overrides.
    pub fn set_options(&mut self, config: PaginatorConfig) {
        self.templater = StringTemplate::paginator_defaults().with_overrides(&config.templates);
        self.config = config;
    }

    pub fn config(&self) -> &PaginatorConfig {
        &self.config
    }

    pub fn templater(&self) -> &StringTemplate {
        &self.templater
    }

    /// Configured default model, else the first model with paging data.
    pub fn default_model(&self) -> Option<&str> {
        self.config
            .default_model
            .as_deref()
            .or_else(|| self.paging.first_model())
    }

    fn resolve_model<'a>(&'a self, model: Option<&'a str>) -> Option<&'a str> {
        model.or_else(|| self.default_model())
    }

    pub fn has_paging(&self, model: Option<&str>) -> bool {
        self.resolve_model(model)
            .and_then(|m| self.paging.get(m))
            .is_some()
    }

    /// Paging params for `model`, or defaults when none were supplied.
    pub fn params(&self, model: Option<&str>) -> PagingParams {
        match self.resolve_model(model).and_then(|m| self.paging.get(m)) {
            Some(params) => params.clone(),
            None => {
                tracing::debug!(model = ?model, "No paging data, using defaults");
                PagingParams::default()
            }
        }
    }

    /// Single paging value by its camelCase key (`pageCount`, `sortDefault`, ...).
    pub fn param(&self, key: &str, model: Option<&str>) -> Option<Value> {
        if !self.has_paging(model) {
            return None;
        }
        match serde_json::to_value(self.params(model)) {
            Ok(Value::Object(map)) => map.get(key).filter(|v| !v.is_null()).cloned(),
            _ => None,
        }
    }

    pub fn current(&self, model: Option<&str>) -> i64 {
        self.params(model).page
    }

    /// Number of pages, zero without paging data.
    pub fn total(&self, model: Option<&str>) -> i64 {
        self.params(model).page_count
    }

    pub fn has_prev(&self, model: Option<&str>) -> bool {
        self.params(model).prev_page
    }

    pub fn has_next(&self, model: Option<&str>) -> bool {
        self.params(model).next_page
    }

    pub fn has_page(&self, page: i64, model: Option<&str>) -> bool {
        self.has_paging(model) && page >= 1 && page <= self.params(model).page_count
    }

    /// Active sort field; a non-empty `sort` in `options` takes precedence.
    pub fn sort_key(&self, model: Option<&str>, options: Option<&UrlOptions>) -> Option<String> {
        let requested = options
            .and_then(|o| o.get("sort"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());
        match requested {
            Some(sort) => Some(sort.to_string()),
            None => self.params(model).sort.filter(|s| !s.is_empty()),
        }
    }

    /// Active direction, `options["direction"]` first; anything but `desc` is asc.
    pub fn sort_dir(&self, model: Option<&str>, options: Option<&UrlOptions>) -> Direction {
        let requested = options
            .and_then(|o| o.get("direction"))
            .and_then(Value::as_str)
            .map(str::to_string);
        requested
            .or_else(|| self.params(model).direction)
            .as_deref()
            .map(Direction::normalize)
            .unwrap_or_default()
    }

    /// Strip `Model.` from `field` when the alias is the current model.
    pub fn remove_alias(&self, field: &str, model: Option<&str>) -> String {
        let current = self.resolve_model(model);
        match field.split_once('.') {
            Some((alias, column)) if Some(alias) == current => column.to_string(),
            _ => field.to_string(),
        }
    }

    /// Merge paging state, caller options and the base URL into canonical URL parameters.
    pub fn generate_url_params(
        &self,
        options: &UrlOptions,
        model: Option<&str>,
        url: &UrlSpec,
    ) -> UrlSpec {
        let paging = self.params(model);

        let unqualified_sort = options
            .get("sort")
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty() && !s.contains('.'));

        let mut sort = paging.sort.clone().filter(|s| !s.is_empty());
        let mut sort_default = paging.sort_default.clone().filter(|s| !s.is_empty());
        if unqualified_sort {
            sort = sort.map(|s| self.remove_alias(&s, model));
            sort_default = sort_default.map(|s| self.remove_alias(&s, model));
        }

        let mut defaults = Map::new();
        defaults.insert("page".into(), Value::from(paging.page));
        defaults.insert("sort".into(), sort.map_or(Value::Null, Value::from));
        defaults.insert(
            "direction".into(),
            paging.direction.clone().map_or(Value::Null, Value::from),
        );
        defaults.insert("limit".into(), paging.limit.map_or(Value::Null, Value::from));

        let mut options = options.clone();
        add_missing(&mut options, &defaults);
        let mut cleared: Vec<&str> = Vec::new();

        if options.get("page").is_some_and(is_first_page) {
            options.insert("page".into(), Value::Null);
            cleared.push("page");
        }

        if let (Some(sort_default), Some(direction_default)) =
            (&sort_default, &paging.direction_default)
        {
            let sort = options.get("sort").and_then(Value::as_str);
            let direction = options.get("direction").and_then(Value::as_str);
            if let (Some(sort), Some(direction)) = (sort, direction) {
                if sort == sort_default && direction.eq_ignore_ascii_case(direction_default) {
                    options.insert("sort".into(), Value::Null);
                    options.insert("direction".into(), Value::Null);
                    cleared.extend(["sort", "direction"]);
                }
            }
        }

        let mut base = self.config.url.clone();
        if let Some(scope) = paging.scope.as_deref().filter(|s| !s.is_empty()) {
            if let Some(Value::Object(scoped)) = base.query.get(scope) {
                // a cleared page or default sort stays cleared
                for (key, value) in scoped {
                    if cleared.contains(&key.as_str()) {
                        continue;
                    }
                    if options.get(key).map_or(true, Value::is_null) {
                        options.insert(key.clone(), value.clone());
                    }
                }
                base.query.shift_remove(scope);
            }
            let mut nested = Map::new();
            nested.insert(scope.to_string(), Value::Object(options));
            options = nested;
        }

        let mut url = base.merged(url);
        for (key, value) in options {
            if self.config.route_placeholders.contains(&key) {
                url.params.insert(key, value);
            } else {
                url.query.insert(key, value);
            }
        }
        url.params = filter(&url.params);
        url.query = filter(&url.query);
        url
    }

    /// Rendered URL for the given paging options.
    pub fn generate_url(
        &self,
        options: &UrlOptions,
        model: Option<&str>,
        url: &UrlSpec,
        full_base: bool,
    ) -> String {
        let spec = self.generate_url_params(options, model, url);
        self.url_builder.build(
            &spec,
            BuildOptions {
                escape: self.config.escape_urls,
                full_base,
            },
        )
    }

    fn page_url(&self, page: i64, model: Option<&str>, url: &UrlSpec, full_base: bool) -> String {
        let mut options = Map::new();
        options.insert("page".into(), Value::from(page));
        self.generate_url(&options, model, url, full_base)
    }

    fn templater_for(&self, overrides: &HashMap<String, String>) -> Cow<'_, StringTemplate> {
        if overrides.is_empty() {
            Cow::Borrowed(&self.templater)
        } else {
            Cow::Owned(self.templater.with_overrides(overrides))
        }
    }

    pub fn prev(&self, title: Option<&str>, options: &LinkOptions) -> Result<String, AppError> {
        let title = title.unwrap_or(DEFAULT_PREV_TITLE);
        let enabled = self.has_prev(options.model.as_deref());
        self.toggled_link(title, enabled, options, -1, ("prevActive", "prevDisabled"))
    }

    pub fn next(&self, title: Option<&str>, options: &LinkOptions) -> Result<String, AppError> {
        let title = title.unwrap_or(DEFAULT_NEXT_TITLE);
        let enabled = self.has_next(options.model.as_deref());
        self.toggled_link(title, enabled, options, 1, ("nextActive", "nextDisabled"))
    }

    fn toggled_link(
        &self,
        title: &str,
        enabled: bool,
        options: &LinkOptions,
        step: i64,
        (active, disabled): (&str, &str),
    ) -> Result<String, AppError> {
        let text = if enabled {
            title
        } else {
            match &options.disabled_title {
                DisabledTitle::SameAsTitle => title,
                DisabledTitle::Text(text) => text.as_str(),
                DisabledTitle::Hidden => return Ok(String::new()),
            }
        };
        let text = if options.escape {
            escape(text)
        } else {
            text.to_string()
        };

        let templater = self.templater_for(&options.templates);
        if !enabled {
            return templater.format(disabled, &[("text", text.as_str())]);
        }

        let model = options.model.as_deref();
        let target = self.params(model).page.saturating_add(step);
        let url = self.page_url(target, model, &options.url, false);
        templater.format(active, &[("url", url.as_str()), ("text", text.as_str())])
    }

    /// Sort link for `key`, toggling direction when `key` is the active sort.
    pub fn sort(
        &self,
        key: &str,
        title: Option<SortTitle>,
        options: &SortOptions,
    ) -> Result<String, AppError> {
        let model_opt = options.model.as_deref();
        let title = title.unwrap_or_else(|| SortTitle::Text(inflector::sort_title(key)));
        let default_dir = options.direction.unwrap_or_default();

        let sort_key = self.sort_key(model_opt, None).unwrap_or_default();
        let model = self.resolve_model(model_opt).unwrap_or_default();
        let (table, field) = key.split_once('.').unwrap_or((model, key));

        let qualified = format!("{table}.{field}");
        let is_sorted = !sort_key.is_empty()
            && (sort_key == qualified
                || sort_key == format!("{model}.{key}")
                || qualified == format!("{model}.{sort_key}"));

        let mut template = "sort";
        let mut dir = default_dir;
        if is_sorted {
            if options.lock {
                template = match dir {
                    Direction::Asc => "sortAscLocked",
                    Direction::Desc => "sortDescLocked",
                };
            } else {
                dir = self.sort_dir(model_opt, None).opposite();
                // class reflects the current order, the link targets the opposite
                template = match dir {
                    Direction::Asc => "sortDesc",
                    Direction::Desc => "sortAsc",
                };
            }
        }

        let text = title.for_direction(dir);
        let text = if options.escape {
            escape(text)
        } else {
            text.to_string()
        };

        let mut url_options = Map::new();
        url_options.insert("sort".into(), Value::from(key));
        url_options.insert("direction".into(), Value::from(dir.as_str()));
        let url = self.generate_url(&url_options, model_opt, &options.url, false);

        self.templater
            .format(template, &[("text", text.as_str()), ("url", url.as_str())])
    }

    /// Numbered page links, windowed around the current page when `modulus` applies.
    pub fn numbers(&self, options: &NumbersOptions) -> Result<String, AppError> {
        let params = self.params(options.model.as_deref());
        if params.page_count <= 1 {
            return Ok(String::new());
        }

        let templater = self.templater_for(&options.templates);
        match options.modulus {
            Some(modulus) if params.page_count > modulus => {
                self.modulus_numbers(&templater, &params, options, modulus)
            }
            _ => self.all_numbers(&templater, &params, options),
        }
    }

    fn numbers_window(&self, params: &PagingParams, options: &NumbersOptions, modulus: i64) -> (i64, i64) {
        let half = modulus / 2;
        let mut end = modulus.saturating_add(1).max(params.page.saturating_add(half));
        let mut start = params
            .page_count
            .saturating_sub(modulus)
            .min(params.page.saturating_sub(half).saturating_sub(modulus % 2));

        if let Some(first) = Boundary::present(options.first.as_ref()) {
            let first = match first {
                Boundary::Count(n) => n + 1,
                Boundary::Text(_) => 1,
            };
            if start <= first + 2 {
                start = 1;
            }
        }
        if let Some(last) = Boundary::present(options.last.as_ref()) {
            let last = match last {
                Boundary::Count(n) => *n,
                Boundary::Text(_) => 1,
            };
            if end >= params.page_count - last - 1 {
                end = params.page_count;
            }
        }

        (start.max(1), end.min(params.page_count))
    }

    fn number_link(
        &self,
        templater: &StringTemplate,
        page: i64,
        model: Option<&str>,
        url: &UrlSpec,
    ) -> Result<String, AppError> {
        let href = self.page_url(page, model, url, false);
        let text = page.to_string();
        templater.format("number", &[("text", text.as_str()), ("url", href.as_str())])
    }

    fn current_link(
        &self,
        templater: &StringTemplate,
        page: i64,
        model: Option<&str>,
        url: &UrlSpec,
    ) -> Result<String, AppError> {
        let href = self.page_url(page, model, url, false);
        let text = page.to_string();
        templater.format("current", &[("text", text.as_str()), ("url", href.as_str())])
    }

    fn modulus_numbers(
        &self,
        templater: &StringTemplate,
        params: &PagingParams,
        options: &NumbersOptions,
        modulus: i64,
    ) -> Result<String, AppError> {
        let model = options.model.as_deref();
        let ellipsis = templater.format("ellipsis", &[])?;
        let (start, end) = self.numbers_window(params, options, modulus);

        let mut out = self.first_number(templater, &ellipsis, params, start, options)?;
        out.push_str(options.before.as_deref().unwrap_or_default());

        for page in start..params.page {
            out.push_str(&self.number_link(templater, page, model, &options.url)?);
        }
        out.push_str(&self.current_link(templater, params.page, model, &options.url)?);
        for page in params.page.saturating_add(1)..end {
            out.push_str(&self.number_link(templater, page, model, &options.url)?);
        }
        if end != params.page {
            out.push_str(&self.number_link(templater, end, model, &options.url)?);
        }

        out.push_str(options.after.as_deref().unwrap_or_default());
        out.push_str(&self.last_number(templater, &ellipsis, params, end, options)?);
        Ok(out)
    }

    fn all_numbers(
        &self,
        templater: &StringTemplate,
        params: &PagingParams,
        options: &NumbersOptions,
    ) -> Result<String, AppError> {
        let model = options.model.as_deref();
        let mut out = options.before.clone().unwrap_or_default();
        for page in 1..=params.page_count {
            let link = if page == params.page {
                self.current_link(templater, page, model, &options.url)?
            } else {
                self.number_link(templater, page, model, &options.url)?
            };
            out.push_str(&link);
        }
        out.push_str(options.after.as_deref().unwrap_or_default());
        Ok(out)
    }

    fn first_number(
        &self,
        templater: &StringTemplate,
        ellipsis: &str,
        params: &PagingParams,
        start: i64,
        options: &NumbersOptions,
    ) -> Result<String, AppError> {
        let mut out = String::new();
        let Some(first) = Boundary::present(options.first.as_ref()) else {
            return Ok(out);
        };
        if start > 1 {
            let count = first.count();
            let offset = if start <= count {
                Boundary::Count(start - 1)
            } else {
                first.clone()
            };
            let boundary = BoundaryOptions {
                model: options.model.clone(),
                url: options.url.clone(),
                escape: true,
            };
            out.push_str(&self.render_first(templater, &offset, &boundary)?);
            if count < start - 1 {
                out.push_str(ellipsis);
            }
        }
        Ok(out)
    }

    fn last_number(
        &self,
        templater: &StringTemplate,
        ellipsis: &str,
        params: &PagingParams,
        end: i64,
        options: &NumbersOptions,
    ) -> Result<String, AppError> {
        let mut out = String::new();
        let Some(last) = Boundary::present(options.last.as_ref()) else {
            return Ok(out);
        };
        if end < params.page_count {
            let count = last.count();
            let offset = if params.page_count < end + count {
                Boundary::Count(params.page_count - end)
            } else {
                last.clone()
            };
            if params.page_count - end > count {
                out.push_str(ellipsis);
            }
            let boundary = BoundaryOptions {
                model: options.model.clone(),
                url: options.url.clone(),
                escape: true,
            };
            out.push_str(&self.render_last(templater, &offset, &boundary)?);
        }
        Ok(out)
    }

    /// Link to the first page, or the first `n` numbered pages.
    pub fn first(&self, label: Option<Boundary>, options: &BoundaryOptions) -> Result<String, AppError> {
        let label = label.unwrap_or_else(|| Boundary::Text("<< first".to_string()));
        self.render_first(&self.templater, &label, options)
    }

    /// Link to the last page, or the last `n` numbered pages.
    pub fn last(&self, label: Option<Boundary>, options: &BoundaryOptions) -> Result<String, AppError> {
        let label = label.unwrap_or_else(|| Boundary::Text("last >>".to_string()));
        self.render_last(&self.templater, &label, options)
    }

    fn render_first(
        &self,
        templater: &StringTemplate,
        label: &Boundary,
        options: &BoundaryOptions,
    ) -> Result<String, AppError> {
        let model = options.model.as_deref();
        let params = self.params(model);
        if params.page_count <= 1 {
            return Ok(String::new());
        }

        match label {
            Boundary::Count(n) if params.page >= *n => {
                let mut out = String::new();
                for page in 1..=*n {
                    out.push_str(&self.number_link(templater, page, model, &options.url)?);
                }
                Ok(out)
            }
            Boundary::Text(_) if params.page > 1 => {
                let url = self.page_url(1, model, &options.url, false);
                let text = self.boundary_text(label, options.escape);
                templater.format("first", &[("url", url.as_str()), ("text", text.as_str())])
            }
            _ => Ok(String::new()),
        }
    }

    fn render_last(
        &self,
        templater: &StringTemplate,
        label: &Boundary,
        options: &BoundaryOptions,
    ) -> Result<String, AppError> {
        let model = options.model.as_deref();
        let params = self.params(model);
        if params.page_count <= 1 {
            return Ok(String::new());
        }

        let lower = params.page_count - label.count() + 1;
        match label {
            Boundary::Count(_) if params.page <= lower => {
                let mut out = String::new();
                for page in lower..=params.page_count {
                    out.push_str(&self.number_link(templater, page, model, &options.url)?);
                }
                Ok(out)
            }
            Boundary::Text(_) if params.page < params.page_count => {
                let url = self.page_url(params.page_count, model, &options.url, false);
                let text = self.boundary_text(label, options.escape);
                templater.format("last", &[("url", url.as_str()), ("text", text.as_str())])
            }
            _ => Ok(String::new()),
        }
    }

    fn boundary_text(&self, label: &Boundary, escape_text: bool) -> String {
        let text = label.label();
        if escape_text {
            escape(&text)
        } else {
            text
        }
    }

    /// Page or record counter such as `3 of 10` or `21 - 30 of 95`.
    pub fn counter(&self, format: &CounterFormat, model: Option<&str>) -> Result<String, AppError> {
        let paging = self.params(model);
        let pages = paging.page_count.max(1);
        let start = if paging.count >= 1 {
            (paging.page.saturating_sub(1))
                .saturating_mul(paging.per_page)
                .saturating_add(1)
        } else {
            0
        };
        let end = start
            .saturating_add(paging.per_page)
            .saturating_sub(1)
            .min(paging.count);

        let model_label = self
            .resolve_model(model)
            .map(|m| inflector::underscore(m).replace('_', " "))
            .unwrap_or_default();

        let vars = [
            ("page", format_number(paging.page)),
            ("pages", format_number(pages)),
            ("current", format_number(paging.current)),
            ("count", format_number(paging.count)),
            ("start", format_number(start)),
            ("end", format_number(end)),
            ("model", model_label),
        ];
        let vars: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (*k, v.as_str())).collect();

        match format {
            CounterFormat::Pages => self.templater.format("counterPages", &vars),
            CounterFormat::Range => self.templater.format("counterRange", &vars),
            CounterFormat::Custom(template) => {
                let mut templater = StringTemplate::new();
                templater.add([("counterCustom", template.as_str())]);
                templater.format("counterCustom", &vars)
            }
        }
    }

    /// `<link rel="prev|next|first|last">` tags with full-base URLs.
    pub fn meta(&self, options: &MetaOptions) -> Result<String, AppError> {
        let model = options.model.as_deref();
        let params = self.params(model);
        let base = UrlSpec::default();

        let mut targets = Vec::new();
        if options.prev && self.has_prev(model) {
            targets.push(("prev", params.page - 1));
        }
        if options.next && self.has_next(model) {
            targets.push(("next", params.page + 1));
        }
        if options.first {
            targets.push(("first", 1));
        }
        if options.last {
            targets.push(("last", params.page_count));
        }

        let mut out = String::new();
        for (rel, page) in targets {
            let url = self.page_url(page, model, &base, true);
            out.push_str(&self.templater.format("metaLink", &[("url", url.as_str()), ("rel", rel)])?);
        }
        Ok(out)
    }
}

fn is_first_page(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s == "1",
        _ => false,
    }
}

/// Integer with thousands separators: `1234567` → `1,234,567`.
fn format_number(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store(params: PagingParams) -> PagingStore {
        PagingStore::new().with("Articles", params)
    }

    fn paginator(params: PagingParams) -> Paginator {
        paginator_with(params, PaginatorConfig::default())
    }

    fn paginator_with(params: PagingParams, config: PaginatorConfig) -> Paginator {
        let config = PaginatorConfig {
            escape_urls: false,
            full_base_url: "https://example.com".into(),
            ..config
        };
        Paginator::new(
            store(params),
            config,
            RouteUrlBuilder::new("/articles", "https://example.com"),
        )
    }

    fn opts(value: Value) -> UrlOptions {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn number(page: i64) -> String {
        let url = if page == 1 {
            "/articles".to_string()
        } else {
            format!("/articles?page={page}")
        };
        format!(r#"<li><a href="{url}">{page}</a></li>"#)
    }

    fn current(page: i64) -> String {
        format!(r#"<li class="active"><a href="">{page}</a></li>"#)
    }

    const ELLIPSIS: &str = r#"<li class="ellipsis">&hellip;</li>"#;

    #[test]
    fn missing_paging_degrades_to_defaults() {
        let p = Paginator::new(
            PagingStore::new(),
            PaginatorConfig::default(),
            RouteUrlBuilder::new("/", ""),
        );
        assert_eq!(p.params(Some("Tags")), PagingParams::default());
        assert_eq!(p.current(Some("Tags")), 1);
        assert_eq!(p.total(None), 0);
        assert!(!p.has_page(1, None));
        assert_eq!(p.param("pageCount", None), None);
        assert_eq!(p.numbers(&NumbersOptions::default()).unwrap(), "");
    }

    #[test]
    fn param_reads_camel_case_keys() {
        let p = paginator(PagingParams::new(2, 7));
        assert_eq!(p.param("pageCount", None), Some(json!(7)));
        assert_eq!(p.param("sort", None), None);
    }

    #[test]
    fn has_prev_next_and_page() {
        let p = paginator(PagingParams::new(3, 5));
        assert!(p.has_prev(None));
        assert!(p.has_next(None));
        assert!(p.has_page(5, None));
        assert!(!p.has_page(6, None));

        assert!(!paginator(PagingParams::new(1, 5)).has_prev(None));
        assert!(!paginator(PagingParams::new(5, 5)).has_next(None));
    }

    #[test]
    fn sort_dir_defaults_to_asc() {
        let mut params = PagingParams::new(1, 2);
        params.direction = Some("DESC".into());
        assert_eq!(paginator(params).sort_dir(None, None), Direction::Desc);

        let mut params = PagingParams::new(1, 2);
        params.direction = Some("random".into());
        assert_eq!(paginator(params).sort_dir(None, None), Direction::Asc);
        assert_eq!(paginator(PagingParams::new(1, 2)).sort_key(None, None), None);
    }

    #[test]
    fn sort_options_override_paging_state() {
        let p = paginator(PagingParams::new(1, 2).with_sort("title", Direction::Asc));
        let overrides = opts(json!({"sort": "created", "direction": "DESC"}));
        assert_eq!(p.sort_key(None, Some(&overrides)).as_deref(), Some("created"));
        assert_eq!(p.sort_dir(None, Some(&overrides)), Direction::Desc);

        let empty = opts(json!({"sort": ""}));
        assert_eq!(p.sort_key(None, Some(&empty)).as_deref(), Some("title"));
        assert_eq!(p.sort_dir(None, Some(&empty)), Direction::Asc);
    }

    #[test]
    fn first_page_is_omitted() {
        let p = paginator(PagingParams::new(2, 5));
        let url = p.generate_url_params(&opts(json!({"page": 1})), None, &UrlSpec::default());
        assert!(!url.query.contains_key("page"));
        assert_eq!(p.generate_url(&opts(json!({"page": 1})), None, &UrlSpec::default(), false), "/articles");
    }

    #[test]
    fn current_page_carries_over_when_not_overridden() {
        let p = paginator(PagingParams::new(4, 5));
        let url = p.generate_url_params(&opts(json!({"sort": "title"})), None, &UrlSpec::default());
        assert_eq!(Value::Object(url.query), json!({"sort": "title", "page": 4}));
    }

    #[test]
    fn default_sort_is_cleared() {
        let params = PagingParams::new(1, 3).with_default_sort("Articles.title", Direction::Asc);
        let p = paginator(params);
        let url = p.generate_url_params(
            &opts(json!({"sort": "title", "direction": "ASC"})),
            None,
            &UrlSpec::default(),
        );
        assert!(url.query.is_empty());

        let url = p.generate_url_params(
            &opts(json!({"sort": "title", "direction": "desc"})),
            None,
            &UrlSpec::default(),
        );
        assert_eq!(Value::Object(url.query), json!({"sort": "title", "direction": "desc"}));
    }

    #[test]
    fn alias_kept_for_other_models() {
        let params = PagingParams::new(1, 3).with_sort("Authors.name", Direction::Asc);
        let p = paginator(params);
        assert_eq!(p.remove_alias("Authors.name", None), "Authors.name");
        assert_eq!(p.remove_alias("Articles.name", None), "name");
        assert_eq!(p.remove_alias("name", None), "name");
    }

    #[test]
    fn scope_nests_options_and_absorbs_base_values() {
        let config = PaginatorConfig {
            url: UrlSpec::default()
                .with_query("posts", json!({"limit": 5}))
                .with_query("q", "cake"),
            ..PaginatorConfig::default()
        };
        let p = paginator_with(PagingParams::new(1, 3).with_scope("posts"), config);
        let url = p.generate_url_params(&opts(json!({"page": 2})), None, &UrlSpec::default());
        assert_eq!(
            Value::Object(url.query),
            json!({"q": "cake", "posts": {"page": 2, "limit": 5}})
        );
    }

    #[test]
    fn scoped_base_values_do_not_restore_cleared_keys() {
        let config = PaginatorConfig {
            url: UrlSpec::default().with_query(
                "posts",
                json!({"page": 3, "sort": "title", "direction": "asc", "limit": 5}),
            ),
            ..PaginatorConfig::default()
        };
        let params = PagingParams::new(3, 5)
            .with_scope("posts")
            .with_sort("title", Direction::Asc)
            .with_default_sort("title", Direction::Asc);
        let p = paginator_with(params, config);

        let url = p.generate_url_params(&opts(json!({"page": 1})), None, &UrlSpec::default());
        assert_eq!(Value::Object(url.query), json!({"posts": {"limit": 5}}));
        assert_eq!(
            p.first(None, &BoundaryOptions::default()).unwrap(),
            r#"<li class="first"><a href="/articles?posts%5Blimit%5D=5">&lt;&lt; first</a></li>"#
        );
    }

    #[test]
    fn route_placeholders_go_to_path() {
        let config = PaginatorConfig {
            route_placeholders: vec!["page".into()],
            url: UrlSpec::new("/articles/{page}"),
            ..PaginatorConfig::default()
        };
        let p = paginator_with(PagingParams::new(2, 5), config);
        let url = p.generate_url(&opts(json!({"page": 3, "sort": "title"})), None, &UrlSpec::default(), false);
        assert_eq!(url, "/articles/3?sort=title");
    }

    #[test]
    fn override_url_wins_over_base() {
        let config = PaginatorConfig {
            url: UrlSpec::new("/articles").with_query("q", "old"),
            ..PaginatorConfig::default()
        };
        let p = paginator_with(PagingParams::new(1, 5), config);
        let url = p.generate_url(
            &opts(json!({"page": 2})),
            None,
            &UrlSpec::new("/posts").with_query("q", "new"),
            false,
        );
        assert_eq!(url, "/posts?q=new&page=2");
    }

    #[test]
    fn sort_toggles_active_field() {
        let params = PagingParams::new(1, 3).with_sort("Articles.title", Direction::Asc);
        let p = paginator(params);
        let link = p.sort("title", None, &SortOptions::default()).unwrap();
        assert_eq!(
            link,
            r#"<a class="asc" href="/articles?sort=title&direction=desc">Title</a>"#
        );
    }

    #[test]
    fn sort_inactive_field_uses_default_direction() {
        let params = PagingParams::new(1, 3).with_sort("Articles.title", Direction::Desc);
        let p = paginator(params);
        let link = p
            .sort(
                "author_id",
                None,
                &SortOptions {
                    direction: Some(Direction::Desc),
                    ..SortOptions::default()
                },
            )
            .unwrap();
        assert_eq!(
            link,
            r#"<a href="/articles?sort=author_id&direction=desc">Author</a>"#
        );
    }

    #[test]
    fn sort_locked_keeps_direction() {
        let params = PagingParams::new(1, 3).with_sort("Articles.title", Direction::Desc);
        let p = paginator(params);
        let link = p
            .sort(
                "title",
                Some("Title".into()),
                &SortOptions {
                    lock: true,
                    ..SortOptions::default()
                },
            )
            .unwrap();
        assert_eq!(
            link,
            r#"<a class="asc locked" href="/articles?sort=title&direction=asc">Title</a>"#
        );
    }

    #[test]
    fn sort_title_per_direction() {
        let params = PagingParams::new(1, 3).with_sort("Articles.title", Direction::Desc);
        let p = paginator(params);
        let title = SortTitle::ByDirection {
            asc: "A-Z".into(),
            desc: "Z-A".into(),
        };
        let link = p.sort("title", Some(title), &SortOptions::default()).unwrap();
        assert_eq!(
            link,
            r#"<a class="desc" href="/articles?sort=title&direction=asc">A-Z</a>"#
        );
    }

    #[test]
    fn prev_and_next_links() {
        let p = paginator(PagingParams::new(2, 5));
        assert_eq!(
            p.prev(None, &LinkOptions::default()).unwrap(),
            r#"<li class="prev"><a rel="prev" href="/articles">&lt;&lt; Previous</a></li>"#
        );
        assert_eq!(
            p.next(Some("More"), &LinkOptions::default()).unwrap(),
            r#"<li class="next"><a rel="next" href="/articles?page=3">More</a></li>"#
        );
    }

    #[test]
    fn disabled_prev_renders_disabled_template_or_nothing() {
        let p = paginator(PagingParams::new(1, 5));
        assert_eq!(
            p.prev(Some("Back"), &LinkOptions::default()).unwrap(),
            r#"<li class="prev disabled"><a href="" onclick="return false;">Back</a></li>"#
        );

        let custom = LinkOptions {
            disabled_title: DisabledTitle::Text("<none>".into()),
            ..LinkOptions::default()
        };
        assert!(p.prev(None, &custom).unwrap().contains("&lt;none&gt;"));

        let hidden = LinkOptions {
            disabled_title: DisabledTitle::Hidden,
            ..LinkOptions::default()
        };
        assert_eq!(p.prev(None, &hidden).unwrap(), "");
    }

    #[test]
    fn per_call_templates_override_defaults() {
        let p = paginator(PagingParams::new(2, 5));
        let options = LinkOptions {
            templates: HashMap::from([("nextActive".to_string(), "<{{url}}|{{text}}>".to_string())]),
            ..LinkOptions::default()
        };
        assert_eq!(p.next(Some("n"), &options).unwrap(), "</articles?page=3|n>");
        assert!(p.next(None, &LinkOptions::default()).unwrap().starts_with("<li"));
    }

    #[test]
    fn numbers_without_window() {
        let p = paginator(PagingParams::new(1, 3));
        let out = p.numbers(&NumbersOptions::default()).unwrap();
        assert_eq!(out, format!("{}{}{}", current(1), number(2), number(3)));
    }

    #[test]
    fn numbers_single_page_is_empty() {
        let p = paginator(PagingParams::new(1, 1));
        assert_eq!(p.numbers(&NumbersOptions::default()).unwrap(), "");
    }

    #[test]
    fn numbers_with_window_and_boundaries() {
        let p = paginator(PagingParams::new(10, 20));
        let out = p
            .numbers(&NumbersOptions {
                modulus: Some(4),
                first: Some(Boundary::Count(2)),
                last: Some(Boundary::Count(2)),
                ..NumbersOptions::default()
            })
            .unwrap();

        let expected = [
            number(1),
            number(2),
            ELLIPSIS.to_string(),
            number(8),
            number(9),
            current(10),
            number(11),
            number(12),
            ELLIPSIS.to_string(),
            number(19),
            number(20),
        ]
        .concat();
        assert_eq!(out, expected);
    }

    #[test]
    fn numbers_window_at_start() {
        let p = paginator(PagingParams::new(1, 20));
        let out = p
            .numbers(&NumbersOptions {
                modulus: Some(4),
                before: Some("<ul>".into()),
                after: Some("</ul>".into()),
                ..NumbersOptions::default()
            })
            .unwrap();
        let expected = format!(
            "<ul>{}{}{}{}{}</ul>",
            current(1),
            number(2),
            number(3),
            number(4),
            number(5)
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn first_and_last_links() {
        let p = paginator(PagingParams::new(3, 5));
        assert_eq!(
            p.first(None, &BoundaryOptions::default()).unwrap(),
            r#"<li class="first"><a href="/articles">&lt;&lt; first</a></li>"#
        );
        assert_eq!(
            p.last(None, &BoundaryOptions::default()).unwrap(),
            r#"<li class="last"><a href="/articles?page=5">last &gt;&gt;</a></li>"#
        );
        assert_eq!(
            p.first(Some(Boundary::Count(2)), &BoundaryOptions::default()).unwrap(),
            format!("{}{}", number(1), number(2))
        );
        assert_eq!(
            p.last(Some(Boundary::Count(2)), &BoundaryOptions::default()).unwrap(),
            format!("{}{}", number(4), number(5))
        );
    }

    #[test]
    fn first_is_empty_on_first_page() {
        let p = paginator(PagingParams::new(1, 5));
        assert_eq!(p.first(None, &BoundaryOptions::default()).unwrap(), "");
        let p = paginator(PagingParams::new(5, 5));
        assert_eq!(p.last(None, &BoundaryOptions::default()).unwrap(), "");
    }

    #[test]
    fn boundary_count_out_of_reach_renders_nothing() {
        let p = paginator(PagingParams::new(2, 5));
        assert_eq!(p.first(Some(Boundary::Count(3)), &BoundaryOptions::default()).unwrap(), "");
        let p = paginator(PagingParams::new(4, 5));
        assert_eq!(p.last(Some(Boundary::Count(3)), &BoundaryOptions::default()).unwrap(), "");
    }

    #[test]
    fn zero_count_boundaries_are_ignored() {
        let p = paginator(PagingParams::new(10, 20));
        let out = p
            .numbers(&NumbersOptions {
                modulus: Some(4),
                first: Some(Boundary::Count(0)),
                last: Some(Boundary::Count(0)),
                ..NumbersOptions::default()
            })
            .unwrap();
        let expected = [number(8), number(9), current(10), number(11), number(12)].concat();
        assert_eq!(out, expected);
    }

    #[test]
    fn inconsistent_paging_data_does_not_overflow() {
        let mut params = PagingParams::new(i64::MAX, i64::MAX).with_counts(i64::MAX, i64::MAX, i64::MAX);
        params.next_page = true;
        let p = paginator(params);
        assert!(p.next(None, &LinkOptions::default()).unwrap().contains("next"));
        assert!(p.counter(&CounterFormat::Range, None).is_ok());
        assert!(p.numbers(&NumbersOptions::default()).is_ok());
    }

    #[test]
    fn counter_formats() {
        let p = paginator(PagingParams::new(3, 10).with_counts(95, 10, 10));
        assert_eq!(p.counter(&CounterFormat::Pages, None).unwrap(), "3 of 10");
        assert_eq!(p.counter(&CounterFormat::Range, None).unwrap(), "21 - 30 of 95");
        assert_eq!(
            p.counter(
                &CounterFormat::Custom("{{current}} {{model}} out of {{count}}".into()),
                None
            )
            .unwrap(),
            "10 articles out of 95"
        );
    }

    #[test]
    fn counter_uses_thousands_separator() {
        let p = paginator(PagingParams::new(2, 124).with_counts(1234, 10, 10));
        assert_eq!(p.counter(&CounterFormat::Range, None).unwrap(), "11 - 20 of 1,234");
        assert_eq!(format_number(-1_234_567), "-1,234,567");
    }

    #[test]
    fn meta_links_use_full_base() {
        let p = paginator(PagingParams::new(2, 3));
        let out = p
            .meta(&MetaOptions {
                last: true,
                ..MetaOptions::default()
            })
            .unwrap();
        assert_eq!(
            out,
            concat!(
                r#"<link href="https://example.com/articles" rel="prev"/>"#,
                r#"<link href="https://example.com/articles?page=3" rel="next"/>"#,
                r#"<link href="https://example.com/articles?page=3" rel="last"/>"#,
            )
        );
    }

    #[test]
    fn escaped_urls_by_default() {
        let params = PagingParams::new(2, 5);
        let p = Paginator::new(
            store(params),
            PaginatorConfig::default(),
            RouteUrlBuilder::new("/articles", ""),
        );
        let link = p.sort("title", None, &SortOptions::default()).unwrap();
        assert!(link.contains("sort=title&amp;direction=asc&amp;page=2"));
    }
}
