use std::collections::HashMap;
use std::env;

use crate::models::url::UrlSpec;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_schema: String,
    pub host: String,
    pub port: u16,
    pub full_base_url: String,
    pub paginator: PaginatorConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        let full_base_url =
            env::var("FULL_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let paginator = PaginatorConfig {
            full_base_url: full_base_url.clone(),
            route_placeholders: env::var("PAGINATOR_ROUTE_PLACEHOLDERS")
                .map(|raw| parse_list(&raw))
                .unwrap_or_default(),
            modulus: env::var("PAGINATOR_MODULUS")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .unwrap_or(8),
            ..PaginatorConfig::default()
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            database_schema: env::var("DATABASE_SCHEMA").unwrap_or_else(|_| "public".to_string()),
            host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("BACKEND_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            full_base_url,
            paginator,
        })
    }
}

/// Paginator settings passed explicitly into `Paginator::new`.
#[derive(Debug, Clone)]
pub struct PaginatorConfig {
    /// Base URL merged into every generated link (pass-through route params, query values).
    pub url: UrlSpec,
    /// Option names embedded in the route path instead of the query string.
    pub route_placeholders: Vec<String>,
    /// Template overrides layered on top of the defaults.
    pub templates: HashMap<String, String>,
    /// Scheme and host used for full-base URLs (meta links).
    pub full_base_url: String,
    /// Overrides the first model found in the paging data.
    pub default_model: Option<String>,
    /// Default window size for `numbers`.
    pub modulus: u32,
    /// HTML-escape generated URLs.
    pub escape_urls: bool,
}

impl Default for PaginatorConfig {
    fn default() -> Self {
        Self {
            url: UrlSpec::default(),
            route_placeholders: Vec::new(),
            templates: HashMap::new(),
            full_base_url: String::new(),
            default_model: None,
            modulus: 8,
            escape_urls: true,
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
