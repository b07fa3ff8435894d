//! Pagination rendering and schema reflection services.

pub mod inflector;
pub mod paginator;
pub mod schema;
pub mod template;
pub mod url_builder;
