//! Data model: paging state, URL specs, list pagination and table schemas.

pub mod pagination;
pub mod paging;
pub mod schema;
pub mod url;
