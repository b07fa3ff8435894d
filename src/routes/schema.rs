//! Schema reflection routes: table listing with pagination controls, table
//! description, and `CREATE TABLE` rendering per dialect.

use axum::{
    extract::{OriginalUri, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::PgSchemaConnection;
use crate::errors::{ApiResponse, AppError};
use crate::models::pagination::{PagedResult, Pagination};
use crate::models::paging::{Direction, PagingParams, PagingStore};
use crate::models::schema::TableSchema;
use crate::services::paginator::{
    BoundaryOptions, CounterFormat, LinkOptions, MetaOptions, NumbersOptions, Paginator,
    SortOptions,
};
use crate::services::schema::{Collection, Driver};
use crate::services::url_builder::RouteUrlBuilder;
use crate::AppState;

/// Paging model name used for the table listing.
pub const TABLES_MODEL: &str = "Tables";

const SORTABLE: &[&str] = &["name"];

#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub name: String,
}

/// Rendered pagination markup for a listing page.
#[derive(Debug, Clone, Serialize)]
pub struct PaginationControls {
    pub prev: String,
    pub next: String,
    pub first: String,
    pub last: String,
    pub numbers: String,
    pub counter: String,
    pub sort: String,
    pub meta: String,
}

impl PaginationControls {
    pub fn render(paginator: &Paginator, modulus: u32) -> Result<Self, AppError> {
        let numbers = NumbersOptions {
            modulus: Some(i64::from(modulus)),
            ..NumbersOptions::default()
        };
        Ok(Self {
            prev: paginator.prev(None, &LinkOptions::default())?,
            next: paginator.next(None, &LinkOptions::default())?,
            first: paginator.first(None, &BoundaryOptions::default())?,
            last: paginator.last(None, &BoundaryOptions::default())?,
            numbers: paginator.numbers(&numbers)?,
            counter: paginator.counter(&CounterFormat::Range, None)?,
            sort: paginator.sort("name", None, &SortOptions::default())?,
            meta: paginator.meta(&MetaOptions::default())?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct TableListing {
    #[serde(flatten)]
    pub page: PagedResult<TableSummary>,
    pub paging: PagingParams,
    pub controls: PaginationControls,
}

#[derive(Debug, Deserialize)]
pub struct SqlQuery {
    pub driver: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TableSql {
    pub table: String,
    pub driver: Driver,
    pub statements: Vec<String>,
}

fn collection(state: &AppState) -> Collection<PgSchemaConnection> {
    Collection::new(PgSchemaConnection::new(
        state.db.clone(),
        state.schema.clone(),
    ))
}

/// Slice one page out of the sorted table names and render its controls.
pub fn paginate_tables(
    mut names: Vec<String>,
    pagination: &Pagination,
    paginator_for: impl FnOnce(PagingStore) -> Paginator,
    modulus: u32,
) -> Result<TableListing, AppError> {
    if let Some(sort) = pagination.sort.as_deref() {
        if !SORTABLE.contains(&sort) {
            return Err(AppError::Validation(format!("Cannot sort tables by `{sort}`")));
        }
    }

    names.sort();
    if pagination.direction() == Direction::Desc {
        names.reverse();
    }

    let total = i64::try_from(names.len()).unwrap_or(i64::MAX);
    let paging = pagination.paging_params(total, Some("name"));
    let skip = usize::try_from((paging.page - 1).saturating_mul(paging.per_page)).unwrap_or(0);
    let take = usize::try_from(paging.per_page).unwrap_or(0);
    let items = names
        .into_iter()
        .skip(skip)
        .take(take)
        .map(|name| TableSummary { name })
        .collect();

    let paginator = paginator_for(PagingStore::new().with(TABLES_MODEL, paging.clone()));
    let controls = PaginationControls::render(&paginator, modulus)?;

    let clamped = Pagination {
        page: Some(paging.page),
        ..pagination.clone()
    };
    Ok(TableListing {
        page: PagedResult::new(items, total, &clamped),
        paging,
        controls,
    })
}

/// GET /api/v1/schema/tables: paginated table names with rendered controls.
pub async fn list_tables(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(pagination): Query<Pagination>,
) -> Result<Json<ApiResponse<TableListing>>, AppError> {
    let names = collection(&state).list_tables().await?;
    tracing::debug!(tables = names.len(), schema = ?state.schema.schema, "Listed tables");

    let config = state.config.paginator.clone();
    let builder = RouteUrlBuilder::new(uri.path(), config.full_base_url.clone());
    let modulus = config.modulus;
    let listing = paginate_tables(
        names,
        &pagination,
        |store| Paginator::new(store, config, builder),
        modulus,
    )?;
    Ok(ApiResponse::success(listing))
}

/// GET /api/v1/schema/tables/:name: reflected table structure.
pub async fn describe_table(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<TableSchema>>, AppError> {
    let table = collection(&state).describe(&name).await?;
    Ok(ApiResponse::success(table))
}

/// GET /api/v1/schema/tables/:name/sql?driver=: `CREATE TABLE` for another engine.
pub async fn table_sql(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<SqlQuery>,
) -> Result<Json<ApiResponse<TableSql>>, AppError> {
    let driver = query
        .driver
        .as_deref()
        .unwrap_or(Driver::Postgres.as_str())
        .parse::<Driver>()?;
    let table = collection(&state).describe(&name).await?;
    let statements = driver.create_sql(&table)?;
    Ok(ApiResponse::success(TableSql {
        table: table.name().to_string(),
        driver,
        statements,
    }))
}
