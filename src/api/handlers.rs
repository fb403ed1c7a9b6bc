use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::{PricingError, ServiceError};
use crate::logic::{AllocatedCode, CatalogService, CodeAllocator, TaxTable};
use crate::model::{
    CatalogItem, CatalogItemUpdate, Group, Id, ItemFilter, NewCatalogItem, NewGroup, NewSubgroup,
    PriceResult, PricingRequest, Subgroup, TaxRate, UserContext,
};
use crate::store::traits::Store;

/// Shared state of every handler
pub struct AppState<S> {
    pub store: Arc<S>,
    pub tax_table: Arc<TaxTable>,
}

impl<S> AppState<S> {
    pub fn new(store: Arc<S>, tax_table: TaxTable) -> Self {
        Self {
            store,
            tax_table: Arc::new(tax_table),
        }
    }
}

// Manual impl: the store itself need not be Clone
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            tax_table: Arc::clone(&self.tax_table),
        }
    }
}

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> ListResponse<T> {
    fn new(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

#[derive(Debug, Serialize)]
pub struct NextCodeResponse {
    pub subgroup_id: Id,
    pub next_code: String,
}

// Malformed bodies are reported in the same JSON error shape as everything else
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ServiceError::InvalidInput(rejection.body_text()))
}

// Group handlers
pub async fn list_groups<S: Store>(
    State(state): State<AppState<S>>,
) -> Result<Json<ListResponse<Group>>, ServiceError> {
    let groups = CatalogService::list_groups(&*state.store).await?;
    Ok(Json(ListResponse::new(groups)))
}

pub async fn create_group<S: Store>(
    State(state): State<AppState<S>>,
    user: UserContext,
    payload: Result<Json<NewGroup>, JsonRejection>,
) -> Result<(StatusCode, Json<Group>), ServiceError> {
    let new_group = json_body(payload)?;
    let group = CatalogService::create_group(&*state.store, new_group, &user).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn get_group<S: Store>(
    State(state): State<AppState<S>>,
    Path(group_id): Path<Id>,
) -> Result<Json<Group>, ServiceError> {
    Ok(Json(CatalogService::get_group(&*state.store, &group_id).await?))
}

pub async fn delete_group<S: Store>(
    State(state): State<AppState<S>>,
    Path(group_id): Path<Id>,
) -> Result<StatusCode, ServiceError> {
    CatalogService::delete_group(&*state.store, &group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Subgroup handlers
pub async fn list_subgroups<S: Store>(
    State(state): State<AppState<S>>,
    Path(group_id): Path<Id>,
) -> Result<Json<ListResponse<Subgroup>>, ServiceError> {
    let subgroups = CatalogService::list_subgroups(&*state.store, &group_id).await?;
    Ok(Json(ListResponse::new(subgroups)))
}

pub async fn create_subgroup<S: Store>(
    State(state): State<AppState<S>>,
    Path(group_id): Path<Id>,
    user: UserContext,
    payload: Result<Json<NewSubgroup>, JsonRejection>,
) -> Result<(StatusCode, Json<Subgroup>), ServiceError> {
    let new_subgroup = json_body(payload)?;
    let subgroup =
        CatalogService::create_subgroup(&*state.store, &group_id, new_subgroup, &user).await?;
    Ok((StatusCode::CREATED, Json(subgroup)))
}

pub async fn get_subgroup<S: Store>(
    State(state): State<AppState<S>>,
    Path(subgroup_id): Path<Id>,
) -> Result<Json<Subgroup>, ServiceError> {
    Ok(Json(
        CatalogService::get_subgroup(&*state.store, &subgroup_id).await?,
    ))
}

// Code allocation handlers
pub async fn preview_next_code<S: Store>(
    State(state): State<AppState<S>>,
    Path(subgroup_id): Path<Id>,
) -> Result<Json<NextCodeResponse>, ServiceError> {
    let next_code = CodeAllocator::preview(&*state.store, &subgroup_id).await?;
    Ok(Json(NextCodeResponse {
        subgroup_id,
        next_code,
    }))
}

pub async fn allocate_code<S: Store>(
    State(state): State<AppState<S>>,
    Path(subgroup_id): Path<Id>,
) -> Result<(StatusCode, Json<AllocatedCode>), ServiceError> {
    let allocated = CodeAllocator::allocate(&*state.store, &subgroup_id).await?;
    Ok((StatusCode::CREATED, Json(allocated)))
}

// Catalog item handlers
pub async fn list_items<S: Store>(
    State(state): State<AppState<S>>,
    Query(filter): Query<ItemFilter>,
) -> Result<Json<ListResponse<CatalogItem>>, ServiceError> {
    let items = CatalogService::list_items(&*state.store, &filter).await?;
    Ok(Json(ListResponse::new(items)))
}

pub async fn create_item<S: Store>(
    State(state): State<AppState<S>>,
    user: UserContext,
    payload: Result<Json<NewCatalogItem>, JsonRejection>,
) -> Result<(StatusCode, Json<CatalogItem>), ServiceError> {
    let new_item = json_body(payload)?;
    let item = CatalogService::create_item(&*state.store, new_item, &user).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_item<S: Store>(
    State(state): State<AppState<S>>,
    Path(item_id): Path<Id>,
) -> Result<Json<CatalogItem>, ServiceError> {
    Ok(Json(CatalogService::get_item(&*state.store, &item_id).await?))
}

pub async fn update_item<S: Store>(
    State(state): State<AppState<S>>,
    Path(item_id): Path<Id>,
    user: UserContext,
    payload: Result<Json<CatalogItemUpdate>, JsonRejection>,
) -> Result<Json<CatalogItem>, ServiceError> {
    let update = json_body(payload)?;
    let item = CatalogService::update_item(&*state.store, &item_id, update, &user).await?;
    Ok(Json(item))
}

pub async fn delete_item<S: Store>(
    State(state): State<AppState<S>>,
    Path(item_id): Path<Id>,
) -> Result<StatusCode, ServiceError> {
    CatalogService::delete_item(&*state.store, &item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Pricing handlers
pub async fn derive_price<S: Store>(
    State(state): State<AppState<S>>,
    payload: Result<Json<PricingRequest>, JsonRejection>,
) -> Result<Json<PriceResult>, PricingError> {
    let Json(request) =
        payload.map_err(|rejection| PricingError::InvalidInput(rejection.body_text()))?;
    let input = state.tax_table.resolve(&request)?;
    Ok(Json(input.derive()?))
}

pub async fn list_tax_rates<S: Store>(
    State(state): State<AppState<S>>,
) -> Json<ListResponse<TaxRate>> {
    Json(ListResponse::new(state.tax_table.rates()))
}
