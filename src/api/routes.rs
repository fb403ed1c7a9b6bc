use axum::{
    routing::{get, post},
    Router,
};

use crate::api::handlers::{self, AppState};
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Classification
        .route(
            "/groups",
            get(handlers::list_groups::<S>).post(handlers::create_group::<S>),
        )
        .route(
            "/groups/:group_id",
            get(handlers::get_group::<S>).delete(handlers::delete_group::<S>),
        )
        .route(
            "/groups/:group_id/subgroups",
            get(handlers::list_subgroups::<S>).post(handlers::create_subgroup::<S>),
        )
        .route("/subgroups/:subgroup_id", get(handlers::get_subgroup::<S>))
        // Code allocation
        .route(
            "/subgroups/:subgroup_id/next-code",
            get(handlers::preview_next_code::<S>),
        )
        .route(
            "/subgroups/:subgroup_id/allocate",
            post(handlers::allocate_code::<S>),
        )
        // Catalog items
        .route(
            "/items",
            get(handlers::list_items::<S>).post(handlers::create_item::<S>),
        )
        .route(
            "/items/:item_id",
            get(handlers::get_item::<S>)
                .patch(handlers::update_item::<S>)
                .delete(handlers::delete_item::<S>),
        )
        // Pricing
        .route("/pricing/derive", post(handlers::derive_price::<S>))
        .route("/pricing/tax-rates", get(handlers::list_tax_rates::<S>))
}
