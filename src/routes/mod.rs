//! HTTP route handlers

pub mod accounts;
pub mod admin;
pub mod cart;
pub mod catalog;
pub mod disputes;
pub mod orders;
pub mod schedule;

use axum::Router;

use crate::AppState;

/// Every page of the shop
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(catalog::routes())
        .merge(cart::routes())
        .merge(orders::routes())
        .merge(disputes::routes())
        .merge(schedule::routes())
        .merge(accounts::routes())
        .nest("/admin", admin::routes())
}
