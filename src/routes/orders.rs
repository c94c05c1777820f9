//! Order history route handlers

use askama::Template;
use axum::{
    extract::{Path, State},
    response::Html,
    routing::get,
    Router,
};

use crate::auth::CurrentUser;
use crate::error::Result;
use crate::models::{Dispute, Order};
use crate::shop::disputes;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders/", get(list).post(list))
        .route("/orders/:id/", get(detail).post(detail))
}

#[derive(Template)]
#[template(path = "orders.html")]
struct OrdersTemplate {
    orders: Vec<Order>,
}

#[derive(Template)]
#[template(path = "order_detail.html")]
struct OrderDetailTemplate {
    order: Order,
    dispute: Option<Dispute>,
}

/// The user's orders, newest first
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>> {
    let orders = state.store.orders_for(user.id).await?;
    Ok(Html(OrdersTemplate { orders }.render()?))
}

/// One of the user's orders with its dispute, if any
pub async fn detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Html<String>> {
    let order = disputes::owned_order(state.store.as_ref(), &user, id).await?;
    let dispute = state.store.find_dispute_for_order(order.id).await?;

    Ok(Html(OrderDetailTemplate { order, dispute }.render()?))
}
