//! Catalog route handlers

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::Html,
    routing::get,
    Router,
};

use crate::auth::MaybeUser;
use crate::error::Result;
use crate::models::Product;
use crate::shop::{cart, catalog, pagination::Page, pagination::PageQuery};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/course/:slug/", get(detail))
}

/// Course listing template
#[derive(Template)]
#[template(path = "product_list.html")]
struct ProductListTemplate {
    products: Vec<Product>,
    page: Page,
}

/// Course detail template
#[derive(Template)]
#[template(path = "product_detail.html")]
struct ProductDetailTemplate {
    product: Product,
    logged_in: bool,
    in_cart: bool,
}

/// In-sale courses, six per page
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>> {
    let listing = catalog::catalog_page(state.store.as_ref(), &state.cache, query.page).await?;

    let template = ProductListTemplate {
        products: listing.products.clone(),
        page: listing.page,
    };

    Ok(Html(template.render()?))
}

/// Course detail, with the cart button for logged-in visitors
pub async fn detail(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
) -> Result<Html<String>> {
    let product = catalog::product_detail(state.store.as_ref(), &state.cache, &slug).await?;

    let in_cart = match &user {
        Some(user) => cart::view_cart(state.store.as_ref(), user)
            .await?
            .contains(product.id),
        None => false,
    };

    let template = ProductDetailTemplate {
        product: product.as_ref().clone(),
        logged_in: user.is_some(),
        in_cart,
    };

    Ok(Html(template.render()?))
}
