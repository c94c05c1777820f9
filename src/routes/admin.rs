//! Staff administration handlers, mounted under `/admin`

use askama::Template;
use axum::{
    extract::{Multipart, Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;

use crate::auth::StaffUser;
use crate::cache::CacheStats;
use crate::error::{AppError, Result};
use crate::forms::FormErrors;
use crate::models::{Dispute, DisputeChoice, Product};
use crate::routes::disputes::ChoiceOption;
use crate::shop::booking::{self, SlotForm};
use crate::shop::catalog::{self, ProductForm};
use crate::shop::disputes;
use crate::shop::orders::{self, CustomerCart, CustomerOrder};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products/", get(products).post(create_product))
        .route("/products/action/", post(product_action))
        .route("/products/:slug/price/", post(change_price))
        .route("/products/:slug/delete/", post(delete_product))
        .route("/products/:slug/image/", post(upload_image))
        .route("/orders/", get(order_list))
        .route("/orders/:id/", get(order_detail))
        .route("/carts/", get(cart_list))
        .route("/disputes/", get(dispute_list))
        .route("/choices/", get(choices).post(create_choice))
        .route("/schedule/", get(schedule).post(create_slot))
        .route("/cache/", get(cache_stats))
}

#[derive(Template)]
#[template(path = "admin/products.html")]
struct ProductsTemplate {
    products: Vec<Product>,
    form: ProductForm,
    errors: FormErrors,
    notice: Option<String>,
}

#[derive(Template)]
#[template(path = "admin/orders.html")]
struct OrdersTemplate {
    orders: Vec<CustomerOrder>,
    search: String,
}

#[derive(Template)]
#[template(path = "admin/order_detail.html")]
struct OrderDetailTemplate {
    row: CustomerOrder,
    dispute: Option<Dispute>,
}

#[derive(Template)]
#[template(path = "admin/carts.html")]
struct CartsTemplate {
    carts: Vec<CustomerCart>,
}

#[derive(Template)]
#[template(path = "admin/disputes.html")]
struct DisputesTemplate {
    disputes: Vec<Dispute>,
    choices: Vec<ChoiceOption>,
}

#[derive(Template)]
#[template(path = "admin/choices.html")]
struct ChoicesTemplate {
    choices: Vec<DisputeChoice>,
    choice: String,
    errors: FormErrors,
}

/// Slot row of the staff schedule
struct SlotRow {
    label: String,
    assignee: String,
}

#[derive(Template)]
#[template(path = "admin/schedule.html")]
struct ScheduleTemplate {
    slots: Vec<SlotRow>,
    form: SlotForm,
    errors: FormErrors,
}

#[derive(Debug, Deserialize)]
pub struct PriceForm {
    #[serde(default)]
    pub price: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DecisionQuery {
    #[serde(default)]
    pub decision: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChoiceForm {
    #[serde(default)]
    pub choice: String,
}

/// Bulk action on the product list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductAction {
    PutOnSale,
    Withdraw,
}

impl ProductAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "sale" => Some(ProductAction::PutOnSale),
            "withdraw" => Some(ProductAction::Withdraw),
            _ => None,
        }
    }
}

/// Read `action` and the repeated `ids` out of the action form
fn parse_action_form(pairs: &[(String, String)]) -> Result<(ProductAction, Vec<i64>)> {
    let action = pairs
        .iter()
        .find(|(key, _)| key == "action")
        .and_then(|(_, value)| ProductAction::parse(value))
        .ok_or_else(|| AppError::invalid("action", "Select a valid action."))?;

    let ids = pairs
        .iter()
        .filter(|(key, _)| key == "ids")
        .map(|(_, value)| value.trim().parse::<i64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| AppError::invalid("ids", "Select valid products."))?;

    Ok((action, ids))
}

async fn render_products(
    state: &AppState,
    form: ProductForm,
    errors: FormErrors,
    notice: Option<String>,
) -> Result<Html<String>> {
    let template = ProductsTemplate {
        products: state.store.all_products().await?,
        form,
        errors,
        notice,
    };
    Ok(Html(template.render()?))
}

/// Re-render the product page for form errors, pass anything else through
async fn products_or_error(state: &AppState, form: ProductForm, err: AppError) -> Result<Response> {
    match err {
        AppError::Validation(errors) => Ok(render_products(state, form, errors, None)
            .await?
            .into_response()),
        other => Err(other),
    }
}

pub async fn products(State(state): State<AppState>, _staff: StaffUser) -> Result<Html<String>> {
    render_products(&state, ProductForm::default(), FormErrors::default(), None).await
}

pub async fn create_product(
    State(state): State<AppState>,
    _staff: StaffUser,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    match catalog::create_product(state.store.as_ref(), &form).await {
        Ok(_) => {
            state.cache.invalidate_catalog();
            Ok(Redirect::to("/admin/products/").into_response())
        }
        Err(err) => products_or_error(&state, form, err).await,
    }
}

/// Put the selected products on sale or withdraw them
pub async fn product_action(
    State(state): State<AppState>,
    _staff: StaffUser,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response> {
    let (action, ids) = match parse_action_form(&pairs) {
        Ok(parsed) => parsed,
        Err(err) => return products_or_error(&state, ProductForm::default(), err).await,
    };

    let updated = catalog::set_in_sale(
        state.store.as_ref(),
        &ids,
        action == ProductAction::PutOnSale,
    )
    .await?;
    state.cache.invalidate_catalog();

    let notice = match action {
        ProductAction::PutOnSale => format!("{} product(s) put on sale", updated),
        ProductAction::Withdraw => format!("{} product(s) withdrawn from sale", updated),
    };
    let html = render_products(&state, ProductForm::default(), FormErrors::default(), Some(notice)).await?;
    Ok(html.into_response())
}

pub async fn change_price(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(slug): Path<String>,
    Form(form): Form<PriceForm>,
) -> Result<Response> {
    match catalog::set_price(state.store.as_ref(), &slug, &form.price).await {
        Ok(_) => {
            state.cache.invalidate_catalog();
            Ok(Redirect::to("/admin/products/").into_response())
        }
        Err(err) => products_or_error(&state, ProductForm::default(), err).await,
    }
}

pub async fn delete_product(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(slug): Path<String>,
) -> Result<Redirect> {
    let product = catalog::product_by_slug(state.store.as_ref(), &slug).await?;
    catalog::delete_product(state.store.as_ref(), product.id).await?;
    state.cache.invalidate_catalog();
    Ok(Redirect::to("/admin/products/"))
}

/// Store the `image` field of a multipart upload as the product picture
pub async fn upload_image(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(slug): Path<String>,
    mut multipart: Multipart,
) -> Result<Response> {
    let product = catalog::product_by_slug(state.store.as_ref(), &slug).await?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::invalid("image", format!("Upload failed: {}", e)))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::invalid("image", format!("Upload failed: {}", e)))?;
        upload = Some((filename, bytes));
        break;
    }

    let result = match upload {
        Some((filename, bytes)) => {
            catalog::save_product_image(
                state.store.as_ref(),
                &state.config.media_root,
                &product,
                &filename,
                &bytes,
            )
            .await
        }
        None => Err(AppError::invalid("image", "No file was submitted.")),
    };

    match result {
        Ok(_) => {
            state.cache.invalidate_catalog();
            Ok(Redirect::to("/admin/products/").into_response())
        }
        Err(err) => products_or_error(&state, ProductForm::default(), err).await,
    }
}

/// Every order, optionally narrowed by customer or cost
pub async fn order_list(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(query): Query<SearchQuery>,
) -> Result<Html<String>> {
    let search = orders::search_term(query.q.as_deref());
    let list = orders::search_orders(state.store.as_ref(), search).await?;

    let template = OrdersTemplate {
        orders: list,
        search: search.unwrap_or_default().to_string(),
    };
    Ok(Html(template.render()?))
}

/// Any customer's order with its item breakdown
pub async fn order_detail(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(id): Path<i64>,
) -> Result<Html<String>> {
    let row = orders::order_by_id(state.store.as_ref(), id).await?;
    let dispute = state.store.find_dispute_for_order(id).await?;

    let template = OrderDetailTemplate { row, dispute };
    Ok(Html(template.render()?))
}

/// Open carts, read-only
pub async fn cart_list(State(state): State<AppState>, _staff: StaffUser) -> Result<Html<String>> {
    let carts = orders::open_carts(state.store.as_ref()).await?;
    Ok(Html(CartsTemplate { carts }.render()?))
}

/// Every dispute, optionally only those with one decision
pub async fn dispute_list(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(query): Query<DecisionQuery>,
) -> Result<Html<String>> {
    let decision = disputes::decision_filter(query.decision.as_deref());
    let list = state.store.all_disputes(decision).await?;
    let choices = ChoiceOption::list(state.store.dispute_choices().await?, decision);

    let template = DisputesTemplate {
        disputes: list,
        choices,
    };
    Ok(Html(template.render()?))
}

async fn render_choices(state: &AppState, choice: String, errors: FormErrors) -> Result<Html<String>> {
    let template = ChoicesTemplate {
        choices: state.store.dispute_choices().await?,
        choice,
        errors,
    };
    Ok(Html(template.render()?))
}

pub async fn choices(State(state): State<AppState>, _staff: StaffUser) -> Result<Html<String>> {
    render_choices(&state, String::new(), FormErrors::default()).await
}

pub async fn create_choice(
    State(state): State<AppState>,
    _staff: StaffUser,
    Form(form): Form<ChoiceForm>,
) -> Result<Response> {
    match disputes::add_choice(state.store.as_ref(), &form.choice).await {
        Ok(_) => Ok(Redirect::to("/admin/choices/").into_response()),
        Err(AppError::Validation(errors)) => {
            Ok(render_choices(&state, form.choice, errors).await?.into_response())
        }
        Err(err) => Err(err),
    }
}

async fn render_schedule(state: &AppState, form: SlotForm, errors: FormErrors) -> Result<Html<String>> {
    let mut slots = Vec::new();
    for slot in state.store.all_slots().await? {
        let assignee = match slot.assigned_to {
            Some(user_id) => state
                .store
                .find_user(user_id)
                .await?
                .map(|u| u.email)
                .unwrap_or_default(),
            None => "free".to_string(),
        };
        slots.push(SlotRow {
            label: slot.label(),
            assignee,
        });
    }

    let template = ScheduleTemplate {
        slots,
        form,
        errors,
    };
    Ok(Html(template.render()?))
}

pub async fn schedule(State(state): State<AppState>, _staff: StaffUser) -> Result<Html<String>> {
    render_schedule(&state, SlotForm::default(), FormErrors::default()).await
}

pub async fn create_slot(
    State(state): State<AppState>,
    _staff: StaffUser,
    Form(form): Form<SlotForm>,
) -> Result<Response> {
    match booking::create_slot(state.store.as_ref(), &form).await {
        Ok(_) => Ok(Redirect::to("/admin/schedule/").into_response()),
        Err(AppError::Validation(errors)) => {
            Ok(render_schedule(&state, form, errors).await?.into_response())
        }
        Err(err) => Err(err),
    }
}

/// Cache sizes for monitoring
pub async fn cache_stats(State(state): State<AppState>, _staff: StaffUser) -> Json<CacheStats> {
    Json(state.cache.stats())
}
