//! Dispute (reclamation) route handlers

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};

use crate::auth::CurrentUser;
use crate::error::{AppError, Result};
use crate::forms::FormErrors;
use crate::models::{Dispute, DisputeChoice, Order};
use crate::shop::disputes::{self, DisputeForm, ResolveForm};
use crate::shop::pagination::{Page, PageQuery};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reclamation/", get(list))
        .route("/orders/:order/dispute/", get(new_form).post(create))
        .route("/dispute/:id/", get(detail))
        .route("/dispute/:id/update/", get(edit_form).post(update))
}

#[derive(Template)]
#[template(path = "dispute_list.html")]
struct DisputeListTemplate {
    disputes: Vec<Dispute>,
    page: Page,
}

#[derive(Template)]
#[template(path = "dispute_form.html")]
struct DisputeFormTemplate {
    order: Order,
    dispute_text: String,
    errors: FormErrors,
}

#[derive(Template)]
#[template(path = "dispute_detail.html")]
struct DisputeDetailTemplate {
    dispute: Dispute,
    is_staff: bool,
}

/// Decision option in a select box
pub struct ChoiceOption {
    pub id: i64,
    pub choice: String,
    pub selected: bool,
}

impl ChoiceOption {
    pub fn list(choices: Vec<DisputeChoice>, selected: Option<i64>) -> Vec<Self> {
        choices
            .into_iter()
            .map(|c| ChoiceOption {
                selected: Some(c.id) == selected,
                id: c.id,
                choice: c.choice,
            })
            .collect()
    }
}

#[derive(Template)]
#[template(path = "dispute_update.html")]
struct DisputeUpdateTemplate {
    dispute: Dispute,
    can_edit: bool,
    choices: Vec<ChoiceOption>,
    decision_text: String,
    errors: FormErrors,
}

/// The user's disputes, ten per page
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>> {
    let (disputes, page) = disputes::disputes_page(state.store.as_ref(), &user, query.page).await?;
    Ok(Html(DisputeListTemplate { disputes, page }.render()?))
}

pub async fn new_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<i64>,
) -> Result<Html<String>> {
    let order = disputes::owned_order(state.store.as_ref(), &user, order_id).await?;

    let template = DisputeFormTemplate {
        order,
        dispute_text: String::new(),
        errors: FormErrors::default(),
    };
    Ok(Html(template.render()?))
}

/// File a dispute; problems are shown on the form
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<i64>,
    Form(form): Form<DisputeForm>,
) -> Result<Response> {
    let store = state.store.as_ref();
    match disputes::file_dispute(store, &user, order_id, &form).await {
        Ok(dispute) => Ok(Redirect::to(&format!("/orders/{}/", dispute.order_id)).into_response()),
        Err(err) => {
            let Some(errors) = disputes::form_errors(&err) else {
                return Err(err);
            };
            let template = DisputeFormTemplate {
                order: disputes::owned_order(store, &user, order_id).await?,
                dispute_text: form.dispute_text,
                errors,
            };
            Ok(Html(template.render()?).into_response())
        }
    }
}

/// Dispute detail for its owner or staff
pub async fn detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Html<String>> {
    let dispute = disputes::view_dispute(state.store.as_ref(), &user, id).await?;

    let template = DisputeDetailTemplate {
        dispute,
        is_staff: user.is_staff,
    };
    Ok(Html(template.render()?))
}

async fn render_update(
    state: &AppState,
    dispute: Dispute,
    can_edit: bool,
    selected: Option<i64>,
    decision_text: String,
    errors: FormErrors,
) -> Result<Html<String>> {
    let choices = ChoiceOption::list(state.store.dispute_choices().await?, selected);

    let template = DisputeUpdateTemplate {
        dispute,
        can_edit,
        choices,
        decision_text,
        errors,
    };
    Ok(Html(template.render()?))
}

/// Resolution form; read-only for the dispute's owner
pub async fn edit_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Html<String>> {
    let dispute = disputes::view_dispute(state.store.as_ref(), &user, id).await?;
    let selected = dispute.decision_id;
    let decision_text = dispute.decision_text.clone().unwrap_or_default();

    render_update(
        &state,
        dispute,
        user.is_staff,
        selected,
        decision_text,
        FormErrors::default(),
    )
    .await
}

/// Record a staff decision
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<ResolveForm>,
) -> Result<Response> {
    let store = state.store.as_ref();
    match disputes::resolve_dispute(store, &user, id, &form).await {
        Ok(dispute) => Ok(Redirect::to(&dispute.url()).into_response()),
        Err(AppError::Validation(errors)) => {
            let dispute = disputes::view_dispute(store, &user, id).await?;
            let html = render_update(&state, dispute, true, None, form.decision_text, errors).await?;
            Ok(html.into_response())
        }
        Err(err) => Err(err),
    }
}
