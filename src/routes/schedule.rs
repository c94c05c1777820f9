//! Booking schedule route handlers

use askama::Template;
use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;

use crate::auth::{CurrentUser, MaybeUser};
use crate::error::Result;
use crate::models::Schedule;
use crate::shop::booking;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/schedule/", get(list))
        .route("/schedule/:id/", get(confirm).post(book))
}

/// Booking form body; only the presence of `booking` matters
#[derive(Debug, Deserialize)]
pub struct BookingForm {
    #[serde(default)]
    pub booking: Option<String>,
}

#[derive(Template)]
#[template(path = "schedule_list.html")]
struct ScheduleListTemplate {
    slots: Vec<Schedule>,
    bookings: Vec<Schedule>,
    logged_in: bool,
}

#[derive(Template)]
#[template(path = "schedule_confirm.html")]
struct ScheduleConfirmTemplate {
    slot: Schedule,
}

#[derive(Template)]
#[template(path = "schedule_success.html")]
struct ScheduleSuccessTemplate {
    slot: Schedule,
}

/// Open slots, plus the visitor's own bookings when logged in
pub async fn list(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>> {
    let store = state.store.as_ref();
    let slots = booking::list_open_slots(store).await?;
    let bookings = match &user {
        Some(user) => booking::my_bookings(store, user).await?,
        None => Vec::new(),
    };

    let template = ScheduleListTemplate {
        slots,
        bookings,
        logged_in: user.is_some(),
    };
    Ok(Html(template.render()?))
}

pub async fn confirm(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Html<String>> {
    let slot = booking::open_slot(state.store.as_ref(), id).await?;
    Ok(Html(ScheduleConfirmTemplate { slot }.render()?))
}

/// Claim the slot; a slot taken in the meantime is `404`
pub async fn book(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<BookingForm>,
) -> Result<Response> {
    if form.booking.is_none() {
        return Ok(Redirect::to(&format!("/schedule/{}/", id)).into_response());
    }

    let slot = booking::book(state.store.as_ref(), &user, id).await?;
    Ok(Html(ScheduleSuccessTemplate { slot }.render()?).into_response())
}
