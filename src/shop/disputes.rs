//! Dispute tracker: complaints on orders and their resolution.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::forms::{validate_form, FormErrors};
use crate::models::{Dispute, DisputeChoice, Order, User};

use super::pagination::Page;

pub const DISPUTES_PER_PAGE: i64 = 10;

/// Complaint form
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct DisputeForm {
    #[validate(length(min = 1, message = "This field is required."))]
    pub dispute_text: String,
}

impl DisputeForm {
    fn cleaned(&self) -> Result<String> {
        let cleaned = DisputeForm {
            dispute_text: self.dispute_text.trim().to_string(),
        };
        validate_form(&cleaned).into_result()?;
        Ok(cleaned.dispute_text)
    }
}

/// Resolution form; an empty `decision` clears the decision
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveForm {
    #[serde(default)]
    pub decision: String,
    #[serde(default)]
    pub decision_text: String,
}

impl ResolveForm {
    fn decision_id(&self) -> Result<Option<i64>> {
        let raw = self.decision.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<i64>()
            .map(Some)
            .map_err(|_| AppError::invalid("decision", "Select a valid choice."))
    }

    fn decision_text(&self) -> Option<String> {
        let text = self.decision_text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// Decision date after a change of decision.
///
/// Setting or changing the decision stamps `now`, clearing it clears the
/// date, leaving it as it was keeps the old date.
pub fn next_decision_date(
    previous: Option<i64>,
    previous_date: Option<DateTime<Utc>>,
    next: Option<i64>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match next {
        None => None,
        Some(_) if next == previous => previous_date.or(Some(now)),
        Some(_) => Some(now),
    }
}

/// The user's own order, or `NotFound`
pub async fn owned_order(store: &dyn Store, user: &User, order_id: i64) -> Result<Order> {
    store
        .find_order(order_id)
        .await?
        .filter(|o| o.customer_id == user.id)
        .ok_or(AppError::NotFound)
}

/// File a complaint on one of the user's orders. A second one fails with `Conflict`.
pub async fn file_dispute(
    store: &dyn Store,
    user: &User,
    order_id: i64,
    form: &DisputeForm,
) -> Result<Dispute> {
    let order = owned_order(store, user, order_id).await?;
    let text = form.cleaned()?;
    let dispute = store.create_dispute(order.id, &text).await?;
    info!(user_id = user.id, order_id = order.id, dispute_id = dispute.id, "Dispute filed");
    Ok(dispute)
}

/// A dispute visible to the user: their own, or any for staff
pub async fn view_dispute(store: &dyn Store, user: &User, id: i64) -> Result<Dispute> {
    let dispute = store.find_dispute(id).await?.ok_or(AppError::NotFound)?;
    if dispute.customer_id != user.id && !user.is_staff {
        return Err(AppError::Forbidden);
    }
    Ok(dispute)
}

/// Record a staff decision. The complaint text and order never change.
pub async fn resolve_dispute(
    store: &dyn Store,
    staff: &User,
    id: i64,
    form: &ResolveForm,
) -> Result<Dispute> {
    if !staff.is_staff {
        return Err(AppError::Forbidden);
    }
    let dispute = store.find_dispute(id).await?.ok_or(AppError::NotFound)?;
    let decision_id = form.decision_id()?;

    if let Some(choice_id) = decision_id {
        let known = store
            .dispute_choices()
            .await?
            .iter()
            .any(|c| c.id == choice_id);
        if !known {
            return Err(AppError::invalid("decision", "Select a valid choice."));
        }
    }

    let decision_date = next_decision_date(
        dispute.decision_id,
        dispute.decision_date,
        decision_id,
        Utc::now(),
    );
    let updated = store
        .update_dispute_decision(id, decision_id, form.decision_text(), decision_date)
        .await?;

    info!(
        staff_id = staff.id,
        dispute_id = id,
        decision = updated.status(),
        "Dispute resolved"
    );
    Ok(updated)
}

/// One page of the user's disputes
pub async fn disputes_page(store: &dyn Store, user: &User, page: i64) -> Result<(Vec<Dispute>, Page)> {
    let total = store.count_disputes_for(user.id).await?;
    let page = Page::new(page, DISPUTES_PER_PAGE, total)?;
    let disputes = store
        .disputes_for(user.id, page.per_page, page.offset())
        .await?;
    Ok((disputes, page))
}

/// Add a decision to the staff vocabulary; names are unique
pub async fn add_choice(store: &dyn Store, name: &str) -> Result<DisputeChoice> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::invalid("choice", "This field is required."));
    }
    if name.chars().count() > 50 {
        return Err(AppError::invalid("choice", "Ensure this value has at most 50 characters."));
    }

    match store.create_dispute_choice(name).await {
        Ok(choice) => {
            info!(choice_id = choice.id, choice = %choice.choice, "Dispute choice added");
            Ok(choice)
        }
        Err(AppError::Conflict(_)) => Err(AppError::invalid(
            "choice",
            "Dispute choice with this name already exists.",
        )),
        Err(e) => Err(e),
    }
}

/// `?decision=` filter of the staff dispute list; empty or malformed means all
pub fn decision_filter(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
}

/// Field errors to show on a dispute form, if the error is one the form can display
pub fn form_errors(err: &AppError) -> Option<FormErrors> {
    match err {
        AppError::Validation(errors) => Some(errors.clone()),
        AppError::Conflict(_) => {
            let mut errors = FormErrors::default();
            errors.add("dispute_text", "A dispute has already been filed for this order.");
            Some(errors)
        }
        _ => None,
    }
}
