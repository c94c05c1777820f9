//! Booking ledger: open slots and exclusive claims.

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::forms::FormErrors;
use crate::models::{NewSlot, Schedule, User};

/// Current date for slot eligibility
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Unassigned slots from today on, earliest first
pub async fn list_open_slots(store: &dyn Store) -> Result<Vec<Schedule>> {
    store.open_slots(today()).await
}

/// The user's upcoming bookings
pub async fn my_bookings(store: &dyn Store, user: &User) -> Result<Vec<Schedule>> {
    store.bookings_for(user.id, today()).await
}

/// A slot that can still be booked, or `NotFound`
pub async fn open_slot(store: &dyn Store, id: i64) -> Result<Schedule> {
    store
        .find_open_slot(id, today())
        .await?
        .ok_or(AppError::NotFound)
}

/// Claim a slot for the user.
///
/// Eligibility is checked by the same write that assigns the slot, so of two
/// concurrent bookings exactly one succeeds; the other gets `NotFound`.
pub async fn book(store: &dyn Store, user: &User, id: i64) -> Result<Schedule> {
    match store.claim_slot(id, user.id, today()).await? {
        Some(slot) => {
            info!(user_id = user.id, slot_id = id, "Slot booked");
            Ok(slot)
        }
        None => {
            warn!(user_id = user.id, slot_id = id, "Slot not available for booking");
            Err(AppError::NotFound)
        }
    }
}

/// Staff form for a new slot
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlotForm {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

impl SlotForm {
    pub fn parse(&self) -> Result<NewSlot> {
        let mut errors = FormErrors::default();

        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").ok();
        if date.is_none() {
            errors.add("date", "Enter a valid date (YYYY-MM-DD).");
        }
        let start_time = parse_time(&self.start_time);
        if start_time.is_none() {
            errors.add("start_time", "Enter a valid time (HH:MM).");
        }
        let end_time = parse_time(&self.end_time);
        if end_time.is_none() {
            errors.add("end_time", "Enter a valid time (HH:MM).");
        }

        match (date, start_time, end_time) {
            (Some(date), Some(start_time), Some(end_time)) => {
                if end_time <= start_time {
                    errors.add("end_time", "The slot must end after it starts.");
                    return Err(AppError::Validation(errors));
                }
                Ok(NewSlot {
                    date,
                    start_time,
                    end_time,
                })
            }
            _ => Err(AppError::Validation(errors)),
        }
    }
}

pub async fn create_slot(store: &dyn Store, form: &SlotForm) -> Result<Schedule> {
    let slot = store.create_slot(form.parse()?).await?;
    info!(slot_id = slot.id, date = %slot.date, "Slot created");
    Ok(slot)
}
