//! Booking schedule models

use chrono::{NaiveDate, NaiveTime};
use sqlx::FromRow;

/// Bookable time slot, assigned to at most one user
#[derive(Debug, Clone, FromRow)]
pub struct Schedule {
    pub id: i64,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub assigned_to: Option<i64>,
}

impl Schedule {
    /// Open for booking on `today`
    pub fn is_open(&self, today: NaiveDate) -> bool {
        self.assigned_to.is_none() && self.date >= today
    }

    pub fn label(&self) -> String {
        format!(
            "{} {} - {}",
            self.date.format("%d.%m.%Y"),
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M")
        )
    }
}

#[derive(Debug, Clone)]
pub struct NewSlot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(date: NaiveDate, assigned_to: Option<i64>) -> Schedule {
        Schedule {
            id: 1,
            date,
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(11, 30, 0).unwrap(),
            assigned_to,
        }
    }

    #[test]
    fn test_is_open() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let yesterday = today.pred_opt().unwrap();

        assert!(slot(today, None).is_open(today));
        assert!(!slot(yesterday, None).is_open(today));
        assert!(!slot(today, Some(7)).is_open(today));
    }

    #[test]
    fn test_label() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert_eq!(slot(today, None).label(), "10.03.2026 10:00 - 11:30");
    }
}
