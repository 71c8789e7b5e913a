/// Recurring billing days and resubscription-date detection
use chrono::{Datelike, NaiveDate};
use guide_core::dates::days_in_month;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One configured billing day, as written in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingDay {
    pub provider_id: u32,
    /// Day of month, 1-31; out-of-range values are clamped
    pub day: i64,
}

/// Whether a provider billing on `billing_day` renews on `date`.
///
/// True on the billing day itself, and for billing days after the 28th also
/// on the last day of every month. A day-30 provider flags both Mar 30 and
/// Mar 31; each date is flagged at most once.
pub fn is_resubscription_day(billing_day: u8, date: NaiveDate) -> bool {
    let billing_day = billing_day.clamp(1, 31) as u32;
    date.day() == billing_day || (billing_day > 28 && is_last_day_of_month(date))
}

fn is_last_day_of_month(date: NaiveDate) -> bool {
    date.day() == days_in_month(date.year(), date.month())
}

/// Provider id -> billing day lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingCalendar {
    days: BTreeMap<u32, u8>,
}

impl BillingCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: &[BillingDay]) -> Self {
        let mut calendar = Self::new();
        for entry in entries {
            calendar.set(entry.provider_id, entry.day);
        }
        calendar
    }

    /// Set a provider's billing day, clamping into `1..=31`
    pub fn set(&mut self, provider_id: u32, day: i64) {
        self.days.insert(provider_id, day.clamp(1, 31) as u8);
    }

    pub fn billing_day(&self, provider_id: u32) -> Option<u8> {
        self.days.get(&provider_id).copied()
    }

    pub fn bills_on(&self, provider_id: u32, date: NaiveDate) -> bool {
        self.billing_day(provider_id)
            .map_or(false, |day| is_resubscription_day(day, date))
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}
