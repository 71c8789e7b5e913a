/// Subscription savings estimate from viewing windows
use chrono::{Datelike, NaiveDate};
use guide_core::dates::{days_in_month, days_in_year};
use guide_core::{ActiveWindow, DateRange};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// One provider subscribed for the span of one window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionWindow {
    pub provider_id: u32,
    pub window: ActiveWindow,
}

/// A rough figure of what pausing subscriptions outside windows saves.
///
/// Not a billing reconciliation; present it through [`SavingsEstimate::approx_label`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SavingsEstimate {
    pub monthly: f64,
    pub year_to_date: f64,
    /// Sum of monthly costs if every provider stayed subscribed
    pub baseline_monthly: f64,
    /// Monthly cost when subscribed only during windows
    pub effective_monthly: f64,
}

impl SavingsEstimate {
    /// e.g. `"~$42/mo, ~$310 this year"`
    pub fn approx_label(&self, currency: &str) -> String {
        format!(
            "~{}{:.0}/mo, ~{}{:.0} this year",
            currency,
            self.monthly.round(),
            currency,
            self.year_to_date.round()
        )
    }
}

/// Estimate savings for the calendar year containing `today`.
///
/// Each provider's windows are merged (overlapping days count once) and
/// clipped to that year. A provider with a cost but no window is saved in
/// full; a window for a provider without a cost is ignored.
pub fn estimate_savings(
    windows: &[SubscriptionWindow],
    costs: &BTreeMap<u32, f64>,
    today: NaiveDate,
) -> SavingsEstimate {
    let Some(year) = DateRange::year(today.year()) else {
        return SavingsEstimate::default();
    };
    let year_days = days_in_year(today.year()) as f64;

    let mut subscribed: BTreeMap<u32, BTreeSet<NaiveDate>> = BTreeMap::new();
    for entry in windows {
        if !costs.contains_key(&entry.provider_id) {
            continue;
        }
        if let Some(clipped) = entry.window.as_range().intersect(&year) {
            subscribed.entry(entry.provider_id).or_default().extend(clipped.days());
        }
    }

    let mut baseline_monthly = 0.0;
    let mut effective_monthly = 0.0;
    for (provider_id, monthly_cost) in costs {
        let cost = monthly_cost.max(0.0);
        let days = subscribed.get(provider_id).map_or(0, BTreeSet::len) as f64;
        baseline_monthly += cost;
        // Yearly spend at the subscribed share of days, as a monthly figure
        effective_monthly += days / year_days * cost;
    }

    let monthly = (baseline_monthly - effective_monthly).max(0.0);
    let elapsed_months =
        (today.month() - 1) as f64 + today.day() as f64 / days_in_month(today.year(), today.month()) as f64;

    debug!(
        "Savings: baseline {:.2}, effective {:.2}, {:.2} months elapsed",
        baseline_monthly, effective_monthly, elapsed_months
    );

    SavingsEstimate {
        monthly,
        year_to_date: (monthly * elapsed_months).max(0.0),
        baseline_monthly,
        effective_monthly,
    }
}
