//! Recurring-charge schedule entity (spec §3, §4.8).

use chrono::{DateTime, NaiveDate, Utc};
use common::{CustomerId, MerchantId, Money, PaymentMethodId, SubscriptionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "interval_unit", rename_all = "snake_case")]
pub enum IntervalUnit {
    Day,
    Week,
    Month,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub value: u32,
    pub unit: IntervalUnit,
}

impl Interval {
    pub fn advance(&self, from: NaiveDate) -> NaiveDate {
        match self.unit {
            IntervalUnit::Day => from + chrono::Duration::days(self.value as i64),
            IntervalUnit::Week => from + chrono::Duration::weeks(self.value as i64),
            IntervalUnit::Month => add_months(from, self.value as i32),
            IntervalUnit::Year => add_months(from, self.value as i32 * 12),
        }
    }
}

fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    use chrono::Datelike;
    let total_months = date.year() * 12 + (date.month0() as i32) + months;
    let year = total_months.div_euclid(12);
    let month0 = total_months.rem_euclid(12);
    let last_day_of_month = NaiveDate::from_ymd_opt(year, (month0 + 1) as u32 + 1, 1)
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap())
        .pred_opt()
        .unwrap();
    let day = date.day().min(last_day_of_month.day());
    NaiveDate::from_ymd_opt(year, (month0 + 1) as u32, day).unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Paused,
    PastDue,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub merchant_id: MerchantId,
    pub customer_id: CustomerId,
    pub payment_method_id: PaymentMethodId,
    pub amount: Money,
    pub interval: Interval,
    pub status: SubscriptionStatus,
    pub next_billing_date: NaiveDate,
    pub failure_retry_count: u32,
    pub max_retries: u32,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn billing_period_key(&self) -> String {
        self.next_billing_date.format("%Y-%m-%d").to_string()
    }

    pub fn idempotency_key(&self) -> String {
        format!("sub:{}:{}", self.id, self.billing_period_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_interval_clamps_short_months() {
        let interval = Interval {
            value: 1,
            unit: IntervalUnit::Month,
        };
        let jan31 = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        assert_eq!(interval.advance(jan31), NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
    }

    #[test]
    fn year_interval_adds_twelve_months() {
        let interval = Interval {
            value: 1,
            unit: IntervalUnit::Year,
        };
        let d = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert_eq!(interval.advance(d), NaiveDate::from_ymd_opt(2027, 3, 15).unwrap());
    }
}
