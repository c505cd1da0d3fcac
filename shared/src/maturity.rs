//! 到期与逾期判定
//!
//! 到期日 = 放款日期 + maturity_days。按日历日比较：只有当 `today` 严格晚于到期日时
//! 才视为逾期，因此被标记的行程 `days_overdue` 至少为 1。

use crate::date::Timestamp;
use crate::finance;
use crate::model::{Trip, TripStatus};
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub fn maturity_date(funded_on: NaiveDate, maturity_days: u32) -> NaiveDate {
    funded_on
        .checked_add_days(Days::new(u64::from(maturity_days)))
        .unwrap_or(NaiveDate::MAX)
}

/// 行程的到期日（未放款则为 None）
pub fn trip_maturity(trip: &Trip) -> Option<NaiveDate> {
    trip.funded_at
        .map(|funded| maturity_date(funded.date_naive(), trip.maturity_days))
}

/// 距离到期还有几天，逾期时为负数
pub fn days_until_maturity(trip: &Trip, today: NaiveDate) -> Option<i64> {
    trip_maturity(trip).map(|m| (m - today).num_days())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    RecentlyOverdue,
    Overdue,
    SeverelyOverdue,
}

impl Severity {
    pub fn from_days(days_overdue: i64) -> Self {
        match days_overdue {
            d if d <= 7 => Severity::RecentlyOverdue,
            d if d <= 30 => Severity::Overdue,
            _ => Severity::SeverelyOverdue,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::RecentlyOverdue => "Recently Overdue",
            Severity::Overdue => "Overdue",
            Severity::SeverelyOverdue => "Severely Overdue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaulter {
    pub trip: Trip,
    #[serde(alias = "maturity_date")]
    pub maturity_date: Timestamp,
    #[serde(alias = "days_overdue")]
    pub days_overdue: i64,
    pub severity: Severity,
    pub principal: Decimal,
    /// 按约定期限 (maturity_days) 计算的利息
    #[serde(alias = "interest_due")]
    pub interest_due: Decimal,
    #[serde(alias = "total_due")]
    pub total_due: Decimal,
}

/// 判定单个行程是否逾期
pub fn assess(trip: &Trip, today: NaiveDate) -> Option<Defaulter> {
    if !matches!(
        trip.status,
        TripStatus::Funded | TripStatus::InTransit | TripStatus::Completed
    ) {
        return None;
    }
    let maturity = trip_maturity(trip)?;
    if today <= maturity {
        return None;
    }

    let days_overdue = (today - maturity).num_days();
    let interest_due = finance::expected_return(trip.amount, trip.interest_rate, trip.maturity_days);
    Some(Defaulter {
        trip: trip.clone(),
        maturity_date: Timestamp::from_date(maturity),
        days_overdue,
        severity: Severity::from_days(days_overdue),
        principal: trip.amount,
        interest_due,
        total_due: trip.amount + interest_due,
    })
}

/// 所有逾期行程，逾期最久的排在最前
pub fn find_defaulters<'a, I>(trips: I, today: NaiveDate) -> Vec<Defaulter>
where
    I: IntoIterator<Item = &'a Trip>,
{
    let mut found: Vec<Defaulter> = trips.into_iter().filter_map(|t| assess(t, today)).collect();
    found.sort_by(|a, b| b.days_overdue.cmp(&a.days_overdue));
    found
}
