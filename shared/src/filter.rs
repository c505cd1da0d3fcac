//! 行程筛选条件
//!
//! 既用于后端的 `GET /api/trips` 查询参数，也用于前端表格的本地筛选。

use crate::model::{RiskLevel, Trip, TripStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TripStatus>,
    #[serde(alias = "load_owner_id", default, skip_serializing_if = "Option::is_none")]
    pub load_owner_id: Option<String>,
    #[serde(alias = "lender_id", default, skip_serializing_if = "Option::is_none")]
    pub lender_id: Option<String>,
    #[serde(alias = "risk_level", default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(alias = "min_amount", default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<Decimal>,
    #[serde(alias = "max_amount", default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<Decimal>,
    #[serde(alias = "min_distance", default, skip_serializing_if = "Option::is_none")]
    pub min_distance: Option<Decimal>,
    #[serde(alias = "max_distance", default, skip_serializing_if = "Option::is_none")]
    pub max_distance: Option<Decimal>,
    #[serde(alias = "min_weight", default, skip_serializing_if = "Option::is_none")]
    pub min_weight: Option<Decimal>,
    #[serde(alias = "max_weight", default, skip_serializing_if = "Option::is_none")]
    pub max_weight: Option<Decimal>,
    #[serde(alias = "has_bids", default, skip_serializing_if = "Option::is_none")]
    pub has_bids: Option<bool>,
    /// 不区分大小写，匹配起点、终点、货物类型与 e-way bill 号
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

fn within(value: Decimal, min: Option<Decimal>, max: Option<Decimal>) -> bool {
    min.is_none_or(|m| value >= m) && max.is_none_or(|m| value <= m)
}

impl TripFilter {
    pub fn matches(&self, trip: &Trip) -> bool {
        if self.status.is_some_and(|s| s != trip.status) {
            return false;
        }
        if self
            .load_owner_id
            .as_deref()
            .is_some_and(|id| id != trip.load_owner_id)
        {
            return false;
        }
        if self
            .lender_id
            .as_deref()
            .is_some_and(|id| trip.lender_id.as_deref() != Some(id))
        {
            return false;
        }
        if self.risk_level.is_some_and(|r| r != trip.risk_level) {
            return false;
        }
        if !within(trip.amount, self.min_amount, self.max_amount)
            || !within(trip.distance, self.min_distance, self.max_distance)
            || !within(trip.weight, self.min_weight, self.max_weight)
        {
            return false;
        }
        if self.has_bids.is_some_and(|want| want == trip.bids.is_empty()) {
            return false;
        }
        if let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = needle.to_lowercase();
            let hit = [
                Some(&trip.origin),
                Some(&trip.destination),
                Some(&trip.load_type),
                trip.eway_bill_number.as_ref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }

    /// 保持输入顺序
    pub fn apply<'a, I>(&self, trips: I) -> Vec<Trip>
    where
        I: IntoIterator<Item = &'a Trip>,
    {
        trips.into_iter().filter(|t| self.matches(t)).cloned().collect()
    }

    /// 从 URL 查询参数构造；无法解析的值直接忽略
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filter = Self::default();
        for (key, value) in pairs {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            let dec = || Decimal::from_str(value).ok();
            match key.as_ref() {
                "status" => filter.status = parse_enum(value),
                "loadOwnerId" | "load_owner_id" => filter.load_owner_id = Some(value.to_string()),
                "lenderId" | "lender_id" => filter.lender_id = Some(value.to_string()),
                "riskLevel" | "risk_level" => filter.risk_level = parse_enum(value),
                "minAmount" | "min_amount" => filter.min_amount = dec(),
                "maxAmount" | "max_amount" => filter.max_amount = dec(),
                "minDistance" | "min_distance" => filter.min_distance = dec(),
                "maxDistance" | "max_distance" => filter.max_distance = dec(),
                "minWeight" | "min_weight" => filter.min_weight = dec(),
                "maxWeight" | "max_weight" => filter.max_weight = dec(),
                "hasBids" | "has_bids" => filter.has_bids = value.parse().ok(),
                "search" | "q" => filter.search = Some(value.to_string()),
                _ => {}
            }
        }
        filter
    }

    /// 转成查询参数 (camelCase)，与 [`TripFilter::from_pairs`] 对应
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let mut push = |k: &'static str, v: Option<String>| {
            if let Some(v) = v {
                pairs.push((k, v));
            }
        };
        push("status", self.status.map(|s| s.as_str().to_string()));
        push("loadOwnerId", self.load_owner_id.clone());
        push("lenderId", self.lender_id.clone());
        push("riskLevel", self.risk_level.and_then(enum_str));
        push("minAmount", self.min_amount.map(|d| d.to_string()));
        push("maxAmount", self.max_amount.map(|d| d.to_string()));
        push("minDistance", self.min_distance.map(|d| d.to_string()));
        push("maxDistance", self.max_distance.map(|d| d.to_string()));
        push("minWeight", self.min_weight.map(|d| d.to_string()));
        push("maxWeight", self.max_weight.map(|d| d.to_string()));
        push("hasBids", self.has_bids.map(|b| b.to_string()));
        push("search", self.search.clone());
        pairs
    }
}

fn parse_enum<T: serde::de::DeserializeOwned>(value: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).ok()
}

fn enum_str<T: Serialize>(value: T) -> Option<String> {
    match serde_json::to_value(value).ok()? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    }
}
