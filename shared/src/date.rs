//! 时间类型模块
//!
//! `Timestamp` 是可序列化的毫秒时间戳，所有领域模型的时间字段都使用它。
//! 业务上的"天"一律按 UTC 日历日计算，通过 [`Timestamp::date_naive`] 取得。

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Sub;

const MILLIS_PER_DAY: i64 = 86_400_000;

// =========================================================
// Timestamp - 可传输的时间戳类型
// =========================================================

/// 毫秒时间戳，用于序列化传输和存储
///
/// 内部存储为 `i64`，表示自 Unix 纪元以来的毫秒数
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    #[inline]
    pub const fn new(ms: i64) -> Self {
        Self(ms)
    }

    /// 当前时间
    ///
    /// wasm32 下读取 JS 时钟，其余平台读取系统时钟。
    pub fn now() -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            Self(js_sys::Date::now() as i64)
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            Self(Utc::now().timestamp_millis())
        }
    }

    /// 从 UTC 日历日的零点构造
    pub fn from_date(date: NaiveDate) -> Self {
        let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
        Self(Utc.from_utc_datetime(&midnight).timestamp_millis())
    }

    #[inline]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn as_secs(&self) -> i64 {
        self.0 / 1000
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// 所在的 UTC 日历日
    pub fn date_naive(&self) -> NaiveDate {
        self.to_datetime().date_naive()
    }

    pub fn add_days(&self, days: i64) -> Self {
        Self(self.0 + days * MILLIS_PER_DAY)
    }

    pub fn add_hours(&self, hours: i64) -> Self {
        Self(self.0 + hours * 3_600_000)
    }

    /// RFC 3339 格式，用于界面展示和日志
    pub fn to_rfc3339(&self) -> String {
        self.to_datetime().to_rfc3339()
    }

    /// 零填充的排序键，字典序与时间顺序一致
    pub fn sort_key(&self) -> String {
        format!("{:015}", self.0.max(0))
    }
}

impl From<i64> for Timestamp {
    fn from(ms: i64) -> Self {
        Self(ms)
    }
}

impl From<Timestamp> for i64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = Duration;

    /// 两个时间戳之差，可以为负
    fn sub(self, rhs: Timestamp) -> Self::Output {
        Duration::milliseconds(self.0 - rhs.0)
    }
}
