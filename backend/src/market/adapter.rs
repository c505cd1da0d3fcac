use std::time::Duration;

use crate::error::{MarketError, MarketResult};
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tripfin_shared::Timestamp;

/// 抽象存储接口：负责数据的持久化
///
/// 值以 JSON 字符串保存，Decimal 不经过 JS Number，金额精确。
#[async_trait(?Send)]
pub trait StorageAdapter {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> MarketResult<Option<T>>;
    async fn put<T: Serialize>(&self, key: &str, value: &T) -> MarketResult<()>;
    async fn delete(&self, key: &str) -> MarketResult<bool>;
    /// 前缀扫描，按 key 升序返回
    async fn list<T: DeserializeOwned>(&self, prefix: &str) -> MarketResult<Vec<(String, T)>>;
    /// 前缀扫描，按 key 降序只取前 `limit` 条
    async fn list_latest<T: DeserializeOwned>(&self, prefix: &str, limit: usize) -> MarketResult<Vec<(String, T)>>;
}

/// 抽象环境变量接口
pub trait EnvAdapter {
    fn var(&self, name: &str) -> Option<String>;
    fn secret(&self, name: &str) -> Option<String>;
}

/// 抽象调度接口：Durable Object Alarm
#[async_trait(?Send)]
pub trait AlarmScheduler {
    async fn set_alarm(&self, after: Duration) -> MarketResult<()>;
    async fn delete_alarm(&self) -> MarketResult<()>;
}

/// 时间来源，测试里固定
pub trait Clock {
    fn now(&self) -> Timestamp;
}

// =========================================================
// 生产环境实现 (Worker)
// =========================================================

pub struct WorkerStorage(pub worker::Storage);

#[async_trait(?Send)]
impl StorageAdapter for WorkerStorage {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> MarketResult<Option<T>> {
        let raw: Option<String> = self.0.get(key).await.or_else(|e| {
            let msg = e.to_string();
            if msg.contains("No such value") {
                Ok(None)
            } else {
                Err(MarketError::from(e).in_op_with("storage.get", key))
            }
        })?;
        match raw {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| MarketError::from(e).in_op_with("storage.decode", key)),
            None => Ok(None),
        }
    }

    async fn put<T: Serialize>(&self, key: &str, value: &T) -> MarketResult<()> {
        let text = serde_json::to_string(value)
            .map_err(|e| MarketError::from(e).in_op_with("storage.encode", key))?;
        self.0
            .put(key, text)
            .await
            .map_err(|e| MarketError::from(e).in_op_with("storage.put", key))
    }

    async fn delete(&self, key: &str) -> MarketResult<bool> {
        self.0
            .delete(key)
            .await
            .map_err(|e| MarketError::from(e).in_op_with("storage.delete", key))
    }

    async fn list<T: DeserializeOwned>(&self, prefix: &str) -> MarketResult<Vec<(String, T)>> {
        let opts = worker::ListOptions::new().prefix(prefix);
        let mut result = self.list_with(opts, prefix).await?;
        result.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(result)
    }

    async fn list_latest<T: DeserializeOwned>(&self, prefix: &str, limit: usize) -> MarketResult<Vec<(String, T)>> {
        let opts = worker::ListOptions::new().prefix(prefix).reverse(true).limit(limit);
        let mut result = self.list_with(opts, prefix).await?;
        result.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(result)
    }
}

impl WorkerStorage {
    async fn list_with<T: DeserializeOwned>(
        &self,
        opts: worker::ListOptions<'_>,
        prefix: &str,
    ) -> MarketResult<Vec<(String, T)>> {
        let map = self
            .0
            .list_with_options(opts)
            .await
            .map_err(|e| MarketError::from(e).in_op_with("storage.list", prefix))?;

        let mut result = Vec::new();
        for entry in map.entries() {
            let entry = entry.map_err(|e| MarketError::from(e).in_op_with("storage.list", prefix))?;
            let pair = js_sys_pair(&entry);
            let (Some(key), Some(text)) = pair else {
                return Err(MarketError::store("Malformed storage entry").in_op_with("storage.list", prefix));
            };
            let value = serde_json::from_str(&text)
                .map_err(|e| MarketError::from(e).in_op_with("storage.decode", key.clone()))?;
            result.push((key, value));
        }
        Ok(result)
    }
}

/// Map entry 是 `[key, value]` 数组
fn js_sys_pair(entry: &worker::wasm_bindgen::JsValue) -> (Option<String>, Option<String>) {
    let array = worker::js_sys::Array::from(entry);
    (array.get(0).as_string(), array.get(1).as_string())
}

#[async_trait(?Send)]
impl AlarmScheduler for WorkerStorage {
    async fn set_alarm(&self, after: Duration) -> MarketResult<()> {
        self.0
            .set_alarm(after)
            .await
            .map_err(|e| MarketError::from(e).in_op("alarm.set"))
    }

    async fn delete_alarm(&self) -> MarketResult<()> {
        self.0
            .delete_alarm()
            .await
            .map_err(|e| MarketError::from(e).in_op("alarm.delete"))
    }
}

/// Worker Env 的 EnvAdapter 实现
pub struct WorkerEnv<'a>(pub &'a worker::Env);

impl<'a> EnvAdapter for WorkerEnv<'a> {
    fn var(&self, name: &str) -> Option<String> {
        self.0.var(name).ok().map(|v| v.to_string())
    }

    fn secret(&self, name: &str) -> Option<String> {
        self.0.secret(name).ok().map(|s| s.to_string())
    }
}

pub struct WorkerClock;

impl Clock for WorkerClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

// =========================================================
// 测试环境实现 (Mock)
// =========================================================
