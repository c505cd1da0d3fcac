//! 市场核心逻辑
//!
//! 全部业务都在单个 Durable Object 内串行执行，`Marketplace` 对存储和时钟泛型，
//! 测试时注入 MockStorage / MockClock。

pub mod adapter;
pub mod config;
pub mod durable_object;

mod accounts;
mod defaults;
mod documents;
mod ledger;
mod notifications;
mod portfolio;
mod ratings;
mod repayment;
mod trips;

use crate::error::{MarketError, MarketResult};
use adapter::{Clock, StorageAdapter};
use config::MarketConfig;
use serde::{Deserialize, Serialize};
use tripfin_shared::{Investment, LoanAgreement, Timestamp, Trip, User};

// =========================================================
// 存储 Key 布局
// =========================================================

pub(crate) mod keys {
    pub const USER: &str = "user:";
    pub const TRIP: &str = "trip:";
    pub const INVESTMENT: &str = "inv:";
    pub const FEE: &str = "fee:";
    pub const AGREEMENT: &str = "agreement:";
    pub const RATING: &str = "rating:";
    pub const SESSION: &str = "session:";
    pub const NOTIFICATION: &str = "notif:";
    pub const SUPER_ADMIN: &str = "meta:super_admin";
    pub const SWEEP_STATE: &str = "meta:sweep";
    /// 无 super admin 时平台费进入此钱包
    pub const TREASURY: &str = "platform";

    pub fn user(id: &str) -> String {
        format!("{}{}", USER, id)
    }

    pub fn credential(email: &str) -> String {
        format!("cred:{}", email)
    }

    pub fn session(token: &str) -> String {
        format!("{}{}", SESSION, token)
    }

    pub fn wallet(user_id: &str) -> String {
        format!("wallet:{}", user_id)
    }

    pub fn transactions(user_id: &str) -> String {
        format!("txn:{}:", user_id)
    }

    pub fn transaction(user_id: &str, seq: u64) -> String {
        format!("txn:{}:{:012}", user_id, seq)
    }

    pub fn notifications(user_id: &str) -> String {
        format!("{}{}:", NOTIFICATION, user_id)
    }

    pub fn notification(user_id: &str, seq: u64) -> String {
        format!("{}{}:{:012}", NOTIFICATION, user_id, seq)
    }

    /// 单据内容按块存放：`doc:{trip}:{type}:{version}:{index}`
    pub fn document_chunks(trip_id: &str, kind: &str, version: u64) -> String {
        format!("doc:{}:{}:{:012}:", trip_id, kind, version)
    }

    pub fn document_chunk(trip_id: &str, kind: &str, version: u64, index: usize) -> String {
        format!("{}{:04}", document_chunks(trip_id, kind, version), index)
    }

    pub fn trip(id: &str) -> String {
        format!("{}{}", TRIP, id)
    }

    pub fn investment(id: &str) -> String {
        format!("{}{}", INVESTMENT, id)
    }

    pub fn fee(id: &str) -> String {
        format!("{}{}", FEE, id)
    }

    pub fn agreement(id: &str) -> String {
        format!("{}{}", AGREEMENT, id)
    }

    pub fn rating(id: &str) -> String {
        format!("{}{}", RATING, id)
    }

    pub fn sequence(name: &str) -> String {
        format!("seq:{}", name)
    }
}

/// 序列计数器，保存在 `seq:{name}`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct Sequence {
    value: u64,
}

// =========================================================
// Marketplace
// =========================================================

pub struct Marketplace<S, C> {
    storage: S,
    config: MarketConfig,
    clock: C,
}

impl<S, C> Marketplace<S, C>
where
    S: StorageAdapter,
    C: Clock,
{
    pub fn new(storage: S, config: MarketConfig, clock: C) -> Self {
        Self {
            storage,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    async fn next_seq(&self, name: &str) -> MarketResult<u64> {
        let key = keys::sequence(name);
        let mut seq: Sequence = self.storage.get(&key).await?.unwrap_or_default();
        seq.value += 1;
        self.storage.put(&key, &seq).await?;
        Ok(seq.value)
    }

    // --- 行程 ---

    async fn load_trip(&self, trip_id: &str) -> MarketResult<Trip> {
        self.storage
            .get(&keys::trip(trip_id))
            .await?
            .ok_or_else(|| MarketError::not_found("Trip not found").in_op_with("trips.load", trip_id))
    }

    async fn save_trip(&self, trip: &Trip) -> MarketResult<()> {
        self.storage.put(&keys::trip(&trip.id), trip).await
    }

    /// 所有行程，最新的在前
    async fn all_trips(&self) -> MarketResult<Vec<Trip>> {
        let mut trips: Vec<Trip> = self
            .storage
            .list(keys::TRIP)
            .await?
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        trips.sort_by(|a: &Trip, b: &Trip| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(trips)
    }

    // --- 用户 ---

    async fn load_user(&self, user_id: &str) -> MarketResult<User> {
        self.storage
            .get(&keys::user(user_id))
            .await?
            .ok_or_else(|| MarketError::not_found("User not found").in_op_with("accounts.load", user_id))
    }

    async fn save_user(&self, user: &User) -> MarketResult<()> {
        self.storage.put(&keys::user(&user.id), user).await
    }

    async fn all_users(&self) -> MarketResult<Vec<User>> {
        let mut users: Vec<User> = self
            .storage
            .list(keys::USER)
            .await?
            .into_iter()
            .map(|(_, u)| u)
            .collect();
        users.sort_by(|a: &User, b: &User| a.user_id.cmp(&b.user_id));
        Ok(users)
    }

    // --- 投资与协议 ---

    async fn save_investment(&self, investment: &Investment) -> MarketResult<()> {
        self.storage
            .put(&keys::investment(&investment.id), investment)
            .await
    }

    async fn all_investments(&self) -> MarketResult<Vec<Investment>> {
        let mut list: Vec<Investment> = self
            .storage
            .list(keys::INVESTMENT)
            .await?
            .into_iter()
            .map(|(_, i)| i)
            .collect();
        list.sort_by(|a: &Investment, b: &Investment| b.invested_at.cmp(&a.invested_at));
        Ok(list)
    }

    async fn investment_for_bid(&self, bid_id: &str) -> MarketResult<Option<Investment>> {
        Ok(self
            .all_investments()
            .await?
            .into_iter()
            .find(|i| i.bid_id == bid_id))
    }

    async fn save_agreement(&self, agreement: &LoanAgreement) -> MarketResult<()> {
        self.storage
            .put(&keys::agreement(&agreement.id), agreement)
            .await
    }

    async fn all_agreements(&self) -> MarketResult<Vec<LoanAgreement>> {
        let mut list: Vec<LoanAgreement> = self
            .storage
            .list(keys::AGREEMENT)
            .await?
            .into_iter()
            .map(|(_, a)| a)
            .collect();
        list.sort_by(|a: &LoanAgreement, b: &LoanAgreement| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn agreement_for_trip(&self, trip_id: &str) -> MarketResult<Option<LoanAgreement>> {
        Ok(self
            .all_agreements()
            .await?
            .into_iter()
            .find(|a| a.trip_id == trip_id))
    }
}

// =========================================================
// 权限检查
// =========================================================

fn require_admin(actor: &User) -> MarketResult<()> {
    if actor.role.is_admin() {
        Ok(())
    } else {
        Err(MarketError::forbidden("Admin access required"))
    }
}

fn require_approved(actor: &User) -> MarketResult<()> {
    if actor.is_approved() {
        Ok(())
    } else {
        Err(MarketError::forbidden("Account is awaiting approval"))
    }
}

/// 本人或管理员
fn require_self_or_admin(actor: &User, user_id: &str) -> MarketResult<()> {
    if actor.id == user_id || actor.role.is_admin() {
        Ok(())
    } else {
        Err(MarketError::forbidden("Not allowed to access another user's account"))
    }
}

#[cfg(test)]
pub(crate) mod test_support;
