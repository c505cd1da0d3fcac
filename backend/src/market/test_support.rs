//! 测试公共夹具：内存存储 + 固定时钟 + 常用账户

use super::Marketplace;
use super::adapter::tests::{MockClock, MockStorage};
use super::config::MarketConfig;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::rc::Rc;
use tripfin_shared::protocol::{CreateTripRequest, ListNotificationsRequest, SignupRequest};
use tripfin_shared::{ApprovalStatus, Role, Timestamp, Trip, User};

pub type TestMarket = Marketplace<MockStorage, Rc<MockClock>>;

pub const SUPER_ADMIN_EMAIL: &str = "root@tripfin.test";
pub const TEST_HASH_ROUNDS: u32 = 64;

/// 2024-01-01 09:00 UTC
pub fn start() -> Timestamp {
    let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    Timestamp::from_date(day).add_hours(9)
}

pub fn market() -> (TestMarket, Rc<MockClock>) {
    market_with(MarketConfig {
        super_admin_email: Some(SUPER_ADMIN_EMAIL.to_string()),
        // 测试里降低 PBKDF2 轮数，否则每次注册都很慢
        password_hash_rounds: TEST_HASH_ROUNDS,
        ..MarketConfig::default()
    })
}

pub fn market_with(config: MarketConfig) -> (TestMarket, Rc<MockClock>) {
    let clock = Rc::new(MockClock::at(start()));
    let market = Marketplace::new(MockStorage::new(), config, clock.clone());
    (market, clock)
}

pub fn signup_request(role: Role, name: &str) -> SignupRequest {
    SignupRequest {
        email: format!("{}@example.com", name.to_lowercase()),
        password: "secret-pass".to_string(),
        name: name.to_string(),
        phone: "9800000000".to_string(),
        role: Some(role),
        company: None,
    }
}

/// 注册但不改变审核状态
pub async fn registered(market: &TestMarket, role: Role, name: &str) -> User {
    market.signup(signup_request(role, name)).await.unwrap().user
}

/// 注册并直接写成已审核
pub async fn approved(market: &TestMarket, role: Role, name: &str) -> User {
    let mut user = registered(market, role, name).await;
    if user.approval_status != ApprovalStatus::Approved {
        user.approval_status = ApprovalStatus::Approved;
        market.save_user(&user).await.unwrap();
    }
    user
}

pub async fn admin(market: &TestMarket) -> User {
    let mut req = signup_request(Role::LoadOwner, "root");
    req.email = SUPER_ADMIN_EMAIL.to_string();
    market.signup(req).await.unwrap().user
}

pub async fn funded(market: &TestMarket, role: Role, name: &str, balance: Decimal) -> User {
    let user = approved(market, role, name).await;
    market.deposit(&user.id, balance, "seed").await.unwrap();
    user
}

pub fn draft(amount: Decimal, rate: Decimal) -> CreateTripRequest {
    CreateTripRequest {
        origin: "Mumbai".to_string(),
        destination: "Pune".to_string(),
        sender: Some("Acme Textiles".to_string()),
        receiver: Some("Globex Retail".to_string()),
        transporter: None,
        eway_bill_number: Some("EWB1001".to_string()),
        load_type: "Textiles".to_string(),
        weight: Decimal::new(12, 0),
        distance: Decimal::new(150, 0),
        amount,
        interest_rate: rate,
        maturity_days: Some(30),
        risk_level: None,
    }
}

pub async fn posted_trip(market: &TestMarket, owner: &User, amount: Decimal, rate: Decimal) -> Trip {
    market.create_trip(owner, draft(amount, rate)).await.unwrap()
}

pub fn all_notes() -> ListNotificationsRequest {
    ListNotificationsRequest::default()
}

pub fn unread_notes() -> ListNotificationsRequest {
    ListNotificationsRequest {
        unread_only: true,
        limit: None,
    }
}
