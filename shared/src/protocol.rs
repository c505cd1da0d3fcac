//! REST API 协议定义
//!
//! 每个接口对应一个实现 [`ApiRequest`] 的请求类型。路径参数是
//! `#[serde(skip)]` 字段，由 URL 填入；列表接口的参数走查询串。

use crate::filter::TripFilter;
use crate::finance::RepaymentQuote;
use crate::maturity::Defaulter;
use crate::model::*;
use crate::pagination::{Page, PageRequest};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;

/// 运维密钥请求头 (定时清扫接口)
pub const HEADER_AUTH_KEY: &str = "X-Auth-Key";
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const BEARER_PREFIX: &str = "Bearer ";

/// HTTP Methods for API Requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

/// A trait that defines the request-response relationship and metadata for an API endpoint.
pub trait ApiRequest: Serialize + DeserializeOwned {
    /// The response type returned by this request.
    type Response: Serialize + DeserializeOwned;
    /// The URL path template, `:name` segments are path parameters.
    const PATH: &'static str;
    /// The HTTP method.
    const METHOD: HttpMethod;

    /// Concrete path with parameters substituted.
    fn path(&self) -> String {
        Self::PATH.to_string()
    }

    /// Query string parameters (GET list endpoints).
    fn query(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

/// 所有非 2xx 响应的错误体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], keys: &[&str]) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, v)| keys.contains(&k.as_str()) && !v.trim().is_empty())
        .map(|(_, v)| v.trim())
}

fn enum_from_str<T: DeserializeOwned>(value: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).ok()
}

fn enum_to_string<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_value(value).ok()? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    }
}

// =========================================================
// Auth
// =========================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl ApiRequest for SignupRequest {
    type Response = AuthResponse;
    const PATH: &'static str = "/api/auth/signup";
    const METHOD: HttpMethod = HttpMethod::Post;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl ApiRequest for LoginRequest {
    type Response = AuthResponse;
    const PATH: &'static str = "/api/auth/login";
    const METHOD: HttpMethod = HttpMethod::Post;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub wallet: Wallet,
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogoutRequest {}

impl ApiRequest for LogoutRequest {
    type Response = Ack;
    const PATH: &'static str = "/api/auth/logout";
    const METHOD: HttpMethod = HttpMethod::Post;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeRequest {}

impl ApiRequest for MeRequest {
    type Response = Profile;
    const PATH: &'static str = "/api/auth/me";
    const METHOD: HttpMethod = HttpMethod::Get;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user: User,
    pub wallet: Wallet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

impl ApiRequest for ChangeRoleRequest {
    type Response = User;
    const PATH: &'static str = "/api/auth/role";
    const METHOD: HttpMethod = HttpMethod::Put;
}

// =========================================================
// Users (admin)
// =========================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListUsersRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl ListUsersRequest {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            role: lookup(pairs, &["role"]).and_then(enum_from_str),
        }
    }
}

impl ApiRequest for ListUsersRequest {
    type Response = Vec<User>;
    const PATH: &'static str = "/api/users";
    const METHOD: HttpMethod = HttpMethod::Get;

    fn query(&self) -> Vec<(&'static str, String)> {
        self.role
            .iter()
            .map(|r| ("role", r.as_str().to_string()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingApprovalsRequest {}

impl ApiRequest for PendingApprovalsRequest {
    type Response = Vec<User>;
    const PATH: &'static str = "/api/users/pending-approvals";
    const METHOD: HttpMethod = HttpMethod::Get;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApproveUserRequest {
    #[serde(skip)]
    pub user_id: String,
}

impl ApiRequest for ApproveUserRequest {
    type Response = User;
    const PATH: &'static str = "/api/users/:id/approve";
    const METHOD: HttpMethod = HttpMethod::Put;

    fn path(&self) -> String {
        Self::PATH.replace(":id", &self.user_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RejectUserRequest {
    #[serde(skip)]
    pub user_id: String,
    pub reason: String,
}

impl ApiRequest for RejectUserRequest {
    type Response = User;
    const PATH: &'static str = "/api/users/:id/reject";
    const METHOD: HttpMethod = HttpMethod::Put;

    fn path(&self) -> String {
        Self::PATH.replace(":id", &self.user_id)
    }
}

// =========================================================
// Wallets & transactions
// =========================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetWalletRequest {
    #[serde(skip)]
    pub user_id: String,
}

impl ApiRequest for GetWalletRequest {
    type Response = Wallet;
    const PATH: &'static str = "/api/wallets/:userId";
    const METHOD: HttpMethod = HttpMethod::Get;

    fn path(&self) -> String {
        Self::PATH.replace(":userId", &self.user_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddMoneyRequest {
    #[serde(skip)]
    pub user_id: String,
    pub amount: Decimal,
}

impl ApiRequest for AddMoneyRequest {
    type Response = Wallet;
    const PATH: &'static str = "/api/wallets/:userId/add-money";
    const METHOD: HttpMethod = HttpMethod::Post;

    fn path(&self) -> String {
        Self::PATH.replace(":userId", &self.user_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WithdrawRequest {
    #[serde(skip)]
    pub user_id: String,
    pub amount: Decimal,
}

impl ApiRequest for WithdrawRequest {
    type Response = Wallet;
    const PATH: &'static str = "/api/wallets/:userId/withdraw";
    const METHOD: HttpMethod = HttpMethod::Post;

    fn path(&self) -> String {
        Self::PATH.replace(":userId", &self.user_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepaymentRequest {
    #[serde(alias = "trip_id")]
    pub trip_id: String,
}

impl ApiRequest for RepaymentRequest {
    type Response = RepaymentReceipt;
    const PATH: &'static str = "/api/wallets/repayment";
    const METHOD: HttpMethod = HttpMethod::Post;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepaymentReceipt {
    pub success: bool,
    pub trip: Trip,
    #[serde(alias = "repayment_details")]
    pub repayment_details: RepaymentQuote,
    #[serde(alias = "lender_wallet")]
    pub lender_wallet: Wallet,
    #[serde(alias = "borrower_wallet")]
    pub borrower_wallet: Wallet,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListTransactionsRequest {
    #[serde(skip)]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl ListTransactionsRequest {
    pub fn from_pairs(user_id: String, pairs: &[(String, String)]) -> Self {
        Self {
            user_id,
            limit: lookup(pairs, &["limit"]).and_then(|v| v.parse().ok()),
        }
    }
}

impl ApiRequest for ListTransactionsRequest {
    type Response = Vec<Transaction>;
    const PATH: &'static str = "/api/transactions/user/:userId";
    const METHOD: HttpMethod = HttpMethod::Get;

    fn path(&self) -> String {
        Self::PATH.replace(":userId", &self.user_id)
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        self.limit.iter().map(|l| ("limit", l.to_string())).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionStatsRequest {
    #[serde(skip)]
    pub user_id: String,
}

impl ApiRequest for TransactionStatsRequest {
    type Response = TransactionStats;
    const PATH: &'static str = "/api/transactions/user/:userId/stats";
    const METHOD: HttpMethod = HttpMethod::Get;

    fn path(&self) -> String {
        Self::PATH.replace(":userId", &self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStats {
    pub count: usize,
    #[serde(alias = "total_credits")]
    pub total_credits: Decimal,
    #[serde(alias = "total_debits")]
    pub total_debits: Decimal,
    #[serde(alias = "by_category")]
    pub by_category: BTreeMap<String, Decimal>,
}

// =========================================================
// Trips
// =========================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListTripsRequest {
    #[serde(flatten)]
    pub filter: TripFilter,
    #[serde(flatten)]
    pub page: PageRequest,
}

impl ListTripsRequest {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let page = PageRequest {
            page: lookup(pairs, &["page"])
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            page_size: lookup(pairs, &["pageSize", "page_size", "limit"])
                .and_then(|v| v.parse().ok())
                .unwrap_or(crate::pagination::DEFAULT_PAGE_SIZE),
        };
        Self {
            filter: TripFilter::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
            page: page.normalized(),
        }
    }
}

impl ApiRequest for ListTripsRequest {
    type Response = Page<Trip>;
    const PATH: &'static str = "/api/trips";
    const METHOD: HttpMethod = HttpMethod::Get;

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut pairs = self.filter.to_pairs();
        pairs.push(("page", self.page.page.to_string()));
        pairs.push(("pageSize", self.page.page_size.to_string()));
        pairs
    }
}

/// `POST /api/trips` 的请求体，CSV 每行也解析成它
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTripRequest {
    pub origin: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transporter: Option<String>,
    #[serde(alias = "eway_bill_number", default, skip_serializing_if = "Option::is_none")]
    pub eway_bill_number: Option<String>,
    #[serde(alias = "load_type")]
    pub load_type: String,
    #[serde(default)]
    pub weight: Decimal,
    #[serde(default)]
    pub distance: Decimal,
    pub amount: Decimal,
    #[serde(alias = "interest_rate")]
    pub interest_rate: Decimal,
    #[serde(alias = "maturity_days", default, skip_serializing_if = "Option::is_none")]
    pub maturity_days: Option<u32>,
    #[serde(alias = "risk_level", default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
}

impl ApiRequest for CreateTripRequest {
    type Response = Trip;
    const PATH: &'static str = "/api/trips";
    const METHOD: HttpMethod = HttpMethod::Post;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BulkCreateTripsRequest(pub Vec<CreateTripRequest>);

impl ApiRequest for BulkCreateTripsRequest {
    type Response = BulkCreateReport;
    const PATH: &'static str = "/api/trips/bulk";
    const METHOD: HttpMethod = HttpMethod::Post;
}

/// 批量操作中单项失败；批量分配时带上行程 id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkItemError {
    pub index: usize,
    #[serde(alias = "trip_id", default, skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BulkCreateReport {
    pub created: usize,
    pub failed: usize,
    pub trips: Vec<Trip>,
    pub errors: Vec<BulkItemError>,
}

impl BulkCreateReport {
    /// 全部成功 201，部分成功 207，全部失败 400
    pub fn http_status(&self) -> u16 {
        match (self.created, self.failed) {
            (0, _) => 400,
            (_, 0) => 201,
            _ => 207,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkAllotRequest {}

impl ApiRequest for BulkAllotRequest {
    type Response = BulkAllotReport;
    const PATH: &'static str = "/api/trips/allot-bulk";
    const METHOD: HttpMethod = HttpMethod::Post;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BulkAllotReport {
    pub allotted: usize,
    pub failed: usize,
    /// 放款成功的行程 id
    pub trips: Vec<String>,
    pub errors: Vec<BulkItemError>,
}

impl BulkAllotReport {
    /// 一行提示，列出跳过的行程
    pub fn summary(&self) -> String {
        let mut line = format!("{} trip(s) allotted, {} skipped", self.allotted, self.failed);
        let skipped: Vec<&str> = self
            .errors
            .iter()
            .filter_map(|e| e.trip_id.as_deref())
            .collect();
        if !skipped.is_empty() {
            line.push_str(&format!(" ({})", skipped.join(", ")));
        }
        line
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetTripRequest {
    #[serde(skip)]
    pub trip_id: String,
}

impl ApiRequest for GetTripRequest {
    type Response = Trip;
    const PATH: &'static str = "/api/trips/:id";
    const METHOD: HttpMethod = HttpMethod::Get;

    fn path(&self) -> String {
        Self::PATH.replace(":id", &self.trip_id)
    }
}

/// 部分更新，只有 pending 行程可以编辑
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTripRequest {
    #[serde(skip)]
    pub trip_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(alias = "load_type", default, skip_serializing_if = "Option::is_none")]
    pub load_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(alias = "interest_rate", default, skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<Decimal>,
    #[serde(alias = "maturity_days", default, skip_serializing_if = "Option::is_none")]
    pub maturity_days: Option<u32>,
    #[serde(alias = "risk_level", default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
}

impl ApiRequest for UpdateTripRequest {
    type Response = Trip;
    const PATH: &'static str = "/api/trips/:id";
    const METHOD: HttpMethod = HttpMethod::Put;

    fn path(&self) -> String {
        Self::PATH.replace(":id", &self.trip_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteTripRequest {
    #[serde(skip)]
    pub trip_id: String,
}

impl ApiRequest for DeleteTripRequest {
    type Response = Ack;
    const PATH: &'static str = "/api/trips/:id";
    const METHOD: HttpMethod = HttpMethod::Delete;

    fn path(&self) -> String {
        Self::PATH.replace(":id", &self.trip_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelTripRequest {
    #[serde(skip)]
    pub trip_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ApiRequest for CancelTripRequest {
    type Response = Trip;
    const PATH: &'static str = "/api/trips/:id/cancel";
    const METHOD: HttpMethod = HttpMethod::Post;

    fn path(&self) -> String {
        Self::PATH.replace(":id", &self.trip_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListBidsRequest {
    #[serde(skip)]
    pub trip_id: String,
}

impl ApiRequest for ListBidsRequest {
    type Response = Vec<Bid>;
    const PATH: &'static str = "/api/trips/:id/bids";
    const METHOD: HttpMethod = HttpMethod::Get;

    fn path(&self) -> String {
        Self::PATH.replace(":id", &self.trip_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBidRequest {
    #[serde(skip)]
    pub trip_id: String,
    /// 缺省为行程全额
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(alias = "interest_rate")]
    pub interest_rate: Decimal,
}

impl ApiRequest for PlaceBidRequest {
    type Response = Bid;
    const PATH: &'static str = "/api/trips/:id/bids";
    const METHOD: HttpMethod = HttpMethod::Post;

    fn path(&self) -> String {
        Self::PATH.replace(":id", &self.trip_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllotBidRequest {
    #[serde(skip)]
    pub trip_id: String,
    #[serde(alias = "bid_id")]
    pub bid_id: String,
}

impl ApiRequest for AllotBidRequest {
    type Response = AllotmentReceipt;
    const PATH: &'static str = "/api/trips/:id/allot";
    const METHOD: HttpMethod = HttpMethod::Post;

    fn path(&self) -> String {
        Self::PATH.replace(":id", &self.trip_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllotmentReceipt {
    pub trip: Trip,
    pub investment: Investment,
    #[serde(alias = "platform_fee")]
    pub platform_fee: PlatformFee,
    pub agreement: LoanAgreement,
    #[serde(alias = "borrower_wallet")]
    pub borrower_wallet: Wallet,
    /// 退还给落选放款方的出价数
    #[serde(alias = "refunded_bids")]
    pub refunded_bids: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDocumentRequest {
    #[serde(skip)]
    pub trip_id: String,
    #[serde(alias = "document_type")]
    pub document_type: DocumentType,
    #[serde(alias = "document_data")]
    pub document_data: String,
}

impl ApiRequest for UploadDocumentRequest {
    type Response = TripDocument;
    const PATH: &'static str = "/api/trips/:id/documents";
    const METHOD: HttpMethod = HttpMethod::Post;

    fn path(&self) -> String {
        Self::PATH.replace(":id", &self.trip_id)
    }
}

/// 单据内容：`GET /api/trips/:id/documents?type=bilty`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDocumentRequest {
    #[serde(skip)]
    pub trip_id: String,
    #[serde(alias = "document_type")]
    pub document_type: DocumentType,
}

impl GetDocumentRequest {
    pub fn from_pairs(trip_id: String, pairs: &[(String, String)]) -> Option<Self> {
        let document_type = lookup(pairs, &["type", "documentType", "document_type"])
            .and_then(DocumentType::from_str_opt)?;
        Some(Self {
            trip_id,
            document_type,
        })
    }
}

impl ApiRequest for GetDocumentRequest {
    type Response = DocumentContent;
    const PATH: &'static str = "/api/trips/:id/documents";
    const METHOD: HttpMethod = HttpMethod::Get;

    fn path(&self) -> String {
        Self::PATH.replace(":id", &self.trip_id)
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        vec![("type", self.document_type.as_str().to_string())]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartTransitRequest {
    #[serde(skip)]
    pub trip_id: String,
}

impl ApiRequest for StartTransitRequest {
    type Response = Trip;
    const PATH: &'static str = "/api/trips/:id/start";
    const METHOD: HttpMethod = HttpMethod::Post;

    fn path(&self) -> String {
        Self::PATH.replace(":id", &self.trip_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteTripRequest {
    #[serde(skip)]
    pub trip_id: String,
}

impl ApiRequest for CompleteTripRequest {
    type Response = Trip;
    const PATH: &'static str = "/api/trips/:id/complete";
    const METHOD: HttpMethod = HttpMethod::Post;

    fn path(&self) -> String {
        Self::PATH.replace(":id", &self.trip_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepaymentQuoteRequest {
    #[serde(skip)]
    pub trip_id: String,
}

impl ApiRequest for RepaymentQuoteRequest {
    type Response = RepaymentQuote;
    const PATH: &'static str = "/api/trips/:id/repayment-quote";
    const METHOD: HttpMethod = HttpMethod::Get;

    fn path(&self) -> String {
        Self::PATH.replace(":id", &self.trip_id)
    }
}

// =========================================================
// Investments & loan agreements
// =========================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInvestmentsRequest {
    #[serde(alias = "lender_id", default, skip_serializing_if = "Option::is_none")]
    pub lender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<InvestmentStatus>,
}

impl ListInvestmentsRequest {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            lender_id: lookup(pairs, &["lenderId", "lender_id"]).map(str::to_string),
            status: lookup(pairs, &["status"]).and_then(enum_from_str),
        }
    }
}

impl ApiRequest for ListInvestmentsRequest {
    type Response = Vec<Investment>;
    const PATH: &'static str = "/api/investments";
    const METHOD: HttpMethod = HttpMethod::Get;

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = &self.lender_id {
            pairs.push(("lenderId", id.clone()));
        }
        if let Some(status) = self.status.as_ref().and_then(enum_to_string) {
            pairs.push(("status", status));
        }
        pairs
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestmentStatsRequest {
    #[serde(skip)]
    pub lender_id: String,
}

impl ApiRequest for InvestmentStatsRequest {
    type Response = InvestmentStats;
    const PATH: &'static str = "/api/investments/stats/:lenderId";
    const METHOD: HttpMethod = HttpMethod::Get;

    fn path(&self) -> String {
        Self::PATH.replace(":lenderId", &self.lender_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentStats {
    #[serde(alias = "active_count")]
    pub active_count: usize,
    #[serde(alias = "completed_count")]
    pub completed_count: usize,
    #[serde(alias = "escrowed_count")]
    pub escrowed_count: usize,
    #[serde(alias = "defaulted_count")]
    pub defaulted_count: usize,
    #[serde(alias = "total_invested")]
    pub total_invested: Decimal,
    #[serde(alias = "total_returns")]
    pub total_returns: Decimal,
    #[serde(alias = "expected_returns")]
    pub expected_returns: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAgreementsRequest {
    #[serde(alias = "trip_id", default, skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
    #[serde(alias = "bid_id", default, skip_serializing_if = "Option::is_none")]
    pub bid_id: Option<String>,
    #[serde(alias = "lender_id", default, skip_serializing_if = "Option::is_none")]
    pub lender_id: Option<String>,
    #[serde(alias = "borrower_id", default, skip_serializing_if = "Option::is_none")]
    pub borrower_id: Option<String>,
}

impl ListAgreementsRequest {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let get = |keys: &[&str]| lookup(pairs, keys).map(str::to_string);
        Self {
            trip_id: get(&["tripId", "trip_id"]),
            bid_id: get(&["bidId", "bid_id"]),
            lender_id: get(&["lenderId", "lender_id"]),
            borrower_id: get(&["borrowerId", "borrower_id"]),
        }
    }

    pub fn matches(&self, agreement: &LoanAgreement) -> bool {
        let eq = |want: &Option<String>, have: &str| want.as_deref().is_none_or(|w| w == have);
        eq(&self.trip_id, &agreement.trip_id)
            && eq(&self.bid_id, &agreement.bid_id)
            && eq(&self.lender_id, &agreement.lender_id)
            && eq(&self.borrower_id, &agreement.borrower_id)
    }
}

impl ApiRequest for ListAgreementsRequest {
    type Response = Vec<LoanAgreement>;
    const PATH: &'static str = "/api/loan-agreements";
    const METHOD: HttpMethod = HttpMethod::Get;

    fn query(&self) -> Vec<(&'static str, String)> {
        [
            ("tripId", &self.trip_id),
            ("bidId", &self.bid_id),
            ("lenderId", &self.lender_id),
            ("borrowerId", &self.borrower_id),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.clone().map(|v| (k, v)))
        .collect()
    }
}

// =========================================================
// Ratings
// =========================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRatingRequest {
    #[serde(alias = "trip_id")]
    pub trip_id: String,
    pub rating: u8,
    #[serde(alias = "review_text", default, skip_serializing_if = "Option::is_none")]
    pub review_text: Option<String>,
}

impl ApiRequest for CreateRatingRequest {
    type Response = Rating;
    const PATH: &'static str = "/api/ratings";
    const METHOD: HttpMethod = HttpMethod::Post;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LenderRatingsRequest {
    #[serde(skip)]
    pub lender_id: String,
}

impl ApiRequest for LenderRatingsRequest {
    type Response = LenderRatings;
    const PATH: &'static str = "/api/ratings/lender/:lenderId";
    const METHOD: HttpMethod = HttpMethod::Get;

    fn path(&self) -> String {
        Self::PATH.replace(":lenderId", &self.lender_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LenderRatings {
    pub ratings: Vec<Rating>,
    /// 平均分保留一位小数，无评分时为 0
    pub average: Decimal,
    pub count: usize,
    /// `by_star[0]` 是 1 星数量，`by_star[4]` 是 5 星
    #[serde(alias = "by_star")]
    pub by_star: [usize; 5],
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingRatingsRequest {
    #[serde(skip)]
    pub user_id: String,
}

impl ApiRequest for PendingRatingsRequest {
    type Response = Vec<Trip>;
    const PATH: &'static str = "/api/ratings/pending/:userId";
    const METHOD: HttpMethod = HttpMethod::Get;

    fn path(&self) -> String {
        Self::PATH.replace(":userId", &self.user_id)
    }
}

// =========================================================
// Notifications
// =========================================================

/// 通知列表默认条数
pub const DEFAULT_NOTIFICATION_LIMIT: usize = 50;
pub const MAX_NOTIFICATION_LIMIT: usize = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotificationsRequest {
    #[serde(alias = "unread_only", default)]
    pub unread_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl ListNotificationsRequest {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            unread_only: lookup(pairs, &["unreadOnly", "unread_only"])
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            limit: lookup(pairs, &["limit"]).and_then(|v| v.parse().ok()),
        }
    }

    /// 缺省取默认值，超出上限截断，0 按 1 处理
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_NOTIFICATION_LIMIT)
            .clamp(1, MAX_NOTIFICATION_LIMIT)
    }
}

impl ApiRequest for ListNotificationsRequest {
    type Response = Vec<Notification>;
    const PATH: &'static str = "/api/notifications";
    const METHOD: HttpMethod = HttpMethod::Get;

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if self.unread_only {
            pairs.push(("unreadOnly", "true".to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkNotificationReadRequest {
    #[serde(skip)]
    pub notification_id: String,
}

impl ApiRequest for MarkNotificationReadRequest {
    type Response = Notification;
    const PATH: &'static str = "/api/notifications/:id/read";
    const METHOD: HttpMethod = HttpMethod::Put;

    fn path(&self) -> String {
        Self::PATH.replace(":id", &self.notification_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkAllReadRequest {}

impl ApiRequest for MarkAllReadRequest {
    type Response = MarkAllReadResult;
    const PATH: &'static str = "/api/notifications/read-all";
    const METHOD: HttpMethod = HttpMethod::Put;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MarkAllReadResult {
    pub updated: usize,
}

// =========================================================
// Platform fees & administration
// =========================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPlatformFeesRequest {}

impl ApiRequest for ListPlatformFeesRequest {
    type Response = Vec<PlatformFee>;
    const PATH: &'static str = "/api/platform-fees";
    const METHOD: HttpMethod = HttpMethod::Get;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformFeeStatsRequest {}

impl ApiRequest for PlatformFeeStatsRequest {
    type Response = FeeStats;
    const PATH: &'static str = "/api/platform-fees/stats";
    const METHOD: HttpMethod = HttpMethod::Get;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FeeStats {
    #[serde(alias = "total_fees")]
    pub total_fees: Decimal,
    pub count: usize,
    #[serde(alias = "total_loan_volume")]
    pub total_loan_volume: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultersRequest {}

impl ApiRequest for DefaultersRequest {
    type Response = Vec<Defaulter>;
    const PATH: &'static str = "/api/admin/defaulters";
    const METHOD: HttpMethod = HttpMethod::Get;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepDefaultsRequest {}

impl ApiRequest for SweepDefaultsRequest {
    type Response = SweepReport;
    const PATH: &'static str = "/api/admin/sweep";
    const METHOD: HttpMethod = HttpMethod::Post;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// 本次新转为违约的行程
    #[serde(alias = "newly_defaulted")]
    pub newly_defaulted: Vec<String>,
    #[serde(alias = "overdue_total")]
    pub overdue_total: usize,
    /// 本次删除的过期会话数
    #[serde(alias = "sessions_purged", default)]
    pub sessions_purged: usize,
    /// 本次清理的旧通知数
    #[serde(alias = "notifications_pruned", default)]
    pub notifications_pruned: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_allot_summary_lists_skipped_trips() {
        let report = BulkAllotReport {
            allotted: 2,
            failed: 1,
            trips: vec!["t1".into(), "t2".into()],
            errors: vec![BulkItemError {
                index: 2,
                trip_id: Some("t3".into()),
                error: "Trip t3 has no bids".into(),
            }],
        };
        assert_eq!(report.summary(), "2 trip(s) allotted, 1 skipped (t3)");
        assert_eq!(
            BulkAllotReport::default().summary(),
            "0 trip(s) allotted, 0 skipped"
        );
    }

    #[test]
    fn path_parameters_are_substituted() {
        let req = PlaceBidRequest {
            trip_id: "trip-9".into(),
            ..Default::default()
        };
        assert_eq!(req.path(), "/api/trips/trip-9/bids");
        let req = GetWalletRequest {
            user_id: "u1".into(),
        };
        assert_eq!(req.path(), "/api/wallets/u1");
    }

    #[test]
    fn path_fields_stay_out_of_the_body() {
        let req = AllotBidRequest {
            trip_id: "t1".into(),
            bid_id: "b1".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({ "bidId": "b1" }));
        let back: AllotBidRequest = serde_json::from_str(r#"{"bid_id":"b2"}"#).unwrap();
        assert_eq!(back.bid_id, "b2");
        assert!(back.trip_id.is_empty());
    }

    #[test]
    fn list_trips_query_round_trip() {
        let pairs: Vec<(String, String)> = vec![
            ("status".into(), "pending".into()),
            ("page".into(), "3".into()),
            ("pageSize".into(), "20".into()),
        ];
        let req = ListTripsRequest::from_pairs(&pairs);
        assert_eq!(req.filter.status, Some(TripStatus::Pending));
        assert_eq!(req.page, PageRequest::new(3, 20));

        let query: Vec<(String, String)> = req
            .query()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let again = ListTripsRequest::from_pairs(&query);
        assert_eq!(again.filter, req.filter);
        assert_eq!(again.page, req.page);
    }

    #[test]
    fn bulk_status_codes() {
        let mut report = BulkCreateReport {
            created: 3,
            ..Default::default()
        };
        assert_eq!(report.http_status(), 201);
        report.failed = 1;
        assert_eq!(report.http_status(), 207);
        report.created = 0;
        assert_eq!(report.http_status(), 400);
    }

    #[test]
    fn investment_query_uses_wire_names() {
        let req = ListInvestmentsRequest {
            lender_id: Some("l1".into()),
            status: Some(InvestmentStatus::Active),
        };
        assert_eq!(
            req.query(),
            vec![("lenderId", "l1".to_string()), ("status", "active".to_string())]
        );
        let pairs: Vec<(String, String)> = vec![("status".into(), "escrowed".into())];
        assert_eq!(
            ListInvestmentsRequest::from_pairs(&pairs).status,
            Some(InvestmentStatus::Escrowed)
        );
    }

    #[test]
    fn notification_limit_is_clamped() {
        let pairs: Vec<(String, String)> = vec![("limit".into(), "500".into())];
        let req = ListNotificationsRequest::from_pairs(&pairs);
        assert_eq!(req.effective_limit(), MAX_NOTIFICATION_LIMIT);
        assert_eq!(
            ListNotificationsRequest::default().effective_limit(),
            DEFAULT_NOTIFICATION_LIMIT
        );
        let zero = ListNotificationsRequest {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.effective_limit(), 1);
        assert_eq!(zero.query(), vec![("limit", "0".to_string())]);
    }

    #[test]
    fn document_request_reads_type_from_query() {
        let pairs: Vec<(String, String)> = vec![("type".into(), "final_invoice".into())];
        let req = GetDocumentRequest::from_pairs("t1".into(), &pairs).unwrap();
        assert_eq!(req.document_type, DocumentType::FinalInvoice);
        assert_eq!(req.path(), "/api/trips/t1/documents");
        assert_eq!(req.query(), vec![("type", "final_invoice".to_string())]);
        assert!(GetDocumentRequest::from_pairs("t1".into(), &[]).is_none());
    }
}
