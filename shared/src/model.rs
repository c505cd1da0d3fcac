//! 领域模型 (Domain Models)
//!
//! 线上格式为 camelCase；多词字段输入时也接受 snake_case 写法，
//! 旧客户端两种都会发。

use crate::date::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =========================================================
// 用户与角色
// =========================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[serde(alias = "shipper")]
    LoadOwner,
    #[serde(alias = "load_agent")]
    Transporter,
    Lender,
    Admin,
    SuperAdmin,
}

impl Role {
    /// 可以发布行程、接受放款的角色
    pub fn is_borrower(&self) -> bool {
        matches!(self, Role::LoadOwner | Role::Transporter)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::LoadOwner => "load_owner",
            Role::Transporter => "transporter",
            Role::Lender => "lender",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::LoadOwner => "Load Owner",
            Role::Transporter => "Transporter",
            Role::Lender => "Lender",
            Role::Admin => "Admin",
            Role::SuperAdmin => "Super Admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// 对外展示的编号，形如 `USR000042`
    #[serde(alias = "user_id")]
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(alias = "approval_status", default)]
    pub approval_status: ApprovalStatus,
    #[serde(alias = "rejection_reason", default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(alias = "approved_by", default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(alias = "created_at")]
    pub created_at: Timestamp,
}

impl User {
    pub fn is_approved(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved
    }
}

// =========================================================
// 行程 (Trip)
// =========================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Pending,
    Escrowed,
    Funded,
    InTransit,
    Completed,
    Repaid,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Pending => "pending",
            TripStatus::Escrowed => "escrowed",
            TripStatus::Funded => "funded",
            TripStatus::InTransit => "in_transit",
            TripStatus::Completed => "completed",
            TripStatus::Repaid => "repaid",
            TripStatus::Cancelled => "cancelled",
        }
    }

    /// 放款后、还款前的状态：贷款处于存续期
    pub fn is_outstanding(&self) -> bool {
        matches!(
            self,
            TripStatus::Funded | TripStatus::InTransit | TripStatus::Completed
        )
    }

    /// 仍然接受出价的状态
    pub fn accepts_bids(&self) -> bool {
        matches!(self, TripStatus::Pending | TripStatus::Escrowed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Bilty,
    #[serde(alias = "eway_bill")]
    Ewaybill,
    AdvanceInvoice,
    Pod,
    FinalInvoice,
}

impl DocumentType {
    pub const ALL: [DocumentType; 5] = [
        DocumentType::Bilty,
        DocumentType::Ewaybill,
        DocumentType::AdvanceInvoice,
        DocumentType::Pod,
        DocumentType::FinalInvoice,
    ];

    /// 发车前必须上传的单据
    pub const DISPATCH: [DocumentType; 2] = [DocumentType::Bilty, DocumentType::Ewaybill];

    /// 结案前必须上传的单据
    pub const DELIVERY: [DocumentType; 2] = [DocumentType::Pod, DocumentType::FinalInvoice];

    /// 线上名称，与 serde 一致
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Bilty => "bilty",
            DocumentType::Ewaybill => "ewaybill",
            DocumentType::AdvanceInvoice => "advance_invoice",
            DocumentType::Pod => "pod",
            DocumentType::FinalInvoice => "final_invoice",
        }
    }

    pub fn from_str_opt(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        if value == "eway_bill" {
            return Some(DocumentType::Ewaybill);
        }
        Self::ALL.into_iter().find(|k| k.as_str() == value)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::Bilty => "Bilty",
            DocumentType::Ewaybill => "E-Way Bill",
            DocumentType::AdvanceInvoice => "Advance Invoice",
            DocumentType::Pod => "Proof of Delivery",
            DocumentType::FinalInvoice => "Final Invoice",
        }
    }
}

/// 单据内容上限，按 data URL 字节数计
pub const MAX_DOCUMENT_BYTES: usize = 2 * 1024 * 1024;

/// 取 data URL 的 MIME 类型，例如 `data:application/pdf;base64,...` -> `application/pdf`
pub fn data_url_mime(data: &str) -> Option<&str> {
    let header = data.strip_prefix("data:")?.split(',').next()?;
    let mime = header.split(';').next()?.trim();
    (!mime.is_empty()).then_some(mime)
}

/// 行程上只保存单据的元信息，内容单独存放
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDocument {
    #[serde(alias = "document_type")]
    pub document_type: DocumentType,
    #[serde(alias = "content_type", default)]
    pub content_type: String,
    /// 内容字节数
    #[serde(default)]
    pub size: usize,
    /// 内容的存储版本，每次上传递增
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub chunks: usize,
    #[serde(alias = "uploaded_by")]
    pub uploaded_by: String,
    #[serde(alias = "uploaded_at")]
    pub uploaded_at: Timestamp,
}

/// 单据完整内容，只在单独请求时返回
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContent {
    #[serde(alias = "document_type")]
    pub document_type: DocumentType,
    #[serde(alias = "content_type", default)]
    pub content_type: String,
    #[serde(alias = "document_data")]
    pub document_data: String,
    #[serde(alias = "uploaded_at")]
    pub uploaded_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: String,
    #[serde(alias = "trip_id")]
    pub trip_id: String,
    #[serde(alias = "lender_id")]
    pub lender_id: String,
    #[serde(alias = "lender_name")]
    pub lender_name: String,
    pub amount: Decimal,
    #[serde(alias = "interest_rate")]
    pub interest_rate: Decimal,
    #[serde(alias = "created_at")]
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
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
    pub weight: Decimal,
    pub distance: Decimal,
    pub amount: Decimal,
    #[serde(alias = "interest_rate")]
    pub interest_rate: Decimal,
    #[serde(alias = "maturity_days")]
    pub maturity_days: u32,
    #[serde(alias = "risk_level", default)]
    pub risk_level: RiskLevel,
    pub status: TripStatus,
    #[serde(alias = "load_owner_id")]
    pub load_owner_id: String,
    #[serde(alias = "load_owner_name")]
    pub load_owner_name: String,
    #[serde(alias = "lender_id", default, skip_serializing_if = "Option::is_none")]
    pub lender_id: Option<String>,
    #[serde(alias = "lender_name", default, skip_serializing_if = "Option::is_none")]
    pub lender_name: Option<String>,
    #[serde(default)]
    pub bids: Vec<Bid>,
    #[serde(default)]
    pub documents: Vec<TripDocument>,
    #[serde(alias = "has_rating", default)]
    pub has_rating: bool,
    #[serde(alias = "created_at")]
    pub created_at: Timestamp,
    #[serde(alias = "funded_at", default, skip_serializing_if = "Option::is_none")]
    pub funded_at: Option<Timestamp>,
    #[serde(alias = "completed_at", default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    #[serde(alias = "repaid_at", default, skip_serializing_if = "Option::is_none")]
    pub repaid_at: Option<Timestamp>,
}

impl Trip {
    pub fn document(&self, kind: DocumentType) -> Option<&TripDocument> {
        self.documents.iter().find(|d| d.document_type == kind)
    }

    pub fn has_documents(&self, kinds: &[DocumentType]) -> bool {
        kinds.iter().all(|k| self.document(*k).is_some())
    }

    /// 缺失的单据类型，按 `kinds` 的顺序
    pub fn missing_documents(&self, kinds: &[DocumentType]) -> Vec<DocumentType> {
        kinds
            .iter()
            .copied()
            .filter(|k| self.document(*k).is_none())
            .collect()
    }

    /// 同一类型只保留一份：新上传的替换旧的
    pub fn put_document(&mut self, doc: TripDocument) {
        self.documents.retain(|d| d.document_type != doc.document_type);
        self.documents.push(doc);
    }

    pub fn bid(&self, bid_id: &str) -> Option<&Bid> {
        self.bids.iter().find(|b| b.id == bid_id)
    }

    /// 最早的出价（批量分配时的中标者）
    pub fn earliest_bid(&self) -> Option<&Bid> {
        self.bids.iter().min_by_key(|b| b.created_at)
    }

    pub fn route_label(&self) -> String {
        format!("{} → {}", self.origin, self.destination)
    }
}

// =========================================================
// 投资、钱包与流水
// =========================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentStatus {
    Escrowed,
    Active,
    Completed,
    Defaulted,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investment {
    pub id: String,
    #[serde(alias = "lender_id")]
    pub lender_id: String,
    #[serde(alias = "trip_id")]
    pub trip_id: String,
    #[serde(alias = "bid_id")]
    pub bid_id: String,
    pub amount: Decimal,
    #[serde(alias = "interest_rate")]
    pub interest_rate: Decimal,
    #[serde(alias = "expected_return")]
    pub expected_return: Decimal,
    pub status: InvestmentStatus,
    #[serde(alias = "maturity_date")]
    pub maturity_date: Timestamp,
    #[serde(alias = "invested_at")]
    pub invested_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    #[serde(alias = "user_id")]
    pub user_id: String,
    pub balance: Decimal,
    #[serde(alias = "locked_amount", default)]
    pub locked_amount: Decimal,
    #[serde(alias = "escrowed_amount", default)]
    pub escrowed_amount: Decimal,
    #[serde(alias = "total_invested", default)]
    pub total_invested: Decimal,
    #[serde(alias = "total_returns", default)]
    pub total_returns: Decimal,
}

impl Wallet {
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionCategory {
    Investment,
    Return,
    Payment,
    Refund,
    Fee,
    Withdrawal,
    Deposit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Decimal,
    pub category: TransactionCategory,
    pub description: String,
    #[serde(alias = "balance_after")]
    pub balance_after: Decimal,
    pub timestamp: Timestamp,
}

// =========================================================
// 平台费、借款协议、评分、通知
// =========================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformFee {
    pub id: String,
    #[serde(alias = "trip_id")]
    pub trip_id: String,
    #[serde(alias = "lender_id")]
    pub lender_id: String,
    #[serde(alias = "borrower_id")]
    pub borrower_id: String,
    #[serde(alias = "loan_amount")]
    pub loan_amount: Decimal,
    #[serde(alias = "fee_percentage")]
    pub fee_percentage: Decimal,
    #[serde(alias = "fee_amount")]
    pub fee_amount: Decimal,
    #[serde(alias = "collected_at")]
    pub collected_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementStatus {
    Active,
    Closed,
    Defaulted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanAgreement {
    pub id: String,
    #[serde(alias = "trip_id")]
    pub trip_id: String,
    #[serde(alias = "bid_id")]
    pub bid_id: String,
    #[serde(alias = "lender_id")]
    pub lender_id: String,
    #[serde(alias = "borrower_id")]
    pub borrower_id: String,
    #[serde(alias = "loan_amount")]
    pub loan_amount: Decimal,
    #[serde(alias = "interest_rate")]
    pub interest_rate: Decimal,
    #[serde(alias = "maturity_days")]
    pub maturity_days: u32,
    #[serde(alias = "contract_terms")]
    pub contract_terms: String,
    pub status: AgreementStatus,
    #[serde(alias = "created_at")]
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: String,
    #[serde(alias = "trip_id")]
    pub trip_id: String,
    #[serde(alias = "lender_id")]
    pub lender_id: String,
    #[serde(alias = "lender_name")]
    pub lender_name: String,
    #[serde(alias = "borrower_id")]
    pub borrower_id: String,
    #[serde(alias = "borrower_name")]
    pub borrower_name: String,
    pub rating: u8,
    #[serde(alias = "review_text", default, skip_serializing_if = "Option::is_none")]
    pub review_text: Option<String>,
    #[serde(alias = "loan_amount")]
    pub loan_amount: Decimal,
    #[serde(alias = "interest_rate")]
    pub interest_rate: Decimal,
    #[serde(alias = "created_at")]
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    InvestmentOpportunity,
    BidReceived,
    BidAllotted,
    BidRefunded,
    RepaymentReceived,
    LoanOverdue,
    AccountApproved,
    AccountRejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub priority: NotificationPriority,
    #[serde(alias = "action_url", default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(alias = "created_at")]
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn trip_accepts_snake_case_fields() {
        let json = r#"{
            "id": "t1",
            "origin": "Mumbai",
            "destination": "Pune",
            "load_type": "Steel",
            "weight": 12,
            "distance": 150,
            "amount": "45000",
            "interest_rate": 12.5,
            "maturity_days": 30,
            "status": "in_transit",
            "load_owner_id": "u1",
            "load_owner_name": "Ravi",
            "created_at": 1000
        }"#;
        let trip: Trip = serde_json::from_str(json).unwrap();
        assert_eq!(trip.load_type, "Steel");
        assert_eq!(trip.interest_rate, dec!(12.5));
        assert_eq!(trip.status, TripStatus::InTransit);
        assert_eq!(trip.risk_level, RiskLevel::Low);
        assert!(trip.bids.is_empty());
    }

    #[test]
    fn role_aliases() {
        let role: Role = serde_json::from_str("\"shipper\"").unwrap();
        assert_eq!(role, Role::LoadOwner);
        let role: Role = serde_json::from_str("\"load_agent\"").unwrap();
        assert_eq!(role, Role::Transporter);
        assert_eq!(serde_json::to_string(&Role::SuperAdmin).unwrap(), "\"super_admin\"");
    }

    #[test]
    fn put_document_replaces_same_type() {
        let mut trip: Trip = serde_json::from_str(
            r#"{"id":"t","origin":"A","destination":"B","loadType":"x","weight":1,
                "distance":1,"amount":20000,"interestRate":10,"maturityDays":30,
                "status":"funded","loadOwnerId":"o","loadOwnerName":"O","createdAt":0}"#,
        )
        .unwrap();
        let doc = |version: u64| TripDocument {
            document_type: DocumentType::Pod,
            content_type: "application/pdf".into(),
            size: 10,
            version,
            chunks: 1,
            uploaded_by: "o".into(),
            uploaded_at: Timestamp::new(1),
        };
        trip.put_document(doc(1));
        trip.put_document(doc(2));
        assert_eq!(trip.documents.len(), 1);
        assert_eq!(trip.document(DocumentType::Pod).unwrap().version, 2);
        assert_eq!(
            trip.missing_documents(&DocumentType::DELIVERY),
            vec![DocumentType::FinalInvoice]
        );
    }

    #[test]
    fn document_type_names_match_serde() {
        for kind in DocumentType::ALL {
            let wire = serde_json::to_value(kind).unwrap();
            assert_eq!(wire.as_str(), Some(kind.as_str()));
            assert_eq!(DocumentType::from_str_opt(kind.as_str()), Some(kind));
        }
        assert_eq!(DocumentType::from_str_opt("EWAY_BILL"), Some(DocumentType::Ewaybill));
        assert_eq!(DocumentType::from_str_opt("passport"), None);
    }

    #[test]
    fn data_url_mime_type() {
        assert_eq!(data_url_mime("data:application/pdf;base64,AAAA"), Some("application/pdf"));
        assert_eq!(data_url_mime("data:image/png,xyz"), Some("image/png"));
        assert_eq!(data_url_mime("data:;base64,AAAA"), None);
        assert_eq!(data_url_mime("https://example.com/a.pdf"), None);
    }
}
