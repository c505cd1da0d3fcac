//! TripFin REST 客户端
//!
//! 所有端点都通过共享协议里的 [`ApiRequest`] 描述，`send` 负责路径、查询串、
//! Bearer token 与错误体解析，下面的方法只是给 UI 用的薄封装。

use crate::web::{HttpRequestBuilder, HttpResponse};
use rust_decimal::Decimal;
use tripfin_shared::filter::TripFilter;
use tripfin_shared::maturity::Defaulter;
use tripfin_shared::pagination::{Page, PageRequest};
use tripfin_shared::protocol::*;
use tripfin_shared::*;

#[derive(Clone, Debug, PartialEq)]
pub struct TripFinApi {
    pub base_url: String,
    pub token: Option<String>,
}

/// RFC 3986 unreserved 之外的字节全部转义
fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// 非 2xx 响应转成给用户看的消息
fn error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) => err.message,
        Err(_) if status == 0 => "Backend unreachable".to_string(),
        Err(_) => format!("Request failed ({})", status),
    }
}

impl TripFinApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url<T: ApiRequest>(&self, req: &T) -> String {
        let mut url = format!("{}{}", self.base_url, req.path());
        let query = req.query();
        if !query.is_empty() {
            let pairs: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{}={}", k, encode_component(v)))
                .collect();
            url.push('?');
            url.push_str(&pairs.join("&"));
        }
        url
    }

    async fn raw<T: ApiRequest>(&self, req: &T) -> Result<HttpResponse, String> {
        let mut builder = HttpRequestBuilder::new(T::METHOD, self.url(req));
        if let Some(token) = &self.token {
            builder = builder.header(HEADER_AUTHORIZATION, &format!("{}{}", BEARER_PREFIX, token));
        }
        if T::METHOD.has_body() {
            let body = serde_json::to_string(req).map_err(|e| e.to_string())?;
            builder = builder.json_body(body);
        }
        builder.send().await.map_err(|e| e.to_string())
    }

    pub async fn send<T: ApiRequest>(&self, req: &T) -> Result<T::Response, String> {
        let resp = self.raw(req).await?;
        if !resp.ok() {
            return Err(error_message(resp.status, &resp.body));
        }
        serde_json::from_str(&resp.body).map_err(|e| format!("Unexpected response: {}", e))
    }

    // =========================================================
    // Auth
    // =========================================================

    pub async fn signup(&self, req: SignupRequest) -> Result<AuthResponse, String> {
        self.send(&req).await
    }

    pub async fn login(&self, email: String, password: String) -> Result<AuthResponse, String> {
        self.send(&LoginRequest { email, password }).await
    }

    pub async fn logout(&self) -> Result<Ack, String> {
        self.send(&LogoutRequest {}).await
    }

    pub async fn me(&self) -> Result<Profile, String> {
        self.send(&MeRequest {}).await
    }

    // =========================================================
    // Wallet
    // =========================================================

    pub async fn wallet(&self, user_id: &str) -> Result<Wallet, String> {
        self.send(&GetWalletRequest {
            user_id: user_id.to_string(),
        })
        .await
    }

    pub async fn add_money(&self, user_id: &str, amount: Decimal) -> Result<Wallet, String> {
        self.send(&AddMoneyRequest {
            user_id: user_id.to_string(),
            amount,
        })
        .await
    }

    pub async fn withdraw(&self, user_id: &str, amount: Decimal) -> Result<Wallet, String> {
        self.send(&WithdrawRequest {
            user_id: user_id.to_string(),
            amount,
        })
        .await
    }

    pub async fn transactions(&self, user_id: &str, limit: usize) -> Result<Vec<Transaction>, String> {
        self.send(&ListTransactionsRequest {
            user_id: user_id.to_string(),
            limit: Some(limit),
        })
        .await
    }

    pub async fn repay(&self, trip_id: &str) -> Result<RepaymentReceipt, String> {
        self.send(&RepaymentRequest {
            trip_id: trip_id.to_string(),
        })
        .await
    }

    // =========================================================
    // Trips & bids
    // =========================================================

    pub async fn trips(&self, filter: TripFilter, page: PageRequest) -> Result<Page<Trip>, String> {
        self.send(&ListTripsRequest { filter, page }).await
    }

    pub async fn create_trip(&self, req: CreateTripRequest) -> Result<Trip, String> {
        self.send(&req).await
    }

    /// 207/400 也带报告，按报告解析
    pub async fn bulk_create(&self, drafts: Vec<CreateTripRequest>) -> Result<BulkCreateReport, String> {
        let resp = self.raw(&BulkCreateTripsRequest(drafts)).await?;
        serde_json::from_str::<BulkCreateReport>(&resp.body)
            .map_err(|_| error_message(resp.status, &resp.body))
    }

    pub async fn bulk_allot(&self) -> Result<BulkAllotReport, String> {
        self.send(&BulkAllotRequest {}).await
    }

    pub async fn bids(&self, trip_id: &str) -> Result<Vec<Bid>, String> {
        self.send(&ListBidsRequest {
            trip_id: trip_id.to_string(),
        })
        .await
    }

    pub async fn place_bid(&self, trip_id: &str, interest_rate: Decimal) -> Result<Bid, String> {
        self.send(&PlaceBidRequest {
            trip_id: trip_id.to_string(),
            amount: None,
            interest_rate,
        })
        .await
    }

    pub async fn allot(&self, trip_id: &str, bid_id: &str) -> Result<AllotmentReceipt, String> {
        self.send(&AllotBidRequest {
            trip_id: trip_id.to_string(),
            bid_id: bid_id.to_string(),
        })
        .await
    }

    pub async fn cancel_trip(&self, trip_id: &str, reason: Option<String>) -> Result<Trip, String> {
        self.send(&CancelTripRequest {
            trip_id: trip_id.to_string(),
            reason,
        })
        .await
    }

    pub async fn upload_document(
        &self,
        trip_id: &str,
        document_type: DocumentType,
        document_data: String,
    ) -> Result<TripDocument, String> {
        self.send(&UploadDocumentRequest {
            trip_id: trip_id.to_string(),
            document_type,
            document_data,
        })
        .await
    }

    pub async fn document(
        &self,
        trip_id: &str,
        document_type: DocumentType,
    ) -> Result<DocumentContent, String> {
        self.send(&GetDocumentRequest {
            trip_id: trip_id.to_string(),
            document_type,
        })
        .await
    }

    pub async fn start_transit(&self, trip_id: &str) -> Result<Trip, String> {
        self.send(&StartTransitRequest {
            trip_id: trip_id.to_string(),
        })
        .await
    }

    pub async fn complete_trip(&self, trip_id: &str) -> Result<Trip, String> {
        self.send(&CompleteTripRequest {
            trip_id: trip_id.to_string(),
        })
        .await
    }

    // =========================================================
    // Lender
    // =========================================================

    pub async fn investments(&self, lender_id: &str) -> Result<Vec<Investment>, String> {
        self.send(&ListInvestmentsRequest {
            lender_id: Some(lender_id.to_string()),
            status: None,
        })
        .await
    }

    pub async fn investment_stats(&self, lender_id: &str) -> Result<InvestmentStats, String> {
        self.send(&InvestmentStatsRequest {
            lender_id: lender_id.to_string(),
        })
        .await
    }

    // =========================================================
    // Ratings
    // =========================================================

    pub async fn pending_ratings(&self, user_id: &str) -> Result<Vec<Trip>, String> {
        self.send(&PendingRatingsRequest {
            user_id: user_id.to_string(),
        })
        .await
    }

    pub async fn rate(&self, trip_id: &str, rating: u8, review_text: Option<String>) -> Result<Rating, String> {
        self.send(&CreateRatingRequest {
            trip_id: trip_id.to_string(),
            rating,
            review_text,
        })
        .await
    }

    // =========================================================
    // Notifications
    // =========================================================

    pub async fn notifications(&self) -> Result<Vec<Notification>, String> {
        self.send(&ListNotificationsRequest {
            unread_only: false,
            limit: Some(DEFAULT_NOTIFICATION_LIMIT),
        })
        .await
    }

    pub async fn mark_read(&self, notification_id: &str) -> Result<Notification, String> {
        self.send(&MarkNotificationReadRequest {
            notification_id: notification_id.to_string(),
        })
        .await
    }

    pub async fn mark_all_read(&self) -> Result<MarkAllReadResult, String> {
        self.send(&MarkAllReadRequest {}).await
    }

    // =========================================================
    // Admin
    // =========================================================

    pub async fn pending_approvals(&self) -> Result<Vec<User>, String> {
        self.send(&PendingApprovalsRequest {}).await
    }

    pub async fn approve(&self, user_id: &str) -> Result<User, String> {
        self.send(&ApproveUserRequest {
            user_id: user_id.to_string(),
        })
        .await
    }

    pub async fn reject(&self, user_id: &str, reason: String) -> Result<User, String> {
        self.send(&RejectUserRequest {
            user_id: user_id.to_string(),
            reason,
        })
        .await
    }

    pub async fn defaulters(&self) -> Result<Vec<Defaulter>, String> {
        self.send(&DefaultersRequest {}).await
    }

    pub async fn fee_stats(&self) -> Result<FeeStats, String> {
        self.send(&PlatformFeeStatsRequest {}).await
    }
}
