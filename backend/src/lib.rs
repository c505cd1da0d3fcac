use serde::{Serialize, de::DeserializeOwned};
use worker::*;

// =========================================================
// 日志宏 (必须在 mod 声明之前定义)
// =========================================================

#[cfg(target_arch = "wasm32")]
macro_rules! log_info { ($($t:tt)*) => (worker::console_log!($($t)*)) }
#[cfg(not(target_arch = "wasm32"))]
macro_rules! log_info { ($($t:tt)*) => (println!($($t)*)) }

#[cfg(target_arch = "wasm32")]
macro_rules! log_warn { ($($t:tt)*) => (worker::console_warn!($($t)*)) }
#[cfg(not(target_arch = "wasm32"))]
macro_rules! log_warn { ($($t:tt)*) => (eprintln!($($t)*)) }

#[cfg(target_arch = "wasm32")]
macro_rules! log_error { ($($t:tt)*) => (worker::console_error!($($t)*)) }
#[cfg(not(target_arch = "wasm32"))]
macro_rules! log_error { ($($t:tt)*) => (eprintln!($($t)*)) }

#[cfg(target_arch = "wasm32")]
#[global_allocator]
static ALLOCATOR: talc::TalckWasm = unsafe { talc::TalckWasm::new_global() };

pub mod error;
pub mod market;

pub(crate) mod utils {
    pub mod rpc;
    pub mod secret;
}

use error::{MarketError, MarketResult};
use tripfin_shared::protocol::*;
use utils::rpc::{Authed, RpcClient};
use utils::secret::constant_time_eq;

// =========================================================
// 常量定义
// =========================================================
const DEFAULT_MARKET_BINDING: &str = "MARKETPLACE_STORE";
const DEFAULT_SECRET_VAR_NAME: &str = "ADMIN_SECRET";
/// 全局唯一的 MarketplaceStore 实例名
const MARKET_INSTANCE: &str = "default";
const RPC_BASE_URL: &str = "http://market";

// =========================================================
// 响应处理
// =========================================================

fn map_error_to_response(e: MarketError) -> Result<Response> {
    let status = e.status_code();

    // 5xx 记录完整追踪，客户端只看到通用消息
    if status >= 500 {
        log_error!("Internal Error [{}]: {}", e.error_code(), e);
    }

    Ok(Response::from_json(&e.to_body())?.with_status(status))
}

fn json_response<T: Serialize>(value: &T, status: u16) -> Result<Response> {
    Ok(Response::from_json(value)?.with_status(status))
}

// 统一响应宏
macro_rules! respond {
    ($status:expr, $expr:expr) => {
        match $expr {
            Ok(v) => json_response(&v, $status),
            Err(e) => map_error_to_response(e),
        }
    };
}

// =========================================================
// 运行时配置与鉴权
// =========================================================

struct RuntimeConfig {
    market_binding: String,
    admin_secret_name: String,
}

impl RuntimeConfig {
    fn new(env: &Env) -> Self {
        Self {
            market_binding: env
                .var("MARKET_BINDING")
                .map(|v| v.to_string())
                .unwrap_or_else(|_| DEFAULT_MARKET_BINDING.to_string()),
            admin_secret_name: env
                .var("ADMIN_SECRET_NAME")
                .map(|v| v.to_string())
                .unwrap_or_else(|_| DEFAULT_SECRET_VAR_NAME.to_string()),
        }
    }
}

/// Ops 端点 (定时清扫) 使用共享密钥，不走用户会话
fn ensure_ops_auth(req: &Request, env: &Env, config: &RuntimeConfig) -> MarketResult<()> {
    let auth_header = req
        .headers()
        .get(HEADER_AUTH_KEY)
        .map_err(|e| MarketError::invalid_input(e.to_string()))?
        .unwrap_or_default();
    let secret = env
        .secret(&config.admin_secret_name)
        .map(|s| s.to_string())
        .unwrap_or_default();

    if secret.is_empty() || !constant_time_eq(&auth_header, &secret) {
        return Err(MarketError::unauthorized("Invalid Secret"));
    }
    Ok(())
}

// =========================================================
// 请求转发 (Worker -> MarketplaceStore)
// =========================================================

/// 从 REST 请求中取出的调用要素
struct Incoming {
    token: Option<String>,
    target: String,
    query: Vec<(String, String)>,
    body: String,
}

impl Incoming {
    async fn read(req: &mut Request, ctx: &RouteContext<()>, param: Option<&str>) -> MarketResult<Self> {
        let token = req
            .headers()
            .get(HEADER_AUTHORIZATION)?
            .and_then(|h| h.strip_prefix(BEARER_PREFIX).map(|t| t.trim().to_string()))
            .filter(|t| !t.is_empty());

        let target = match param {
            Some(name) => ctx.param(name).cloned().ok_or_else(|| {
                MarketError::invalid_input(format!("Missing path parameter: {}", name))
            })?,
            None => String::new(),
        };

        let query = req
            .url()?
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let body = match req.method() {
            Method::Post | Method::Put => req.text().await?,
            _ => String::new(),
        };

        Ok(Self {
            token,
            target,
            query,
            body,
        })
    }

    /// 空请求体按 `{}` 处理，只有路径参数的请求也能解析
    fn json<T: DeserializeOwned>(&self) -> MarketResult<T> {
        let text = if self.body.trim().is_empty() {
            "{}"
        } else {
            self.body.as_str()
        };
        serde_json::from_str(text)
            .map_err(|e| MarketError::serialization(format!("Invalid JSON Body: {}", e)))
    }
}

async fn forward<T: ApiRequest>(env: &Env, incoming: Incoming, body: T) -> MarketResult<T::Response> {
    let cfg = RuntimeConfig::new(env);
    let namespace = env
        .durable_object(&cfg.market_binding)
        .map_err(|e| MarketError::from(e).in_op_with("worker.binding", cfg.market_binding.as_str()))?;
    let stub = namespace
        .id_from_name(MARKET_INSTANCE)?
        .get_stub()
        .map_err(|e| MarketError::from(e).in_op("worker.stub"))?;

    RpcClient::new(stub, RPC_BASE_URL)
        .send(&Authed::new(incoming.token, incoming.target, body))
        .await
}

/// 读取请求、构造强类型请求体并转发
async fn call<T: ApiRequest>(
    mut req: Request,
    ctx: &RouteContext<()>,
    param: Option<&str>,
    build: impl FnOnce(&Incoming) -> MarketResult<T>,
) -> MarketResult<T::Response> {
    let incoming = Incoming::read(&mut req, ctx, param).await?;
    let body = build(&incoming)?;
    forward(&ctx.env, incoming, body).await
}

/// 生成一个转发路由的 handler
///
/// `to_market!(Type, param, status)` 从 JSON 请求体构造；
/// `to_market!(Type, param, status, |incoming| ...)` 自定义构造 (查询参数)。
macro_rules! to_market {
    ($ty:ty, $param:expr, $status:expr) => {
        to_market!($ty, $param, $status, Incoming::json)
    };
    ($ty:ty, $param:expr, $status:expr, $build:expr) => {
        |req: Request, ctx: RouteContext<()>| async move {
            respond!($status, call::<$ty>(req, &ctx, $param, $build).await)
        }
    };
}

// =========================================================
// API Controllers (特殊状态码 / 额外鉴权)
// =========================================================

async fn bulk_create_trips(req: Request, ctx: RouteContext<()>) -> Result<Response> {
    match call::<BulkCreateTripsRequest>(req, &ctx, None, Incoming::json).await {
        Ok(report) => json_response(&report, report.http_status()),
        Err(e) => map_error_to_response(e),
    }
}

async fn sweep_defaults(req: Request, ctx: RouteContext<()>) -> Result<Response> {
    let cfg = RuntimeConfig::new(&ctx.env);
    if let Err(e) = ensure_ops_auth(&req, &ctx.env, &cfg) {
        return map_error_to_response(e);
    }

    let result = call::<SweepDefaultsRequest>(req, &ctx, None, Incoming::json).await;
    if let Ok(report) = &result {
        log_info!(
            "[ops] sweep: {} newly defaulted, {} overdue, {} sessions purged",
            report.newly_defaulted.len(),
            report.overdue_total,
            report.sessions_purged
        );
    }
    respond!(200, result)
}

async fn health(_: Request, _: RouteContext<()>) -> Result<Response> {
    json_response(&serde_json::json!({ "status": "ok", "service": "tripfin" }), 200)
}

// =========================================================
// Entry Points
// =========================================================

#[event(fetch)]
pub async fn main(req: Request, env: Env, _ctx: Context) -> Result<Response> {
    console_error_panic_hook::set_once();

    let cors = Cors::new()
        .with_origins(vec!["*"])
        .with_methods(vec![
            Method::Get,
            Method::Post,
            Method::Put,
            Method::Delete,
            Method::Options,
        ])
        .with_allowed_headers(vec!["Content-Type", HEADER_AUTHORIZATION, HEADER_AUTH_KEY]);

    // 预检请求统一放行
    if req.method() == Method::Options {
        return Response::empty()?.with_cors(&cors);
    }

    const ID: Option<&str> = Some("id");
    const USER_ID: Option<&str> = Some("userId");
    const LENDER_ID: Option<&str> = Some("lenderId");

    let router = Router::new();
    router
        .get_async("/api/health", health)
        // --- auth ---
        .post_async(SignupRequest::PATH, to_market!(SignupRequest, None, 201))
        .post_async(LoginRequest::PATH, to_market!(LoginRequest, None, 200))
        .post_async(LogoutRequest::PATH, to_market!(LogoutRequest, None, 200))
        .get_async(MeRequest::PATH, to_market!(MeRequest, None, 200))
        .put_async(ChangeRoleRequest::PATH, to_market!(ChangeRoleRequest, None, 200))
        // --- users ---
        .get_async(
            ListUsersRequest::PATH,
            to_market!(ListUsersRequest, None, 200, |i: &Incoming| Ok(
                ListUsersRequest::from_pairs(&i.query)
            )),
        )
        .get_async(
            PendingApprovalsRequest::PATH,
            to_market!(PendingApprovalsRequest, None, 200),
        )
        .put_async(ApproveUserRequest::PATH, to_market!(ApproveUserRequest, ID, 200))
        .put_async(RejectUserRequest::PATH, to_market!(RejectUserRequest, ID, 200))
        // --- wallets & transactions ---
        .get_async(GetWalletRequest::PATH, to_market!(GetWalletRequest, USER_ID, 200))
        .post_async(AddMoneyRequest::PATH, to_market!(AddMoneyRequest, USER_ID, 200))
        .post_async(WithdrawRequest::PATH, to_market!(WithdrawRequest, USER_ID, 200))
        .post_async(RepaymentRequest::PATH, to_market!(RepaymentRequest, None, 200))
        .get_async(
            ListTransactionsRequest::PATH,
            to_market!(ListTransactionsRequest, USER_ID, 200, |i: &Incoming| Ok(
                ListTransactionsRequest::from_pairs(i.target.clone(), &i.query)
            )),
        )
        .get_async(
            TransactionStatsRequest::PATH,
            to_market!(TransactionStatsRequest, USER_ID, 200),
        )
        // --- trips & bids ---
        .get_async(
            ListTripsRequest::PATH,
            to_market!(ListTripsRequest, None, 200, |i: &Incoming| Ok(
                ListTripsRequest::from_pairs(&i.query)
            )),
        )
        .post_async(CreateTripRequest::PATH, to_market!(CreateTripRequest, None, 201))
        .post_async(BulkCreateTripsRequest::PATH, bulk_create_trips)
        .post_async(BulkAllotRequest::PATH, to_market!(BulkAllotRequest, None, 200))
        .get_async(GetTripRequest::PATH, to_market!(GetTripRequest, ID, 200))
        .put_async(UpdateTripRequest::PATH, to_market!(UpdateTripRequest, ID, 200))
        .delete_async(DeleteTripRequest::PATH, to_market!(DeleteTripRequest, ID, 200))
        .post_async(CancelTripRequest::PATH, to_market!(CancelTripRequest, ID, 200))
        .get_async(ListBidsRequest::PATH, to_market!(ListBidsRequest, ID, 200))
        .post_async(PlaceBidRequest::PATH, to_market!(PlaceBidRequest, ID, 201))
        .post_async(AllotBidRequest::PATH, to_market!(AllotBidRequest, ID, 200))
        .post_async(
            UploadDocumentRequest::PATH,
            to_market!(UploadDocumentRequest, ID, 201),
        )
        .get_async(
            GetDocumentRequest::PATH,
            to_market!(GetDocumentRequest, ID, 200, |i: &Incoming| {
                GetDocumentRequest::from_pairs(i.target.clone(), &i.query)
                    .ok_or_else(|| MarketError::invalid_input("Unknown or missing document type"))
            }),
        )
        .post_async(StartTransitRequest::PATH, to_market!(StartTransitRequest, ID, 200))
        .post_async(CompleteTripRequest::PATH, to_market!(CompleteTripRequest, ID, 200))
        .get_async(
            RepaymentQuoteRequest::PATH,
            to_market!(RepaymentQuoteRequest, ID, 200),
        )
        // --- investments, agreements, ratings ---
        .get_async(
            ListInvestmentsRequest::PATH,
            to_market!(ListInvestmentsRequest, None, 200, |i: &Incoming| Ok(
                ListInvestmentsRequest::from_pairs(&i.query)
            )),
        )
        .get_async(
            InvestmentStatsRequest::PATH,
            to_market!(InvestmentStatsRequest, LENDER_ID, 200),
        )
        .get_async(
            ListAgreementsRequest::PATH,
            to_market!(ListAgreementsRequest, None, 200, |i: &Incoming| Ok(
                ListAgreementsRequest::from_pairs(&i.query)
            )),
        )
        .post_async(CreateRatingRequest::PATH, to_market!(CreateRatingRequest, None, 201))
        .get_async(
            LenderRatingsRequest::PATH,
            to_market!(LenderRatingsRequest, LENDER_ID, 200),
        )
        .get_async(
            PendingRatingsRequest::PATH,
            to_market!(PendingRatingsRequest, USER_ID, 200),
        )
        // --- notifications ---
        .get_async(
            ListNotificationsRequest::PATH,
            to_market!(ListNotificationsRequest, None, 200, |i: &Incoming| Ok(
                ListNotificationsRequest::from_pairs(&i.query)
            )),
        )
        .put_async(
            MarkNotificationReadRequest::PATH,
            to_market!(MarkNotificationReadRequest, ID, 200),
        )
        .put_async(MarkAllReadRequest::PATH, to_market!(MarkAllReadRequest, None, 200))
        // --- fees & administration ---
        .get_async(
            ListPlatformFeesRequest::PATH,
            to_market!(ListPlatformFeesRequest, None, 200),
        )
        .get_async(
            PlatformFeeStatsRequest::PATH,
            to_market!(PlatformFeeStatsRequest, None, 200),
        )
        .get_async(DefaultersRequest::PATH, to_market!(DefaultersRequest, None, 200))
        .post_async(SweepDefaultsRequest::PATH, sweep_defaults)
        .run(req, env)
        .await?
        .with_cors(&cors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incoming(body: &str) -> Incoming {
        Incoming {
            token: None,
            target: "t1".into(),
            query: Vec::new(),
            body: body.into(),
        }
    }

    #[test]
    fn empty_body_parses_as_empty_object() {
        let req: GetTripRequest = incoming("  ").json().unwrap();
        assert!(req.trip_id.is_empty());
        let req: AllotBidRequest = incoming(r#"{"bidId":"b1"}"#).json().unwrap();
        assert_eq!(req.bid_id, "b1");
    }

    #[test]
    fn malformed_body_is_a_client_error() {
        let err = incoming("{not json").json::<AllotBidRequest>().unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.message().starts_with("Invalid JSON Body"));
    }
}
