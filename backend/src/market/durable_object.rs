use super::Marketplace;
use super::adapter::{WorkerClock, WorkerEnv, WorkerStorage};
use super::config::MarketConfig;
use crate::error::MarketError;
use crate::utils::rpc::{Authed, RpcHandler, route_of};
use tripfin_shared::protocol::*;
use worker::*;

/// 先校验会话再执行业务：`with_user!(req, market, |user, call: T| { ... })`
///
/// 路径参数从 `call.target` 取，请求体在 `call.body`。
macro_rules! with_user {
    ($req:expr, $market:expr, |$user:ident, $call:ident: $ty:ty| $body:block) => {
        RpcHandler::handle($req, |$call: Authed<$ty>| async move {
            let $user = $market.authenticate($call.token()).await?;
            $body
        })
        .await
    };
}

/// 整个市场的唯一状态持有者
///
/// 所有写操作在同一个 Durable Object 中串行执行，余额检查与扣款之间不会被其它请求插入。
#[durable_object]
pub struct MarketplaceStore {
    state: State,
    env: Env,
}

impl MarketplaceStore {
    fn market(&self) -> Marketplace<WorkerStorage, WorkerClock> {
        Marketplace::new(
            WorkerStorage(self.state.storage()),
            MarketConfig::from_env(&WorkerEnv(&self.env)),
            WorkerClock,
        )
    }
}

impl DurableObject for MarketplaceStore {
    fn new(state: State, env: Env) -> Self {
        Self { state, env }
    }

    async fn fetch(&self, req: Request) -> Result<Response> {
        let owned = self.market();
        let market = &owned;

        let (method, path) = route_of(&req);
        let Some(method) = method else {
            return Response::error("Missing method header", 400);
        };

        use HttpMethod::{Delete, Get, Post, Put};
        match (method, path.as_str()) {
            // =========================================================
            // Auth
            // =========================================================
            // 新会话需要定期清扫来回收
            (Post, SignupRequest::PATH) => {
                RpcHandler::handle(req, |c: Authed<SignupRequest>| async move {
                    let auth = market.signup(c.body).await?;
                    market.ensure_sweep_scheduled().await?;
                    Ok::<_, MarketError>(auth)
                })
                .await
            }
            (Post, LoginRequest::PATH) => {
                RpcHandler::handle(req, |c: Authed<LoginRequest>| async move {
                    let auth = market.login(c.body).await?;
                    market.ensure_sweep_scheduled().await?;
                    Ok::<_, MarketError>(auth)
                })
                .await
            }
            (Post, LogoutRequest::PATH) => {
                RpcHandler::handle(req, |c: Authed<LogoutRequest>| async move {
                    market.logout(c.token()).await
                })
                .await
            }
            (Get, MeRequest::PATH) => {
                with_user!(req, market, |user, call: MeRequest| { market.profile(&user).await })
            }
            (Put, ChangeRoleRequest::PATH) => {
                with_user!(req, market, |user, call: ChangeRoleRequest| {
                    market.change_role(&user, call.body.role).await
                })
            }

            // =========================================================
            // Users (admin)
            // =========================================================
            (Get, ListUsersRequest::PATH) => {
                with_user!(req, market, |user, call: ListUsersRequest| {
                    market.list_users(&user, call.body.role).await
                })
            }
            (Get, PendingApprovalsRequest::PATH) => {
                with_user!(req, market, |user, call: PendingApprovalsRequest| {
                    market.pending_approvals(&user).await
                })
            }
            (Put, ApproveUserRequest::PATH) => {
                with_user!(req, market, |user, call: ApproveUserRequest| {
                    market.approve_user(&user, &call.target).await
                })
            }
            (Put, RejectUserRequest::PATH) => {
                with_user!(req, market, |user, call: RejectUserRequest| {
                    market.reject_user(&user, &call.target, &call.body.reason).await
                })
            }

            // =========================================================
            // Wallets & transactions
            // =========================================================
            (Get, GetWalletRequest::PATH) => {
                with_user!(req, market, |user, call: GetWalletRequest| {
                    market.get_wallet(&user, &call.target).await
                })
            }
            (Post, AddMoneyRequest::PATH) => {
                with_user!(req, market, |user, call: AddMoneyRequest| {
                    market.add_money(&user, &call.target, call.body.amount).await
                })
            }
            (Post, WithdrawRequest::PATH) => {
                with_user!(req, market, |user, call: WithdrawRequest| {
                    market.withdraw_money(&user, &call.target, call.body.amount).await
                })
            }
            (Post, RepaymentRequest::PATH) => {
                with_user!(req, market, |user, call: RepaymentRequest| {
                    market.repay(&user, &call.body.trip_id).await
                })
            }
            (Get, ListTransactionsRequest::PATH) => {
                with_user!(req, market, |user, call: ListTransactionsRequest| {
                    market.list_transactions(&user, &call.target, call.body).await
                })
            }
            (Get, TransactionStatsRequest::PATH) => {
                with_user!(req, market, |user, call: TransactionStatsRequest| {
                    market.user_transaction_stats(&user, &call.target).await
                })
            }

            // =========================================================
            // Trips & bids
            // =========================================================
            (Get, ListTripsRequest::PATH) => {
                with_user!(req, market, |_user, call: ListTripsRequest| {
                    market.list_trips(call.body).await
                })
            }
            (Post, CreateTripRequest::PATH) => {
                with_user!(req, market, |user, call: CreateTripRequest| {
                    market.create_trip(&user, call.body).await
                })
            }
            (Post, BulkCreateTripsRequest::PATH) => {
                with_user!(req, market, |user, call: BulkCreateTripsRequest| {
                    market.bulk_create(&user, call.body.0).await
                })
            }
            (Post, BulkAllotRequest::PATH) => {
                with_user!(req, market, |user, call: BulkAllotRequest| {
                    let report = market.bulk_allot(&user).await?;
                    if report.allotted > 0 {
                        market.ensure_sweep_scheduled().await?;
                    }
                    Ok::<_, MarketError>(report)
                })
            }
            (Get, GetTripRequest::PATH) => {
                with_user!(req, market, |_user, call: GetTripRequest| {
                    market.get_trip(&call.target).await
                })
            }
            (Put, UpdateTripRequest::PATH) => {
                with_user!(req, market, |user, call: UpdateTripRequest| {
                    let mut body = call.body;
                    body.trip_id = call.target;
                    market.update_trip(&user, body).await
                })
            }
            (Delete, DeleteTripRequest::PATH) => {
                with_user!(req, market, |user, call: DeleteTripRequest| {
                    market.delete_trip(&user, &call.target).await
                })
            }
            (Post, CancelTripRequest::PATH) => {
                with_user!(req, market, |user, call: CancelTripRequest| {
                    let mut body = call.body;
                    body.trip_id = call.target;
                    market.cancel_trip(&user, body).await
                })
            }
            (Get, ListBidsRequest::PATH) => {
                with_user!(req, market, |_user, call: ListBidsRequest| {
                    market.list_bids(&call.target).await
                })
            }
            (Post, PlaceBidRequest::PATH) => {
                with_user!(req, market, |user, call: PlaceBidRequest| {
                    let mut body = call.body;
                    body.trip_id = call.target;
                    market.place_bid(&user, body).await
                })
            }
            (Post, AllotBidRequest::PATH) => {
                with_user!(req, market, |user, call: AllotBidRequest| {
                    let mut body = call.body;
                    body.trip_id = call.target;
                    let receipt = market.allot(&user, body).await?;
                    market.ensure_sweep_scheduled().await?;
                    Ok::<_, MarketError>(receipt)
                })
            }
            (Post, UploadDocumentRequest::PATH) => {
                with_user!(req, market, |user, call: UploadDocumentRequest| {
                    let mut body = call.body;
                    body.trip_id = call.target;
                    market.upload_document(&user, body).await
                })
            }
            (Get, GetDocumentRequest::PATH) => {
                with_user!(req, market, |user, call: GetDocumentRequest| {
                    market
                        .get_document(&user, &call.target, call.body.document_type)
                        .await
                })
            }
            (Post, StartTransitRequest::PATH) => {
                with_user!(req, market, |user, call: StartTransitRequest| {
                    market.start_transit(&user, &call.target).await
                })
            }
            (Post, CompleteTripRequest::PATH) => {
                with_user!(req, market, |user, call: CompleteTripRequest| {
                    market.complete_trip(&user, &call.target).await
                })
            }
            (Get, RepaymentQuoteRequest::PATH) => {
                with_user!(req, market, |_user, call: RepaymentQuoteRequest| {
                    market.repayment_quote(&call.target).await
                })
            }

            // =========================================================
            // Investments, agreements, ratings
            // =========================================================
            (Get, ListInvestmentsRequest::PATH) => {
                with_user!(req, market, |user, call: ListInvestmentsRequest| {
                    market.list_investments(&user, call.body).await
                })
            }
            (Get, InvestmentStatsRequest::PATH) => {
                with_user!(req, market, |user, call: InvestmentStatsRequest| {
                    market.investment_stats(&user, &call.target).await
                })
            }
            (Get, ListAgreementsRequest::PATH) => {
                with_user!(req, market, |user, call: ListAgreementsRequest| {
                    market.list_agreements(&user, call.body).await
                })
            }
            (Post, CreateRatingRequest::PATH) => {
                with_user!(req, market, |user, call: CreateRatingRequest| {
                    market.rate(&user, call.body).await
                })
            }
            (Get, LenderRatingsRequest::PATH) => {
                with_user!(req, market, |_user, call: LenderRatingsRequest| {
                    market.lender_ratings(&call.target).await
                })
            }
            (Get, PendingRatingsRequest::PATH) => {
                with_user!(req, market, |user, call: PendingRatingsRequest| {
                    market.pending_ratings(&user, &call.target).await
                })
            }

            // =========================================================
            // Notifications
            // =========================================================
            (Get, ListNotificationsRequest::PATH) => {
                with_user!(req, market, |user, call: ListNotificationsRequest| {
                    market.notifications(&user, &call.body).await
                })
            }
            (Put, MarkNotificationReadRequest::PATH) => {
                with_user!(req, market, |user, call: MarkNotificationReadRequest| {
                    market.mark_read(&user, &call.target).await
                })
            }
            (Put, MarkAllReadRequest::PATH) => {
                with_user!(req, market, |user, call: MarkAllReadRequest| {
                    market.mark_all_read(&user).await
                })
            }

            // =========================================================
            // Platform fees & administration
            // =========================================================
            (Get, ListPlatformFeesRequest::PATH) => {
                with_user!(req, market, |user, call: ListPlatformFeesRequest| {
                    market.platform_fees(&user).await
                })
            }
            (Get, PlatformFeeStatsRequest::PATH) => {
                with_user!(req, market, |user, call: PlatformFeeStatsRequest| {
                    market.fee_stats(&user).await
                })
            }
            (Get, DefaultersRequest::PATH) => {
                with_user!(req, market, |user, call: DefaultersRequest| {
                    market.defaulters(&user).await
                })
            }
            // Ops 密钥已在 Worker 层校验
            (Post, SweepDefaultsRequest::PATH) => {
                RpcHandler::handle(req, |_: Authed<SweepDefaultsRequest>| market.run_maintenance()).await
            }

            _ => Response::error("Not Found", 404),
        }
    }

    async fn alarm(&self) -> Result<Response> {
        // 失败时 on_alarm 已挂上重试 alarm；返回错误让运行时也按退避重试
        match self.market().on_alarm().await {
            Ok(report) => {
                log_info!(
                    "[alarm] sweep done: {} newly defaulted, {} overdue, {} sessions purged, {} notifications pruned",
                    report.newly_defaulted.len(),
                    report.overdue_total,
                    report.sessions_purged,
                    report.notifications_pruned
                );
                Response::ok("Ack")
            }
            Err(e) => {
                log_error!("[alarm] maintenance failed [{}]: {}", e.error_code(), e);
                Err(Error::RustError(e.to_string()))
            }
        }
    }
}
