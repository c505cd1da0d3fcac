//! 行程生命周期：发布 → 出价托管 → 分配放款 → 运输 → 完成
//!
//! 所有跨钱包的资金移动都在同一次 Durable Object 调用里完成。
//! 状态不允许的操作返回 409。

use super::adapter::{Clock, StorageAdapter};
use super::{Marketplace, keys, require_approved};
use crate::error::{MarketError, MarketResult};
use rust_decimal::Decimal;
use tripfin_shared::finance::{self, format_inr};
use tripfin_shared::pagination::{Page, paginate};
use tripfin_shared::protocol::{
    Ack, AllotBidRequest, AllotmentReceipt, BulkAllotReport, BulkCreateReport, BulkItemError,
    CancelTripRequest, CreateTripRequest, ListTripsRequest, PlaceBidRequest, UpdateTripRequest,
};
use tripfin_shared::{
    AgreementStatus, Bid, DocumentType, Investment, InvestmentStatus, LoanAgreement,
    NotificationPriority, NotificationType, PlatformFee, Role, TransactionCategory, Trip,
    TripStatus, User,
};

fn require_owner(actor: &User, trip: &Trip) -> MarketResult<()> {
    if actor.id == trip.load_owner_id {
        Ok(())
    } else {
        Err(MarketError::forbidden("Only the trip owner can do this"))
    }
}

pub(super) fn require_owner_or_admin(actor: &User, trip: &Trip) -> MarketResult<()> {
    if actor.id == trip.load_owner_id || actor.role.is_admin() {
        Ok(())
    } else {
        Err(MarketError::forbidden("Only the trip owner or an admin can do this"))
    }
}

fn require_borrower(actor: &User) -> MarketResult<()> {
    require_approved(actor)?;
    if actor.role.is_borrower() {
        Ok(())
    } else {
        Err(MarketError::forbidden("Only load owners and transporters can post trips"))
    }
}

fn required_text(value: &str, field: &str) -> MarketResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(MarketError::invalid_input(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn non_negative(value: Decimal, field: &str) -> MarketResult<Decimal> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(MarketError::invalid_input(format!("{} cannot be negative", field)));
    }
    Ok(value)
}

fn check_terms(amount: Decimal, rate: Decimal, maturity_days: u32) -> MarketResult<()> {
    finance::validate_loan_amount(amount).map_err(MarketError::invalid_input)?;
    finance::validate_interest_rate(rate).map_err(MarketError::invalid_input)?;
    if maturity_days == 0 {
        return Err(MarketError::invalid_input("Maturity days must be greater than zero"));
    }
    Ok(())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn document_names(kinds: &[DocumentType]) -> String {
    kinds.iter().map(|k| k.label()).collect::<Vec<_>>().join(", ")
}

impl<S, C> Marketplace<S, C>
where
    S: StorageAdapter,
    C: Clock,
{
    // =========================================================
    // 发布与查询
    // =========================================================

    pub async fn create_trip(&self, actor: &User, req: CreateTripRequest) -> MarketResult<Trip> {
        require_borrower(actor)?;
        let maturity_days = req.maturity_days.unwrap_or(self.config.default_maturity_days);
        check_terms(req.amount, req.interest_rate, maturity_days)?;

        let trip = Trip {
            id: Self::new_id(),
            origin: required_text(&req.origin, "Origin")?,
            destination: required_text(&req.destination, "Destination")?,
            sender: trimmed(req.sender),
            receiver: trimmed(req.receiver),
            transporter: trimmed(req.transporter),
            eway_bill_number: trimmed(req.eway_bill_number),
            load_type: required_text(&req.load_type, "Load type")?,
            weight: non_negative(req.weight, "Weight")?,
            distance: non_negative(req.distance, "Distance")?,
            amount: req.amount,
            interest_rate: req.interest_rate,
            maturity_days,
            risk_level: req.risk_level.unwrap_or_default(),
            status: TripStatus::Pending,
            load_owner_id: actor.id.clone(),
            load_owner_name: actor.name.clone(),
            lender_id: None,
            lender_name: None,
            bids: Vec::new(),
            documents: Vec::new(),
            has_rating: false,
            created_at: self.now(),
            funded_at: None,
            completed_at: None,
            repaid_at: None,
        };
        self.save_trip(&trip).await?;

        let lenders: Vec<User> = self
            .all_users()
            .await?
            .into_iter()
            .filter(|u| u.role == Role::Lender)
            .collect();
        for lender in &lenders {
            self.notify(
                &lender.id,
                NotificationType::InvestmentOpportunity,
                "New Investment Opportunity Available",
                format!(
                    "New investment opportunity: {}, {} at {}% interest",
                    trip.route_label(),
                    format_inr(trip.amount),
                    trip.interest_rate
                ),
                NotificationPriority::High,
                Some(format!("/trips/{}", trip.id)),
            )
            .await?;
        }

        log_info!(
            "[trips] created trip={} owner={} amount={} notified={}",
            trip.id,
            actor.user_id,
            trip.amount,
            lenders.len()
        );
        Ok(trip)
    }

    /// 逐条创建，单条失败不影响其它条目
    pub async fn bulk_create(&self, actor: &User, drafts: Vec<CreateTripRequest>) -> MarketResult<BulkCreateReport> {
        require_borrower(actor)?;
        let mut report = BulkCreateReport::default();
        for (index, draft) in drafts.into_iter().enumerate() {
            match self.create_trip(actor, draft).await {
                Ok(trip) => {
                    report.created += 1;
                    report.trips.push(trip);
                }
                Err(e) if e.status_code() < 500 => {
                    report.failed += 1;
                    report.errors.push(BulkItemError {
                        index,
                        trip_id: None,
                        error: e.message().to_string(),
                    });
                }
                Err(e) => return Err(e.in_op("trips.bulk_create")),
            }
        }
        log_info!(
            "[trips] bulk create owner={} created={} failed={}",
            actor.user_id,
            report.created,
            report.failed
        );
        Ok(report)
    }

    pub async fn get_trip(&self, trip_id: &str) -> MarketResult<Trip> {
        self.load_trip(trip_id).await
    }

    /// 最新的在前，先过滤再分页
    pub async fn list_trips(&self, req: ListTripsRequest) -> MarketResult<Page<Trip>> {
        let trips = self.all_trips().await?;
        let filtered = req.filter.apply(&trips);
        Ok(paginate(&filtered, req.page.normalized()))
    }

    pub async fn update_trip(&self, actor: &User, req: UpdateTripRequest) -> MarketResult<Trip> {
        let mut trip = self.load_trip(&req.trip_id).await?;
        require_owner(actor, &trip)?;
        if trip.status != TripStatus::Pending {
            return Err(MarketError::conflict("Only pending trips can be edited"));
        }

        if let Some(origin) = req.origin {
            trip.origin = required_text(&origin, "Origin")?;
        }
        if let Some(destination) = req.destination {
            trip.destination = required_text(&destination, "Destination")?;
        }
        if let Some(load_type) = req.load_type {
            trip.load_type = required_text(&load_type, "Load type")?;
        }
        if let Some(weight) = req.weight {
            trip.weight = non_negative(weight, "Weight")?;
        }
        if let Some(distance) = req.distance {
            trip.distance = non_negative(distance, "Distance")?;
        }
        if let Some(risk) = req.risk_level {
            trip.risk_level = risk;
        }
        let amount = req.amount.unwrap_or(trip.amount);
        let rate = req.interest_rate.unwrap_or(trip.interest_rate);
        let days = req.maturity_days.unwrap_or(trip.maturity_days);
        check_terms(amount, rate, days)?;
        trip.amount = amount;
        trip.interest_rate = rate;
        trip.maturity_days = days;

        self.save_trip(&trip).await?;
        Ok(trip)
    }

    pub async fn delete_trip(&self, actor: &User, trip_id: &str) -> MarketResult<Ack> {
        let trip = self.load_trip(trip_id).await?;
        require_owner_or_admin(actor, &trip)?;
        if trip.status != TripStatus::Pending || !trip.bids.is_empty() {
            return Err(MarketError::conflict(
                "Only pending trips without bids can be deleted",
            ));
        }
        for doc in &trip.documents {
            self.delete_document_content(&trip.id, doc).await?;
        }
        self.storage.delete(&keys::trip(trip_id)).await?;
        log_info!("[trips] deleted trip={} by={}", trip_id, actor.user_id);
        Ok(Ack::ok("Trip deleted successfully"))
    }

    /// 取消仍在招标的行程，所有托管出价原路退回
    pub async fn cancel_trip(&self, actor: &User, req: CancelTripRequest) -> MarketResult<Trip> {
        let mut trip = self.load_trip(&req.trip_id).await?;
        require_owner_or_admin(actor, &trip)?;
        if !trip.status.accepts_bids() {
            return Err(MarketError::conflict(format!(
                "Trip cannot be cancelled while {}",
                trip.status.as_str()
            )));
        }

        let reason = trimmed(req.reason).unwrap_or_else(|| "Trip cancelled".to_string());
        let bids = trip.bids.clone();
        for bid in &bids {
            self.refund_bid(&trip, bid, &reason).await?;
        }
        trip.status = TripStatus::Cancelled;
        self.save_trip(&trip).await?;

        log_info!(
            "[trips] cancelled trip={} refunded={} reason={:?}",
            trip.id,
            bids.len(),
            reason
        );
        Ok(trip)
    }

    // =========================================================
    // 出价
    // =========================================================

    /// 最新的在前
    pub async fn list_bids(&self, trip_id: &str) -> MarketResult<Vec<Bid>> {
        let mut bids = self.load_trip(trip_id).await?.bids;
        bids.reverse();
        bids.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bids)
    }

    pub async fn place_bid(&self, actor: &User, req: PlaceBidRequest) -> MarketResult<Bid> {
        require_approved(actor)?;
        if actor.role != Role::Lender {
            return Err(MarketError::forbidden("Only lenders can place bids"));
        }
        let mut trip = self.load_trip(&req.trip_id).await?;
        if !trip.status.accepts_bids() {
            return Err(MarketError::conflict("Trip is no longer accepting bids"));
        }
        let amount = req.amount.unwrap_or(trip.amount);
        if amount != trip.amount {
            return Err(MarketError::invalid_input(format!(
                "Bid amount must equal the trip amount of {}",
                format_inr(trip.amount)
            )));
        }
        finance::validate_interest_rate(req.interest_rate).map_err(MarketError::invalid_input)?;
        if trip.bids.iter().any(|b| b.lender_id == actor.id) {
            return Err(MarketError::conflict("You have already placed a bid on this trip"));
        }

        self.escrow(
            &actor.id,
            amount,
            &format!("Escrow for bid on trip {}", trip.route_label()),
        )
        .await
        .map_err(|e| e.in_op_with("trips.place_bid", &trip.id))?;

        let now = self.now();
        let bid = Bid {
            id: Self::new_id(),
            trip_id: trip.id.clone(),
            lender_id: actor.id.clone(),
            lender_name: actor.name.clone(),
            amount,
            interest_rate: req.interest_rate,
            created_at: now,
        };
        trip.bids.push(bid.clone());
        trip.status = TripStatus::Escrowed;
        self.save_trip(&trip).await?;

        let investment = Investment {
            id: Self::new_id(),
            lender_id: actor.id.clone(),
            trip_id: trip.id.clone(),
            bid_id: bid.id.clone(),
            amount,
            interest_rate: bid.interest_rate,
            expected_return: finance::expected_return(amount, bid.interest_rate, trip.maturity_days),
            status: InvestmentStatus::Escrowed,
            maturity_date: now.add_days(i64::from(trip.maturity_days)),
            invested_at: now,
        };
        self.save_investment(&investment).await?;

        self.notify(
            &trip.load_owner_id,
            NotificationType::BidReceived,
            "New Investment Bid Received",
            format!(
                "New bid: {} at {}% from {} on {}",
                format_inr(amount),
                bid.interest_rate,
                bid.lender_name,
                trip.route_label()
            ),
            NotificationPriority::High,
            Some(format!("/trips/{}", trip.id)),
        )
        .await?;

        log_info!(
            "[trips] bid trip={} lender={} rate={}",
            trip.id,
            actor.user_id,
            bid.interest_rate
        );
        Ok(bid)
    }

    /// 退回单个出价的托管资金，投资记为 refunded 并通知出借人
    async fn refund_bid(&self, trip: &Trip, bid: &Bid, reason: &str) -> MarketResult<()> {
        self.release_escrow(
            &bid.lender_id,
            bid.amount,
            &format!("Refund for bid on trip {}: {}", trip.route_label(), reason),
        )
        .await?;
        if let Some(mut investment) = self.investment_for_bid(&bid.id).await? {
            investment.status = InvestmentStatus::Refunded;
            self.save_investment(&investment).await?;
        }
        self.notify(
            &bid.lender_id,
            NotificationType::BidRefunded,
            "Bid Refunded",
            format!(
                "Your bid of {} on {} was refunded to your wallet. {}",
                format_inr(bid.amount),
                trip.route_label(),
                reason
            ),
            NotificationPriority::Medium,
            Some("/wallet".to_string()),
        )
        .await?;
        Ok(())
    }

    // =========================================================
    // 分配与放款
    // =========================================================

    pub async fn allot(&self, actor: &User, req: AllotBidRequest) -> MarketResult<AllotmentReceipt> {
        let trip = self.load_trip(&req.trip_id).await?;
        require_owner(actor, &trip)?;
        self.allot_bid(trip, &req.bid_id).await
    }

    async fn allot_bid(&self, mut trip: Trip, bid_id: &str) -> MarketResult<AllotmentReceipt> {
        if trip.status != TripStatus::Escrowed {
            return Err(MarketError::conflict("Trip has no escrowed bids to allot")
                .in_op_with("trips.allot", &trip.id));
        }
        let bid = trip
            .bid(bid_id)
            .cloned()
            .ok_or_else(|| MarketError::not_found("Bid not found").in_op_with("trips.allot", bid_id))?;
        let split = finance::platform_fee(bid.amount, self.config.platform_fee_percent);
        let now = self.now();

        // 1. 托管转在投（托管不足时在任何写入之前失败）
        self.invest_from_escrow(&bid.lender_id, bid.amount).await?;

        // 2. 借款人到账（扣除平台费）
        let borrower_wallet = self
            .credit(
                &trip.load_owner_id,
                split.net,
                TransactionCategory::Payment,
                &format!("Loan disbursement for trip {}", trip.route_label()),
            )
            .await?;

        // 3. 平台费
        if split.fee > Decimal::ZERO {
            let recipient = self.fee_recipient().await?;
            self.credit(
                &recipient,
                split.fee,
                TransactionCategory::Fee,
                &format!("Platform fee for trip {}", trip.route_label()),
            )
            .await?;
        }
        let platform_fee = PlatformFee {
            id: Self::new_id(),
            trip_id: trip.id.clone(),
            lender_id: bid.lender_id.clone(),
            borrower_id: trip.load_owner_id.clone(),
            loan_amount: bid.amount,
            fee_percentage: self.config.platform_fee_percent,
            fee_amount: split.fee,
            collected_at: now,
        };
        self.storage
            .put(&keys::fee(&platform_fee.id), &platform_fee)
            .await?;

        // 4. 投资生效，到期日从放款日起算
        let mut investment = match self.investment_for_bid(&bid.id).await? {
            Some(inv) => inv,
            None => Investment {
                id: Self::new_id(),
                lender_id: bid.lender_id.clone(),
                trip_id: trip.id.clone(),
                bid_id: bid.id.clone(),
                amount: bid.amount,
                interest_rate: bid.interest_rate,
                expected_return: Decimal::ZERO,
                status: InvestmentStatus::Escrowed,
                maturity_date: now,
                invested_at: now,
            },
        };
        investment.status = InvestmentStatus::Active;
        investment.interest_rate = bid.interest_rate;
        investment.expected_return =
            finance::expected_return(bid.amount, bid.interest_rate, trip.maturity_days);
        investment.maturity_date = now.add_days(i64::from(trip.maturity_days));
        self.save_investment(&investment).await?;

        let agreement = LoanAgreement {
            id: Self::new_id(),
            trip_id: trip.id.clone(),
            bid_id: bid.id.clone(),
            lender_id: bid.lender_id.clone(),
            borrower_id: trip.load_owner_id.clone(),
            loan_amount: bid.amount,
            interest_rate: bid.interest_rate,
            maturity_days: trip.maturity_days,
            contract_terms: format!(
                "Loan of {} for trip {} at {}% p.a. simple interest, repayable within {} days. \
                 Interest accrues on actual days elapsed from disbursement.",
                format_inr(bid.amount),
                trip.route_label(),
                bid.interest_rate,
                trip.maturity_days
            ),
            status: AgreementStatus::Active,
            created_at: now,
        };
        self.save_agreement(&agreement).await?;

        // 5. 行程放款
        trip.status = TripStatus::Funded;
        trip.lender_id = Some(bid.lender_id.clone());
        trip.lender_name = Some(bid.lender_name.clone());
        trip.interest_rate = bid.interest_rate;
        trip.funded_at = Some(now);
        self.save_trip(&trip).await?;

        // 6. 落选出价退款
        let losers: Vec<Bid> = trip.bids.iter().filter(|b| b.id != bid.id).cloned().collect();
        for loser in &losers {
            self.refund_bid(&trip, loser, "Another bid was allotted").await?;
        }

        self.notify(
            &bid.lender_id,
            NotificationType::BidAllotted,
            "Investment Allotted",
            format!(
                "Investment allotted! {} for {} at {}%",
                format_inr(bid.amount),
                trip.route_label(),
                bid.interest_rate
            ),
            NotificationPriority::High,
            Some(format!("/trips/{}", trip.id)),
        )
        .await?;

        log_info!(
            "[trips] allotted trip={} lender={} amount={} fee={}",
            trip.id,
            bid.lender_id,
            bid.amount,
            split.fee
        );
        Ok(AllotmentReceipt {
            trip,
            investment,
            platform_fee,
            agreement,
            borrower_wallet,
            refunded_bids: losers.len(),
        })
    }

    /// 所有托管中的行程分配给最早的出价；owner 只处理自己的，admin 处理全部
    pub async fn bulk_allot(&self, actor: &User) -> MarketResult<BulkAllotReport> {
        let is_admin = actor.role.is_admin();
        if !is_admin {
            require_borrower(actor)?;
        }
        let candidates: Vec<Trip> = self
            .all_trips()
            .await?
            .into_iter()
            .filter(|t| t.status == TripStatus::Escrowed)
            .filter(|t| is_admin || t.load_owner_id == actor.id)
            .collect();

        let mut report = BulkAllotReport::default();
        for (index, trip) in candidates.into_iter().enumerate() {
            let trip_id = trip.id.clone();
            let Some(bid_id) = trip.earliest_bid().map(|b| b.id.clone()) else {
                report.failed += 1;
                report.errors.push(BulkItemError {
                    index,
                    error: format!("Trip {} has no bids", trip_id),
                    trip_id: Some(trip_id),
                });
                continue;
            };
            match self.allot_bid(trip, &bid_id).await {
                Ok(_) => {
                    report.allotted += 1;
                    report.trips.push(trip_id);
                }
                Err(e) => {
                    log_warn!("[trips] bulk allot failed trip={}: {}", trip_id, e);
                    report.failed += 1;
                    report.errors.push(BulkItemError {
                        index,
                        error: format!("Trip {}: {}", trip_id, e.message()),
                        trip_id: Some(trip_id),
                    });
                }
            }
        }
        Ok(report)
    }

    // =========================================================
    // 运输
    // =========================================================

    pub async fn start_transit(&self, actor: &User, trip_id: &str) -> MarketResult<Trip> {
        let mut trip = self.load_trip(trip_id).await?;
        require_owner(actor, &trip)?;
        if trip.status != TripStatus::Funded {
            return Err(MarketError::conflict("Only funded trips can start transit"));
        }
        let missing = trip.missing_documents(&DocumentType::DISPATCH);
        if !missing.is_empty() {
            return Err(MarketError::invalid_input(format!(
                "Missing required documents: {}",
                document_names(&missing)
            )));
        }
        trip.status = TripStatus::InTransit;
        self.save_trip(&trip).await?;
        Ok(trip)
    }

    pub async fn complete_trip(&self, actor: &User, trip_id: &str) -> MarketResult<Trip> {
        let mut trip = self.load_trip(trip_id).await?;
        require_owner(actor, &trip)?;
        if trip.status != TripStatus::InTransit {
            return Err(MarketError::conflict("Only trips in transit can be completed"));
        }
        let missing = trip.missing_documents(&DocumentType::DELIVERY);
        if !missing.is_empty() {
            return Err(MarketError::invalid_input(format!(
                "Missing required documents: {}",
                document_names(&missing)
            )));
        }
        trip.status = TripStatus::Completed;
        trip.completed_at = Some(self.now());
        self.save_trip(&trip).await?;
        Ok(trip)
    }
}

#[cfg(test)]
mod tests;
