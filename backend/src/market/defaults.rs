//! 逾期判定与定期清扫
//!
//! 清扫由 Durable Object Alarm 驱动：放款或登录后确保有一个 alarm，
//! alarm 触发时执行清扫 (逾期标记、过期会话、旧通知)，
//! 只要还有存续中的贷款或会话就按间隔继续调度。清扫失败时短间隔重试。

use super::adapter::{AlarmScheduler, Clock, StorageAdapter};
use super::{Marketplace, keys, require_admin};
use crate::error::MarketResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tripfin_shared::finance::format_inr;
use tripfin_shared::maturity::{self, Defaulter};
use tripfin_shared::protocol::SweepReport;
use tripfin_shared::{
    AgreementStatus, InvestmentStatus, NotificationPriority, NotificationType, Timestamp, User,
};

/// 清扫失败后的重试间隔
pub const SWEEP_RETRY: Duration = Duration::from_secs(15 * 60);

/// 调度状态，保存在 `meta:sweep`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SweepState {
    next_sweep_at: Option<Timestamp>,
    last_run_at: Option<Timestamp>,
}

impl<S, C> Marketplace<S, C>
where
    S: StorageAdapter,
    C: Clock,
{
    async fn current_defaulters(&self) -> MarketResult<Vec<Defaulter>> {
        let trips = self.all_trips().await?;
        Ok(maturity::find_defaulters(&trips, self.now().date_naive()))
    }

    /// 逾期列表，逾期最久的在前
    pub async fn defaulters(&self, actor: &User) -> MarketResult<Vec<Defaulter>> {
        require_admin(actor)?;
        self.current_defaulters().await
    }

    /// 把逾期行程的在投投资和协议标记为 defaulted；每笔贷款只通知一次
    pub async fn sweep_defaults(&self) -> MarketResult<SweepReport> {
        let defaulters = self.current_defaulters().await?;
        let mut report = SweepReport {
            overdue_total: defaulters.len(),
            ..Default::default()
        };

        for d in &defaulters {
            let trip = &d.trip;
            let mut flipped = false;
            for mut investment in self.all_investments().await? {
                if investment.trip_id == trip.id && investment.status == InvestmentStatus::Active {
                    investment.status = InvestmentStatus::Defaulted;
                    self.save_investment(&investment).await?;
                    flipped = true;
                }
            }
            if !flipped {
                continue;
            }
            if let Some(mut agreement) = self.agreement_for_trip(&trip.id).await? {
                agreement.status = AgreementStatus::Defaulted;
                self.save_agreement(&agreement).await?;
            }

            let message = format!(
                "Loan for {} is {} day(s) overdue. Outstanding: {}",
                trip.route_label(),
                d.days_overdue,
                format_inr(d.total_due)
            );
            let action = Some(format!("/trips/{}", trip.id));
            self.notify(
                &trip.load_owner_id,
                NotificationType::LoanOverdue,
                "Loan Overdue",
                message.clone(),
                NotificationPriority::High,
                action.clone(),
            )
            .await?;
            if let Some(lender_id) = &trip.lender_id {
                self.notify(
                    lender_id,
                    NotificationType::LoanOverdue,
                    "Loan Overdue",
                    message,
                    NotificationPriority::High,
                    action,
                )
                .await?;
            }
            report.newly_defaulted.push(trip.id.clone());
        }

        if !report.newly_defaulted.is_empty() {
            log_warn!(
                "[defaults] sweep flagged {} new defaulter(s), {} overdue in total",
                report.newly_defaulted.len(),
                report.overdue_total
            );
        }
        Ok(report)
    }

    /// 一次完整的定期维护：逾期清扫 + 过期会话 + 旧通知
    pub async fn run_maintenance(&self) -> MarketResult<SweepReport> {
        let mut report = self.sweep_defaults().await?;
        report.sessions_purged = self.purge_expired_sessions().await?;
        report.notifications_pruned = self.prune_notifications().await?;
        Ok(report)
    }

    /// 还有存续贷款或会话时清扫需要继续
    async fn has_pending_work(&self) -> MarketResult<bool> {
        let outstanding = self
            .all_trips()
            .await?
            .iter()
            .any(|t| t.status.is_outstanding());
        Ok(outstanding || self.has_sessions().await?)
    }
}

impl<S, C> Marketplace<S, C>
where
    S: StorageAdapter + AlarmScheduler,
    C: Clock,
{
    fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.config.sweep_interval_hours.saturating_mul(3600))
    }

    fn after(&self, delay: Duration) -> Timestamp {
        Timestamp::new(self.now().as_millis() + delay.as_millis() as i64)
    }

    async fn schedule_sweep(&self, mut state: SweepState, delay: Duration) -> MarketResult<()> {
        self.storage.set_alarm(delay).await?;
        state.next_sweep_at = Some(self.after(delay));
        self.storage.put(keys::SWEEP_STATE, &state).await
    }

    /// 若没有待执行的清扫则调度一次；已有的 alarm 不会被推迟
    pub async fn ensure_sweep_scheduled(&self) -> MarketResult<()> {
        let state: SweepState = self.storage.get(keys::SWEEP_STATE).await?.unwrap_or_default();
        if state.next_sweep_at.is_some_and(|at| at > self.now()) {
            return Ok(());
        }
        self.schedule_sweep(state, self.sweep_interval()).await
    }

    /// Alarm 回调
    ///
    /// 维护失败时先按 [`SWEEP_RETRY`] 重新挂上 alarm 再返回错误，
    /// 存续贷款不会因为一次存储故障失去清扫。
    pub async fn on_alarm(&self) -> MarketResult<SweepReport> {
        let report = match self.run_maintenance().await {
            Ok(report) => report,
            Err(e) => {
                log_error!("[defaults] sweep failed, retrying in {:?}: {}", SWEEP_RETRY, e);
                self.storage.set_alarm(SWEEP_RETRY).await?;
                let mut state: SweepState = self
                    .storage
                    .get(keys::SWEEP_STATE)
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_default();
                state.next_sweep_at = Some(self.after(SWEEP_RETRY));
                if let Err(put_err) = self.storage.put(keys::SWEEP_STATE, &state).await {
                    log_warn!("[defaults] could not record retry: {}", put_err);
                }
                return Err(e);
            }
        };

        let mut state: SweepState = self.storage.get(keys::SWEEP_STATE).await?.unwrap_or_default();
        state.last_run_at = Some(self.now());
        state.next_sweep_at = None;

        if self.has_pending_work().await? {
            self.schedule_sweep(state, self.sweep_interval()).await?;
        } else {
            self.storage.put(keys::SWEEP_STATE, &state).await?;
            log_info!("[defaults] nothing outstanding, sweep idle");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::SWEEP_RETRY;
    use super::super::test_support::*;
    use crate::error::MarketErrorStatus;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tripfin_shared::maturity::Severity;
    use tripfin_shared::protocol::{AllotBidRequest, PlaceBidRequest};
    use tripfin_shared::{AgreementStatus, InvestmentStatus, NotificationType, Role, Trip, User};

    async fn funded_trip(market: &TestMarket) -> (Trip, User, User) {
        let owner = approved(market, Role::LoadOwner, "Asha").await;
        let lender = funded(market, Role::Lender, "Lena", dec!(50000)).await;
        let trip = posted_trip(market, &owner, dec!(20000), dec!(12)).await;
        let bid = market
            .place_bid(
                &lender,
                PlaceBidRequest {
                    trip_id: trip.id.clone(),
                    amount: None,
                    interest_rate: dec!(12),
                },
            )
            .await
            .unwrap();
        let receipt = market
            .allot(
                &owner,
                AllotBidRequest {
                    trip_id: trip.id.clone(),
                    bid_id: bid.id,
                },
            )
            .await
            .unwrap();
        (receipt.trip, owner, lender)
    }

    #[tokio::test]
    async fn defaulters_flag_only_after_maturity() {
        let (market, clock) = market();
        let root = admin(&market).await;
        let (trip, owner, _lender) = funded_trip(&market).await;

        // 到期当天不算逾期
        clock.advance_days(30);
        assert!(market.defaulters(&root).await.unwrap().is_empty());

        clock.advance_days(1);
        let found = market.defaulters(&root).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].trip.id, trip.id);
        assert_eq!(found[0].days_overdue, 1);
        assert_eq!(found[0].severity, Severity::RecentlyOverdue);
        assert_eq!(found[0].total_due, dec!(20197.26));

        assert_eq!(
            market.defaulters(&owner).await.unwrap_err().status,
            MarketErrorStatus::Forbidden
        );
    }

    #[tokio::test]
    async fn sweep_marks_defaults_once() {
        let (market, clock) = market();
        let (trip, owner, lender) = funded_trip(&market).await;
        clock.advance_days(45);

        let first = market.sweep_defaults().await.unwrap();
        assert_eq!(first.newly_defaulted, vec![trip.id.clone()]);
        assert_eq!(first.overdue_total, 1);

        let inv = market.all_investments().await.unwrap();
        assert_eq!(inv[0].status, InvestmentStatus::Defaulted);
        let agreement = market.agreement_for_trip(&trip.id).await.unwrap().unwrap();
        assert_eq!(agreement.status, AgreementStatus::Defaulted);

        for user in [&owner, &lender] {
            let notes = market.notifications(user, &unread_notes()).await.unwrap();
            assert_eq!(notes[0].kind, NotificationType::LoanOverdue);
        }

        let second = market.sweep_defaults().await.unwrap();
        assert!(second.newly_defaulted.is_empty());
        assert_eq!(second.overdue_total, 1);
        let overdue_notes = market
            .notifications(&lender, &all_notes())
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.kind == NotificationType::LoanOverdue)
            .count();
        assert_eq!(overdue_notes, 1);
    }

    #[tokio::test]
    async fn late_repayment_settles_defaulted_loan() {
        let (market, clock) = market();
        let (trip, owner, _lender) = funded_trip(&market).await;
        clock.advance_days(40);
        market.sweep_defaults().await.unwrap();

        market.deposit(&owner.id, dec!(1000), "top up").await.unwrap();
        market.repay(&owner, &trip.id).await.unwrap();
        assert_eq!(market.all_investments().await.unwrap()[0].status, InvestmentStatus::Completed);
        assert!(market.sweep_defaults().await.unwrap().newly_defaulted.is_empty());
    }

    #[tokio::test]
    async fn alarm_rearms_while_loans_are_outstanding() {
        let (market, clock) = market();
        market.ensure_sweep_scheduled().await.unwrap();
        assert_eq!(
            *market.storage().alarm.borrow(),
            Some(Duration::from_secs(24 * 3600))
        );

        // 已有待执行的清扫时不推迟
        *market.storage().alarm.borrow_mut() = None;
        clock.advance_hours(1);
        market.ensure_sweep_scheduled().await.unwrap();
        assert!(market.storage().alarm.borrow().is_none());

        // 没有存续贷款：执行后不再调度
        clock.advance_hours(23);
        market.on_alarm().await.unwrap();
        assert!(market.storage().alarm.borrow().is_none());

        let (_trip, _owner, _lender) = funded_trip(&market).await;
        market.ensure_sweep_scheduled().await.unwrap();
        clock.advance_days(1);
        *market.storage().alarm.borrow_mut() = None;
        market.on_alarm().await.unwrap();
        assert!(market.storage().alarm.borrow().is_some());
    }

    #[tokio::test]
    async fn failed_sweep_rearms_a_retry() {
        let (market, clock) = market();
        let (trip, _owner, _lender) = funded_trip(&market).await;
        market.ensure_sweep_scheduled().await.unwrap();
        clock.advance_days(45);

        // 投资记录写入失败：清扫中断
        market.storage().fail_puts_under(Some("inv:"));
        *market.storage().alarm.borrow_mut() = None;
        let err = market.on_alarm().await.unwrap_err();
        assert_eq!(err.status, MarketErrorStatus::Store);
        assert_eq!(*market.storage().alarm.borrow(), Some(SWEEP_RETRY));

        // 重试窗口内，放款触发的调度不会把重试推迟到一天后
        market.ensure_sweep_scheduled().await.unwrap();
        assert_eq!(*market.storage().alarm.borrow(), Some(SWEEP_RETRY));

        market.storage().fail_puts_under(None);
        clock.advance_hours(1);
        let report = market.on_alarm().await.unwrap();
        assert_eq!(report.newly_defaulted, vec![trip.id]);
        assert_eq!(
            *market.storage().alarm.borrow(),
            Some(Duration::from_secs(24 * 3600))
        );
    }

    #[tokio::test]
    async fn alarm_purges_expired_sessions() {
        let (market, clock) = market();
        let auth = market
            .signup(signup_request(Role::Transporter, "Bala"))
            .await
            .unwrap();
        market.ensure_sweep_scheduled().await.unwrap();

        // 会话仍有效：保留并继续调度
        clock.advance_days(1);
        let report = market.on_alarm().await.unwrap();
        assert_eq!(report.sessions_purged, 0);
        assert!(market.authenticate(Some(&auth.token)).await.is_ok());
        assert!(market.storage().alarm.borrow().is_some());

        // 7 天后过期：被清理，之后没有待办，alarm 停止
        clock.advance_days(7);
        *market.storage().alarm.borrow_mut() = None;
        let report = market.on_alarm().await.unwrap();
        assert_eq!(report.sessions_purged, 1);
        assert!(market.storage().alarm.borrow().is_none());
        assert!(
            !market
                .storage()
                .map
                .borrow()
                .keys()
                .any(|k| k.starts_with("session:"))
        );
    }
}
