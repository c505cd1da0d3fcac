//! 还款：本金 + 按实际天数计算的单利
//!
//! 提前还款利息按比例减少；当天放款当天还款利息为 0。

use super::Marketplace;
use super::adapter::{Clock, StorageAdapter};
use crate::error::{MarketError, MarketResult};
use tripfin_shared::finance::{self, RepaymentQuote, format_inr};
use tripfin_shared::protocol::RepaymentReceipt;
use tripfin_shared::{
    AgreementStatus, InvestmentStatus, NotificationPriority, NotificationType, TransactionCategory,
    Trip, TripStatus, User,
};

impl<S, C> Marketplace<S, C>
where
    S: StorageAdapter,
    C: Clock,
{
    fn quote_for(&self, trip: &Trip) -> MarketResult<RepaymentQuote> {
        let funded_at = trip
            .funded_at
            .ok_or_else(|| MarketError::conflict("Trip has not been funded").in_op_with("repayment.quote", &trip.id))?;
        let days = finance::elapsed_days(funded_at.date_naive(), self.now().date_naive());
        Ok(finance::quote(trip.amount, trip.interest_rate, days))
    }

    /// 今天还款需要支付的金额
    pub async fn repayment_quote(&self, trip_id: &str) -> MarketResult<RepaymentQuote> {
        let trip = self.load_trip(trip_id).await?;
        self.quote_for(&trip)
    }

    pub async fn repay(&self, actor: &User, trip_id: &str) -> MarketResult<RepaymentReceipt> {
        let mut trip = self.load_trip(trip_id).await?;
        if actor.id != trip.load_owner_id {
            return Err(MarketError::forbidden("Only the borrower can repay this loan"));
        }
        if !trip.status.is_outstanding() {
            return Err(MarketError::conflict(format!(
                "Trip cannot be repaid while {}",
                trip.status.as_str()
            )));
        }
        let lender_id = trip
            .lender_id
            .clone()
            .ok_or_else(|| MarketError::store("Funded trip has no lender").in_op_with("repayment.repay", &trip.id))?;
        let quote = self.quote_for(&trip)?;

        let borrower = self.wallet(&trip.load_owner_id).await?;
        if borrower.balance < quote.total {
            return Err(MarketError::insufficient_funds(
                "Insufficient balance for repayment",
                quote.total,
                borrower.balance,
            ));
        }

        let borrower_wallet = self
            .debit(
                &trip.load_owner_id,
                quote.total,
                TransactionCategory::Payment,
                &format!("Loan repayment for trip {}", trip.route_label()),
            )
            .await?;
        let lender_wallet = self
            .credit_return(
                &lender_id,
                quote.principal,
                quote.interest,
                &format!(
                    "Repayment for trip {} ({} days interest)",
                    trip.route_label(),
                    quote.days
                ),
            )
            .await?;

        let now = self.now();
        trip.status = TripStatus::Repaid;
        trip.repaid_at = Some(now);
        self.save_trip(&trip).await?;

        for mut investment in self.all_investments().await? {
            let settled = investment.trip_id == trip.id
                && investment.lender_id == lender_id
                && matches!(investment.status, InvestmentStatus::Active | InvestmentStatus::Defaulted);
            if settled {
                investment.status = InvestmentStatus::Completed;
                self.save_investment(&investment).await?;
            }
        }
        if let Some(mut agreement) = self.agreement_for_trip(&trip.id).await? {
            agreement.status = AgreementStatus::Closed;
            self.save_agreement(&agreement).await?;
        }

        self.notify(
            &lender_id,
            NotificationType::RepaymentReceived,
            "Investment Returns Received",
            format!(
                "Returns received! {} (Principal + {} interest) for {}",
                format_inr(quote.total),
                format_inr(quote.interest),
                trip.route_label()
            ),
            NotificationPriority::High,
            Some("/investments".to_string()),
        )
        .await?;

        log_info!(
            "[repayment] trip={} days={} interest={} total={}",
            trip.id,
            quote.days,
            quote.interest,
            quote.total
        );
        Ok(RepaymentReceipt {
            success: true,
            trip,
            repayment_details: quote,
            lender_wallet,
            borrower_wallet,
        })
    }
}
