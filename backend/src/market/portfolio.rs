use super::adapter::{Clock, StorageAdapter};
use super::{Marketplace, keys, require_admin};
use crate::error::{MarketError, MarketResult};
use tripfin_shared::protocol::{FeeStats, InvestmentStats, ListAgreementsRequest, ListInvestmentsRequest};
use tripfin_shared::{Investment, InvestmentStatus, LoanAgreement, PlatformFee, Role, User};

impl<S, C> Marketplace<S, C>
where
    S: StorageAdapter,
    C: Clock,
{
    // =========================================================
    // 投资
    // =========================================================

    /// 出借人只能看自己的投资；管理员可按 lenderId 过滤或看全部
    pub async fn list_investments(&self, actor: &User, req: ListInvestmentsRequest) -> MarketResult<Vec<Investment>> {
        let lender_id = if actor.role.is_admin() {
            req.lender_id
        } else if actor.role == Role::Lender {
            if req.lender_id.as_deref().is_some_and(|id| id != actor.id) {
                return Err(MarketError::forbidden("Cannot view another lender's investments"));
            }
            Some(actor.id.clone())
        } else {
            return Err(MarketError::forbidden("Only lenders have investments"));
        };

        Ok(self
            .all_investments()
            .await?
            .into_iter()
            .filter(|i| lender_id.as_deref().is_none_or(|id| i.lender_id == id))
            .filter(|i| req.status.is_none_or(|s| i.status == s))
            .collect())
    }

    pub async fn investment_stats(&self, actor: &User, lender_id: &str) -> MarketResult<InvestmentStats> {
        if actor.id != lender_id && !actor.role.is_admin() {
            return Err(MarketError::forbidden("Cannot view another lender's statistics"));
        }
        let mut stats = InvestmentStats::default();
        for inv in self.all_investments().await? {
            if inv.lender_id != lender_id {
                continue;
            }
            match inv.status {
                InvestmentStatus::Active => {
                    stats.active_count += 1;
                    stats.total_invested += inv.amount;
                    stats.expected_returns += inv.expected_return;
                }
                InvestmentStatus::Escrowed => stats.escrowed_count += 1,
                InvestmentStatus::Completed => stats.completed_count += 1,
                InvestmentStatus::Defaulted => {
                    stats.defaulted_count += 1;
                    stats.total_invested += inv.amount;
                }
                InvestmentStatus::Refunded => {}
            }
        }
        // 已实现收益以钱包为准
        stats.total_returns = self.wallet(lender_id).await?.total_returns;
        Ok(stats)
    }

    // =========================================================
    // 借款协议
    // =========================================================

    /// 非管理员只能看到自己作为出借方或借款方的协议
    pub async fn list_agreements(&self, actor: &User, req: ListAgreementsRequest) -> MarketResult<Vec<LoanAgreement>> {
        let is_admin = actor.role.is_admin();
        Ok(self
            .all_agreements()
            .await?
            .into_iter()
            .filter(|a| req.matches(a))
            .filter(|a| is_admin || a.lender_id == actor.id || a.borrower_id == actor.id)
            .collect())
    }

    // =========================================================
    // 平台费 (admin)
    // =========================================================

    pub async fn platform_fees(&self, actor: &User) -> MarketResult<Vec<PlatformFee>> {
        require_admin(actor)?;
        let mut fees: Vec<PlatformFee> = self
            .storage
            .list(keys::FEE)
            .await?
            .into_iter()
            .map(|(_, f)| f)
            .collect();
        fees.sort_by(|a: &PlatformFee, b: &PlatformFee| b.collected_at.cmp(&a.collected_at));
        Ok(fees)
    }

    pub async fn fee_stats(&self, actor: &User) -> MarketResult<FeeStats> {
        let fees = self.platform_fees(actor).await?;
        Ok(FeeStats {
            total_fees: fees.iter().map(|f| f.fee_amount).sum(),
            count: fees.len(),
            total_loan_volume: fees.iter().map(|f| f.loan_amount).sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::error::MarketErrorStatus;
    use rust_decimal_macros::dec;
    use tripfin_shared::protocol::{
        AllotBidRequest, ListAgreementsRequest, ListInvestmentsRequest, PlaceBidRequest,
    };
    use tripfin_shared::{InvestmentStatus, Role, User};

    async fn bid_and_allot(market: &TestMarket, owner: &User, lender: &User, amount: rust_decimal::Decimal) -> String {
        let trip = posted_trip(market, owner, amount, dec!(12)).await;
        let bid = market
            .place_bid(
                lender,
                PlaceBidRequest {
                    trip_id: trip.id.clone(),
                    amount: None,
                    interest_rate: dec!(12),
                },
            )
            .await
            .unwrap();
        market
            .allot(
                owner,
                AllotBidRequest {
                    trip_id: trip.id.clone(),
                    bid_id: bid.id,
                },
            )
            .await
            .unwrap();
        trip.id
    }

    #[tokio::test]
    async fn investments_are_scoped_to_the_lender() {
        let (market, _clock) = market();
        let root = admin(&market).await;
        let owner = approved(&market, Role::LoadOwner, "Asha").await;
        let l1 = funded(&market, Role::Lender, "Lena", dec!(80000)).await;
        let l2 = funded(&market, Role::Lender, "Omar", dec!(80000)).await;

        bid_and_allot(&market, &owner, &l1, dec!(20000)).await;
        let pending_trip = posted_trip(&market, &owner, dec!(30000), dec!(12)).await;
        market
            .place_bid(
                &l1,
                PlaceBidRequest {
                    trip_id: pending_trip.id.clone(),
                    amount: None,
                    interest_rate: dec!(10),
                },
            )
            .await
            .unwrap();
        bid_and_allot(&market, &owner, &l2, dec!(40000)).await;

        let mine = market
            .list_investments(&l1, ListInvestmentsRequest::default())
            .await
            .unwrap();
        assert_eq!(mine.len(), 2);

        let active = market
            .list_investments(
                &l1,
                ListInvestmentsRequest {
                    lender_id: None,
                    status: Some(InvestmentStatus::Active),
                },
            )
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].amount, dec!(20000));

        let snoop = ListInvestmentsRequest {
            lender_id: Some(l2.id.clone()),
            status: None,
        };
        assert_eq!(
            market.list_investments(&l1, snoop.clone()).await.unwrap_err().status,
            MarketErrorStatus::Forbidden
        );
        assert_eq!(market.list_investments(&root, snoop).await.unwrap().len(), 1);
        assert_eq!(
            market
                .list_investments(&root, ListInvestmentsRequest::default())
                .await
                .unwrap()
                .len(),
            3
        );
        assert!(market.list_investments(&owner, ListInvestmentsRequest::default()).await.is_err());

        let stats = market.investment_stats(&l1, &l1.id).await.unwrap();
        assert_eq!(stats.active_count, 1);
        assert_eq!(stats.escrowed_count, 1);
        assert_eq!(stats.total_invested, dec!(20000));
        assert_eq!(stats.expected_returns, dec!(197.26));
        assert!(market.investment_stats(&l2, &l1.id).await.is_err());
    }

    #[tokio::test]
    async fn agreements_visible_to_parties_only() {
        let (market, _clock) = market();
        let root = admin(&market).await;
        let owner = approved(&market, Role::LoadOwner, "Asha").await;
        let other = approved(&market, Role::Transporter, "Bala").await;
        let lender = funded(&market, Role::Lender, "Lena", dec!(80000)).await;
        let trip_id = bid_and_allot(&market, &owner, &lender, dec!(20000)).await;

        let by_trip = ListAgreementsRequest {
            trip_id: Some(trip_id.clone()),
            ..Default::default()
        };
        assert_eq!(market.list_agreements(&owner, by_trip.clone()).await.unwrap().len(), 1);
        assert_eq!(market.list_agreements(&lender, by_trip.clone()).await.unwrap().len(), 1);
        assert!(market.list_agreements(&other, by_trip.clone()).await.unwrap().is_empty());
        assert_eq!(market.list_agreements(&root, by_trip).await.unwrap().len(), 1);

        let wrong = ListAgreementsRequest {
            trip_id: Some("missing".into()),
            ..Default::default()
        };
        assert!(market.list_agreements(&root, wrong).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fee_stats_sum_collected_fees() {
        let (market, _clock) = market();
        let root = admin(&market).await;
        let owner = approved(&market, Role::LoadOwner, "Asha").await;
        let lender = funded(&market, Role::Lender, "Lena", dec!(80000)).await;
        bid_and_allot(&market, &owner, &lender, dec!(20000)).await;
        bid_and_allot(&market, &owner, &lender, dec!(50000)).await;

        let stats = market.fee_stats(&root).await.unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total_fees, dec!(350));
        assert_eq!(stats.total_loan_volume, dec!(70000));
        assert_eq!(market.platform_fees(&root).await.unwrap().len(), 2);
        assert_eq!(
            market.fee_stats(&owner).await.unwrap_err().status,
            MarketErrorStatus::Forbidden
        );
    }
}
