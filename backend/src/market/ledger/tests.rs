use super::super::test_support::*;
use crate::error::MarketErrorStatus;
use rust_decimal_macros::dec;
use tripfin_shared::protocol::ListTransactionsRequest;
use tripfin_shared::{Role, TransactionCategory, TransactionType};

#[tokio::test]
async fn wallet_is_created_on_first_access() {
    let (market, _clock) = market();
    let wallet = market.wallet("someone").await.unwrap();
    assert_eq!(wallet.user_id, "someone");
    assert!(wallet.balance.is_zero());
    assert!(market.transactions("someone", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn deposit_and_withdraw_record_balance_after() {
    let (market, _clock) = market();
    market.deposit("u1", dec!(1000), "top up").await.unwrap();
    let wallet = market.withdraw("u1", dec!(250.50), "payout").await.unwrap();
    assert_eq!(wallet.balance, dec!(749.50));

    let txns = market.transactions("u1", None).await.unwrap();
    assert_eq!(txns.len(), 2);
    assert_eq!(txns[0].kind, TransactionType::Debit);
    assert_eq!(txns[0].category, TransactionCategory::Withdrawal);
    assert_eq!(txns[0].balance_after, dec!(749.50));
    assert_eq!(txns[1].category, TransactionCategory::Deposit);
    assert_eq!(txns[1].balance_after, dec!(1000));
}

#[tokio::test]
async fn non_positive_amounts_are_rejected() {
    let (market, _clock) = market();
    let err = market.deposit("u1", dec!(0), "zero").await.unwrap_err();
    assert_eq!(err.status, MarketErrorStatus::InvalidInput);
    let err = market.deposit("u1", dec!(-5), "negative").await.unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn insufficient_funds_carries_shortfall() {
    let (market, _clock) = market();
    market.deposit("u1", dec!(100), "seed").await.unwrap();
    let err = market.withdraw("u1", dec!(150), "too much").await.unwrap_err();
    assert_eq!(err.status, MarketErrorStatus::InsufficientFunds);

    let details = err.details().unwrap();
    assert_eq!(details["required"], "150");
    assert_eq!(details["available"], "100");
    assert_eq!(details["shortfall"], "50");

    // 失败的操作不改余额、不记流水
    assert_eq!(market.wallet("u1").await.unwrap().balance, dec!(100));
    assert_eq!(market.transactions("u1", None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn escrow_invest_and_return_cycle() {
    let (market, _clock) = market();
    market.deposit("lender", dec!(50000), "seed").await.unwrap();

    let w = market.escrow("lender", dec!(20000), "bid").await.unwrap();
    assert_eq!(w.balance, dec!(30000));
    assert_eq!(w.escrowed_amount, dec!(20000));

    let w = market.invest_from_escrow("lender", dec!(20000)).await.unwrap();
    assert!(w.escrowed_amount.is_zero());
    assert_eq!(w.total_invested, dec!(20000));
    assert_eq!(w.balance, dec!(30000));

    let w = market
        .credit_return("lender", dec!(20000), dec!(197.26), "repaid")
        .await
        .unwrap();
    assert_eq!(w.balance, dec!(50197.26));
    assert!(w.total_invested.is_zero());
    assert_eq!(w.total_returns, dec!(197.26));

    // deposit, escrow, return；invest 不记流水
    assert_eq!(market.transactions("lender", None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn release_escrow_refunds_balance() {
    let (market, _clock) = market();
    market.deposit("lender", dec!(30000), "seed").await.unwrap();
    market.escrow("lender", dec!(25000), "bid").await.unwrap();

    let err = market.invest_from_escrow("lender", dec!(26000)).await.unwrap_err();
    assert_eq!(err.message(), "Insufficient escrowed amount");

    let w = market.release_escrow("lender", dec!(25000), "refund").await.unwrap();
    assert_eq!(w.balance, dec!(30000));
    assert!(w.escrowed_amount.is_zero());
    let latest = &market.transactions("lender", Some(1)).await.unwrap()[0];
    assert_eq!(latest.category, TransactionCategory::Refund);
    assert_eq!(latest.kind, TransactionType::Credit);
}

#[tokio::test]
async fn transactions_newest_first_with_limit() {
    let (market, clock) = market();
    for amount in [dec!(10), dec!(20), dec!(30)] {
        market.deposit("u1", amount, "seed").await.unwrap();
        clock.advance_hours(1);
    }
    let latest = market.transactions("u1", Some(2)).await.unwrap();
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].amount, dec!(30));
    assert_eq!(latest[1].amount, dec!(20));
}

#[tokio::test]
async fn stats_group_by_category() {
    let (market, _clock) = market();
    market.deposit("u1", dec!(500), "seed").await.unwrap();
    market.deposit("u1", dec!(250), "seed").await.unwrap();
    market
        .debit("u1", dec!(100), TransactionCategory::Payment, "repay")
        .await
        .unwrap();
    market
        .credit("u1", dec!(40), TransactionCategory::Fee, "fee")
        .await
        .unwrap();

    let stats = market.transaction_stats("u1").await.unwrap();
    assert_eq!(stats.count, 4);
    assert_eq!(stats.total_credits, dec!(790));
    assert_eq!(stats.total_debits, dec!(100));
    assert_eq!(stats.by_category["deposit"], dec!(750));
    assert_eq!(stats.by_category["payment"], dec!(100));
    assert_eq!(stats.by_category["fee"], dec!(40));
}

#[tokio::test]
async fn wallet_endpoints_enforce_ownership() {
    let (market, _clock) = market();
    let owner = approved(&market, Role::LoadOwner, "Asha").await;
    let other = approved(&market, Role::Transporter, "Bala").await;
    let root = admin(&market).await;

    market.add_money(&owner, &owner.id, dec!(500)).await.unwrap();
    let err = market.add_money(&other, &owner.id, dec!(500)).await.unwrap_err();
    assert_eq!(err.status, MarketErrorStatus::Forbidden);
    let err = market.withdraw_money(&root, &owner.id, dec!(10)).await.unwrap_err();
    assert_eq!(err.status, MarketErrorStatus::Forbidden);

    assert!(market.get_wallet(&other, &owner.id).await.is_err());
    let seen = market.get_wallet(&root, &owner.id).await.unwrap();
    assert_eq!(seen.balance, dec!(500));

    let req = ListTransactionsRequest {
        user_id: owner.id.clone(),
        limit: None,
    };
    assert_eq!(market.list_transactions(&root, &owner.id, req).await.unwrap().len(), 1);
    assert!(market.user_transaction_stats(&other, &owner.id).await.is_err());
}
