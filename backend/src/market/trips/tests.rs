use super::super::test_support::*;
use crate::error::MarketErrorStatus;
use rust_decimal_macros::dec;
use tripfin_shared::filter::TripFilter;
use tripfin_shared::pagination::PageRequest;
use tripfin_shared::protocol::{
    AllotBidRequest, CancelTripRequest, ListTripsRequest, PlaceBidRequest, UpdateTripRequest,
    UploadDocumentRequest,
};
use tripfin_shared::{
    AgreementStatus, DocumentType, InvestmentStatus, NotificationType, Role, TransactionCategory,
    TripStatus, User,
};

fn bid(trip_id: &str, rate: rust_decimal::Decimal) -> PlaceBidRequest {
    PlaceBidRequest {
        trip_id: trip_id.to_string(),
        amount: None,
        interest_rate: rate,
    }
}

fn upload(trip_id: &str, kind: DocumentType) -> UploadDocumentRequest {
    UploadDocumentRequest {
        trip_id: trip_id.to_string(),
        document_type: kind,
        document_data: format!("data:application/pdf;base64,{:?}", kind),
    }
}

async fn lender(market: &TestMarket, name: &str) -> User {
    funded(market, Role::Lender, name, dec!(50000)).await
}

// =========================================================
// 发布
// =========================================================

#[tokio::test]
async fn create_trip_defaults_and_lender_broadcast() {
    let (market, _clock) = market();
    let owner = approved(&market, Role::LoadOwner, "Asha").await;
    let l1 = lender(&market, "Lena").await;
    let l2 = registered(&market, Role::Lender, "Omar").await;

    let mut draft = draft(dec!(45000), dec!(12.5));
    draft.maturity_days = None;
    draft.sender = Some("   ".to_string());
    let trip = market.create_trip(&owner, draft).await.unwrap();

    assert_eq!(trip.status, TripStatus::Pending);
    assert_eq!(trip.maturity_days, 30);
    assert_eq!(trip.load_owner_id, owner.id);
    assert_eq!(trip.load_owner_name, "Asha");
    assert!(trip.sender.is_none());
    assert_eq!(market.get_trip(&trip.id).await.unwrap(), trip);

    for user in [&l1, &l2] {
        let notes = market.notifications(user, &all_notes()).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationType::InvestmentOpportunity);
        assert!(notes[0].message.contains("Mumbai → Pune"));
    }
}

#[tokio::test]
async fn create_trip_validation_and_roles() {
    let (market, _clock) = market();
    let owner = approved(&market, Role::Transporter, "Bala").await;
    let lender = lender(&market, "Lena").await;

    let err = market.create_trip(&owner, draft(dec!(15000), dec!(12))).await.unwrap_err();
    assert_eq!(err.status, MarketErrorStatus::InvalidInput);
    let err = market.create_trip(&owner, draft(dec!(30000), dec!(19))).await.unwrap_err();
    assert_eq!(err.status_code(), 400);

    let mut zero_days = draft(dec!(30000), dec!(12));
    zero_days.maturity_days = Some(0);
    assert!(market.create_trip(&owner, zero_days).await.is_err());

    let mut no_origin = draft(dec!(30000), dec!(12));
    no_origin.origin = " ".to_string();
    assert_eq!(market.create_trip(&owner, no_origin).await.unwrap_err().message(), "Origin is required");

    let err = market.create_trip(&lender, draft(dec!(30000), dec!(12))).await.unwrap_err();
    assert_eq!(err.status, MarketErrorStatus::Forbidden);
}

#[tokio::test]
async fn bulk_create_reports_per_item_errors() {
    let (market, _clock) = market();
    let owner = approved(&market, Role::LoadOwner, "Asha").await;

    let drafts = vec![
        draft(dec!(25000), dec!(10)),
        draft(dec!(90000), dec!(10)),
        draft(dec!(60000), dec!(14)),
    ];
    let report = market.bulk_create(&owner, drafts).await.unwrap();
    assert_eq!(report.created, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors[0].index, 1);
    assert_eq!(report.http_status(), 207);

    let empty = market.bulk_create(&owner, Vec::new()).await.unwrap();
    assert_eq!(empty.http_status(), 400);
}

#[tokio::test]
async fn list_trips_newest_first_filtered_and_paged() {
    let (market, clock) = market();
    let owner = approved(&market, Role::LoadOwner, "Asha").await;
    let other = approved(&market, Role::Transporter, "Bala").await;

    let mut ids = Vec::new();
    for amount in [dec!(20000), dec!(30000), dec!(40000)] {
        ids.push(posted_trip(&market, &owner, amount, dec!(12)).await.id);
        clock.advance_hours(1);
    }
    posted_trip(&market, &other, dec!(50000), dec!(12)).await;

    let req = ListTripsRequest {
        filter: TripFilter {
            load_owner_id: Some(owner.id.clone()),
            ..Default::default()
        },
        page: PageRequest::new(1, 2),
    };
    let page = market.list_trips(req.clone()).await.unwrap();
    assert_eq!(page.total_items, 3);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.items[0].id, ids[2]);
    assert_eq!(page.items[1].id, ids[1]);

    let second = market
        .list_trips(ListTripsRequest {
            page: PageRequest::new(2, 2),
            ..req
        })
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].id, ids[0]);
}

#[tokio::test]
async fn update_and_delete_only_while_pending() {
    let (market, _clock) = market();
    let owner = approved(&market, Role::LoadOwner, "Asha").await;
    let stranger = approved(&market, Role::LoadOwner, "Chitra").await;
    let lender = lender(&market, "Lena").await;
    let trip = posted_trip(&market, &owner, dec!(30000), dec!(12)).await;

    let req = UpdateTripRequest {
        trip_id: trip.id.clone(),
        amount: Some(dec!(35000)),
        destination: Some("Nashik".into()),
        ..Default::default()
    };
    assert_eq!(
        market.update_trip(&stranger, req.clone()).await.unwrap_err().status,
        MarketErrorStatus::Forbidden
    );
    let updated = market.update_trip(&owner, req).await.unwrap();
    assert_eq!(updated.amount, dec!(35000));
    assert_eq!(updated.destination, "Nashik");

    let bad = UpdateTripRequest {
        trip_id: trip.id.clone(),
        interest_rate: Some(dec!(4)),
        ..Default::default()
    };
    assert_eq!(market.update_trip(&owner, bad).await.unwrap_err().status_code(), 400);

    market.place_bid(&lender, bid(&trip.id, dec!(12))).await.unwrap();
    let err = market.delete_trip(&owner, &trip.id).await.unwrap_err();
    assert_eq!(err.status, MarketErrorStatus::Conflict);
    let late = UpdateTripRequest {
        trip_id: trip.id.clone(),
        ..Default::default()
    };
    assert_eq!(market.update_trip(&owner, late).await.unwrap_err().status_code(), 409);

    let fresh = posted_trip(&market, &owner, dec!(30000), dec!(12)).await;
    market.delete_trip(&owner, &fresh.id).await.unwrap();
    assert_eq!(market.get_trip(&fresh.id).await.unwrap_err().status_code(), 404);
}

// =========================================================
// 出价
// =========================================================

#[tokio::test]
async fn place_bid_escrows_funds_and_notifies_owner() {
    let (market, _clock) = market();
    let owner = approved(&market, Role::LoadOwner, "Asha").await;
    let lender = lender(&market, "Lena").await;
    let trip = posted_trip(&market, &owner, dec!(20000), dec!(12)).await;

    let placed = market.place_bid(&lender, bid(&trip.id, dec!(12))).await.unwrap();
    assert_eq!(placed.amount, dec!(20000));

    let wallet = market.wallet(&lender.id).await.unwrap();
    assert_eq!(wallet.balance, dec!(30000));
    assert_eq!(wallet.escrowed_amount, dec!(20000));

    let trip = market.get_trip(&trip.id).await.unwrap();
    assert_eq!(trip.status, TripStatus::Escrowed);
    assert_eq!(trip.bids.len(), 1);

    let investment = market.investment_for_bid(&placed.id).await.unwrap().unwrap();
    assert_eq!(investment.status, InvestmentStatus::Escrowed);
    assert_eq!(investment.expected_return, dec!(197.26));

    let notes = market.notifications(&owner, &unread_notes()).await.unwrap();
    assert_eq!(notes[0].kind, NotificationType::BidReceived);
}

#[tokio::test]
async fn place_bid_rules() {
    let (market, _clock) = market();
    let owner = approved(&market, Role::LoadOwner, "Asha").await;
    let rich = lender(&market, "Lena").await;
    let poor = funded(&market, Role::Lender, "Pia", dec!(5000)).await;
    let pending = registered(&market, Role::Lender, "Omar").await;
    let trip = posted_trip(&market, &owner, dec!(20000), dec!(12)).await;

    let partial = PlaceBidRequest {
        amount: Some(dec!(10000)),
        ..bid(&trip.id, dec!(12))
    };
    assert_eq!(market.place_bid(&rich, partial).await.unwrap_err().status_code(), 400);
    assert_eq!(
        market.place_bid(&rich, bid(&trip.id, dec!(25))).await.unwrap_err().status_code(),
        400
    );
    assert_eq!(
        market.place_bid(&owner, bid(&trip.id, dec!(12))).await.unwrap_err().status,
        MarketErrorStatus::Forbidden
    );
    assert_eq!(
        market.place_bid(&pending, bid(&trip.id, dec!(12))).await.unwrap_err().status,
        MarketErrorStatus::Forbidden
    );

    let err = market.place_bid(&poor, bid(&trip.id, dec!(12))).await.unwrap_err();
    assert_eq!(err.status, MarketErrorStatus::InsufficientFunds);
    assert_eq!(err.details().unwrap()["shortfall"], "15000");

    market.place_bid(&rich, bid(&trip.id, dec!(12))).await.unwrap();
    let err = market.place_bid(&rich, bid(&trip.id, dec!(11))).await.unwrap_err();
    assert_eq!(err.status, MarketErrorStatus::Conflict);
}

#[tokio::test]
async fn bids_listed_newest_first() {
    let (market, clock) = market();
    let owner = approved(&market, Role::LoadOwner, "Asha").await;
    let l1 = lender(&market, "Lena").await;
    let l2 = lender(&market, "Omar").await;
    let trip = posted_trip(&market, &owner, dec!(20000), dec!(12)).await;

    market.place_bid(&l1, bid(&trip.id, dec!(12))).await.unwrap();
    clock.advance_hours(2);
    market.place_bid(&l2, bid(&trip.id, dec!(10))).await.unwrap();

    let bids = market.list_bids(&trip.id).await.unwrap();
    assert_eq!(bids[0].lender_id, l2.id);
    assert_eq!(bids[1].lender_id, l1.id);
}

// =========================================================
// 分配
// =========================================================

#[tokio::test]
async fn allot_funds_trip_and_refunds_losers() {
    let (market, _clock) = market();
    let root = admin(&market).await;
    let owner = approved(&market, Role::LoadOwner, "Asha").await;
    let winner = lender(&market, "Lena").await;
    let loser = lender(&market, "Omar").await;
    let trip = posted_trip(&market, &owner, dec!(20000), dec!(12)).await;

    let winning = market.place_bid(&winner, bid(&trip.id, dec!(11))).await.unwrap();
    market.place_bid(&loser, bid(&trip.id, dec!(13))).await.unwrap();

    let receipt = market
        .allot(
            &owner,
            AllotBidRequest {
                trip_id: trip.id.clone(),
                bid_id: winning.id.clone(),
            },
        )
        .await
        .unwrap();

    assert_eq!(receipt.trip.status, TripStatus::Funded);
    assert_eq!(receipt.trip.lender_id.as_deref(), Some(winner.id.as_str()));
    assert_eq!(receipt.trip.interest_rate, dec!(11));
    assert!(receipt.trip.funded_at.is_some());
    assert_eq!(receipt.refunded_bids, 1);

    // 0.5% 平台费
    assert_eq!(receipt.platform_fee.fee_amount, dec!(100));
    assert_eq!(receipt.borrower_wallet.balance, dec!(19900));
    assert_eq!(market.wallet(&root.id).await.unwrap().balance, dec!(100));

    let w = market.wallet(&winner.id).await.unwrap();
    assert_eq!(w.balance, dec!(30000));
    assert!(w.escrowed_amount.is_zero());
    assert_eq!(w.total_invested, dec!(20000));

    let l = market.wallet(&loser.id).await.unwrap();
    assert_eq!(l.balance, dec!(50000));
    assert!(l.escrowed_amount.is_zero());

    assert_eq!(receipt.investment.status, InvestmentStatus::Active);
    assert_eq!(receipt.agreement.status, AgreementStatus::Active);
    assert_eq!(receipt.agreement.loan_amount, dec!(20000));

    let winner_notes = market.notifications(&winner, &all_notes()).await.unwrap();
    assert_eq!(winner_notes[0].kind, NotificationType::BidAllotted);
    let loser_notes = market.notifications(&loser, &all_notes()).await.unwrap();
    assert_eq!(loser_notes[0].kind, NotificationType::BidRefunded);

    let borrower_txn = &market.transactions(&owner.id, Some(1)).await.unwrap()[0];
    assert_eq!(borrower_txn.category, TransactionCategory::Payment);
}

#[tokio::test]
async fn allot_fee_goes_to_treasury_without_super_admin() {
    let (market, _clock) = market();
    let owner = approved(&market, Role::LoadOwner, "Asha").await;
    let lender = lender(&market, "Lena").await;
    let trip = posted_trip(&market, &owner, dec!(40000), dec!(12)).await;
    let placed = market.place_bid(&lender, bid(&trip.id, dec!(12))).await.unwrap();

    market
        .allot(
            &owner,
            AllotBidRequest {
                trip_id: trip.id.clone(),
                bid_id: placed.id,
            },
        )
        .await
        .unwrap();
    assert_eq!(market.wallet("platform").await.unwrap().balance, dec!(200));
}

#[tokio::test]
async fn allot_guards() {
    let (market, _clock) = market();
    let owner = approved(&market, Role::LoadOwner, "Asha").await;
    let stranger = approved(&market, Role::LoadOwner, "Chitra").await;
    let lender = lender(&market, "Lena").await;
    let trip = posted_trip(&market, &owner, dec!(20000), dec!(12)).await;

    let on_pending = AllotBidRequest {
        trip_id: trip.id.clone(),
        bid_id: "nope".into(),
    };
    assert_eq!(
        market.allot(&owner, on_pending.clone()).await.unwrap_err().status,
        MarketErrorStatus::Conflict
    );

    let placed = market.place_bid(&lender, bid(&trip.id, dec!(12))).await.unwrap();
    assert_eq!(market.allot(&owner, on_pending).await.unwrap_err().status_code(), 404);

    let req = AllotBidRequest {
        trip_id: trip.id.clone(),
        bid_id: placed.id,
    };
    assert_eq!(
        market.allot(&stranger, req.clone()).await.unwrap_err().status,
        MarketErrorStatus::Forbidden
    );
    market.allot(&owner, req.clone()).await.unwrap();
    assert_eq!(market.allot(&owner, req).await.unwrap_err().status_code(), 409);
}

#[tokio::test]
async fn bulk_allot_picks_earliest_bid() {
    let (market, clock) = market();
    let owner = approved(&market, Role::LoadOwner, "Asha").await;
    let other = approved(&market, Role::LoadOwner, "Chitra").await;
    let early = lender(&market, "Lena").await;
    let late = lender(&market, "Omar").await;

    let t1 = posted_trip(&market, &owner, dec!(20000), dec!(12)).await;
    let t2 = posted_trip(&market, &owner, dec!(20000), dec!(12)).await;
    let foreign = posted_trip(&market, &other, dec!(20000), dec!(12)).await;
    market.place_bid(&early, bid(&t1.id, dec!(12))).await.unwrap();
    market.place_bid(&early, bid(&foreign.id, dec!(12))).await.unwrap();
    clock.advance_hours(1);
    market.place_bid(&late, bid(&t1.id, dec!(9))).await.unwrap();
    market.place_bid(&late, bid(&t2.id, dec!(9))).await.unwrap();

    let report = market.bulk_allot(&owner).await.unwrap();
    assert_eq!(report.allotted, 2);
    assert_eq!(report.failed, 0);

    let t1 = market.get_trip(&t1.id).await.unwrap();
    assert_eq!(t1.lender_id.as_deref(), Some(early.id.as_str()));
    let t2 = market.get_trip(&t2.id).await.unwrap();
    assert_eq!(t2.lender_id.as_deref(), Some(late.id.as_str()));
    assert_eq!(
        market.get_trip(&foreign.id).await.unwrap().status,
        TripStatus::Escrowed
    );

    let root = admin(&market).await;
    let report = market.bulk_allot(&root).await.unwrap();
    assert_eq!(report.trips, vec![foreign.id.clone()]);
}

#[tokio::test]
async fn bulk_allot_errors_name_the_trip() {
    let (market, _clock) = market();
    let owner = approved(&market, Role::LoadOwner, "Asha").await;
    let lena = lender(&market, "Lena").await;

    let good = posted_trip(&market, &owner, dec!(20000), dec!(12)).await;
    let broken = posted_trip(&market, &owner, dec!(20000), dec!(12)).await;
    market.place_bid(&lena, bid(&good.id, dec!(12))).await.unwrap();
    market.place_bid(&lena, bid(&broken.id, dec!(12))).await.unwrap();
    // 托管中却没有出价的行程
    let mut stripped = market.load_trip(&broken.id).await.unwrap();
    stripped.bids.clear();
    market.save_trip(&stripped).await.unwrap();

    let report = market.bulk_allot(&owner).await.unwrap();
    assert_eq!(report.allotted, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.trips, vec![good.id.clone()]);
    let err = &report.errors[0];
    assert_eq!(err.trip_id.as_deref(), Some(broken.id.as_str()));
    assert!(err.error.contains(&broken.id));

    let wire = serde_json::to_value(err).unwrap();
    assert_eq!(wire["tripId"], broken.id.as_str());
}

#[tokio::test]
async fn cancel_refunds_every_bid() {
    let (market, _clock) = market();
    let owner = approved(&market, Role::LoadOwner, "Asha").await;
    let l1 = lender(&market, "Lena").await;
    let l2 = lender(&market, "Omar").await;
    let trip = posted_trip(&market, &owner, dec!(20000), dec!(12)).await;
    let b1 = market.place_bid(&l1, bid(&trip.id, dec!(12))).await.unwrap();
    market.place_bid(&l2, bid(&trip.id, dec!(12))).await.unwrap();

    let cancelled = market
        .cancel_trip(
            &owner,
            CancelTripRequest {
                trip_id: trip.id.clone(),
                reason: Some("Load withdrawn".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status, TripStatus::Cancelled);

    for user in [&l1, &l2] {
        let w = market.wallet(&user.id).await.unwrap();
        assert_eq!(w.balance, dec!(50000));
        assert!(w.escrowed_amount.is_zero());
        let notes = market.notifications(user, &all_notes()).await.unwrap();
        assert!(notes[0].message.contains("Load withdrawn"));
    }
    let inv = market.investment_for_bid(&b1.id).await.unwrap().unwrap();
    assert_eq!(inv.status, InvestmentStatus::Refunded);

    let again = CancelTripRequest {
        trip_id: trip.id.clone(),
        reason: None,
    };
    assert_eq!(market.cancel_trip(&owner, again).await.unwrap_err().status_code(), 409);
}

// =========================================================
// 单据与运输
// =========================================================

#[tokio::test]
async fn transit_and_completion_require_documents() {
    let (market, clock) = market();
    let owner = approved(&market, Role::LoadOwner, "Asha").await;
    let lender = lender(&market, "Lena").await;
    let trip = posted_trip(&market, &owner, dec!(20000), dec!(12)).await;

    assert_eq!(market.start_transit(&owner, &trip.id).await.unwrap_err().status_code(), 409);

    let placed = market.place_bid(&lender, bid(&trip.id, dec!(12))).await.unwrap();
    market
        .allot(
            &owner,
            AllotBidRequest {
                trip_id: trip.id.clone(),
                bid_id: placed.id,
            },
        )
        .await
        .unwrap();

    market.upload_document(&owner, upload(&trip.id, DocumentType::Bilty)).await.unwrap();
    let err = market.start_transit(&owner, &trip.id).await.unwrap_err();
    assert_eq!(err.message(), "Missing required documents: E-Way Bill");
    market.upload_document(&owner, upload(&trip.id, DocumentType::Ewaybill)).await.unwrap();
    let started = market.start_transit(&owner, &trip.id).await.unwrap();
    assert_eq!(started.status, TripStatus::InTransit);

    let err = market.complete_trip(&owner, &trip.id).await.unwrap_err();
    assert_eq!(err.message(), "Missing required documents: Proof of Delivery, Final Invoice");
    market.upload_document(&owner, upload(&trip.id, DocumentType::Pod)).await.unwrap();
    market.upload_document(&owner, upload(&trip.id, DocumentType::FinalInvoice)).await.unwrap();

    clock.advance_days(3);
    let done = market.complete_trip(&owner, &trip.id).await.unwrap();
    assert_eq!(done.status, TripStatus::Completed);
    assert_eq!(done.completed_at, Some(start().add_days(3)));
    assert_eq!(done.documents.len(), 4);
}

#[tokio::test]
async fn document_reupload_replaces_previous() {
    let (market, _clock) = market();
    let owner = approved(&market, Role::LoadOwner, "Asha").await;
    let stranger = approved(&market, Role::Transporter, "Bala").await;
    let trip = posted_trip(&market, &owner, dec!(20000), dec!(12)).await;

    market.upload_document(&owner, upload(&trip.id, DocumentType::Bilty)).await.unwrap();
    let mut second = upload(&trip.id, DocumentType::Bilty);
    second.document_data = "data:image/png;base64,djI=".into();
    market.upload_document(&owner, second.clone()).await.unwrap();

    let trip = market.get_trip(&trip.id).await.unwrap();
    assert_eq!(trip.documents.len(), 1);
    assert_eq!(trip.document(DocumentType::Bilty).unwrap().content_type, "image/png");
    let content = market
        .get_document(&owner, &trip.id, DocumentType::Bilty)
        .await
        .unwrap();
    assert_eq!(content.document_data, "data:image/png;base64,djI=");

    assert_eq!(
        market.upload_document(&stranger, second).await.unwrap_err().status,
        MarketErrorStatus::Forbidden
    );
}
