use super::super::test_support::*;
use crate::error::MarketErrorStatus;
use crate::market::adapter::StorageAdapter;
use rust_decimal_macros::dec;
use tripfin_shared::protocol::LoginRequest;
use tripfin_shared::{ApprovalStatus, NotificationType, Role};

#[tokio::test]
async fn signup_assigns_sequential_ids_and_wallet() {
    let (market, _clock) = market();
    let first = market
        .signup(signup_request(Role::LoadOwner, "Asha"))
        .await
        .unwrap();
    let second = market
        .signup(signup_request(Role::Transporter, "Bala"))
        .await
        .unwrap();

    assert_eq!(first.user.user_id, "USR000001");
    assert_eq!(second.user.user_id, "USR000002");
    assert_eq!(first.wallet.user_id, first.user.id);
    assert!(first.wallet.balance.is_zero());
    assert!(!first.token.is_empty());
    assert_eq!(first.user.approval_status, ApprovalStatus::Approved);
}

#[tokio::test]
async fn lenders_start_pending_and_emails_are_unique() {
    let (market, _clock) = market();
    let lender = registered(&market, Role::Lender, "Lena").await;
    assert_eq!(lender.approval_status, ApprovalStatus::Pending);

    let mut dup = signup_request(Role::LoadOwner, "Other");
    dup.email = "  LENA@Example.com ".to_string();
    let err = market.signup(dup).await.unwrap_err();
    assert_eq!(err.status, MarketErrorStatus::Conflict);
}

#[tokio::test]
async fn signup_validation() {
    let (market, _clock) = market();

    let mut short = signup_request(Role::LoadOwner, "Asha");
    short.password = "12345".to_string();
    assert_eq!(market.signup(short).await.unwrap_err().status_code(), 400);

    let mut bad_email = signup_request(Role::LoadOwner, "Asha");
    bad_email.email = "not-an-email".to_string();
    assert_eq!(market.signup(bad_email).await.unwrap_err().status_code(), 400);

    let self_admin = signup_request(Role::Admin, "Mallory");
    assert_eq!(market.signup(self_admin).await.unwrap_err().status_code(), 400);
}

#[tokio::test]
async fn configured_email_becomes_super_admin() {
    let (market, _clock) = market();
    let root = admin(&market).await;
    assert_eq!(root.role, Role::SuperAdmin);
    assert!(root.is_approved());
    assert_eq!(market.fee_recipient().await.unwrap(), root.id);
}

#[tokio::test]
async fn fee_recipient_falls_back_to_treasury() {
    let (market, _clock) = market();
    assert_eq!(market.fee_recipient().await.unwrap(), "platform");
}

#[tokio::test]
async fn login_and_session_lifecycle() {
    let (market, clock) = market();
    registered(&market, Role::LoadOwner, "Asha").await;

    let wrong = market
        .login(LoginRequest {
            email: "asha@example.com".into(),
            password: "nope-nope".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(wrong.status, MarketErrorStatus::Unauthorized);

    let auth = market
        .login(LoginRequest {
            email: "ASHA@example.com".into(),
            password: "secret-pass".into(),
        })
        .await
        .unwrap();
    let me = market.authenticate(Some(&auth.token)).await.unwrap();
    assert_eq!(me.id, auth.user.id);

    // 7 天后过期
    clock.advance_hours(168);
    let expired = market.authenticate(Some(&auth.token)).await.unwrap_err();
    assert_eq!(expired.status_code(), 401);
}

#[tokio::test]
async fn logout_invalidates_token() {
    let (market, _clock) = market();
    let auth = market
        .signup(signup_request(Role::Transporter, "Bala"))
        .await
        .unwrap();
    market.logout(Some(&auth.token)).await.unwrap();
    assert!(market.authenticate(Some(&auth.token)).await.is_err());
    assert!(market.authenticate(None).await.is_err());
}

#[tokio::test]
async fn approval_flow_notifies_user() {
    let (market, _clock) = market();
    let root = admin(&market).await;
    let lender = registered(&market, Role::Lender, "Lena").await;
    let other = registered(&market, Role::Lender, "Omar").await;

    let pending = market.pending_approvals(&root).await.unwrap();
    assert_eq!(pending.len(), 2);

    let approved = market.approve_user(&root, &lender.id).await.unwrap();
    assert!(approved.is_approved());
    assert_eq!(approved.approved_by.as_deref(), Some(root.id.as_str()));

    let err = market.reject_user(&root, &other.id, "  ").await.unwrap_err();
    assert_eq!(err.status_code(), 400);
    let rejected = market
        .reject_user(&root, &other.id, "Incomplete documents")
        .await
        .unwrap();
    assert_eq!(rejected.approval_status, ApprovalStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Incomplete documents"));

    let notes = market.notifications(&lender, &all_notes()).await.unwrap();
    assert_eq!(notes[0].kind, NotificationType::AccountApproved);
    let notes = market.notifications(&other, &all_notes()).await.unwrap();
    assert_eq!(notes[0].kind, NotificationType::AccountRejected);
    assert!(market.pending_approvals(&root).await.unwrap().is_empty());
}

#[tokio::test]
async fn user_admin_requires_admin_role() {
    let (market, _clock) = market();
    let owner = approved(&market, Role::LoadOwner, "Asha").await;
    let err = market.list_users(&owner, None).await.unwrap_err();
    assert_eq!(err.status, MarketErrorStatus::Forbidden);

    let root = admin(&market).await;
    let lenders = market.list_users(&root, Some(Role::Lender)).await.unwrap();
    assert!(lenders.is_empty());
    assert_eq!(market.list_users(&root, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn change_role_to_lender_requires_review() {
    let (market, _clock) = market();
    let owner = approved(&market, Role::LoadOwner, "Asha").await;
    let updated = market.change_role(&owner, Role::Lender).await.unwrap();
    assert_eq!(updated.role, Role::Lender);
    assert_eq!(updated.approval_status, ApprovalStatus::Pending);

    let err = market.change_role(&updated, Role::SuperAdmin).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn pending_lender_switching_to_borrower_can_post_trips() {
    let (market, _clock) = market();
    let root = admin(&market).await;
    let lender = registered(&market, Role::Lender, "Lena").await;
    let other = registered(&market, Role::Lender, "Omar").await;
    market
        .reject_user(&root, &other.id, "Incomplete documents")
        .await
        .unwrap();
    let other = market.load_user(&other.id).await.unwrap();

    for (user, role) in [(&lender, Role::LoadOwner), (&other, Role::Transporter)] {
        let switched = market.change_role(user, role).await.unwrap();
        assert_eq!(switched.role, role);
        assert_eq!(switched.approval_status, ApprovalStatus::Approved);
        assert!(switched.rejection_reason.is_none());

        let trip = market
            .create_trip(&switched, draft(dec!(25000), dec!(12)))
            .await
            .unwrap();
        assert_eq!(trip.load_owner_id, switched.id);
    }
}

#[tokio::test]
async fn credentials_store_a_salted_pbkdf2_hash() {
    let (market, _clock) = market();
    registered(&market, Role::LoadOwner, "Asha").await;

    let stored: serde_json::Value = market
        .storage()
        .get("cred:asha@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["rounds"], TEST_HASH_ROUNDS);
    let hash = stored["hash"].as_str().unwrap();
    assert_eq!(hash.len(), 64);
    assert!(!hash.contains("secret-pass"));
    assert!(crate::utils::secret::verify_password(
        stored["salt"].as_str().unwrap(),
        "secret-pass",
        TEST_HASH_ROUNDS,
        hash,
    ));
}
