//! 借款人 (货主/承运商) 工作台
//!
//! 行程生命周期：发布 -> 收到出价 -> 选定出借人放款 -> 上传单据发车 -> 结案 -> 还款 -> 评价。

mod bids;
mod bulk_upload;
mod documents;
mod rating;
mod repay;
mod trip_form;

use crate::auth::use_auth;
use crate::components::common::{StatusBadge, inr, percent, use_notice, use_refresh};
use bids::BidsDialog;
use bulk_upload::BulkUploadDialog;
use documents::DocumentsDialog;
use leptos::prelude::*;
use leptos::task::spawn_local;
use rating::RatingDialog;
use repay::RepayDialog;
use trip_form::CreateTripDialog;
use tripfin_shared::filter::TripFilter;
use tripfin_shared::maturity;
use tripfin_shared::pagination::{MAX_PAGE_SIZE, PageRequest};
use tripfin_shared::protocol::{BulkCreateReport, CreateTripRequest};
use tripfin_shared::{DocumentType, Timestamp, Trip, TripStatus};

/// 行程所处阶段允许的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TripAction {
    ViewBids,
    Cancel,
    Documents,
    StartTransit,
    Complete,
    Repay,
}

impl TripAction {
    fn label(&self) -> &'static str {
        match self {
            TripAction::ViewBids => "Bids",
            TripAction::Cancel => "Cancel",
            TripAction::Documents => "Documents",
            TripAction::StartTransit => "Start transit",
            TripAction::Complete => "Complete",
            TripAction::Repay => "Repay",
        }
    }

    fn class(&self) -> &'static str {
        match self {
            TripAction::Cancel => "btn btn-ghost btn-xs text-error",
            TripAction::Repay | TripAction::ViewBids => "btn btn-primary btn-xs",
            _ => "btn btn-outline btn-xs",
        }
    }
}

fn actions_for(trip: &Trip) -> Vec<TripAction> {
    use TripAction::*;
    match trip.status {
        TripStatus::Pending => vec![ViewBids, Cancel],
        TripStatus::Escrowed => vec![ViewBids, Cancel],
        TripStatus::Funded => {
            let mut v = vec![Documents];
            if trip.has_documents(&DocumentType::DISPATCH) {
                v.push(StartTransit);
            }
            v.push(Repay);
            v
        }
        TripStatus::InTransit => {
            let mut v = vec![Documents];
            if trip.has_documents(&DocumentType::DELIVERY) {
                v.push(Complete);
            }
            v.push(Repay);
            v
        }
        TripStatus::Completed => vec![Documents, Repay],
        TripStatus::Repaid | TripStatus::Cancelled => Vec::new(),
    }
}

/// 存续贷款的到期提示
fn maturity_hint(trip: &Trip, today: Timestamp) -> Option<String> {
    if !trip.status.is_outstanding() {
        return None;
    }
    maturity::days_until_maturity(trip, today.date_naive()).map(|d| match d {
        d if d > 0 => format!("due in {} day(s)", d),
        0 => "due today".to_string(),
        d => format!("{} day(s) overdue", -d),
    })
}

#[component]
pub fn BorrowerDashboard() -> impl IntoView {
    let auth = use_auth();
    let notice = use_notice();
    let tick = use_refresh();

    let (trips, set_trips) = signal(Vec::<Trip>::new());
    let (pending_ratings, set_pending_ratings) = signal(Vec::<Trip>::new());
    let (loading, set_loading) = signal(true);

    let selected = RwSignal::new(Option::<Trip>::None);
    let create_open = RwSignal::new(false);
    let bulk_open = RwSignal::new(false);
    let bids_open = RwSignal::new(false);
    let docs_open = RwSignal::new(false);
    let repay_open = RwSignal::new(false);
    let rating_open = RwSignal::new(false);
    let (bulk_result, set_bulk_result) = signal(Option::<BulkCreateReport>::None);

    Effect::new(move |_| {
        tick.get();
        let (Some(api), Some(user)) = (auth.api(), auth.state.with_untracked(|s| s.user.clone())) else {
            return;
        };
        spawn_local(async move {
            let filter = TripFilter {
                load_owner_id: Some(user.id.clone()),
                ..Default::default()
            };
            match api.trips(filter, PageRequest::new(1, MAX_PAGE_SIZE)).await {
                Ok(page) => {
                    // 打开中的对话框跟随最新数据
                    if let Some(current) = selected.get_untracked() {
                        if let Some(fresh) = page.items.iter().find(|t| t.id == current.id) {
                            selected.set(Some(fresh.clone()));
                        }
                    }
                    set_trips.set(page.items);
                }
                Err(e) => notice.err(e),
            }
            if let Ok(list) = api.pending_ratings(&user.id).await {
                set_pending_ratings.set(list);
            }
            set_loading.set(false);
        });
    });

    // 统一的 "调用 -> 提示 -> 刷新" 流程
    macro_rules! act {
        ($ok:expr, |$api:ident| $call:expr) => {{
            if let Some($api) = auth.api() {
                spawn_local(async move {
                    if notice.check($call.await).is_some() {
                        notice.ok($ok);
                        tick.bump();
                    }
                });
            }
        }};
    }

    let run_action = move |action: TripAction, trip: Trip| {
        selected.set(Some(trip.clone()));
        match action {
            TripAction::ViewBids => bids_open.set(true),
            TripAction::Documents => docs_open.set(true),
            TripAction::Repay => repay_open.set(true),
            TripAction::Cancel => act!("Trip cancelled, escrowed bids refunded", |api| api.cancel_trip(&trip.id, None)),
            TripAction::StartTransit => act!("Trip is now in transit", |api| api.start_transit(&trip.id)),
            TripAction::Complete => act!("Trip marked as delivered", |api| api.complete_trip(&trip.id)),
        }
    };

    let on_create = move |req: CreateTripRequest| {
        act!("Trip posted, lenders have been notified", |api| api.create_trip(req))
    };

    let on_bulk = move |drafts: Vec<CreateTripRequest>| {
        let Some(api) = auth.api() else {
            return;
        };
        spawn_local(async move {
            if let Some(report) = notice.check(api.bulk_create(drafts).await) {
                if report.created > 0 {
                    tick.bump();
                }
                set_bulk_result.set(Some(report));
            }
        });
    };

    let on_allot = move |(trip_id, bid_id): (String, String)| {
        bids_open.set(false);
        let Some(api) = auth.api() else {
            return;
        };
        spawn_local(async move {
            if let Some(receipt) = notice.check(api.allot(&trip_id, &bid_id).await) {
                auth.set_wallet(receipt.borrower_wallet);
                notice.ok(format!(
                    "Funded: {} credited after {} platform fee",
                    inr(receipt.platform_fee.loan_amount - receipt.platform_fee.fee_amount),
                    inr(receipt.platform_fee.fee_amount)
                ));
                tick.bump();
            }
        });
    };

    let on_upload = move |(trip_id, kind, data): (String, DocumentType, String)| {
        act!(format!("{} uploaded", kind.label()), |api| api.upload_document(&trip_id, kind, data))
    };

    let on_repay = move |trip_id: String| {
        repay_open.set(false);
        let Some(api) = auth.api() else {
            return;
        };
        spawn_local(async move {
            if let Some(receipt) = notice.check(api.repay(&trip_id).await) {
                auth.set_wallet(receipt.borrower_wallet);
                notice.ok(format!("Repaid {}", inr(receipt.repayment_details.total)));
                tick.bump();
            }
        });
    };

    let on_rate = move |(trip_id, stars, review): (String, u8, Option<String>)| {
        rating_open.set(false);
        act!("Thanks for the feedback", |api| api.rate(&trip_id, stars, review))
    };

    let bulk_allot = move |_| {
        let Some(api) = auth.api() else {
            return;
        };
        spawn_local(async move {
            if let Some(report) = notice.check(api.bulk_allot().await) {
                notice.ok(report.summary());
                tick.bump();
            }
        });
    };

    view! {
        {move || (!pending_ratings.with(|l| l.is_empty())).then(|| view! {
            <div class="alert alert-info">
                <span>"You have repaid loans waiting for a lender rating."</span>
                <div class="flex gap-2 flex-wrap">
                    {pending_ratings.get().into_iter().map(|t| {
                        let label = t.route_label();
                        view! {
                            <button class="btn btn-sm" on:click=move |_| {
                                selected.set(Some(t.clone()));
                                rating_open.set(true);
                            }>{format!("Rate: {}", label)}</button>
                        }
                    }).collect_view()}
                </div>
            </div>
        })}

        <div class="card bg-base-100 shadow-xl">
            <div class="card-body p-0">
                <div class="flex flex-wrap items-center justify-between gap-2 p-6 pb-2">
                    <div>
                        <h3 class="card-title">"My trips"</h3>
                        <p class="text-base-content/70 text-sm">"Post trips, pick lenders and track repayment."</p>
                    </div>
                    <div class="flex gap-2">
                        <button class="btn btn-ghost btn-sm" on:click=bulk_allot>"Allot all escrowed"</button>
                        <button class="btn btn-outline btn-sm" on:click=move |_| { set_bulk_result.set(None); bulk_open.set(true); }>"Bulk upload"</button>
                        <button class="btn btn-primary btn-sm" on:click=move |_| create_open.set(true)>"New trip"</button>
                    </div>
                </div>

                <div class="overflow-x-auto w-full">
                    <table class="table table-zebra w-full">
                        <thead>
                            <tr>
                                <th>"Route"</th>
                                <th>"Amount"</th>
                                <th>"Rate"</th>
                                <th>"Lender"</th>
                                <th>"Status"</th>
                                <th></th>
                            </tr>
                        </thead>
                        <tbody>
                            {move || (loading.get() && trips.with(|t| t.is_empty())).then(|| view! {
                                <tr><td colspan="6" class="text-center py-8"><span class="loading loading-spinner loading-md"></span></td></tr>
                            })}
                            {move || (!loading.get() && trips.with(|t| t.is_empty())).then(|| view! {
                                <tr><td colspan="6" class="text-center py-8 text-base-content/50">"No trips yet. Post one to start receiving bids."</td></tr>
                            })}
                            <For
                                each=move || trips.get()
                                key=|t| (t.id.clone(), t.status, t.bids.len(), t.documents.len())
                                children=move |trip| {
                                    let hint = maturity_hint(&trip, Timestamp::now());
                                    let actions = actions_for(&trip);
                                    let bid_count = trip.bids.len();
                                    view! {
                                        <tr>
                                            <td>
                                                <div class="font-semibold">{trip.route_label()}</div>
                                                <div class="text-xs opacity-60">{trip.load_type.clone()}</div>
                                            </td>
                                            <td>{inr(trip.amount)}</td>
                                            <td>{percent(trip.interest_rate)}</td>
                                            <td>{trip.lender_name.clone().unwrap_or_else(|| "-".to_string())}</td>
                                            <td>
                                                <StatusBadge status=trip.status />
                                                {hint.map(|h| view! { <div class="text-xs opacity-70">{h}</div> })}
                                            </td>
                                            <td class="flex flex-wrap gap-1">
                                                {actions.into_iter().map(|action| {
                                                    let t = trip.clone();
                                                    let label = if action == TripAction::ViewBids {
                                                        format!("{} ({})", action.label(), bid_count)
                                                    } else {
                                                        action.label().to_string()
                                                    };
                                                    view! {
                                                        <button class=action.class() on:click=move |_| run_action(action, t.clone())>{label}</button>
                                                    }
                                                }).collect_view()}
                                            </td>
                                        </tr>
                                    }
                                }
                            />
                        </tbody>
                    </table>
                </div>
            </div>
        </div>

        <CreateTripDialog open=create_open on_create=on_create />
        <BulkUploadDialog open=bulk_open on_submit=on_bulk result=bulk_result />
        <BidsDialog open=bids_open trip=selected on_allot=on_allot />
        <DocumentsDialog open=docs_open trip=selected on_upload=on_upload />
        <RepayDialog open=repay_open trip=selected on_repay=on_repay />
        <RatingDialog open=rating_open trip=selected on_rate=on_rate />
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tripfin_shared::{RiskLevel, TripDocument};

    fn trip(status: TripStatus) -> Trip {
        Trip {
            id: "t1".into(),
            origin: "Mumbai".into(),
            destination: "Pune".into(),
            sender: None,
            receiver: None,
            transporter: None,
            eway_bill_number: None,
            load_type: "General".into(),
            weight: dec!(0),
            distance: dec!(0),
            amount: dec!(20000),
            interest_rate: dec!(12),
            maturity_days: 30,
            risk_level: RiskLevel::Low,
            status,
            load_owner_id: "o1".into(),
            load_owner_name: "Asha".into(),
            lender_id: None,
            lender_name: None,
            bids: Vec::new(),
            documents: Vec::new(),
            has_rating: false,
            created_at: Timestamp::new(0),
            funded_at: Some(Timestamp::new(0)),
            completed_at: None,
            repaid_at: None,
        }
    }

    fn doc(kind: DocumentType) -> TripDocument {
        TripDocument {
            document_type: kind,
            content_type: "application/pdf".into(),
            size: 32,
            version: 1,
            chunks: 1,
            uploaded_by: "o1".into(),
            uploaded_at: Timestamp::new(0),
        }
    }

    #[test]
    fn transit_needs_dispatch_documents() {
        let mut funded = trip(TripStatus::Funded);
        assert!(!actions_for(&funded).contains(&TripAction::StartTransit));
        funded.documents = vec![doc(DocumentType::Bilty), doc(DocumentType::Ewaybill)];
        assert!(actions_for(&funded).contains(&TripAction::StartTransit));
        assert!(actions_for(&funded).contains(&TripAction::Repay));
    }

    #[test]
    fn closed_trips_have_no_actions() {
        assert!(actions_for(&trip(TripStatus::Repaid)).is_empty());
        assert!(actions_for(&trip(TripStatus::Cancelled)).is_empty());
        assert_eq!(
            actions_for(&trip(TripStatus::Pending)),
            vec![TripAction::ViewBids, TripAction::Cancel]
        );
    }

    #[test]
    fn maturity_hint_counts_down() {
        let funded = trip(TripStatus::Funded);
        let start = Timestamp::new(0);
        assert_eq!(maturity_hint(&funded, start.add_days(20)).as_deref(), Some("due in 10 day(s)"));
        assert_eq!(maturity_hint(&funded, start.add_days(30)).as_deref(), Some("due today"));
        assert_eq!(maturity_hint(&funded, start.add_days(33)).as_deref(), Some("3 day(s) overdue"));
        assert!(maturity_hint(&trip(TripStatus::Pending), start).is_none());
    }
}
