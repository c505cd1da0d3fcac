//! 管理员工作台：账号审批、逾期名单、平台费统计、批量放款

use crate::auth::use_auth;
use crate::components::common::{
    Modal, StatCard, date, inr, severity_badge_class, use_notice, use_refresh,
};
use leptos::prelude::*;
use leptos::task::spawn_local;
use rust_decimal::Decimal;
use tripfin_shared::maturity::Defaulter;
use tripfin_shared::protocol::FeeStats;
use tripfin_shared::User;

/// 逾期名单的应收合计
fn outstanding_total(list: &[Defaulter]) -> Decimal {
    list.iter().map(|d| d.total_due).sum()
}

#[component]
pub fn AdminDashboard() -> impl IntoView {
    let auth = use_auth();
    let notice = use_notice();
    let tick = use_refresh();

    let (pending, set_pending) = signal(Vec::<User>::new());
    let (defaulters, set_defaulters) = signal(Vec::<Defaulter>::new());
    let (fees, set_fees) = signal(FeeStats::default());

    let rejecting = RwSignal::new(Option::<User>::None);
    let reject_open = RwSignal::new(false);
    let reason = RwSignal::new(String::new());

    Effect::new(move |_| {
        tick.get();
        let Some(api) = auth.api() else {
            return;
        };
        spawn_local(async move {
            match api.pending_approvals().await {
                Ok(list) => set_pending.set(list),
                Err(e) => notice.err(e),
            }
            if let Ok(list) = api.defaulters().await {
                set_defaulters.set(list);
            }
            if let Ok(stats) = api.fee_stats().await {
                set_fees.set(stats);
            }
        });
    });

    let approve = move |user_id: String| {
        let Some(api) = auth.api() else {
            return;
        };
        spawn_local(async move {
            if let Some(user) = notice.check(api.approve(&user_id).await) {
                notice.ok(format!("{} approved", user.name));
                set_pending.update(|list| list.retain(|u| u.id != user.id));
            }
        });
    };

    let confirm_reject = move |_| {
        let Some(user) = rejecting.get_untracked() else {
            return;
        };
        let text = reason.get_untracked().trim().to_string();
        if text.is_empty() {
            notice.err("A reason is required");
            return;
        }
        let Some(api) = auth.api() else {
            return;
        };
        reject_open.set(false);
        spawn_local(async move {
            if notice.check(api.reject(&user.id, text).await).is_some() {
                notice.ok(format!("{} rejected", user.name));
                set_pending.update(|list| list.retain(|u| u.id != user.id));
                reason.set(String::new());
            }
        });
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
        <div class="stats shadow w-full stats-vertical md:stats-horizontal bg-base-100">
            <StatCard title="Platform fees" value=Signal::derive(move || inr(fees.get().total_fees)) desc="collected at allotment" />
            <StatCard title="Loans funded" value=Signal::derive(move || fees.get().count.to_string()) />
            <StatCard title="Loan volume" value=Signal::derive(move || inr(fees.get().total_loan_volume)) />
            <StatCard title="Overdue" value=Signal::derive(move || inr(defaulters.with(|d| outstanding_total(d)))) />
        </div>

        <div class="card bg-base-100 shadow-xl">
            <div class="card-body p-0">
                <div class="flex items-center justify-between p-6 pb-2">
                    <h3 class="card-title">"Pending approvals"</h3>
                    <button class="btn btn-outline btn-sm" on:click=bulk_allot>"Allot all escrowed trips"</button>
                </div>
                <div class="overflow-x-auto w-full">
                    <table class="table w-full">
                        <thead>
                            <tr><th>"User"</th><th>"Role"</th><th>"Contact"</th><th>"Joined"</th><th></th></tr>
                        </thead>
                        <tbody>
                            {move || pending.with(|l| l.is_empty()).then(|| view! {
                                <tr><td colspan="5" class="text-center py-8 text-base-content/50">"No accounts awaiting review."</td></tr>
                            })}
                            <For
                                each=move || pending.get()
                                key=|u| u.id.clone()
                                children=move |user| {
                                    let id = user.id.clone();
                                    let target = user.clone();
                                    view! {
                                        <tr>
                                            <td>
                                                <div class="font-semibold">{user.name.clone()}</div>
                                                <div class="text-xs opacity-60">{user.user_id.clone()} " · " {user.company.clone().unwrap_or_default()}</div>
                                            </td>
                                            <td><span class="badge badge-outline">{user.role.label()}</span></td>
                                            <td class="text-sm">{user.email.clone()} <br/> {user.phone.clone()}</td>
                                            <td class="text-sm">{date(user.created_at)}</td>
                                            <td class="flex gap-1">
                                                <button class="btn btn-success btn-xs" on:click=move |_| approve(id.clone())>"Approve"</button>
                                                <button class="btn btn-ghost btn-xs text-error" on:click=move |_| {
                                                    rejecting.set(Some(target.clone()));
                                                    reject_open.set(true);
                                                }>"Reject"</button>
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

        <div class="card bg-base-100 shadow-xl">
            <div class="card-body p-0">
                <div class="p-6 pb-2">
                    <h3 class="card-title">"Defaulters"</h3>
                    <p class="text-base-content/70 text-sm">"Loans past maturity and not yet repaid, most overdue first."</p>
                </div>
                <div class="overflow-x-auto w-full">
                    <table class="table w-full">
                        <thead>
                            <tr><th>"Trip"</th><th>"Borrower"</th><th>"Lender"</th><th>"Matured"</th><th>"Overdue"</th><th>"Total due"</th></tr>
                        </thead>
                        <tbody>
                            {move || defaulters.with(|l| l.is_empty()).then(|| view! {
                                <tr><td colspan="6" class="text-center py-8 text-base-content/50">"No overdue loans."</td></tr>
                            })}
                            <For
                                each=move || defaulters.get()
                                key=|d| (d.trip.id.clone(), d.days_overdue)
                                children=move |d| view! {
                                    <tr>
                                        <td class="font-semibold">{d.trip.route_label()}</td>
                                        <td>{d.trip.load_owner_name.clone()}</td>
                                        <td>{d.trip.lender_name.clone().unwrap_or_default()}</td>
                                        <td>{date(d.maturity_date)}</td>
                                        <td>
                                            <span class=severity_badge_class(d.severity)>{d.severity.label()}</span>
                                            <div class="text-xs opacity-70">{format!("{} day(s)", d.days_overdue)}</div>
                                        </td>
                                        <td>
                                            <div>{inr(d.total_due)}</div>
                                            <div class="text-xs opacity-60">{format!("{} + {} interest", inr(d.principal), inr(d.interest_due))}</div>
                                        </td>
                                    </tr>
                                }
                            />
                        </tbody>
                    </table>
                </div>
            </div>
        </div>

        <Modal open=reject_open title="Reject account">
            <div class="space-y-4">
                {move || rejecting.get().map(|u| view! { <p>"Rejecting " <b>{u.name}</b> " (" {u.email} ")"</p> })}
                <textarea class="textarea textarea-bordered w-full" placeholder="Reason shown to the user"
                    prop:value=move || reason.get()
                    on:input=move |ev| reason.set(event_target_value(&ev))
                ></textarea>
            </div>
            <div class="modal-action">
                <button type="button" class="btn btn-ghost" on:click=move |_| reject_open.set(false)>"Cancel"</button>
                <button type="button" class="btn btn-error" on:click=confirm_reject>"Reject"</button>
            </div>
        </Modal>
    }
}
