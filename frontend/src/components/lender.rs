//! 出借人工作台：投资机会、出价、持仓与收益统计

use crate::auth::use_auth;
use crate::components::common::{
    Modal, StatCard, StatusBadge, date, inr, parse_decimal, percent, use_notice, use_refresh,
};
use crate::web::SessionStorage;
use leptos::prelude::*;
use leptos::task::spawn_local;
use rust_decimal::Decimal;
use tripfin_shared::filter::TripFilter;
use tripfin_shared::finance::{self, expected_return};
use tripfin_shared::pagination::{DEFAULT_PAGE_SIZE, Page, PageRequest};
use tripfin_shared::protocol::InvestmentStats;
use tripfin_shared::{Investment, InvestmentStatus, RiskLevel, Timestamp, Trip, TripStatus};

/// 本标签页内已确认过风险提示
const QUESTIONNAIRE_KEY: &str = "tripfin_questionnaire_shown";

fn risk_from_str(raw: &str) -> Option<RiskLevel> {
    match raw {
        "low" => Some(RiskLevel::Low),
        "medium" => Some(RiskLevel::Medium),
        "high" => Some(RiskLevel::High),
        _ => None,
    }
}

fn risk_label(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::Low => "Low",
        RiskLevel::Medium => "Medium",
        RiskLevel::High => "High",
    }
}

/// 距到期天数；负数表示已逾期
fn days_left(investment: &Investment, today: Timestamp) -> i64 {
    (investment.maturity_date.date_naive() - today.date_naive()).num_days()
}

fn countdown(investment: &Investment, today: Timestamp) -> String {
    match investment.status {
        InvestmentStatus::Active | InvestmentStatus::Defaulted => match days_left(investment, today) {
            d if d > 0 => format!("{} day(s) left", d),
            0 => "Due today".to_string(),
            d => format!("{} day(s) overdue", -d),
        },
        InvestmentStatus::Escrowed => "Awaiting allotment".to_string(),
        InvestmentStatus::Completed => "Repaid".to_string(),
        InvestmentStatus::Refunded => "Refunded".to_string(),
    }
}

/// 出价前的本地检查，后端同样会校验
fn check_bid(rate_raw: &str) -> Result<Decimal, String> {
    let rate = parse_decimal(rate_raw).ok_or_else(|| "Enter an interest rate".to_string())?;
    finance::validate_interest_rate(rate)?;
    Ok(rate)
}

#[component]
pub fn LenderDashboard() -> impl IntoView {
    let auth = use_auth();
    let tick = use_refresh();
    let (stats, set_stats) = signal(InvestmentStats::default());

    Effect::new(move |_| {
        tick.get();
        let (Some(api), Some(user)) = (auth.api(), auth.state.with_untracked(|s| s.user.clone())) else {
            return;
        };
        spawn_local(async move {
            if let Ok(s) = api.investment_stats(&user.id).await {
                set_stats.set(s);
            }
        });
    });

    view! {
        <div class="stats shadow w-full stats-vertical md:stats-horizontal bg-base-100">
            <StatCard title="Active loans" value=Signal::derive(move || stats.get().active_count.to_string()) />
            <StatCard title="In escrow" value=Signal::derive(move || stats.get().escrowed_count.to_string()) desc="bids awaiting allotment" />
            <StatCard title="Expected returns" value=Signal::derive(move || inr(stats.get().expected_returns)) />
            <StatCard title="Earned" value=Signal::derive(move || inr(stats.get().total_returns)) />
            <StatCard title="Defaulted" value=Signal::derive(move || stats.get().defaulted_count.to_string()) />
        </div>
        <Opportunities />
        <MyInvestments />
    }
}

#[component]
fn Opportunities() -> impl IntoView {
    let auth = use_auth();
    let notice = use_notice();
    let tick = use_refresh();

    let search = RwSignal::new(String::new());
    let risk = RwSignal::new(Option::<RiskLevel>::None);
    let min_amount = RwSignal::new(String::new());
    let max_amount = RwSignal::new(String::new());
    let status = RwSignal::new(TripStatus::Pending);
    let page_no = RwSignal::new(1usize);
    let (page, set_page) = signal(Option::<Page<Trip>>::None);

    let bidding = RwSignal::new(Option::<Trip>::None);
    let bid_open = RwSignal::new(false);
    let questionnaire_open = RwSignal::new(false);

    Effect::new(move |_| {
        tick.get();
        let filter = TripFilter {
            status: Some(status.get()),
            risk_level: risk.get(),
            min_amount: parse_decimal(&min_amount.get()),
            max_amount: parse_decimal(&max_amount.get()),
            search: Some(search.get()).filter(|s| !s.trim().is_empty()),
            ..Default::default()
        };
        let request = PageRequest::new(page_no.get(), DEFAULT_PAGE_SIZE);
        let Some(api) = auth.api() else {
            return;
        };
        spawn_local(async move {
            match api.trips(filter, request).await {
                Ok(p) => set_page.set(Some(p)),
                Err(e) => notice.err(e),
            }
        });
    });

    // 筛选条件变化时回到第一页
    let reset_page = move || page_no.set(1);

    let open_bid = move |trip: Trip| {
        bidding.set(Some(trip));
        if SessionStorage::get(QUESTIONNAIRE_KEY).is_none() {
            questionnaire_open.set(true);
        } else {
            bid_open.set(true);
        }
    };

    let acknowledge = move |_| {
        SessionStorage::set(QUESTIONNAIRE_KEY, "1");
        questionnaire_open.set(false);
        bid_open.set(true);
    };

    view! {
        <div class="card bg-base-100 shadow-xl">
            <div class="card-body p-0">
                <div class="p-6 pb-2 space-y-4">
                    <div>
                        <h3 class="card-title">"Investment opportunities"</h3>
                        <p class="text-base-content/70 text-sm">"Bid on a trip's full loan amount; funds stay in escrow until the borrower allots."</p>
                    </div>
                    <div class="flex flex-wrap gap-2">
                        <input type="text" placeholder="Search route, load type, e-way bill"
                            class="input input-bordered input-sm w-64"
                            prop:value=move || search.get()
                            on:input=move |ev| { search.set(event_target_value(&ev)); reset_page(); }
                        />
                        <select class="select select-bordered select-sm"
                            on:change=move |ev| {
                                status.set(if event_target_value(&ev) == "escrowed" { TripStatus::Escrowed } else { TripStatus::Pending });
                                reset_page();
                            }
                        >
                            <option value="pending">"No bids yet"</option>
                            <option value="escrowed">"Has bids"</option>
                        </select>
                        <select class="select select-bordered select-sm"
                            on:change=move |ev| { risk.set(risk_from_str(&event_target_value(&ev))); reset_page(); }
                        >
                            <option value="">"Any risk"</option>
                            <option value="low">"Low"</option>
                            <option value="medium">"Medium"</option>
                            <option value="high">"High"</option>
                        </select>
                        <input type="text" inputmode="decimal" placeholder="Min ₹"
                            class="input input-bordered input-sm w-28"
                            prop:value=move || min_amount.get()
                            on:change=move |ev| { min_amount.set(event_target_value(&ev)); reset_page(); }
                        />
                        <input type="text" inputmode="decimal" placeholder="Max ₹"
                            class="input input-bordered input-sm w-28"
                            prop:value=move || max_amount.get()
                            on:change=move |ev| { max_amount.set(event_target_value(&ev)); reset_page(); }
                        />
                    </div>
                </div>

                <div class="overflow-x-auto w-full">
                    <table class="table table-zebra w-full">
                        <thead>
                            <tr>
                                <th>"Route"</th>
                                <th>"Load"</th>
                                <th>"Amount"</th>
                                <th>"Rate"</th>
                                <th class="hidden md:table-cell">"Term"</th>
                                <th class="hidden md:table-cell">"Risk"</th>
                                <th>"Status"</th>
                                <th></th>
                            </tr>
                        </thead>
                        <tbody>
                            {move || page.with(|p| p.as_ref().is_some_and(|p| p.items.is_empty())).then(|| view! {
                                <tr><td colspan="8" class="text-center py-8 text-base-content/50">"No trips match these filters."</td></tr>
                            })}
                            <For
                                each=move || page.get().map(|p| p.items).unwrap_or_default()
                                key=|t| (t.id.clone(), t.status)
                                children=move |trip| {
                                    let t = trip.clone();
                                    view! {
                                        <tr>
                                            <td class="font-semibold">{trip.route_label()}</td>
                                            <td>{trip.load_type.clone()}</td>
                                            <td>{inr(trip.amount)}</td>
                                            <td>{percent(trip.interest_rate)}</td>
                                            <td class="hidden md:table-cell">{format!("{} days", trip.maturity_days)}</td>
                                            <td class="hidden md:table-cell">{risk_label(trip.risk_level)}</td>
                                            <td><StatusBadge status=trip.status /></td>
                                            <td>
                                                <button class="btn btn-primary btn-sm" on:click=move |_| open_bid(t.clone())>"Bid"</button>
                                            </td>
                                        </tr>
                                    }
                                }
                            />
                        </tbody>
                    </table>
                </div>

                <div class="flex items-center justify-between p-4">
                    <span class="text-sm opacity-70">
                        {move || page.get().map(|p| format!("Page {} of {} · {} trips", p.page, p.total_pages.max(1), p.total_items))}
                    </span>
                    <div class="join">
                        <button class="join-item btn btn-sm"
                            disabled=move || !page.with(|p| p.as_ref().is_some_and(|p| p.has_prev()))
                            on:click=move |_| page_no.update(|n| *n = n.saturating_sub(1).max(1))
                        >"«"</button>
                        <button class="join-item btn btn-sm"
                            disabled=move || !page.with(|p| p.as_ref().is_some_and(|p| p.has_next()))
                            on:click=move |_| page_no.update(|n| *n += 1)
                        >"»"</button>
                    </div>
                </div>
            </div>
        </div>

        <Modal open=questionnaire_open title="Before you invest">
            <ul class="list-disc pl-5 space-y-2 text-sm">
                <li>"Your bid amount is held in escrow until the borrower picks a lender."</li>
                <li>"If another lender is allotted, your escrow is refunded in full."</li>
                <li>"Interest accrues daily; early repayment means less interest."</li>
                <li>"Borrowers can default. Only invest what you can afford to lose."</li>
            </ul>
            <div class="modal-action">
                <button class="btn btn-ghost" on:click=move |_| questionnaire_open.set(false)>"Cancel"</button>
                <button class="btn btn-primary" on:click=acknowledge>"I understand"</button>
            </div>
        </Modal>

        <BidDialog open=bid_open trip=bidding />
    }
}

#[component]
fn BidDialog(open: RwSignal<bool>, trip: RwSignal<Option<Trip>>) -> impl IntoView {
    let auth = use_auth();
    let notice = use_notice();
    let tick = use_refresh();
    let rate = RwSignal::new(String::new());
    let (loading, set_loading) = signal(false);

    // 打开时用行程的期望利率预填
    Effect::new(move |_| {
        if open.get() {
            if let Some(t) = trip.get_untracked() {
                rate.set(t.interest_rate.normalize().to_string());
            }
        }
    });

    let preview = move || {
        let t = trip.get()?;
        let r = parse_decimal(&rate.get())?;
        Some(expected_return(t.amount, r, t.maturity_days))
    };

    let on_submit = move |ev: leptos::web_sys::SubmitEvent| {
        ev.prevent_default();
        let Some(t) = trip.get_untracked() else {
            return;
        };
        let value = match check_bid(&rate.get_untracked()) {
            Ok(v) => v,
            Err(e) => {
                notice.err(e);
                return;
            }
        };
        let Some(api) = auth.api() else {
            return;
        };
        set_loading.set(true);
        spawn_local(async move {
            if notice.check(api.place_bid(&t.id, value).await).is_some() {
                notice.ok(format!("{} moved to escrow for {}", inr(t.amount), t.route_label()));
                open.set(false);
                tick.bump();
            }
            set_loading.set(false);
        });
    };

    view! {
        <Modal open=open title="Place a bid">
            <form on:submit=on_submit class="space-y-4">
                {move || trip.get().map(|t| view! {
                    <div class="bg-base-200 rounded-lg p-4 text-sm space-y-1">
                        <div class="font-semibold">{t.route_label()}</div>
                        <div>"Loan amount: " {inr(t.amount)}</div>
                        <div>"Term: " {t.maturity_days} " days · Borrower asks " {percent(t.interest_rate)}</div>
                        <div>"Bids so far: " {t.bids.len()}</div>
                    </div>
                })}
                <div class="form-control">
                    <label class="label"><span class="label-text">"Your annual rate (%)"</span></label>
                    <input type="text" inputmode="decimal" required
                        class="input input-bordered w-full"
                        prop:value=move || rate.get()
                        on:input=move |ev| rate.set(event_target_value(&ev))
                    />
                    <label class="label">
                        <span class="label-text-alt">
                            {move || preview().map(|r| format!("Expected interest over the full term: {}", inr(r))).unwrap_or_default()}
                        </span>
                    </label>
                </div>
                <div class="modal-action">
                    <button type="button" class="btn btn-ghost" on:click=move |_| open.set(false)>"Cancel"</button>
                    <button type="submit" class="btn btn-primary" disabled=move || loading.get()>
                        {move || if loading.get() {
                            view! { <span class="loading loading-spinner"></span> "Placing..." }.into_any()
                        } else {
                            "Confirm bid".into_any()
                        }}
                    </button>
                </div>
            </form>
        </Modal>
    }
}

#[component]
fn MyInvestments() -> impl IntoView {
    let auth = use_auth();
    let tick = use_refresh();
    let (items, set_items) = signal(Vec::<Investment>::new());

    Effect::new(move |_| {
        tick.get();
        let (Some(api), Some(user)) = (auth.api(), auth.state.with_untracked(|s| s.user.clone())) else {
            return;
        };
        spawn_local(async move {
            if let Ok(list) = api.investments(&user.id).await {
                set_items.set(list);
            }
        });
    });

    view! {
        <div class="card bg-base-100 shadow-xl">
            <div class="card-body p-0">
                <div class="p-6 pb-2">
                    <h3 class="card-title">"My investments"</h3>
                </div>
                <div class="overflow-x-auto w-full">
                    <table class="table w-full">
                        <thead>
                            <tr>
                                <th>"Invested"</th>
                                <th>"Amount"</th>
                                <th>"Rate"</th>
                                <th>"Expected return"</th>
                                <th>"Maturity"</th>
                                <th>"Status"</th>
                            </tr>
                        </thead>
                        <tbody>
                            {move || items.with(|l| l.is_empty()).then(|| view! {
                                <tr><td colspan="6" class="text-center py-8 text-base-content/50">"No investments yet."</td></tr>
                            })}
                            <For
                                each=move || items.get()
                                key=|i| (i.id.clone(), i.status)
                                children=move |inv| {
                                    let today = Timestamp::now();
                                    let overdue = inv.status == InvestmentStatus::Defaulted
                                        || (inv.status == InvestmentStatus::Active && days_left(&inv, today) < 0);
                                    view! {
                                        <tr class=if overdue { "text-error" } else { "" }>
                                            <td>{date(inv.invested_at)}</td>
                                            <td>{inr(inv.amount)}</td>
                                            <td>{percent(inv.interest_rate)}</td>
                                            <td>{inr(inv.expected_return)}</td>
                                            <td>
                                                <div>{date(inv.maturity_date)}</div>
                                                <div class="text-xs opacity-70">{countdown(&inv, today)}</div>
                                            </td>
                                            <td><span class="badge badge-outline">{format!("{:?}", inv.status)}</span></td>
                                        </tr>
                                    }
                                }
                            />
                        </tbody>
                    </table>
                </div>
            </div>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn investment(status: InvestmentStatus, maturity: Timestamp) -> Investment {
        Investment {
            id: "i1".into(),
            lender_id: "l1".into(),
            trip_id: "t1".into(),
            bid_id: "b1".into(),
            amount: dec!(20000),
            interest_rate: dec!(12),
            expected_return: dec!(197.26),
            status,
            maturity_date: maturity,
            invested_at: Timestamp::new(0),
        }
    }

    #[test]
    fn countdown_tracks_maturity() {
        let today = Timestamp::new(0).add_days(10);
        let active = investment(InvestmentStatus::Active, Timestamp::new(0).add_days(30));
        assert_eq!(countdown(&active, today), "20 day(s) left");

        let due = investment(InvestmentStatus::Active, today);
        assert_eq!(countdown(&due, today), "Due today");

        let late = investment(InvestmentStatus::Defaulted, Timestamp::new(0).add_days(7));
        assert_eq!(countdown(&late, today), "3 day(s) overdue");

        let escrowed = investment(InvestmentStatus::Escrowed, today);
        assert_eq!(countdown(&escrowed, today), "Awaiting allotment");
    }

    #[test]
    fn bid_rate_is_checked_locally() {
        assert_eq!(check_bid("12.5"), Ok(dec!(12.5)));
        assert!(check_bid("").is_err());
        assert!(check_bid("30").is_err());
    }
}
