//! 钱包卡片：余额、充值/提现、最近流水

use crate::auth::use_auth;
use crate::components::common::{date, inr, parse_decimal, use_notice, use_refresh};
use leptos::prelude::*;
use leptos::task::spawn_local;
use rust_decimal::Decimal;
use tripfin_shared::{Transaction, TransactionType};

const RECENT_TRANSACTIONS: usize = 10;

#[derive(Clone, Copy, PartialEq)]
enum WalletAction {
    Deposit,
    Withdraw,
}

fn validate_amount(raw: &str) -> Result<Decimal, String> {
    match parse_decimal(raw) {
        Some(v) if v > Decimal::ZERO => Ok(v),
        _ => Err("Enter a positive amount".to_string()),
    }
}

#[component]
pub fn WalletCard() -> impl IntoView {
    let auth = use_auth();
    let notice = use_notice();
    let tick = use_refresh();

    let amount = RwSignal::new(String::new());
    let (busy, set_busy) = signal(false);
    let (history, set_history) = signal(Vec::<Transaction>::new());

    Effect::new(move |_| {
        tick.get();
        let (Some(api), Some(user)) = (auth.api(), auth.state.with_untracked(|s| s.user.clone())) else {
            return;
        };
        spawn_local(async move {
            if let Ok(list) = api.transactions(&user.id, RECENT_TRANSACTIONS).await {
                set_history.set(list);
            }
        });
    });

    let submit = move |action: WalletAction| {
        let value = match validate_amount(&amount.get()) {
            Ok(v) => v,
            Err(e) => {
                notice.err(e);
                return;
            }
        };
        let (Some(api), Some(user)) = (auth.api(), auth.state.with_untracked(|s| s.user.clone())) else {
            return;
        };
        set_busy.set(true);
        spawn_local(async move {
            let result = match action {
                WalletAction::Deposit => api.add_money(&user.id, value).await,
                WalletAction::Withdraw => api.withdraw(&user.id, value).await,
            };
            if let Some(wallet) = notice.check(result) {
                auth.set_wallet(wallet);
                amount.set(String::new());
                notice.ok(match action {
                    WalletAction::Deposit => format!("Added {}", inr(value)),
                    WalletAction::Withdraw => format!("Withdrew {}", inr(value)),
                });
                tick.bump();
            }
            set_busy.set(false);
        });
    };

    let field = move |pick: fn(&tripfin_shared::Wallet) -> Decimal| {
        move || auth.state.with(|s| s.wallet.as_ref().map(pick).map(inr).unwrap_or_default())
    };

    view! {
        <div class="card bg-base-100 shadow-xl">
            <div class="card-body">
                <h3 class="card-title">"Wallet"</h3>
                <div class="stats stats-vertical md:stats-horizontal">
                    <div class="stat">
                        <div class="stat-title">"Available"</div>
                        <div class="stat-value text-primary text-2xl">{field(|w| w.balance)}</div>
                    </div>
                    <div class="stat">
                        <div class="stat-title">"In escrow"</div>
                        <div class="stat-value text-2xl">{field(|w| w.escrowed_amount)}</div>
                    </div>
                    <div class="stat">
                        <div class="stat-title">"Invested"</div>
                        <div class="stat-value text-2xl">{field(|w| w.total_invested)}</div>
                    </div>
                    <div class="stat">
                        <div class="stat-title">"Returns"</div>
                        <div class="stat-value text-success text-2xl">{field(|w| w.total_returns)}</div>
                    </div>
                </div>

                <div class="join w-full md:w-auto">
                    <input
                        type="text"
                        inputmode="decimal"
                        placeholder="Amount (₹)"
                        class="input input-bordered join-item w-full"
                        prop:value=move || amount.get()
                        on:input=move |ev| amount.set(event_target_value(&ev))
                    />
                    <button class="btn btn-primary join-item" disabled=move || busy.get() on:click=move |_| submit(WalletAction::Deposit)>
                        "Add money"
                    </button>
                    <button class="btn join-item" disabled=move || busy.get() on:click=move |_| submit(WalletAction::Withdraw)>
                        "Withdraw"
                    </button>
                </div>

                <div class="collapse collapse-arrow bg-base-200 mt-2">
                    <input type="checkbox" />
                    <div class="collapse-title font-medium">"Recent transactions"</div>
                    <div class="collapse-content overflow-x-auto">
                        <table class="table table-sm">
                            <tbody>
                                <For
                                    each=move || history.get()
                                    key=|t| t.id.clone()
                                    children=move |t| {
                                        let (sign, class) = match t.kind {
                                            TransactionType::Credit => ("+", "text-success"),
                                            TransactionType::Debit => ("-", "text-error"),
                                        };
                                        view! {
                                            <tr>
                                                <td class="text-xs opacity-60">{date(t.timestamp)}</td>
                                                <td>{t.description.clone()}</td>
                                                <td class=class>{format!("{}{}", sign, inr(t.amount))}</td>
                                                <td class="text-xs opacity-60">{inr(t.balance_after)}</td>
                                            </tr>
                                        }
                                    }
                                />
                            </tbody>
                        </table>
                    </div>
                </div>
            </div>
        </div>
    }
}
