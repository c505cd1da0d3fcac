use crate::components::common::{Modal, inr, percent};
use leptos::prelude::*;
use tripfin_shared::finance::{self, RepaymentQuote};
use tripfin_shared::{Timestamp, Trip};

/// 与后端同一公式：按放款日到今天的自然日计息
fn local_quote(trip: &Trip, today: Timestamp) -> Option<RepaymentQuote> {
    let funded = trip.funded_at?;
    let days = finance::elapsed_days(funded.date_naive(), today.date_naive());
    Some(finance::quote(trip.amount, trip.interest_rate, days))
}

/// 还款确认框，按当前日期实时试算本息
#[component]
pub fn RepayDialog(
    open: RwSignal<bool>,
    trip: RwSignal<Option<Trip>>,
    #[prop(into)] on_repay: Callback<String>,
) -> impl IntoView {
    let quote = move || {
        let t = trip.get()?;
        local_quote(&t, Timestamp::now()).map(|q| (t, q))
    };

    view! {
        <Modal open=open title="Repay loan">
            {move || match quote() {
                Some((t, q)) => {
                    let trip_id = t.id.clone();
                    let early = q.days < i64::from(t.maturity_days);
                    view! {
                        <div class="space-y-2 text-sm">
                            <div class="font-semibold">{t.route_label()}</div>
                            <div class="grid grid-cols-2 gap-2">
                                <span>"Principal"</span><span class="text-right">{inr(q.principal)}</span>
                                <span>{format!("Interest ({} at {} days)", percent(q.interest_rate), q.days)}</span>
                                <span class="text-right">{inr(q.interest)}</span>
                                <span class="font-bold">"Total due"</span><span class="text-right font-bold">{inr(q.total)}</span>
                            </div>
                            {early.then(|| view! {
                                <p class="text-success">"Repaying early: interest is charged only for the days elapsed."</p>
                            })}
                        </div>
                        <div class="modal-action">
                            <button type="button" class="btn btn-ghost" on:click=move |_| open.set(false)>"Cancel"</button>
                            <button type="button" class="btn btn-primary" on:click=move |_| on_repay.run(trip_id.clone())>
                                {format!("Pay {}", inr(q.total))}
                            </button>
                        </div>
                    }.into_any()
                }
                None => view! { <p>"This trip has not been funded yet."</p> }.into_any(),
            }}
        </Modal>
    }
}
