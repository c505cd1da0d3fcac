use crate::components::common::{Modal, date, inr, percent};
use leptos::prelude::*;
use tripfin_shared::Trip;

/// 行程的出价列表，借款人从中选定一位出借人
#[component]
pub fn BidsDialog(
    open: RwSignal<bool>,
    trip: RwSignal<Option<Trip>>,
    #[prop(into)] on_allot: Callback<(String, String)>,
) -> impl IntoView {
    view! {
        <Modal open=open title="Bids">
            {move || trip.get().map(|t| {
                let trip_id = t.id.clone();
                let mut bids = t.bids.clone();
                bids.sort_by(|a, b| a.interest_rate.cmp(&b.interest_rate).then(a.created_at.cmp(&b.created_at)));
                view! {
                    <p class="text-sm mb-2">{t.route_label()} " · " {inr(t.amount)}</p>
                    {bids.is_empty().then(|| view! {
                        <p class="text-center py-6 text-base-content/50">"No bids yet. Lenders are notified when you post a trip."</p>
                    })}
                    <table class="table table-sm">
                        <tbody>
                            {bids.into_iter().map(|bid| {
                                let ids = (trip_id.clone(), bid.id.clone());
                                view! {
                                    <tr>
                                        <td class="font-semibold">{bid.lender_name.clone()}</td>
                                        <td>{percent(bid.interest_rate)}</td>
                                        <td>{inr(bid.amount)}</td>
                                        <td class="text-xs opacity-60">{date(bid.created_at)}</td>
                                        <td>
                                            <button class="btn btn-primary btn-xs" on:click=move |_| on_allot.run(ids.clone())>
                                                "Allot"
                                            </button>
                                        </td>
                                    </tr>
                                }
                            }).collect_view()}
                        </tbody>
                    </table>
                }
            })}
            <div class="modal-action">
                <button type="button" class="btn btn-ghost" on:click=move |_| open.set(false)>"Close"</button>
            </div>
        </Modal>
    }
}
