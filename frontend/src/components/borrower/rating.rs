use crate::components::common::Modal;
use leptos::prelude::*;
use tripfin_shared::Trip;

/// 还清后给出借人打分 (1-5 星)
#[component]
pub fn RatingDialog(
    open: RwSignal<bool>,
    trip: RwSignal<Option<Trip>>,
    #[prop(into)] on_rate: Callback<(String, u8, Option<String>)>,
) -> impl IntoView {
    let stars = RwSignal::new(5u8);
    let review = RwSignal::new(String::new());

    let submit = move |_| {
        let Some(t) = trip.get_untracked() else {
            return;
        };
        let text = review.get_untracked();
        let text = (!text.trim().is_empty()).then(|| text.trim().to_string());
        on_rate.run((t.id, stars.get_untracked(), text));
        review.set(String::new());
        stars.set(5);
    };

    view! {
        <Modal open=open title="Rate your lender">
            <div class="space-y-4">
                {move || trip.get().map(|t| view! {
                    <p class="text-sm">
                        {t.route_label()} " · funded by " {t.lender_name.clone().unwrap_or_default()}
                    </p>
                })}
                <div class="rating rating-lg">
                    {(1..=5u8).map(|n| view! {
                        <input type="radio" name="lender-rating" class="mask mask-star-2 bg-orange-400"
                            prop:checked=move || stars.get() == n
                            on:change=move |_| stars.set(n)
                        />
                    }).collect_view()}
                </div>
                <textarea class="textarea textarea-bordered w-full" placeholder="How was working with this lender? (optional)"
                    prop:value=move || review.get()
                    on:input=move |ev| review.set(event_target_value(&ev))
                ></textarea>
            </div>
            <div class="modal-action">
                <button type="button" class="btn btn-ghost" on:click=move |_| open.set(false)>"Later"</button>
                <button type="button" class="btn btn-primary" on:click=submit>"Submit rating"</button>
            </div>
        </Modal>
    }
}
