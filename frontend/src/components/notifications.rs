//! 通知铃铛：未读计数 + 下拉列表

use crate::auth::use_auth;
use crate::components::common::{date, use_notice, use_refresh};
use leptos::prelude::*;
use leptos::task::spawn_local;
use tripfin_shared::{Notification, NotificationPriority};

fn unread_count(list: &[Notification]) -> usize {
    list.iter().filter(|n| !n.read).count()
}

fn priority_class(priority: NotificationPriority) -> &'static str {
    match priority {
        NotificationPriority::High => "border-l-4 border-error",
        NotificationPriority::Medium => "border-l-4 border-warning",
        NotificationPriority::Low => "border-l-4 border-base-300",
    }
}

#[component]
pub fn NotificationBell() -> impl IntoView {
    let auth = use_auth();
    let notice = use_notice();
    let tick = use_refresh();
    let (items, set_items) = signal(Vec::<Notification>::new());

    Effect::new(move |_| {
        tick.get();
        let Some(api) = auth.api() else {
            return;
        };
        spawn_local(async move {
            // 轮询失败不打扰用户，下次再试
            if let Ok(list) = api.notifications().await {
                set_items.set(list);
            }
        });
    });

    let mark_read = move |id: String| {
        let Some(api) = auth.api() else {
            return;
        };
        spawn_local(async move {
            if let Some(updated) = notice.check(api.mark_read(&id).await) {
                set_items.update(|list| {
                    if let Some(n) = list.iter_mut().find(|n| n.id == updated.id) {
                        n.read = true;
                    }
                });
            }
        });
    };

    let mark_all = move |_| {
        let Some(api) = auth.api() else {
            return;
        };
        spawn_local(async move {
            if notice.check(api.mark_all_read().await).is_some() {
                set_items.update(|list| list.iter_mut().for_each(|n| n.read = true));
            }
        });
    };

    let unread = move || items.with(|list| unread_count(list));

    view! {
        <div class="dropdown dropdown-end">
            <div tabindex="0" role="button" class="btn btn-ghost btn-circle">
                <div class="indicator">
                    <svg xmlns="http://www.w3.org/2000/svg" class="h-5 w-5" fill="none" viewBox="0 0 24 24" stroke="currentColor"><path stroke-linecap="round" stroke-linejoin="round" stroke-width="2" d="M15 17h5l-1.405-1.405A2.032 2.032 0 0118 14.158V11a6.002 6.002 0 00-4-5.659V5a2 2 0 10-4 0v.341C7.67 6.165 6 8.388 6 11v3.159c0 .538-.214 1.055-.595 1.436L4 17h5m6 0v1a3 3 0 11-6 0v-1m6 0H9" /></svg>
                    {move || (unread() > 0).then(|| view! {
                        <span class="badge badge-sm badge-primary indicator-item">{unread()}</span>
                    })}
                </div>
            </div>
            <div tabindex="0" class="dropdown-content z-[1] card card-compact w-96 shadow bg-base-100">
                <div class="card-body">
                    <div class="flex items-center justify-between">
                        <span class="font-bold">"Notifications"</span>
                        <button class="btn btn-link btn-xs" on:click=mark_all disabled=move || unread() == 0>
                            "Mark all read"
                        </button>
                    </div>
                    <div class="max-h-96 overflow-y-auto space-y-2">
                        {move || items.with(|list| list.is_empty()).then(|| view! {
                            <p class="text-center py-4 text-base-content/50">"Nothing new"</p>
                        })}
                        <For
                            each=move || items.get()
                            key=|n| (n.id.clone(), n.read)
                            children=move |n| {
                                let id = n.id.clone();
                                let class = format!(
                                    "p-2 rounded {} {}",
                                    priority_class(n.priority),
                                    if n.read { "opacity-60" } else { "bg-base-200" }
                                );
                                view! {
                                    <div class=class>
                                        <div class="flex justify-between gap-2">
                                            <span class="font-semibold text-sm">{n.title.clone()}</span>
                                            <span class="text-xs opacity-60">{date(n.created_at)}</span>
                                        </div>
                                        <p class="text-sm">{n.message.clone()}</p>
                                        {(!n.read).then(|| view! {
                                            <button class="btn btn-ghost btn-xs" on:click=move |_| mark_read(id.clone())>
                                                "Mark read"
                                            </button>
                                        })}
                                    </div>
                                }
                            }
                        />
                    </div>
                </div>
            </div>
        </div>
    }
}
