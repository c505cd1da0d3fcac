use crate::auth::{AuthContext, logout, refresh_profile, use_auth};
use crate::components::admin::AdminDashboard;
use crate::components::borrower::BorrowerDashboard;
use crate::components::common::{Toast, provide_notice, provide_refresh_tick};
use crate::components::lender::LenderDashboard;
use crate::components::notifications::NotificationBell;
use crate::components::wallet::WalletCard;
use leptos::prelude::*;
use leptos::task::spawn_local;
use tripfin_shared::{ApprovalStatus, Role, User};

fn approval_banner(user: &User) -> Option<(&'static str, String)> {
    match user.approval_status {
        ApprovalStatus::Approved => None,
        ApprovalStatus::Pending => Some((
            "alert alert-warning",
            "Your account is awaiting admin approval. You can browse, but not transact yet.".to_string(),
        )),
        ApprovalStatus::Rejected => Some((
            "alert alert-error",
            format!(
                "Your account was rejected: {}",
                user.rejection_reason.clone().unwrap_or_else(|| "no reason given".to_string())
            ),
        )),
    }
}

#[component]
pub fn DashboardPage() -> impl IntoView {
    let auth: AuthContext = use_auth();
    let notice = provide_notice();
    let tick = provide_refresh_tick();

    // 审批状态和余额可能被其他人改变，随轮询一起刷新
    Effect::new(move |prev: Option<()>| {
        tick.get();
        if prev.is_some() {
            spawn_local(async move {
                if let Err(e) = refresh_profile(&auth).await {
                    web_sys::console::warn_1(&format!("[Dashboard] profile refresh failed: {}", e).into());
                }
            });
        }
    });

    let on_logout = move |_| logout(&auth);

    // 只在角色变化时重建工作台，轮询刷新资料不会丢失页面状态
    let role = Memo::new(move |_| auth.state.with(|s| s.user.as_ref().map(|u| u.role)));

    view! {
        <div class="min-h-screen bg-base-200 p-4 md:p-8 font-sans">
            <div class="max-w-7xl mx-auto space-y-8">
                <Toast notice=notice />

                <div class="navbar bg-base-100 rounded-box shadow-xl">
                    <div class="flex-1 gap-2">
                        <a class="btn btn-ghost text-xl">"TripFin"</a>
                        {move || auth.user().map(|u| view! {
                            <span class="badge badge-neutral hidden md:inline-flex">
                                {u.name.clone()} " · " {u.role.label()}
                            </span>
                        })}
                    </div>
                    <div class="flex-none gap-2">
                        <NotificationBell />
                        <button on:click=on_logout class="btn btn-outline btn-error gap-2">"Sign out"</button>
                    </div>
                </div>

                {move || auth.user().and_then(|u| approval_banner(&u)).map(|(class, msg)| view! {
                    <div role="alert" class=class><span>{msg}</span></div>
                })}

                {move || match role.get() {
                    Some(Role::Lender) => view! {
                        <WalletCard />
                        <LenderDashboard />
                    }.into_any(),
                    Some(Role::LoadOwner | Role::Transporter) => view! {
                        <WalletCard />
                        <BorrowerDashboard />
                    }.into_any(),
                    Some(Role::Admin | Role::SuperAdmin) => view! { <AdminDashboard /> }.into_any(),
                    None => view! { <span class="loading loading-spinner loading-lg"></span> }.into_any(),
                }}
            </div>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripfin_shared::Timestamp;

    fn user(status: ApprovalStatus, reason: Option<&str>) -> User {
        User {
            id: "u1".into(),
            user_id: "U0001".into(),
            email: "a@b.c".into(),
            name: "Asha".into(),
            phone: "9999".into(),
            role: Role::Lender,
            company: None,
            approval_status: status,
            rejection_reason: reason.map(str::to_string),
            approved_by: None,
            created_at: Timestamp::new(0),
        }
    }

    #[test]
    fn banner_follows_approval_status() {
        assert!(approval_banner(&user(ApprovalStatus::Approved, None)).is_none());
        let (class, _) = approval_banner(&user(ApprovalStatus::Pending, None)).unwrap();
        assert_eq!(class, "alert alert-warning");
        let (_, msg) = approval_banner(&user(ApprovalStatus::Rejected, Some("KYC mismatch"))).unwrap();
        assert!(msg.contains("KYC mismatch"));
    }
}
