use crate::auth::{signup, use_auth};
use crate::components::login::BackendUrlField;
use crate::web::route::AppRoute;
use crate::web::router::Link;
use leptos::prelude::*;
use leptos::task::spawn_local;
use tripfin_shared::Role;
use tripfin_shared::protocol::SignupRequest;

/// 可自助注册的角色；管理员只能由现有管理员设置
const SIGNUP_ROLES: [Role; 3] = [Role::LoadOwner, Role::Transporter, Role::Lender];

fn optional(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[component]
pub fn SignupPage() -> impl IntoView {
    let auth = use_auth();

    let url = RwSignal::new(auth.state.get_untracked().backend_url);
    let name = RwSignal::new(String::new());
    let email = RwSignal::new(String::new());
    let phone = RwSignal::new(String::new());
    let company = RwSignal::new(String::new());
    let password = RwSignal::new(String::new());
    let role = RwSignal::new(Role::LoadOwner);
    let (is_submitting, set_is_submitting) = signal(false);
    let (error_msg, set_error_msg) = signal(Option::<String>::None);

    let on_submit = move |ev: leptos::web_sys::SubmitEvent| {
        ev.prevent_default();
        if password.get().len() < 6 {
            set_error_msg.set(Some("Password must be at least 6 characters".to_string()));
            return;
        }
        let req = SignupRequest {
            email: email.get().trim().to_string(),
            password: password.get(),
            name: name.get().trim().to_string(),
            phone: phone.get().trim().to_string(),
            role: Some(role.get()),
            company: optional(company.get()),
        };

        set_is_submitting.set(true);
        set_error_msg.set(None);
        spawn_local(async move {
            if let Err(e) = signup(&auth, url.get_untracked(), req).await {
                set_error_msg.set(Some(e));
            }
            set_is_submitting.set(false);
        });
    };

    let text_field = move |id: &'static str, label: &'static str, kind: &'static str, value: RwSignal<String>, required: bool| {
        view! {
            <div class="form-control">
                <label class="label" for=id>
                    <span class="label-text">{label}</span>
                </label>
                <input
                    id=id
                    type=kind
                    on:input=move |ev| value.set(event_target_value(&ev))
                    prop:value=move || value.get()
                    class="input input-bordered"
                    required=required
                />
            </div>
        }
    };

    view! {
        <div class="hero min-h-screen bg-base-200">
            <div class="hero-content flex-col w-full max-w-lg">
                <div class="text-center mb-4">
                    <h1 class="text-3xl font-bold">"Join TripFin"</h1>
                    <p class="text-base-content/70">"Lenders are reviewed by an admin before they can bid"</p>
                </div>

                <div class="card shrink-0 w-full shadow-2xl bg-base-100">
                    <form class="card-body" on:submit=on_submit>
                        {move || error_msg.get().map(|msg| view! {
                            <div role="alert" class="alert alert-error text-sm py-2">
                                <span>{msg}</span>
                            </div>
                        })}

                        <BackendUrlField url=url />
                        <div class="form-control">
                            <label class="label">
                                <span class="label-text">"I am a"</span>
                            </label>
                            <select
                                class="select select-bordered w-full"
                                on:change=move |ev| {
                                    let val = event_target_value(&ev);
                                    if let Some(r) = SIGNUP_ROLES.iter().find(|r| r.as_str() == val) {
                                        role.set(*r);
                                    }
                                }
                            >
                                {SIGNUP_ROLES.iter().map(|r| {
                                    let r = *r;
                                    view! {
                                        <option value=r.as_str() selected=move || role.get() == r>{r.label()}</option>
                                    }
                                }).collect_view()}
                            </select>
                        </div>
                        <div class="grid grid-cols-2 gap-4">
                            {text_field("name", "Full name", "text", name, true)}
                            {text_field("phone", "Phone", "tel", phone, true)}
                        </div>
                        {text_field("email", "Email", "email", email, true)}
                        {text_field("company", "Company (optional)", "text", company, false)}
                        {text_field("password", "Password", "password", password, true)}

                        <div class="form-control mt-6">
                            <button class="btn btn-primary" disabled=move || is_submitting.get()>
                                {move || if is_submitting.get() {
                                    view! { <span class="loading loading-spinner"></span> "Creating account..." }.into_any()
                                } else {
                                    "Create account".into_any()
                                }}
                            </button>
                        </div>
                        <p class="text-sm text-center mt-2">
                            "Already registered? "
                            <Link to=AppRoute::Login class="link link-primary">"Sign in"</Link>
                        </p>
                    </form>
                </div>
            </div>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_optional_fields_are_omitted() {
        assert_eq!(optional("   ".to_string()), None);
        assert_eq!(optional(" Acme ".to_string()), Some("Acme".to_string()));
    }

    #[test]
    fn admin_roles_cannot_self_register() {
        assert!(SIGNUP_ROLES.iter().all(|r| !r.is_admin()));
    }
}
