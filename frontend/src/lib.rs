//! TripFin 前端应用
//!
//! 采用 Context-Driven 架构：
//! - `web::route`: 路由定义
//! - `web::router`: 路由服务
//! - `auth`: 会话状态管理
//! - `components`: UI 组件层，按角色划分工作台

mod api;
mod auth;
mod components {
    pub mod admin;
    pub mod borrower;
    pub mod common;
    pub mod dashboard;
    pub mod lender;
    pub mod login;
    pub mod notifications;
    pub mod signup;
    pub mod wallet;
}

use crate::auth::{AuthContext, init_auth};
use crate::components::dashboard::DashboardPage;
use crate::components::login::LoginPage;
use crate::components::signup::SignupPage;

use leptos::prelude::*;

// 浏览器原生 API 的轻量封装，替代 gloo-* 系列 crate 以减小 WASM 体积
pub(crate) mod web {
    pub mod file;
    mod http;
    pub mod route;
    pub mod router;
    mod storage;
    mod timer;

    pub use http::{HttpRequestBuilder, HttpResponse};
    pub use storage::{LocalStorage, SessionStorage};
    pub use timer::Interval;
}

use web::route::AppRoute;
use web::router::{Link, Router, RouterOutlet};

fn route_matcher(route: AppRoute) -> AnyView {
    match route {
        AppRoute::Login => view! { <LoginPage /> }.into_any(),
        AppRoute::Signup => view! { <SignupPage /> }.into_any(),
        AppRoute::Dashboard => view! { <DashboardPage /> }.into_any(),
        AppRoute::NotFound => view! {
            <div class="flex items-center justify-center min-h-screen bg-base-200">
                <div class="text-center space-y-4">
                    <h1 class="text-6xl font-bold text-error">"404"</h1>
                    <p class="text-xl">"Page not found"</p>
                    <Link to=AppRoute::Dashboard class="btn btn-primary">"Back to dashboard"</Link>
                </div>
            </div>
        }
        .into_any(),
    }
}

#[component]
pub fn App() -> impl IntoView {
    let auth_ctx = AuthContext::new();
    provide_context(auth_ctx);

    // 读取后端地址，有 token 时后台恢复会话
    init_auth(&auth_ctx);

    let is_authenticated = auth_ctx.is_authenticated_signal();
    let restoring = move || auth_ctx.state.get().is_loading;

    view! {
        <Router is_authenticated=is_authenticated>
            <Show
                when=move || !restoring()
                fallback=|| view! {
                    <div class="flex items-center justify-center min-h-screen">
                        <span class="loading loading-spinner loading-lg text-primary"></span>
                    </div>
                }
            >
                <RouterOutlet matcher=route_matcher />
            </Show>
        </Router>
    }
}
